//! Encode Loop
//!
//! Drives an encoder session from a simulated render loop: every frame the
//! loop ticks the encoder, renders a synthetic surface and submits it.
//!
//! Usage: `encode-loop [config.json]`

mod config;
mod pattern;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::bail;
use encode_session::{
    EncodedPacket, EncoderService, EncoderStats, ExclusiveEncoder, NativeBackend, SessionHandle,
    SoftwareBackend,
};
use surface::{SurfaceRef, SurfaceStore};
use tracing::{debug, info, warn};

use config::AppConfig;

/// The two ways of hosting a session
enum Driver {
    Service {
        service: EncoderService,
        handle: SessionHandle,
    },
    Exclusive(ExclusiveEncoder),
}

impl Driver {
    fn start(config: &AppConfig, backend: Arc<dyn NativeBackend>) -> anyhow::Result<Self> {
        if config.exclusive {
            let mut encoder =
                ExclusiveEncoder::new(backend, config.dispatch.clone(), config.encoder.clone());
            if !encoder.start_encode() {
                bail!("failed to start encoder: {}", encoder.last_error());
            }
            return Ok(Self::Exclusive(encoder));
        }

        let service = EncoderService::new(backend, config.dispatch.clone());
        let handle = service.create(config.encoder.clone());
        if !handle.is_valid() {
            bail!("failed to create session: {}", service.last_error(handle));
        }
        Ok(Self::Service { service, handle })
    }

    fn subscribe(&self, listener: encode_session::PacketListener) {
        match self {
            Self::Service { service, handle } => {
                service.subscribe(*handle, listener);
            }
            Self::Exclusive(encoder) => {
                encoder.subscribe(listener);
            }
        }
    }

    fn tick(&self) -> usize {
        match self {
            Self::Service { service, .. } => service.tick(),
            Self::Exclusive(encoder) => encoder.tick(),
        }
    }

    fn encode(&self, surface: SurfaceRef, force_key_frame: bool) -> bool {
        match self {
            Self::Service { service, handle } => service.encode(*handle, surface, force_key_frame),
            Self::Exclusive(encoder) => encoder.encode(surface, force_key_frame),
        }
    }

    fn last_error(&self) -> String {
        match self {
            Self::Service { service, handle } => service.last_error(*handle),
            Self::Exclusive(encoder) => encoder.last_error(),
        }
    }

    fn stats(&self) -> Option<EncoderStats> {
        match self {
            Self::Service { service, handle } => service.stats(*handle),
            Self::Exclusive(encoder) => encoder.stats(),
        }
    }

    fn stop(self) {
        match self {
            Self::Service { service, handle } => {
                service.destroy(handle);
            }
            Self::Exclusive(mut encoder) => {
                encoder.stop_encode();
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("encode_loop=debug".parse()?)
                .add_directive("encode_session=info".parse()?),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    config.encoder.validate()?;

    info!(
        "Starting encode loop: {}x{} @ {} fps, {:?}, {}",
        config.encoder.width,
        config.encoder.height,
        config.encoder.frame_rate,
        config.encoder.pixel_format,
        if config.exclusive { "exclusive" } else { "service" }
    );

    let store = Arc::new(SurfaceStore::new());
    let backend: Arc<dyn NativeBackend> = Arc::new(SoftwareBackend::new(store.clone()));

    let width = config.encoder.width;
    let height = config.encoder.height;
    let format = config.encoder.pixel_format;
    let target = store.insert(pattern::render(width, height, format, 0)?)?;

    let driver = Driver::start(&config, backend)?;

    let bytes_out = Arc::new(AtomicU64::new(0));
    let counter = bytes_out.clone();
    driver.subscribe(Arc::new(move |packet: &EncodedPacket| {
        counter.fetch_add(packet.size() as u64, Ordering::Relaxed);
    }));

    let frame_interval = Duration::from_secs(1) / config.encoder.frame_rate;
    let mut interval = tokio::time::interval(frame_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let deadline = (config.duration_secs > 0)
        .then(|| tokio::time::Instant::now() + Duration::from_secs(config.duration_secs));

    let mut frame: u64 = 0;
    let mut rejected: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            break;
        }

        let harvested = driver.tick();
        if harvested > 0 {
            debug!(frame, packets = harvested, "Harvested");
        }

        store.update(target, pattern::render(width, height, format, frame)?)?;

        if !driver.encode(target, config.is_keyframe(frame)) {
            rejected += 1;
            warn!(frame, "Frame not submitted: {}", driver.last_error());
        }

        frame += 1;
    }

    // Pick up the last frame before shutting down
    driver.tick();

    if let Some(stats) = driver.stats() {
        info!(
            frames = frame,
            rejected,
            encoded = stats.frames_encoded,
            dropped = stats.frames_dropped,
            failures = stats.encode_failures,
            packets = stats.packets_harvested,
            avg_encode_us = stats.avg_encode_time_us,
            bytes = bytes_out.load(Ordering::Relaxed),
            "Encode loop finished"
        );
    }

    driver.stop();
    Ok(())
}
