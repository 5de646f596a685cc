#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, bounded};
use encode_session::{
    EncoderConfig, EncoderError, EncoderResult, NativeBackend, NativeEncoder, PixelFormat,
    SurfaceRef,
};
use parking_lot::Mutex;

pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let started = Instant::now();
    while started.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

pub fn surface(width: u32, height: u32) -> SurfaceRef {
    SurfaceRef::new(7, width, height, PixelFormat::Rgba8Unorm)
}

/// Shared knobs and counters of a [`ScriptedBackend`]
#[derive(Default)]
pub struct Script {
    pub creates: AtomicUsize,
    pub encodes: AtomicUsize,
    pub finishes: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_encode: AtomicBool,
    /// Packets produced per successful encode (at least one)
    pub packets_per_frame: AtomicUsize,
    gate: Mutex<Option<Receiver<()>>>,
}

impl Script {
    pub fn encode_calls(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }

    /// Make every encode block until released through the returned sender
    pub fn gate(&self) -> Sender<()> {
        let (release, gate) = bounded(16);
        *self.gate.lock() = Some(gate);
        release
    }
}

/// Backend whose encoders emit `frame-<n>-<i>` packets
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    pub script: Arc<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn NativeBackend> {
        Arc::new(self.clone())
    }
}

impl NativeBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn create_encoder(&self, _config: &EncoderConfig) -> EncoderResult<Box<dyn NativeEncoder>> {
        self.script.creates.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_create.load(Ordering::SeqCst) {
            return Err(EncoderError::ResourceExhausted(
                "no encoder sessions left".to_string(),
            ));
        }

        Ok(Box::new(ScriptedEncoder {
            script: self.script.clone(),
            pending: Vec::new(),
            frames: 0,
        }))
    }
}

struct ScriptedEncoder {
    script: Arc<Script>,
    pending: Vec<Bytes>,
    frames: usize,
}

impl NativeEncoder for ScriptedEncoder {
    fn encode(&mut self, _surface: SurfaceRef, _force_idr_frame: bool) -> EncoderResult<()> {
        self.script.encodes.fetch_add(1, Ordering::SeqCst);

        let gate = self.script.gate.lock().clone();
        if let Some(gate) = gate {
            let _ = gate.recv_timeout(Duration::from_secs(5));
        }

        if self.script.fail_encode.load(Ordering::SeqCst) {
            return Err(EncoderError::native("EncodeFrame", "device lost"));
        }

        let count = self.script.packets_per_frame.load(Ordering::SeqCst).max(1);
        for i in 0..count {
            self.pending
                .push(Bytes::from(format!("frame-{}-{}", self.frames, i)));
        }
        self.frames += 1;
        Ok(())
    }

    fn copy_encoded_data(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.pending)
    }

    fn finish(&mut self) -> EncoderResult<()> {
        self.script.finishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
