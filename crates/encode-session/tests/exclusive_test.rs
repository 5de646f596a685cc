mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{ScriptedBackend, surface};
use encode_session::{
    DispatchConfig, DispatchState, EncodedPacket, EncoderConfig, ErrorKind, ExclusiveEncoder,
    ExclusiveRegistry, PixelFormat, SurfaceRef,
};

fn encoder(backend: &ScriptedBackend, registry: &Arc<ExclusiveRegistry>) -> ExclusiveEncoder {
    ExclusiveEncoder::with_registry(
        registry.clone(),
        backend.shared(),
        DispatchConfig::default(),
        EncoderConfig::new(1920, 1080, 30),
    )
}

#[test]
fn test_second_start_is_a_no_op() {
    let backend = ScriptedBackend::new();
    let registry = ExclusiveRegistry::new();
    let mut encoder = encoder(&backend, &registry);

    assert!(encoder.start_encode());
    assert!(encoder.encode(surface(1920, 1080), true));

    assert!(!encoder.start_encode());
    assert_eq!(encoder.take_error().unwrap().kind(), ErrorKind::ResourceExhausted);

    // The running session kept its in-flight frame
    assert!(encoder.is_valid());
    assert_eq!(backend.script.creates.load(Ordering::SeqCst), 1);
    assert_eq!(encoder.state(), Some(DispatchState::Completing));
    assert_eq!(encoder.tick(), 1);
}

#[test]
fn test_one_session_per_registry() {
    let backend = ScriptedBackend::new();
    let registry = ExclusiveRegistry::new();
    let mut first = encoder(&backend, &registry);
    let mut second = encoder(&backend, &registry);

    assert!(first.start_encode());
    assert!(!second.start_encode());
    assert!(!second.is_valid());
    assert!(second.last_error().contains("already active"));
    assert!(first.is_valid());

    assert!(first.stop_encode());
    assert!(!registry.is_active());
    assert!(second.start_encode());
    assert!(!first.start_encode());
}

#[test]
fn test_dropping_encoder_releases_registry() {
    let backend = ScriptedBackend::new();
    let registry = ExclusiveRegistry::new();

    {
        let mut encoder = encoder(&backend, &registry);
        assert!(encoder.start_encode());
        assert!(registry.is_active());
    }

    assert!(!registry.is_active());
    assert_eq!(backend.script.finishes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_start_releases_token() {
    let backend = ScriptedBackend::new();
    backend.script.fail_create.store(true, Ordering::SeqCst);
    let registry = ExclusiveRegistry::new();
    let mut encoder = encoder(&backend, &registry);

    assert!(!encoder.start_encode());
    assert!(!registry.is_active());
    assert_eq!(encoder.take_error().unwrap().kind(), ErrorKind::ResourceExhausted);
}

#[test]
fn test_declared_change_needs_reinitialize() {
    let backend = ScriptedBackend::new();
    let registry = ExclusiveRegistry::new();
    let mut encoder = encoder(&backend, &registry);
    assert!(encoder.start_encode());

    encoder.set_resolution(1280, 720);
    assert!(!encoder.encode(surface(1280, 720), false));
    assert!(encoder.last_error().contains("reinitialize"));
    assert_eq!(backend.script.encode_calls(), 0);

    assert!(encoder.reinitialize());
    assert_eq!(encoder.width(), Some(1280));
    assert_eq!(encoder.height(), Some(720));
    assert!(encoder.encode(surface(1280, 720), false));
    assert_eq!(backend.script.creates.load(Ordering::SeqCst), 2);
}

#[test]
fn test_declared_format_and_rate_checked() {
    let backend = ScriptedBackend::new();
    let registry = ExclusiveRegistry::new();
    let mut encoder = encoder(&backend, &registry);
    assert!(encoder.start_encode());

    encoder.set_frame_rate(60);
    assert!(!encoder.encode(surface(1920, 1080), false));
    assert_eq!(encoder.take_error().unwrap().kind(), ErrorKind::ConfigurationDrift);

    encoder.set_frame_rate(30);
    encoder.set_pixel_format(PixelFormat::Bgra8Unorm);
    assert!(!encoder.encode(surface(1920, 1080), false));

    encoder.set_pixel_format(PixelFormat::Rgba8Unorm);
    encoder.set_bit_rate(Some(8_000_000));
    assert!(!encoder.encode(surface(1920, 1080), false));

    encoder.set_bit_rate(None);
    assert!(encoder.encode(surface(1920, 1080), false));
}

#[test]
fn test_encode_before_start() {
    let backend = ScriptedBackend::new();
    let registry = ExclusiveRegistry::new();
    let encoder = encoder(&backend, &registry);

    assert!(!encoder.encode(surface(1920, 1080), false));
    assert!(encoder.last_error().contains("not initialized"));
    assert!(!encoder.encode(SurfaceRef::NULL, false));
    assert_eq!(encoder.take_error().unwrap().kind(), ErrorKind::InvalidArgument);
    assert_eq!(encoder.tick(), 0);
    assert!(!encoder.is_encoding());
}

#[test]
fn test_newest_packet_shim() {
    let backend = ScriptedBackend::new();
    backend.script.packets_per_frame.store(2, Ordering::SeqCst);
    let registry = ExclusiveRegistry::new();
    let mut encoder = encoder(&backend, &registry);
    assert!(encoder.start_encode());
    assert_eq!(encoder.encoded_size(), 0);
    assert!(encoder.encoded_data().is_none());

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    encoder.subscribe(Arc::new(move |_: &EncodedPacket| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert!(encoder.encode(surface(1920, 1080), true));
    assert!(encoder.is_encoding());
    assert_eq!(encoder.tick(), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    assert_eq!(encoder.encoded_data().unwrap().as_ref(), b"frame-0-1");
    assert_eq!(encoder.encoded_size(), b"frame-0-1".len());
}

#[test]
fn test_listeners_survive_restart() {
    let backend = ScriptedBackend::new();
    let registry = ExclusiveRegistry::new();
    let mut encoder = encoder(&backend, &registry);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let id = encoder.subscribe(Arc::new(move |_: &EncodedPacket| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert!(encoder.start_encode());
    assert!(encoder.reinitialize());
    assert!(encoder.encode(surface(1920, 1080), false));
    encoder.tick();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(encoder.unsubscribe(id));
}

#[test]
fn test_global_registry_default() {
    let backend = ScriptedBackend::new();
    let mut encoder = ExclusiveEncoder::new(
        backend.shared(),
        DispatchConfig::default(),
        EncoderConfig::new(640, 480, 30),
    );

    assert!(encoder.start_encode());
    assert!(ExclusiveRegistry::global().is_active());
    assert!(encoder.stop_encode());
    assert!(!encoder.stop_encode());
    assert!(!ExclusiveRegistry::global().is_active());
}

#[test]
fn test_latest_error_wins_across_start_and_encode() {
    let backend = ScriptedBackend::new();
    let registry = ExclusiveRegistry::new();
    let mut encoder = encoder(&backend, &registry);
    assert!(encoder.start_encode());

    encoder.set_resolution(1280, 720);
    assert!(!encoder.encode(surface(1280, 720), false));
    assert!(!encoder.start_encode());

    assert!(encoder.has_error());
    assert_eq!(
        encoder.last_error(),
        "An exclusive encoder session is already active"
    );
    assert_eq!(encoder.last_error(), "");
    assert!(!encoder.has_error());
}

#[test]
fn test_session_error_replaces_start_error() {
    let backend = ScriptedBackend::new();
    let registry = ExclusiveRegistry::new();
    let mut encoder = encoder(&backend, &registry);
    assert!(encoder.start_encode());

    assert!(!encoder.start_encode());
    backend.script.fail_encode.store(true, Ordering::SeqCst);
    assert!(!encoder.encode(surface(1920, 1080), false));

    assert_eq!(encoder.take_error().unwrap().kind(), ErrorKind::NativeFailure);
    assert!(encoder.take_error().is_none());
}
