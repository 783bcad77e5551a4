//! Flush / reset / close semantics across the processing model.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use webcodec_core::codec::dummy::DummyVideoEncoder;
use webcodec_core::webcodecs::VideoEncoderBackendFactory;
use webcodec_core::{
    CodecState, ResourceManager, VideoEncoder, VideoEncoderConfig, VideoFrame, VideoFrameInit,
    VideoPixelFormat, WebCodecsError,
};

fn frame(timestamp: i64) -> VideoFrame {
    VideoFrame::new(VideoFrameInit {
        format: VideoPixelFormat::I420,
        coded_width: 320,
        coded_height: 240,
        timestamp,
        duration: None,
        rotation: 0,
        flip: false,
        display_width: None,
        display_height: None,
        data: vec![0; VideoPixelFormat::I420.byte_length(320, 240)],
    })
    .expect("valid frame")
}

fn config() -> VideoEncoderConfig {
    VideoEncoderConfig {
        codec: "vp8".to_string(),
        width: 320,
        height: 240,
        ..VideoEncoderConfig::default()
    }
}

/// Backend that refuses its first frame until the instance is reset, wedging
/// the pipeline so cancellation paths become deterministic.
fn wedging_factory() -> VideoEncoderBackendFactory {
    Arc::new(|| Box::new(DummyVideoEncoder::new().saturating_at(0, u32::MAX)) as _)
}

fn encoder_with(
    factory: VideoEncoderBackendFactory,
) -> (VideoEncoder, mpsc::Receiver<WebCodecsError>, Arc<Mutex<usize>>) {
    let (error_tx, error_rx) = mpsc::channel();
    let output_count = Arc::new(Mutex::new(0));
    let counter = output_count.clone();
    let encoder = VideoEncoder::with_resource_manager(
        factory,
        move |_chunk, _metadata| {
            *counter.lock().unwrap() += 1;
        },
        move |error| {
            let _ = error_tx.send(error);
        },
        Arc::new(ResourceManager::new()),
    );
    (encoder, error_rx, output_count)
}

#[test]
fn flush_on_empty_queue_resolves() {
    let (encoder, _errors, outputs) = encoder_with(DummyVideoEncoder::factory());
    encoder.configure(config()).expect("configure");
    encoder.flush().wait_blocking().expect("flush resolves");
    assert_eq!(*outputs.lock().unwrap(), 0);
}

#[test]
fn flush_on_unconfigured_rejects_with_invalid_state() {
    let (encoder, _errors, _outputs) = encoder_with(DummyVideoEncoder::factory());
    let err = encoder
        .flush()
        .wait_blocking()
        .expect_err("flush rejects while unconfigured");
    assert_eq!(err.name(), "InvalidStateError");
}

#[test]
fn reset_rejects_pending_flush_with_abort() {
    let (encoder, _errors, _outputs) = encoder_with(wedging_factory());
    encoder.configure(config()).expect("configure");
    encoder.encode(&frame(0)).expect("encode");
    let pending = encoder.flush();

    encoder.reset().expect("reset");
    assert_eq!(encoder.state(), CodecState::Unconfigured);

    let err = pending.wait_blocking().expect_err("flush rejected");
    assert_eq!(err.name(), "AbortError");
}

#[test]
fn close_rejects_pending_flush_then_invalid_state() {
    let (encoder, _errors, _outputs) = encoder_with(wedging_factory());
    encoder.configure(config()).expect("configure");
    encoder.encode(&frame(0)).expect("encode");
    let pending = encoder.flush();

    encoder.close();
    let err = pending.wait_blocking().expect_err("flush rejected");
    assert_eq!(err.name(), "AbortError");

    assert_eq!(encoder.state(), CodecState::Closed);
    let err = encoder.encode(&frame(0)).expect_err("closed");
    assert_eq!(err.name(), "InvalidStateError");
    let err = encoder.reset().expect_err("reset on closed");
    assert_eq!(err.name(), "InvalidStateError");
}

#[test]
fn user_close_does_not_invoke_error_callback() {
    let (encoder, errors, _outputs) = encoder_with(DummyVideoEncoder::factory());
    encoder.configure(config()).expect("configure");
    encoder.close();
    encoder.close();
    assert!(errors.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn reset_zeroes_queue_size() {
    let (encoder, _errors, _outputs) = encoder_with(wedging_factory());
    encoder.configure(config()).expect("configure");
    encoder.encode(&frame(0)).expect("encode");
    // Let the saturation signal land so further inputs stay queued.
    std::thread::sleep(Duration::from_millis(20));
    for i in 1..4 {
        encoder.encode(&frame(i * 1_000)).expect("encode");
    }
    assert!(encoder.encode_queue_size() > 0);

    encoder.reset().expect("reset");
    assert_eq!(encoder.encode_queue_size(), 0);
}

#[test]
fn reconfigure_after_reset_behaves_like_fresh_instance() {
    let (encoder, _errors, outputs) = encoder_with(DummyVideoEncoder::factory());
    encoder.configure(config()).expect("configure");
    encoder.encode(&frame(0)).expect("encode");
    encoder.flush().wait_blocking().expect("flush resolves");
    assert_eq!(*outputs.lock().unwrap(), 1);

    encoder.reset().expect("reset");
    assert_eq!(encoder.state(), CodecState::Unconfigured);

    encoder.configure(config()).expect("reconfigure");
    encoder.encode(&frame(0)).expect("encode after reset");
    encoder.flush().wait_blocking().expect("flush resolves again");
    assert_eq!(*outputs.lock().unwrap(), 2);
}

#[test]
fn outputs_from_before_reset_are_discarded() {
    let factory: VideoEncoderBackendFactory =
        Arc::new(|| Box::new(DummyVideoEncoder::new().saturating_at(0, 10)) as _);
    let (encoder, _errors, outputs) = encoder_with(factory);
    encoder.configure(config()).expect("configure");
    encoder.encode(&frame(0)).expect("encode");
    // The worker is mid-retry on this frame; reset invalidates its epoch, so
    // whether the retry is abandoned or the frame completes, nothing reaches
    // the output callback.
    encoder.reset().expect("reset");
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(*outputs.lock().unwrap(), 0);
}

#[test]
fn fatal_error_rejects_pending_flush_with_same_kind() {
    // Frame 0 wedges the worker for ~50ms so the flush below is registered
    // before frame 1 brings the backend down.
    let factory: VideoEncoderBackendFactory = Arc::new(|| {
        Box::new(
            DummyVideoEncoder::new()
                .saturating_at(0, 100)
                .failing_at(1, "engine died"),
        ) as _
    });
    let (encoder, errors, _outputs) = encoder_with(factory);
    encoder.configure(config()).expect("configure");
    encoder.encode(&frame(0)).expect("encode accepted");
    encoder.encode(&frame(1_000)).expect("encode accepted");
    let pending = encoder.flush();

    let error = errors
        .recv_timeout(Duration::from_secs(2))
        .expect("error callback fires");
    assert_eq!(error.name(), "EncodingError");

    let err = pending.wait_blocking().expect_err("flush rejected");
    assert_eq!(err.name(), "EncodingError");
}

#[tokio::test]
async fn flush_handle_is_awaitable() {
    let (encoder, _errors, outputs) = encoder_with(DummyVideoEncoder::factory());
    encoder.configure(config()).expect("configure");
    encoder.encode(&frame(0)).expect("encode");
    encoder.flush().await.expect("flush resolves");
    assert_eq!(*outputs.lock().unwrap(), 1);
}
