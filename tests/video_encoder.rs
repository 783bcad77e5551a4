//! End-to-end VideoEncoder pipeline tests over the dummy backend.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use webcodec_core::codec::dummy::DummyVideoEncoder;
use webcodec_core::{
    AlphaOption, CodecState, EncodedVideoChunkMetadata, EncodedVideoChunk, EncodedVideoChunkType,
    ResourceManager, VideoEncoder, VideoEncoderConfig, VideoEncoderEncodeOptions, VideoFrame,
    VideoFrameInit, VideoPixelFormat, WebCodecsError,
};

type Collected = Arc<Mutex<Vec<(EncodedVideoChunk, EncodedVideoChunkMetadata)>>>;

fn test_manager() -> Arc<ResourceManager> {
    Arc::new(ResourceManager::new())
}

fn collecting_encoder(
    factory: webcodec_core::webcodecs::VideoEncoderBackendFactory,
) -> (VideoEncoder, Collected, mpsc::Receiver<WebCodecsError>) {
    let outputs: Collected = Arc::new(Mutex::new(Vec::new()));
    let (error_tx, error_rx) = mpsc::channel();
    let sink = outputs.clone();
    let encoder = VideoEncoder::with_resource_manager(
        factory,
        move |chunk, metadata| {
            sink.lock().unwrap().push((chunk, metadata));
        },
        move |error| {
            let _ = error_tx.send(error);
        },
        test_manager(),
    );
    (encoder, outputs, error_rx)
}

fn frame(timestamp: i64, rotation: u32) -> VideoFrame {
    VideoFrame::new(VideoFrameInit {
        format: VideoPixelFormat::I420,
        coded_width: 640,
        coded_height: 360,
        timestamp,
        duration: Some(33_333),
        rotation,
        flip: false,
        display_width: None,
        display_height: None,
        data: vec![0; VideoPixelFormat::I420.byte_length(640, 360)],
    })
    .expect("valid frame")
}

fn vp8_config() -> VideoEncoderConfig {
    VideoEncoderConfig {
        codec: "vp8".to_string(),
        width: 640,
        height: 360,
        display_width: Some(640),
        display_height: Some(360),
        scalability_mode: Some("L1T1".to_string()),
        alpha: AlphaOption::Discard,
        ..VideoEncoderConfig::default()
    }
}

#[test]
fn configure_encode_flush_close() {
    let (encoder, outputs, _errors) = collecting_encoder(DummyVideoEncoder::factory());

    encoder.configure(vp8_config()).expect("configure");
    encoder
        .encode_with_options(
            &frame(0, 0),
            VideoEncoderEncodeOptions {
                key_frame: Some(false),
            },
        )
        .expect("encode");

    encoder.flush().wait_blocking().expect("flush resolves");

    let collected = outputs.lock().unwrap();
    assert_eq!(collected.len(), 1);
    let (chunk, metadata) = &collected[0];
    // The backend upgrades the first frame of the stream to a key frame.
    assert_eq!(chunk.chunk_type(), EncodedVideoChunkType::Key);
    assert_eq!(chunk.timestamp(), 0);
    assert_eq!(chunk.duration(), Some(33_333));
    let config = metadata
        .decoder_config
        .as_ref()
        .expect("first chunk carries a decoder config");
    assert_eq!(config.codec, "vp8");
    assert_eq!(config.coded_width, Some(640));
    assert_eq!(config.display_aspect_width, Some(640));
    drop(collected);

    encoder.close();
    assert_eq!(encoder.state(), CodecState::Closed);
    // Idempotent.
    encoder.close();
    assert_eq!(encoder.state(), CodecState::Closed);
}

#[test]
fn decoder_config_emitted_once_per_change() {
    let (encoder, outputs, _errors) = collecting_encoder(DummyVideoEncoder::factory());
    encoder.configure(vp8_config()).expect("configure");
    for i in 0..4 {
        encoder.encode(&frame(i * 33_333, 0)).expect("encode");
    }
    encoder.flush().wait_blocking().expect("flush resolves");

    let collected = outputs.lock().unwrap();
    assert_eq!(collected.len(), 4);
    assert!(collected[0].1.decoder_config.is_some());
    for (_, metadata) in collected.iter().skip(1) {
        assert!(metadata.decoder_config.is_none());
    }
}

#[test]
fn orientation_mismatch_fails_with_data_error() {
    let (encoder, _outputs, _errors) = collecting_encoder(DummyVideoEncoder::factory());
    encoder.configure(vp8_config()).expect("configure");
    encoder.encode(&frame(0, 0)).expect("first frame accepted");

    let size_before = encoder.encode_queue_size();
    let err = encoder
        .encode(&frame(33_333, 90))
        .expect_err("rotated frame rejected");
    assert_eq!(err.name(), "DataError");
    assert_eq!(encoder.encode_queue_size(), size_before);
}

#[test]
fn detached_frame_fails_with_type_error() {
    let (encoder, _outputs, _errors) = collecting_encoder(DummyVideoEncoder::factory());
    encoder.configure(vp8_config()).expect("configure");

    let detached = frame(0, 0);
    detached.close();
    let err = encoder.encode(&detached).expect_err("detached rejected");
    assert_eq!(err.name(), "TypeError");
}

#[test]
fn encode_on_unconfigured_fails_with_invalid_state() {
    let (encoder, _outputs, _errors) = collecting_encoder(DummyVideoEncoder::factory());
    let err = encoder.encode(&frame(0, 0)).expect_err("not configured");
    assert_eq!(err.name(), "InvalidStateError");
    assert_eq!(encoder.encode_queue_size(), 0);
}

#[test]
fn outputs_arrive_in_submission_order() {
    let (encoder, outputs, _errors) = collecting_encoder(DummyVideoEncoder::factory());
    encoder.configure(vp8_config()).expect("configure");
    for i in 0..50 {
        encoder.encode(&frame(i * 1_000, 0)).expect("encode");
    }
    encoder.flush().wait_blocking().expect("flush resolves");

    let collected = outputs.lock().unwrap();
    assert_eq!(collected.len(), 50);
    let timestamps: Vec<i64> = collected.iter().map(|(chunk, _)| chunk.timestamp()).collect();
    let mut sorted = timestamps.clone();
    sorted.sort_unstable();
    assert_eq!(timestamps, sorted);
}

#[test]
fn saturation_backpressure_stalls_and_drains_in_order() {
    let factory: webcodec_core::webcodecs::VideoEncoderBackendFactory = Arc::new(|| {
        // Frame 1 is rejected 100 times (~50ms) before being accepted.
        Box::new(DummyVideoEncoder::new().saturating_at(1, 100)) as _
    });
    let (encoder, outputs, _errors) = collecting_encoder(factory);

    let dequeue_events = Arc::new(Mutex::new(Vec::new()));
    let dequeue_log = dequeue_events.clone();
    encoder.set_ondequeue(Some(move |size| {
        dequeue_log.lock().unwrap().push(size);
    }));

    encoder.configure(vp8_config()).expect("configure");
    encoder.encode(&frame(0, 0)).expect("frame 0");
    encoder.encode(&frame(1_000, 0)).expect("frame 1");
    // Give the worker time to report saturation before queueing the rest.
    std::thread::sleep(Duration::from_millis(20));
    for i in 2..6 {
        encoder.encode(&frame(i * 1_000, 0)).expect("queued frame");
    }
    // Saturated: accepted inputs stay in the control queue undispatched.
    assert_eq!(encoder.encode_queue_size(), 4);

    encoder.flush().wait_blocking().expect("flush resolves");
    assert_eq!(encoder.encode_queue_size(), 0);

    let collected = outputs.lock().unwrap();
    assert_eq!(collected.len(), 6);
    let timestamps: Vec<i64> = collected.iter().map(|(chunk, _)| chunk.timestamp()).collect();
    let mut sorted = timestamps.clone();
    sorted.sort_unstable();
    assert_eq!(timestamps, sorted);
    drop(collected);

    // The four stalled decrements coalesce into a single dequeue event.
    let events = dequeue_events.lock().unwrap();
    assert!(!events.is_empty());
    assert!(events.len() <= 3, "expected coalesced events, got {events:?}");
    assert_eq!(*events.last().unwrap(), 0);
}

#[test]
fn svc_metadata_present_with_temporal_layers() {
    let (encoder, outputs, _errors) = collecting_encoder(DummyVideoEncoder::factory());
    let config = VideoEncoderConfig {
        scalability_mode: Some("L1T2".to_string()),
        ..vp8_config()
    };
    encoder.configure(config).expect("configure");
    for i in 0..4 {
        encoder.encode(&frame(i * 1_000, 0)).expect("encode");
    }
    encoder.flush().wait_blocking().expect("flush resolves");

    let collected = outputs.lock().unwrap();
    assert_eq!(collected.len(), 4);
    let layers: Vec<u32> = collected
        .iter()
        .map(|(_, metadata)| metadata.svc.as_ref().expect("svc metadata").temporal_layer_id)
        .collect();
    assert_eq!(layers, vec![0, 1, 0, 1]);
}

#[test]
fn keep_alpha_attaches_side_data() {
    let (encoder, outputs, _errors) = collecting_encoder(DummyVideoEncoder::factory());
    let config = VideoEncoderConfig {
        alpha: AlphaOption::Keep,
        ..vp8_config()
    };
    encoder.configure(config).expect("configure");

    let alpha_frame = VideoFrame::new(VideoFrameInit {
        format: VideoPixelFormat::I420A,
        coded_width: 640,
        coded_height: 360,
        timestamp: 0,
        duration: None,
        rotation: 0,
        flip: false,
        display_width: None,
        display_height: None,
        data: vec![0; VideoPixelFormat::I420A.byte_length(640, 360)],
    })
    .expect("valid frame");
    encoder.encode(&alpha_frame).expect("encode");
    encoder.flush().wait_blocking().expect("flush resolves");

    let collected = outputs.lock().unwrap();
    assert_eq!(collected.len(), 1);
    assert!(collected[0].1.alpha_side_data.is_some());
}

#[test]
fn backend_failure_closes_with_encoding_error() {
    let factory: webcodec_core::webcodecs::VideoEncoderBackendFactory =
        Arc::new(|| Box::new(DummyVideoEncoder::new().failing_at(0, "bitstream corrupted")) as _);
    let (encoder, _outputs, errors) = collecting_encoder(factory);

    encoder.configure(vp8_config()).expect("configure");
    encoder.encode(&frame(0, 0)).expect("encode accepted");

    let error = errors
        .recv_timeout(Duration::from_secs(2))
        .expect("error callback fires");
    assert_eq!(error.name(), "EncodingError");

    // The instance settles in Closed; later calls fail with InvalidStateError.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while encoder.state() != CodecState::Closed {
        assert!(std::time::Instant::now() < deadline, "never closed");
        std::thread::sleep(Duration::from_millis(5));
    }
    let err = encoder.encode(&frame(0, 0)).expect_err("closed");
    assert_eq!(err.name(), "InvalidStateError");
}

#[test]
fn unsupported_codec_closes_with_not_supported_error() {
    let (encoder, _outputs, errors) = collecting_encoder(DummyVideoEncoder::factory());
    let config = VideoEncoderConfig {
        codec: "unsupported-codec".to_string(),
        ..vp8_config()
    };
    encoder.configure(config).expect("configure is accepted");

    let error = errors
        .recv_timeout(Duration::from_secs(2))
        .expect("error callback fires");
    assert_eq!(error.name(), "NotSupportedError");
}
