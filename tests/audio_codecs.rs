//! End-to-end AudioEncoder / AudioDecoder pipeline tests.

use std::sync::{Arc, Mutex};

use webcodec_core::codec::dummy::{DummyAudioDecoder, DummyAudioEncoder};
use webcodec_core::{
    AudioData, AudioDataInit, AudioDecoder, AudioDecoderConfig, AudioEncoder, AudioEncoderConfig,
    AudioSampleFormat, EncodedAudioChunk, EncodedAudioChunkInit, EncodedAudioChunkType,
    ResourceManager,
};

fn audio_buffer(timestamp: i64) -> AudioData {
    AudioData::new(AudioDataInit {
        format: AudioSampleFormat::F32,
        sample_rate: 48_000,
        number_of_frames: 480,
        number_of_channels: 2,
        timestamp,
        data: vec![0; 480 * 2 * 4],
    })
    .expect("valid audio buffer")
}

fn encoder_config() -> AudioEncoderConfig {
    AudioEncoderConfig {
        codec: "opus".to_string(),
        sample_rate: 48_000,
        number_of_channels: 2,
        ..AudioEncoderConfig::default()
    }
}

fn decoder_config() -> AudioDecoderConfig {
    AudioDecoderConfig {
        codec: "opus".to_string(),
        sample_rate: 48_000,
        number_of_channels: 2,
        description: None,
    }
}

#[test]
fn encode_emits_chunks_with_config_on_first() {
    let outputs = Arc::new(Mutex::new(Vec::new()));
    let sink = outputs.clone();
    let encoder = AudioEncoder::with_resource_manager(
        DummyAudioEncoder::factory(),
        move |chunk, metadata| {
            sink.lock().unwrap().push((chunk, metadata));
        },
        |error| panic!("unexpected encoder error: {error}"),
        Arc::new(ResourceManager::new()),
    );

    encoder.configure(encoder_config()).expect("configure");
    for i in 0..3 {
        encoder.encode(&audio_buffer(i * 10_000)).expect("encode");
    }
    encoder.flush().wait_blocking().expect("flush resolves");

    let collected = outputs.lock().unwrap();
    assert_eq!(collected.len(), 3);

    let config = collected[0]
        .1
        .decoder_config
        .as_ref()
        .expect("first chunk carries a decoder config");
    assert_eq!(config.codec, "opus");
    assert_eq!(config.sample_rate, 48_000);
    assert_eq!(config.number_of_channels, 2);
    for (_, metadata) in collected.iter().skip(1) {
        assert!(metadata.decoder_config.is_none());
    }

    let timestamps: Vec<i64> = collected.iter().map(|(chunk, _)| chunk.timestamp()).collect();
    assert_eq!(timestamps, vec![0, 10_000, 20_000]);
}

#[test]
fn detached_audio_fails_with_type_error() {
    let encoder = AudioEncoder::with_resource_manager(
        DummyAudioEncoder::factory(),
        |_chunk, _metadata| {},
        |error| panic!("unexpected encoder error: {error}"),
        Arc::new(ResourceManager::new()),
    );
    encoder.configure(encoder_config()).expect("configure");

    let buffer = audio_buffer(0);
    buffer.close();
    let err = encoder.encode(&buffer).expect_err("detached rejected");
    assert_eq!(err.name(), "TypeError");
}

#[test]
fn audio_decoder_first_chunk_must_be_key() {
    let decoder = AudioDecoder::with_resource_manager(
        DummyAudioDecoder::factory(),
        |_data| {},
        |error| panic!("unexpected decoder error: {error}"),
        Arc::new(ResourceManager::new()),
    );
    decoder.configure(decoder_config()).expect("configure");

    let delta = EncodedAudioChunk::new(EncodedAudioChunkInit {
        chunk_type: EncodedAudioChunkType::Delta,
        timestamp: 0,
        duration: Some(10_000),
        data: vec![1, 2, 3],
    })
    .expect("valid chunk");
    let err = decoder.decode(&delta).expect_err("delta first chunk rejected");
    assert_eq!(err.name(), "DataError");
    assert_eq!(decoder.decode_queue_size(), 0);
}

#[test]
fn decode_produces_buffers_at_configured_rate() {
    let outputs = Arc::new(Mutex::new(Vec::new()));
    let sink = outputs.clone();
    let decoder = AudioDecoder::with_resource_manager(
        DummyAudioDecoder::factory(),
        move |data| {
            sink.lock().unwrap().push(data);
        },
        |error| panic!("unexpected decoder error: {error}"),
        Arc::new(ResourceManager::new()),
    );
    decoder.configure(decoder_config()).expect("configure");

    let key = EncodedAudioChunk::new(EncodedAudioChunkInit {
        chunk_type: EncodedAudioChunkType::Key,
        timestamp: 7_000,
        duration: Some(10_000),
        data: vec![1, 2, 3],
    })
    .expect("valid chunk");
    decoder.decode(&key).expect("decode");
    decoder.flush().wait_blocking().expect("flush resolves");

    let collected = outputs.lock().unwrap();
    assert_eq!(collected.len(), 1);
    let data = &collected[0];
    assert_eq!(data.sample_rate().unwrap(), 48_000);
    assert_eq!(data.number_of_channels().unwrap(), 2);
    assert_eq!(data.timestamp().unwrap(), 7_000);
}

#[test]
fn structurally_invalid_configs_fail_synchronously() {
    let encoder = AudioEncoder::with_resource_manager(
        DummyAudioEncoder::factory(),
        |_chunk, _metadata| {},
        |_error| {},
        Arc::new(ResourceManager::new()),
    );
    let err = encoder
        .configure(AudioEncoderConfig {
            codec: String::new(),
            sample_rate: 48_000,
            number_of_channels: 2,
            ..AudioEncoderConfig::default()
        })
        .expect_err("empty codec rejected");
    assert_eq!(err.name(), "TypeError");

    let decoder = AudioDecoder::with_resource_manager(
        DummyAudioDecoder::factory(),
        |_data| {},
        |_error| {},
        Arc::new(ResourceManager::new()),
    );
    let err = decoder
        .configure(AudioDecoderConfig {
            codec: "opus".to_string(),
            sample_rate: 0,
            number_of_channels: 2,
            description: None,
        })
        .expect_err("zero sample rate rejected");
    assert_eq!(err.name(), "TypeError");
}
