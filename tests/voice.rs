//! Voice pipeline integration tests
//!
//! Tests utterance endpointing and WAV handling without audio hardware

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use parley::config::SAMPLE_RATE;
use parley::voice::{EndpointEvent, EndpointState, UtteranceEndpointer, samples_to_wav};

mod common;

use common::{feed_chunked, generate_silence, generate_sine_samples};

#[test]
fn test_endpointer_starts_idle() {
    let ep = UtteranceEndpointer::with_thresholds(0.8, 20.0);
    assert_eq!(ep.state(), EndpointState::Idle);
}

#[test]
fn test_silence_does_not_start_recording() {
    let mut ep = UtteranceEndpointer::with_thresholds(0.8, 20.0);

    let event = feed_chunked(&mut ep, &generate_silence(1.0));
    assert_eq!(event, None);
    assert_eq!(ep.state(), EndpointState::Idle);
}

#[test]
fn test_speech_starts_recording() {
    let mut ep = UtteranceEndpointer::with_thresholds(0.8, 20.0);

    let event = feed_chunked(&mut ep, &generate_sine_samples(440.0, 0.5, 0.3));
    assert_eq!(event, None);
    assert_eq!(ep.state(), EndpointState::Recording);
}

#[test]
fn test_utterance_ends_on_trailing_silence() {
    let mut ep = UtteranceEndpointer::with_thresholds(0.5, 20.0);

    // One second of speech, then silence past the threshold
    assert_eq!(feed_chunked(&mut ep, &generate_sine_samples(440.0, 1.0, 0.3)), None);
    let event = feed_chunked(&mut ep, &generate_silence(1.0));

    match event {
        Some(EndpointEvent::Utterance(samples)) => {
            // The utterance holds the speech plus roughly the configured
            // trailing silence, never more
            assert!(samples.len() >= SAMPLE_RATE as usize);
            assert!(samples.len() <= 2 * SAMPLE_RATE as usize);
        }
        other => panic!("expected utterance, got {other:?}"),
    }
    assert_eq!(ep.state(), EndpointState::Idle);
}

#[test]
fn test_endpointer_returns_within_silence_threshold() {
    // With threshold T, the boundary fires within T + one chunk of the
    // last speech sample
    let threshold = 0.5;
    let mut ep = UtteranceEndpointer::with_thresholds(threshold, 20.0);

    assert_eq!(feed_chunked(&mut ep, &generate_sine_samples(440.0, 1.0, 0.3)), None);

    let chunk_size = (SAMPLE_RATE / 10) as usize;
    let silence = generate_silence(2.0);
    let mut fed = 0usize;
    let mut completed_at = None;
    for chunk in silence.chunks(chunk_size) {
        fed += chunk.len();
        if let Some(EndpointEvent::Utterance(_)) = ep.feed(chunk) {
            completed_at = Some(fed);
            break;
        }
    }

    let epsilon = chunk_size;
    let limit = (threshold * SAMPLE_RATE as f32) as usize + epsilon;
    assert!(
        completed_at.expect("utterance never completed") <= limit,
        "endpointer took too long to cut the utterance"
    );
}

#[test]
fn test_utterance_ends_at_max_duration() {
    // Continuous speech with no silence still ends at the hard cap
    let mut ep = UtteranceEndpointer::with_thresholds(0.8, 2.0);

    let event = feed_chunked(&mut ep, &generate_sine_samples(440.0, 4.0, 0.3));
    match event {
        Some(EndpointEvent::Utterance(samples)) => {
            // Cap plus at most one chunk of slack
            assert!(samples.len() <= 2 * SAMPLE_RATE as usize + (SAMPLE_RATE / 10) as usize);
        }
        other => panic!("expected utterance at duration cap, got {other:?}"),
    }
}

#[test]
fn test_short_blip_is_discarded() {
    let mut ep = UtteranceEndpointer::with_thresholds(0.5, 20.0);

    // A 0.1s cough followed by silence: too short to transcribe
    assert_eq!(feed_chunked(&mut ep, &generate_sine_samples(440.0, 0.1, 0.3)), None);
    let event = feed_chunked(&mut ep, &generate_silence(1.0));

    assert_eq!(event, Some(EndpointEvent::TooShort));
    assert_eq!(ep.state(), EndpointState::Idle);
}

#[test]
fn test_no_speech_window_fires() {
    let mut ep = UtteranceEndpointer::with_thresholds(0.8, 20.0);

    // Well past the bounded wait window
    let event = feed_chunked(&mut ep, &generate_silence(11.0));
    assert_eq!(event, Some(EndpointEvent::NoSpeech));
}

#[test]
fn test_reset_returns_to_idle() {
    let mut ep = UtteranceEndpointer::with_thresholds(0.8, 20.0);

    feed_chunked(&mut ep, &generate_sine_samples(440.0, 0.5, 0.3));
    assert_eq!(ep.state(), EndpointState::Recording);

    ep.reset();
    assert_eq!(ep.state(), EndpointState::Idle);
}

#[test]
fn test_samples_to_wav_header() {
    let samples = generate_sine_samples(440.0, 0.25, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // RIFF/WAVE magic plus one i16 per sample
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    assert!(wav.len() > samples.len() * 2);
}
