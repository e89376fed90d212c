//! Shared test utilities

use parley::config::SAMPLE_RATE;

/// Generate sine wave audio samples
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Feed samples through an endpointer in 100ms chunks, collecting the
/// first event it produces
#[must_use]
pub fn feed_chunked(
    endpointer: &mut parley::voice::UtteranceEndpointer,
    samples: &[f32],
) -> Option<parley::voice::EndpointEvent> {
    let chunk_size = (SAMPLE_RATE / 10) as usize;
    for chunk in samples.chunks(chunk_size) {
        if let Some(event) = endpointer.feed(chunk) {
            return Some(event);
        }
    }
    None
}
