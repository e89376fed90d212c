//! Audio playback to speakers

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Plays audio to the default output device
pub struct AudioPlayback {
    device: Device,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available. Fatal at startup.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self { device })
    }

    /// Name of the output device, for diagnostics
    #[must_use]
    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "unknown".to_string())
    }

    /// Play audio samples at the given sample rate, blocking until
    /// playback completes (with a generous timeout)
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output configuration exists or the
    /// stream fails
    #[allow(clippy::unused_async)]
    pub async fn play(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        self.play_samples_blocking(samples, sample_rate)
    }

    /// Play audio from WAV bytes
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub async fn play_wav(&mut self, wav_data: &[u8]) -> Result<()> {
        let (samples, sample_rate) = decode_wav(wav_data)?;
        self.play(samples, sample_rate).await
    }

    /// Play audio from MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub async fn play_mp3(&mut self, mp3_data: &[u8]) -> Result<()> {
        let (samples, sample_rate) = decode_mp3(mp3_data)?;
        self.play(samples, sample_rate).await
    }

    /// Find an output config supporting the requested rate, mono preferred
    fn output_config(&self, sample_rate: u32) -> Result<StreamConfig> {
        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .or_else(|| {
                // Fallback: try stereo
                self.device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(sample_rate)
                        && c.max_sample_rate() >= SampleRate(sample_rate)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        Ok(supported.with_sample_rate(SampleRate(sample_rate)).config())
    }

    /// Play samples in a blocking manner
    fn play_samples_blocking(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let config = self.output_config(sample_rate)?;
        let channels = config.channels as usize;

        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(Mutex::new(false));
        let finished_clone = Arc::clone(&finished);
        let position_clone = Arc::clone(&position);

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut pos) = position_clone.lock() else {
                        return;
                    };

                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < samples.len() {
                            samples[*pos]
                        } else {
                            if let Ok(mut done) = finished_clone.lock() {
                                *done = true;
                            }
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }

                        if *pos < samples.len() {
                            *pos += 1;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Poll for completion with a timeout past the nominal duration
        let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate);
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(duration_ms + 500);

        loop {
            if finished.lock().map(|done| *done).unwrap_or(true) {
                break;
            }
            if start.elapsed() > timeout {
                tracing::warn!("playback timed out, dropping stream");
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        // Small delay so the device drains its buffer
        std::thread::sleep(std::time::Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

/// Decode WAV bytes to f32 samples and the stream's sample rate.
/// Stereo input is averaged down to mono.
fn decode_wav(wav_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::new(Cursor::new(wav_data))
        .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();

    let mono: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => {
            let samples: Vec<f32> = reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?;
            downmix(&samples, spec.channels)
        }
        hound::SampleFormat::Int => {
            let max = f32::from(i16::MAX);
            let samples: Vec<f32> = reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) / max))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?;
            downmix(&samples, spec.channels)
        }
    };

    Ok((mono, spec.sample_rate))
}

/// Average interleaved channels down to mono
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return samples.to_vec();
    }

    #[allow(clippy::cast_precision_loss)]
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Decode MP3 bytes to f32 samples and the stream's sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                {
                    sample_rate = frame.sample_rate as u32;
                }

                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    // Stereo: average channels
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    // Mono
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(Error::Audio("empty MP3 stream".to_string()));
    }

    Ok((samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_round_trip_mono() {
        let original: Vec<f32> = (0..1600)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32 / 16000.0;
                (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
            })
            .collect();

        let wav = crate::voice::samples_to_wav(&original, 16000).unwrap();
        let (decoded, rate) = decode_wav(&wav).unwrap();

        assert_eq!(rate, 16000);
        assert_eq!(decoded.len(), original.len());
        for (a, b) in original.iter().zip(&decoded) {
            assert!((a - b).abs() < 0.001);
        }
    }

    #[test]
    fn test_downmix_stereo() {
        let stereo = [1.0, 0.0, 0.5, 0.5];
        let mono = downmix(&stereo, 2);
        assert_eq!(mono, vec![0.5, 0.5]);
    }
}
