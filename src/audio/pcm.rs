use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Duration;

use super::PlaybackError;
use crate::llm::DataUri;

/// Rate of the PCM the speech model returns.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Mono float samples in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl PcmClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Accepts either a bare base64 payload or a full data-URI.
    pub fn from_base64(payload: &str) -> Result<Self, PlaybackError> {
        let payload = payload.trim();
        let encoded = if payload.starts_with("data:") {
            DataUri::parse(payload)
                .map_err(|e| PlaybackError::Decode(e.to_string()))?
                .data
        } else {
            payload.to_string()
        };
        let bytes = STANDARD.decode(encoded).map_err(|e| PlaybackError::Decode(e.to_string()))?;
        Ok(Self::new(decode_samples(&bytes), SPEECH_SAMPLE_RATE))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Same clip at another rate.
    pub fn resampled(&self, target_rate: u32) -> PcmClip {
        PcmClip::new(resample_linear(&self.samples, self.sample_rate, target_rate), target_rate)
    }
}

/// Signed 16-bit little-endian samples scaled by 1/32768. A trailing odd
/// byte is dropped.
pub fn decode_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| (i16::from_le_bytes([pair[0], pair[1]]) as f32) / 32768.0)
        .collect()
}

pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}
