//! Sine tone synthesis
//!
//! Tones are short stereo sine bursts with a linear fade-in over the first 10% of
//! frames and a linear fade-out over the last 10%, which keeps the start and end
//! free of clicks.

use crate::audio::output::{AudioOutputWriter, BYTES_PER_FRAME};
use crate::error::{Error, Result};
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{debug, info};

/// Default peak amplitude, roughly half of full scale
pub const DEFAULT_AMPLITUDE: i16 = 16_000;

/// A single tone to synthesize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneRequest {
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

impl ToneRequest {
    pub fn new(frequency_hz: u32, duration_ms: u32) -> Self {
        Self {
            frequency_hz,
            duration_ms,
        }
    }

    /// Number of stereo frames at `sample_rate`
    pub fn frame_count(&self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.duration_ms as u64 / 1000) as usize
    }
}

/// Envelope gain for frame `index` of `total`.
///
/// Ramps 0→1 over the first tenth, holds 1, and ramps back toward 0 over the last
/// tenth. Tones shorter than ten frames have no ramp.
pub fn envelope_gain(index: usize, total: usize) -> f32 {
    let ramp = total / 10;
    if ramp == 0 {
        return 1.0;
    }

    if index < ramp {
        index as f32 / ramp as f32
    } else if index > total - ramp {
        (total - index) as f32 / ramp as f32
    } else {
        1.0
    }
}

/// Synthesize a tone as 16-bit little-endian interleaved stereo bytes.
///
/// Allocation is fallible: a failed reservation is reported as
/// [`Error::OutOfMemory`] rather than aborting.
pub fn synthesize(request: ToneRequest, sample_rate: u32, amplitude: i16) -> Result<Vec<u8>> {
    if request.frequency_hz == 0 || request.duration_ms == 0 {
        return Err(Error::InvalidInput(format!(
            "tone needs non-zero frequency and duration, got {}Hz/{}ms",
            request.frequency_hz, request.duration_ms
        )));
    }

    let frames = request.frame_count(sample_rate);
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(frames * BYTES_PER_FRAME)
        .map_err(|e| {
            Error::OutOfMemory(format!("tone buffer of {} frames: {}", frames, e))
        })?;

    let omega = 2.0 * PI * request.frequency_hz as f64;
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let value = (omega * t).sin() as f32 * amplitude as f32 * envelope_gain(i, frames);
        let sample = (value as i16).to_le_bytes();
        buffer.extend_from_slice(&sample); // left
        buffer.extend_from_slice(&sample); // right
    }

    Ok(buffer)
}

/// Zeroed stereo frames covering `duration_ms` at `sample_rate`.
pub fn silence(duration_ms: u32, sample_rate: u32) -> Result<Vec<u8>> {
    if duration_ms == 0 {
        return Err(Error::InvalidInput("silence needs a non-zero duration".to_string()));
    }

    let frames = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(frames * BYTES_PER_FRAME)
        .map_err(|e| Error::OutOfMemory(format!("silence buffer of {} frames: {}", frames, e)))?;
    buffer.resize(frames * BYTES_PER_FRAME, 0);
    Ok(buffer)
}

/// Generates tones and hands them to the output writer
pub struct ToneSynthesizer {
    output: Arc<AudioOutputWriter>,
    amplitude: i16,
}

impl ToneSynthesizer {
    pub fn new(output: Arc<AudioOutputWriter>, amplitude: i16) -> Self {
        Self { output, amplitude }
    }

    /// Synthesize and play one tone, returning once the whole buffer is written.
    ///
    /// Returns the number of bytes accepted by the output.
    pub fn generate(&self, frequency_hz: u32, duration_ms: u32) -> Result<usize> {
        let request = ToneRequest::new(frequency_hz, duration_ms);
        let sample_rate = self.output.sample_rate();

        let buffer = synthesize(request, sample_rate, self.amplitude)?;
        debug!("Synthesized {} frames for {}Hz", buffer.len() / BYTES_PER_FRAME, frequency_hz);

        let written = self.output.write(&buffer)?;
        info!(
            "Generated {}Hz tone for {}ms ({} bytes written)",
            frequency_hz, duration_ms, written
        );
        Ok(written)
    }

    /// Write `duration_ms` of silence so the pause is part of the output stream.
    pub fn pause(&self, duration_ms: u32) -> Result<usize> {
        let buffer = silence(duration_ms, self.output.sample_rate())?;
        let written = self.output.write(&buffer)?;
        debug!("Wrote {}ms of silence ({} bytes)", duration_ms, written);
        Ok(written)
    }

    pub fn output(&self) -> &Arc<AudioOutputWriter> {
        &self.output
    }
}
