//! Audio test file generation
//!
//! Deterministic WAV fixtures for the playback tests. Well-formed files are
//! written with hound; files with hand-made headers (bad tags, lying lengths)
//! are written byte by byte.

use cvis_audio::audio::AudioHeader;
use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Write;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Generate a 16-bit sine WAV file.
///
/// Returns the payload length in bytes.
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    sample_rate: u32,
    duration_ms: u64,
    frequency_hz: f32,
) -> Result<u32, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;
    let amplitude = i16::MAX as f32 * 0.5;

    for frame_idx in 0..total_frames {
        let t = frame_idx as f32 / sample_rate as f32;
        let sample = ((2.0 * PI * frequency_hz * t).sin() * amplitude) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok((total_frames * channels as u64 * 2) as u32)
}

/// Write `header` followed by `payload` verbatim
pub fn generate_wav_with_header<P: AsRef<Path>>(
    path: P,
    header: &AudioHeader,
    payload: &[u8],
) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(&header.to_bytes())?;
    file.write_all(payload)?;
    file.flush()
}

/// Mono payload of `samples` distinct 16-bit values
pub fn mono_ramp_payload(samples: usize) -> Vec<u8> {
    (0..samples)
        .flat_map(|i| (i as u16 as i16).to_le_bytes())
        .collect()
}
