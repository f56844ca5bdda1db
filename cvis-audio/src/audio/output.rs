//! Audio output writer
//!
//! The physical output channel is a single shared resource fed by two pipelines:
//! the feedback tone path and the playback drain task. [`AudioOutputWriter`]
//! serializes them: each `write` holds the sink for the whole block, so blocks
//! from different callers never interleave.
//!
//! Sinks accept raw 16-bit little-endian interleaved stereo bytes at the fixed
//! output rate and block until the device takes the full block.

use crate::config::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::{Error, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Bytes per interleaved stereo frame (2 channels x 16 bits)
pub const BYTES_PER_FRAME: usize = 4;

/// Destination for interleaved 16-bit stereo PCM
pub trait AudioSink: Send {
    /// Write one block, blocking until the device accepts it.
    ///
    /// Returns the number of bytes accepted.
    fn write(&mut self, block: &[u8]) -> Result<usize>;

    /// Fixed sample rate of the device
    fn sample_rate(&self) -> u32 {
        OUTPUT_SAMPLE_RATE
    }

    /// Human-readable device name for logs
    fn name(&self) -> &str;
}

/// Serialized writer over the single output sink
pub struct AudioOutputWriter {
    sink: Mutex<Box<dyn AudioSink>>,
    sample_rate: u32,
    bytes_written: AtomicU64,
    blocks_written: AtomicU64,
    write_errors: AtomicU64,
}

impl AudioOutputWriter {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        let sample_rate = sink.sample_rate();
        info!("Audio output ready: {} @ {} Hz", sink.name(), sample_rate);

        Self {
            sink: Mutex::new(sink),
            sample_rate,
            bytes_written: AtomicU64::new(0),
            blocks_written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    /// Write a full block to the sink.
    ///
    /// Blocks other writers until this block has been accepted. Returns the number
    /// of bytes the sink accepted.
    pub fn write(&self, block: &[u8]) -> Result<usize> {
        if block.is_empty() {
            return Ok(0);
        }
        if block.len() % BYTES_PER_FRAME != 0 {
            trace!("Writing {} bytes, not a whole number of stereo frames", block.len());
        }

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.write(block) {
            Ok(accepted) => {
                self.bytes_written.fetch_add(accepted as u64, Ordering::Relaxed);
                self.blocks_written.fetch_add(1, Ordering::Relaxed);
                if accepted < block.len() {
                    warn!("Audio sink accepted {} of {} bytes", accepted, block.len());
                }
                Ok(accepted)
            }
            Err(e) => {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn stats(&self) -> OutputStats {
        OutputStats {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Output counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStats {
    pub bytes_written: u64,
    pub blocks_written: u64,
    pub write_errors: u64,
}

/// Playback duration of `bytes` of stereo 16-bit audio at `sample_rate`
pub fn block_duration(bytes: usize, sample_rate: u32) -> Duration {
    let frames = (bytes / BYTES_PER_FRAME) as u64;
    Duration::from_micros(frames * 1_000_000 / sample_rate.max(1) as u64)
}

/// Sink that discards audio at real-time pace.
///
/// Sleeps for the block's playback duration so callers observe the same
/// blocking behavior as a fixed-rate device.
pub struct NullSink {
    sample_rate: u32,
    paced: bool,
}

impl NullSink {
    /// Real-time paced sink
    pub fn paced(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            paced: true,
        }
    }

    /// Sink that accepts immediately
    pub fn unpaced(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            paced: false,
        }
    }
}

impl AudioSink for NullSink {
    fn write(&mut self, block: &[u8]) -> Result<usize> {
        if self.paced {
            std::thread::sleep(block_duration(block.len(), self.sample_rate));
        }
        Ok(block.len())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Sink recording the output stream to a 16-bit stereo WAV file
pub struct WavFileSink {
    writer: Option<hound::WavWriter<std::io::BufWriter<std::fs::File>>>,
    sample_rate: u32,
    name: String,
}

impl WavFileSink {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: OUTPUT_CHANNELS,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(path, spec).map_err(|e| {
            Error::AudioOutput(format!("Failed to create {}: {}", path.display(), e))
        })?;

        debug!("Recording audio output to {}", path.display());

        Ok(Self {
            writer: Some(writer),
            sample_rate,
            name: format!("wav:{}", path.display()),
        })
    }

    /// Flush and close the file, patching the header lengths.
    pub fn finalize(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| Error::AudioOutput(format!("Failed to finalize WAV: {}", e)))?;
        }
        Ok(())
    }
}

impl AudioSink for WavFileSink {
    fn write(&mut self, block: &[u8]) -> Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::AudioOutput("WAV sink already finalized".to_string()))?;

        let mut accepted = 0;
        for sample in block.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .map_err(|e| Error::AudioOutput(format!("WAV write failed: {}", e)))?;
            accepted += 2;
        }
        Ok(accepted)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WavFileSink {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            warn!("{}", e);
        }
    }
}
