//! Audio output capture for integration tests
//!
//! Records every block handed to the output writer, with the time it arrived,
//! so tests can check block sizes, sample content and gaps between tones.

use cvis_audio::audio::AudioSink;
use cvis_audio::Result;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One block as written to the output
#[derive(Debug, Clone)]
pub struct CapturedBlock {
    pub bytes: Vec<u8>,
    pub started: Instant,
    pub finished: Instant,
}

impl CapturedBlock {
    /// Left-channel samples
    pub fn left(&self) -> Vec<i16> {
        self.bytes
            .chunks_exact(4)
            .map(|f| i16::from_le_bytes([f[0], f[1]]))
            .collect()
    }

    pub fn frames(&self) -> usize {
        self.bytes.len() / 4
    }
}

/// Shared capture buffer; clone it before boxing the sink
#[derive(Clone, Default)]
pub struct AudioCapture {
    blocks: Arc<Mutex<Vec<CapturedBlock>>>,
    pace: Option<u32>,
}

impl AudioCapture {
    /// Capture that accepts blocks immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture that sleeps for each block's real-time duration at `sample_rate`
    pub fn paced(sample_rate: u32) -> Self {
        Self {
            blocks: Arc::default(),
            pace: Some(sample_rate),
        }
    }

    pub fn sink(&self) -> Box<dyn AudioSink> {
        Box::new(self.clone())
    }

    pub fn blocks(&self) -> Vec<CapturedBlock> {
        self.blocks.lock().unwrap().clone()
    }

    pub fn total_bytes(&self) -> usize {
        self.blocks.lock().unwrap().iter().map(|b| b.bytes.len()).sum()
    }

    /// All captured bytes in arrival order
    pub fn concatenated(&self) -> Vec<u8> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .flat_map(|b| b.bytes.iter().copied())
            .collect()
    }

    /// Poll until `total_bytes() >= bytes` or the timeout passes
    pub fn wait_for_bytes(&self, bytes: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.total_bytes() >= bytes {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        self.total_bytes() >= bytes
    }
}

impl AudioSink for AudioCapture {
    fn write(&mut self, block: &[u8]) -> Result<usize> {
        let started = Instant::now();
        if let Some(rate) = self.pace {
            let frames = (block.len() / 4) as u64;
            std::thread::sleep(Duration::from_micros(frames * 1_000_000 / rate as u64));
        }
        self.blocks.lock().unwrap().push(CapturedBlock {
            bytes: block.to_vec(),
            started,
            finished: Instant::now(),
        });
        Ok(block.len())
    }

    fn name(&self) -> &str {
        "capture"
    }
}
