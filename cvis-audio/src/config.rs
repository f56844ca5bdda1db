//! cvis-audio specific configuration
//!
//! Every field has a compiled default, so a config file only needs to name the
//! values it overrides:
//!
//! ```toml
//! queue_capacity = 5
//! ring_capacity_bytes = 16384
//! ring_offer_timeout_ms = 100
//! consumer_core = 0
//! ```

use crate::error::{Error, Result};
use cvis_common::config::{load_or_default, CONFIG_ENV_VAR};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default output sample rate of the physical audio channel
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// Output channel count (interleaved stereo)
pub const OUTPUT_CHANNELS: u16 = 2;

/// Audio feedback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Detection queue capacity (results)
    pub queue_capacity: usize,

    /// Playback ring buffer capacity in bytes
    pub ring_capacity_bytes: usize,

    /// Source read block size in bytes
    pub read_block_bytes: usize,

    /// Bounded wait for a ring buffer offer before the block is dropped
    pub ring_offer_timeout_ms: u64,

    /// Output sample rate in Hz
    pub output_sample_rate: u32,

    /// Peak amplitude of synthesized tones (i16 scale)
    pub tone_amplitude: i16,

    /// Interval between frame captures in the producer context
    pub frame_interval_ms: u64,

    /// Interval between status reports
    pub status_interval_secs: u64,

    /// Core for the producer context (frame capture + recognition)
    pub producer_core: Option<usize>,

    /// Core for the consumer context (feedback dispatch + playback drain)
    pub consumer_core: Option<usize>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 5,
            ring_capacity_bytes: 16 * 1024,
            read_block_bytes: 4096,
            ring_offer_timeout_ms: 100,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            tone_amplitude: 16_000,
            frame_interval_ms: 500,
            status_interval_secs: 10,
            producer_core: Some(1),
            consumer_core: Some(0),
        }
    }
}

impl AudioConfig {
    /// Load configuration following the shared resolution order, then validate.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config: AudioConfig = load_or_default(cli_path, CONFIG_ENV_VAR)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".to_string()));
        }
        if self.ring_capacity_bytes == 0 {
            return Err(Error::Config("ring_capacity_bytes must be at least 1".to_string()));
        }
        if self.read_block_bytes < 2 {
            return Err(Error::Config(
                "read_block_bytes must hold at least one 16-bit sample".to_string(),
            ));
        }
        // Mono up-mix works on whole samples; an odd block splits one
        if self.read_block_bytes % 2 != 0 {
            return Err(Error::Config(format!(
                "read_block_bytes ({}) must be a whole number of 16-bit samples",
                self.read_block_bytes
            )));
        }
        // A mono block doubles in size after up-mix and must still fit the ring
        if self.read_block_bytes * 2 > self.ring_capacity_bytes {
            return Err(Error::Config(format!(
                "ring_capacity_bytes ({}) must hold two read blocks ({})",
                self.ring_capacity_bytes,
                self.read_block_bytes * 2
            )));
        }
        if self.output_sample_rate == 0 {
            return Err(Error::Config("output_sample_rate must be non-zero".to_string()));
        }
        if self.tone_amplitude <= 0 {
            return Err(Error::Config("tone_amplitude must be positive".to_string()));
        }
        if self.status_interval_secs == 0 {
            return Err(Error::Config("status_interval_secs must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn ring_offer_timeout(&self) -> Duration {
        Duration::from_millis(self.ring_offer_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_device_reference() {
        let config = AudioConfig::default();
        assert_eq!(config.queue_capacity, 5);
        assert_eq!(config.ring_capacity_bytes, 16384);
        assert_eq!(config.read_block_bytes, 4096);
        assert_eq!(config.ring_offer_timeout(), Duration::from_millis(100));
        assert_eq!(config.output_sample_rate, 44100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AudioConfig = toml::from_str("queue_capacity = 8\nconsumer_core = 2\n").unwrap();
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.consumer_core, Some(2));
        assert_eq!(config.ring_capacity_bytes, 16384);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = AudioConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_tiny_read_block_rejected() {
        let config = AudioConfig {
            read_block_bytes: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_odd_read_block_rejected() {
        let config = AudioConfig {
            read_block_bytes: 4095,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
