//! File playback through a bounded ring buffer

pub mod engine;
pub mod ring_buffer;
pub mod state;

pub use engine::PlaybackEngine;
pub use ring_buffer::{ByteRingBuffer, OfferResult, RingBufferStats};
pub use state::{PlaybackState, PlaybackStats};
