//! # Companion Vision audio feedback (cvis-audio)
//!
//! Real-time audio path of the wearable reading aid: recognized text snippets
//! arrive on a bounded queue and are announced as short language-keyed beep
//! patterns, while WAV prompts stream through a bounded ring buffer to the same
//! output channel.
//!
//! **Architecture:** producer thread (capture + recognition) → [`feedback::DetectionQueue`]
//! → [`feedback::FeedbackDispatcher`] → [`audio::ToneSynthesizer`] → [`audio::AudioOutputWriter`],
//! with [`playback::PlaybackEngine`] feeding the writer from its own drain thread.

pub mod affinity;
pub mod audio;
pub mod config;
pub mod error;
pub mod feedback;
pub mod playback;
pub mod recognition;
pub mod status;
pub mod transport;

pub use config::AudioConfig;
pub use error::{Error, Result};
