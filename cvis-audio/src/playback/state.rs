//! Playback state

use serde::{Deserialize, Serialize};

/// Playback engine state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing playing; the drain task is parked
    #[default]
    Idle,
    /// A file is being streamed and drained
    Playing,
    /// Stop requested; pending audio is being discarded
    Stopping,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Playback counters for status reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStats {
    pub state: PlaybackState,

    /// Source payload bytes handed to the ring buffer over all sessions
    pub bytes_streamed: u64,

    /// Blocks dropped because the ring stayed full
    pub blocks_dropped: u64,

    /// Sessions started by `play`
    pub sessions: u64,
}
