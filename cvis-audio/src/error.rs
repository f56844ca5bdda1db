//! Error types for cvis-audio
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the audio feedback subsystem
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio container header failed validation
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    /// Malformed caller arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Detection queue at capacity; the new result was dropped
    #[error("Detection queue full (capacity {0})")]
    QueueFull(usize),

    /// Sample buffer allocation failed
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Hardware or transport feature unavailable on this device
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Errors from the shared crate
    #[error(transparent)]
    Common(#[from] cvis_common::Error),
}

/// Convenience Result type using cvis-audio Error
pub type Result<T> = std::result::Result<T, Error>;
