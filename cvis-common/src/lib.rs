//! # Companion Vision Common Library
//!
//! Shared code for the Companion Vision device crates:
//! - Detection result records exchanged between recognition and feedback
//! - Configuration file resolution and loading
//! - Common error types

pub mod config;
pub mod detection;
pub mod error;

pub use detection::{BoundedText, DetectionResult};
pub use error::{Error, Result};
