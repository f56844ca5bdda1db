//! Detection results passed from the recognition stage to audio feedback
//!
//! Text fields carry a fixed byte capacity. One byte of each capacity is reserved
//! for the terminator used by the on-device record layout, so a field holds at
//! most `CAPACITY - 1` bytes of content. Longer input is truncated silently.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capacity of the recognized text field in bytes
pub const TEXT_CAPACITY: usize = 256;

/// Capacity of the language tag field in bytes
pub const LANGUAGE_CAPACITY: usize = 16;

/// Language tag used when the recognizer does not name one
pub const DEFAULT_LANGUAGE: &str = "english";

/// Owned text value holding at most `N - 1` bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BoundedText<const N: usize> {
    value: String,
}

impl<const N: usize> BoundedText<N> {
    /// Maximum content length in bytes
    pub const MAX_LEN: usize = N.saturating_sub(1);

    /// Build from a string, truncating to `MAX_LEN` bytes.
    ///
    /// Truncation backs off to the nearest UTF-8 character boundary so the
    /// stored value is always valid text.
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(Self::MAX_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        Self {
            value: text[..end].to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl<const N: usize> From<&str> for BoundedText<N> {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl<const N: usize> From<String> for BoundedText<N> {
    fn from(text: String) -> Self {
        Self::new(&text)
    }
}

impl<const N: usize> From<BoundedText<N>> for String {
    fn from(text: BoundedText<N>) -> Self {
        text.value
    }
}

impl<const N: usize> fmt::Display for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A single recognized text snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Recognized text
    pub text: BoundedText<TEXT_CAPACITY>,

    /// Detected language tag ("hindi", "english", "gujarati")
    pub language: BoundedText<LANGUAGE_CAPACITY>,

    /// Confidence score in [0.0, 1.0]
    pub confidence: f32,

    /// Recognition processing time in milliseconds
    pub processing_time_ms: u32,
}

impl DetectionResult {
    /// Create a result, truncating text fields and clamping confidence.
    pub fn new(text: &str, language: &str, confidence: f32, processing_time_ms: u32) -> Self {
        Self {
            text: BoundedText::new(text),
            language: BoundedText::new(language),
            confidence: clamp_confidence(confidence),
            processing_time_ms,
        }
    }

    /// Result carrying no text (nothing recognized in the frame)
    pub fn empty(processing_time_ms: u32) -> Self {
        Self::new("", "", 0.0, processing_time_ms)
    }

    /// True when the recognizer produced text worth announcing
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
