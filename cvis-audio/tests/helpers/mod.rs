//! Test helper modules for cvis-audio integration tests
//!
//! - AudioCapture: sink recording every block written to the output
//! - audio_generator: deterministic WAV fixtures

#![allow(dead_code)]

pub mod audio_capture;
pub mod audio_generator;

pub use audio_capture::{AudioCapture, CapturedBlock};
pub use audio_generator::{generate_sine_wav, generate_wav_with_header, mono_ramp_payload};
