//! Audio primitives: container parsing, tone synthesis, and the output channel

#[cfg(feature = "cpal-output")]
pub mod device;
pub mod output;
pub mod tone;
pub mod wav;

#[cfg(feature = "cpal-output")]
pub use device::CpalSink;
pub use output::{AudioOutputWriter, AudioSink, NullSink, OutputStats, WavFileSink};
pub use tone::{ToneRequest, ToneSynthesizer};
pub use wav::AudioHeader;
