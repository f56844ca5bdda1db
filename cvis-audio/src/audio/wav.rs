//! WAV container header parsing and channel up-mix
//!
//! The header is the canonical 44-byte packed little-endian RIFF layout. Only the
//! `RIFF`, `WAVE` and `data` tags are checked; the `fmt ` chunk fields are read as
//! declared and not cross-validated.

use crate::error::{Error, Result};
use std::io::Read;

/// Size of the packed header in bytes
pub const HEADER_LEN: usize = 44;

const RIFF_TAG: [u8; 4] = *b"RIFF";
const WAVE_TAG: [u8; 4] = *b"WAVE";
const DATA_TAG: [u8; 4] = *b"data";

/// Parsed WAV container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioHeader {
    pub riff_tag: [u8; 4],
    pub file_size: u32,
    pub wave_tag: [u8; 4],
    pub fmt_tag: [u8; 4],
    pub fmt_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_tag: [u8; 4],
    pub data_len: u32,
}

impl AudioHeader {
    /// Decode the packed header layout without validating tags.
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Self {
        let tag = |at: usize| -> [u8; 4] { [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]] };
        let u32_at = |at: usize| u32::from_le_bytes(tag(at));
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);

        Self {
            riff_tag: tag(0),
            file_size: u32_at(4),
            wave_tag: tag(8),
            fmt_tag: tag(12),
            fmt_size: u32_at(16),
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_tag: tag(36),
            data_len: u32_at(40),
        }
    }

    /// Encode into the packed header layout.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.riff_tag);
        out[4..8].copy_from_slice(&self.file_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.wave_tag);
        out[12..16].copy_from_slice(&self.fmt_tag);
        out[16..20].copy_from_slice(&self.fmt_size.to_le_bytes());
        out[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(&self.data_tag);
        out[40..44].copy_from_slice(&self.data_len.to_le_bytes());
        out
    }

    /// Standard 16-bit PCM header for `data_len` payload bytes
    pub fn pcm16(channels: u16, sample_rate: u32, data_len: u32) -> Self {
        let block_align = channels * 2;
        Self {
            riff_tag: RIFF_TAG,
            file_size: data_len.saturating_add(HEADER_LEN as u32 - 8),
            wave_tag: WAVE_TAG,
            fmt_tag: *b"fmt ",
            fmt_size: 16,
            audio_format: 1,
            channels,
            sample_rate,
            byte_rate: sample_rate * block_align as u32,
            block_align,
            bits_per_sample: 16,
            data_tag: DATA_TAG,
            data_len,
        }
    }

    /// Read and validate a header from the start of a stream.
    ///
    /// A short read and any tag mismatch are both reported as invalid format.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::InvalidFormat("file shorter than WAV header".to_string())
            } else {
                Error::Io(e)
            }
        })?;

        let header = Self::from_bytes(&bytes);
        header.validate()?;
        Ok(header)
    }

    /// Check the three fixed ASCII tags.
    pub fn validate(&self) -> Result<()> {
        if self.riff_tag != RIFF_TAG || self.wave_tag != WAVE_TAG || self.data_tag != DATA_TAG {
            return Err(Error::InvalidFormat(format!(
                "unexpected container tags {:?}/{:?}/{:?}",
                String::from_utf8_lossy(&self.riff_tag),
                String::from_utf8_lossy(&self.wave_tag),
                String::from_utf8_lossy(&self.data_tag),
            )));
        }
        Ok(())
    }

    /// Payload duration in milliseconds as declared by the header
    pub fn duration_ms(&self) -> u64 {
        if self.byte_rate == 0 {
            return 0;
        }
        self.data_len as u64 * 1000 / self.byte_rate as u64
    }
}

/// Up-mix 16-bit mono PCM into interleaved stereo.
///
/// Each little-endian sample is written to both the left and right slot. `out` is
/// cleared first. A trailing odd byte has no complete sample and is not copied.
pub fn upmix_mono_to_stereo(input: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(input.len() * 2);
    for sample in input.chunks_exact(2) {
        out.extend_from_slice(sample);
        out.extend_from_slice(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn samples_of(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_header_roundtrip_layout() {
        let header = AudioHeader::pcm16(2, 44100, 1000);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(AudioHeader::from_bytes(&bytes), header);
        assert_eq!(header.byte_rate, 176_400);
    }

    #[test]
    fn test_read_valid_header() {
        let bytes = AudioHeader::pcm16(1, 22050, 64).to_bytes();
        let header = AudioHeader::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.channels, 1);
        assert_eq!(header.sample_rate, 22050);
        assert_eq!(header.data_len, 64);
    }

    #[test]
    fn test_each_tag_is_checked() {
        for offset in [0usize, 8, 36] {
            let mut bytes = AudioHeader::pcm16(2, 44100, 8).to_bytes();
            bytes[offset] = b'X';
            let result = AudioHeader::read_from(&mut Cursor::new(bytes));
            assert!(
                matches!(result, Err(Error::InvalidFormat(_))),
                "tag at offset {} should be validated",
                offset
            );
        }
    }

    #[test]
    fn test_fmt_tag_not_checked() {
        let mut header = AudioHeader::pcm16(2, 44100, 8);
        header.fmt_tag = *b"junk";
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_short_header_is_invalid_format() {
        let result = AudioHeader::read_from(&mut Cursor::new(b"RIFF\x00\x00".to_vec()));
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_upmix_duplicates_each_sample() {
        let mono: Vec<i16> = vec![0, 1, -1, i16::MAX, i16::MIN, 1234, -4321];
        let input: Vec<u8> = mono.iter().flat_map(|s| s.to_le_bytes()).collect();

        let mut out = Vec::new();
        upmix_mono_to_stereo(&input, &mut out);
        let stereo = samples_of(&out);

        assert_eq!(stereo.len(), 2 * mono.len());
        for (i, &sample) in mono.iter().enumerate() {
            assert_eq!(stereo[2 * i], sample);
            assert_eq!(stereo[2 * i + 1], sample);
        }
    }

    #[test]
    fn test_upmix_ignores_trailing_odd_byte() {
        let mut out = vec![9u8; 3];
        upmix_mono_to_stereo(&[1, 0, 7], &mut out);
        assert_eq!(out, vec![1, 0, 1, 0]);
    }

    #[test]
    fn test_duration_ms() {
        let header = AudioHeader::pcm16(2, 44100, 176_400);
        assert_eq!(header.duration_ms(), 1000);
    }
}
