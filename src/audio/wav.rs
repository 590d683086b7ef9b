//! Canonical 16-bit PCM WAV encoding.
//!
//! The output is the on-wire contract with the recognition service and must
//! be bit-exact:
//!
//! ```text
//! offset  size  field
//!      0     4  "RIFF"
//!      4     4  36 + data size
//!      8     4  "WAVE"
//!     12     4  "fmt "
//!     16     4  16 (fmt chunk size)
//!     20     2  1  (PCM)
//!     22     2  1  (mono)
//!     24     4  sample rate
//!     28     4  byte rate = sample rate * 2
//!     32     2  block align = 2
//!     34     2  16 bits per sample
//!     36     4  "data"
//!     40     4  data size = 2 * N
//!     44  2*N  little-endian i16 samples
//! ```
//!
//! Each `f32` sample is clamped to `[-1, 1]` and scaled by 32767 when
//! positive or 32768 when negative, truncating toward zero.

use std::io::Cursor;

use thiserror::Error;

/// MIME type of the encoder's output.
pub const WAV_MIME: &str = "audio/wav";

/// Size of the canonical PCM header.
pub const HEADER_LEN: usize = 44;

/// Bytes per encoded sample (16-bit mono).
pub const BYTES_PER_SAMPLE: usize = 2;

// ---------------------------------------------------------------------------
// EncodeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,

    #[error("WAV writer failed: {0}")]
    Writer(#[from] hound::Error),
}

// ---------------------------------------------------------------------------
// Sample conversion
// ---------------------------------------------------------------------------

/// Convert one float sample to signed 16-bit PCM.
///
/// ```rust
/// use song_id::audio::wav::float_to_pcm16;
///
/// assert_eq!(float_to_pcm16(1.0), 32_767);
/// assert_eq!(float_to_pcm16(-1.0), -32_768);
/// assert_eq!(float_to_pcm16(0.5), 16_383);
/// assert_eq!(float_to_pcm16(7.0), 32_767);
/// ```
pub fn float_to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    // `as` truncates toward zero and maps NaN to 0.
    if s < 0.0 {
        (s * 32_768.0) as i16
    } else {
        (s * 32_767.0) as i16
    }
}

// ---------------------------------------------------------------------------
// encode_wav
// ---------------------------------------------------------------------------

/// Encode mono `samples` at `sample_rate` Hz as a canonical PCM WAV file.
///
/// The result is exactly `44 + 2 * samples.len()` bytes.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, EncodeError> {
    if sample_rate == 0 {
        return Err(EncodeError::ZeroSampleRate);
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(
        HEADER_LEN + samples.len() * BYTES_PER_SAMPLE,
    ));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample(float_to_pcm16(s))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// EncodedAudio
// ---------------------------------------------------------------------------

/// Immutable encoded recording handed from capture to recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAudio {
    bytes: Vec<u8>,
    mime_type: String,
    duration_secs: f32,
}

impl EncodedAudio {
    /// Wrap an already-encoded payload.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, duration_secs: f32) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            duration_secs,
        }
    }

    /// Encode mono `samples` as WAV.
    pub fn wav(samples: &[f32], sample_rate: u32) -> Result<Self, EncodeError> {
        let bytes = encode_wav(samples, sample_rate)?;
        let duration_secs = samples.len() as f32 / sample_rate as f32;
        Ok(Self::new(bytes, WAV_MIME, duration_secs))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type; may be empty for payloads of unknown origin.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn duration_secs(&self) -> f32 {
        self.duration_secs
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
