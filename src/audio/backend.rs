//! Platform input abstraction.
//!
//! [`InputBackend`] opens a microphone stream and pushes every hardware
//! buffer into a callback as an [`AudioChunk`].  The returned
//! [`InputStream`] is the only handle to the device: dropping or
//! [`close`](InputStream::close)-ing it releases the hardware, and it is
//! `Send` so a capture session can be owned by an async task.
//!
//! The production backend is [`crate::audio::device::CpalBackend`].

use thiserror::Error;

use crate::config::CaptureConfig;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the platform callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`, in the
/// stream's native format (see [`StreamFormat`]).
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

/// Callback receiving every chunk.  Runs on the platform's audio thread.
pub type ChunkCallback = Box<dyn FnMut(AudioChunk) + Send + 'static>;

// ---------------------------------------------------------------------------
// CaptureConstraints / StreamFormat
// ---------------------------------------------------------------------------

/// Quality constraints requested when opening the microphone.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConstraints {
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Device name; `None` selects the system default input.
    pub device: Option<String>,
}

impl From<&CaptureConfig> for CaptureConstraints {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels.max(1),
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            auto_gain_control: config.auto_gain_control,
            device: config.device.clone(),
        }
    }
}

impl CaptureConstraints {
    /// `true` when any signal-processing stage was requested.
    pub fn wants_processing(&self) -> bool {
        self.echo_cancellation || self.noise_suppression || self.auto_gain_control
    }
}

/// Native format an opened stream actually delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while starting or finishing a capture session.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Permission denied, no device, or the device refused the stream.
    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    /// `start` was called while a session is already recording.
    #[error("a capture session is already active")]
    AlreadyActive,

    /// The live level feed needs a tokio runtime.
    #[error("capture must be started from within a tokio runtime")]
    NoRuntime,

    #[error("failed to encode recording: {0}")]
    Encode(#[from] crate::audio::wav::EncodeError),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An open input stream.  Dropping it releases the device.
pub trait InputStream: Send {
    /// Format of the chunks this stream delivers.
    fn format(&self) -> StreamFormat;

    /// Stop the stream and release the device before returning.
    fn close(self: Box<Self>) {
        drop(self);
    }
}

/// Opens microphone streams.
pub trait InputBackend: Send + Sync {
    /// Open an input stream honouring `constraints` as far as the platform
    /// allows, delivering chunks to `on_chunk` until the stream is closed.
    ///
    /// # Errors
    ///
    /// [`CaptureError::MicrophoneUnavailable`] when no device exists or the
    /// platform refuses access.
    fn open(
        &self,
        constraints: &CaptureConstraints,
        on_chunk: ChunkCallback,
    ) -> Result<Box<dyn InputStream>, CaptureError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// `AudioChunk` must be `Send` so it can cross thread boundaries.
    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
        assert_send::<Box<dyn InputStream>>();
    }

    #[test]
    fn constraints_from_config() {
        let config = CaptureConfig {
            channels: 0,
            noise_suppression: true,
            device: Some("Line In".into()),
            ..CaptureConfig::default()
        };
        let c = CaptureConstraints::from(&config);
        assert_eq!(c.sample_rate, 44_100);
        assert_eq!(c.channels, 1, "channel count is at least mono");
        assert_eq!(c.device.as_deref(), Some("Line In"));
        assert!(c.wants_processing());
        assert!(!CaptureConstraints::from(&CaptureConfig::default()).wants_processing());
    }
}
