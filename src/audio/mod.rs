//! Audio path: microphone capture → mono conversion → bounded buffer → WAV.
//!
//! # Pipeline
//!
//! ```text
//! InputBackend (cpal) → AudioChunk → downmix_to_mono → Resampler
//!           → SampleBuffer ──stop──▶ encode_wav → EncodedAudio
//!           → rms / FrequencyAnalyzer → LevelFeed (watch)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use song_id::audio::{AudioCapture, CpalBackend};
//! use song_id::config::AppConfig;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut capture = AudioCapture::new(Arc::new(CpalBackend::new()), &AppConfig::default());
//! let mut levels = capture.subscribe();
//! capture.start()?;
//!
//! levels.changed().await?;
//! println!("level {:.2}", levels.borrow().amplitude);
//!
//! let audio = capture.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod buffer;
pub mod capture;
pub mod device;
pub mod feed;
pub mod format;
pub mod level;
pub mod resample;
pub mod spectrum;
pub mod wav;

pub use backend::{AudioChunk, CaptureConstraints, CaptureError, InputBackend, InputStream};
pub use buffer::SampleBuffer;
pub use capture::AudioCapture;
pub use device::CpalBackend;
pub use feed::LevelSnapshot;
pub use resample::{downmix_to_mono, Resampler};
pub use spectrum::FrequencyAnalyzer;
pub use wav::{encode_wav, EncodedAudio, EncodeError};
