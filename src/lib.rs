//! Identify the song playing near the microphone.
//!
//! * [`audio`] records the room and encodes it as 16-bit PCM WAV.
//! * [`recognition`] signs and sends the recording to ACRCloud.
//! * [`pipeline`] drives both from start/stop commands and keeps a shared
//!   state snapshot for a front-end.
//! * [`config`] loads `settings.toml` and environment overrides.

pub mod audio;
pub mod config;
pub mod pipeline;
pub mod recognition;
