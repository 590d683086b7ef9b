//! Song recognition against ACRCloud.
//!
//! ```text
//! EncodedAudio ─▶ size / credential checks ─▶ SignedRequest (HMAC-SHA1)
//!              ─▶ multipart POST /v1/identify ─▶ interpret ─▶ SongResult
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod signer;

pub use client::{RecognitionClient, RecognitionClientBuilder, Recognizer};
pub use error::RecognitionError;
pub use models::SongResult;
pub use signer::SignedRequest;
