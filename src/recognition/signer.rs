//! ACRCloud request signing.
//!
//! Each request carries a base64 HMAC-SHA1 over six newline-joined fields:
//!
//! ```text
//! POST
//! /v1/identify
//! {access_key}
//! audio
//! 1
//! {timestamp}
//! ```
//!
//! keyed with the access secret.  The timestamp is unix seconds, so a
//! signature is recomputed for every request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const HTTP_METHOD: &str = "POST";
pub const HTTP_URI: &str = "/v1/identify";
pub const DATA_TYPE: &str = "audio";
pub const SIGNATURE_VERSION: &str = "1";

/// The exact text that gets signed.
pub fn string_to_sign(access_key: &str, timestamp: i64) -> String {
    format!(
        "{HTTP_METHOD}\n{HTTP_URI}\n{access_key}\n{DATA_TYPE}\n{SIGNATURE_VERSION}\n{timestamp}"
    )
}

/// Base64 (standard alphabet, padded) HMAC-SHA1 of `payload` under `secret`.
pub fn sign(payload: &str, secret: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC takes any key size");
    mac.update(payload.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Authentication fields for one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub access_key: String,
    pub timestamp: String,
    pub signature: String,
}

impl SignedRequest {
    pub fn new(access_key: &str, access_secret: &str, timestamp: i64) -> Self {
        let signature = sign(&string_to_sign(access_key, timestamp), access_secret);
        Self {
            access_key: access_key.to_string(),
            timestamp: timestamp.to_string(),
            signature,
        }
    }

    /// Sign with the current wall-clock time.
    pub fn now(access_key: &str, access_secret: &str) -> Self {
        Self::new(access_key, access_secret, chrono::Utc::now().timestamp())
    }

    pub fn data_type(&self) -> &'static str {
        DATA_TYPE
    }

    pub fn signature_version(&self) -> &'static str {
        SIGNATURE_VERSION
    }
}
