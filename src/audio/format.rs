//! Container selection for encoded recordings.
//!
//! The preference order comes from [`FormatPolicy`]; resolution walks it
//! against the containers this crate can actually encode:
//!
//! | Step | Rule |
//! |------|------|
//! | 1 | first entry of `preferred` whose base type is supported |
//! | 2 | `default`, when supported |
//! | 3 | [`WAV_MIME`] |

use crate::audio::wav::WAV_MIME;
use crate::config::FormatPolicy;

/// Containers the encoder can produce.
pub const SUPPORTED_CONTAINERS: &[&str] = &[WAV_MIME];

/// Content type assumed for a payload that carries no MIME type.
pub const DEFAULT_UPLOAD_MIME: &str = "audio/webm";

/// Lower-cased MIME type without parameters (`"audio/webm;codecs=opus"` →
/// `"audio/webm"`).
pub fn base_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// `true` when the encoder can produce `mime`.
pub fn is_supported(mime: &str) -> bool {
    let base = base_mime(mime);
    SUPPORTED_CONTAINERS.iter().any(|c| *c == base)
}

/// Pick the container for the next recording.
pub fn resolve_mime(policy: &FormatPolicy) -> String {
    if let Some(choice) = policy.preferred.iter().find(|m| is_supported(m)) {
        return base_mime(choice);
    }

    if is_supported(&policy.default) {
        return base_mime(&policy.default);
    }

    log::warn!(
        "format: no supported container in {:?} (default {:?}); using {WAV_MIME}",
        policy.preferred,
        policy.default
    );
    WAV_MIME.to_string()
}

/// File extension used when uploading a payload of type `mime`.
pub fn file_extension(mime: &str) -> &'static str {
    match base_mime(mime).as_str() {
        "audio/wav" | "audio/wave" | "audio/x-wav" => "wav",
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/mpeg" | "audio/mp3" => "mp3",
        _ => "bin",
    }
}
