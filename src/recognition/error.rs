//! Recognition failure taxonomy.

use thiserror::Error;

/// Why a recording could not be turned into a [`SongResult`].
///
/// Every variant is produced at the client boundary; nothing here is retried.
///
/// [`SongResult`]: super::SongResult
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecognitionError {
    #[error("no audio provided")]
    NoAudioProvided,

    /// The recording is below the byte floor the service needs.
    #[error("recording too short ({size} bytes, need at least {min}); record for longer")]
    AudioTooSmall { size: usize, min: usize },

    #[error("recognition credentials are not configured")]
    CredentialsMissing,

    /// The service answered with a non-zero status code.
    #[error("{message}")]
    UpstreamRejected { code: i64, message: String },

    #[error("no match found for this recording")]
    NotFound,

    /// Connection failure, timeout, or an unreadable response.
    #[error("recognition request failed: {message}")]
    TransportFailure { message: String },
}

impl RecognitionError {
    /// `true` for both "no audio" cases, which share UI handling.
    pub fn is_no_audio(&self) -> bool {
        matches!(
            self,
            RecognitionError::NoAudioProvided | RecognitionError::AudioTooSmall { .. }
        )
    }

    /// HTTP status a server front-end would answer with.
    ///
    /// ```
    /// use song_id::recognition::RecognitionError;
    ///
    /// assert_eq!(RecognitionError::NoAudioProvided.status_hint(), 400);
    /// assert_eq!(RecognitionError::NotFound.status_hint(), 404);
    /// ```
    pub fn status_hint(&self) -> u16 {
        match self {
            RecognitionError::NoAudioProvided | RecognitionError::AudioTooSmall { .. } => 400,
            RecognitionError::CredentialsMissing => 500,
            RecognitionError::UpstreamRejected { .. } | RecognitionError::NotFound => 404,
            RecognitionError::TransportFailure { .. } => 502,
        }
    }
}

impl From<reqwest::Error> for RecognitionError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("could not connect: {e}")
        } else {
            e.to_string()
        };
        RecognitionError::TransportFailure { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_audio_class() {
        assert!(RecognitionError::NoAudioProvided.is_no_audio());
        assert!(RecognitionError::AudioTooSmall { size: 10, min: 50_000 }.is_no_audio());
        assert!(!RecognitionError::NotFound.is_no_audio());
        assert!(!RecognitionError::CredentialsMissing.is_no_audio());
    }

    #[test]
    fn status_hints() {
        let rejected = RecognitionError::UpstreamRejected {
            code: 2004,
            message: "x".into(),
        };
        assert_eq!(rejected.status_hint(), 404);
        assert_eq!(RecognitionError::CredentialsMissing.status_hint(), 500);
        assert_eq!(
            RecognitionError::TransportFailure { message: "x".into() }.status_hint(),
            502
        );
        assert_eq!(
            RecognitionError::AudioTooSmall { size: 1, min: 2 }.status_hint(),
            400
        );
    }

    #[test]
    fn upstream_message_is_displayed_verbatim() {
        let e = RecognitionError::UpstreamRejected {
            code: 1001,
            message: "Song not recognized.".into(),
        };
        assert_eq!(e.to_string(), "Song not recognized.");
    }
}
