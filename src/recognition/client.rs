//! HTTP client for the ACRCloud identify endpoint.
//!
//! [`RecognitionClient`] validates the recording and credentials, signs the
//! request, posts it as multipart form data and maps the answer through
//! [`interpret`].  It holds no per-call state and never retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::error::RecognitionError;
use super::models::{interpret, AcrResponse, SongResult};
use super::signer::{SignedRequest, HTTP_URI};
use crate::audio::format::{file_extension, DEFAULT_UPLOAD_MIME};
use crate::audio::EncodedAudio;
use crate::config::RecognitionConfig;

// ---------------------------------------------------------------------------
// Recognizer trait
// ---------------------------------------------------------------------------

/// Turns a recording into song metadata.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn Recognizer>`.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn identify(&self, audio: Option<&EncodedAudio>) -> Result<SongResult, RecognitionError>;
}

// ---------------------------------------------------------------------------
// RecognitionClient
// ---------------------------------------------------------------------------

/// ACRCloud identify client.
///
/// # Example
///
/// ```no_run
/// # use song_id::config::RecognitionConfig;
/// # use song_id::recognition::{RecognitionClient, Recognizer};
/// # async fn example(audio: song_id::audio::EncodedAudio) {
/// let client = RecognitionClient::from_config(&RecognitionConfig::default());
/// match client.identify(Some(&audio)).await {
///     Ok(song) => println!("{} by {}", song.title, song.artist),
///     Err(e) => eprintln!("{e}"),
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RecognitionClient {
    client: reqwest::Client,
    config: RecognitionConfig,
    base_url: String,
}

impl RecognitionClient {
    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: &RecognitionConfig) -> RecognitionClientBuilder {
        RecognitionClientBuilder {
            config: config.clone(),
            base_url: None,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}{HTTP_URI}", self.base_url.trim_end_matches('/'))
    }

    fn check_audio<'a>(&self, audio: Option<&'a EncodedAudio>) -> Result<&'a EncodedAudio, RecognitionError> {
        let audio = audio.ok_or(RecognitionError::NoAudioProvided)?;
        let min = self.config.min_sample_bytes;
        if audio.size_bytes() < min {
            return Err(RecognitionError::AudioTooSmall {
                size: audio.size_bytes(),
                min,
            });
        }
        Ok(audio)
    }

    fn build_form(&self, audio: &EncodedAudio, signed: &SignedRequest) -> Result<Form, RecognitionError> {
        let mime = match audio.mime_type().trim() {
            "" => DEFAULT_UPLOAD_MIME,
            m => m,
        };

        let sample = Part::bytes(audio.bytes().to_vec())
            .file_name(format!("recording.{}", file_extension(mime)))
            .mime_str(mime)?;

        Ok(Form::new()
            .part("sample", sample)
            .text("access_key", signed.access_key.clone())
            .text("data_type", signed.data_type())
            .text("signature_version", signed.signature_version())
            .text("signature", signed.signature.clone())
            .text("sample_bytes", audio.size_bytes().to_string())
            .text("timestamp", signed.timestamp.clone()))
    }
}

fn mask(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}…")
}

#[async_trait]
impl Recognizer for RecognitionClient {
    async fn identify(&self, audio: Option<&EncodedAudio>) -> Result<SongResult, RecognitionError> {
        let audio = self.check_audio(audio)?;
        if !self.config.has_credentials() {
            return Err(RecognitionError::CredentialsMissing);
        }

        let signed = SignedRequest::now(&self.config.access_key, &self.config.access_secret);
        let form = self.build_form(audio, &signed)?;
        let url = self.endpoint();

        log::info!(
            "recognition: POST {url} ({} bytes, key {})",
            audio.size_bytes(),
            mask(&self.config.access_key)
        );

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        log::debug!("recognition: HTTP {status}, {} bytes", body.len());

        let parsed: AcrResponse = serde_json::from_str(&body).map_err(|e| {
            RecognitionError::TransportFailure {
                message: format!("unreadable response (HTTP {status}): {e}"),
            }
        })?;

        let result = interpret(&parsed);
        match &result {
            Ok(song) => log::info!("recognition: matched {:?} by {:?}", song.title, song.artist),
            Err(e) => log::warn!("recognition: status {}: {e}", parsed.status.code),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct RecognitionClientBuilder {
    config: RecognitionConfig,
    base_url: Option<String>,
}

impl RecognitionClientBuilder {
    /// Override `https://{host}`, e.g. to point at a local mock server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn build(self) -> RecognitionClient {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = match builder.build() {
            Ok(client) => client,
            Err(e) => {
                log::warn!(
                    "recognition: HTTP client setup failed ({e}); \
                     continuing with defaults, timeout of {:?}s not applied",
                    self.config.timeout_secs
                );
                reqwest::Client::new()
            }
        };

        let base_url = self
            .base_url
            .unwrap_or_else(|| format!("https://{}", self.config.host.trim()));

        RecognitionClient {
            client,
            config: self.config,
            base_url,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> RecognitionConfig {
        RecognitionConfig {
            host: "identify-eu-west-1.acrcloud.com".into(),
            access_key: "test_key".into(),
            access_secret: "test_secret".into(),
            ..RecognitionConfig::default()
        }
    }

    fn client_for(server: &MockServer) -> RecognitionClient {
        RecognitionClient::builder(&config()).base_url(server.uri()).build()
    }

    fn recording() -> EncodedAudio {
        // 30 000 samples → 60 044 bytes, above the 50 000 byte floor.
        EncodedAudio::wav(&vec![0.1_f32; 30_000], 44_100).unwrap()
    }

    fn bohemian_rhapsody() -> serde_json::Value {
        json!({
            "status": {"code": 0, "msg": "Success", "version": "1.0"},
            "metadata": {
                "timestamp_utc": "2024-01-01 12:00:00",
                "music": [{
                    "title": "Bohemian Rhapsody",
                    "artists": [{"name": "Queen"}],
                    "album": {"name": "A Night at the Opera"},
                    "release_date": "1975-10-31",
                    "external_ids": {"isrc": "GBUM71029604"},
                    "score": 100
                }]
            }
        })
    }

    async fn mount(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/v1/identify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn identifies_with_isrc_fallback_link() {
        let server = MockServer::start().await;
        mount(&server, bohemian_rhapsody()).await;

        let song = client_for(&server).identify(Some(&recording())).await.unwrap();
        assert_eq!(song.title, "Bohemian Rhapsody");
        assert_eq!(song.artist, "Queen");
        assert_eq!(song.album.as_deref(), Some("A Night at the Opera"));
        assert_eq!(song.release_date.as_deref(), Some("1975-10-31"));
        assert_eq!(
            song.external_url.as_deref(),
            Some("https://open.spotify.com/search/isrc:GBUM71029604")
        );
    }

    #[tokio::test]
    async fn track_link_is_preferred() {
        let server = MockServer::start().await;
        let mut body = bohemian_rhapsody();
        body["metadata"]["music"][0]["external_metadata"] =
            json!({"spotify": {"track": {"id": "7tFiyTwD0nx5a1eklYtX2J"}}});
        mount(&server, body).await;

        let song = client_for(&server).identify(Some(&recording())).await.unwrap();
        assert_eq!(
            song.external_url.as_deref(),
            Some("https://open.spotify.com/track/7tFiyTwD0nx5a1eklYtX2J")
        );
    }

    #[tokio::test]
    async fn multipart_carries_every_field() {
        let server = MockServer::start().await;
        mount(&server, bohemian_rhapsody()).await;

        let audio = recording();
        client_for(&server).identify(Some(&audio)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(&requests[0].body);
        for field in [
            "name=\"sample\"; filename=\"recording.wav\"",
            "name=\"access_key\"",
            "name=\"data_type\"",
            "name=\"signature_version\"",
            "name=\"signature\"",
            "name=\"sample_bytes\"",
            "name=\"timestamp\"",
        ] {
            assert!(body.contains(field), "missing {field}");
        }
        assert!(body.contains("Content-Type: audio/wav"));
        assert!(body.contains("test_key"));
        assert!(body.contains(&audio.size_bytes().to_string()));
        assert!(!body.contains("test_secret"), "secret must never be sent");
    }

    #[tokio::test]
    async fn unlabelled_audio_is_sent_as_webm() {
        let server = MockServer::start().await;
        mount(&server, bohemian_rhapsody()).await;

        let audio = EncodedAudio::new(vec![7u8; 60_000], "", 6.0);
        client_for(&server).identify(Some(&audio)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("filename=\"recording.webm\""));
        assert!(body.contains("Content-Type: audio/webm"));
    }

    #[tokio::test]
    async fn no_music_code_is_rejected_with_guidance() {
        let server = MockServer::start().await;
        mount(&server, json!({"status": {"code": 2004, "msg": "Can't generate fingerprint"}})).await;

        let err = client_for(&server).identify(Some(&recording())).await.unwrap_err();
        assert!(matches!(err, RecognitionError::UpstreamRejected { code: 2004, .. }));
        assert!(err.to_string().to_lowercase().contains("no music detected"));
        assert_eq!(err.status_hint(), 404);
    }

    #[tokio::test]
    async fn empty_music_list_is_not_found() {
        let server = MockServer::start().await;
        mount(&server, json!({"status": {"code": 0}, "metadata": {"music": []}})).await;

        let err = client_for(&server).identify(Some(&recording())).await.unwrap_err();
        assert_eq!(err, RecognitionError::NotFound);
    }

    #[tokio::test]
    async fn small_audio_is_rejected_before_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let audio = EncodedAudio::new(vec![0u8; 49_999], "audio/wav", 0.5);
        let err = client_for(&server).identify(Some(&audio)).await.unwrap_err();
        assert_eq!(err, RecognitionError::AudioTooSmall { size: 49_999, min: 50_000 });
        assert!(err.is_no_audio());

        let err = client_for(&server).identify(None).await.unwrap_err();
        assert_eq!(err, RecognitionError::NoAudioProvided);
    }

    #[tokio::test]
    async fn missing_credentials_are_rejected_before_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = config();
        cfg.access_secret = String::new();
        let client = RecognitionClient::builder(&cfg).base_url(server.uri()).build();

        let err = client.identify(Some(&recording())).await.unwrap_err();
        assert_eq!(err, RecognitionError::CredentialsMissing);
    }

    #[tokio::test]
    async fn malformed_json_is_a_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/identify"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).identify(Some(&recording())).await.unwrap_err();
        match err {
            RecognitionError::TransportFailure { message } => assert!(message.contains("500"), "{message}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_failure() {
        let client = RecognitionClient::builder(&config())
            .base_url("http://127.0.0.1:1")
            .build();
        let err = client.identify(Some(&recording())).await.unwrap_err();
        assert!(matches!(err, RecognitionError::TransportFailure { .. }));
    }

    #[tokio::test]
    async fn configured_timeout_is_applied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": {"code": 1001, "msg": "No result"}}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut cfg = config();
        cfg.timeout_secs = Some(1);
        let client = RecognitionClient::builder(&cfg).base_url(server.uri()).build();

        let err = client.identify(Some(&recording())).await.unwrap_err();
        assert!(matches!(err, RecognitionError::TransportFailure { .. }), "{err:?}");
    }

    #[test]
    fn default_endpoint_uses_host() {
        let client = RecognitionClient::from_config(&config());
        assert_eq!(
            client.endpoint(),
            "https://identify-eu-west-1.acrcloud.com/v1/identify"
        );
    }

    #[test]
    fn key_is_masked() {
        assert_eq!(mask("abcdefgh"), "abcd…");
        assert_eq!(mask("ab"), "ab…");
    }

    /// `RecognitionClient` must be usable as `dyn Recognizer`.
    #[test]
    fn recognizer_is_object_safe() {
        let _boxed: Box<dyn Recognizer> = Box::new(RecognitionClient::from_config(&config()));
    }
}
