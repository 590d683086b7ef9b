//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` fills
//! the missing keys from the defaults below.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variable that overrides [`RecognitionConfig::host`].
pub const ENV_HOST: &str = "ACRCLOUD_HOST";
/// Environment variable that overrides [`RecognitionConfig::access_key`].
pub const ENV_ACCESS_KEY: &str = "ACRCLOUD_ACCESS_KEY";
/// Environment variable that overrides [`RecognitionConfig::access_secret`].
pub const ENV_ACCESS_SECRET: &str = "ACRCLOUD_ACCESS_SECRET";

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Microphone capture settings.
///
/// The processing flags default to **off**: recognition needs the room audio
/// as-is, not a voice-optimised signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Session sample rate in Hz.  Fixed for the lifetime of a recording.
    pub sample_rate: u32,
    /// Requested channel count (the encoder always writes mono).
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Input device name; `None` means the system default.
    pub device: Option<String>,
    /// Samples per buffered block.
    pub block_size: usize,
    /// Hard cap on buffered audio; later blocks are dropped.
    pub max_recording_secs: f32,
    /// Refresh rate of the live level feed.
    pub feed_fps: u32,
    /// FFT window for the frequency bins (`fft_size / 2` bins are produced).
    pub fft_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
            device: None,
            block_size: 4_096,
            max_recording_secs: 60.0,
            feed_fps: 60,
            fft_size: 2_048,
        }
    }
}

impl CaptureConfig {
    /// Maximum number of mono samples a session may buffer.
    pub fn max_samples(&self) -> usize {
        (self.max_recording_secs.max(0.0) * self.sample_rate as f32) as usize
    }
}

// ---------------------------------------------------------------------------
// RecognitionConfig
// ---------------------------------------------------------------------------

/// Recognition service credentials and request policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// API host without scheme, e.g. `identify-eu-west-1.acrcloud.com`.
    pub host: String,
    pub access_key: String,
    pub access_secret: String,
    /// Smallest sample (in bytes) the service is asked to identify.
    /// 50 000 bytes is roughly 5–10 seconds of audio.
    pub min_sample_bytes: usize,
    /// Client-side request timeout.  `None` leaves the request unbounded.
    pub timeout_secs: Option<u64>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            access_key: String::new(),
            access_secret: String::new(),
            min_sample_bytes: 50_000,
            timeout_secs: None,
        }
    }
}

impl RecognitionConfig {
    /// `true` when all three secrets are present.
    pub fn has_credentials(&self) -> bool {
        !self.host.trim().is_empty()
            && !self.access_key.trim().is_empty()
            && !self.access_secret.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// FormatPolicy
// ---------------------------------------------------------------------------

/// Container preference order for encoded recordings.
///
/// Resolved by [`crate::audio::format::resolve_mime`]: the first supported
/// entry of `preferred` wins, otherwise `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatPolicy {
    pub preferred: Vec<String>,
    pub default: String,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self {
            preferred: vec!["audio/wav".into()],
            default: "audio/wav".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use song_id::config::AppConfig;
///
/// // Load (returns Default when file is missing, env overrides applied)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Microphone capture settings.
    pub capture: CaptureConfig,
    /// Recognition service settings.
    pub recognition: RecognitionConfig,
    /// Encoded container preference.
    pub format: FormatPolicy,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml` and
    /// apply the `ACRCLOUD_*` environment overrides.
    ///
    /// Returns defaults when the file does not exist yet, so callers never
    /// need to special-case a missing file.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&AppPaths::new().settings_file)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overwrite the recognition secrets with any non-empty value returned
    /// by `lookup` for the `ACRCLOUD_*` variable names.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty(ENV_HOST) {
            self.recognition.host = host;
        }
        if let Some(key) = non_empty(ENV_ACCESS_KEY) {
            self.recognition.access_key = key;
        }
        if let Some(secret) = non_empty(ENV_ACCESS_SECRET) {
            self.recognition.access_secret = secret;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(original, loaded);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.capture.sample_rate, 44_100);
        assert_eq!(cfg.capture.channels, 1);
        assert!(!cfg.capture.echo_cancellation);
        assert!(!cfg.capture.noise_suppression);
        assert!(!cfg.capture.auto_gain_control);
        assert_eq!(cfg.capture.fft_size, 2_048);
        assert_eq!(cfg.recognition.min_sample_bytes, 50_000);
        assert!(cfg.recognition.timeout_secs.is_none());
        assert!(!cfg.recognition.has_credentials());
        assert_eq!(cfg.format.default, "audio/wav");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[recognition]\nhost = \"identify-eu-west-1.acrcloud.com\"\n",
        )
        .expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.recognition.host, "identify-eu-west-1.acrcloud.com");
        assert_eq!(cfg.recognition.min_sample_bytes, 50_000);
        assert_eq!(cfg.capture, CaptureConfig::default());
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.capture.sample_rate = 48_000;
        cfg.capture.device = Some("USB Microphone".into());
        cfg.recognition.access_key = "key".into();
        cfg.recognition.timeout_secs = Some(15);
        cfg.format.preferred = vec!["audio/webm;codecs=opus".into(), "audio/wav".into()];

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.capture.sample_rate, 48_000);
        assert_eq!(loaded.capture.device.as_deref(), Some("USB Microphone"));
        assert_eq!(loaded.recognition.access_key, "key");
        assert_eq!(loaded.recognition.timeout_secs, Some(15));
        assert_eq!(loaded.format.preferred.len(), 2);
    }

    #[test]
    fn overrides_replace_secrets() {
        let env: HashMap<&str, &str> = [
            (ENV_HOST, "identify-us-west-2.acrcloud.com"),
            (ENV_ACCESS_KEY, "env-key"),
            (ENV_ACCESS_SECRET, "env-secret"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(cfg.recognition.host, "identify-us-west-2.acrcloud.com");
        assert_eq!(cfg.recognition.access_key, "env-key");
        assert_eq!(cfg.recognition.access_secret, "env-secret");
        assert!(cfg.recognition.has_credentials());
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut cfg = AppConfig::default();
        cfg.recognition.access_key = "file-key".into();
        cfg.apply_overrides(|_| Some("   ".into()));

        assert_eq!(cfg.recognition.access_key, "file-key");
        assert!(cfg.recognition.host.is_empty());
    }

    #[test]
    fn max_samples_follows_rate() {
        let cfg = CaptureConfig {
            sample_rate: 8_000,
            max_recording_secs: 2.5,
            ..CaptureConfig::default()
        };
        assert_eq!(cfg.max_samples(), 20_000);
    }
}
