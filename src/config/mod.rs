//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for capture,
//! recognition and container policy, `AppPaths` for cross-platform config
//! directories, and TOML persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, CaptureConfig, FormatPolicy, RecognitionConfig};
