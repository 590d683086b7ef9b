//! Headless driver: record until Enter, identify, print the song as JSON.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (defaults on first run, env overrides applied).
//! 3. Build the cpal-backed [`AudioCapture`] and the [`RecognitionClient`].
//! 4. Spawn the pipeline orchestrator and start recording; exit early if
//!    the microphone cannot be opened.
//! 5. Wait for Enter, stop, and print the outcome.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;

use song_id::{
    audio::{AudioCapture, CpalBackend},
    config::AppConfig,
    pipeline::{new_shared_state, wait_while, PipelineCommand, PipelineOrchestrator, PipelineState},
    recognition::{RecognitionClient, Recognizer},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("song-id starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if !config.recognition.has_credentials() {
        log::warn!(
            "recognition credentials missing; set them in settings.toml or via ACRCLOUD_* env vars"
        );
    }

    // 3. Components
    let capture = AudioCapture::new(Arc::new(CpalBackend::new()), &config);
    let recognizer: Arc<dyn Recognizer> =
        Arc::new(RecognitionClient::from_config(&config.recognition));

    // 4. Orchestrator
    let state = new_shared_state();
    let (command_tx, command_rx) = mpsc::channel::<PipelineCommand>(8);
    let orchestrator = PipelineOrchestrator::new(Arc::clone(&state), capture, recognizer);
    let pipeline = tokio::spawn(orchestrator.run(command_rx));

    command_tx.send(PipelineCommand::StartRecording).await?;
    let phase = tokio::time::timeout(
        Duration::from_secs(5),
        wait_while(&state, PipelineState::Idle),
    )
    .await
    .context("pipeline did not start recording")?;
    if phase == PipelineState::Error {
        drop(command_tx);
        pipeline.await.context("pipeline task failed")?;
        let message = state
            .lock()
            .map_err(|_| anyhow::anyhow!("pipeline state lock poisoned"))?
            .error_message
            .clone()
            .unwrap_or_else(|| "recording could not start".into());
        anyhow::bail!(message);
    }
    eprintln!("Listening... press Enter to identify.");

    // 5. Wait for Enter on the blocking pool, then stop.
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)
    })
    .await?
    .context("failed to read stdin")?;

    command_tx.send(PipelineCommand::StopRecording).await?;
    drop(command_tx);
    pipeline.await.context("pipeline task failed")?;

    let st = state
        .lock()
        .map_err(|_| anyhow::anyhow!("pipeline state lock poisoned"))?;
    match (&st.pipeline, &st.last_song) {
        (PipelineState::Result, Some(song)) => {
            println!("{}", serde_json::to_string_pretty(song)?);
            Ok(())
        }
        _ => {
            let message = st
                .error_message
                .clone()
                .unwrap_or_else(|| "identification did not complete".into());
            anyhow::bail!(message)
        }
    }
}
