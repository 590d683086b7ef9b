//! Pipeline orchestrator: record → encode → identify.
//!
//! [`PipelineOrchestrator`] owns the [`AudioCapture`] and a [`Recognizer`]
//! and responds to [`PipelineCommand`]s received over a
//! `tokio::sync::mpsc` channel, publishing progress into [`SharedState`].
//!
//! ```text
//! StartRecording ─▶ AudioCapture::start              [Recording]
//!                   └─ level forwarder: watch ─▶ AppState::level
//! StopRecording  ─▶ AudioCapture::stop ─▶ EncodedAudio
//!                   └─▶ Recognizer::identify          [Identifying]
//!                         ├─ Ok  ─▶ last_song         [Result]
//!                         └─ Err ─▶ error_message     [Error]
//! Cancel         ─▶ AudioCapture::stop, discard       [Idle]
//! ```

use std::sync::{Arc, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioCapture, CaptureError, LevelSnapshot};
use crate::recognition::{RecognitionError, Recognizer};

use super::state::{AppState, PipelineState, SharedState};

// ---------------------------------------------------------------------------
// PipelineCommand / PipelineError
// ---------------------------------------------------------------------------

/// Commands a front-end sends to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    StartRecording,
    StopRecording,
    /// Stop recording and discard the audio.
    Cancel,
}

/// Failures that end a cycle in [`PipelineState::Error`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No audio captured. Record for a few seconds while music is playing.")]
    EmptyAudio,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),
}

fn lock(state: &SharedState) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives one capture/identify cycle per start/stop pair.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use song_id::audio::{AudioCapture, CpalBackend};
/// use song_id::config::AppConfig;
/// use song_id::pipeline::{new_shared_state, PipelineCommand, PipelineOrchestrator};
/// use song_id::recognition::RecognitionClient;
///
/// # async fn example() {
/// let config = AppConfig::load().unwrap_or_default();
/// let state = new_shared_state();
/// let orchestrator = PipelineOrchestrator::new(
///     Arc::clone(&state),
///     AudioCapture::new(Arc::new(CpalBackend::new()), &config),
///     Arc::new(RecognitionClient::from_config(&config.recognition)),
/// );
///
/// let (tx, rx) = tokio::sync::mpsc::channel(8);
/// let task = tokio::spawn(orchestrator.run(rx));
/// tx.send(PipelineCommand::StartRecording).await.unwrap();
/// // ...
/// tx.send(PipelineCommand::StopRecording).await.unwrap();
/// drop(tx);
/// task.await.unwrap();
/// # }
/// ```
pub struct PipelineOrchestrator {
    state: SharedState,
    capture: AudioCapture,
    recognizer: Arc<dyn Recognizer>,
    forwarder: Option<CancellationToken>,
}

impl PipelineOrchestrator {
    pub fn new(state: SharedState, capture: AudioCapture, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            state,
            capture,
            recognizer,
            forwarder: None,
        }
    }

    /// Run until `commands` is closed.  A recording still open at that point
    /// is discarded and the device released.
    pub async fn run(mut self, mut commands: mpsc::Receiver<PipelineCommand>) {
        while let Some(command) = commands.recv().await {
            log::debug!("pipeline: {command:?}");
            match command {
                PipelineCommand::StartRecording => self.handle_start(),
                PipelineCommand::StopRecording => self.handle_stop().await,
                PipelineCommand::Cancel => self.handle_cancel(),
            }
        }

        self.stop_forwarder();
        log::info!("pipeline: command channel closed, orchestrator shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    fn handle_start(&mut self) {
        if self.capture.is_active() {
            log::debug!("pipeline: already recording, start ignored");
            return;
        }

        if let Err(e) = self.capture.start() {
            self.set_error(PipelineError::from(e));
            return;
        }

        {
            let mut st = lock(&self.state);
            st.pipeline = PipelineState::Recording;
            st.level = LevelSnapshot::idle();
            st.recording_secs = 0.0;
            st.last_song = None;
            st.error_message = None;
        }
        self.start_forwarder();
    }

    async fn handle_stop(&mut self) {
        if !self.capture.is_active() {
            log::debug!("pipeline: not recording, stop ignored");
            return;
        }
        self.stop_forwarder();

        let audio = match self.capture.stop() {
            Ok(Some(audio)) => audio,
            Ok(None) => {
                self.set_error(PipelineError::EmptyAudio);
                return;
            }
            Err(e) => {
                self.set_error(PipelineError::from(e));
                return;
            }
        };

        {
            let mut st = lock(&self.state);
            st.pipeline = PipelineState::Identifying;
            st.level = LevelSnapshot::idle();
            st.recording_secs = audio.duration_secs();
        }

        match self.recognizer.identify(Some(&audio)).await {
            Ok(song) => {
                log::info!("pipeline: identified {:?} by {:?}", song.title, song.artist);
                let mut st = lock(&self.state);
                st.pipeline = PipelineState::Result;
                st.last_song = Some(song);
            }
            Err(e) => self.set_error(PipelineError::from(e)),
        }
    }

    fn handle_cancel(&mut self) {
        self.stop_forwarder();
        match self.capture.stop() {
            Ok(Some(audio)) => log::info!("pipeline: discarded {:.2}s of audio", audio.duration_secs()),
            Ok(None) => {}
            Err(e) => log::warn!("pipeline: error while cancelling: {e}"),
        }

        let mut st = lock(&self.state);
        st.pipeline = PipelineState::Idle;
        st.level = LevelSnapshot::idle();
        st.recording_secs = 0.0;
    }

    // -----------------------------------------------------------------------
    // Level forwarding
    // -----------------------------------------------------------------------

    fn start_forwarder(&mut self) {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let state = Arc::clone(&self.state);
        let mut levels = self.capture.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    changed = levels.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = levels.borrow_and_update().clone();
                        let mut st = lock(&state);
                        // Re-checked under the state lock so a stale frame
                        // cannot overwrite the reset done by stop/cancel.
                        if cancel.is_cancelled() {
                            break;
                        }
                        st.recording_secs = snapshot.recorded_secs;
                        st.level = snapshot;
                    }
                }
            }
        });

        self.forwarder = Some(token);
    }

    fn stop_forwarder(&mut self) {
        if let Some(token) = self.forwarder.take() {
            token.cancel();
        }
    }

    fn set_error(&self, error: PipelineError) {
        let message = error.to_string();
        log::error!("pipeline error: {message}");

        let mut st = lock(&self.state);
        st.pipeline = PipelineState::Error;
        st.level = LevelSnapshot::idle();
        st.last_song = None;
        st.error_message = Some(message);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
