//! Pipeline state machine and shared application state.
//!
//! [`PipelineState`] drives the orchestrator's state machine.  A front-end
//! reads it via [`SharedState`] to decide what to render.
//!
//! [`AppState`] holds everything a front-end needs: current phase, live
//! level, last identified song and any error message.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::audio::LevelSnapshot;
use crate::recognition::SongResult;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of the identify pipeline.
///
/// ```text
/// Idle ──start──▶ Recording ──stop──▶ Identifying ──match──▶ Result
///                     │                    └────failure────▶ Error
///                     └──cancel──▶ Idle
/// Result / Error ──start──▶ Recording
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,

    /// Microphone is open and samples are buffering.
    Recording,

    /// The recording is encoded and the request is in flight.
    Identifying,

    /// A song was identified; see [`AppState::last_song`].
    Result,

    /// The last attempt failed; see [`AppState::error_message`].
    Error,
}

impl PipelineState {
    /// Returns `true` while a recording or request is in progress.
    ///
    /// ```
    /// use song_id::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Recording.is_busy());
    /// assert!(PipelineState::Identifying.is_busy());
    /// assert!(!PipelineState::Result.is_busy());
    /// assert!(!PipelineState::Error.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::Recording | PipelineState::Identifying)
    }

    /// Short label for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Recording => "Listening",
            PipelineState::Identifying => "Identifying",
            PipelineState::Result => "Found",
            PipelineState::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state.
///
/// The orchestrator mutates it; front-ends only read it.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub pipeline: PipelineState,

    /// Live level meter; idle outside `Recording`.
    pub level: LevelSnapshot,

    /// Length of the current (or last) recording in seconds.
    pub recording_secs: f32,

    /// `None` until a song has been identified.  Cleared when a new
    /// recording starts or a cycle fails.
    pub last_song: Option<SongResult>,

    /// Set together with `PipelineState::Error`.
    pub error_message: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::new()))
}

/// Wait until the pipeline leaves `phase` and return the phase it moved to.
///
/// Polls without holding the lock across the sleep.
pub async fn wait_while(state: &SharedState, phase: PipelineState) -> PipelineState {
    loop {
        let current = state.lock().unwrap_or_else(PoisonError::into_inner).pipeline;
        if current != phase {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
