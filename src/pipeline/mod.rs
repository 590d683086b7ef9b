//! Pipeline orchestrator and the shared state a front-end reads.
//!
//! ```text
//! PipelineCommand (mpsc)
//!        │
//!        ▼
//! PipelineOrchestrator::run()  ← async tokio task
//!        ├─ StartRecording → AudioCapture::start          → Recording
//!        ├─ StopRecording  → AudioCapture::stop
//!        │                   └─ Recognizer::identify       → Identifying → Result | Error
//!        └─ Cancel         → AudioCapture::stop (discard)  → Idle
//!
//! SharedState (Arc<Mutex<AppState>>) ←─── read by the front-end
//! ```

pub mod runner;
pub mod state;

pub use runner::{PipelineCommand, PipelineError, PipelineOrchestrator};
pub use state::{new_shared_state, wait_while, AppState, PipelineState, SharedState};
