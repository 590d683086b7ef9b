//! Capture session lifecycle.
//!
//! [`AudioCapture`] owns at most one recording at a time.  [`start`] opens
//! the microphone through an [`InputBackend`] and wires every callback block
//! into two consumers:
//!
//! ```text
//! InputBackend callback ─▶ downmix_to_mono ─▶ Resampler ─┬─▶ SampleBuffer (raw path)
//!                                                        └─▶ rms / peak / recent window
//!                                                              └─▶ LevelFeed ─▶ watch
//! ```
//!
//! [`stop`] tears the session down in a fixed order so the callback and the
//! final read never race: close the buffer, cancel the feed, release the
//! device, then take the samples and encode them.
//!
//! [`start`]: AudioCapture::start
//! [`stop`]: AudioCapture::stop

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::backend::{AudioChunk, CaptureConstraints, CaptureError, InputBackend, InputStream};
use super::buffer::SampleBuffer;
use super::feed::{LevelFeed, LevelSnapshot, LevelSource};
use super::format::resolve_mime;
use super::level::{peak, rms};
use super::resample::{downmix_to_mono, Resampler};
use super::spectrum::FrequencyAnalyzer;
use super::wav::EncodedAudio;
use crate::config::{AppConfig, CaptureConfig};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// SessionShared  (written by the audio callback, read by the feed)
// ---------------------------------------------------------------------------

struct SessionShared {
    sample_rate: u32,
    resampler: Mutex<Resampler>,
    buffer: Mutex<SampleBuffer>,
    /// `f32` bits of the latest block RMS.
    amplitude: AtomicU32,
    /// `f32` bits of the running peak.  Non-negative floats order the same
    /// as their bit patterns, so `fetch_max` on the bits is a float max.
    peak: AtomicU32,
    recent: Mutex<VecDeque<f32>>,
    recent_cap: usize,
}

impl SessionShared {
    fn new(config: &CaptureConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            resampler: Mutex::new(Resampler::new(config.sample_rate)),
            buffer: Mutex::new(SampleBuffer::new(
                config.block_size.max(1),
                config.max_samples(),
            )),
            amplitude: AtomicU32::new(0),
            peak: AtomicU32::new(0),
            recent: Mutex::new(VecDeque::with_capacity(config.fft_size)),
            recent_cap: config.fft_size.max(1),
        }
    }

    fn ingest(&self, chunk: AudioChunk) {
        let mono = downmix_to_mono(&chunk.samples, chunk.channels);
        let mono = lock(&self.resampler).process(&mono, chunk.sample_rate);
        if mono.is_empty() {
            return;
        }

        {
            let mut buffer = lock(&self.buffer);
            if !buffer.is_open() {
                return;
            }
            buffer.push(&mono);
        }

        self.amplitude.store(rms(&mono).to_bits(), Ordering::Relaxed);
        self.peak.fetch_max(peak(&mono).to_bits(), Ordering::Relaxed);

        let mut recent = lock(&self.recent);
        let tail = &mono[mono.len().saturating_sub(self.recent_cap)..];
        let overflow = (recent.len() + tail.len()).saturating_sub(self.recent_cap);
        let recent_len = recent.len();
        recent.drain(..overflow.min(recent_len));
        recent.extend(tail.iter().copied());
    }

    fn peak(&self) -> f32 {
        f32::from_bits(self.peak.load(Ordering::Relaxed))
    }
}

impl LevelSource for SessionShared {
    fn amplitude(&self) -> f32 {
        f32::from_bits(self.amplitude.load(Ordering::Relaxed))
    }

    fn recent_samples(&self) -> Vec<f32> {
        lock(&self.recent).iter().copied().collect()
    }

    fn recorded_secs(&self) -> f32 {
        lock(&self.buffer).duration_secs(self.sample_rate)
    }
}

// ---------------------------------------------------------------------------
// ActiveSession
// ---------------------------------------------------------------------------

struct ActiveSession {
    shared: Arc<SessionShared>,
    stream: Option<Box<dyn InputStream>>,
    feed: LevelFeed,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        lock(&self.shared.buffer).close();
        self.feed.cancel();
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone recorder producing one [`EncodedAudio`] per session.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use song_id::audio::{AudioCapture, CpalBackend};
/// use song_id::config::AppConfig;
///
/// # async fn demo() -> Result<(), song_id::audio::CaptureError> {
/// let mut capture = AudioCapture::new(Arc::new(CpalBackend::new()), &AppConfig::default());
/// capture.start()?;
/// // ... let the music play ...
/// if let Some(audio) = capture.stop()? {
///     println!("{} bytes of {}", audio.size_bytes(), audio.mime_type());
/// }
/// # Ok(())
/// # }
/// ```
pub struct AudioCapture {
    backend: Arc<dyn InputBackend>,
    config: CaptureConfig,
    mime_type: String,
    level_tx: Arc<watch::Sender<LevelSnapshot>>,
    session: Option<ActiveSession>,
}

impl AudioCapture {
    pub fn new(backend: Arc<dyn InputBackend>, config: &AppConfig) -> Self {
        let mime_type = resolve_mime(&config.format);
        let (level_tx, _) = watch::channel(LevelSnapshot::idle());

        Self {
            backend,
            config: config.capture.clone(),
            mime_type,
            level_tx: Arc::new(level_tx),
            session: None,
        }
    }

    /// Open the microphone and begin buffering.
    ///
    /// Must be called from within a tokio runtime; the live level feed runs
    /// as a task on it.
    ///
    /// # Errors
    ///
    /// * [`CaptureError::AlreadyActive`] if a session is recording.
    /// * [`CaptureError::NoRuntime`] outside a tokio runtime.
    /// * [`CaptureError::MicrophoneUnavailable`] when the device cannot be
    ///   opened.  The session is not retried.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.session.is_some() {
            return Err(CaptureError::AlreadyActive);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CaptureError::NoRuntime)?;

        let constraints = CaptureConstraints::from(&self.config);
        let shared = Arc::new(SessionShared::new(&self.config));

        let sink = Arc::clone(&shared);
        let stream = self
            .backend
            .open(&constraints, Box::new(move |chunk| sink.ingest(chunk)))?;

        let native = stream.format();
        if native.sample_rate != self.config.sample_rate || native.channels != 1 {
            log::info!(
                "capture: converting {} Hz / {} ch input to {} Hz mono",
                native.sample_rate,
                native.channels,
                self.config.sample_rate
            );
        }

        let feed = LevelFeed::spawn(
            &runtime,
            Arc::clone(&shared),
            FrequencyAnalyzer::new(self.config.fft_size),
            self.config.feed_fps,
            Arc::clone(&self.level_tx),
            CancellationToken::new(),
        );

        log::info!(
            "capture: recording via {} at {} Hz",
            self.backend.name(),
            self.config.sample_rate
        );

        self.session = Some(ActiveSession {
            shared,
            stream: Some(stream),
            feed,
        });
        Ok(())
    }

    /// Finish the session and encode what was captured.
    ///
    /// Returns `Ok(None)` when idle or when no samples arrived.  The device
    /// is released before this returns on every path.
    pub fn stop(&mut self) -> Result<Option<EncodedAudio>, CaptureError> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        lock(&session.shared.buffer).close();
        session.feed.cancel();
        if let Some(stream) = session.stream.take() {
            stream.close();
        }

        let (samples, dropped) = {
            let mut buffer = lock(&session.shared.buffer);
            (buffer.take(), buffer.dropped())
        };
        let peak = session.shared.peak();
        drop(session);

        self.level_tx.send_replace(LevelSnapshot::idle());

        if dropped > 0 {
            log::warn!(
                "capture: recording limit of {:.0}s reached; dropped {dropped} samples",
                self.config.max_recording_secs
            );
        }

        if samples.is_empty() {
            log::info!("capture: stopped with no audio");
            return Ok(None);
        }

        let audio = EncodedAudio::wav(&samples, self.config.sample_rate)?;
        log::info!(
            "capture: stopped, {:.2}s ({} bytes, peak {peak:.2})",
            audio.duration_secs(),
            audio.size_bytes()
        );
        Ok(Some(audio))
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// RMS of the latest block; `0.0` when idle.
    pub fn amplitude(&self) -> f32 {
        self.session
            .as_ref()
            .map(|s| s.shared.amplitude())
            .unwrap_or(0.0)
    }

    /// Running peak of the current session; `0.0` when idle.
    pub fn peak_amplitude(&self) -> f32 {
        self.session
            .as_ref()
            .map(|s| s.shared.peak())
            .unwrap_or(0.0)
    }

    /// Latest published frequency bins; empty when idle.
    pub fn frequency_bins(&self) -> Vec<u8> {
        self.level_tx.borrow().frequency_bins.clone()
    }

    /// Receiver for live [`LevelSnapshot`]s.
    pub fn subscribe(&self) -> watch::Receiver<LevelSnapshot> {
        self.level_tx.subscribe()
    }

    /// Container the next recording is encoded as.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
