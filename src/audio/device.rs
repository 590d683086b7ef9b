//! Microphone capture via `cpal`.
//!
//! `cpal::Stream` is not `Send` on every platform, so [`CpalBackend`] builds
//! and owns it on a dedicated `audio-input` thread.  The returned
//! [`CpalStream`] is a RAII guard: dropping it signals that thread, which
//! drops the stream (stopping the hardware) and exits before the drop
//! returns.

use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::backend::{
    AudioChunk, CaptureConstraints, CaptureError, ChunkCallback, InputBackend, InputStream,
    StreamFormat,
};

// ---------------------------------------------------------------------------
// CpalBackend
// ---------------------------------------------------------------------------

/// [`InputBackend`] over the default cpal host.
///
/// # Example
///
/// ```rust,no_run
/// use song_id::audio::backend::{AudioChunk, CaptureConstraints, InputBackend};
/// use song_id::audio::device::CpalBackend;
/// use song_id::config::CaptureConfig;
///
/// let backend = CpalBackend::new();
/// let constraints = CaptureConstraints::from(&CaptureConfig::default());
/// let stream = backend
///     .open(
///         &constraints,
///         Box::new(|chunk: AudioChunk| println!("{} samples", chunk.samples.len())),
///     )
///     .unwrap();
/// // `stream` keeps the device open; drop it to stop recording.
/// drop(stream);
/// ```
#[derive(Debug, Default, Clone)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl InputBackend for CpalBackend {
    fn open(
        &self,
        constraints: &CaptureConstraints,
        on_chunk: ChunkCallback,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        if constraints.wants_processing() {
            log::warn!(
                "capture: echo cancellation / noise suppression / AGC requested but not \
                 available on this backend; recording unprocessed audio"
            );
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<StreamFormat, CaptureError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let constraints = constraints.clone();

        let thread = std::thread::Builder::new()
            .name("audio-input".into())
            .spawn(move || {
                let stream = match open_stream(&constraints, on_chunk) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Blocks until `CpalStream` sends or is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("capture: input stream released");
            })
            .map_err(|e| CaptureError::MicrophoneUnavailable(format!("audio thread: {e}")))?;

        let format = match ready_rx.recv() {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(CaptureError::MicrophoneUnavailable(
                    "audio thread exited before the stream was ready".into(),
                ));
            }
        };

        log::info!(
            "capture: input open ({} Hz, {} ch)",
            format.sample_rate,
            format.channels
        );

        Ok(Box::new(CpalStream {
            format,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }))
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

// ---------------------------------------------------------------------------
// CpalStream
// ---------------------------------------------------------------------------

/// Handle to a running cpal input stream.
pub struct CpalStream {
    format: StreamFormat,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl InputStream for CpalStream {
    fn format(&self) -> StreamFormat {
        self.format
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("capture: audio thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stream construction (runs on the audio thread)
// ---------------------------------------------------------------------------

fn unavailable(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::MicrophoneUnavailable(e.to_string())
}

fn find_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    match name {
        Some(wanted) => host
            .input_devices()
            .map_err(unavailable)?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| unavailable(format!("input device {wanted:?} not found"))),
        None => host
            .default_input_device()
            .ok_or_else(|| unavailable("no input device found on the default audio host")),
    }
}

/// Prefer an `f32` config at the requested rate and channel count; fall back
/// to the device default.
fn choose_config(
    device: &cpal::Device,
    constraints: &CaptureConstraints,
) -> Result<cpal::SupportedStreamConfig, CaptureError> {
    let target = cpal::SampleRate(constraints.sample_rate);

    if let Ok(configs) = device.supported_input_configs() {
        let exact = configs
            .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
            .filter(|c| c.channels() == constraints.channels)
            .find(|c| c.min_sample_rate() <= target && target <= c.max_sample_rate());
        if let Some(range) = exact {
            return Ok(range.with_sample_rate(target));
        }
    }

    device.default_input_config().map_err(unavailable)
}

/// Device sample formats the callback converts to `f32`.
const CONVERTIBLE_FORMATS: &[cpal::SampleFormat] = &[
    cpal::SampleFormat::F32,
    cpal::SampleFormat::F64,
    cpal::SampleFormat::I8,
    cpal::SampleFormat::I16,
    cpal::SampleFormat::I32,
    cpal::SampleFormat::U8,
    cpal::SampleFormat::U16,
    cpal::SampleFormat::U32,
];

fn open_stream(
    constraints: &CaptureConstraints,
    on_chunk: ChunkCallback,
) -> Result<(cpal::Stream, StreamFormat), CaptureError> {
    let host = cpal::default_host();
    let device = find_device(&host, constraints.device.as_deref())?;
    let supported = choose_config(&device, constraints)?;

    let format = StreamFormat {
        sample_rate: supported.sample_rate().0,
        channels: supported.channels(),
    };
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    if !CONVERTIBLE_FORMATS.contains(&sample_format) {
        return Err(unavailable(format!("unsupported sample format {sample_format:?}")));
    }

    use cpal::SampleFormat as F;
    let stream = match sample_format {
        F::F32 => build_stream::<f32>(&device, &config, format, on_chunk),
        F::F64 => build_stream::<f64>(&device, &config, format, on_chunk),
        F::I8 => build_stream::<i8>(&device, &config, format, on_chunk),
        F::I16 => build_stream::<i16>(&device, &config, format, on_chunk),
        F::I32 => build_stream::<i32>(&device, &config, format, on_chunk),
        F::U8 => build_stream::<u8>(&device, &config, format, on_chunk),
        F::U16 => build_stream::<u16>(&device, &config, format, on_chunk),
        F::U32 => build_stream::<u32>(&device, &config, format, on_chunk),
        other => return Err(unavailable(format!("unsupported sample format {other:?}"))),
    }?;

    stream.play().map_err(unavailable)?;
    Ok((stream, format))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: StreamFormat,
    mut on_chunk: ChunkCallback,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = data
                    .iter()
                    .map(|&s| cpal::Sample::from_sample(s))
                    .collect();
                on_chunk(AudioChunk {
                    samples,
                    sample_rate: format.sample_rate,
                    channels: format.channels,
                });
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )
        .map_err(unavailable)
}
