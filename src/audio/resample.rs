//! Channel mixing and sample-rate conversion.
//!
//! The platform input may not honour the requested format, so the capture
//! path converts every callback block before buffering:
//!
//! 1. [`downmix_to_mono`]: average interleaved channels.
//! 2. [`Resampler`]: linear interpolation to the session sample rate,
//!    carrying its position from one block to the next.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`; a trailing partial frame
/// is discarded.
///
/// * `channels == 1` returns the input unchanged.
/// * `channels == 0` returns an empty vector.
///
/// ```rust
/// use song_id::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Resampler
// ---------------------------------------------------------------------------

/// Streaming linear-interpolation resampler.
///
/// Callback blocks arrive in arbitrary sizes, so the read position is kept
/// across calls as exact integer counts of consumed input and produced
/// output.  Output sample `k` sits at source position `k * from / to`; it is
/// emitted once both neighbours have arrived, using the previous block's last
/// sample when it straddles a block edge.  After `n` input samples the total
/// output is `ceil((n - 1) * to / from)`, independent of how the input was
/// split.
///
/// ```rust
/// use song_id::audio::Resampler;
///
/// let mut resampler = Resampler::new(44_100);
/// let total: usize = (0..750)
///     .map(|_| resampler.process(&[0.5_f32; 64], 48_000).len())
///     .sum();
/// assert_eq!(total, 44_100);
/// ```
#[derive(Debug, Clone)]
pub struct Resampler {
    to_rate: u32,
    from_rate: u32,
    consumed: u64,
    produced: u64,
    last: f32,
}

impl Resampler {
    pub fn new(to_rate: u32) -> Self {
        Self {
            to_rate,
            from_rate: 0,
            consumed: 0,
            produced: 0,
            last: 0.0,
        }
    }

    /// Convert the next mono block recorded at `from_rate`.
    ///
    /// Equal rates (or a zero rate) pass the block through.  A change of
    /// `from_rate` mid-stream restarts the position counters.
    pub fn process(&mut self, block: &[f32], from_rate: u32) -> Vec<f32> {
        if from_rate == self.to_rate || from_rate == 0 || self.to_rate == 0 {
            return block.to_vec();
        }
        if from_rate != self.from_rate {
            if self.from_rate != 0 {
                log::debug!(
                    "resample: input rate changed {} -> {from_rate} Hz",
                    self.from_rate
                );
            }
            self.from_rate = from_rate;
            self.consumed = 0;
            self.produced = 0;
        }
        if block.is_empty() {
            return Vec::new();
        }

        let from = from_rate as u64;
        let to = self.to_rate as u64;
        let base = self.consumed;
        let total = base + block.len() as u64;
        let last = self.last;
        let at = |i: u64| {
            if i < base {
                last
            } else {
                block[(i - base) as usize]
            }
        };

        let pending = ((total - 1) * to).div_ceil(from).saturating_sub(self.produced);
        let mut output = Vec::with_capacity(pending as usize);
        loop {
            let pos = self.produced * from;
            let idx = pos / to;
            if idx + 1 >= total {
                break;
            }
            let frac = (pos % to) as f32 / to as f32;
            let (a, b) = (at(idx), at(idx + 1));
            output.push(a + (b - a) * frac);
            self.produced += 1;
        }

        self.consumed = total;
        self.last = block[block.len() - 1];
        output
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
