//! Byte-scaled frequency bins for the recording visualiser.
//!
//! [`FrequencyAnalyzer`] follows the usual analyser-node contract so a UI
//! written against a browser analyser renders the same picture:
//!
//! 1. take the most recent `fft_size` samples (zero-padded at the front),
//! 2. apply a Blackman window and a forward FFT,
//! 3. normalise magnitudes by `fft_size` and smooth them over time,
//! 4. convert to decibels and map `[min_db, max_db]` linearly onto `0..=255`.
//!
//! The output has `fft_size / 2` bins.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Analyser tuning.
#[derive(Debug, Clone)]
pub struct SpectrumConfig {
    /// FFT window size (power of two recommended).
    pub fft_size: usize,
    /// Temporal smoothing factor in `[0.0, 1.0)`; higher = smoother.
    pub smoothing: f32,
    /// Level mapped to byte `0`.
    pub min_db: f32,
    /// Level mapped to byte `255`.
    pub max_db: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 2_048,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

/// FFT-based analyser producing `fft_size / 2` byte bins per frame.
pub struct FrequencyAnalyzer {
    config: SpectrumConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl FrequencyAnalyzer {
    /// Analyser with default tuning and the given FFT size.
    pub fn new(fft_size: usize) -> Self {
        Self::with_config(SpectrumConfig {
            fft_size,
            ..SpectrumConfig::default()
        })
    }

    pub fn with_config(config: SpectrumConfig) -> Self {
        let n = config.fft_size.max(2);
        let fft = FftPlanner::new().plan_fft_forward(n);

        // Blackman window, alpha = 0.16
        let window = (0..n)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / n as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        Self {
            fft,
            window,
            smoothed: vec![0.0; n / 2],
            scratch: vec![Complex::new(0.0, 0.0); n],
            config: SpectrumConfig {
                fft_size: n,
                ..config
            },
        }
    }

    /// Number of bins returned by [`process`](Self::process).
    pub fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Analyse the tail of `samples` and return one byte per bin.
    pub fn process(&mut self, samples: &[f32]) -> Vec<u8> {
        let n = self.config.fft_size;
        let tail = &samples[samples.len().saturating_sub(n)..];
        let pad = n - tail.len();

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let s = if i < pad { 0.0 } else { tail[i - pad] };
            *slot = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.config.smoothing.clamp(0.0, 0.999);
        let range = self.config.max_db - self.config.min_db;
        let scale = if range > 0.0 { 255.0 / range } else { 0.0 };

        self.smoothed
            .iter_mut()
            .zip(self.scratch.iter())
            .map(|(prev, bin)| {
                let magnitude = bin.norm() / n as f32;
                *prev = tau * *prev + (1.0 - tau) * magnitude;

                let db = 20.0 * prev.log10();
                let byte = (scale * (db - self.config.min_db)).clamp(0.0, 255.0);
                // -inf (silence) clamps to 0; NaN casts to 0.
                byte as u8
            })
            .collect()
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amplitude: f32, rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / rate).sin())
            .collect()
    }

    fn unsmoothed(fft_size: usize) -> FrequencyAnalyzer {
        FrequencyAnalyzer::with_config(SpectrumConfig {
            fft_size,
            smoothing: 0.0,
            ..SpectrumConfig::default()
        })
    }

    #[test]
    fn bin_count_is_half_fft_size() {
        let mut analyzer = FrequencyAnalyzer::new(1_024);
        assert_eq!(analyzer.bin_count(), 512);
        assert_eq!(analyzer.process(&[0.0; 1_024]).len(), 512);
    }

    #[test]
    fn silence_maps_to_zero() {
        let mut analyzer = FrequencyAnalyzer::new(512);
        assert!(analyzer.process(&[0.0; 512]).iter().all(|&b| b == 0));
        assert!(analyzer.process(&[]).iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let rate = 44_100.0;
        let n = 1_024;
        let target_bin = 64;
        let freq = target_bin as f32 * rate / n as f32;

        let mut analyzer = unsmoothed(n);
        let bins = analyzer.process(&sine(freq, 0.001, rate, n));

        let (argmax, max) = bins
            .iter()
            .enumerate()
            .max_by_key(|(_, &b)| b)
            .map(|(i, &b)| (i, b))
            .unwrap();
        assert!(max > 0);
        assert!(argmax.abs_diff(target_bin) <= 1, "peak at bin {argmax}");
        // Far away from the tone the level stays at the floor.
        assert_eq!(bins[400], 0);
    }

    #[test]
    fn loud_tone_saturates() {
        let mut analyzer = unsmoothed(512);
        let bins = analyzer.process(&sine(2_756.25, 1.0, 44_100.0, 512));
        assert_eq!(bins.iter().copied().max(), Some(255));
    }

    #[test]
    fn smoothing_rises_gradually() {
        let rate = 44_100.0;
        let n = 512;
        let signal = sine(32.0 * rate / n as f32, 0.001, rate, n);

        let mut analyzer = FrequencyAnalyzer::with_config(SpectrumConfig {
            fft_size: n,
            smoothing: 0.8,
            ..SpectrumConfig::default()
        });
        let first = analyzer.process(&signal)[32];
        let second = analyzer.process(&signal)[32];
        assert!(second > first, "{second} <= {first}");

        analyzer.reset();
        assert_eq!(analyzer.process(&signal)[32], first);
    }

    #[test]
    fn only_the_tail_is_analysed() {
        let mut a = unsmoothed(256);
        let mut b = unsmoothed(256);
        let tone = sine(1_000.0, 0.01, 44_100.0, 256);

        let mut long = vec![0.9_f32; 4_096];
        long.extend_from_slice(&tone);
        assert_eq!(a.process(&long), b.process(&tone));
    }
}
