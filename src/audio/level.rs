//! Amplitude measures for the live level meter.
//!
//! These values are display-only: nothing here feeds the encoder.

/// Root-mean-square amplitude of `block`, clamped to `[0.0, 1.0]`.
///
/// Returns `0.0` for an empty block.
///
/// ```rust
/// use song_id::audio::level::rms;
///
/// assert_eq!(rms(&[]), 0.0);
/// assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
/// ```
pub fn rms(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let mean_sq: f32 = block.iter().map(|s| s * s).sum::<f32>() / block.len() as f32;
    mean_sq.sqrt().min(1.0)
}

/// Largest absolute sample value in `block`, clamped to `[0.0, 1.0]`.
pub fn peak(block: &[f32]) -> f32 {
    block
        .iter()
        .map(|s| s.abs())
        .filter(|s| s.is_finite())
        .fold(0.0_f32, f32::max)
        .min(1.0)
}
