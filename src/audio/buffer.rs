//! Bounded, block-structured accumulation buffer for one capture session.
//!
//! Incoming samples are re-cut into fixed-size blocks in arrival order.  The
//! buffer is capped at `max_samples`: anything beyond the cap is dropped and
//! counted rather than overwriting older audio, because recognition needs
//! the recording as the user heard it, from the start.
//!
//! Once [`close`](SampleBuffer::close)d the buffer accepts nothing more, so
//! a late capture callback can never append to audio that is already being
//! concatenated.
//!
//! # Example
//!
//! ```rust
//! use song_id::audio::SampleBuffer;
//!
//! let mut buf = SampleBuffer::new(2, 5);
//! buf.push(&[0.1, 0.2, 0.3]);
//! buf.push(&[0.4, 0.5, 0.6]); // 0.6 exceeds the cap and is dropped
//! buf.close();
//! assert_eq!(buf.take(), vec![0.1, 0.2, 0.3, 0.4, 0.5]);
//! assert_eq!(buf.dropped(), 1);
//! ```

// ---------------------------------------------------------------------------
// SampleBuffer
// ---------------------------------------------------------------------------

/// Ordered sequence of fixed-size `f32` sample blocks with a hard cap.
#[derive(Debug)]
pub struct SampleBuffer {
    block_size: usize,
    max_samples: usize,
    /// Completed blocks, each exactly `block_size` samples.
    blocks: Vec<Vec<f32>>,
    /// Partially filled tail block (`< block_size` samples).
    pending: Vec<f32>,
    len: usize,
    dropped: usize,
    open: bool,
}

impl SampleBuffer {
    /// Create an open buffer.
    ///
    /// # Panics
    ///
    /// Panics if `block_size == 0`.
    pub fn new(block_size: usize, max_samples: usize) -> Self {
        assert!(block_size > 0, "SampleBuffer block size must be > 0");
        Self {
            block_size,
            max_samples,
            blocks: Vec::new(),
            pending: Vec::with_capacity(block_size),
            len: 0,
            dropped: 0,
            open: true,
        }
    }

    /// Append `data`, returning how many samples were accepted.
    ///
    /// Returns `0` once the buffer is closed.  Samples past `max_samples`
    /// are counted in [`dropped`](Self::dropped).
    pub fn push(&mut self, data: &[f32]) -> usize {
        if !self.open {
            return 0;
        }

        let room = self.max_samples.saturating_sub(self.len);
        let accepted = data.len().min(room);
        self.dropped += data.len() - accepted;

        let mut rest = &data[..accepted];
        while !rest.is_empty() {
            let take = (self.block_size - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() == self.block_size {
                let full = std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
                self.blocks.push(full);
            }
        }

        self.len += accepted;
        accepted
    }

    /// Stop accepting samples.  Idempotent.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Concatenate every block (plus the partial tail) in arrival order and
    /// clear the buffer.
    pub fn take(&mut self) -> Vec<f32> {
        let mut samples = Vec::with_capacity(self.len);
        for block in self.blocks.drain(..) {
            samples.extend_from_slice(&block);
        }
        samples.append(&mut self.pending);
        self.len = 0;
        samples
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of completed fixed-size blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Samples discarded because the cap was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Buffered duration in seconds at `sample_rate` Hz mono.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.len as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_recuts_into_fixed_blocks() {
        let mut buf = SampleBuffer::new(4, 100);
        buf.push(&[1.0, 2.0, 3.0]);
        assert_eq!(buf.block_count(), 0);

        buf.push(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(buf.block_count(), 2);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn take_preserves_arrival_order_and_tail() {
        let mut buf = SampleBuffer::new(3, 100);
        buf.push(&[1.0, 2.0]);
        buf.push(&[3.0, 4.0, 5.0, 6.0]);
        buf.push(&[7.0]);

        assert_eq!(buf.take(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert!(buf.is_empty());
        assert_eq!(buf.block_count(), 0);
    }

    #[test]
    fn cap_drops_newest_samples() {
        let mut buf = SampleBuffer::new(4, 6);
        assert_eq!(buf.push(&[1.0; 4]), 4);
        assert_eq!(buf.push(&[2.0; 4]), 2);
        assert_eq!(buf.push(&[3.0; 4]), 0);

        assert_eq!(buf.dropped(), 6);
        assert_eq!(buf.take(), vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn closed_buffer_rejects_appends() {
        let mut buf = SampleBuffer::new(4, 100);
        buf.push(&[0.5; 5]);
        buf.close();

        assert!(!buf.is_open());
        assert_eq!(buf.push(&[0.9; 8]), 0);
        // Rejected after close is not the same as dropped at the cap.
        assert_eq!(buf.dropped(), 0);
        assert_eq!(buf.take(), vec![0.5; 5]);
    }

    #[test]
    fn take_on_empty_buffer() {
        let mut buf = SampleBuffer::new(16, 100);
        assert!(buf.take().is_empty());
    }

    #[test]
    fn duration_secs_calculation() {
        let mut buf = SampleBuffer::new(1_024, 100_000);
        buf.push(&vec![0.0_f32; 22_050]);
        assert!((buf.duration_secs(44_100) - 0.5).abs() < 1e-6);
        assert_eq!(buf.duration_secs(0), 0.0);
    }

    #[test]
    #[should_panic(expected = "SampleBuffer block size must be > 0")]
    fn zero_block_size_panics() {
        let _ = SampleBuffer::new(0, 10);
    }
}
