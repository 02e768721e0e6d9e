//! Fixed-capacity interleaved sample storage.
//!
//! One flat array of `capacity_frames * channels` cells, allocated at
//! construction and never resized. The real-time writer stores into it while
//! readers copy out of it, so every cell is an `AtomicU32` holding the f32
//! bit pattern — wait-free stores and loads, no locks, and no `unsafe`.
//!
//! Per-cell ordering is `Relaxed`; cross-thread visibility of a committed
//! range comes from the release/acquire edge of the snapshot cell, which is
//! always published *after* the samples are stored.

use std::sync::atomic::{AtomicU32, Ordering};

/// Pre-allocated ring sample array.
///
/// Callers address it in *frames*; each frame is `channels` consecutive f32
/// samples. Neither path allocates, and neither handles wraparound: the
/// capture state machine guarantees writes never cross the ring end, and the
/// query engine only requests runs that lie wholly inside one segment.
pub struct RingStorage {
    cells: Box<[AtomicU32]>,
    capacity_frames: u64,
    channels: usize,
}

impl RingStorage {
    pub fn new(capacity_frames: u64, channels: usize) -> Self {
        let len = capacity_frames as usize * channels;
        let cells = (0..len).map(|_| AtomicU32::new(0)).collect::<Vec<_>>();
        Self {
            cells: cells.into_boxed_slice(),
            capacity_frames,
            channels,
        }
    }

    pub fn capacity_frames(&self) -> u64 {
        self.capacity_frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Store `samples` (interleaved, a whole number of frames) starting at
    /// `frame_index`. The caller has pre-validated that the run fits.
    pub fn write_frames(&self, frame_index: u64, samples: &[f32]) {
        let start = frame_index as usize * self.channels;
        let cells = &self.cells[start..start + samples.len()];
        for (cell, &sample) in cells.iter().zip(samples) {
            cell.store(sample.to_bits(), Ordering::Relaxed);
        }
    }

    /// Copy `n_frames` frames starting at `frame_index` into `out`, which
    /// must hold exactly `n_frames * channels` samples.
    pub fn read_frames(&self, frame_index: u64, n_frames: u64, out: &mut [f32]) {
        debug_assert_eq!(out.len(), n_frames as usize * self.channels);
        let start = frame_index as usize * self.channels;
        let cells = &self.cells[start..start + out.len()];
        for (sample, cell) in out.iter_mut().zip(cells) {
            *sample = f32::from_bits(cell.load(Ordering::Relaxed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_interleaved_frames() {
        let storage = RingStorage::new(16, 2);
        let block: Vec<f32> = (0..8).map(|i| i as f32 * 0.5).collect();
        storage.write_frames(3, &block);

        let mut out = vec![0.0f32; 8];
        storage.read_frames(3, 4, &mut out);
        assert_eq!(out, block);
    }

    #[test]
    fn reads_subranges_of_a_written_run() {
        let storage = RingStorage::new(32, 1);
        let block: Vec<f32> = (0..10).map(|i| i as f32).collect();
        storage.write_frames(20, &block);

        let mut out = vec![0.0f32; 4];
        storage.read_frames(23, 4, &mut out);
        assert_eq!(out, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn unwritten_cells_read_as_silence() {
        let storage = RingStorage::new(8, 1);
        let mut out = vec![1.0f32; 8];
        storage.read_frames(0, 8, &mut out);
        assert_eq!(out, vec![0.0f32; 8]);
    }
}
