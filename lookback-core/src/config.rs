//! Construction-time configuration for the capture ring.
//!
//! One explicit value, built once and handed to [`crate::CaptureStream::new`].
//! There is no process-wide mutable configuration in this crate.

use std::time::Duration;

use crate::error::{LookbackError, Result};

/// Configuration for a [`crate::CaptureStream`].
///
/// All quantities are in *frames* (one sample per channel at one instant).
/// The ring's capacity is `retention_frames + gap_frames`: the gap is extra
/// slack on top of the requested retention, so widening it at runtime eats
/// into headroom, not into the promised retention window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Interleaved channel count. Default: 1.
    pub channels: usize,
    /// Frames per second delivered by the capture collaborator. Default: 48000.
    pub frame_rate: u32,
    /// How many frames of recent audio stay addressable by readers.
    /// Default: 30 s at 48 kHz.
    pub retention_frames: u64,
    /// Initial slack kept between the write head and the nearest readable
    /// tail. Widened (never shrunk) if the collaborator delivers blocks
    /// larger than this allows for. Default: 250 ms at 48 kHz.
    pub gap_frames: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            frame_rate: 48_000,
            retention_frames: 48_000 * 30,
            gap_frames: 12_000,
        }
    }
}

impl RingConfig {
    /// Build a config from wall-clock durations instead of raw frame counts.
    pub fn from_durations(
        channels: usize,
        frame_rate: u32,
        retention: Duration,
        initial_gap: Duration,
    ) -> Self {
        let rate = f64::from(frame_rate);
        Self {
            channels,
            frame_rate,
            retention_frames: (retention.as_secs_f64() * rate).round() as u64,
            gap_frames: (initial_gap.as_secs_f64() * rate).round() as u64,
        }
    }

    /// Total ring length in frames.
    pub fn capacity_frames(&self) -> u64 {
        self.retention_frames + self.gap_frames
    }

    /// Fail fast on configurations the ring cannot honor.
    ///
    /// # Errors
    /// Any zero-sized dimension, or a gap that leaves no usable frames.
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(LookbackError::InvalidChannelCount(self.channels));
        }
        if self.frame_rate == 0 {
            return Err(LookbackError::InvalidFrameRate);
        }
        if self.retention_frames == 0 {
            return Err(LookbackError::EmptyRetention);
        }
        if self.gap_frames == 0 {
            return Err(LookbackError::EmptyGap);
        }
        Ok(())
    }
}
