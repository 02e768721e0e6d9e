//! A contiguous run of valid frames inside the ring.
//!
//! Two segments exist per stream, `current` and `aging`. Only the capture
//! state machine mutates them; everyone else sees value copies taken through
//! [`super::snapshot::SnapshotCell`]. A segment never wraps: the state
//! machine resets to index 0 before a write would cross the ring end, so
//! `tail..head` is always a plain contiguous range.

use serde::{Deserialize, Serialize};

/// Head/tail bounds of one contiguous run of written frames.
///
/// `tail` is inclusive (oldest frame), `head` exclusive (one past the newest).
/// `tail_time`/`head_time` are the wall-clock seconds of those two edges on
/// the capture collaborator's clock; their difference always equals
/// `len() / frame_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Ring frame index of the oldest frame (inclusive).
    pub tail: u64,
    /// Ring frame index one past the newest frame (exclusive).
    pub head: u64,
    /// Wall-clock seconds of the oldest frame.
    pub tail_time: f64,
    /// Wall-clock seconds one frame past the newest frame.
    pub head_time: f64,
}

impl Segment {
    /// An empty, inactive segment anchored at index 0.
    pub const fn empty() -> Self {
        Self {
            tail: 0,
            head: 0,
            tail_time: 0.0,
            head_time: 0.0,
        }
    }

    /// Number of valid frames in the segment.
    pub fn len(&self) -> u64 {
        self.head - self.tail
    }

    /// A segment is active exactly when it holds at least one frame.
    pub fn active(&self) -> bool {
        self.head > self.tail
    }

    pub fn is_empty(&self) -> bool {
        !self.active()
    }

    /// Reset to empty at index 0, keeping `time` as both edge times so the
    /// next `advance_head` stays continuous with the stream.
    pub fn reset(&mut self, time: f64) {
        self.tail = 0;
        self.head = 0;
        self.tail_time = time;
        self.head_time = time;
    }

    /// Grow the head by `frames` newly written frames ending at `head_time`.
    ///
    /// `tail_time` is re-derived from the new head so the time span stays
    /// exactly consistent with the frame span.
    pub fn advance_head(&mut self, frames: u64, frame_rate: u32, head_time: f64) {
        self.head += frames;
        self.head_time = head_time;
        self.tail_time = head_time - self.len() as f64 / f64::from(frame_rate);
    }

    /// Evict the oldest `frames` frames. Saturates: trimming more than the
    /// segment holds empties it (head/tail collapse, becoming inactive).
    pub fn trim_tail(&mut self, frames: u64, frame_rate: u32) {
        let trimmed = frames.min(self.len());
        self.tail += trimmed;
        self.tail_time += trimmed as f64 / f64::from(frame_rate);
    }

    /// Advance the tail to at least `index`. No-op if the tail is already
    /// past it; empties the segment if `index` is at or past the head.
    pub fn trim_tail_to(&mut self, index: u64, frame_rate: u32) {
        if index > self.tail {
            self.trim_tail(index - self.tail, frame_rate);
        }
    }

    /// Seconds of audio covered by the segment.
    pub fn duration(&self) -> f64 {
        self.head_time - self.tail_time
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::empty()
    }
}
