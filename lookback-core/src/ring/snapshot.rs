//! Lock-free publication of segment bounds.
//!
//! The real-time writer must hand readers a *consistent* view of both
//! segments — never one segment mid-update — without taking a lock. This is
//! a single-writer/multi-reader versioned cell (a seqlock built from plain
//! atomics): the writer bumps a sequence number to odd, stores every field,
//! then bumps it back to even with release ordering. Readers retry until
//! they observe the same even sequence number on both sides of their loads.
//!
//! The final release store also publishes the ring sample cells written just
//! before it, so a reader that indexes into [`super::storage::RingStorage`]
//! using an acquired snapshot sees fully committed sample data.

use std::sync::atomic::{fence, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::segment::Segment;

/// A consistent value copy of the stream's segment bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    /// The segment the writer is growing.
    pub current: Segment,
    /// The older segment being consumed while `current` chases it, inactive
    /// outside the chasing phase.
    pub aging: Segment,
    /// Monotonic count of frames ever written to the stream.
    pub total_frames: u64,
}

impl CaptureSnapshot {
    pub const fn empty() -> Self {
        Self {
            current: Segment::empty(),
            aging: Segment::empty(),
            total_frames: 0,
        }
    }

    /// Frames currently addressable by readers (both active segments).
    pub fn available_frames(&self) -> u64 {
        self.current.len() + self.aging.len()
    }

    /// Wall-clock seconds of the oldest readable frame, if any data exists.
    pub fn oldest_time(&self) -> Option<f64> {
        if self.aging.active() {
            Some(self.aging.tail_time)
        } else if self.current.active() {
            Some(self.current.tail_time)
        } else {
            None
        }
    }

    /// Wall-clock seconds one past the newest readable frame.
    pub fn newest_time(&self) -> Option<f64> {
        if self.current.active() {
            Some(self.current.head_time)
        } else if self.aging.active() {
            Some(self.aging.head_time)
        } else {
            None
        }
    }

    /// True while both segments are active (the chasing phase).
    pub fn chasing(&self) -> bool {
        self.current.active() && self.aging.active()
    }
}

/// Versioned cell holding the latest [`CaptureSnapshot`].
///
/// Exactly one writer may call [`publish`](Self::publish); any number of
/// threads may call [`load`](Self::load) concurrently.
pub struct SnapshotCell {
    seq: AtomicU64,
    cur_tail: AtomicU64,
    cur_head: AtomicU64,
    cur_tail_time: AtomicU64,
    cur_head_time: AtomicU64,
    aging_tail: AtomicU64,
    aging_head: AtomicU64,
    aging_tail_time: AtomicU64,
    aging_head_time: AtomicU64,
    total_frames: AtomicU64,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
            cur_tail: AtomicU64::new(0),
            cur_head: AtomicU64::new(0),
            cur_tail_time: AtomicU64::new(0),
            cur_head_time: AtomicU64::new(0),
            aging_tail: AtomicU64::new(0),
            aging_head: AtomicU64::new(0),
            aging_tail_time: AtomicU64::new(0),
            aging_head_time: AtomicU64::new(0),
            total_frames: AtomicU64::new(0),
        }
    }

    /// Publish a new snapshot. Wait-free, allocation-free, single writer.
    pub fn publish(&self, current: &Segment, aging: &Segment, total_frames: u64) {
        let s = self.seq.load(Ordering::Relaxed);
        self.seq.store(s + 1, Ordering::Relaxed);
        fence(Ordering::Release);

        self.cur_tail.store(current.tail, Ordering::Relaxed);
        self.cur_head.store(current.head, Ordering::Relaxed);
        self.cur_tail_time
            .store(current.tail_time.to_bits(), Ordering::Relaxed);
        self.cur_head_time
            .store(current.head_time.to_bits(), Ordering::Relaxed);
        self.aging_tail.store(aging.tail, Ordering::Relaxed);
        self.aging_head.store(aging.head, Ordering::Relaxed);
        self.aging_tail_time
            .store(aging.tail_time.to_bits(), Ordering::Relaxed);
        self.aging_head_time
            .store(aging.head_time.to_bits(), Ordering::Relaxed);
        self.total_frames.store(total_frames, Ordering::Relaxed);

        self.seq.store(s + 2, Ordering::Release);
    }

    /// Load the latest consistent snapshot, retrying while the writer is
    /// mid-publish. The retry window is a handful of atomic stores, so this
    /// effectively never spins more than once or twice.
    pub fn load(&self) -> CaptureSnapshot {
        loop {
            let s1 = self.seq.load(Ordering::Acquire);
            if s1 & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let snap = CaptureSnapshot {
                current: Segment {
                    tail: self.cur_tail.load(Ordering::Relaxed),
                    head: self.cur_head.load(Ordering::Relaxed),
                    tail_time: f64::from_bits(self.cur_tail_time.load(Ordering::Relaxed)),
                    head_time: f64::from_bits(self.cur_head_time.load(Ordering::Relaxed)),
                },
                aging: Segment {
                    tail: self.aging_tail.load(Ordering::Relaxed),
                    head: self.aging_head.load(Ordering::Relaxed),
                    tail_time: f64::from_bits(self.aging_tail_time.load(Ordering::Relaxed)),
                    head_time: f64::from_bits(self.aging_head_time.load(Ordering::Relaxed)),
                },
                total_frames: self.total_frames.load(Ordering::Relaxed),
            };

            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == s1 {
                return snap;
            }
        }
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}
