//! Real-time capture path: the per-block state machine and the writer handle
//! that lives inside the audio callback.
//!
//! # Design constraints
//!
//! `CaptureWriter::push_block` runs in the capture collaborator's callback,
//! typically on an OS audio thread at elevated priority. It **must not**:
//! - Allocate heap memory
//! - Block on a mutex or condvar
//! - Panic or unwind into the calling context
//!
//! Every store on this path is a plain or atomic write into pre-allocated
//! memory; the only synchronization it touches is the wait-free snapshot
//! publish and the non-blocking wake signal. Invariant violations do not
//! unwind — they latch a sticky [`Fault`] and turn the writer into a no-op.
//!
//! # State machine
//!
//! ```text
//! Empty ──► AtBegin ──► Moving ──► (AtEnd, same call) ──► Chasing ─┐
//!              ▲                                            │      │
//!              └────────────── aging drained ◄──────────────┘◄─────┘
//! ```
//!
//! `AtEnd` is transient: the call that would push `current.head` past the
//! ring end swaps `current` and `aging`, restarts `current` at index 0, and
//! enters `Chasing`, where each block grows `current` while consuming the
//! same number of frames off `aging`'s tail.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::error;

use crate::config::RingConfig;
use crate::notify::WakeSignal;
use crate::ring::{RingStorage, Segment, SnapshotCell};

/// Unrecoverable real-time-path faults.
///
/// These indicate a configuration or caller bug, not an operating condition;
/// there is deliberately no recovery path (recovering mid-callback is
/// unsafe). Details are logged via `tracing::error!` when the fault latches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The ring cannot hold the required gap plus one block of the observed
    /// size — it was configured too small for this collaborator.
    RingTooSmall,
    /// A delivered block was not a whole number of frames.
    MisalignedBlock,
    /// Segment bounds became inconsistent (internal bug).
    BoundsViolation,
}

const FAULT_NONE: u8 = 0;
const FAULT_RING_TOO_SMALL: u8 = 1;
const FAULT_MISALIGNED_BLOCK: u8 = 2;
const FAULT_BOUNDS_VIOLATION: u8 = 3;

/// Sticky, shareable fault latch. Written once by the capture path, read by
/// anyone holding the stream.
#[derive(Clone, Default)]
pub(crate) struct FaultFlag(Arc<AtomicU8>);

impl FaultFlag {
    fn latch(&self, fault: Fault) {
        let code = match fault {
            Fault::RingTooSmall => FAULT_RING_TOO_SMALL,
            Fault::MisalignedBlock => FAULT_MISALIGNED_BLOCK,
            Fault::BoundsViolation => FAULT_BOUNDS_VIOLATION,
        };
        let _ = self
            .0
            .compare_exchange(FAULT_NONE, code, Ordering::Release, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> Option<Fault> {
        match self.0.load(Ordering::Acquire) {
            FAULT_RING_TOO_SMALL => Some(Fault::RingTooSmall),
            FAULT_MISALIGNED_BLOCK => Some(Fault::MisalignedBlock),
            FAULT_BOUNDS_VIOLATION => Some(Fault::BoundsViolation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Empty,
    AtBegin,
    Moving,
    Chasing,
}

/// Segment bookkeeping driven once per delivered block.
///
/// Owned exclusively by the [`CaptureWriter`]; readers observe it only
/// through published snapshots.
pub(crate) struct CaptureState {
    capacity: u64,
    frame_rate: u32,
    /// Gap as configured; the floor below which the live gap never drops.
    configured_gap: u64,
    /// Live gap, sized for the largest block seen so far. Never shrinks.
    gap_frames: u64,
    /// Largest per-call block size observed so far.
    max_block_frames: u64,
    /// Largest multiple of the current call's block size that fits beside
    /// the gap. Recomputed each call.
    usable_frames: u64,
    phase: Phase,
    current: Segment,
    aging: Segment,
    total_frames: u64,
    fault: FaultFlag,
    faulted: bool,
}

impl CaptureState {
    pub(crate) fn new(config: &RingConfig, fault: FaultFlag) -> Self {
        Self {
            capacity: config.capacity_frames(),
            frame_rate: config.frame_rate,
            configured_gap: config.gap_frames,
            gap_frames: config.gap_frames,
            max_block_frames: 0,
            usable_frames: 0,
            phase: Phase::Empty,
            current: Segment::empty(),
            aging: Segment::empty(),
            total_frames: 0,
            fault,
            faulted: false,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn gap_frames(&self) -> u64 {
        self.gap_frames
    }

    pub(crate) fn current(&self) -> &Segment {
        &self.current
    }

    pub(crate) fn aging(&self) -> &Segment {
        &self.aging
    }

    pub(crate) fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn latch_fault(&mut self, fault: Fault) {
        self.faulted = true;
        self.fault.latch(fault);
    }

    /// Step (a) + (b) of the per-block sequence: revalidate the gap for the
    /// observed block size and update segment boundaries. Returns the ring
    /// frame index the block must be written at, or `None` if the writer has
    /// faulted.
    pub(crate) fn prepare(&mut self, frames: u64) -> Option<u64> {
        if self.faulted {
            return None;
        }

        // (a) Gap sized for the historical-maximum block, never shrunk.
        if frames > self.max_block_frames {
            self.max_block_frames = frames;
            let required = self.configured_gap.max(2 * frames);
            if required > self.gap_frames {
                self.gap_frames = required;
            }
        }
        if self.gap_frames >= self.capacity || frames > self.capacity - self.gap_frames {
            error!(
                block_frames = frames,
                gap_frames = self.gap_frames,
                capacity = self.capacity,
                "ring too small for observed block size — capture halted"
            );
            self.latch_fault(Fault::RingTooSmall);
            return None;
        }
        self.usable_frames = (self.capacity - self.gap_frames) / frames * frames;

        // (b) Boundary updates, strictly before the data is written.
        match self.phase {
            Phase::Empty => {
                self.phase = Phase::AtBegin;
            }
            Phase::Chasing => {
                // Consume aging in lockstep with current's growth, then make
                // sure its tail stays a full gap ahead of the post-write head.
                self.aging.trim_tail(frames, self.frame_rate);
                let new_head = self.current.head + frames;
                self.aging
                    .trim_tail_to(new_head + self.gap_frames, self.frame_rate);
                if !self.aging.active() {
                    self.phase = if self.current.tail > 0 {
                        Phase::Moving
                    } else {
                        Phase::AtBegin
                    };
                }
            }
            Phase::AtBegin | Phase::Moving => {}
        }

        // AtEnd (transient): the block would cross the ring end, so exchange
        // the segments and restart at index 0.
        if self.current.head + frames > self.capacity {
            if self.aging.active() {
                error!(
                    current_head = self.current.head,
                    aging_tail = self.aging.tail,
                    "write head reached ring end while aging segment still active"
                );
                self.latch_fault(Fault::BoundsViolation);
                return None;
            }
            std::mem::swap(&mut self.current, &mut self.aging);
            self.current.reset(self.aging.head_time);
            self.aging
                .trim_tail_to(frames + self.gap_frames, self.frame_rate);
            self.phase = if self.aging.active() {
                Phase::Chasing
            } else {
                Phase::AtBegin
            };
        }

        // Cap the availability window so the post-write segment never exceeds
        // the usable frame count.
        let post_len = self.current.len() + frames;
        if post_len > self.usable_frames {
            self.current
                .trim_tail(post_len - self.usable_frames, self.frame_rate);
            if self.phase == Phase::AtBegin {
                self.phase = Phase::Moving;
            }
        }

        Some(self.current.head)
    }

    /// Step (d): advance the head over the just-written block.
    pub(crate) fn commit(&mut self, frames: u64, arrival_time: f64) {
        self.current
            .advance_head(frames, self.frame_rate, arrival_time);
        self.total_frames += frames;

        debug_assert!(self.current.head <= self.capacity);
        debug_assert!(self.aging.head <= self.capacity);
        debug_assert!(
            !self.aging.active() || self.aging.tail >= self.current.head + self.gap_frames,
            "gap invariant violated: aging.tail={} current.head={} gap={}",
            self.aging.tail,
            self.current.head,
            self.gap_frames
        );
    }

}

/// Real-time producer handle. Move it into the capture callback; there is
/// exactly one per stream.
pub struct CaptureWriter {
    state: CaptureState,
    storage: Arc<RingStorage>,
    cell: Arc<SnapshotCell>,
    wake: WakeSignal,
    channels: usize,
}

impl CaptureWriter {
    pub(crate) fn new(
        config: &RingConfig,
        storage: Arc<RingStorage>,
        cell: Arc<SnapshotCell>,
        wake: WakeSignal,
        fault: FaultFlag,
    ) -> Self {
        Self {
            state: CaptureState::new(config, fault),
            storage,
            cell,
            wake,
            channels: config.channels,
        }
    }

    /// Accept one block of interleaved frames from the capture collaborator.
    ///
    /// Processes the block synchronously: boundary updates, copy into ring
    /// storage, snapshot publish, wake signal. Safe to call from a
    /// time-critical context — no allocation, no locks, no unwinding. After
    /// a fault this becomes a no-op.
    pub fn push_block(&mut self, samples: &[f32], arrival_time: f64) {
        if samples.is_empty() {
            return;
        }
        if samples.len() % self.channels != 0 {
            error!(
                samples = samples.len(),
                channels = self.channels,
                "block is not a whole number of frames — capture halted"
            );
            self.state.latch_fault(Fault::MisalignedBlock);
            return;
        }
        let frames = (samples.len() / self.channels) as u64;

        let Some(dest) = self.state.prepare(frames) else {
            return;
        };
        self.storage.write_frames(dest, samples);
        self.state.commit(frames, arrival_time);
        self.cell.publish(
            &self.state.current,
            &self.state.aging,
            self.state.total_frames,
        );
        self.wake.signal();
    }

    /// Whether the writer has latched an unrecoverable fault.
    pub fn fault(&self) -> Option<Fault> {
        self.state.fault.get()
    }
}
