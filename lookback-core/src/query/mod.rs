//! Read-by-time-window engine.
//!
//! Translates an absolute `(start_time, duration)` request into ring index
//! runs against a single consistent snapshot of both segments, clips it to
//! the available window, and copies the result out in chronological order.
//!
//! All range arithmetic happens in *absolute frame numbers* (frames since
//! stream start): the aging and current segments are adjacent runs of that
//! one monotonic sequence, so a request spanning their boundary concatenates
//! exactly, with no duplicated or missing frame from timestamp rounding.
//!
//! Reads never block and never wait for data: a request outside the window
//! comes back empty with a descriptive [`ClipKind`], not an error.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ring::{CaptureSnapshot, RingStorage, SnapshotCell};

/// How a read request related to the available data window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClipKind {
    /// Fully contained — delivered exactly what was asked.
    RangeOk,
    /// Start predated the oldest frame; the start was clipped forward.
    ClippedTail,
    /// End ran past the newest frame; the end was clipped back.
    ClippedHead,
    /// Clipped at both edges.
    ClippedBothEnds,
    /// The whole request lies before the oldest available frame.
    BeforeData,
    /// The whole request lies at or after the newest frame (or nothing has
    /// been captured yet).
    AfterData,
}

/// Result of a windowed read: the copied samples plus what was actually
/// delivered, so callers can tell "got what I asked for" from "got less".
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Interleaved samples, `frames * channels` long, chronological order.
    pub samples: Vec<f32>,
    /// Wall-clock seconds of the first delivered frame (post-clip). Echoes
    /// the requested start when the result is empty.
    pub start_time: f64,
    /// Seconds of audio actually delivered (zero when empty).
    pub duration: f64,
    /// Frames actually delivered.
    pub frames: u64,
    pub clip: ClipKind,
}

impl Window {
    fn empty(start_time: f64, clip: ClipKind) -> Self {
        Self {
            samples: Vec::new(),
            start_time,
            duration: 0.0,
            frames: 0,
            clip,
        }
    }
}

/// Shared read handle. Cheap to clone; usable from any thread concurrently
/// with capture.
#[derive(Clone)]
pub struct WindowReader {
    storage: Arc<RingStorage>,
    cell: Arc<SnapshotCell>,
    frame_rate: u32,
    channels: usize,
}

impl WindowReader {
    pub(crate) fn new(
        storage: Arc<RingStorage>,
        cell: Arc<SnapshotCell>,
        frame_rate: u32,
        channels: usize,
    ) -> Self {
        Self {
            storage,
            cell,
            frame_rate,
            channels,
        }
    }

    /// The currently readable `(oldest_time, newest_time)` span, or `None`
    /// before the first block is committed.
    pub fn available(&self) -> Option<(f64, f64)> {
        let snap = self.cell.load();
        Some((snap.oldest_time()?, snap.newest_time()?))
    }

    /// Latest committed segment state.
    pub fn snapshot(&self) -> CaptureSnapshot {
        self.cell.load()
    }

    /// Copy out the audio covering `[start_time, start_time + duration)`,
    /// clipped to the available window.
    ///
    /// The lower bound is inclusive, the upper bound exclusive: a request
    /// starting exactly at the oldest tail is `RangeOk`, one starting
    /// exactly at the newest head time is `AfterData`.
    pub fn read_window(&self, start_time: f64, duration: Duration) -> Window {
        let snap = self.cell.load();
        self.read_from_snapshot(&snap, start_time, duration)
    }

    /// Copy out the most recent `duration` of audio, clipped to what exists.
    /// The dominant pattern for periodic file writers and event detectors.
    pub fn read_latest(&self, duration: Duration) -> Window {
        let snap = self.cell.load();
        let Some(newest) = snap.newest_time() else {
            return Window::empty(0.0, ClipKind::AfterData);
        };
        self.read_from_snapshot(&snap, newest - duration.as_secs_f64(), duration)
    }

    fn read_from_snapshot(
        &self,
        snap: &CaptureSnapshot,
        start_time: f64,
        duration: Duration,
    ) -> Window {
        let rate = f64::from(self.frame_rate);
        let available = snap.available_frames();
        if available == 0 {
            return Window::empty(start_time, ClipKind::AfterData);
        }

        // Anchor: the newest absolute frame number corresponds to the
        // current head's arrival time. Everything else is frame arithmetic.
        let newest_abs = snap.total_frames as i64;
        let oldest_abs = newest_abs - available as i64;
        let head_time = snap.current.head_time;

        let req_frames = (duration.as_secs_f64() * rate).round() as i64;
        let fs = newest_abs + ((start_time - head_time) * rate).round() as i64;
        let fe = fs + req_frames;

        if fe <= oldest_abs {
            return Window::empty(start_time, ClipKind::BeforeData);
        }
        if fs >= newest_abs {
            return Window::empty(start_time, ClipKind::AfterData);
        }

        let cs = fs.max(oldest_abs);
        let ce = fe.min(newest_abs);
        let clip = match (fs < oldest_abs, fe > newest_abs) {
            (true, true) => ClipKind::ClippedBothEnds,
            (true, false) => ClipKind::ClippedTail,
            (false, true) => ClipKind::ClippedHead,
            (false, false) => ClipKind::RangeOk,
        };

        let frames = (ce - cs) as u64;
        let mut samples = vec![0.0f32; frames as usize * self.channels];

        // The two segments are adjacent runs of the absolute frame sequence:
        // aging ends where current begins.
        let cur_start_abs = newest_abs - snap.current.len() as i64;
        let mut filled = 0usize;

        if cs < cur_start_abs {
            let aging_start_abs = cur_start_abs - snap.aging.len() as i64;
            let run_frames = (ce.min(cur_start_abs) - cs) as u64;
            let ring_index = snap.aging.tail + (cs - aging_start_abs) as u64;
            let len = run_frames as usize * self.channels;
            self.storage
                .read_frames(ring_index, run_frames, &mut samples[..len]);
            filled = len;
        }
        if ce > cur_start_abs {
            let from_abs = cs.max(cur_start_abs);
            let run_frames = (ce - from_abs) as u64;
            let ring_index = snap.current.tail + (from_abs - cur_start_abs) as u64;
            self.storage
                .read_frames(ring_index, run_frames, &mut samples[filled..]);
        }

        Window {
            samples,
            start_time: head_time + (cs - newest_abs) as f64 / rate,
            duration: frames as f64 / rate,
            frames,
            clip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::Segment;
    use approx::assert_relative_eq;

    const RATE: u32 = 1_000;

    /// Build a reader over a hand-published snapshot: aging holds absolute
    /// frames 10..50 at ring indices 30..70, current holds absolute frames
    /// 50..75 at ring indices 0..25. Sample value == absolute frame number.
    fn fixture() -> WindowReader {
        let storage = Arc::new(RingStorage::new(80, 1));
        let cell = Arc::new(SnapshotCell::new());

        let aging_frames: Vec<f32> = (10..50).map(|f| f as f32).collect();
        storage.write_frames(30, &aging_frames);
        let current_frames: Vec<f32> = (50..75).map(|f| f as f32).collect();
        storage.write_frames(0, &current_frames);

        // 75 total frames written; head_time = 0.075 s at 1 kHz.
        let current = Segment {
            tail: 0,
            head: 25,
            tail_time: 0.050,
            head_time: 0.075,
        };
        let aging = Segment {
            tail: 30,
            head: 70,
            tail_time: 0.010,
            head_time: 0.050,
        };
        cell.publish(&current, &aging, 75);

        WindowReader::new(storage, cell, RATE, 1)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fully_contained_request_is_exact() {
        let reader = fixture();
        let win = reader.read_window(0.055, ms(10));

        assert_eq!(win.clip, ClipKind::RangeOk);
        assert_eq!(win.frames, 10);
        assert_relative_eq!(win.start_time, 0.055, epsilon = 1e-9);
        assert_relative_eq!(win.duration, 0.010, epsilon = 1e-9);
        let expected: Vec<f32> = (55..65).map(|f| f as f32).collect();
        assert_eq!(win.samples, expected);
    }

    #[test]
    fn request_spanning_both_segments_concatenates_without_seams() {
        let reader = fixture();
        let win = reader.read_window(0.040, ms(20));

        assert_eq!(win.clip, ClipKind::RangeOk);
        assert_eq!(win.frames, 20);
        let expected: Vec<f32> = (40..60).map(|f| f as f32).collect();
        assert_eq!(win.samples, expected, "no gap or duplicate at the boundary");
    }

    #[test]
    fn start_clipped_to_oldest() {
        let reader = fixture();
        let win = reader.read_window(0.000, ms(20));

        assert_eq!(win.clip, ClipKind::ClippedTail);
        assert_eq!(win.frames, 10);
        assert_relative_eq!(win.start_time, 0.010, epsilon = 1e-9);
        let expected: Vec<f32> = (10..20).map(|f| f as f32).collect();
        assert_eq!(win.samples, expected);
    }

    #[test]
    fn end_clipped_to_newest() {
        let reader = fixture();
        let win = reader.read_window(0.070, ms(20));

        assert_eq!(win.clip, ClipKind::ClippedHead);
        assert_eq!(win.frames, 5);
        let expected: Vec<f32> = (70..75).map(|f| f as f32).collect();
        assert_eq!(win.samples, expected);
    }

    #[test]
    fn oversized_request_clips_both_ends() {
        let reader = fixture();
        let win = reader.read_window(-1.0, Duration::from_secs(10));

        assert_eq!(win.clip, ClipKind::ClippedBothEnds);
        assert_eq!(win.frames, 65);
        assert_relative_eq!(win.start_time, 0.010, epsilon = 1e-9);
        let expected: Vec<f32> = (10..75).map(|f| f as f32).collect();
        assert_eq!(win.samples, expected);
    }

    #[test]
    fn request_entirely_before_data_is_empty() {
        let reader = fixture();
        // Ends 30 ms before the oldest available frame.
        let win = reader.read_window(-0.040, ms(20));

        assert_eq!(win.clip, ClipKind::BeforeData);
        assert_eq!(win.frames, 0);
        assert_eq!(win.duration, 0.0);
        assert!(win.samples.is_empty());
        assert_relative_eq!(win.start_time, -0.040, epsilon = 1e-9);
    }

    #[test]
    fn request_at_or_after_newest_is_empty() {
        let reader = fixture();

        let at_head = reader.read_window(0.075, ms(10));
        assert_eq!(at_head.clip, ClipKind::AfterData, "upper bound is exclusive");
        assert_eq!(at_head.frames, 0);

        let beyond = reader.read_window(0.200, ms(10));
        assert_eq!(beyond.clip, ClipKind::AfterData);
    }

    #[test]
    fn start_exactly_at_oldest_is_inclusive() {
        let reader = fixture();
        let win = reader.read_window(0.010, ms(5));

        assert_eq!(win.clip, ClipKind::RangeOk, "lower bound is inclusive");
        assert_eq!(win.samples, vec![10.0, 11.0, 12.0, 13.0, 14.0]);
    }

    #[test]
    fn identical_requests_return_identical_results() {
        let reader = fixture();
        let a = reader.read_window(0.030, ms(25));
        let b = reader.read_window(0.030, ms(25));
        assert_eq!(a, b);
    }

    #[test]
    fn zero_duration_inside_the_window_is_range_ok_and_empty() {
        let reader = fixture();
        let win = reader.read_window(0.050, ms(0));
        assert_eq!(win.clip, ClipKind::RangeOk);
        assert_eq!(win.frames, 0);
        assert!(win.samples.is_empty());
    }

    #[test]
    fn read_latest_returns_the_newest_window() {
        let reader = fixture();
        let win = reader.read_latest(ms(10));

        assert_eq!(win.clip, ClipKind::RangeOk);
        let expected: Vec<f32> = (65..75).map(|f| f as f32).collect();
        assert_eq!(win.samples, expected);
    }

    #[test]
    fn read_latest_longer_than_history_clips_tail() {
        let reader = fixture();
        let win = reader.read_latest(Duration::from_secs(1));

        assert_eq!(win.clip, ClipKind::ClippedTail);
        assert_eq!(win.frames, 65);
    }

    #[test]
    fn empty_ring_reports_after_data() {
        let storage = Arc::new(RingStorage::new(16, 1));
        let cell = Arc::new(SnapshotCell::new());
        let reader = WindowReader::new(storage, cell, RATE, 1);

        assert_eq!(reader.available(), None);
        let win = reader.read_window(0.0, ms(10));
        assert_eq!(win.clip, ClipKind::AfterData);
        assert_eq!(win.frames, 0);

        let latest = reader.read_latest(ms(10));
        assert_eq!(latest.clip, ClipKind::AfterData);
    }

    #[test]
    fn available_reports_the_readable_span() {
        let reader = fixture();
        let (oldest, newest) = reader.available().expect("data exists");
        assert_relative_eq!(oldest, 0.010, epsilon = 1e-9);
        assert_relative_eq!(newest, 0.075, epsilon = 1e-9);
    }

    #[test]
    fn multi_channel_windows_stay_interleaved() {
        let storage = Arc::new(RingStorage::new(32, 2));
        let cell = Arc::new(SnapshotCell::new());

        // 8 frames, channel 0 carries the frame number, channel 1 its negative.
        let samples: Vec<f32> = (0..8).flat_map(|f| [f as f32, -(f as f32)]).collect();
        storage.write_frames(0, &samples);
        let current = Segment {
            tail: 0,
            head: 8,
            tail_time: 0.0,
            head_time: 0.008,
        };
        cell.publish(&current, &Segment::empty(), 8);

        let reader = WindowReader::new(storage, cell, RATE, 2);
        let win = reader.read_window(0.002, ms(3));

        assert_eq!(win.clip, ClipKind::RangeOk);
        assert_eq!(win.frames, 3);
        assert_eq!(win.samples, vec![2.0, -2.0, 3.0, -3.0, 4.0, -4.0]);
    }
}
