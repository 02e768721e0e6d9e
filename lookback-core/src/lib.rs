//! # lookback-core
//!
//! Time-addressed lookback buffer for live audio capture.
//!
//! Keeps the most recent N seconds of a capture stream addressable by
//! absolute wall-clock time, so consumers can ask for "the audio from
//! 12.5 s to 15.0 s" after the fact — the save-what-just-happened primitive
//! behind lookback recording and event-triggered clip extraction.
//!
//! ## Architecture
//!
//! ```text
//! capture callback → CaptureWriter::push_block ─┬─► RingStorage (samples)
//!       (real-time thread, never blocks)        ├─► SnapshotCell (segment bounds)
//!                                               └─► WakeSignal (bounded(1) try_send)
//!                                                        │
//!                                               notify worker thread
//!                                                ├─► broadcast::Sender<CaptureEvent>
//!                                                └─► registered observers
//!
//! WindowReader::read_window(start_time, duration)   (any thread, lock-free)
//! ```
//!
//! The capture path is zero-alloc and lock-free. All heap work — event
//! broadcast, observer callbacks — happens on the notify worker thread.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod notify;
pub mod query;
pub mod ring;
pub mod stream;

// Convenience re-exports for downstream crates
pub use capture::{CaptureWriter, Fault};
pub use config::RingConfig;
pub use error::{LookbackError, Result};
pub use events::CaptureEvent;
pub use notify::worker::ObserverId;
pub use query::{ClipKind, Window, WindowReader};
pub use ring::CaptureSnapshot;
pub use stream::CaptureStream;
