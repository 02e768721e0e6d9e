//! Events broadcast to background consumers when new audio is committed.

use serde::{Deserialize, Serialize};

use crate::ring::CaptureSnapshot;

/// Broadcast after the notify worker observes newly committed audio.
///
/// Consecutive capture blocks may coalesce into one event; the embedded
/// snapshot is always the latest committed state at the time the worker
/// woke, so consumers can treat each event as "this much is now readable".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// The just-committed segment state.
    pub snapshot: CaptureSnapshot,
}
