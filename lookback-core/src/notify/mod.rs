//! Hand-off from the real-time capture path to the background notify worker.
//!
//! The signal is a bounded(1) crossbeam channel: `signal()` is a `try_send`,
//! which never blocks and never allocates. A send onto a full channel simply
//! fails, which is the intended coalescing behavior — the worker only needs
//! to observe the *latest* snapshot, not replay every block, so any number
//! of signals arriving before it wakes collapse into one pending wake.

pub mod worker;

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Producer side of the wake hand-off. Held by the capture writer.
#[derive(Clone)]
pub struct WakeSignal {
    tx: Sender<()>,
}

impl WakeSignal {
    /// Wake the background worker. Callable from the real-time context:
    /// non-blocking, allocation-free, and coalescing when a wake is already
    /// pending.
    pub fn signal(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {}
        }
    }
}

/// Create the wake channel pair: the signal for the writer and the receiver
/// the worker selects on.
pub(crate) fn wake_channel() -> (WakeSignal, Receiver<()>) {
    let (tx, rx) = bounded(1);
    (WakeSignal { tx }, rx)
}

/// Counters maintained by the notify worker, shared for observability.
#[derive(Default)]
pub struct NotifyDiagnostics {
    pub wakeups: AtomicUsize,
    pub events_sent: AtomicUsize,
    pub observer_panics: AtomicUsize,
}

impl NotifyDiagnostics {
    pub fn snapshot(&self) -> NotifySnapshot {
        NotifySnapshot {
            wakeups: self.wakeups.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            observer_panics: self.observer_panics.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifySnapshot {
    pub wakeups: usize,
    pub events_sent: usize,
    pub observer_panics: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_coalesce_instead_of_queueing() {
        let (signal, rx) = wake_channel();
        signal.signal();
        signal.signal();
        signal.signal();

        assert_eq!(rx.try_recv(), Ok(()));
        assert!(rx.try_recv().is_err(), "later signals were absorbed");
    }

    #[test]
    fn signal_after_worker_exit_is_a_no_op() {
        let (signal, rx) = wake_channel();
        drop(rx);
        signal.signal();
    }
}
