//! Background notify worker loop.
//!
//! Runs on its own dedicated thread, entirely outside the time-critical
//! path. One iteration per wake: load the latest snapshot, broadcast a
//! [`CaptureEvent`], invoke registered observers. Observer panics are caught
//! and counted so one misbehaving subscriber cannot kill the loop or starve
//! notification to the others.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::{select, Receiver};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::NotifyDiagnostics;
use crate::events::CaptureEvent;
use crate::ring::SnapshotCell;

/// Handle for unregistering an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(pub(crate) u64);

pub(crate) struct Observer {
    pub(crate) id: u64,
    pub(crate) callback: Box<dyn FnMut(&CaptureEvent) + Send>,
}

pub(crate) type ObserverRegistry = Arc<Mutex<Vec<Observer>>>;

/// Everything the worker loop needs, passed as one struct.
pub(crate) struct WorkerContext {
    pub cell: Arc<SnapshotCell>,
    pub wake_rx: Receiver<()>,
    pub stop_rx: Receiver<()>,
    pub events_tx: broadcast::Sender<CaptureEvent>,
    pub observers: ObserverRegistry,
    pub diagnostics: Arc<NotifyDiagnostics>,
}

/// Run until the stop channel fires or both channels disconnect.
pub(crate) fn run(ctx: WorkerContext) {
    info!("notify worker started");
    let mut seq = 0u64;

    loop {
        select! {
            recv(ctx.wake_rx) -> msg => {
                if msg.is_err() {
                    // Writer side gone — nothing will ever wake us again.
                    break;
                }
                ctx.diagnostics.wakeups.fetch_add(1, Ordering::Relaxed);

                let snapshot = ctx.cell.load();
                let event = CaptureEvent { seq, snapshot };
                seq += 1;

                // Err just means no broadcast receiver is currently
                // subscribed; observers below still run.
                let _ = ctx.events_tx.send(event);
                ctx.diagnostics.events_sent.fetch_add(1, Ordering::Relaxed);

                let mut observers = ctx.observers.lock();
                for observer in observers.iter_mut() {
                    let result = catch_unwind(AssertUnwindSafe(|| (observer.callback)(&event)));
                    if result.is_err() {
                        ctx.diagnostics.observer_panics.fetch_add(1, Ordering::Relaxed);
                        warn!(observer_id = observer.id, "observer panicked; continuing");
                    }
                }
            }
            recv(ctx.stop_rx) -> _ => {
                debug!("stop requested");
                break;
            }
        }
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        wakeups = snap.wakeups,
        events_sent = snap.events_sent,
        observer_panics = snap.observer_panics,
        "notify worker stopped"
    );
}
