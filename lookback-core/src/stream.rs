//! `CaptureStream` — top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! CaptureStream::new(config)   → ring allocated, notify worker spawned
//!     ├─► writer()             → the one real-time producer handle
//!     ├─► reader() / subscribe() / add_observer()   (any number, any time)
//!     └─► stop()               → worker joined; readers keep working
//! ```
//!
//! `stop()` is idempotent in the error-returning sense: calling it on an
//! already-stopped stream returns `NotRunning` rather than panicking. Reads
//! remain valid after stop — the ring and its last published snapshot
//! outlive the worker.
//!
//! ## Threading
//!
//! The stream handle is `Send + Sync`; all mutable state is behind interior
//! mutability. The [`CaptureWriter`] is deliberately *moved out* (once) so
//! the real-time path owns its state without any shared locking.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    capture::{CaptureWriter, Fault, FaultFlag},
    config::RingConfig,
    error::{LookbackError, Result},
    events::CaptureEvent,
    notify::{
        wake_channel,
        worker::{self, Observer, ObserverId, ObserverRegistry, WorkerContext},
        NotifyDiagnostics, NotifySnapshot,
    },
    query::WindowReader,
    ring::{CaptureSnapshot, RingStorage, SnapshotCell},
};

/// Broadcast channel capacity: 256 capture events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// The top-level stream handle.
///
/// Wrap in `Arc<CaptureStream>` to share between the component that owns the
/// capture callback and the components that read or subscribe.
pub struct CaptureStream {
    config: RingConfig,
    storage: Arc<RingStorage>,
    cell: Arc<SnapshotCell>,
    fault: FaultFlag,
    /// The single producer handle, present until `writer()` takes it.
    writer: Mutex<Option<CaptureWriter>>,
    events_tx: broadcast::Sender<CaptureEvent>,
    observers: ObserverRegistry,
    next_observer_id: AtomicU64,
    diagnostics: Arc<NotifyDiagnostics>,
    /// `true` while the notify worker is alive.
    running: Arc<AtomicBool>,
    stop_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureStream {
    /// Allocate the ring and spawn the notify worker.
    ///
    /// All capture memory is allocated here, before any real-time work
    /// begins. The stream is immediately live: the first `push_block` on the
    /// writer makes data readable.
    ///
    /// # Errors
    /// Configuration errors only; see [`RingConfig::validate`].
    pub fn new(config: RingConfig) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(RingStorage::new(config.capacity_frames(), config.channels));
        let cell = Arc::new(SnapshotCell::new());
        let fault = FaultFlag::default();
        let (events_tx, _) = broadcast::channel(BROADCAST_CAP);
        let observers: ObserverRegistry = Arc::new(Mutex::new(Vec::new()));
        let diagnostics = Arc::new(NotifyDiagnostics::default());

        let (wake, wake_rx) = wake_channel();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let writer = CaptureWriter::new(
            &config,
            Arc::clone(&storage),
            Arc::clone(&cell),
            wake,
            fault.clone(),
        );

        let ctx = WorkerContext {
            cell: Arc::clone(&cell),
            wake_rx,
            stop_rx,
            events_tx: events_tx.clone(),
            observers: Arc::clone(&observers),
            diagnostics: Arc::clone(&diagnostics),
        };
        let handle = std::thread::Builder::new()
            .name("lookback-notify".into())
            .spawn(move || worker::run(ctx))?;

        info!(
            channels = config.channels,
            frame_rate = config.frame_rate,
            retention_frames = config.retention_frames,
            gap_frames = config.gap_frames,
            capacity_frames = config.capacity_frames(),
            "capture stream created"
        );

        Ok(Self {
            config,
            storage,
            cell,
            fault,
            writer: Mutex::new(Some(writer)),
            events_tx,
            observers,
            next_observer_id: AtomicU64::new(0),
            diagnostics,
            running: Arc::new(AtomicBool::new(true)),
            stop_tx: Mutex::new(Some(stop_tx)),
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    /// Take the real-time producer handle. There is exactly one; move it
    /// into the capture callback.
    ///
    /// # Errors
    /// `WriterAlreadyTaken` on the second and later calls.
    pub fn writer(&self) -> Result<CaptureWriter> {
        self.writer
            .lock()
            .take()
            .ok_or(LookbackError::WriterAlreadyTaken)
    }

    /// A shared read handle. Cheap; create as many as needed.
    pub fn reader(&self) -> WindowReader {
        WindowReader::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.cell),
            self.config.frame_rate,
            self.config.channels,
        )
    }

    /// Subscribe to capture events. Each subscriber gets every event from
    /// subscription onward; slow subscribers may observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events_tx.subscribe()
    }

    /// Register a callback invoked on the notify worker thread after each
    /// committed block. Panics in the callback are caught and counted.
    pub fn add_observer<F>(&self, callback: F) -> ObserverId
    where
        F: FnMut(&CaptureEvent) + Send + 'static,
    {
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().push(Observer {
            id,
            callback: Box::new(callback),
        });
        ObserverId(id)
    }

    /// Unregister a previously added observer. Returns `false` if the id is
    /// unknown (already removed).
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| o.id != id.0);
        observers.len() != before
    }

    /// Latest committed segment state, identical to what readers see.
    pub fn snapshot(&self) -> CaptureSnapshot {
        self.cell.load()
    }

    /// The sticky capture fault, if one has latched.
    pub fn fault(&self) -> Option<Fault> {
        self.fault.get()
    }

    pub fn has_fault(&self) -> bool {
        self.fault.get().is_some()
    }

    /// Notify-worker counters.
    pub fn diagnostics(&self) -> NotifySnapshot {
        self.diagnostics.snapshot()
    }

    /// Stop the notify worker and join its thread. Readers and any
    /// already-taken writer stay functional, but no further events or
    /// observer calls are delivered.
    ///
    /// # Errors
    /// `NotRunning` if the stream was already stopped.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(LookbackError::NotRunning);
        }

        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("notify worker thread panicked before join");
            }
        }
        info!("capture stream stopped");
        Ok(())
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small_config() -> RingConfig {
        RingConfig {
            channels: 1,
            frame_rate: 1_000,
            retention_frames: 200,
            gap_frames: 40,
        }
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = RingConfig {
            channels: 0,
            ..small_config()
        };
        assert!(matches!(
            CaptureStream::new(config),
            Err(LookbackError::InvalidChannelCount(0))
        ));
    }

    #[test]
    fn writer_can_only_be_taken_once() {
        let stream = CaptureStream::new(small_config()).unwrap();
        let _writer = stream.writer().expect("first take succeeds");
        assert!(matches!(
            stream.writer(),
            Err(LookbackError::WriterAlreadyTaken)
        ));
    }

    #[test]
    fn pushed_audio_becomes_readable() {
        let stream = CaptureStream::new(small_config()).unwrap();
        let mut writer = stream.writer().unwrap();

        let block: Vec<f32> = (0..20).map(|i| i as f32).collect();
        writer.push_block(&block, 0.020);

        let reader = stream.reader();
        let win = reader.read_latest(Duration::from_millis(20));
        assert_eq!(win.frames, 20);
        assert_eq!(win.samples, block);
        assert!(stream.fault().is_none());
    }

    #[test]
    fn observers_receive_events_until_removed() {
        let stream = CaptureStream::new(small_config()).unwrap();
        let seen = Arc::new(AtomicU64::new(0));
        let seen_in_observer = Arc::clone(&seen);
        let id = stream.add_observer(move |event| {
            seen_in_observer.store(event.snapshot.total_frames, Ordering::Relaxed);
        });

        let mut writer = stream.writer().unwrap();
        writer.push_block(&[0.0; 10], 0.010);

        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while seen.load(Ordering::Relaxed) != 10 {
            assert!(std::time::Instant::now() < deadline, "observer never ran");
            std::thread::sleep(Duration::from_millis(2));
        }

        assert!(stream.remove_observer(id));
        assert!(!stream.remove_observer(id), "second removal finds nothing");
    }

    #[test]
    fn diagnostics_count_worker_activity() {
        let stream = CaptureStream::new(small_config()).unwrap();
        let mut events = stream.subscribe();
        let mut writer = stream.writer().unwrap();

        for _ in 0..5 {
            writer.push_block(&[0.0; 10], 0.0);
        }

        // Wakes coalesce, so wait until the worker has reported the final
        // state rather than counting one event per block.
        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        loop {
            match events.try_recv() {
                Ok(event) if event.snapshot.total_frames == 50 => break,
                Ok(_) | Err(broadcast::error::TryRecvError::Empty) => {
                    assert!(
                        std::time::Instant::now() < deadline,
                        "worker never announced the final snapshot"
                    );
                    std::thread::sleep(Duration::from_millis(2));
                }
                Err(e) => panic!("event channel failed: {e}"),
            }
        }

        let diag = stream.diagnostics();
        assert!(diag.wakeups >= 1, "at least one wake was processed");
        assert!(
            diag.events_sent >= 1 && diag.events_sent <= diag.wakeups,
            "events track wakes: {diag:?}"
        );
        assert_eq!(diag.observer_panics, 0);
    }

    #[test]
    fn stop_is_an_error_when_already_stopped() {
        let stream = CaptureStream::new(small_config()).unwrap();
        stream.stop().expect("first stop succeeds");
        assert!(matches!(stream.stop(), Err(LookbackError::NotRunning)));
    }

    #[test]
    fn reads_survive_stop() {
        let stream = CaptureStream::new(small_config()).unwrap();
        let mut writer = stream.writer().unwrap();
        writer.push_block(&[1.0; 50], 0.050);
        stream.stop().unwrap();

        let win = stream.reader().read_latest(Duration::from_millis(50));
        assert_eq!(win.frames, 50);
        assert_eq!(win.samples, vec![1.0; 50]);
    }
}
