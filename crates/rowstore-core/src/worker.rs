//! Persistence worker: background flush from RAM to the snapshot sink
//!
//! One dedicated thread per store. It sleeps on the [`ChangeSignal`] and, for
//! each wake-up:
//!
//! 1. `Flush`: copies the row set while holding the store mutex, releases the
//!    mutex, then rewrites the sink with the copy.
//! 2. `Shutdown`: writes one last snapshot if mutations are still pending,
//!    closes the sink and returns the close result through the join handle.
//!
//! The shutdown flag is only examined between flushes, so a write in progress
//! always completes. A failed rewrite is fatal: the worker records the error,
//! closes the sink, and exits without retrying, because the file's state is
//! unknown after a partial write.
//!
//! Durability gap: rows mutated after the last completed flush exist only in
//! RAM. A crash before the next flush loses them.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::format::Row;
use crate::rowset::RowSet;
use crate::signal::{ChangeSignal, Wake};
use crate::snapshot::SnapshotSink;

/// Lifecycle of the flush thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for a change or shutdown
    Idle = 0,
    /// Writing a snapshot
    Flushing = 1,
    /// Sink closed; no further flushes
    Closed = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Flushing,
            _ => WorkerState::Closed,
        }
    }
}

/// Counters and status shared between the flush thread and the store.
#[derive(Debug)]
pub struct WorkerStats {
    state: AtomicU8,
    /// Completed rewrites since start
    flushes: AtomicU64,
    /// Rows written across all rewrites
    rows_written: AtomicU64,
    /// Error that stopped the worker, if any
    fatal: Mutex<Option<StoreError>>,
}

impl WorkerStats {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Idle as u8),
            flushes: AtomicU64::new(0),
            rows_written: AtomicU64::new(0),
            fatal: Mutex::new(None),
        }
    }

    /// Current worker state.
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Completed rewrites since start.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Acquire)
    }

    /// Rows written across all rewrites.
    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    /// The persistence failure that stopped the worker.
    pub fn fatal_error(&self) -> Option<StoreError> {
        self.fatal.lock().clone()
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn record_flush(&self, rows: usize) {
        self.rows_written.fetch_add(rows as u64, Ordering::Relaxed);
        self.flushes.fetch_add(1, Ordering::Release);
    }
}

/// Handle to a running flush thread.
/// Dropping it requests shutdown and waits for the thread.
pub struct WorkerHandle {
    signal: Arc<ChangeSignal>,
    stats: Arc<WorkerStats>,
    thread: Option<thread::JoinHandle<StoreResult<()>>>,
}

impl WorkerHandle {
    /// Request shutdown and block until the sink is closed.
    ///
    /// Returns the fatal flush error if the worker had already stopped,
    /// otherwise the result of the final flush and close.
    pub fn shutdown(mut self) -> StoreResult<()> {
        self.finish()
    }

    fn finish(&mut self) -> StoreResult<()> {
        self.signal.request_shutdown();
        match self.thread.take() {
            Some(handle) => handle.join().unwrap_or(Err(StoreError::WorkerPanicked)),
            None => Ok(()),
        }
    }

    /// Check if the flush thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Shared counters and status.
    ///
    /// The counters stay readable after `shutdown` through a cloned `Arc`.
    pub fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.finish() {
                warn!(error = %e, "persistence worker reported an error during implicit shutdown");
            }
        }
    }
}

/// Start the flush thread for `rows`, writing snapshots to `sink`.
///
/// `signal` must be the same signal the store notifies on every mutation.
pub fn start_worker(
    rows: Arc<Mutex<RowSet>>,
    signal: Arc<ChangeSignal>,
    sink: Box<dyn SnapshotSink>,
    config: &Config,
) -> StoreResult<WorkerHandle> {
    let stats = Arc::new(WorkerStats::new());

    let thread = {
        let signal = Arc::clone(&signal);
        let stats = Arc::clone(&stats);
        thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || worker_loop(rows, signal, sink, stats))
            .map_err(|e| StoreError::WorkerSpawn { message: e.to_string() })?
    };

    Ok(WorkerHandle {
        signal,
        stats,
        thread: Some(thread),
    })
}

/// Main loop, runs on the flush thread.
fn worker_loop(
    rows: Arc<Mutex<RowSet>>,
    signal: Arc<ChangeSignal>,
    mut sink: Box<dyn SnapshotSink>,
    stats: Arc<WorkerStats>,
) -> StoreResult<()> {
    loop {
        match signal.wait() {
            Wake::Flush => {
                if let Err(e) = flush(&rows, sink.as_mut(), &stats) {
                    return fail(e, sink, &stats);
                }
            }
            Wake::Shutdown { pending } => {
                if pending {
                    if let Err(e) = flush(&rows, sink.as_mut(), &stats) {
                        return fail(e, sink, &stats);
                    }
                }
                stats.set_state(WorkerState::Closed);
                let result = sink.close();
                match &result {
                    Ok(()) => info!(flushes = stats.flush_count(), "persistence worker closed"),
                    Err(e) => error!(error = %e, "closing snapshot failed"),
                }
                return result;
            }
        }
    }
}

/// Write one full snapshot. The row set lock is held only for the copy.
fn flush(
    rows: &Mutex<RowSet>,
    sink: &mut dyn SnapshotSink,
    stats: &WorkerStats,
) -> StoreResult<()> {
    stats.set_state(WorkerState::Flushing);

    let snapshot: Vec<Row> = rows.lock().rows().to_vec();
    sink.rewrite(&snapshot)?;

    stats.record_flush(snapshot.len());
    stats.set_state(WorkerState::Idle);
    debug!(rows = snapshot.len(), "snapshot flushed");
    Ok(())
}

fn fail(err: StoreError, sink: Box<dyn SnapshotSink>, stats: &WorkerStats) -> StoreResult<()> {
    error!(error = %err, "snapshot flush failed, persistence worker stopping");
    *stats.fatal.lock() = Some(err.clone());
    stats.set_state(WorkerState::Closed);
    if let Err(close_err) = sink.close() {
        warn!(error = %close_err, "closing snapshot after failed flush also failed");
    }
    Err(err)
}
