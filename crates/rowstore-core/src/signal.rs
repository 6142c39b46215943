//! Coalescing change signal between mutators and the flush thread
//!
//! Holds two flags under one short-lived mutex:
//! - `pending`: at least one mutation happened since the last flush began.
//!   Setting it when already set is a no-op, so a burst of mutations costs
//!   one flush.
//! - `shutdown`: the owner asked the flush thread to stop. This flag is never
//!   cleared or coalesced away, so the request cannot be missed.
//!
//! `notify` never waits for the consumer. It only contends with other
//! `notify` calls and the consumer's own check, each of which holds the mutex
//! for a few instructions.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

/// What woke the flush thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Mutations are pending; the flag has been cleared for this flush
    Flush,
    /// Shutdown requested. `pending` reports whether unflushed mutations remained.
    Shutdown { pending: bool },
}

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    shutdown: bool,
}

/// Single-slot change notification with a sticky shutdown request.
#[derive(Debug, Default)]
pub struct ChangeSignal {
    state: Mutex<SignalState>,
    condvar: Condvar,
    /// Total notifications received
    notified: AtomicU64,
    /// Notifications merged into one that was already pending
    coalesced: AtomicU64,
}

impl ChangeSignal {
    /// Create a signal with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the row set changed and wake the flush thread.
    pub fn notify(&self) {
        self.notified.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if state.pending {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return;
        }
        state.pending = true;
        self.condvar.notify_one();
    }

    /// Ask the flush thread to stop after its current flush.
    pub fn request_shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.condvar.notify_one();
    }

    /// Block until there is work, consuming the pending flag.
    ///
    /// Shutdown wins over a pending flush, but the caller is told about the
    /// pending mutations so it can write them before closing.
    pub fn wait(&self) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                let pending = std::mem::take(&mut state.pending);
                return Wake::Shutdown { pending };
            }
            if state.pending {
                state.pending = false;
                return Wake::Flush;
            }
            self.condvar.wait(&mut state);
        }
    }

    /// True if a mutation is waiting to be flushed.
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// True once `request_shutdown` has been called.
    pub fn is_shutdown_requested(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Total notifications received.
    pub fn notify_count(&self) -> u64 {
        self.notified.load(Ordering::Relaxed)
    }

    /// Notifications that were merged into an already pending one.
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}
