//! RowStore Core: in-memory row store with background snapshots
//!
//! A thread-safe table of positional string rows kept in RAM and mirrored to
//! a flat delimited-text file by a background thread.
//!
//! # Architecture
//!
//! - **Read path**: linear scan of the in-memory rows under one mutex
//! - **Write path**: mutate under the mutex, release it, then raise a
//!   coalescing change signal that never blocks
//! - **Persistence worker**: wakes once per burst of changes and rewrites the
//!   whole snapshot; `close()` waits for the final write and file close
//!
//! # Durability
//!
//! There is no write-ahead log. Changes made after the last completed flush
//! are lost if the process dies before the next one. `close()` always writes
//! pending changes before returning.
//!
//! ```rust,no_run
//! use rowstore_core::{Config, RowStore};
//!
//! let store = RowStore::open("people.csv", Config::default())?;
//! store.insert(vec!["ann".into(), "1".into()]);
//! let ann = store.select(1, "1")?;
//! store.close()?;
//! # Ok::<(), rowstore_core::StoreError>(())
//! ```

pub mod codec;
pub mod config;
pub mod durability;
pub mod engine;
pub mod error;
pub mod format;
pub mod rowset;
pub mod signal;
pub mod snapshot;
pub mod table;
pub mod worker;

// Re-export key types for convenience
pub use codec::{RawRows, RowCodec};
pub use config::Config;
pub use durability::SyncMode;
pub use engine::RowStore;
pub use error::{StoreError, StoreResult};
pub use format::Row;
pub use rowset::RowSet;
pub use signal::ChangeSignal;
pub use snapshot::{MemorySink, SnapshotFile, SnapshotSink};
pub use table::Table;
pub use worker::{WorkerHandle, WorkerState};
