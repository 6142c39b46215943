//! Core row store: the in-memory table and its persistence worker.
//!
//! RowStore combines an in-memory row set with a background persistence
//! worker that mirrors it to a snapshot file.
//!
//! **Read path**: lock, scan, clone matches, unlock
//! **Write path**: lock, scan and mutate, unlock, then notify the worker
//! **Background**: the worker rewrites the whole snapshot once per burst of changes

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::format::Row;
use crate::rowset::RowSet;
use crate::signal::ChangeSignal;
use crate::snapshot::{SnapshotFile, SnapshotSink};
use crate::worker::{start_worker, WorkerHandle, WorkerState};

/// Thread-safe row store mirrored to a snapshot sink.
///
/// All public methods take `&self` for concurrent access.
/// A single mutex linearizes every read and write of the row set; it is
/// released before the change notification goes out, so a slow flush never
/// holds up callers.
pub struct RowStore {
    /// Rows in memory, only touched under this mutex
    rows: Arc<Mutex<RowSet>>,
    /// Coalescing change notification shared with the worker
    signal: Arc<ChangeSignal>,
    /// Background persistence worker
    worker: WorkerHandle,
}

impl RowStore {
    /// Open or create a snapshot file at `path` and start persisting to it.
    ///
    /// Every row in an existing file is decoded before this returns; a
    /// malformed file aborts the open.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StoreResult<Self> {
        config.validate()?;
        let (file, rows) = SnapshotFile::open(path.as_ref(), &config)?;
        info!(path = %path.as_ref().display(), rows = rows.len(), "opened row store");
        Self::with_sink(rows, Box::new(file), config)
    }

    /// Seed the store with previously loaded rows and persist to `sink`.
    pub fn with_sink(
        initial_rows: Vec<Row>,
        sink: Box<dyn SnapshotSink>,
        config: Config,
    ) -> StoreResult<Self> {
        config.validate()?;
        let rows = Arc::new(Mutex::new(RowSet::from_rows(initial_rows)));
        let signal = Arc::new(ChangeSignal::new());
        let worker = start_worker(Arc::clone(&rows), Arc::clone(&signal), sink, &config)?;
        Ok(Self { rows, signal, worker })
    }

    /// Copy of every row in current order.
    pub fn all(&self) -> Vec<Row> {
        self.rows.lock().rows().to_vec()
    }

    /// First row whose `col` field equals `id`, or `None`.
    pub fn select(&self, col: usize, id: &str) -> StoreResult<Option<Row>> {
        let rows = self.rows.lock();
        Ok(rows.select(col, id)?.cloned())
    }

    /// Every row whose `col` field equals `value`, in current order.
    pub fn select_all(&self, col: usize, value: &str) -> StoreResult<Vec<Row>> {
        let rows = self.rows.lock();
        Ok(rows.select_all(col, value)?.into_iter().cloned().collect())
    }

    /// Append a row. Keys are not checked for uniqueness.
    pub fn insert(&self, row: Row) {
        self.rows.lock().insert(row);
        self.signal.notify();
    }

    /// Append a batch under one lock acquisition with one notification.
    pub fn insert_all(&self, rows: Vec<Row>) {
        if rows.is_empty() {
            return;
        }
        self.rows.lock().insert_all(rows);
        self.signal.notify();
    }

    /// Replace the first row whose `col` field equals `id`.
    pub fn update(&self, col: usize, id: &str, new_row: Row) -> StoreResult<()> {
        self.mutate(|rows| rows.update(col, id, new_row))
    }

    /// Replace every matching row with a copy of `new_row`. Returns the count.
    pub fn update_all(&self, col: usize, value: &str, new_row: Row) -> StoreResult<usize> {
        self.mutate(|rows| rows.update_all(col, value, new_row))
    }

    /// Remove the first matching row, moving the last row into its slot.
    pub fn delete(&self, col: usize, id: &str) -> StoreResult<Row> {
        self.mutate(|rows| rows.delete(col, id))
    }

    /// Remove every matching row. Returns the count.
    pub fn delete_all(&self, col: usize, value: &str) -> StoreResult<usize> {
        self.mutate(|rows| rows.delete_all(col, value))
    }

    /// Run `op` under the lock; notify only if it succeeded.
    fn mutate<T>(&self, op: impl FnOnce(&mut RowSet) -> StoreResult<T>) -> StoreResult<T> {
        let result = {
            let mut rows = self.rows.lock();
            op(&mut rows)?
        };
        self.signal.notify();
        Ok(result)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Returns true if the store has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// True if a change is waiting for the worker to flush it.
    pub fn has_pending_changes(&self) -> bool {
        self.signal.is_pending()
    }

    /// Completed snapshot rewrites since open.
    pub fn flush_count(&self) -> u64 {
        self.worker.stats().flush_count()
    }

    /// Mutation notifications sent to the worker since open.
    pub fn notify_count(&self) -> u64 {
        self.signal.notify_count()
    }

    /// Current state of the persistence worker.
    pub fn worker_state(&self) -> WorkerState {
        self.worker.stats().state()
    }

    /// The flush failure that stopped the worker, if one occurred.
    ///
    /// Once set, later mutations still apply in memory but are never written.
    pub fn persistence_error(&self) -> Option<StoreError> {
        self.worker.stats().fatal_error()
    }

    /// Stop the worker and close the snapshot.
    ///
    /// Blocks until any in-flight flush finishes, pending changes are
    /// written, and the sink is closed. Consuming `self` rules out mutation
    /// after close and double close.
    pub fn close(self) -> StoreResult<()> {
        let stats = Arc::clone(self.worker.stats());
        let result = self.worker.shutdown();
        info!(flushes = stats.flush_count(), ok = result.is_ok(), "closed row store");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemorySink;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn row(fields: &[&str]) -> Row {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn memory_store() -> (RowStore, MemorySink) {
        let sink = MemorySink::new();
        let store = RowStore::with_sink(Vec::new(), Box::new(sink.clone()), Config::relaxed())
            .unwrap();
        (store, sink)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_open_empty() {
        let dir = TempDir::new().unwrap();
        let store = RowStore::open(dir.path().join("t.csv"), Config::default()).unwrap();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert!(!store.has_pending_changes());
        assert_eq!(store.worker_state(), WorkerState::Idle);
        store.close().unwrap();
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config = Config::default().with_delimiter(b'"');
        assert!(matches!(
            RowStore::open(dir.path().join("t.csv"), config),
            Err(StoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_insert_select() {
        let (store, _sink) = memory_store();
        store.insert(row(&["name1", "id1", "x"]));
        assert_eq!(store.select(1, "id1").unwrap(), Some(row(&["name1", "id1", "x"])));
        assert_eq!(store.select(1, "id2").unwrap(), None);
        assert_eq!(store.len(), 1);
        store.close().unwrap();
    }

    #[test]
    fn test_insert_preserves_order() {
        let (store, _sink) = memory_store();
        for i in 0..50 {
            store.insert(row(&[&i.to_string()]));
        }
        let all = store.all();
        for (i, r) in all.iter().enumerate() {
            assert_eq!(r[0], i.to_string());
        }
        store.close().unwrap();
    }

    #[test]
    fn test_failed_mutation_does_not_notify() {
        let (store, sink) = memory_store();
        assert!(store.update(0, "missing", row(&["x"])).is_err());
        assert!(store.delete(0, "missing").is_err());
        assert!(store.delete_all(0, "missing").is_err());
        assert!(store.update_all(0, "missing", row(&["x"])).is_err());
        store.insert_all(Vec::new());
        assert_eq!(store.notify_count(), 0);

        store.close().unwrap();
        assert_eq!(sink.rewrites(), 0);
    }

    #[test]
    fn test_short_row_bulk_mutation_does_not_notify() {
        let sink = MemorySink::new();
        let seed = vec![row(&["a", "1"]), row(&["a"])];
        let store = RowStore::with_sink(seed.clone(), Box::new(sink.clone()), Config::relaxed())
            .unwrap();

        assert!(matches!(
            store.delete_all(1, "1"),
            Err(StoreError::ColumnOutOfRange { row_index: 1, .. })
        ));
        assert!(matches!(
            store.update_all(1, "1", row(&["b", "2"])),
            Err(StoreError::ColumnOutOfRange { row_index: 1, .. })
        ));
        assert_eq!(store.all(), seed);
        assert_eq!(store.notify_count(), 0);

        store.close().unwrap();
        assert_eq!(sink.rewrites(), 0);
    }

    #[test]
    fn test_reads_do_not_notify() {
        let (store, _sink) = memory_store();
        store.insert(row(&["a", "1"]));
        let before = store.notify_count();
        let _ = store.all();
        let _ = store.select(0, "a").unwrap();
        let _ = store.select_all(0, "a").unwrap();
        let _ = store.select(9, "a");
        assert_eq!(store.notify_count(), before);
        store.close().unwrap();
    }

    #[test]
    fn test_background_flush_mirrors_memory() {
        let (store, sink) = memory_store();
        store.insert(row(&["a", "1"]));
        store.insert_all(vec![row(&["b", "2"]), row(&["c", "3"])]);
        store.delete(0, "a").unwrap();

        assert!(wait_until(|| !store.has_pending_changes() && sink.latest() == store.all()));
        assert!(store.flush_count() >= 1);
        store.close().unwrap();
        assert!(sink.is_closed());
    }

    #[test]
    fn test_close_persists_last_mutation() {
        let (store, sink) = memory_store();
        for i in 0..100 {
            store.insert(row(&["k", &i.to_string()]));
        }
        let expected = store.all();
        store.close().unwrap();
        assert_eq!(sink.latest(), expected);
    }

    #[test]
    fn test_concurrent_inserts() {
        let (store, sink) = memory_store();
        let store = Arc::new(store);

        let mut handles = vec![];
        for t in 0..8 {
            let s = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    s.insert(vec![format!("t{}", t), format!("{}", i)]);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 800);
        let mut all = store.all();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 800);

        let store = Arc::try_unwrap(store).ok().unwrap();
        store.close().unwrap();
        assert_eq!(sink.latest().len(), 800);
    }

    #[test]
    fn test_reopen_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.csv");
        {
            let store = RowStore::open(&path, Config::default()).unwrap();
            store.insert(row(&["ann", "1", "a,b"]));
            store.insert(row(&["bob", "2", ""]));
            store.close().unwrap();
        }
        let store = RowStore::open(&path, Config::default()).unwrap();
        assert_eq!(store.all(), vec![row(&["ann", "1", "a,b"]), row(&["bob", "2", ""])]);
        store.close().unwrap();
    }
}
