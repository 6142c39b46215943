//! Snapshot backing for RowStore
//!
//! The flush thread owns exactly one `SnapshotSink`. Each flush replaces the
//! sink's contents with the full row set; there is no incremental format.
//!
//! `SnapshotFile` is the on-disk sink: truncate, rewind, write every row in
//! the delimited format from [`crate::format`], then sync per `SyncMode`.
//! `MemorySink` keeps snapshots in RAM for stores that need no file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::durability::{sync_file, SyncMode};
use crate::error::{StoreError, StoreResult};
use crate::format::{decode_bytes, write_rows, Row};

/// Destination for full row-set snapshots.
///
/// Implementations are driven from the flush thread only.
pub trait SnapshotSink: Send + 'static {
    /// Replace the stored snapshot with `rows`.
    fn rewrite(&mut self, rows: &[Row]) -> StoreResult<()>;

    /// Release the sink, reporting any error from the final sync or close.
    fn close(self: Box<Self>) -> StoreResult<()>;
}

/// Delimited-text snapshot file.
pub struct SnapshotFile {
    file: File,
    path: PathBuf,
    delimiter: u8,
    sync_mode: SyncMode,
    sync_on_close: bool,
    /// Size of the snapshot written by the last rewrite
    size: u64,
}

impl SnapshotFile {
    /// Open or create the snapshot at `path` and decode its rows.
    ///
    /// A missing file is created empty. If decoding fails the file handle is
    /// dropped before the error is returned.
    pub fn open<P: AsRef<Path>>(path: P, config: &Config) -> StoreResult<(Self, Vec<Row>)> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| {
                    StoreError::persistence(parent, &e, "Failed to create snapshot directory")
                })?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::persistence(&path, &e, "Failed to open snapshot file"))?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| StoreError::persistence(&path, &e, "Failed to read snapshot file"))?;

        let rows = decode_bytes(&bytes, config.delimiter)?;

        let snapshot = Self {
            file,
            path,
            delimiter: config.delimiter,
            sync_mode: config.sync_mode,
            sync_on_close: config.sync_on_close,
            size: bytes.len() as u64,
        };
        Ok((snapshot, rows))
    }

    /// Snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes in the snapshot as of the last rewrite (or open).
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl SnapshotSink for SnapshotFile {
    fn rewrite(&mut self, rows: &[Row]) -> StoreResult<()> {
        self.file.set_len(0)
            .map_err(|e| StoreError::persistence(&self.path, &e, "Snapshot truncate failed"))?;
        self.file.seek(SeekFrom::Start(0))
            .map_err(|e| StoreError::persistence(&self.path, &e, "Snapshot seek failed"))?;

        {
            let mut writer = BufWriter::new(&mut self.file);
            write_rows(&mut writer, rows, self.delimiter)
                .and_then(|_| writer.flush())
                .map_err(|e| StoreError::persistence(&self.path, &e, "Snapshot write failed"))?;
        }

        sync_file(&self.file, self.sync_mode)
            .map_err(|e| StoreError::persistence(&self.path, &e, "Snapshot sync failed"))?;

        self.size = self.file.stream_position()
            .map_err(|e| StoreError::persistence(&self.path, &e, "Snapshot seek failed"))?;
        Ok(())
    }

    fn close(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        if this.sync_on_close {
            sync_file(&this.file, SyncMode::Full)
                .map_err(|e| {
                    StoreError::persistence(&this.path, &e, "Snapshot sync on close failed")
                })?;
        }
        // Dropping the handle closes it; errors past a successful sync are not observable.
        drop(this.file);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    latest: Vec<Row>,
    rewrites: u64,
    closed: bool,
}

/// In-memory sink. Clones share the same state, so one clone can be handed
/// to the store while another is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows from the most recent rewrite.
    pub fn latest(&self) -> Vec<Row> {
        self.state.lock().latest.clone()
    }

    /// Number of rewrites performed.
    pub fn rewrites(&self) -> u64 {
        self.state.lock().rewrites
    }

    /// Whether the flush thread has closed this sink.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl SnapshotSink for MemorySink {
    fn rewrite(&mut self, rows: &[Row]) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.latest = rows.to_vec();
        state.rewrites += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> StoreResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}
