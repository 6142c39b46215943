//! Configuration for RowStore
//!
//! Provides durability presets and validation. The snapshot delimiter is
//! part of the on-disk format, so a file must be reopened with the same
//! delimiter it was written with.

use crate::durability::SyncMode;
use crate::error::{StoreError, StoreResult};

/// Default flush thread name
pub const DEFAULT_WORKER_NAME: &str = "rowstore-flush";

/// RowStore configuration with durability presets
#[derive(Debug, Clone)]
pub struct Config {
    /// Field separator used by the snapshot file
    pub delimiter: u8,
    /// How hard each flush pushes data toward the physical medium
    pub sync_mode: SyncMode,
    /// Issue a full sync before the backing file is closed
    pub sync_on_close: bool,
    /// Name given to the background flush thread
    pub worker_name: String,
}

impl Config {
    /// Every flush reaches stable storage before the worker goes idle.
    pub fn durable() -> Self {
        Self {
            delimiter: b',',
            sync_mode: SyncMode::Data,
            sync_on_close: true,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }

    /// Flushes stop at the OS page cache; only close forces a sync.
    pub fn relaxed() -> Self {
        Self {
            delimiter: b',',
            sync_mode: SyncMode::None,
            sync_on_close: true,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }

    /// Replace the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if !self.delimiter.is_ascii() {
            return Err(invalid("delimiter must be a single ASCII byte"));
        }
        if matches!(self.delimiter, b'"' | b'\r' | b'\n') {
            return Err(invalid("delimiter cannot be a quote or line terminator"));
        }
        if self.worker_name.is_empty() {
            return Err(invalid("worker_name must not be empty"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> StoreError {
    StoreError::InvalidConfig { reason: reason.to_string() }
}

impl Default for Config {
    fn default() -> Self { Self::durable() }
}
