//! Typed table over a [`RowStore`]
//!
//! `Table<C>` encodes records before handing rows to the store and decodes
//! the rows it gets back. Bulk reads are all-or-nothing: the first decode
//! failure is returned and no partial result escapes.

use std::path::Path;

use tracing::warn;

use crate::codec::RowCodec;
use crate::config::Config;
use crate::engine::RowStore;
use crate::error::StoreResult;
use crate::format::Row;

/// A row store whose rows are records of `C::Record`.
pub struct Table<C: RowCodec> {
    store: RowStore,
    codec: C,
}

impl<C: RowCodec> Table<C> {
    /// Open or create the snapshot at `path`.
    ///
    /// Every stored row must decode with `codec`; otherwise the store is
    /// closed again and the decode error returned.
    pub fn open<P: AsRef<Path>>(path: P, codec: C, config: Config) -> StoreResult<Self> {
        let store = RowStore::open(path, config)?;
        let check = store.all().iter().try_for_each(|row| codec.decode(row).map(|_| ()));
        if let Err(e) = check {
            if let Err(close_err) = store.close() {
                warn!(error = %close_err, "closing store after failed decode also failed");
            }
            return Err(e);
        }
        Ok(Self { store, codec })
    }

    /// Wrap an already open store.
    pub fn from_store(store: RowStore, codec: C) -> Self {
        Self { store, codec }
    }

    /// The underlying row store.
    pub fn store(&self) -> &RowStore {
        &self.store
    }

    /// The codec in use.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn decode_all(&self, rows: Vec<Row>) -> StoreResult<Vec<C::Record>> {
        rows.iter().map(|row| self.codec.decode(row)).collect()
    }

    /// Every record in current order.
    pub fn all(&self) -> StoreResult<Vec<C::Record>> {
        self.decode_all(self.store.all())
    }

    /// First record whose `col` field equals `id`.
    pub fn select(&self, col: usize, id: &str) -> StoreResult<Option<C::Record>> {
        self.store
            .select(col, id)?
            .map(|row| self.codec.decode(&row))
            .transpose()
    }

    /// Every record whose `col` field equals `value`.
    pub fn select_all(&self, col: usize, value: &str) -> StoreResult<Vec<C::Record>> {
        self.decode_all(self.store.select_all(col, value)?)
    }

    /// Encode and append a record.
    pub fn insert(&self, record: &C::Record) -> StoreResult<()> {
        let row = self.codec.encode(record)?;
        self.store.insert(row);
        Ok(())
    }

    /// Encode every record, then append them as one batch.
    ///
    /// If any record fails to encode nothing is inserted.
    pub fn insert_all(&self, records: &[C::Record]) -> StoreResult<()> {
        let rows = records
            .iter()
            .map(|record| self.codec.encode(record))
            .collect::<StoreResult<Vec<Row>>>()?;
        self.store.insert_all(rows);
        Ok(())
    }

    /// Replace the first record whose `col` field equals `id`.
    pub fn update(&self, col: usize, id: &str, record: &C::Record) -> StoreResult<()> {
        let row = self.codec.encode(record)?;
        self.store.update(col, id, row)
    }

    /// Replace every matching record with `record`. Returns the count.
    pub fn update_all(&self, col: usize, value: &str, record: &C::Record) -> StoreResult<usize> {
        let row = self.codec.encode(record)?;
        self.store.update_all(col, value, row)
    }

    /// Remove the first matching record.
    pub fn delete(&self, col: usize, id: &str) -> StoreResult<()> {
        self.store.delete(col, id).map(|_| ())
    }

    /// Remove every matching record. Returns the count.
    pub fn delete_all(&self, col: usize, value: &str) -> StoreResult<usize> {
        self.store.delete_all(col, value)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True if the table has no records.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Flush pending changes and close the snapshot.
    pub fn close(self) -> StoreResult<()> {
        self.store.close()
    }
}
