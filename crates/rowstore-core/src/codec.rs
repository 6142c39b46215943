//! Record ↔ row conversion supplied by the user
//!
//! A `RowCodec` is a pure pair of functions. `encode` runs before the store
//! takes its lock, so a failing encode never touches the row set. `decode`
//! runs on cloned rows after the lock is released and must reject short rows
//! with `MalformedRow` instead of indexing past the end; [`field`] does that.

use crate::error::{StoreError, StoreResult};
use crate::format::Row;

/// Converts between a record type and its positional row.
pub trait RowCodec: Send + Sync + 'static {
    /// The typed value stored in each row
    type Record;

    /// Convert a record to a row. Field order is the column order.
    fn encode(&self, record: &Self::Record) -> StoreResult<Row>;

    /// Rebuild a record from a row.
    fn decode(&self, row: &[String]) -> StoreResult<Self::Record>;
}

/// Borrow field `index` of `row`, or fail with `MalformedRow`.
pub fn field(row: &[String], index: usize) -> StoreResult<&str> {
    row.get(index).map(String::as_str).ok_or_else(|| {
        StoreError::malformed(format!(
            "expected at least {} fields, found {}",
            index + 1,
            row.len()
        ))
    })
}

/// Parse field `index` of `row` with `FromStr`, or fail with `MalformedRow`.
pub fn parse_field<T>(row: &[String], index: usize) -> StoreResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = field(row, index)?;
    raw.parse().map_err(|e| StoreError::malformed(format!("field {} ({:?}): {}", index, raw, e)))
}

/// Identity codec: records are rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawRows;

impl RowCodec for RawRows {
    type Record = Row;

    fn encode(&self, record: &Row) -> StoreResult<Row> {
        Ok(record.clone())
    }

    fn decode(&self, row: &[String]) -> StoreResult<Row> {
        Ok(row.to_vec())
    }
}
