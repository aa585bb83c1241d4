//! Warehouse store seam.
//!
//! The loader only needs a handful of primitives from the relational store:
//! explicit transaction control, key lookups and inserts for the identity
//! dimensions, and inserts for time and fact rows. Time inserts hand back
//! the generated identifier of every row so fact rows never depend on an
//! inferred id range.

mod memory;
mod postgres;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::dimension::Dimension;
use crate::error::StoreError;
use crate::model::{FactRecord, TimeRecord};

#[async_trait]
pub trait WarehouseStore: Send {
    async fn begin(&mut self) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;

    /// Subset of `candidates` already present in the dimension table.
    async fn existing_keys(
        &mut self,
        dimension: Dimension,
        candidates: &[i64],
    ) -> Result<HashSet<i64>, StoreError>;

    /// Insert natural keys; returns the number of rows written.
    async fn insert_keys(&mut self, dimension: Dimension, keys: &[i64]) -> Result<u64, StoreError>;

    /// Insert one `dim_time` row and return its generated `time_id`.
    async fn insert_time_row(&mut self, record: &TimeRecord) -> Result<i64, StoreError>;

    /// Insert time rows in order, returning one generated id per row.
    async fn insert_time_rows(&mut self, records: &[TimeRecord]) -> Result<Vec<i64>, StoreError> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(self.insert_time_row(record).await?);
        }
        Ok(ids)
    }

    async fn insert_facts(&mut self, facts: &[FactRecord]) -> Result<u64, StoreError>;

    /// Release the underlying connection. Later calls fail with
    /// [`StoreError::Closed`].
    async fn close(&mut self) -> Result<(), StoreError>;
}
