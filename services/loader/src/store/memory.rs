use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;

use super::WarehouseStore;
use crate::dimension::Dimension;
use crate::error::StoreError;
use crate::model::{FactRecord, TimeRecord};

/// Operation at which a [`MemoryStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    ExistingKeys(Dimension),
    InsertKeys(Dimension),
    InsertTimeRow,
    InsertFacts,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: BTreeSet<i64>,
    drivers: BTreeSet<i64>,
    restaurants: BTreeSet<i64>,
    times: Vec<(i64, TimeRecord)>,
    facts: Vec<FactRecord>,
    next_time_id: i64,
}

impl Tables {
    fn dimension(&self, dimension: Dimension) -> &BTreeSet<i64> {
        match dimension {
            Dimension::Customer => &self.customers,
            Dimension::Driver => &self.drivers,
            Dimension::Restaurant => &self.restaurants,
        }
    }

    fn dimension_mut(&mut self, dimension: Dimension) -> &mut BTreeSet<i64> {
        match dimension {
            Dimension::Customer => &mut self.customers,
            Dimension::Driver => &mut self.drivers,
            Dimension::Restaurant => &mut self.restaurants,
        }
    }
}

/// In-process warehouse with the same key and transaction semantics as the
/// Postgres schema: primary keys on the dimensions, foreign keys on facts,
/// identity `time_id` starting at 1, and snapshot rollback. Used for dry runs
/// and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    snapshot: Option<Tables>,
    fail_at: Option<FailPoint>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given operation fail from now on.
    pub fn fail_at(&mut self, point: FailPoint) {
        self.fail_at = Some(point);
    }

    pub fn clear_failure(&mut self) {
        self.fail_at = None;
    }

    pub fn dimension_keys(&self, dimension: Dimension) -> Vec<i64> {
        self.tables.dimension(dimension).iter().copied().collect()
    }

    pub fn time_rows(&self) -> &[(i64, TimeRecord)] {
        &self.tables.times
    }

    pub fn fact_rows(&self) -> &[FactRecord] {
        &self.tables.facts
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if self.fail_at == Some(point) {
            return Err(StoreError::Injected(format!("{point:?}")));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WarehouseStore for MemoryStore {
    async fn begin(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.check(FailPoint::Commit)?;
        self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let snapshot = self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        self.tables = snapshot;
        Ok(())
    }

    async fn existing_keys(
        &mut self,
        dimension: Dimension,
        candidates: &[i64],
    ) -> Result<HashSet<i64>, StoreError> {
        self.check(FailPoint::ExistingKeys(dimension))?;
        let table = self.tables.dimension(dimension);
        Ok(candidates
            .iter()
            .copied()
            .filter(|key| table.contains(key))
            .collect())
    }

    async fn insert_keys(&mut self, dimension: Dimension, keys: &[i64]) -> Result<u64, StoreError> {
        self.check(FailPoint::InsertKeys(dimension))?;
        let mut staged = self.tables.dimension(dimension).clone();
        for key in keys {
            if !staged.insert(*key) {
                return Err(StoreError::Constraint {
                    table: dimension.table(),
                    detail: format!("duplicate key {key}"),
                });
            }
        }
        *self.tables.dimension_mut(dimension) = staged;
        Ok(keys.len() as u64)
    }

    async fn insert_time_row(&mut self, record: &TimeRecord) -> Result<i64, StoreError> {
        self.check(FailPoint::InsertTimeRow)?;
        self.tables.next_time_id += 1;
        let time_id = self.tables.next_time_id;
        self.tables.times.push((time_id, record.clone()));
        Ok(time_id)
    }

    async fn insert_facts(&mut self, facts: &[FactRecord]) -> Result<u64, StoreError> {
        self.check(FailPoint::InsertFacts)?;
        for fact in facts {
            for (dimension, key) in [
                (Dimension::Customer, fact.customer_id),
                (Dimension::Driver, fact.driver_id),
                (Dimension::Restaurant, fact.restaurant_id),
            ] {
                if !self.tables.dimension(dimension).contains(&key) {
                    return Err(StoreError::Constraint {
                        table: "fact_orders",
                        detail: format!("{} {key} not in {}", dimension.key_column(), dimension.table()),
                    });
                }
            }
            if !self.tables.times.iter().any(|(id, _)| *id == fact.time_id) {
                return Err(StoreError::Constraint {
                    table: "fact_orders",
                    detail: format!("time_id {} not in dim_time", fact.time_id),
                });
            }
        }
        self.tables.facts.extend_from_slice(facts);
        Ok(facts.len() as u64)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.snapshot = None;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn time_record() -> TimeRecord {
        let day = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        TimeRecord {
            order_placed: day.and_hms_opt(18, 0, 0).unwrap(),
            restaurant_placed: None,
            driver_arrival: None,
            delivered: day.and_hms_opt(19, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let mut store = MemoryStore::new();
        store.insert_keys(Dimension::Customer, &[1]).await.unwrap();

        store.begin().await.unwrap();
        store.insert_keys(Dimension::Customer, &[2]).await.unwrap();
        store.insert_time_row(&time_record()).await.unwrap();
        store.rollback().await.unwrap();

        assert_eq!(store.dimension_keys(Dimension::Customer), vec![1]);
        assert!(store.time_rows().is_empty());
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected_atomically() {
        let mut store = MemoryStore::new();
        store.insert_keys(Dimension::Driver, &[5]).await.unwrap();
        let err = store.insert_keys(Dimension::Driver, &[6, 5]).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint { table: "dim_driver", .. }));
        assert_eq!(store.dimension_keys(Dimension::Driver), vec![5]);
    }

    #[tokio::test]
    async fn test_time_ids_are_sequential_per_row() {
        let mut store = MemoryStore::new();
        let ids = store
            .insert_time_rows(&[time_record(), time_record(), time_record()])
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fact_foreign_keys_enforced() {
        let mut store = MemoryStore::new();
        let fact = FactRecord {
            customer_id: 1,
            driver_id: 2,
            restaurant_id: 3,
            time_id: 1,
            is_new: false,
            delivery_region: None,
            is_asap: true,
            order_total: 10.0,
            discount: 0.0,
            tip: 0.0,
            refund: 0.0,
        };
        assert!(store.insert_facts(&[fact.clone()]).await.is_err());

        store.insert_keys(Dimension::Customer, &[1]).await.unwrap();
        store.insert_keys(Dimension::Driver, &[2]).await.unwrap();
        store.insert_keys(Dimension::Restaurant, &[3]).await.unwrap();
        store.insert_time_row(&time_record()).await.unwrap();
        assert_eq!(store.insert_facts(&[fact]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fail_point_and_close() {
        let mut store = MemoryStore::new();
        store.fail_at(FailPoint::InsertTimeRow);
        assert!(matches!(
            store.insert_time_row(&time_record()).await,
            Err(StoreError::Injected(_))
        ));
        store.clear_failure();
        store.close().await.unwrap();
        assert!(store.is_closed());
        assert!(matches!(store.begin().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_commit_without_begin() {
        let mut store = MemoryStore::new();
        assert!(matches!(store.commit().await, Err(StoreError::NoTransaction)));
    }
}
