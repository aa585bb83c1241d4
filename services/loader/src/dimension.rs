//! Identity dimensions (customer, driver, restaurant).

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{LoadError, StoreError};
use crate::schema;
use crate::store::WarehouseStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Customer,
    Driver,
    Restaurant,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Customer, Dimension::Driver, Dimension::Restaurant];

    pub fn table(self) -> &'static str {
        match self {
            Dimension::Customer => "dim_customer",
            Dimension::Driver => "dim_driver",
            Dimension::Restaurant => "dim_restaurant",
        }
    }

    pub fn key_column(self) -> &'static str {
        match self {
            Dimension::Customer => "customer_id",
            Dimension::Driver => "driver_id",
            Dimension::Restaurant => "restaurant_id",
        }
    }

    /// Input column holding this dimension's natural key
    pub fn source_column(self) -> &'static str {
        match self {
            Dimension::Customer => schema::CONSUMER_ID,
            Dimension::Driver => schema::DRIVER_ID,
            Dimension::Restaurant => schema::RESTAURANT_ID,
        }
    }
}

/// Newly inserted keys per dimension for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DimensionStats {
    pub customers: u64,
    pub drivers: u64,
    pub restaurants: u64,
}

impl DimensionStats {
    pub fn record(&mut self, dimension: Dimension, inserted: u64) {
        match dimension {
            Dimension::Customer => self.customers = inserted,
            Dimension::Driver => self.drivers = inserted,
            Dimension::Restaurant => self.restaurants = inserted,
        }
    }
}

/// Make sure every key in `keys` exists in the dimension table, inserting
/// only the missing ones in a transaction of their own. Returns how many
/// keys were inserted.
///
/// The commit is independent of the later fact load: a failed fact load does
/// not remove keys committed here.
pub async fn resolve_dimension<S>(
    store: &mut S,
    dimension: Dimension,
    keys: &BTreeSet<i64>,
) -> Result<u64, LoadError>
where
    S: WarehouseStore + ?Sized,
{
    if keys.is_empty() {
        debug!(table = dimension.table(), "no keys to resolve");
        return Ok(0);
    }

    let candidates: Vec<i64> = keys.iter().copied().collect();

    let result = async {
        store.begin().await?;
        let inserted = insert_missing(&mut *store, dimension, &candidates).await?;
        store.commit().await?;
        Ok::<u64, StoreError>(inserted)
    }
    .await;

    match result {
        Ok(inserted) => {
            info!(
                table = dimension.table(),
                candidates = candidates.len(),
                inserted,
                "dimension resolved"
            );
            Ok(inserted)
        }
        Err(source) => {
            if let Err(e) = store.rollback().await {
                warn!(table = dimension.table(), error = %e, "rollback failed");
            }
            error!(table = dimension.table(), error = %source, "dimension resolution failed");
            Err(LoadError::Dimension {
                table: dimension.table(),
                source,
            })
        }
    }
}

async fn insert_missing<S>(
    store: &mut S,
    dimension: Dimension,
    candidates: &[i64],
) -> Result<u64, StoreError>
where
    S: WarehouseStore + ?Sized,
{
    let existing = store.existing_keys(dimension, candidates).await?;
    let missing: Vec<i64> = candidates
        .iter()
        .copied()
        .filter(|key| !existing.contains(key))
        .collect();

    if missing.is_empty() {
        return Ok(0);
    }

    store.insert_keys(dimension, &missing).await?;
    Ok(missing.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailPoint, MemoryStore};

    fn keys(values: &[i64]) -> BTreeSet<i64> {
        values.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_inserts_only_missing_keys() {
        let mut store = MemoryStore::new();
        store.insert_keys(Dimension::Customer, &[2]).await.unwrap();

        let inserted = resolve_dimension(&mut store, Dimension::Customer, &keys(&[1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(store.dimension_keys(Dimension::Customer), vec![1, 2, 3]);
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_idempotent() {
        let mut store = MemoryStore::new();
        let set = keys(&[10, 20, 30]);

        assert_eq!(resolve_dimension(&mut store, Dimension::Driver, &set).await.unwrap(), 3);
        assert_eq!(resolve_dimension(&mut store, Dimension::Driver, &set).await.unwrap(), 0);
        assert_eq!(store.dimension_keys(Dimension::Driver), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_empty_set_skips_store() {
        let mut store = MemoryStore::new();
        store.fail_at(FailPoint::ExistingKeys(Dimension::Restaurant));
        let inserted = resolve_dimension(&mut store, Dimension::Restaurant, &BTreeSet::new())
            .await
            .unwrap();
        assert_eq!(inserted, 0);
    }

    #[tokio::test]
    async fn test_dimensions_are_independent() {
        let mut store = MemoryStore::new();
        resolve_dimension(&mut store, Dimension::Customer, &keys(&[1])).await.unwrap();
        resolve_dimension(&mut store, Dimension::Restaurant, &keys(&[1])).await.unwrap();
        assert_eq!(store.dimension_keys(Dimension::Customer), vec![1]);
        assert_eq!(store.dimension_keys(Dimension::Driver), Vec::<i64>::new());
        assert_eq!(store.dimension_keys(Dimension::Restaurant), vec![1]);
    }

    #[tokio::test]
    async fn test_insert_failure_rolls_back_and_reraises() {
        let mut store = MemoryStore::new();
        store.fail_at(FailPoint::InsertKeys(Dimension::Driver));

        let err = resolve_dimension(&mut store, Dimension::Driver, &keys(&[1, 2]))
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Dimension { table: "dim_driver", .. }));
        assert!(store.dimension_keys(Dimension::Driver).is_empty());
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_commit_failure_rolls_back() {
        let mut store = MemoryStore::new();
        store.fail_at(FailPoint::Commit);

        let err = resolve_dimension(&mut store, Dimension::Customer, &keys(&[4]))
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Dimension { .. }));
        assert!(store.dimension_keys(Dimension::Customer).is_empty());
    }

    #[test]
    fn test_dimension_names() {
        assert_eq!(Dimension::Customer.table(), "dim_customer");
        assert_eq!(Dimension::Driver.key_column(), "driver_id");
        assert_eq!(Dimension::Restaurant.source_column(), "Restaurant_ID");
    }

    #[test]
    fn test_stats_record() {
        let mut stats = DimensionStats::default();
        stats.record(Dimension::Driver, 4);
        assert_eq!(stats.drivers, 4);
        assert_eq!(stats.customers, 0);
    }
}
