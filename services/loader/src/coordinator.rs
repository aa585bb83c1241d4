//! Load run orchestration.
//!
//! A run moves through
//! `Idle -> Validating -> ParsingTimestamps -> ResolvingDimensions -> LinkingAndInserting -> Committed`
//! and ends in `Failed` if dimension resolution or the fact transaction
//! fails. Validation and timestamp parsing happen in [`LoadCoordinator::prepare`]
//! and never touch the store. Dimension keys are committed per dimension
//! before the fact transaction opens, so a failed fact load leaves them in
//! place; only time and fact rows share one transaction.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::datetime::DatetimeParser;
use crate::dimension::{resolve_dimension, Dimension, DimensionStats};
use crate::error::{LoadError, StoreError};
use crate::input::OrderTable;
use crate::linker::{attach_time_ids, build_records, parse_natural_key, SkippedRow};
use crate::model::{TimeRecord, TimedOrder};
use crate::schema::{validate_columns, REQUIRED_COLUMNS};
use crate::store::WarehouseStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Validating,
    ParsingTimestamps,
    ResolvingDimensions,
    LinkingAndInserting,
    Committed,
    Failed,
}

/// Rows that passed validation and carry both required timestamps.
#[derive(Debug, Clone, Default)]
pub struct PreparedBatch {
    pub orders: Vec<TimedOrder>,
    pub rows_read: usize,
    pub rows_missing_timestamps: usize,
}

impl PreparedBatch {
    /// Distinct castable keys for one dimension. Rows with unusable keys are
    /// left out here and skipped later by the linker.
    pub fn dimension_keys(&self, dimension: Dimension) -> BTreeSet<i64> {
        self.orders
            .iter()
            .filter_map(|order| {
                let raw = match dimension {
                    Dimension::Customer => order.row.consumer_id.as_deref(),
                    Dimension::Driver => order.row.driver_id.as_deref(),
                    Dimension::Restaurant => order.row.restaurant_id.as_deref(),
                };
                parse_natural_key(dimension.source_column(), raw).ok()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_missing_timestamps: usize,
    pub dimensions: DimensionStats,
    pub skipped: Vec<SkippedRow>,
    pub time_rows: usize,
    pub fact_rows: usize,
}

#[derive(Debug)]
pub struct LoadCoordinator {
    parser: DatetimeParser,
    state: LoadState,
}

impl LoadCoordinator {
    pub fn new(parser: DatetimeParser) -> Self {
        Self {
            parser,
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    fn transition(&mut self, next: LoadState) {
        debug!(from = ?self.state, to = ?next, "load state");
        self.state = next;
    }

    /// Validate the header and parse timestamps. Rows without an order or
    /// delivery timestamp are dropped here.
    pub fn prepare(&mut self, table: OrderTable) -> Result<PreparedBatch, LoadError> {
        self.transition(LoadState::Validating);
        if let Err(e) = validate_columns(&table.columns, REQUIRED_COLUMNS) {
            error!(error = %e, "input validation failed");
            self.transition(LoadState::Failed);
            return Err(e);
        }

        self.transition(LoadState::ParsingTimestamps);
        let rows_read = table.rows.len();
        let mut orders = Vec::with_capacity(rows_read);
        let mut rows_missing_timestamps = 0;

        for row in table.rows {
            let placed = self.parser.parse(row.customer_placed_at.as_deref());
            let restaurant_placed = self.parser.parse(row.restaurant_placed_at.as_deref());
            let driver_arrival = self.parser.parse(row.driver_arrived_at.as_deref());
            let delivered = self.parser.parse(row.delivered_at.as_deref());

            match (placed, delivered) {
                (Some(order_placed), Some(delivered)) => orders.push(TimedOrder {
                    row,
                    time: TimeRecord {
                        order_placed,
                        restaurant_placed,
                        driver_arrival,
                        delivered,
                    },
                }),
                _ => {
                    debug!(line = row.line, "dropping row without order/delivery timestamp");
                    rows_missing_timestamps += 1;
                }
            }
        }

        info!(
            rows_read,
            rows_to_process = orders.len(),
            dropped = rows_missing_timestamps,
            "timestamps parsed"
        );

        Ok(PreparedBatch {
            orders,
            rows_read,
            rows_missing_timestamps,
        })
    }

    /// Resolve dimensions, then insert time and fact rows in one transaction.
    pub async fn load<S>(&mut self, store: &mut S, batch: PreparedBatch) -> Result<LoadReport, LoadError>
    where
        S: WarehouseStore + ?Sized,
    {
        let mut report = LoadReport {
            rows_read: batch.rows_read,
            rows_missing_timestamps: batch.rows_missing_timestamps,
            ..Default::default()
        };

        self.transition(LoadState::ResolvingDimensions);
        for dimension in Dimension::ALL {
            let keys = batch.dimension_keys(dimension);
            match resolve_dimension(&mut *store, dimension, &keys).await {
                Ok(inserted) => report.dimensions.record(dimension, inserted),
                Err(e) => {
                    self.transition(LoadState::Failed);
                    return Err(e);
                }
            }
        }
        info!(
            customers = report.dimensions.customers,
            drivers = report.dimensions.drivers,
            restaurants = report.dimensions.restaurants,
            "dimension records processed"
        );

        self.transition(LoadState::LinkingAndInserting);
        let linked = build_records(&batch.orders);
        report.skipped = linked.skipped;

        if let Err(e) = store.begin().await {
            self.transition(LoadState::Failed);
            error!(error = %e, "could not open fact transaction");
            return Err(LoadError::FactLoad(e));
        }

        let result = async {
            let time_ids = store
                .insert_time_rows(&linked.times)
                .await
                .map_err(LoadError::FactLoad)?;
            let facts = attach_time_ids(linked.facts, &time_ids)?;
            let inserted = store.insert_facts(&facts).await.map_err(LoadError::FactLoad)?;
            store.commit().await.map_err(LoadError::FactLoad)?;
            Ok::<(usize, u64), LoadError>((time_ids.len(), inserted))
        }
        .await;

        match result {
            Ok((time_rows, fact_rows)) => {
                report.time_rows = time_rows;
                report.fact_rows = fact_rows as usize;
                self.transition(LoadState::Committed);
                info!(
                    facts = report.fact_rows,
                    skipped = report.skipped.len(),
                    "data loading complete"
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(rb) = store.rollback().await {
                    warn!(error = %rb, "rollback failed");
                }
                self.transition(LoadState::Failed);
                error!(error = %e, "transaction failed");
                Err(e)
            }
        }
    }

    /// [`Self::load`], then close the store whether or not the load succeeded.
    pub async fn run<S>(&mut self, store: &mut S, batch: PreparedBatch) -> Result<LoadReport, LoadError>
    where
        S: WarehouseStore + ?Sized,
    {
        let result = self.load(store, batch).await;
        if let Err(e) = close_store(store).await {
            warn!(error = %e, "failed to close store connection");
        }
        result
    }
}

async fn close_store<S>(store: &mut S) -> Result<(), StoreError>
where
    S: WarehouseStore + ?Sized,
{
    store.close().await?;
    debug!("store connection closed");
    Ok(())
}
