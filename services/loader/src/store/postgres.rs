use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use tracing::debug;

use super::WarehouseStore;
use crate::dimension::Dimension;
use crate::error::StoreError;
use crate::model::{FactRecord, TimeRecord};

/// Rows per multi-row INSERT; keeps fact batches (11 binds per row) well
/// under the Postgres limit of 65535 bind parameters.
const INSERT_CHUNK: usize = 1000;

/// Postgres warehouse over one dedicated connection. Transactions are driven
/// with plain BEGIN/COMMIT/ROLLBACK so the connection stays owned by the
/// store for the whole run.
pub struct PgStore {
    conn: Option<PgConnection>,
}

impl PgStore {
    pub async fn connect(db_url: &str) -> Result<Self, StoreError> {
        let conn = PgConnection::connect(db_url).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.conn.as_mut().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl WarehouseStore for PgStore {
    async fn begin(&mut self) -> Result<(), StoreError> {
        sqlx::query("BEGIN").execute(self.conn()?).await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        sqlx::query("COMMIT").execute(self.conn()?).await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        sqlx::query("ROLLBACK").execute(self.conn()?).await?;
        Ok(())
    }

    async fn existing_keys(
        &mut self,
        dimension: Dimension,
        candidates: &[i64],
    ) -> Result<HashSet<i64>, StoreError> {
        let sql = format!(
            "SELECT {col} FROM {table} WHERE {col} = ANY($1)",
            col = dimension.key_column(),
            table = dimension.table(),
        );
        let rows: Vec<(i64,)> = sqlx::query_as(&sql)
            .bind(candidates)
            .fetch_all(self.conn()?)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_keys(&mut self, dimension: Dimension, keys: &[i64]) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for chunk in keys.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                dimension.table(),
                dimension.key_column()
            ));
            qb.push_values(chunk, |mut row, key| {
                row.push_bind(*key);
            });
            inserted += qb.build().execute(self.conn()?).await?.rows_affected();
        }
        debug!(table = dimension.table(), inserted, "inserted dimension keys");
        Ok(inserted)
    }

    async fn insert_time_row(&mut self, record: &TimeRecord) -> Result<i64, StoreError> {
        let (time_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO dim_time (order_datetime, placed_datetime, driver_arrival_datetime, delivery_datetime)
            VALUES ($1, $2, $3, $4)
            RETURNING time_id
            "#,
        )
        .bind(record.order_placed)
        .bind(record.restaurant_placed)
        .bind(record.driver_arrival)
        .bind(record.delivered)
        .fetch_one(self.conn()?)
        .await?;

        Ok(time_id)
    }

    async fn insert_facts(&mut self, facts: &[FactRecord]) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for chunk in facts.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO fact_orders (customer_id, driver_id, restaurant_id, time_id, \
                 is_new, delivery_region, is_asap, order_total, discount, tip, refund) ",
            );
            qb.push_values(chunk, |mut row, fact| {
                row.push_bind(fact.customer_id)
                    .push_bind(fact.driver_id)
                    .push_bind(fact.restaurant_id)
                    .push_bind(fact.time_id)
                    .push_bind(fact.is_new)
                    .push_bind(fact.delivery_region.clone())
                    .push_bind(fact.is_asap)
                    .push_bind(fact.order_total)
                    .push_bind(fact.discount)
                    .push_bind(fact.tip)
                    .push_bind(fact.refund);
            });
            inserted += qb.build().execute(self.conn()?).await?.rows_affected();
        }
        Ok(inserted)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        match self.conn.take() {
            Some(conn) => Ok(conn.close().await?),
            None => Ok(()),
        }
    }
}
