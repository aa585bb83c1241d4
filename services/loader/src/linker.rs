//! Time/fact row construction and linkage.
//!
//! Every usable input row becomes one `dim_time` row and one `fact_orders`
//! row. Facts are built as [`PendingFact`]s and only become [`FactRecord`]s
//! once the store has returned the generated `time_id` of their time row.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::error::LoadError;
use crate::model::{FactRecord, PendingFact, TimeRecord, TimedOrder};
use crate::schema;

/// Why a single row was left out of the fact load.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("{column} is missing")]
    MissingValue { column: &'static str },

    #[error("{column} '{value}' is not an integer id")]
    InvalidKey { column: &'static str, value: String },

    #[error("{column} '{value}' is not a boolean")]
    InvalidFlag { column: &'static str, value: String },

    #[error("{column} '{value}' is not a number")]
    InvalidAmount { column: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: SkipReason,
}

/// Output of [`build_records`]: `times[i]` and `facts[i]` come from the
/// same source row.
#[derive(Debug, Default)]
pub struct LinkBatch {
    pub times: Vec<TimeRecord>,
    pub facts: Vec<PendingFact>,
    pub skipped: Vec<SkippedRow>,
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Natural keys are integers; integral float text ("17.0") is accepted since
/// spreadsheet exports write ids that way once a column has gaps.
pub fn parse_natural_key(column: &'static str, raw: Option<&str>) -> Result<i64, SkipReason> {
    let value = present(raw).ok_or(SkipReason::MissingValue { column })?;
    if let Ok(id) = value.parse::<i64>() {
        return Ok(id);
    }

    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(SkipReason::InvalidKey {
            column,
            value: value.to_string(),
        }),
    }
}

/// Absent flags read as false.
pub fn parse_flag(column: &'static str, raw: Option<&str>) -> Result<bool, SkipReason> {
    let Some(value) = present(raw) else {
        return Ok(false);
    };

    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Ok(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Ok(false),
        _ => Err(SkipReason::InvalidFlag {
            column,
            value: value.to_string(),
        }),
    }
}

fn parse_number(column: &'static str, value: &str) -> Result<f64, SkipReason> {
    value
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or_else(|| SkipReason::InvalidAmount {
            column,
            value: value.to_string(),
        })
}

pub fn parse_required_amount(column: &'static str, raw: Option<&str>) -> Result<f64, SkipReason> {
    let value = present(raw).ok_or(SkipReason::MissingValue { column })?;
    parse_number(column, value)
}

/// Absent amounts default to zero.
pub fn parse_optional_amount(column: &'static str, raw: Option<&str>) -> Result<f64, SkipReason> {
    match present(raw) {
        Some(value) => parse_number(column, value),
        None => Ok(0.0),
    }
}

/// Build the time and pending fact row for one order.
pub fn build_row(order: &TimedOrder) -> Result<(TimeRecord, PendingFact), SkipReason> {
    let row = &order.row;
    let fact = PendingFact {
        customer_id: parse_natural_key(schema::CONSUMER_ID, row.consumer_id.as_deref())?,
        driver_id: parse_natural_key(schema::DRIVER_ID, row.driver_id.as_deref())?,
        restaurant_id: parse_natural_key(schema::RESTAURANT_ID, row.restaurant_id.as_deref())?,
        is_new: parse_flag(schema::IS_NEW, row.is_new.as_deref())?,
        delivery_region: present(row.delivery_region.as_deref()).map(str::to_string),
        is_asap: parse_flag(schema::IS_ASAP, row.is_asap.as_deref())?,
        order_total: parse_required_amount(schema::ORDER_TOTAL, row.order_total.as_deref())?,
        discount: parse_optional_amount(schema::DISCOUNT, row.discount.as_deref())?,
        tip: parse_optional_amount(schema::TIP, row.tip.as_deref())?,
        refund: parse_optional_amount(schema::REFUND, row.refund.as_deref())?,
    };
    Ok((order.time.clone(), fact))
}

/// Build paired rows for every order. A row that cannot be converted is
/// reported in `skipped` and the rest of the batch carries on.
pub fn build_records(orders: &[TimedOrder]) -> LinkBatch {
    let mut batch = LinkBatch::default();

    for order in orders {
        match build_row(order) {
            Ok((time, fact)) => {
                batch.times.push(time);
                batch.facts.push(fact);
            }
            Err(reason) => {
                warn!(line = order.row.line, reason = %reason, "skipping row");
                batch.skipped.push(SkippedRow {
                    line: order.row.line,
                    reason,
                });
            }
        }
    }

    batch
}

/// Pair each pending fact with the id generated for its time row.
pub fn attach_time_ids(pending: Vec<PendingFact>, time_ids: &[i64]) -> Result<Vec<FactRecord>, LoadError> {
    if pending.len() != time_ids.len() {
        return Err(LoadError::LinkMismatch {
            expected: pending.len(),
            returned: time_ids.len(),
        });
    }

    Ok(pending
        .into_iter()
        .zip(time_ids)
        .map(|(fact, &time_id)| fact.with_time_id(time_id))
        .collect())
}
