//! Row types flowing through a load run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One input record as read from the order file. Everything stays text until
/// the linker converts it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawOrderRow {
    /// 1-based source line (header is line 1)
    #[serde(skip)]
    pub line: usize,
    #[serde(rename = "Consumer_ID")]
    pub consumer_id: Option<String>,
    #[serde(rename = "Driver_ID")]
    pub driver_id: Option<String>,
    #[serde(rename = "Restaurant_ID")]
    pub restaurant_id: Option<String>,
    #[serde(rename = "Customer_placed_order_datetime")]
    pub customer_placed_at: Option<String>,
    #[serde(rename = "Placed_order_with_restaurant_datetime")]
    pub restaurant_placed_at: Option<String>,
    #[serde(rename = "Driver_at_restaurant_datetime")]
    pub driver_arrived_at: Option<String>,
    #[serde(rename = "Delivered_to_consumer_datetime")]
    pub delivered_at: Option<String>,
    #[serde(rename = "Is_New")]
    pub is_new: Option<String>,
    #[serde(rename = "Delivery_Region")]
    pub delivery_region: Option<String>,
    #[serde(rename = "Is_ASAP")]
    pub is_asap: Option<String>,
    #[serde(rename = "Order_total")]
    pub order_total: Option<String>,
    #[serde(rename = "Amount_of_discount")]
    pub discount: Option<String>,
    #[serde(rename = "Amount_of_tip")]
    pub tip: Option<String>,
    #[serde(rename = "Refunded_amount")]
    pub refund: Option<String>,
}

/// Row of `dim_time`. Rows without an order or delivery timestamp never get
/// this far, so only the two intermediate events are nullable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeRecord {
    pub order_placed: NaiveDateTime,
    pub restaurant_placed: Option<NaiveDateTime>,
    pub driver_arrival: Option<NaiveDateTime>,
    pub delivered: NaiveDateTime,
}

/// An input row whose required timestamps parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedOrder {
    pub row: RawOrderRow,
    pub time: TimeRecord,
}

/// Fact row waiting for the identifier of its time row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingFact {
    pub customer_id: i64,
    pub driver_id: i64,
    pub restaurant_id: i64,
    pub is_new: bool,
    pub delivery_region: Option<String>,
    pub is_asap: bool,
    pub order_total: f64,
    pub discount: f64,
    pub tip: f64,
    pub refund: f64,
}

impl PendingFact {
    pub fn with_time_id(self, time_id: i64) -> FactRecord {
        FactRecord {
            customer_id: self.customer_id,
            driver_id: self.driver_id,
            restaurant_id: self.restaurant_id,
            time_id,
            is_new: self.is_new,
            delivery_region: self.delivery_region,
            is_asap: self.is_asap,
            order_total: self.order_total,
            discount: self.discount,
            tip: self.tip,
            refund: self.refund,
        }
    }
}

/// Row of `fact_orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactRecord {
    pub customer_id: i64,
    pub driver_id: i64,
    pub restaurant_id: i64,
    pub time_id: i64,
    pub is_new: bool,
    pub delivery_region: Option<String>,
    pub is_asap: bool,
    pub order_total: f64,
    pub discount: f64,
    pub tip: f64,
    pub refund: f64,
}
