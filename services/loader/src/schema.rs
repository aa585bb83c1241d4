//! Input column contract.

use crate::error::{LoadError, Result};

pub const CONSUMER_ID: &str = "Consumer_ID";
pub const DRIVER_ID: &str = "Driver_ID";
pub const RESTAURANT_ID: &str = "Restaurant_ID";
pub const CUSTOMER_PLACED_AT: &str = "Customer_placed_order_datetime";
pub const RESTAURANT_PLACED_AT: &str = "Placed_order_with_restaurant_datetime";
pub const DRIVER_ARRIVED_AT: &str = "Driver_at_restaurant_datetime";
pub const DELIVERED_AT: &str = "Delivered_to_consumer_datetime";
pub const IS_NEW: &str = "Is_New";
pub const DELIVERY_REGION: &str = "Delivery_Region";
pub const IS_ASAP: &str = "Is_ASAP";
pub const ORDER_TOTAL: &str = "Order_total";
pub const DISCOUNT: &str = "Amount_of_discount";
pub const TIP: &str = "Amount_of_tip";
pub const REFUND: &str = "Refunded_amount";

/// Every column the loader reads
pub const REQUIRED_COLUMNS: &[&str] = &[
    CONSUMER_ID,
    DRIVER_ID,
    RESTAURANT_ID,
    CUSTOMER_PLACED_AT,
    RESTAURANT_PLACED_AT,
    DRIVER_ARRIVED_AT,
    DELIVERED_AT,
    IS_NEW,
    DELIVERY_REGION,
    IS_ASAP,
    ORDER_TOTAL,
    DISCOUNT,
    TIP,
    REFUND,
];

/// Fails with every missing column (in `required` order) when the input does
/// not carry all of `required`. Matching is exact and case-sensitive.
pub fn validate_columns<S: AsRef<str>>(present: &[S], required: &[&str]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !present.iter().any(|p| p.as_ref() == **col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::MissingColumns(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_columns_present() {
        assert!(validate_columns(REQUIRED_COLUMNS, REQUIRED_COLUMNS).is_ok());
    }

    #[test]
    fn test_extra_columns_ignored() {
        let mut present: Vec<&str> = REQUIRED_COLUMNS.to_vec();
        present.insert(0, "Unnamed: 0");
        present.push("Notes");
        assert!(validate_columns(&present, REQUIRED_COLUMNS).is_ok());
    }

    #[test]
    fn test_reports_every_missing_column() {
        let present = vec![CONSUMER_ID, DRIVER_ID, ORDER_TOTAL];
        match validate_columns(&present, REQUIRED_COLUMNS) {
            Err(LoadError::MissingColumns(missing)) => {
                assert_eq!(missing.len(), REQUIRED_COLUMNS.len() - 3);
                assert_eq!(missing[0], RESTAURANT_ID);
                assert!(!missing.contains(&ORDER_TOTAL.to_string()));
                assert_eq!(missing.last().map(String::as_str), Some(REFUND));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_column_match_is_case_sensitive() {
        let present = vec!["consumer_id".to_string()];
        let err = validate_columns(&present, &[CONSUMER_ID]).unwrap_err();
        assert!(err.to_string().contains(CONSUMER_ID));
    }

    #[test]
    fn test_empty_header() {
        let present: Vec<String> = Vec::new();
        assert!(matches!(
            validate_columns(&present, REQUIRED_COLUMNS),
            Err(LoadError::MissingColumns(m)) if m.len() == REQUIRED_COLUMNS.len()
        ));
    }
}
