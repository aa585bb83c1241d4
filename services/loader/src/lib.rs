//! Order warehouse loader.
//!
//! Loads order events from a CSV export into a star schema: three identity
//! dimensions (customer, driver, restaurant), a time dimension and the
//! `fact_orders` table.
//!
//! Pipeline:
//! - Validate the input header
//! - Complete partial "D HH:MM:SS" timestamps and drop rows without order or delivery time
//! - Insert missing dimension keys (committed per dimension)
//! - Insert time rows and fact rows in a single transaction

pub mod config;
pub mod coordinator;
pub mod datetime;
pub mod dimension;
pub mod error;
pub mod input;
pub mod linker;
pub mod model;
pub mod schema;
pub mod store;

pub use coordinator::{LoadCoordinator, LoadReport, LoadState, PreparedBatch};
pub use error::{LoadError, StoreError};
