//! Order file reader.

use std::path::Path;

use tokio::fs;
use tracing::{info, warn};

use crate::error::{LoadError, Result};
use crate::model::RawOrderRow;

/// Header and rows of one order file, before any validation.
#[derive(Debug, Clone, Default)]
pub struct OrderTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawOrderRow>,
}

/// Parse CSV content. Records that cannot be read are skipped with a warning;
/// an unreadable header is an error.
pub fn parse_orders_csv(content: &str) -> Result<OrderTable> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<RawOrderRow>().enumerate() {
        let line = idx + 2; // 1-indexed + header
        match result {
            Ok(mut row) => {
                row.line = line;
                rows.push(row);
            }
            Err(e) => warn!(line, error = %e, "skipping unreadable record"),
        }
    }

    Ok(OrderTable { columns, rows })
}

pub async fn read_orders_file(path: &Path) -> Result<OrderTable> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Input {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), bytes = content.len(), "loaded order file");
    parse_orders_csv(&content)
}
