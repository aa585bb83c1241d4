use std::path::PathBuf;

use chrono::{Local, NaiveDate};

use crate::datetime::DatetimeParser;
use crate::error::LoadError;

/// Resolved settings for one load run.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub input: PathBuf,
    pub db_url: Option<String>,
    /// Supplies the year and month for partial timestamps; today when unset.
    pub reference_date: Option<NaiveDate>,
    pub dry_run: bool,
}

impl LoaderConfig {
    pub fn db_url(&self) -> Result<&str, LoadError> {
        self.db_url.as_deref().ok_or(LoadError::MissingDatabaseUrl)
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn datetime_parser(&self) -> DatetimeParser {
        DatetimeParser::new(self.reference_date())
    }
}
