//! Partial timestamp parsing.
//!
//! Source files only carry a day-of-month and a time-of-day ("14 18:32:05").
//! Year and month come from a reference date, which defaults to the day the
//! run starts. Orders whose real month differs from the reference month are
//! mis-dated; this is a known defect of the source format and is left as is
//! unless an explicit reference date is configured for the run.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartialDatetimeError {
    #[error("expected 2 whitespace-separated tokens, found {0}")]
    TokenCount(usize),

    #[error("day '{0}' is not a number")]
    Day(String),

    #[error("time '{0}' is not HH:MM:SS")]
    Time(String),

    #[error("day {day} does not exist in {year}-{month:02}")]
    OutOfMonth { year: i32, month: u32, day: u32 },
}

/// Completes "D HH:MM:SS" strings with the year and month of a reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatetimeParser {
    year: i32,
    month: u32,
}

impl DatetimeParser {
    pub fn new(reference: NaiveDate) -> Self {
        Self {
            year: reference.year(),
            month: reference.month(),
        }
    }

    /// Parser anchored on the current local month.
    pub fn current() -> Self {
        Self::new(Local::now().date_naive())
    }

    /// Returns `None` for empty input and for anything malformed. Malformed
    /// values are logged, never raised.
    pub fn parse(&self, input: Option<&str>) -> Option<NaiveDateTime> {
        let raw = input?.trim();
        if raw.is_empty() {
            return None;
        }

        match self.try_parse(raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!(value = raw, error = %e, "unparsable datetime");
                None
            }
        }
    }

    pub fn try_parse(&self, raw: &str) -> Result<NaiveDateTime, PartialDatetimeError> {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        let [day_part, time_part] = parts.as_slice() else {
            return Err(PartialDatetimeError::TokenCount(parts.len()));
        };

        let day: u32 = day_part
            .parse()
            .map_err(|_| PartialDatetimeError::Day(day_part.to_string()))?;
        let time = NaiveTime::parse_from_str(time_part, "%H:%M:%S")
            .map_err(|_| PartialDatetimeError::Time(time_part.to_string()))?;
        let date = NaiveDate::from_ymd_opt(self.year, self.month, day).ok_or(
            PartialDatetimeError::OutOfMonth {
                year: self.year,
                month: self.month,
                day,
            },
        )?;

        Ok(date.and_time(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn march_2024() -> DatetimeParser {
        DatetimeParser::new(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
    }

    #[test]
    fn test_parse_combines_reference_month() {
        let ts = march_2024().parse(Some("14 18:32:05")).unwrap();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.month(), 3);
        assert_eq!(ts.day(), 14);
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (18, 32, 5));
    }

    #[test]
    fn test_parse_single_digit_fields() {
        let ts = march_2024().parse(Some("1 7:05:00")).unwrap();
        assert_eq!(ts.day(), 1);
        assert_eq!(ts.hour(), 7);
    }

    #[test]
    fn test_parse_tolerates_surrounding_whitespace() {
        let ts = march_2024().parse(Some("  2   00:00:01 ")).unwrap();
        assert_eq!(ts.day(), 2);
        assert_eq!(ts.second(), 1);
    }

    #[test]
    fn test_current_uses_todays_month() {
        let today = Local::now().date_naive();
        let ts = DatetimeParser::current().parse(Some("1 12:00:00")).unwrap();
        assert_eq!(ts.year(), today.year());
        assert_eq!(ts.month(), today.month());
    }

    #[test]
    fn test_empty_input_is_absent() {
        let parser = march_2024();
        assert_eq!(parser.parse(None), None);
        assert_eq!(parser.parse(Some("")), None);
        assert_eq!(parser.parse(Some("   ")), None);
    }

    #[test]
    fn test_malformed_input_is_absent() {
        let parser = march_2024();
        for bad in [
            "14",
            "14 18:32:05 extra",
            "x 18:32:05",
            "-1 18:32:05",
            "14 25:00:00",
            "14 18:32",
            "2024-03-14 18:32:05",
            "14 noon",
        ] {
            assert_eq!(parser.parse(Some(bad)), None, "{bad}");
        }
    }

    #[test]
    fn test_day_outside_reference_month() {
        let april = DatetimeParser::new(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(
            april.try_parse("31 10:00:00"),
            Err(PartialDatetimeError::OutOfMonth {
                year: 2024,
                month: 4,
                day: 31
            })
        );
        assert!(april.try_parse("0 10:00:00").is_err());
    }

    #[test]
    fn test_try_parse_reports_token_count() {
        assert_eq!(
            march_2024().try_parse("1 2 3"),
            Err(PartialDatetimeError::TokenCount(3))
        );
    }
}
