//! Holiday calendar and the long-weekend rule.

use crate::calendar::error::CalendarError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use log::warn;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;

/// Column holding the holiday dates in the calendar CSV.
const DATE_COLUMN: &str = "Date";
/// Date format of the holiday CSV, day first.
const DATE_FORMAT: &str = "%d-%m-%Y";

/// One region's public-holiday dates, loaded once per run and read-only
/// afterwards. Long-weekend membership is derived eagerly at construction
/// so lookups are pure set membership.
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    dates: HashSet<NaiveDate>,
    long_weekend_dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let dates: HashSet<NaiveDate> = dates.into_iter().collect();
        let long_weekend_dates = mark_long_weekends(&dates);
        Self {
            dates,
            long_weekend_dates,
        }
    }

    /// Loads the calendar from a CSV with a `Date` column in `%d-%m-%Y`
    /// format. Unparseable entries are skipped with a diagnostic, matching
    /// the permissive handling of record dates.
    pub fn from_csv(path: &Path) -> Result<Self, CalendarError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| CalendarError::CsvRead(path.to_path_buf(), e))?
            .finish()
            .map_err(|e| CalendarError::CsvRead(path.to_path_buf(), e))?;
        let column = df
            .column(DATE_COLUMN)
            .map_err(|_| CalendarError::MissingColumn(DATE_COLUMN.to_string()))?;
        let mut dates = Vec::new();
        for value in column.str()?.into_iter().flatten() {
            match NaiveDate::parse_from_str(value.trim(), DATE_FORMAT) {
                Ok(date) => dates.push(date),
                Err(e) => warn!("Skipping unparseable holiday date '{value}': {e}"),
            }
        }
        Ok(Self::new(dates))
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// Whether `date` belongs to a qualifying 3-day long-weekend span.
    pub fn is_long_weekend(&self, date: NaiveDate) -> bool {
        self.long_weekend_dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Marks every date belonging to a long-weekend span.
///
/// A qualifying span is three consecutive all-holiday days covering either
/// Friday–Saturday–Sunday or Sunday–Monday–Tuesday; all three days of a
/// qualifying span are marked. Implemented as a window over the date-sorted
/// holidays: every span starts at a holiday, so anchoring the window at
/// each Friday or Sunday holiday covers both directions without positional
/// look-behind.
fn mark_long_weekends(holidays: &HashSet<NaiveDate>) -> HashSet<NaiveDate> {
    let mut sorted: Vec<NaiveDate> = holidays.iter().copied().collect();
    sorted.sort_unstable();

    let mut marked = HashSet::new();
    for &start in &sorted {
        if !matches!(start.weekday(), Weekday::Fri | Weekday::Sun) {
            continue;
        }
        let second = start + Duration::days(1);
        let third = start + Duration::days(2);
        if holidays.contains(&second) && holidays.contains(&third) {
            marked.insert(start);
            marked.insert(second);
            marked.insert(third);
        }
    }
    marked
}
