//! Date source for dated upload subdirectories.

use chrono::{Local, NaiveDate};
use std::sync::RwLock;

/// Format of a dated subdirectory name.
pub const DATE_DIR_FORMAT: &str = "%Y%m%d";

/// Source of the current calendar date.
pub trait Calendar: Send + Sync {
    /// Today's date.
    fn today(&self) -> NaiveDate;

    /// Today's date as a subdirectory name (`YYYYMMDD`).
    fn today_dir(&self) -> String {
        self.today().format(DATE_DIR_FORMAT).to_string()
    }
}

/// Calendar backed by the local system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCalendar;

impl Calendar for SystemCalendar {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Calendar pinned to a settable date.
#[derive(Debug)]
pub struct FixedCalendar {
    date: RwLock<NaiveDate>,
}

impl FixedCalendar {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: RwLock::new(date),
        }
    }

    /// Move the calendar to another date.
    pub fn set(&self, date: NaiveDate) {
        let mut current = self.date.write().unwrap_or_else(|e| e.into_inner());
        *current = date;
    }
}

impl Calendar for FixedCalendar {
    fn today(&self) -> NaiveDate {
        *self.date.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_today_dir_format() {
        let calendar = FixedCalendar::new(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(calendar.today_dir(), "20240307");

        calendar.set(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert_eq!(calendar.today_dir(), "20251231");
    }

    #[test]
    fn test_system_calendar_matches_local_date() {
        let dir = SystemCalendar.today_dir();
        assert_eq!(dir.len(), 8);
        assert!(dir.chars().all(|c| c.is_ascii_digit()));
    }
}
