use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

pub type NewspaperId = i64;

/// Number of articles a newspaper published on one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    #[serde(rename = "article_count")]
    pub count: u64,
}

impl DailyCount {
    pub fn new(date: NaiveDate, count: u64) -> Self {
        Self { date, count }
    }
}

/// Per-day counts sharing the reference date's weekday, strictly before it
/// and inside the trailing window. Ordered by date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySample {
    reference: NaiveDate,
    days: Vec<DailyCount>,
}

impl HistorySample {
    /// Keeps only entries that satisfy the sample invariant, sorted by date.
    pub fn new(reference: NaiveDate, window_start: NaiveDate, days: Vec<DailyCount>) -> Self {
        let weekday = reference.weekday();
        let mut days: Vec<DailyCount> = days
            .into_iter()
            .filter(|d| d.date.weekday() == weekday && d.date >= window_start && d.date < reference)
            .collect();
        days.sort_by_key(|d| d.date);
        Self { reference, days }
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn weekday(&self) -> Weekday {
        self.reference.weekday()
    }

    pub fn days(&self) -> &[DailyCount] {
        &self.days
    }

    pub fn counts(&self) -> Vec<u64> {
        self.days.iter().map(|d| d.count).collect()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Seven contiguous days, Monday through Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WeekSeries {
    days: Vec<DailyCount>,
}

impl WeekSeries {
    pub const LEN: usize = 7;

    pub(crate) fn from_days(days: Vec<DailyCount>) -> Self {
        debug_assert_eq!(days.len(), Self::LEN);
        Self { days }
    }

    pub fn days(&self) -> &[DailyCount] {
        &self.days
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.days.last().map(|d| d.date)
    }

    pub fn total(&self) -> u64 {
        self.days.iter().map(|d| d.count).sum()
    }
}
