//! In-memory article store, loadable from a CSV snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use tracing::info;

use crate::error::{WatchError, WatchResult};
use crate::history::{ArticleHistoryProvider, NewspaperExistence};
use crate::models::{DailyCount, NewspaperId};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    newspapers: BTreeSet<NewspaperId>,
    articles: BTreeMap<(NewspaperId, NaiveDate), u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_newspaper(&mut self, id: NewspaperId) {
        self.newspapers.insert(id);
    }

    /// Records `count` articles on `date`, registering the newspaper.
    pub fn add_articles(&mut self, id: NewspaperId, date: NaiveDate, count: u64) {
        self.newspapers.insert(id);
        *self.articles.entry((id, date)).or_insert(0) += count;
    }

    /// Loads rows of `newspaper_id,date_uploaded[,article_count]`. A row
    /// without `article_count` stands for one article; a row with 0 only
    /// registers the newspaper. Other columns are ignored.
    pub fn from_reader<R: Read>(reader: R) -> WatchResult<Self> {
        #[derive(Deserialize)]
        struct CsvRow {
            newspaper_id: NewspaperId,
            date_uploaded: NaiveDate,
            article_count: Option<u64>,
        }

        let mut reader = csv::Reader::from_reader(reader);
        let mut store = Self::new();
        let mut rows = 0usize;

        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            store.add_articles(
                row.newspaper_id,
                row.date_uploaded,
                row.article_count.unwrap_or(1),
            );
            rows += 1;
        }

        info!(
            rows,
            newspapers = store.newspapers.len(),
            "loaded article snapshot"
        );
        Ok(store)
    }

    pub fn from_csv_path(path: &Path) -> WatchResult<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| WatchError::Snapshot(format!("cannot open {}: {e}", path.display())))?;
        Self::from_reader(file)
    }
}

#[async_trait]
impl NewspaperExistence for MemoryStore {
    async fn newspaper_exists(&self, id: NewspaperId) -> WatchResult<bool> {
        Ok(self.newspapers.contains(&id))
    }
}

#[async_trait]
impl ArticleHistoryProvider for MemoryStore {
    async fn daily_counts(
        &self,
        id: NewspaperId,
        start: NaiveDate,
        end_exclusive: NaiveDate,
        weekday: Option<Weekday>,
    ) -> WatchResult<Vec<DailyCount>> {
        if start >= end_exclusive {
            return Ok(Vec::new());
        }

        Ok(self
            .articles
            .range((id, start)..(id, end_exclusive))
            .filter(|(_, count)| **count > 0)
            .filter(|((_, date), _)| weekday.map_or(true, |w| date.weekday() == w))
            .map(|((_, date), count)| DailyCount::new(*date, *count))
            .collect())
    }

    async fn count_on(&self, id: NewspaperId, date: NaiveDate) -> WatchResult<u64> {
        Ok(self.articles.get(&(id, date)).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn csv_rows_accumulate_per_day() {
        let data = "\
newspaper_id,date_uploaded,title
1,2026-10-07,Council vote delayed
1,2026-10-07,Harbour reopens
1,2026-10-08,Rain expected
3,2026-10-07,Markets steady
";
        let store = MemoryStore::from_reader(data.as_bytes()).unwrap();

        assert_eq!(store.count_on(1, day(2026, 10, 7)).await.unwrap(), 2);
        assert_eq!(store.count_on(1, day(2026, 10, 8)).await.unwrap(), 1);
        assert!(store.newspaper_exists(3).await.unwrap());
        assert!(!store.newspaper_exists(2).await.unwrap());
    }

    #[tokio::test]
    async fn zero_count_rows_register_newspaper_only() {
        let data = "\
newspaper_id,date_uploaded,article_count
9,2026-10-01,0
4,2026-10-01,25
";
        let store = MemoryStore::from_reader(data.as_bytes()).unwrap();

        assert!(store.newspaper_exists(9).await.unwrap());
        let days = store
            .daily_counts(9, day(2026, 9, 1), day(2026, 11, 1), None)
            .await
            .unwrap();
        assert!(days.is_empty());
        assert_eq!(store.count_on(4, day(2026, 10, 1)).await.unwrap(), 25);
    }

    #[test]
    fn malformed_csv_is_a_snapshot_error() {
        let data = "newspaper_id,date_uploaded\nabc,2026-10-01\n";
        let err = MemoryStore::from_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, WatchError::Snapshot(_)));
    }

    #[test]
    fn loads_from_file_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "newspaper_id,date_uploaded").unwrap();
        writeln!(file, "7,2026-10-02").unwrap();
        let store = MemoryStore::from_csv_path(file.path()).unwrap();
        assert_eq!(store.newspapers.len(), 1);
    }

    #[tokio::test]
    async fn daily_counts_filter_by_weekday_and_range() {
        let mut store = MemoryStore::new();
        store.add_articles(1, day(2026, 10, 5), 1);
        store.add_articles(1, day(2026, 10, 6), 2);
        store.add_articles(1, day(2026, 10, 12), 3);
        store.add_articles(2, day(2026, 10, 5), 8);

        let mondays = store
            .daily_counts(1, day(2026, 10, 1), day(2026, 10, 13), Some(Weekday::Mon))
            .await
            .unwrap();
        assert_eq!(
            mondays,
            vec![
                DailyCount::new(day(2026, 10, 5), 1),
                DailyCount::new(day(2026, 10, 12), 3)
            ]
        );

        let exclusive = store
            .daily_counts(1, day(2026, 10, 5), day(2026, 10, 12), None)
            .await
            .unwrap();
        assert_eq!(exclusive.len(), 2);
    }
}
