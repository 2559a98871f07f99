//! Read side over stored articles: per-day counts selected by newspaper,
//! date range and weekday.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, TimeDelta, Weekday};
use tracing::{debug, warn};

use crate::error::{WatchError, WatchResult};
use crate::models::{DailyCount, HistorySample, NewspaperId};

/// Trailing window used for same-weekday history, roughly six months.
pub const DEFAULT_WINDOW_DAYS: i64 = 183;

#[async_trait]
pub trait NewspaperExistence: Send + Sync {
    async fn newspaper_exists(&self, id: NewspaperId) -> WatchResult<bool>;
}

#[async_trait]
pub trait ArticleHistoryProvider: Send + Sync {
    /// Per-day article counts for dates in `[start, end_exclusive)`, ascending.
    /// Only dates with at least one article are returned. When `weekday` is
    /// set, dates on other weekdays are skipped.
    async fn daily_counts(
        &self,
        id: NewspaperId,
        start: NaiveDate,
        end_exclusive: NaiveDate,
        weekday: Option<Weekday>,
    ) -> WatchResult<Vec<DailyCount>>;

    /// Articles published on `date`; 0 when there are none.
    async fn count_on(&self, id: NewspaperId, date: NaiveDate) -> WatchResult<u64>;
}

/// First day of a trailing window of `window_days` ending before `reference`.
pub fn window_start(reference: NaiveDate, window_days: i64) -> WatchResult<NaiveDate> {
    if window_days < 1 {
        return Err(WatchError::Config(format!(
            "window must be at least 1 day, got {window_days}"
        )));
    }
    TimeDelta::try_days(window_days)
        .and_then(|span| reference.checked_sub_signed(span))
        .ok_or_else(|| {
            WatchError::Config(format!(
                "window of {window_days} days reaches before the supported date range"
            ))
        })
}

pub struct HistoryAggregator<'a, P: ?Sized, E: ?Sized> {
    provider: &'a P,
    newspapers: &'a E,
}

impl<'a, P, E> HistoryAggregator<'a, P, E>
where
    P: ArticleHistoryProvider + ?Sized,
    E: NewspaperExistence + ?Sized,
{
    pub fn new(provider: &'a P, newspapers: &'a E) -> Self {
        Self {
            provider,
            newspapers,
        }
    }

    pub async fn ensure_exists(&self, id: NewspaperId) -> WatchResult<()> {
        if self.newspapers.newspaper_exists(id).await? {
            Ok(())
        } else {
            warn!(newspaper_id = id, "newspaper not found");
            Err(WatchError::NotFound(id))
        }
    }

    /// Counts on the same weekday as `reference`, over the `window_days`
    /// before it, excluding `reference` itself. An empty sample is not an
    /// error.
    pub async fn fetch_same_weekday_history(
        &self,
        id: NewspaperId,
        reference: NaiveDate,
        window_days: i64,
    ) -> WatchResult<HistorySample> {
        self.ensure_exists(id).await?;

        let window_start = window_start(reference, window_days)?;
        let days = self
            .provider
            .daily_counts(id, window_start, reference, Some(reference.weekday()))
            .await?;
        let sample = HistorySample::new(reference, window_start, days);

        debug!(
            newspaper_id = id,
            %reference,
            %window_start,
            sample_size = sample.len(),
            "fetched same-weekday history"
        );
        Ok(sample)
    }

    pub async fn fetch_count(&self, id: NewspaperId, date: NaiveDate) -> WatchResult<u64> {
        self.provider.count_on(id, date).await
    }

    /// Dates in `[start, end_exclusive)` with at least one article. Missing
    /// dates are left for the caller to fill.
    pub async fn fetch_week_counts(
        &self,
        id: NewspaperId,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> WatchResult<BTreeMap<NaiveDate, u64>> {
        let days = self
            .provider
            .daily_counts(id, start, end_exclusive, None)
            .await?;

        Ok(days
            .into_iter()
            .filter(|d| d.count > 0 && d.date >= start && d.date < end_exclusive)
            .map(|d| (d.date, d.count))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn wednesday_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        // 2026-10-14 is a Wednesday.
        store.add_articles(1, day(2026, 10, 7), 12);
        store.add_articles(1, day(2026, 9, 30), 10);
        store.add_articles(1, day(2026, 10, 8), 99);
        store.add_articles(1, day(2026, 10, 14), 3);
        store.add_articles(1, day(2026, 3, 4), 50);
        store.add_articles(2, day(2026, 10, 7), 7);
        store
    }

    #[tokio::test]
    async fn same_weekday_history_respects_window_and_excludes_reference() {
        let store = wednesday_store();
        let aggregator = HistoryAggregator::new(&store, &store);

        let sample = aggregator
            .fetch_same_weekday_history(1, day(2026, 10, 14), DEFAULT_WINDOW_DAYS)
            .await
            .unwrap();

        assert_eq!(sample.counts(), vec![10, 12]);
        assert!(sample
            .days()
            .iter()
            .all(|d| d.date.weekday() == Weekday::Wed && d.date < day(2026, 10, 14)));
    }

    #[tokio::test]
    async fn unknown_newspaper_is_not_found() {
        let store = wednesday_store();
        let aggregator = HistoryAggregator::new(&store, &store);

        let err = aggregator
            .fetch_same_weekday_history(42, day(2026, 10, 14), DEFAULT_WINDOW_DAYS)
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::NotFound(42)));
    }

    #[tokio::test]
    async fn known_newspaper_without_history_yields_empty_sample() {
        let mut store = MemoryStore::new();
        store.add_newspaper(5);
        let aggregator = HistoryAggregator::new(&store, &store);

        let sample = aggregator
            .fetch_same_weekday_history(5, day(2026, 10, 14), DEFAULT_WINDOW_DAYS)
            .await
            .unwrap();
        assert!(sample.is_empty());
    }

    #[tokio::test]
    async fn oversized_window_is_a_config_error() {
        let store = wednesday_store();
        let aggregator = HistoryAggregator::new(&store, &store);

        let err = aggregator
            .fetch_same_weekday_history(1, day(2026, 10, 14), 100_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));

        let err = aggregator
            .fetch_same_weekday_history(1, day(2026, 10, 14), i64::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
    }

    #[tokio::test]
    async fn non_positive_window_is_a_config_error() {
        let store = wednesday_store();
        let aggregator = HistoryAggregator::new(&store, &store);

        for window_days in [0, -7] {
            let err = aggregator
                .fetch_same_weekday_history(1, day(2026, 10, 14), window_days)
                .await
                .unwrap_err();
            assert!(matches!(err, WatchError::Config(_)), "{window_days}");
        }
    }

    #[test]
    fn window_start_counts_back_from_reference() {
        assert_eq!(window_start(day(2026, 10, 14), 183).unwrap(), day(2026, 4, 14));
        assert_eq!(window_start(day(2026, 10, 14), 1).unwrap(), day(2026, 10, 13));
    }

    #[tokio::test]
    async fn count_for_empty_day_is_zero() {
        let store = wednesday_store();
        let aggregator = HistoryAggregator::new(&store, &store);

        assert_eq!(aggregator.fetch_count(1, day(2026, 10, 14)).await.unwrap(), 3);
        assert_eq!(aggregator.fetch_count(1, day(2026, 10, 13)).await.unwrap(), 0);
        assert_eq!(aggregator.fetch_count(2, day(2026, 10, 14)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn week_counts_only_contain_days_with_articles() {
        let store = wednesday_store();
        let aggregator = HistoryAggregator::new(&store, &store);

        let counts = aggregator
            .fetch_week_counts(1, day(2026, 10, 5), day(2026, 10, 12))
            .await
            .unwrap();

        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get(&day(2026, 10, 7)), Some(&12));
        assert_eq!(counts.get(&day(2026, 10, 8)), Some(&99));
        assert!(!counts.contains_key(&day(2026, 10, 14)));
    }
}
