use std::fmt::Write;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::info;

use crate::error::WatchResult;
use crate::history::{ArticleHistoryProvider, HistoryAggregator, NewspaperExistence};
use crate::models::{DailyCount, NewspaperId, WeekSeries};

/// Monday of the week containing `today`.
pub fn week_monday(today: NaiveDate) -> NaiveDate {
    today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
}

/// `[start, end_exclusive)` of the last full Monday-to-Sunday week before
/// the one containing `today`.
pub fn previous_week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let this_monday = week_monday(today);
    (this_monday - Duration::days(7), this_monday)
}

pub struct WeeklyReportBuilder<'a, P: ?Sized, E: ?Sized> {
    aggregator: HistoryAggregator<'a, P, E>,
}

impl<'a, P, E> WeeklyReportBuilder<'a, P, E>
where
    P: ArticleHistoryProvider + ?Sized,
    E: NewspaperExistence + ?Sized,
{
    pub fn new(aggregator: HistoryAggregator<'a, P, E>) -> Self {
        Self { aggregator }
    }

    pub async fn build(&self, newspaper_id: NewspaperId, today: NaiveDate) -> WatchResult<WeekSeries> {
        self.aggregator.ensure_exists(newspaper_id).await?;

        let (start, end_exclusive) = previous_week_bounds(today);
        let counts = self
            .aggregator
            .fetch_week_counts(newspaper_id, start, end_exclusive)
            .await?;

        let days = (0..WeekSeries::LEN as i64)
            .map(|offset| {
                let date = start + Duration::days(offset);
                DailyCount::new(date, counts.get(&date).copied().unwrap_or(0))
            })
            .collect();
        let series = WeekSeries::from_days(days);

        info!(
            newspaper_id,
            %start,
            total = series.total(),
            "weekly report built"
        );
        Ok(series)
    }
}

pub fn render_markdown(newspaper_id: NewspaperId, series: &WeekSeries) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Coverage Report");
    match (series.start(), series.end()) {
        (Some(start), Some(end)) => {
            let _ = writeln!(
                output,
                "Newspaper {} for {} to {}",
                newspaper_id, start, end
            );
        }
        _ => {
            let _ = writeln!(output, "Newspaper {}", newspaper_id);
        }
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Articles by Day");

    for day in series.days() {
        let _ = writeln!(
            output,
            "- {} ({}): {} articles",
            day.date,
            day.date.format("%A"),
            day.count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Total: {} articles", series.total());

    if series.total() == 0 {
        let _ = writeln!(output, "No articles recorded for this week.");
    }

    output
}
