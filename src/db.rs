use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::{WatchError, WatchResult};
use crate::history::{ArticleHistoryProvider, NewspaperExistence};
use crate::models::{DailyCount, NewspaperId};

pub async fn connect(database_url: &str) -> WatchResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> WatchResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| WatchError::Database(e.to_string()))?;
    Ok(())
}

#[derive(Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_count(value: i64) -> WatchResult<u64> {
    u64::try_from(value).map_err(|_| WatchError::Database(format!("negative article count {value}")))
}

#[async_trait]
impl NewspaperExistence for PgArticleStore {
    async fn newspaper_exists(&self, id: NewspaperId) -> WatchResult<bool> {
        let exists: bool = sqlx::query("SELECT EXISTS (SELECT 1 FROM newspapers WHERE id = $1) AS found")
            .bind(id)
            .fetch_one(&self.pool)
            .await?
            .get("found");
        Ok(exists)
    }
}

#[async_trait]
impl ArticleHistoryProvider for PgArticleStore {
    async fn daily_counts(
        &self,
        id: NewspaperId,
        start: NaiveDate,
        end_exclusive: NaiveDate,
        weekday: Option<Weekday>,
    ) -> WatchResult<Vec<DailyCount>> {
        let mut query = String::from(
            "SELECT date_uploaded, COUNT(*) AS article_count \
             FROM news_articles \
             WHERE newspaper_id = $1 AND date_uploaded >= $2 AND date_uploaded < $3",
        );

        if weekday.is_some() {
            query.push_str(" AND EXTRACT(ISODOW FROM date_uploaded)::int = $4");
        }
        query.push_str(" GROUP BY date_uploaded ORDER BY date_uploaded");

        let mut rows = sqlx::query(&query).bind(id).bind(start).bind(end_exclusive);
        if let Some(day) = weekday {
            rows = rows.bind(day.number_from_monday() as i32);
        }

        let records = rows.fetch_all(&self.pool).await?;
        debug!(newspaper_id = id, rows = records.len(), "fetched daily counts");

        let mut days = Vec::with_capacity(records.len());
        for row in records {
            days.push(DailyCount::new(
                row.get("date_uploaded"),
                to_count(row.get("article_count"))?,
            ));
        }

        Ok(days)
    }

    async fn count_on(&self, id: NewspaperId, date: NaiveDate) -> WatchResult<u64> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS article_count FROM news_articles \
             WHERE newspaper_id = $1 AND date_uploaded = $2",
        )
        .bind(id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?
        .get("article_count");

        to_count(count)
    }
}
