use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use news_volume_watch::anomaly::{ModeTieBreak, VolumeCheck};
use news_volume_watch::config::AppConfig;
use news_volume_watch::db::{self, PgArticleStore};
use news_volume_watch::history::{ArticleHistoryProvider, HistoryAggregator, NewspaperExistence};
use news_volume_watch::logging::init_tracing;
use news_volume_watch::models::NewspaperId;
use news_volume_watch::report::{self, WeeklyReportBuilder};
use news_volume_watch::store::MemoryStore;
use news_volume_watch::{Verdict, WatchError};

/// Exit status for a missing newspaper or a missing baseline.
const EXIT_NOT_FOUND: u8 = 4;

#[derive(Parser)]
#[command(name = "news-volume-watch")]
#[command(about = "Article volume checks for newspapers", long_about = None)]
struct Cli {
    /// Read articles from a CSV snapshot instead of Postgres
    #[arg(long, global = true)]
    csv: Option<PathBuf>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Check whether today's article count is anomalously low
    Verify {
        #[arg(long)]
        newspaper_id: NewspaperId,
        /// Day to check, defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        window_days: Option<i64>,
        /// smallest, largest or earliest
        #[arg(long)]
        tie_break: Option<ModeTieBreak>,
    },
    /// Articles per day for the previous full week
    Weekly {
        #[arg(long)]
        newspaper_id: NewspaperId,
        /// Reference day, defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Write a markdown report to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    init_tracing(&config.log_level);

    if let Commands::InitDb = cli.command {
        let pool = connect(&config).await?;
        db::init_db(&pool).await.context("failed to apply migrations")?;
        println!("Schema ready.");
        return Ok(ExitCode::SUCCESS);
    }

    match &cli.csv {
        Some(path) => {
            let store = MemoryStore::from_csv_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            run(&cli, &config, &store).await
        }
        None => {
            let store = PgArticleStore::new(connect(&config).await?);
            run(&cli, &config, &store).await
        }
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set unless --csv is given")?;
    db::connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn run<S>(cli: &Cli, config: &AppConfig, store: &S) -> anyhow::Result<ExitCode>
where
    S: ArticleHistoryProvider + NewspaperExistence,
{
    let today = Utc::now().date_naive();

    match &cli.command {
        Commands::InitDb => Ok(ExitCode::SUCCESS),
        Commands::Verify {
            newspaper_id,
            date,
            window_days,
            tie_break,
        } => {
            let mut classifier = config.classifier;
            if let Some(policy) = tie_break {
                classifier.tie_break = *policy;
            }
            let window_days = window_days.unwrap_or(config.window_days);
            anyhow::ensure!(
                window_days >= 1,
                "--window-days must be at least 1, got {window_days}"
            );

            let check = VolumeCheck::new(HistoryAggregator::new(store, store), classifier);
            let report = match check
                .run(*newspaper_id, date.unwrap_or(today), window_days)
                .await
            {
                Err(WatchError::NotFound(id)) => return Ok(not_found(id)),
                other => other?,
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.message);
            }

            if matches!(report.verdict, Verdict::InsufficientData { .. }) {
                warn!(newspaper_id = *newspaper_id, "no baseline for this weekday");
                return Ok(ExitCode::from(EXIT_NOT_FOUND));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Weekly {
            newspaper_id,
            date,
            out,
        } => {
            let builder = WeeklyReportBuilder::new(HistoryAggregator::new(store, store));
            let series = match builder.build(*newspaper_id, date.unwrap_or(today)).await {
                Err(WatchError::NotFound(id)) => return Ok(not_found(id)),
                other => other?,
            };

            if let Some(path) = out {
                std::fs::write(path, report::render_markdown(*newspaper_id, &series))?;
                info!(path = %path.display(), "weekly report written");
                println!("Report written to {}.", path.display());
            } else if cli.json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                for day in series.days() {
                    println!("{} {}", day.date, day.count);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn not_found(id: NewspaperId) -> ExitCode {
    eprintln!("Newspaper {id} not found.");
    ExitCode::from(EXIT_NOT_FOUND)
}
