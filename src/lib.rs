//! Article-volume checks for newspapers: same-weekday anomaly detection and
//! the previous-week coverage series.

pub mod anomaly;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod logging;
pub mod models;
pub mod report;
pub mod store;

pub use anomaly::{classify, ClassifierConfig, ModeTieBreak, Verdict, VolumeCheck, VolumeReport};
pub use error::{WatchError, WatchResult};
pub use history::{ArticleHistoryProvider, HistoryAggregator, NewspaperExistence};
pub use models::{DailyCount, HistorySample, NewspaperId, WeekSeries};
pub use report::WeeklyReportBuilder;
pub use store::MemoryStore;
