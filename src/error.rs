use thiserror::Error;

use crate::models::NewspaperId;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("newspaper {0} not found")]
    NotFound(NewspaperId),

    #[error("database error: {0}")]
    Database(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for WatchError {
    fn from(err: sqlx::Error) -> Self {
        WatchError::Database(err.to_string())
    }
}

impl From<csv::Error> for WatchError {
    fn from(err: csv::Error) -> Self {
        WatchError::Snapshot(err.to_string())
    }
}

pub type WatchResult<T> = Result<T, WatchError>;
