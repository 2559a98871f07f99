use std::env;

use crate::anomaly::{ClassifierConfig, ModeTieBreak, DEFAULT_CV_CUTOFF, DEFAULT_THRESHOLD_RATIO};
use crate::error::{WatchError, WatchResult};
use crate::history::DEFAULT_WINDOW_DAYS;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub log_level: String,
    pub window_days: i64,
    pub classifier: ClassifierConfig,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the environment.
    pub fn from_env() -> WatchResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> WatchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let window_days = parse_or(&lookup, "WATCH_WINDOW_DAYS", DEFAULT_WINDOW_DAYS)?;
        if window_days < 1 {
            return Err(WatchError::Config(format!(
                "WATCH_WINDOW_DAYS must be at least 1, got {window_days}"
            )));
        }

        let threshold_ratio = parse_or(&lookup, "WATCH_THRESHOLD_RATIO", DEFAULT_THRESHOLD_RATIO)?;
        let cv_cutoff = parse_or(&lookup, "WATCH_CV_CUTOFF", DEFAULT_CV_CUTOFF)?;
        if threshold_ratio < 0.0 || cv_cutoff < 0.0 {
            return Err(WatchError::Config(
                "WATCH_THRESHOLD_RATIO and WATCH_CV_CUTOFF must not be negative".to_string(),
            ));
        }

        let tie_break = match lookup("WATCH_MODE_TIE_BREAK") {
            Some(raw) => raw.parse::<ModeTieBreak>()?,
            None => ModeTieBreak::default(),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_owned()),
            window_days,
            classifier: ClassifierConfig {
                threshold_ratio,
                cv_cutoff,
                tie_break,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> WatchResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| WatchError::Config(format!("invalid {key}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::from_lookup(lookup_from(&[])).expect("defaults parse");
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.window_days, 183);
        assert_eq!(cfg.classifier, ClassifierConfig::default());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/news"),
            ("LOG_LEVEL", "debug"),
            ("WATCH_WINDOW_DAYS", "90"),
            ("WATCH_THRESHOLD_RATIO", "0.75"),
            ("WATCH_CV_CUTOFF", "0.4"),
            ("WATCH_MODE_TIE_BREAK", "largest"),
        ]))
        .expect("overrides parse");

        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/news"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.window_days, 90);
        assert_eq!(cfg.classifier.threshold_ratio, 0.75);
        assert_eq!(cfg.classifier.cv_cutoff, 0.4);
        assert_eq!(cfg.classifier.tie_break, ModeTieBreak::Largest);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for pairs in [
            [("WATCH_WINDOW_DAYS", "six months")],
            [("WATCH_WINDOW_DAYS", "0")],
            [("WATCH_THRESHOLD_RATIO", "-1")],
            [("WATCH_MODE_TIE_BREAK", "random")],
        ] {
            let result = AppConfig::from_lookup(lookup_from(&pairs));
            assert!(matches!(result, Err(WatchError::Config(_))), "{pairs:?}");
        }
    }

    #[test]
    fn empty_database_url_counts_as_unset() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "")])).unwrap();
        assert!(cfg.database_url.is_none());
    }
}
