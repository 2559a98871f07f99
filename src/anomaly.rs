//! Tiered check of today's article volume against same-weekday history:
//! 80% of the mean, then dispersion, then quartile or mode comparison.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{WatchError, WatchResult};
use crate::history::{ArticleHistoryProvider, HistoryAggregator, NewspaperExistence};
use crate::models::{HistorySample, NewspaperId};

pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.8;
pub const DEFAULT_CV_CUTOFF: f64 = 0.5;

/// Which value wins when several counts share the highest frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeTieBreak {
    #[default]
    Smallest,
    Largest,
    /// The value seen on the earliest date of the sample.
    Earliest,
}

impl FromStr for ModeTieBreak {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smallest" => Ok(Self::Smallest),
            "largest" => Ok(Self::Largest),
            "earliest" => Ok(Self::Earliest),
            other => Err(WatchError::Config(format!(
                "unknown mode tie-break '{other}' (expected smallest, largest or earliest)"
            ))),
        }
    }
}

impl fmt::Display for ModeTieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Smallest => "smallest",
            Self::Largest => "largest",
            Self::Earliest => "earliest",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub threshold_ratio: f64,
    pub cv_cutoff: f64,
    pub tie_break: ModeTieBreak,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: DEFAULT_THRESHOLD_RATIO,
            cv_cutoff: DEFAULT_CV_CUTOFF,
            tie_break: ModeTieBreak::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    AboveThreshold {
        today_count: u64,
        average: f64,
        ratio: f64,
        threshold: f64,
    },
    BelowQ1 {
        today_count: u64,
        q1: u64,
        q3: u64,
        cv: f64,
    },
    /// Anything at or above Q1 lands here, including counts above Q3.
    WithinIqr {
        today_count: u64,
        q1: u64,
        q3: u64,
        iqr: u64,
        cv: f64,
    },
    MatchesMode {
        today_count: u64,
        mode: u64,
        frequency: usize,
        cv: f64,
    },
    DoesNotMatchMode {
        today_count: u64,
        mode: u64,
        frequency: usize,
        cv: f64,
    },
    InsufficientData {
        today_count: u64,
    },
}

impl Verdict {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::AboveThreshold { .. } => "above_threshold",
            Self::BelowQ1 { .. } => "below_q1",
            Self::WithinIqr { .. } => "within_iqr",
            Self::MatchesMode { .. } => "matches_mode",
            Self::DoesNotMatchMode { .. } => "does_not_match_mode",
            Self::InsufficientData { .. } => "insufficient_data",
        }
    }

    pub fn today_count(&self) -> u64 {
        match self {
            Self::AboveThreshold { today_count, .. }
            | Self::BelowQ1 { today_count, .. }
            | Self::WithinIqr { today_count, .. }
            | Self::MatchesMode { today_count, .. }
            | Self::DoesNotMatchMode { today_count, .. }
            | Self::InsufficientData { today_count } => *today_count,
        }
    }

    /// Low volume worth flagging.
    pub fn is_anomalous(&self) -> bool {
        matches!(self, Self::BelowQ1 { .. } | Self::DoesNotMatchMode { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Self::AboveThreshold {
                today_count,
                ratio,
                threshold,
                ..
            } => format!(
                "Today's article count ({today_count}) is above the {:.0}% threshold ({threshold:.2}).",
                ratio * 100.0
            ),
            Self::BelowQ1 { q1, .. } => {
                format!("Today's article count is below the first quartile (Q1={q1}).")
            }
            Self::WithinIqr { iqr, .. } => format!(
                "Today's article count is within acceptable interquartile range (IQR={iqr})."
            ),
            Self::MatchesMode { mode, .. } => {
                format!("Today's article count matches the most frequent count ({mode}).")
            }
            Self::DoesNotMatchMode {
                today_count, mode, ..
            } => format!(
                "Today's article count ({today_count}) does not match the most frequent count ({mode})."
            ),
            Self::InsufficientData { .. } => {
                "No historical data found for this newspaper.".to_string()
            }
        }
    }
}

/// Classify `today_count` against `history`, given in date order.
pub fn classify(history: &[u64], today_count: u64, config: &ClassifierConfig) -> Verdict {
    if history.is_empty() {
        return Verdict::InsufficientData { today_count };
    }

    let average = mean(history);
    let threshold = average * config.threshold_ratio;
    if today_count as f64 >= threshold {
        return Verdict::AboveThreshold {
            today_count,
            average,
            ratio: config.threshold_ratio,
            threshold,
        };
    }

    let cv = coefficient_of_variation(history, average);
    debug!(average, threshold, cv, samples = history.len(), "below volume threshold");

    if cv > config.cv_cutoff {
        let mut sorted = history.to_vec();
        sorted.sort_unstable();
        let (q1, q3) = positional_quartiles(&sorted);

        if today_count < q1 {
            Verdict::BelowQ1 {
                today_count,
                q1,
                q3,
                cv,
            }
        } else {
            Verdict::WithinIqr {
                today_count,
                q1,
                q3,
                iqr: q3 - q1,
                cv,
            }
        }
    } else {
        let (mode, frequency) = mode(history, config.tie_break);
        if today_count == mode {
            Verdict::MatchesMode {
                today_count,
                mode,
                frequency,
                cv,
            }
        } else {
            Verdict::DoesNotMatchMode {
                today_count,
                mode,
                frequency,
                cv,
            }
        }
    }
}

pub fn classify_sample(sample: &HistorySample, today_count: u64, config: &ClassifierConfig) -> Verdict {
    classify(&sample.counts(), today_count, config)
}

pub fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64
}

/// Bessel-corrected standard deviation; 0 for fewer than two values.
pub fn sample_std_dev(values: &[u64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sq_diff: f64 = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum();
    (sq_diff / (values.len() - 1) as f64).sqrt()
}

pub fn coefficient_of_variation(values: &[u64], mean: f64) -> f64 {
    if values.len() < 2 || mean <= 0.0 {
        return 0.0;
    }
    sample_std_dev(values, mean) / mean
}

/// `(sorted[n / 4], sorted[3n / 4])`, no interpolation. `sorted` must be
/// non-empty and ascending.
pub(crate) fn positional_quartiles(sorted: &[u64]) -> (u64, u64) {
    let n = sorted.len();
    (sorted[n / 4], sorted[(3 * n) / 4])
}

/// Most frequent value and its frequency. `values` must be non-empty.
pub(crate) fn mode(values: &[u64], tie_break: ModeTieBreak) -> (u64, usize) {
    // value -> (frequency, first position)
    let mut table: BTreeMap<u64, (usize, usize)> = BTreeMap::new();
    for (position, value) in values.iter().enumerate() {
        table.entry(*value).or_insert((0, position)).0 += 1;
    }

    let mut best: Option<(u64, usize, usize)> = None;
    for (value, (frequency, first)) in table {
        let replace = match best {
            None => true,
            Some((_, best_freq, best_first)) => {
                frequency > best_freq
                    || (frequency == best_freq
                        && match tie_break {
                            ModeTieBreak::Smallest => false,
                            ModeTieBreak::Largest => true,
                            ModeTieBreak::Earliest => first < best_first,
                        })
            }
        };
        if replace {
            best = Some((value, frequency, first));
        }
    }

    best.map(|(value, frequency, _)| (value, frequency))
        .unwrap_or((0, 0))
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeReport {
    pub newspaper_id: NewspaperId,
    pub date: NaiveDate,
    pub window_days: i64,
    pub sample_size: usize,
    pub verdict: Verdict,
    pub message: String,
}

/// Existence check, history fetch, today's count, then classification.
pub struct VolumeCheck<'a, P: ?Sized, E: ?Sized> {
    aggregator: HistoryAggregator<'a, P, E>,
    config: ClassifierConfig,
}

impl<'a, P, E> VolumeCheck<'a, P, E>
where
    P: ArticleHistoryProvider + ?Sized,
    E: NewspaperExistence + ?Sized,
{
    pub fn new(aggregator: HistoryAggregator<'a, P, E>, config: ClassifierConfig) -> Self {
        Self { aggregator, config }
    }

    pub async fn run(
        &self,
        newspaper_id: NewspaperId,
        today: NaiveDate,
        window_days: i64,
    ) -> WatchResult<VolumeReport> {
        let sample = self
            .aggregator
            .fetch_same_weekday_history(newspaper_id, today, window_days)
            .await?;
        let today_count = self.aggregator.fetch_count(newspaper_id, today).await?;
        let verdict = classify_sample(&sample, today_count, &self.config);

        info!(
            newspaper_id,
            %today,
            today_count,
            verdict = verdict.tag(),
            anomalous = verdict.is_anomalous(),
            "volume check finished"
        );

        Ok(VolumeReport {
            newspaper_id,
            date: today,
            window_days,
            sample_size: sample.len(),
            message: verdict.message(),
            verdict,
        })
    }
}
