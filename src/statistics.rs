//! Long-term statistics store.
//!
//! Keeps one append-only series per statistic id (for example
//! `pieuvre:PRM123_consumption_hc`) with a running cumulative sum, persisted
//! as JSON. Imports are idempotent: on an empty series the full history is
//! backfilled, afterwards only periods newer than the stored tail are
//! appended.

use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One measured period within a series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatisticPoint {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub value: f64,
    /// Cumulative sum of values up to and including this point
    pub sum: f64,
}

/// A period to import, before the cumulative sum is assigned
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticPeriod {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub value: f64,
}

/// File-backed statistics store
pub struct StatisticsStore {
    path: PathBuf,
    series: BTreeMap<String, Vec<StatisticPoint>>,
    logger: StructuredLogger,
}

impl StatisticsStore {
    /// Create an empty store bound to the given file
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            series: BTreeMap::new(),
            logger: get_logger("statistics"),
        }
    }

    /// Load the store from disk; a missing file yields an empty store
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let mut store = Self::new(path.clone());
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            store.series = serde_json::from_str(&contents)?;
            store.logger.info(&format!(
                "Loaded {} statistic series from {}",
                store.series.len(),
                path.display()
            ));
        }
        Ok(store)
    }

    /// Persist all series to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.series)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    /// Import periods into a series. Returns the number of points appended.
    ///
    /// An empty series is backfilled with the full sorted history. A non-empty
    /// series only accepts periods starting strictly after its stored tail,
    /// so re-importing the same window is a no-op.
    pub fn import(&mut self, statistic_id: &str, periods: &[StatisticPeriod]) -> usize {
        if periods.is_empty() {
            return 0;
        }

        let mut incoming: Vec<StatisticPeriod> = periods.to_vec();
        incoming.sort_by_key(|p| p.period_start);
        incoming.dedup_by_key(|p| p.period_start);

        let series = self.series.entry(statistic_id.to_string()).or_default();
        let tail_start = series.last().map(|p| p.period_start);
        let mut sum = series.last().map(|p| p.sum).unwrap_or(0.0);

        let mut appended = 0;
        for period in incoming {
            if let Some(tail) = tail_start
                && period.period_start <= tail
            {
                continue;
            }
            sum += period.value;
            series.push(StatisticPoint {
                period_start: period.period_start,
                period_end: period.period_end,
                value: period.value,
                sum,
            });
            appended += 1;
        }

        if appended > 0 {
            self.logger.debug(&format!(
                "Imported {} points into {}",
                appended, statistic_id
            ));
        }
        appended
    }

    /// Stored points for a series, if any
    pub fn series(&self, statistic_id: &str) -> Option<&[StatisticPoint]> {
        self.series.get(statistic_id).map(Vec::as_slice)
    }

    /// Number of series held
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Statistic id for a meter series, e.g. `pieuvre:PRM123_consumption_hc`
pub fn statistic_id(device_id: &str, series: &str) -> String {
    format!("pieuvre:{}_{}", device_id, series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn period(day: u32, value: f64) -> StatisticPeriod {
        StatisticPeriod {
            period_start: Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap(),
            period_end: Utc.with_ymd_and_hms(2025, 1, day + 1, 0, 0, 0).unwrap(),
            value,
        }
    }

    #[test]
    fn test_backfill_then_idempotent() {
        let mut store = StatisticsStore::new("/tmp/unused.json");
        let periods = vec![period(2, 3.0), period(1, 2.0)];

        assert_eq!(store.import("pieuvre:PRM1_consumption_hp", &periods), 2);
        let series = store.series("pieuvre:PRM1_consumption_hp").unwrap();
        assert_eq!(series[0].value, 2.0);
        assert_eq!(series[1].sum, 5.0);

        // Same window again appends nothing
        assert_eq!(store.import("pieuvre:PRM1_consumption_hp", &periods), 0);
    }

    #[test]
    fn test_incremental_append_continues_sum() {
        let mut store = StatisticsStore::new("/tmp/unused.json");
        store.import("s", &[period(1, 2.0), period(2, 3.0)]);
        assert_eq!(store.import("s", &[period(2, 3.0), period(3, 4.0)]), 1);

        let series = store.series("s").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[2].sum, 9.0);
    }
}
