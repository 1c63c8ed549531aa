//! Inventory and enrollment-history sources.
//!
//! The engine never fetches data itself; the orchestrator pulls counts and
//! history through these traits before any scoring runs.

use std::future::Future;
use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::debug;

use crate::models::{DeviceCounts, EnrollmentSnapshot};
use crate::{Error, Result};

pub trait InventoryProvider {
    fn device_counts(&self) -> impl Future<Output = Result<DeviceCounts>> + Send;
}

pub trait HistoryProvider {
    fn history(
        &self,
        counts: &DeviceCounts,
    ) -> impl Future<Output = Result<Vec<EnrollmentSnapshot>>> + Send;
}

/// Counts known up front, e.g. from the command line.
#[derive(Debug, Clone)]
pub struct StaticInventory(pub DeviceCounts);

impl InventoryProvider for StaticInventory {
    async fn device_counts(&self) -> Result<DeviceCounts> {
        Ok(self.0)
    }
}

/// Stored history in a CSV file with columns
/// `date,total_legacy_devices,total_cloud_devices,new_enrollments_count`.
#[derive(Debug, Clone)]
pub struct CsvHistory {
    path: PathBuf,
}

impl CsvHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistoryProvider for CsvHistory {
    async fn history(&self, _counts: &DeviceCounts) -> Result<Vec<EnrollmentSnapshot>> {
        #[derive(Deserialize)]
        struct CsvRow {
            date: NaiveDate,
            total_legacy_devices: u64,
            total_cloud_devices: u64,
            new_enrollments_count: u64,
        }

        let bytes = tokio::fs::read(&self.path).await?;
        let mut reader = csv::Reader::from_reader(&bytes[..]);
        let mut snapshots = Vec::new();
        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            snapshots.push(EnrollmentSnapshot {
                date: row.date,
                total_legacy_devices: row.total_legacy_devices,
                total_cloud_devices: row.total_cloud_devices,
                new_enrollments_count: row.new_enrollments_count,
            });
        }
        snapshots.sort_by_key(|s| s.date);

        if snapshots.windows(2).any(|w| w[0].date == w[1].date) {
            return Err(Error::Provider(format!(
                "{} has more than one snapshot for the same day",
                self.path.display()
            )));
        }
        debug!("Read {} snapshots from {}", snapshots.len(), self.path.display());
        Ok(snapshots)
    }
}

pub const SYNTHETIC_SEED: u64 = 42;
pub const SYNTHETIC_DAYS: usize = 90;

/// Deterministic stand-in history for demos and tests.
///
/// Spreads roughly 40% of the current cloud count over the window with seeded
/// day-to-day noise, ending exactly at the current count.
#[derive(Debug, Clone)]
pub struct SyntheticHistory {
    end_date: NaiveDate,
    days: usize,
    seed: u64,
}

impl SyntheticHistory {
    pub fn new(end_date: NaiveDate) -> Self {
        Self {
            end_date,
            days: SYNTHETIC_DAYS,
            seed: SYNTHETIC_SEED,
        }
    }

    pub fn generate(&self, counts: &DeviceCounts) -> Vec<EnrollmentSnapshot> {
        let current = counts.total_cloud_devices;
        let growth = (u128::from(current) * 2 / 5) as u64;
        let start = current - growth;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let weights: Vec<f64> = (0..self.days).map(|_| rng.gen_range(0.2..1.8)).collect();
        let total_weight: f64 = weights.iter().sum();

        let mut running_weight = 0.0;
        let mut enrolled_so_far = 0u64;
        let first_day = self.end_date - Duration::days(self.days as i64 - 1);

        weights
            .iter()
            .enumerate()
            .map(|(day, weight)| {
                running_weight += weight;
                let target = if day + 1 == self.days {
                    growth
                } else {
                    (((growth as f64) * running_weight / total_weight).round() as u64).min(growth)
                };
                let new_enrollments = target.saturating_sub(enrolled_so_far);
                enrolled_so_far += new_enrollments;
                EnrollmentSnapshot {
                    date: first_day + Duration::days(day as i64),
                    total_legacy_devices: counts.total_legacy_devices,
                    total_cloud_devices: start + enrolled_so_far,
                    new_enrollments_count: new_enrollments,
                }
            })
            .collect()
    }
}

impl HistoryProvider for SyntheticHistory {
    async fn history(&self, counts: &DeviceCounts) -> Result<Vec<EnrollmentSnapshot>> {
        debug!("Synthesizing {} days of enrollment history", self.days);
        Ok(self.generate(counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn counts(legacy: u64, cloud: u64) -> DeviceCounts {
        DeviceCounts {
            total_legacy_devices: legacy,
            total_cloud_devices: cloud,
        }
    }

    #[test]
    fn synthetic_history_is_deterministic_and_consistent() {
        let end = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let provider = SyntheticHistory::new(end);
        let first = provider.generate(&counts(1_000, 500));
        let second = provider.generate(&counts(1_000, 500));

        assert_eq!(first, second);
        assert_eq!(first.len(), SYNTHETIC_DAYS);
        assert_eq!(first.last().unwrap().date, end);
        assert_eq!(first.last().unwrap().total_cloud_devices, 500);
        assert!(first
            .windows(2)
            .all(|w| w[0].total_cloud_devices <= w[1].total_cloud_devices));
        let enrolled: u64 = first.iter().map(|s| s.new_enrollments_count).sum();
        assert_eq!(enrolled, 200);
    }

    #[test]
    fn synthetic_history_handles_empty_fleet() {
        let end = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let history = SyntheticHistory::new(end).generate(&counts(0, 0));
        assert_eq!(history.len(), SYNTHETIC_DAYS);
        assert!(history.iter().all(|s| s.new_enrollments_count == 0));
    }

    #[test]
    fn synthetic_history_handles_huge_fleet() {
        let end = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let cloud = u64::MAX / 2 + 10;
        let history = SyntheticHistory::new(end).generate(&counts(u64::MAX, cloud));
        assert_eq!(history.len(), SYNTHETIC_DAYS);
        assert_eq!(history.last().unwrap().total_cloud_devices, cloud);
    }

    #[tokio::test]
    async fn csv_history_missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = CsvHistory::new(dir.path().join("absent.csv"))
            .history(&counts(1_000, 400))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn csv_history_sorts_by_date() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "date,total_legacy_devices,total_cloud_devices,new_enrollments_count"
        )
        .unwrap();
        writeln!(file, "2026-02-03,1000,412,7").unwrap();
        writeln!(file, "2026-02-01,1000,400,4").unwrap();
        writeln!(file, "2026-02-02,1000,405,5").unwrap();
        file.flush().unwrap();

        let history = CsvHistory::new(file.path())
            .history(&counts(1_000, 412))
            .await
            .unwrap();
        let days: Vec<u32> = history.iter().map(|s| s.new_enrollments_count as u32).collect();
        assert_eq!(days, vec![4, 5, 7]);
    }

    #[tokio::test]
    async fn csv_history_rejects_duplicate_days() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "date,total_legacy_devices,total_cloud_devices,new_enrollments_count"
        )
        .unwrap();
        writeln!(file, "2026-02-01,1000,400,4").unwrap();
        writeln!(file, "2026-02-01,1000,401,1").unwrap();
        file.flush().unwrap();

        let err = CsvHistory::new(file.path())
            .history(&counts(1_000, 401))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn static_inventory_returns_counts() {
        let inventory = StaticInventory(counts(800, 300));
        assert_eq!(inventory.device_counts().await.unwrap(), counts(800, 300));
    }
}
