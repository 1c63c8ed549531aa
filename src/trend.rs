use crate::config::ScoringConfig;
use crate::models::{EnrollmentSnapshot, TrendAnalysis, TrendState};

/// Fewer snapshots than this leave the trend `Unknown`.
pub const MIN_SNAPSHOTS: usize = 7;

pub struct TrendAnalyzer<'a> {
    config: &'a ScoringConfig,
}

impl<'a> TrendAnalyzer<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    /// Rolling velocities and trend state over an ordered snapshot series.
    pub fn compute(&self, snapshots: &[EnrollmentSnapshot]) -> TrendAnalysis {
        let velocity_7 = rolling_velocity(snapshots, 7);
        let velocity_30 = rolling_velocity(snapshots, 30);
        let velocity_60 = rolling_velocity(snapshots, 60);
        let velocity_90 = rolling_velocity(snapshots, 90);

        let week_over_week_change_pct = week_over_week_change(snapshots);

        let trend_state = if snapshots.len() < MIN_SNAPSHOTS {
            TrendState::Unknown
        } else {
            self.classify(velocity_7, velocity_30)
        };

        TrendAnalysis {
            velocity_7,
            velocity_30,
            velocity_60,
            velocity_90,
            week_over_week_change_pct,
            trend_state,
        }
    }

    fn classify(&self, velocity_7: f64, velocity_30: f64) -> TrendState {
        if velocity_7 < self.config.flat_velocity_delta_threshold {
            return TrendState::Stalled;
        }

        let ratio = if velocity_30 == 0.0 {
            1.0
        } else {
            velocity_7 / velocity_30
        };

        if ratio > self.config.accelerating_ratio {
            TrendState::Accelerating
        } else if ratio < self.config.declining_ratio {
            TrendState::Declining
        } else {
            TrendState::Steady
        }
    }
}

/// Simple moving average of new enrollments over the most recent
/// `min(window, len)` snapshots.
pub fn rolling_velocity(snapshots: &[EnrollmentSnapshot], window: usize) -> f64 {
    let take = window.min(snapshots.len());
    if take == 0 {
        return 0.0;
    }
    let total: u64 = snapshots[snapshots.len() - take..]
        .iter()
        .map(|s| s.new_enrollments_count)
        .sum();
    total as f64 / take as f64
}

fn week_over_week_change(snapshots: &[EnrollmentSnapshot]) -> Option<f64> {
    if snapshots.len() < 2 * 7 {
        return None;
    }
    let current = rolling_velocity(snapshots, 7);
    let prior = rolling_velocity(&snapshots[..snapshots.len() - 7], 7);
    if prior == 0.0 {
        return None;
    }
    Some((current - prior) / prior * 100.0)
}

/// Days between the most recent snapshot with new enrollments and the latest
/// snapshot. The whole span when nothing was ever enrolled; zero for no history.
pub fn days_since_last_enrollment(snapshots: &[EnrollmentSnapshot]) -> i64 {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        return 0;
    };
    match snapshots.iter().rev().find(|s| s.new_enrollments_count > 0) {
        Some(latest) => (last.date - latest.date).num_days(),
        None => (last.date - first.date).num_days() + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(daily: &[u64]) -> Vec<EnrollmentSnapshot> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut cloud = 0;
        daily
            .iter()
            .enumerate()
            .map(|(i, &new)| {
                cloud += new;
                EnrollmentSnapshot {
                    date: start + Duration::days(i as i64),
                    total_legacy_devices: 1_000,
                    total_cloud_devices: cloud,
                    new_enrollments_count: new,
                }
            })
            .collect()
    }

    #[test]
    fn short_history_is_unknown() {
        let config = ScoringConfig::default();
        let analyzer = TrendAnalyzer::new(&config);
        for len in 0..MIN_SNAPSHOTS {
            let analysis = analyzer.compute(&series(&vec![5; len]));
            assert_eq!(analysis.trend_state, TrendState::Unknown);
            assert!(analysis.velocity_7.is_finite());
            assert!(analysis.velocity_90.is_finite());
            assert_eq!(analysis.week_over_week_change_pct, None);
        }
    }

    #[test]
    fn velocity_uses_available_window() {
        let snapshots = series(&[2, 4, 6]);
        assert_eq!(rolling_velocity(&snapshots, 7), 4.0);
        assert_eq!(rolling_velocity(&snapshots, 2), 5.0);
        assert_eq!(rolling_velocity(&[], 30), 0.0);
    }

    #[test]
    fn late_burst_accelerates() {
        let mut daily = vec![0; 83];
        daily.extend([10, 10, 10, 5, 5, 5, 5]);
        let config = ScoringConfig::default();
        let analysis = TrendAnalyzer::new(&config).compute(&series(&daily));

        assert!((analysis.velocity_7 - 50.0 / 7.0).abs() < 1e-9);
        assert!((analysis.velocity_30 - 50.0 / 30.0).abs() < 1e-9);
        assert_eq!(analysis.trend_state, TrendState::Accelerating);
        assert_eq!(analysis.week_over_week_change_pct, None);
    }

    #[test]
    fn quiet_week_is_stalled() {
        let mut daily = vec![10; 30];
        daily.extend([0; 7]);
        let config = ScoringConfig::default();
        let analysis = TrendAnalyzer::new(&config).compute(&series(&daily));
        assert_eq!(analysis.trend_state, TrendState::Stalled);
        assert_eq!(analysis.week_over_week_change_pct, Some(-100.0));
    }

    #[test]
    fn flat_rate_is_steady() {
        let config = ScoringConfig::default();
        let analysis = TrendAnalyzer::new(&config).compute(&series(&[8; 40]));
        assert_eq!(analysis.trend_state, TrendState::Steady);
        assert_eq!(analysis.week_over_week_change_pct, Some(0.0));
    }

    #[test]
    fn slowing_rate_is_declining() {
        let mut daily = vec![20; 23];
        daily.extend([5; 7]);
        let config = ScoringConfig::default();
        let analysis = TrendAnalyzer::new(&config).compute(&series(&daily));
        assert_eq!(analysis.trend_state, TrendState::Declining);
    }

    #[test]
    fn days_since_last_enrollment_counts_from_latest_activity() {
        assert_eq!(days_since_last_enrollment(&[]), 0);
        assert_eq!(days_since_last_enrollment(&series(&[3, 0, 0, 0])), 3);
        assert_eq!(days_since_last_enrollment(&series(&[0, 0, 4])), 0);
        assert_eq!(days_since_last_enrollment(&series(&[0; 10])), 10);
    }
}
