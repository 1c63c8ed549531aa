//! Multi-factor migration confidence model.
//!
//! Five category sub-scores, each clamped to [0, 100], are combined by the
//! configured weights into one score. Adjustments made along the way are
//! recorded as signed drivers so the result can say why it landed where it did.

use std::cmp::Ordering;

use crate::config::ScoringConfig;
use crate::models::{
    CategoryScore, ConfidenceBand, ConfidenceInputs, ConfidenceResult, EstimatedSignals,
    MeasuredSignals, ScoreCategory, ScoreDriver,
};
use crate::Result;

const RETRY_THRESHOLD: u32 = 10;
const DUPLICATE_THRESHOLD: u32 = 5;
const STALL_GRACE_DAYS: i64 = 7;
const MAX_STALL_PENALTY: f64 = 30.0;
const MAX_RISKY_SIGN_IN_PENALTY: f64 = 20.0;
const TOP_DRIVERS: usize = 3;
const TOP_DETRACTORS: usize = 2;

pub struct ConfidenceScorer<'a> {
    config: &'a ScoringConfig,
}

/// Accumulates one category's score and the adjustments that shaped it.
struct CategoryTally {
    category: ScoreCategory,
    weight: u32,
    score: f64,
    drivers: Vec<ScoreDriver>,
}

impl CategoryTally {
    fn new(category: ScoreCategory, weight: u32, baseline: f64) -> Self {
        Self {
            category,
            weight,
            score: baseline,
            drivers: Vec::new(),
        }
    }

    fn adjust(&mut self, points: f64, name: &str, description: String) {
        self.score += points;
        self.drivers.push(ScoreDriver {
            name: name.to_string(),
            description,
            impact: points * self.weight as f64 / 100.0,
            category: self.category,
        });
    }

    fn finish(mut self) -> (CategoryScore, Vec<ScoreDriver>) {
        self.score = self.score.clamp(0.0, 100.0);
        (
            CategoryScore {
                category: self.category,
                score: self.score,
                weight: self.weight,
            },
            self.drivers,
        )
    }
}

impl<'a> ConfidenceScorer<'a> {
    /// Refuses a config whose category weights do not sum to 100.
    pub fn new(config: &'a ScoringConfig) -> Result<Self> {
        config.validate_weights()?;
        Ok(Self { config })
    }

    pub fn score(&self, inputs: &ConfidenceInputs) -> ConfidenceResult {
        let tallies = [
            self.velocity(&inputs.measured),
            self.success_rate(&inputs.estimated),
            self.complexity(&inputs.estimated),
            self.infrastructure(&inputs.estimated),
            self.conditional_access(&inputs.estimated),
        ];

        let mut categories = Vec::with_capacity(tallies.len());
        let mut drivers = Vec::new();
        for tally in tallies {
            let (category, found) = tally.finish();
            categories.push(category);
            drivers.extend(found);
        }

        let weighted: f64 = categories
            .iter()
            .map(|c| c.score * c.weight as f64 / 100.0)
            .sum();
        let score = weighted.round().clamp(0.0, 100.0) as u8;
        let band = ConfidenceBand::from_score(score);

        let mut positives: Vec<ScoreDriver> =
            drivers.iter().filter(|d| d.impact > 0.0).cloned().collect();
        positives.sort_by(|a, b| b.impact.partial_cmp(&a.impact).unwrap_or(Ordering::Equal));
        positives.truncate(TOP_DRIVERS);

        let mut negatives: Vec<ScoreDriver> =
            drivers.into_iter().filter(|d| d.impact < 0.0).collect();
        negatives.sort_by(|a, b| a.impact.partial_cmp(&b.impact).unwrap_or(Ordering::Equal));
        negatives.truncate(TOP_DETRACTORS);

        let explanation = explain(band, score, &positives, &negatives);

        ConfidenceResult {
            score,
            band,
            categories,
            top_drivers: positives,
            top_detractors: negatives,
            explanation,
        }
    }

    fn velocity(&self, signals: &MeasuredSignals) -> CategoryTally {
        let mut tally = CategoryTally::new(
            ScoreCategory::Velocity,
            self.config.velocity_weight,
            50.0,
        );
        let average = (signals.velocity_30 + signals.velocity_60 + signals.velocity_90) / 3.0;
        let excellent = self.config.excellent_velocity_threshold;
        let good = self.config.good_velocity_threshold;

        if average >= excellent {
            tally.adjust(
                50.0,
                "Excellent enrollment velocity",
                format!("Averaging {average:.1} devices/day, at or above {excellent:.1}"),
            );
        } else if average >= good {
            tally.adjust(
                25.0,
                "Good enrollment velocity",
                format!("Averaging {average:.1} devices/day, at or above {good:.1}"),
            );
        } else if average < good / 2.0 {
            tally.adjust(
                -25.0,
                "Slow enrollment velocity",
                format!("Averaging {average:.1} devices/day, well below {good:.1}"),
            );
        }

        let days = signals.days_since_last_enrollment;
        if days > STALL_GRACE_DAYS {
            let penalty = (days as f64 * self.config.stall_day_penalty).min(MAX_STALL_PENALTY);
            tally.adjust(
                -penalty,
                "Enrollment gap",
                format!("No new enrollments for {days} days"),
            );
        }
        tally
    }

    fn success_rate(&self, signals: &EstimatedSignals) -> CategoryTally {
        let rate = signals.first_attempt_success_rate.clamp(0.0, 1.0);
        let mut tally = CategoryTally::new(
            ScoreCategory::SuccessRate,
            self.config.success_rate_weight,
            rate * 100.0,
        );

        if rate >= self.config.high_success_rate {
            tally.adjust(
                20.0,
                "High first-attempt success",
                format!("{:.0}% of enrollments succeed on the first attempt", rate * 100.0),
            );
        } else if rate < self.config.low_success_rate {
            tally.adjust(
                -15.0,
                "Low first-attempt success",
                format!("Only {:.0}% of enrollments succeed on the first attempt", rate * 100.0),
            );
        }

        if signals.retry_count > RETRY_THRESHOLD || signals.duplicate_count > DUPLICATE_THRESHOLD {
            tally.adjust(
                -15.0,
                "Enrollment churn",
                format!(
                    "{} retries and {} duplicate registrations",
                    signals.retry_count, signals.duplicate_count
                ),
            );
        }
        tally
    }

    fn complexity(&self, signals: &EstimatedSignals) -> CategoryTally {
        let mut tally = CategoryTally::new(
            ScoreCategory::Complexity,
            self.config.complexity_weight,
            100.0,
        );
        let apps = signals.required_app_count;

        if apps > self.config.high_app_count_threshold {
            tally.adjust(
                -30.0,
                "Heavy app payload",
                format!("{apps} required apps must install during provisioning"),
            );
        } else if apps < self.config.low_app_count_threshold {
            tally.adjust(
                10.0,
                "Lean app payload",
                format!("Only {apps} required apps"),
            );
        }

        let blocking = signals.esp_blocking_app_count;
        if blocking > self.config.esp_blocking_warning_threshold {
            tally.adjust(
                -(blocking as f64 * self.config.esp_blocking_app_penalty),
                "Provisioning-blocking apps",
                format!("{blocking} apps gate completion of the enrollment status page"),
            );
        }
        tally
    }

    fn infrastructure(&self, signals: &EstimatedSignals) -> CategoryTally {
        let mut tally = CategoryTally::new(
            ScoreCategory::Infrastructure,
            self.config.infrastructure_weight,
            50.0,
        );

        if signals.has_gateway {
            tally.adjust(
                self.config.gateway_bonus,
                "Cloud management gateway",
                "Gateway lets remote devices reach on-premises management".to_string(),
            );
        } else {
            tally.adjust(
                -self.config.gateway_missing_penalty,
                "No cloud management gateway",
                "Devices off the corporate network cannot reach on-premises management"
                    .to_string(),
            );
        }
        if signals.has_co_management {
            tally.adjust(
                self.config.co_management_bonus,
                "Co-management enabled",
                "Workloads can shift to the cloud incrementally".to_string(),
            );
        }
        if signals.has_zero_touch {
            tally.adjust(
                self.config.zero_touch_bonus,
                "Zero-touch provisioning",
                "New and reset devices register without manual setup".to_string(),
            );
        }
        tally
    }

    fn conditional_access(&self, signals: &EstimatedSignals) -> CategoryTally {
        let mut tally = CategoryTally::new(
            ScoreCategory::ConditionalAccess,
            self.config.conditional_access_weight,
            80.0,
        );

        if signals.has_blocking_ca_policy {
            tally.adjust(
                -self.config.blocking_policy_penalty,
                "Blocking access policy",
                "A conditional access policy blocks devices mid-enrollment".to_string(),
            );
        }
        if signals.requires_mfa && !signals.has_zero_touch {
            tally.adjust(
                -10.0,
                "MFA without zero-touch",
                "Users must complete MFA during manual device setup".to_string(),
            );
        }
        if signals.risky_sign_in_count > 0 {
            let penalty =
                (signals.risky_sign_in_count as f64 * 2.0).min(MAX_RISKY_SIGN_IN_PENALTY);
            tally.adjust(
                -penalty,
                "Risky sign-ins",
                format!("{} risky sign-ins flagged", signals.risky_sign_in_count),
            );
        }
        tally
    }
}

fn explain(
    band: ConfidenceBand,
    score: u8,
    drivers: &[ScoreDriver],
    detractors: &[ScoreDriver],
) -> String {
    let mut text = format!("{band} confidence ({score}/100).");
    if !drivers.is_empty() {
        let names: Vec<&str> = drivers.iter().map(|d| d.name.as_str()).collect();
        text.push_str(&format!(" Strengths: {}.", names.join(", ")));
    }
    if !detractors.is_empty() {
        let names: Vec<&str> = detractors.iter().map(|d| d.name.as_str()).collect();
        text.push_str(&format!(" Risks: {}.", names.join(", ")));
    }
    text
}
