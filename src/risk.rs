use crate::config::ScoringConfig;
use crate::models::{RiskLevel, StallRiskAssessment, TrendState};

pub struct StallRiskAssessor<'a> {
    config: &'a ScoringConfig,
}

impl<'a> StallRiskAssessor<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    /// First matching rule wins: trust trough, stalled, declining, clear.
    pub fn assess(
        &self,
        enrolled_pct: f64,
        trend: TrendState,
        days_since_last: i64,
    ) -> StallRiskAssessment {
        if self.is_trust_trough(enrolled_pct, trend, days_since_last) {
            return trust_trough(enrolled_pct, days_since_last);
        }

        match trend {
            TrendState::Stalled => {
                let risk_level = stalled_level(days_since_last, self.config.critical_stall_days);
                assessment(
                    risk_level,
                    format!("Enrollment has stalled; last new device {days_since_last} days ago"),
                    vec![
                        "Seven-day enrollment velocity is effectively zero".to_string(),
                        format!("{days_since_last} days since the last new enrollment"),
                    ],
                    vec![
                        "Run the Rebuild Momentum playbook with a small, low-risk batch"
                            .to_string(),
                        "Review enrollment failures from the last 30 days".to_string(),
                    ],
                    days_since_last,
                )
            }
            TrendState::Declining => assessment(
                RiskLevel::Low,
                "Enrollment pace is slowing compared to the 30-day average".to_string(),
                vec!["Seven-day velocity is below the 30-day velocity".to_string()],
                vec!["Keep the next batch scheduled and watch the weekly trend".to_string()],
                days_since_last,
            ),
            _ => assessment(
                RiskLevel::None,
                "Enrollment is progressing normally".to_string(),
                Vec::new(),
                Vec::new(),
                0,
            ),
        }
    }

    /// In the configured completion band, not accelerating, and quiet for longer
    /// than the trough window.
    pub fn is_trust_trough(&self, enrolled_pct: f64, trend: TrendState, days_since_last: i64) -> bool {
        let in_band = enrolled_pct >= self.config.trust_trough_lower
            && enrolled_pct <= self.config.trust_trough_upper;
        let losing_pace = matches!(
            trend,
            TrendState::Declining | TrendState::Stalled | TrendState::Steady
        );
        in_band && losing_pace && days_since_last > self.config.trust_trough_days
    }
}

pub fn stalled_level(days_since_last: i64, critical_after: i64) -> RiskLevel {
    if days_since_last > critical_after {
        RiskLevel::Critical
    } else {
        RiskLevel::Medium
    }
}

fn trust_trough(enrolled_pct: f64, days_since_last: i64) -> StallRiskAssessment {
    let mut result = assessment(
        RiskLevel::High,
        format!(
            "Migration is stuck in the trust trough at {enrolled_pct:.0}% with no new enrollments for {days_since_last} days"
        ),
        vec![
            "Completion sits in the band where rollouts most often stall".to_string(),
            "Early adopters are done; remaining owners are waiting for proof".to_string(),
            "Harder devices and apps are left in the backlog".to_string(),
            format!("{days_since_last} days without a new enrollment"),
        ],
        vec![
            "Start the Rebuild Momentum playbook this week".to_string(),
            "Pick a visible, low-risk batch to show progress again".to_string(),
            "Publish success numbers to stakeholders after the batch completes".to_string(),
            "Schedule the following batch before closing out the current one".to_string(),
        ],
        days_since_last,
    );
    result.is_trust_trough_risk = true;
    result
}

fn assessment(
    risk_level: RiskLevel,
    description: String,
    contributing_factors: Vec<String>,
    recommended_actions: Vec<String>,
    days_at_risk: i64,
) -> StallRiskAssessment {
    StallRiskAssessment {
        is_at_risk: risk_level >= RiskLevel::Medium,
        is_trust_trough_risk: false,
        risk_level,
        description,
        contributing_factors,
        recommended_actions,
        days_at_risk,
    }
}
