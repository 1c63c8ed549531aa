use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCounts {
    pub total_legacy_devices: u64,
    pub total_cloud_devices: u64,
}

impl DeviceCounts {
    /// Cloud share of the legacy fleet, capped at 100. Zero when there is no fleet.
    pub fn enrolled_pct(&self) -> f64 {
        if self.total_legacy_devices == 0 {
            return 0.0;
        }
        let pct = self.total_cloud_devices as f64 / self.total_legacy_devices as f64 * 100.0;
        pct.min(100.0)
    }

    pub fn remaining(&self) -> u64 {
        self.total_legacy_devices
            .saturating_sub(self.total_cloud_devices)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentSnapshot {
    pub date: NaiveDate,
    pub total_legacy_devices: u64,
    pub total_cloud_devices: u64,
    pub new_enrollments_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendState {
    Unknown,
    Accelerating,
    Steady,
    Declining,
    Stalled,
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrendState::Unknown => "Unknown",
            TrendState::Accelerating => "Accelerating",
            TrendState::Steady => "Steady",
            TrendState::Declining => "Declining",
            TrendState::Stalled => "Stalled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub velocity_7: f64,
    pub velocity_30: f64,
    pub velocity_60: f64,
    pub velocity_90: f64,
    /// Absent when there is no prior week to compare against or it had no enrollments.
    pub week_over_week_change_pct: Option<f64>,
    pub trend_state: TrendState,
}

/// Signals derived from the device counts and enrollment history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasuredSignals {
    pub velocity_30: f64,
    pub velocity_60: f64,
    pub velocity_90: f64,
    pub enrolled_pct: f64,
    pub days_since_last_enrollment: i64,
}

/// Readiness signals with no live source yet.
///
/// `Default` carries placeholder estimates; callers with real readiness data
/// load it from a JSON document instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatedSignals {
    pub first_attempt_success_rate: f64,
    pub retry_count: u32,
    pub duplicate_count: u32,
    pub required_app_count: u32,
    pub esp_blocking_app_count: u32,
    pub has_gateway: bool,
    pub has_co_management: bool,
    pub has_zero_touch: bool,
    pub has_blocking_ca_policy: bool,
    pub requires_mfa: bool,
    pub risky_sign_in_count: u32,
}

impl Default for EstimatedSignals {
    fn default() -> Self {
        Self {
            first_attempt_success_rate: 0.85,
            retry_count: 0,
            duplicate_count: 0,
            required_app_count: 25,
            esp_blocking_app_count: 2,
            has_gateway: false,
            has_co_management: true,
            has_zero_touch: true,
            has_blocking_ca_policy: false,
            requires_mfa: false,
            risky_sign_in_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceInputs {
    pub measured: MeasuredSignals,
    pub estimated: EstimatedSignals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            75.. => ConfidenceBand::High,
            50..=74 => ConfidenceBand::Medium,
            _ => ConfidenceBand::Low,
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfidenceBand::Low => "Low",
            ConfidenceBand::Medium => "Medium",
            ConfidenceBand::High => "High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreCategory {
    Velocity,
    SuccessRate,
    Complexity,
    Infrastructure,
    ConditionalAccess,
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScoreCategory::Velocity => "Velocity",
            ScoreCategory::SuccessRate => "Success rate",
            ScoreCategory::Complexity => "Complexity",
            ScoreCategory::Infrastructure => "Infrastructure",
            ScoreCategory::ConditionalAccess => "Conditional access",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDriver {
    pub name: String,
    pub description: String,
    /// Signed contribution to the final score, in weighted points.
    pub impact: f64,
    pub category: ScoreCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: ScoreCategory,
    pub score: f64,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceResult {
    pub score: u8,
    pub band: ConfidenceBand,
    pub categories: Vec<CategoryScore>,
    pub top_drivers: Vec<ScoreDriver>,
    pub top_detractors: Vec<ScoreDriver>,
    pub explanation: String,
}

impl ConfidenceResult {
    pub fn category_score(&self, category: ScoreCategory) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::None => "None",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StallRiskAssessment {
    pub is_at_risk: bool,
    pub is_trust_trough_risk: bool,
    pub risk_level: RiskLevel,
    pub description: String,
    pub contributing_factors: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub days_at_risk: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybookType {
    RebuildMomentum,
    ReduceDependencies,
    AutopilotHygiene,
}

impl fmt::Display for PlaybookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybookType::RebuildMomentum => "Rebuild Momentum",
            PlaybookType::ReduceDependencies => "Reduce Dependencies",
            PlaybookType::AutopilotHygiene => "Autopilot Hygiene",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub percentage: u8,
    pub name: String,
    pub description: String,
    pub recommended_playbook: PlaybookType,
    pub is_trust_trough_boundary: bool,
    pub is_achieved: bool,
    pub is_current: bool,
    pub is_next: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionType {
    Review,
    Verify,
    DryRun,
    Execute,
    Document,
    Remediate,
    Monitor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybookStep {
    pub order: u32,
    pub title: String,
    pub description: String,
    pub action_type: ActionType,
    pub checklist: Vec<String>,
    pub expected_outcome: String,
    pub rollback_instructions: Option<String>,
    pub requires_confirmation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Playbook {
    pub name: String,
    pub playbook_type: PlaybookType,
    pub risk_level: RiskLevel,
    pub estimated_time: String,
    pub steps: Vec<PlaybookStep>,
    pub is_recommended: bool,
    pub recommendation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsResult {
    pub run_id: Uuid,
    pub computed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub counts: DeviceCounts,
    pub enrolled_pct: f64,
    pub days_since_last_enrollment: i64,
    pub signals_estimated: bool,
    pub trend: TrendAnalysis,
    pub confidence: ConfidenceResult,
    pub stall_risk: StallRiskAssessment,
    pub milestones: Vec<Milestone>,
    pub playbooks: Vec<Playbook>,
}

impl AnalyticsResult {
    pub fn recommended_playbook(&self) -> Option<&Playbook> {
        self.playbooks.iter().find(|p| p.is_recommended)
    }
}
