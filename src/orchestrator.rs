//! Runs the analytics pipeline end to end.
//!
//! Upstream fetch failures surface as errors before any scoring starts; the
//! scoring stages themselves cannot fail once the config has validated.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::confidence::ConfidenceScorer;
use crate::config::ConfigStore;
use crate::milestones::MilestoneTracker;
use crate::models::{
    AnalyticsResult, ConfidenceInputs, EstimatedSignals, MeasuredSignals, ScoreCategory,
};
use crate::playbooks::PlaybookGenerator;
use crate::providers::{HistoryProvider, InventoryProvider};
use crate::risk::StallRiskAssessor;
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::trend::{self, TrendAnalyzer};
use crate::Result;

/// Cooperative cancellation flag shared between a caller and a running pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Gather,
    Trend,
    Confidence,
    StallRisk,
    Milestones,
    Playbooks,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Gather => "gather",
            Stage::Trend => "trend",
            Stage::Confidence => "confidence",
            Stage::StallRisk => "stall-risk",
            Stage::Milestones => "milestones",
            Stage::Playbooks => "playbooks",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(Box<AnalyticsResult>),
    /// Stopped before `stage` ran; nothing partial is returned.
    Cancelled { stage: Stage },
}

/// Where the readiness signals come from.
#[derive(Debug, Clone, Default)]
pub enum SignalSource {
    /// Placeholder estimates until a readiness feed exists.
    #[default]
    Placeholder,
    Supplied(EstimatedSignals),
}

impl SignalSource {
    fn resolve(&self) -> (EstimatedSignals, bool) {
        match self {
            SignalSource::Placeholder => (EstimatedSignals::default(), true),
            SignalSource::Supplied(signals) => (signals.clone(), false),
        }
    }
}

pub struct AnalyticsOrchestrator<I, H> {
    inventory: I,
    history: H,
    config: Arc<ConfigStore>,
    signals: SignalSource,
    telemetry: Option<Box<dyn TelemetrySink>>,
}

impl<I, H> AnalyticsOrchestrator<I, H>
where
    I: InventoryProvider,
    H: HistoryProvider,
{
    pub fn new(inventory: I, history: H, config: Arc<ConfigStore>) -> Self {
        Self {
            inventory,
            history,
            config,
            signals: SignalSource::Placeholder,
            telemetry: None,
        }
    }

    pub fn with_signals(mut self, signals: SignalSource) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_telemetry(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub async fn compute(&self, cancel: &CancellationToken) -> Result<RunOutcome> {
        let started = Instant::now();

        if let Some(outcome) = checkpoint(cancel, Stage::Gather) {
            return Ok(outcome);
        }
        let counts = self.inventory.device_counts().await?;
        let history = self.history.history(&counts).await?;
        let config = self.config.current();
        let scorer = ConfidenceScorer::new(&config)?;

        let enrolled_pct = counts.enrolled_pct();
        let days_since_last = trend::days_since_last_enrollment(&history);
        debug!(
            "Gathered {} snapshots, {enrolled_pct:.1}% enrolled",
            history.len()
        );

        if let Some(outcome) = checkpoint(cancel, Stage::Trend) {
            return Ok(outcome);
        }
        let trend = TrendAnalyzer::new(&config).compute(&history);

        if let Some(outcome) = checkpoint(cancel, Stage::Confidence) {
            return Ok(outcome);
        }
        let (estimated, signals_estimated) = self.signals.resolve();
        let inputs = ConfidenceInputs {
            measured: MeasuredSignals {
                velocity_30: trend.velocity_30,
                velocity_60: trend.velocity_60,
                velocity_90: trend.velocity_90,
                enrolled_pct,
                days_since_last_enrollment: days_since_last,
            },
            estimated,
        };
        let confidence = scorer.score(&inputs);

        if let Some(outcome) = checkpoint(cancel, Stage::StallRisk) {
            return Ok(outcome);
        }
        let stall_risk =
            StallRiskAssessor::new(&config).assess(enrolled_pct, trend.trend_state, days_since_last);

        if let Some(outcome) = checkpoint(cancel, Stage::Milestones) {
            return Ok(outcome);
        }
        let milestones = MilestoneTracker::track(enrolled_pct);

        if let Some(outcome) = checkpoint(cancel, Stage::Playbooks) {
            return Ok(outcome);
        }
        let complexity = confidence
            .category_score(ScoreCategory::Complexity)
            .unwrap_or(100.0);
        let playbooks =
            PlaybookGenerator::new(&config).generate(counts.remaining(), complexity, &stall_risk);

        let result = AnalyticsResult {
            run_id: Uuid::new_v4(),
            computed_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            counts,
            enrolled_pct,
            days_since_last_enrollment: days_since_last,
            signals_estimated,
            trend,
            confidence,
            stall_risk,
            milestones,
            playbooks,
        };

        info!(
            "Analytics run {} finished in {} ms: trend {}, confidence {} ({}), stall risk {}",
            result.run_id,
            result.elapsed_ms,
            result.trend.trend_state,
            result.confidence.score,
            result.confidence.band,
            result.stall_risk.risk_level
        );
        if let Some(sink) = &self.telemetry {
            sink.track(&TelemetryEvent::from_result(&result));
        }

        Ok(RunOutcome::Completed(Box::new(result)))
    }
}

fn checkpoint(cancel: &CancellationToken, stage: Stage) -> Option<RunOutcome> {
    if cancel.is_cancelled() {
        info!("Analytics run cancelled before {stage} stage");
        Some(RunOutcome::Cancelled { stage })
    } else {
        None
    }
}
