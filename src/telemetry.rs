use std::collections::BTreeMap;

use tracing::info;

use crate::models::AnalyticsResult;

/// A named event with categorical properties and numeric metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub name: String,
    pub properties: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
}

impl TelemetryEvent {
    pub fn from_result(result: &AnalyticsResult) -> Self {
        let properties = BTreeMap::from([
            ("trend_state".to_string(), result.trend.trend_state.to_string()),
            ("confidence_band".to_string(), result.confidence.band.to_string()),
            ("risk_level".to_string(), result.stall_risk.risk_level.to_string()),
            (
                "signals_estimated".to_string(),
                result.signals_estimated.to_string(),
            ),
        ]);
        let metrics = BTreeMap::from([
            ("confidence_score".to_string(), f64::from(result.confidence.score)),
            ("velocity_7".to_string(), result.trend.velocity_7),
            ("velocity_30".to_string(), result.trend.velocity_30),
            ("enrolled_pct".to_string(), result.enrolled_pct),
        ]);
        Self {
            name: "analytics_computed".to_string(),
            properties,
            metrics,
        }
    }
}

/// Optional destination for usage events. Failures stay inside the sink.
pub trait TelemetrySink: Send + Sync {
    fn track(&self, event: &TelemetryEvent);
}

/// Emits telemetry events as structured log lines.
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn track(&self, event: &TelemetryEvent) {
        info!(
            event = %event.name,
            properties = ?event.properties,
            metrics = ?event.metrics,
            "telemetry"
        );
    }
}
