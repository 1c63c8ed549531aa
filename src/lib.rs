//! # Cloud Migration Analytics
//!
//! Decision-support analytics for moving a device fleet from on-premises to
//! cloud management:
//! - enrollment velocity and trend classification
//! - weighted confidence score with drivers and detractors
//! - stall risk, including trust-trough detection
//! - milestone progress and remediation playbooks
//!
//! [`orchestrator::AnalyticsOrchestrator`] is the entry point; every stage
//! reads one [`config::ScoringConfig`] snapshot.

pub mod confidence;
pub mod config;
pub mod error;
pub mod milestones;
pub mod models;
pub mod orchestrator;
pub mod playbooks;
pub mod providers;
pub mod report;
pub mod risk;
pub mod telemetry;
pub mod trend;

pub use error::{Error, Result};
