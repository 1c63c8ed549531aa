//! Remediation playbooks instantiated from fixed step templates.

use crate::config::ScoringConfig;
use crate::models::{
    ActionType, Playbook, PlaybookStep, PlaybookType, RiskLevel, StallRiskAssessment,
};

pub struct PlaybookGenerator<'a> {
    config: &'a ScoringConfig,
}

impl<'a> PlaybookGenerator<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    /// Devices per Rebuild Momentum batch: a tenth of the remaining gap within
    /// the configured bounds.
    pub fn batch_size(&self, remaining_devices: u64) -> u64 {
        let min = self.config.min_batch_size;
        let max = self.config.max_batch_size.max(min);
        (remaining_devices / 10).clamp(min, max)
    }

    pub fn generate(
        &self,
        remaining_devices: u64,
        complexity_score: f64,
        stall_risk: &StallRiskAssessment,
    ) -> Vec<Playbook> {
        let batch = self.batch_size(remaining_devices);
        let mut playbooks = vec![rebuild_momentum(batch)];
        if complexity_score < self.config.complexity_playbook_threshold {
            playbooks.push(reduce_dependencies());
        }
        playbooks.push(autopilot_hygiene());

        let pick = if stall_risk.risk_level >= RiskLevel::Medium || stall_risk.is_trust_trough_risk
        {
            let reason = if stall_risk.is_trust_trough_risk {
                "Rollout is stalled inside the trust trough; a small visible win restores momentum"
                    .to_string()
            } else {
                format!(
                    "Stall risk is {}; a controlled batch of {batch} devices restarts enrollment",
                    stall_risk.risk_level
                )
            };
            Some((PlaybookType::RebuildMomentum, reason))
        } else if complexity_score < self.config.complexity_recommend_threshold {
            Some((
                PlaybookType::ReduceDependencies,
                format!(
                    "Complexity score of {complexity_score:.0} is slowing provisioning; trim required apps first"
                ),
            ))
        } else {
            None
        };

        if let Some((kind, reason)) = pick {
            if let Some(playbook) = playbooks.iter_mut().find(|p| p.playbook_type == kind) {
                playbook.is_recommended = true;
                playbook.recommendation_reason = Some(reason);
            }
        }
        playbooks
    }
}

fn step(
    order: u32,
    title: &str,
    description: String,
    action_type: ActionType,
    checklist: &[&str],
    expected_outcome: &str,
) -> PlaybookStep {
    PlaybookStep {
        order,
        title: title.to_string(),
        description,
        action_type,
        checklist: checklist.iter().map(|item| item.to_string()).collect(),
        expected_outcome: expected_outcome.to_string(),
        rollback_instructions: None,
        requires_confirmation: false,
    }
}

fn playbook(
    playbook_type: PlaybookType,
    risk_level: RiskLevel,
    estimated_time: &str,
    steps: Vec<PlaybookStep>,
) -> Playbook {
    Playbook {
        name: playbook_type.to_string(),
        playbook_type,
        risk_level,
        estimated_time: estimated_time.to_string(),
        steps,
        is_recommended: false,
        recommendation_reason: None,
    }
}

fn rebuild_momentum(batch: u64) -> Playbook {
    let mut dry_run = step(
        3,
        "Dry run",
        format!("Enroll 2-3 devices from the batch of {batch} and watch them end to end."),
        ActionType::DryRun,
        &[
            "Enrollment completes without manual help",
            "Required apps install",
            "Compliance reports within an hour",
        ],
        "Pilot devices are compliant and their users can work",
    );
    dry_run.rollback_instructions =
        Some("Unenroll the pilot devices and return them to on-premises management".to_string());

    let mut execute = step(
        4,
        "Execute batch",
        format!("Enroll the remaining devices in the batch of {batch}."),
        ActionType::Execute,
        &[
            "Notify device owners a day ahead",
            "Stagger enrollments across the day",
            "Watch the failure queue while the batch runs",
        ],
        "The batch enrolls with a first-attempt success rate above 90%",
    );
    execute.requires_confirmation = true;
    execute.rollback_instructions = Some(
        "Pause the batch, remove the enrollment assignment, and move failed devices back to the legacy collection"
            .to_string(),
    );

    playbook(
        PlaybookType::RebuildMomentum,
        RiskLevel::Medium,
        "1-2 weeks",
        vec![
            step(
                1,
                "Review selection",
                format!("Pick {batch} low-risk devices whose owners are likely to report success."),
                ActionType::Review,
                &[
                    "Exclude devices with open support tickets",
                    "Prefer standard hardware models",
                    "Confirm owners are available during the rollout window",
                ],
                "A named batch of devices with engaged owners",
            ),
            step(
                2,
                "Verify prerequisites",
                "Check that every selected device can enroll cleanly.".to_string(),
                ActionType::Verify,
                &[
                    "Supported OS build",
                    "Device is co-managed or enrollment-eligible",
                    "Owner has a cloud license assigned",
                ],
                "No known blockers remain in the batch",
            ),
            dry_run,
            execute,
            step(
                5,
                "Verify and document",
                "Confirm results and share them with stakeholders.".to_string(),
                ActionType::Document,
                &[
                    "Record success and failure counts",
                    "Capture lessons learned",
                    "Schedule the next batch",
                ],
                "Published results and a date for the next batch",
            ),
        ],
    )
}

fn reduce_dependencies() -> Playbook {
    let mut reclassify = step(
        3,
        "Reclassify blocking apps",
        "Move non-essential apps out of the provisioning-blocking list.".to_string(),
        ActionType::Remediate,
        &[
            "Keep only security and connectivity apps as blocking",
            "Make the rest available after sign-in",
        ],
        "Provisioning waits only on apps users need at first sign-in",
    );
    reclassify.requires_confirmation = true;
    reclassify.rollback_instructions =
        Some("Restore the previous app assignment from the exported baseline".to_string());

    playbook(
        PlaybookType::ReduceDependencies,
        RiskLevel::Low,
        "3-5 days",
        vec![
            step(
                1,
                "Inventory required apps",
                "Export every app assigned as required during provisioning.".to_string(),
                ActionType::Review,
                &[
                    "Export current assignments as a baseline",
                    "Note install size and average install time",
                ],
                "A ranked list of required apps",
            ),
            step(
                2,
                "Identify blockers",
                "Find the apps that gate enrollment completion or fail most often.".to_string(),
                ActionType::Verify,
                &[
                    "Check install failure rates",
                    "Flag apps with on-premises dependencies",
                ],
                "A short list of candidates to reclassify",
            ),
            reclassify,
            step(
                4,
                "Validate on test devices",
                "Provision test devices with the trimmed app set.".to_string(),
                ActionType::DryRun,
                &["Time the provisioning run", "Confirm deferred apps install later"],
                "Provisioning completes faster with no missing apps",
            ),
            step(
                5,
                "Monitor",
                "Watch provisioning duration and failures for a week.".to_string(),
                ActionType::Monitor,
                &["Compare duration against the baseline", "Review helpdesk tickets"],
                "Shorter provisioning with no increase in tickets",
            ),
        ],
    )
}

fn autopilot_hygiene() -> Playbook {
    let mut cleanup = step(
        3,
        "Remove stale registrations",
        "Delete hardware registrations for retired or duplicate devices.".to_string(),
        ActionType::Remediate,
        &[
            "Match registrations against the asset register",
            "Remove duplicates created by re-imaging",
        ],
        "One registration per physical device",
    );
    cleanup.requires_confirmation = true;
    cleanup.rollback_instructions =
        Some("Re-import hardware hashes from the exported registration list".to_string());

    playbook(
        PlaybookType::AutopilotHygiene,
        RiskLevel::Low,
        "1-2 days",
        vec![
            step(
                1,
                "Audit hardware registrations",
                "Export the zero-touch device registrations.".to_string(),
                ActionType::Review,
                &["Export registrations", "Count devices without a profile"],
                "A current registration inventory",
            ),
            step(
                2,
                "Verify profile assignment",
                "Check each registered device has the expected deployment profile.".to_string(),
                ActionType::Verify,
                &["Group tags are consistent", "Profiles target the right groups"],
                "Every registered device has a profile",
            ),
            cleanup,
            step(
                4,
                "Validate with a reset device",
                "Reset one device and let it provision hands-free.".to_string(),
                ActionType::DryRun,
                &["Device picks up its profile", "No manual steps needed"],
                "Zero-touch provisioning works end to end",
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risk(level: RiskLevel, trough: bool) -> StallRiskAssessment {
        StallRiskAssessment {
            is_at_risk: level >= RiskLevel::Medium,
            is_trust_trough_risk: trough,
            risk_level: level,
            description: String::new(),
            contributing_factors: Vec::new(),
            recommended_actions: Vec::new(),
            days_at_risk: 0,
        }
    }

    fn recommended(playbooks: &[Playbook]) -> Vec<PlaybookType> {
        playbooks
            .iter()
            .filter(|p| p.is_recommended)
            .map(|p| p.playbook_type)
            .collect()
    }

    #[test]
    fn batch_size_is_clamped() {
        let config = ScoringConfig::default();
        let generator = PlaybookGenerator::new(&config);
        assert_eq!(generator.batch_size(0), 10);
        assert_eq!(generator.batch_size(450), 45);
        assert_eq!(generator.batch_size(50_000), 100);
    }

    #[test]
    fn rebuild_momentum_has_five_ordered_steps() {
        let config = ScoringConfig::default();
        let playbooks =
            PlaybookGenerator::new(&config).generate(450, 90.0, &risk(RiskLevel::None, false));
        let rebuild = &playbooks[0];
        assert_eq!(rebuild.playbook_type, PlaybookType::RebuildMomentum);
        let orders: Vec<u32> = rebuild.steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert!(rebuild.steps[0].description.contains("45"));
        assert!(rebuild.steps[3].requires_confirmation);
        assert!(rebuild.steps[3].rollback_instructions.is_some());
    }

    #[test]
    fn trough_recommends_rebuild() {
        let config = ScoringConfig::default();
        let playbooks =
            PlaybookGenerator::new(&config).generate(200, 40.0, &risk(RiskLevel::High, true));
        assert_eq!(recommended(&playbooks), vec![PlaybookType::RebuildMomentum]);
        assert!(playbooks[0]
            .recommendation_reason
            .as_deref()
            .unwrap()
            .contains("trust trough"));
    }

    #[test]
    fn complexity_drives_reduce_dependencies() {
        let config = ScoringConfig::default();
        let generator = PlaybookGenerator::new(&config);

        let low = generator.generate(200, 55.0, &risk(RiskLevel::Low, false));
        assert_eq!(low.len(), 3);
        assert_eq!(recommended(&low), vec![PlaybookType::ReduceDependencies]);

        let moderate = generator.generate(200, 65.0, &risk(RiskLevel::None, false));
        assert_eq!(moderate.len(), 3);
        assert!(recommended(&moderate).is_empty());

        let simple = generator.generate(200, 85.0, &risk(RiskLevel::None, false));
        let kinds: Vec<PlaybookType> = simple.iter().map(|p| p.playbook_type).collect();
        assert_eq!(
            kinds,
            vec![PlaybookType::RebuildMomentum, PlaybookType::AutopilotHygiene]
        );
    }

    #[test]
    fn medium_stall_outranks_complexity() {
        let config = ScoringConfig::default();
        let playbooks =
            PlaybookGenerator::new(&config).generate(200, 30.0, &risk(RiskLevel::Medium, false));
        assert_eq!(recommended(&playbooks), vec![PlaybookType::RebuildMomentum]);
    }
}
