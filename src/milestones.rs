use crate::models::{Milestone, PlaybookType};

struct MilestoneTemplate {
    percentage: u8,
    name: &'static str,
    description: &'static str,
    playbook: PlaybookType,
    trust_trough_boundary: bool,
}

const MILESTONES: [MilestoneTemplate; 6] = [
    MilestoneTemplate {
        percentage: 25,
        name: "Pilot Proven",
        description: "Early adopters are enrolled and the provisioning path is proven on real hardware.",
        playbook: PlaybookType::AutopilotHygiene,
        trust_trough_boundary: false,
    },
    MilestoneTemplate {
        percentage: 50,
        name: "Halfway",
        description: "Volunteers run out; the remaining owners need evidence before they move.",
        playbook: PlaybookType::RebuildMomentum,
        trust_trough_boundary: true,
    },
    MilestoneTemplate {
        percentage: 60,
        name: "Through the Trough",
        description: "Momentum is rebuilt and the rollout is past the band where most stall.",
        playbook: PlaybookType::RebuildMomentum,
        trust_trough_boundary: true,
    },
    MilestoneTemplate {
        percentage: 70,
        name: "Cloud Majority",
        description: "Most devices are cloud managed; policy authoring shifts to the cloud side.",
        playbook: PlaybookType::ReduceDependencies,
        trust_trough_boundary: false,
    },
    MilestoneTemplate {
        percentage: 85,
        name: "Long Tail",
        description: "Only specialised and legacy-dependent devices remain.",
        playbook: PlaybookType::ReduceDependencies,
        trust_trough_boundary: false,
    },
    MilestoneTemplate {
        percentage: 100,
        name: "Cloud Native",
        description: "Every device is cloud managed and on-premises management can be retired.",
        playbook: PlaybookType::AutopilotHygiene,
        trust_trough_boundary: false,
    },
];

pub struct MilestoneTracker;

impl MilestoneTracker {
    /// Marks achieved milestones, the current band (highest achieved), and the
    /// first unachieved one as next.
    pub fn track(current_pct: f64) -> Vec<Milestone> {
        let current_index = MILESTONES
            .iter()
            .rposition(|m| current_pct >= f64::from(m.percentage));
        let next_index = MILESTONES
            .iter()
            .position(|m| current_pct < f64::from(m.percentage));

        MILESTONES
            .iter()
            .enumerate()
            .map(|(index, template)| Milestone {
                percentage: template.percentage,
                name: template.name.to_string(),
                description: template.description.to_string(),
                recommended_playbook: template.playbook,
                is_trust_trough_boundary: template.trust_trough_boundary,
                is_achieved: current_pct >= f64::from(template.percentage),
                is_current: current_index == Some(index),
                is_next: next_index == Some(index),
            })
            .collect()
    }
}
