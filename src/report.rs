use std::fmt::Write;

use crate::models::{AnalyticsResult, Milestone};

fn milestone_marker(milestone: &Milestone) -> &'static str {
    if milestone.is_current {
        "current"
    } else if milestone.is_next {
        "next"
    } else if milestone.is_achieved {
        "done"
    } else {
        ""
    }
}

pub fn build_report(result: &AnalyticsResult) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Cloud Migration Analytics Report");
    let _ = writeln!(
        output,
        "Generated {} (run {}, {} ms)",
        result.computed_at.format("%Y-%m-%d %H:%M UTC"),
        result.run_id,
        result.elapsed_ms
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} of {} devices cloud managed ({:.1}%), {} remaining.",
        result.counts.total_cloud_devices,
        result.counts.total_legacy_devices,
        result.enrolled_pct,
        result.counts.remaining()
    );
    if result.signals_estimated {
        let _ = writeln!(
            output,
            "Readiness signals are placeholder estimates, not measured values."
        );
    }

    let trend = &result.trend;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");
    let _ = writeln!(output, "- State: {}", trend.trend_state);
    let _ = writeln!(
        output,
        "- Velocity (devices/day): 7d {:.1}, 30d {:.1}, 60d {:.1}, 90d {:.1}",
        trend.velocity_7, trend.velocity_30, trend.velocity_60, trend.velocity_90
    );
    match trend.week_over_week_change_pct {
        Some(change) => {
            let _ = writeln!(output, "- Week over week: {change:+.1}%");
        }
        None => {
            let _ = writeln!(output, "- Week over week: not enough data");
        }
    }
    let _ = writeln!(
        output,
        "- Days since last enrollment: {}",
        result.days_since_last_enrollment
    );

    let confidence = &result.confidence;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Confidence");
    let _ = writeln!(output, "{}", confidence.explanation);
    let _ = writeln!(output);
    let _ = writeln!(output, "| Category | Score | Weight |");
    let _ = writeln!(output, "|---|---|---|");
    for category in &confidence.categories {
        let _ = writeln!(
            output,
            "| {} | {:.0} | {}% |",
            category.category, category.score, category.weight
        );
    }
    for (heading, drivers) in [
        ("Drivers", &confidence.top_drivers),
        ("Detractors", &confidence.top_detractors),
    ] {
        if drivers.is_empty() {
            continue;
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "{heading}:");
        for driver in drivers {
            let _ = writeln!(
                output,
                "- {} ({:+.1}): {}",
                driver.name, driver.impact, driver.description
            );
        }
    }

    let risk = &result.stall_risk;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Stall Risk");
    let _ = writeln!(output, "- Level: {}", risk.risk_level);
    if risk.is_trust_trough_risk {
        let _ = writeln!(output, "- Trust trough detected");
    }
    let _ = writeln!(output, "- {}", risk.description);
    for factor in &risk.contributing_factors {
        let _ = writeln!(output, "  - {factor}");
    }
    if !risk.recommended_actions.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Recommended actions:");
        for action in &risk.recommended_actions {
            let _ = writeln!(output, "- {action}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Milestones");
    for milestone in &result.milestones {
        let marker = milestone_marker(milestone);
        let _ = writeln!(
            output,
            "- {}% {}{}: {}",
            milestone.percentage,
            milestone.name,
            if marker.is_empty() {
                String::new()
            } else {
                format!(" [{marker}]")
            },
            milestone.description
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Playbooks");
    for playbook in &result.playbooks {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {}{}",
            playbook.name,
            if playbook.is_recommended {
                " (recommended)"
            } else {
                ""
            }
        );
        if let Some(reason) = &playbook.recommendation_reason {
            let _ = writeln!(output, "{reason}");
        }
        let _ = writeln!(
            output,
            "Risk {}, estimated {}.",
            playbook.risk_level, playbook.estimated_time
        );
        for step in &playbook.steps {
            let _ = writeln!(
                output,
                "{}. **{}**{} {}",
                step.order,
                step.title,
                if step.requires_confirmation {
                    " (confirm first)"
                } else {
                    ""
                },
                step.description
            );
            for item in &step.checklist {
                let _ = writeln!(output, "   - [ ] {item}");
            }
            if let Some(rollback) = &step.rollback_instructions {
                let _ = writeln!(output, "   - Rollback: {rollback}");
            }
        }
    }

    output
}
