//! Deterministic decision logic over extracted determinations
//!
//! The sanctions/export-control criterion is privileged by policy: a FLAG
//! there forces an overall FLAG outright, while any other criterion can at
//! most force a REVIEW. This asymmetry is deliberate, not a bug.

use crate::model::screening::{
    Check, Determination, Evidence, FlagValue, ScreeningStatus, CRITERION_SANCTIONS,
};

/// Result of `compute_decision`, before the summary sentence is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub status: ScreeningStatus,
    pub flags_count: usize,
}

/// Map the determination set to an overall status.
///
/// Pure function: the status depends on nothing but the determinations.
pub fn compute_decision(determinations: &[Determination]) -> DecisionOutcome {
    let sanctions_flagged = determinations
        .iter()
        .any(|d| d.criterion == CRITERION_SANCTIONS && d.flag == FlagValue::Flag);

    if sanctions_flagged {
        return DecisionOutcome {
            status: ScreeningStatus::Flag,
            flags_count: 1,
        };
    }

    let review_count = determinations
        .iter()
        .filter(|d| d.criterion != CRITERION_SANCTIONS)
        .filter(|d| matches!(d.flag, FlagValue::Flag | FlagValue::Undetermined))
        .count();

    if review_count > 0 {
        DecisionOutcome {
            status: ScreeningStatus::Review,
            flags_count: review_count,
        }
    } else {
        DecisionOutcome {
            status: ScreeningStatus::Pass,
            flags_count: 0,
        }
    }
}

/// Inner-join evidence and determinations by criterion name.
///
/// A criterion present on only one side is dropped, not synthesized; see
/// DESIGN.md for why this behavior is preserved.
pub fn merge_checks(evidence: &[Evidence], determinations: &[Determination]) -> Vec<Check> {
    determinations
        .iter()
        .filter_map(|determination| {
            let matched = evidence
                .iter()
                .find(|e| e.criterion == determination.criterion);
            let Some(matched) = matched else {
                tracing::debug!(
                    criterion = %determination.criterion,
                    "Determination has no matching evidence row, dropping from checks"
                );
                return None;
            };
            Some(Check {
                criterion: determination.criterion.clone(),
                flag: determination.flag,
                sources: matched.sources.clone(),
                evidence_summary: matched.evidence_summary.clone(),
            })
        })
        .collect()
}

/// Canned one-sentence summaries used when summary generation fails
pub fn fallback_summary(status: ScreeningStatus) -> &'static str {
    match status {
        ScreeningStatus::Pass => {
            "All screening criteria passed with no flags; the customer may proceed."
        }
        ScreeningStatus::Flag => {
            "The customer matched a sanctions or export-control screening list and is blocked pending compliance review."
        }
        ScreeningStatus::Review => {
            "One or more screening criteria could not be cleared; manual review is required before proceeding."
        }
    }
}
