//! Tier selection and mid-run escalation decisions
//!
//! Internal sub-nodes (intent inference, search assessment, task
//! validation) each pick a model tier per call; the escalation decision
//! governs restarting the whole run one tier up.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ModelTier;

/// Internal decision points that pick their own tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubNode {
    IntentInference,
    SearchAssessment,
    TaskValidation,
}

/// Inputs to a per-node tier pick
#[derive(Debug, Clone, Default)]
pub struct TierInputs {
    /// Task text
    pub task: String,
    /// Whether the task reads as an audit/review
    pub audit_like: bool,
    /// Consecutive iterations without a progress signal
    pub progress_stalls: u32,
    /// Whether intent is still ambiguous
    pub intent_ambiguous: bool,
    /// Fraction of the iteration budget already spent
    pub budget_used_fraction: f64,
}

/// Inputs to the main-run escalation decision
#[derive(Debug, Clone, Default)]
pub struct EscalationInputs {
    pub current_tier: ModelTier,
    pub has_parent_agent: bool,
    pub budget_used_fraction: f64,
    /// Repeated identical tool calls with no recent progress signal
    pub repeated_calls_no_progress: bool,
    /// Files read/modified/created so far
    pub evidence_artifacts: usize,
}

/// Picks tiers for sub-nodes and decides run escalation
#[derive(Debug, Clone)]
pub struct TierSelector {
    /// Feature flag: dynamic per-node tiers on/off
    pub dynamic_tiers: bool,
    /// Feature flag: mid-run escalation on/off
    pub escalation_enabled: bool,
}

impl TierSelector {
    pub fn new(dynamic_tiers: bool, escalation_enabled: bool) -> Self {
        Self {
            dynamic_tiers,
            escalation_enabled,
        }
    }

    /// Tier for one internal sub-node call
    pub fn select(&self, node: SubNode, inputs: &TierInputs) -> ModelTier {
        if !self.dynamic_tiers {
            return ModelTier::Small;
        }

        let tier = match node {
            SubNode::IntentInference => {
                // Ambiguity on a long task deserves more capacity
                if inputs.intent_ambiguous && inputs.task.len() > 200 {
                    ModelTier::Large
                } else if inputs.intent_ambiguous {
                    ModelTier::Medium
                } else {
                    ModelTier::Small
                }
            }
            SubNode::SearchAssessment => {
                if inputs.progress_stalls >= 2 {
                    ModelTier::Medium
                } else {
                    ModelTier::Small
                }
            }
            SubNode::TaskValidation => {
                // Validating late in the run is where mistakes get expensive
                if inputs.budget_used_fraction >= 0.70 {
                    ModelTier::Large
                } else if inputs.audit_like {
                    ModelTier::Medium
                } else {
                    ModelTier::Small
                }
            }
        };

        // Audit-like tasks never drop below medium
        if inputs.audit_like && tier == ModelTier::Small {
            return ModelTier::Medium;
        }
        tier
    }

    /// Whether to escalate the main run; returns the reason when yes
    ///
    /// Escalation is allowed only when enabled, there is no parent agent,
    /// the run is not already at the top tier, and at least a quarter of
    /// the budget is spent.
    pub fn should_escalate(&self, inputs: &EscalationInputs) -> Option<String> {
        if !self.escalation_enabled
            || inputs.has_parent_agent
            || inputs.current_tier == ModelTier::Large
            || inputs.budget_used_fraction < 0.25
        {
            return None;
        }

        if inputs.repeated_calls_no_progress {
            debug!("should_escalate: repeated identical calls without progress");
            return Some("repeated identical tool calls with no progress signal".to_string());
        }

        if inputs.budget_used_fraction >= 0.45 && inputs.evidence_artifacts <= 2 {
            debug!("should_escalate: late with little evidence");
            return Some(format!(
                "{:.0}% of budget spent with only {} evidence artifacts",
                inputs.budget_used_fraction * 100.0,
                inputs.evidence_artifacts
            ));
        }

        None
    }
}

impl Default for TierSelector {
    fn default() -> Self {
        Self::new(true, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_off_pins_small() {
        let selector = TierSelector::new(false, true);
        let inputs = TierInputs {
            intent_ambiguous: true,
            task: "x".repeat(500),
            ..Default::default()
        };
        assert_eq!(selector.select(SubNode::IntentInference, &inputs), ModelTier::Small);
    }

    #[test]
    fn test_audit_like_prefers_medium() {
        let selector = TierSelector::default();
        let inputs = TierInputs {
            audit_like: true,
            ..Default::default()
        };
        assert_eq!(selector.select(SubNode::SearchAssessment, &inputs), ModelTier::Medium);
    }

    #[test]
    fn test_ambiguous_long_task_goes_large() {
        let selector = TierSelector::default();
        let inputs = TierInputs {
            intent_ambiguous: true,
            task: "x".repeat(300),
            ..Default::default()
        };
        assert_eq!(selector.select(SubNode::IntentInference, &inputs), ModelTier::Large);
    }

    #[test]
    fn test_late_validation_goes_large() {
        let selector = TierSelector::default();
        let inputs = TierInputs {
            budget_used_fraction: 0.75,
            ..Default::default()
        };
        assert_eq!(selector.select(SubNode::TaskValidation, &inputs), ModelTier::Large);
    }

    #[test]
    fn test_stalls_bump_search_assessment() {
        let selector = TierSelector::default();
        let calm = TierInputs::default();
        let stalled = TierInputs {
            progress_stalls: 3,
            ..Default::default()
        };
        assert_eq!(selector.select(SubNode::SearchAssessment, &calm), ModelTier::Small);
        assert_eq!(selector.select(SubNode::SearchAssessment, &stalled), ModelTier::Medium);
    }

    #[test]
    fn test_escalation_gatekeeping() {
        let selector = TierSelector::default();

        // Too early
        assert!(selector
            .should_escalate(&EscalationInputs {
                budget_used_fraction: 0.10,
                repeated_calls_no_progress: true,
                ..Default::default()
            })
            .is_none());

        // Already at the top
        assert!(selector
            .should_escalate(&EscalationInputs {
                current_tier: ModelTier::Large,
                budget_used_fraction: 0.5,
                repeated_calls_no_progress: true,
                ..Default::default()
            })
            .is_none());

        // Child agents never escalate themselves
        assert!(selector
            .should_escalate(&EscalationInputs {
                has_parent_agent: true,
                budget_used_fraction: 0.5,
                repeated_calls_no_progress: true,
                ..Default::default()
            })
            .is_none());

        // Disabled
        let disabled = TierSelector::new(true, false);
        assert!(disabled
            .should_escalate(&EscalationInputs {
                budget_used_fraction: 0.5,
                repeated_calls_no_progress: true,
                ..Default::default()
            })
            .is_none());
    }

    #[test]
    fn test_escalation_on_repeated_calls() {
        let selector = TierSelector::default();
        let reason = selector
            .should_escalate(&EscalationInputs {
                budget_used_fraction: 0.30,
                repeated_calls_no_progress: true,
                evidence_artifacts: 10,
                ..Default::default()
            })
            .unwrap();
        assert!(reason.contains("repeated"));
    }

    #[test]
    fn test_escalation_on_thin_evidence_late() {
        let selector = TierSelector::default();
        let reason = selector
            .should_escalate(&EscalationInputs {
                budget_used_fraction: 0.50,
                evidence_artifacts: 1,
                ..Default::default()
            })
            .unwrap();
        assert!(reason.contains("evidence"));

        // Enough evidence: no escalation
        assert!(selector
            .should_escalate(&EscalationInputs {
                budget_used_fraction: 0.50,
                evidence_artifacts: 5,
                ..Default::default()
            })
            .is_none());
    }
}
