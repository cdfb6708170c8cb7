//! Execution-time safety gate.
//!
//! Runs after evaluation, against the same metrics snapshot. A blocked action
//! is logged and skipped by the caller; it never aborts the cycle.

use crate::config::Thresholds;
use crate::types::{EvolutionAction, MetricsSnapshot};
use std::fmt;

/// Why a growth action was held back.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockReason {
    /// Treasury is under the conservation threshold.
    ConservationMode { treasury_eth: f64 },
    /// Gas reserve would not cover the configured minimum runway.
    InsufficientGasRunway { runway_hours: f64, required_hours: f64 },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConservationMode { treasury_eth } => write!(
                f,
                "conservation mode: deployments paused (treasury at {:.3} ETH)",
                treasury_eth
            ),
            Self::InsufficientGasRunway {
                runway_hours,
                required_hours,
            } => write!(
                f,
                "insufficient gas runway: {:.1}h (minimum {:.1}h)",
                runway_hours, required_hours
            ),
        }
    }
}

/// Safety check result
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyVerdict {
    Safe,
    Blocked(BlockReason),
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            SafetyVerdict::Safe => None,
            SafetyVerdict::Blocked(reason) => Some(reason.to_string()),
        }
    }
}

/// Vet an action against the current metrics.
///
/// Mode changes, the periodic post and the no-op always pass. Growth actions
/// are blocked below the conservation threshold (exclusive) and when the gas
/// runway falls short of the configured minimum.
pub fn is_action_safe(
    action: &EvolutionAction,
    metrics: &MetricsSnapshot,
    thresholds: &Thresholds,
) -> SafetyVerdict {
    match action {
        EvolutionAction::SurvivalMode
        | EvolutionAction::ConservationMode
        | EvolutionAction::ExitConservation { .. }
        | EvolutionAction::PostMetrics
        | EvolutionAction::NoAction => SafetyVerdict::Safe,

        EvolutionAction::DeployAdvancedStaking
        | EvolutionAction::MoltEvent { .. }
        | EvolutionAction::ExecuteProposal { .. } => {
            if metrics.treasury_eth < thresholds.conservation_treasury_eth {
                return SafetyVerdict::Blocked(BlockReason::ConservationMode {
                    treasury_eth: metrics.treasury_eth,
                });
            }
            if metrics.gas_runway_hours < thresholds.gas_runway_hours {
                return SafetyVerdict::Blocked(BlockReason::InsufficientGasRunway {
                    runway_hours: metrics.gas_runway_hours,
                    required_hours: thresholds.gas_runway_hours,
                });
            }
            SafetyVerdict::Safe
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PreviousMode;

    fn metrics(treasury_eth: f64, gas_runway_hours: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            treasury_eth,
            gas_runway_hours,
            ..MetricsSnapshot::default()
        }
    }

    fn proposal_action() -> EvolutionAction {
        EvolutionAction::ExecuteProposal {
            proposal_id: "p1".into(),
        }
    }

    #[test]
    fn test_mode_changes_always_safe() {
        let broke = metrics(0.0, 0.0);
        let t = Thresholds::default();
        for action in [
            EvolutionAction::SurvivalMode,
            EvolutionAction::ConservationMode,
            EvolutionAction::ExitConservation { from: PreviousMode::Survival },
            EvolutionAction::PostMetrics,
            EvolutionAction::NoAction,
        ] {
            assert_eq!(is_action_safe(&action, &broke, &t), SafetyVerdict::Safe);
        }
    }

    #[test]
    fn test_conservation_boundary_is_exclusive() {
        let t = Thresholds::default();
        let below = metrics(t.conservation_treasury_eth - 1e-9, 1_000.0);
        let verdict = is_action_safe(&proposal_action(), &below, &t);
        assert!(!verdict.is_safe());
        assert!(verdict.reason().unwrap().starts_with("conservation mode"));

        let at = metrics(t.conservation_treasury_eth, 1_000.0);
        assert!(is_action_safe(&proposal_action(), &at, &t).is_safe());
    }

    #[test]
    fn test_short_gas_runway_blocks_growth() {
        let t = Thresholds::default();
        let m = metrics(10.0, 71.9);
        let verdict = is_action_safe(&EvolutionAction::DeployAdvancedStaking, &m, &t);
        assert_eq!(
            verdict,
            SafetyVerdict::Blocked(BlockReason::InsufficientGasRunway {
                runway_hours: 71.9,
                required_hours: 72.0,
            })
        );
        assert_eq!(
            verdict.reason().as_deref(),
            Some("insufficient gas runway: 71.9h (minimum 72.0h)")
        );
    }

    #[test]
    fn test_conservation_reported_before_gas() {
        let t = Thresholds::default();
        let m = metrics(0.1, 0.0);
        let verdict = is_action_safe(&EvolutionAction::MoltEvent { holder_milestone: 500 }, &m, &t);
        assert!(matches!(
            verdict,
            SafetyVerdict::Blocked(BlockReason::ConservationMode { .. })
        ));
    }

    #[test]
    fn test_custom_runway_minimum() {
        let t = Thresholds {
            gas_runway_hours: 10.0,
            ..Thresholds::default()
        };
        assert!(is_action_safe(&proposal_action(), &metrics(1.0, 12.0), &t).is_safe());
    }
}
