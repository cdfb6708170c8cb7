//! Trigger evaluation as an ordered rule table.
//!
//! Rules run top to bottom. Each rule either terminates evaluation with its
//! own result (only the survival rule does) or appends to the accumulator.
//! Growth rules are skipped while conservation or survival mode is in effect.

use crate::config::Thresholds;
use crate::error::EngineResult;
use crate::evolution::scoring::score_proposal;
use crate::types::{
    AgentState, EvolutionAction, MetricsSnapshot, PreviousMode, ADVANCED_STAKING_CONTRACT,
};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use tracing::debug;

/// Everything a rule may look at. Immutable for the whole evaluation.
#[derive(Debug, Clone, Copy)]
struct RuleInput<'a> {
    metrics: &'a MetricsSnapshot,
    state: &'a AgentState,
    thresholds: &'a Thresholds,
    now: DateTime<Utc>,
}

/// Result of a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleOutcome {
    /// Stop here; these actions are the complete result.
    Terminate(Vec<EvolutionAction>),
    /// Append these actions and keep going.
    Continue(Vec<EvolutionAction>),
}

impl RuleOutcome {
    fn none() -> Self {
        Self::Continue(Vec::new())
    }

    fn one(action: EvolutionAction) -> Self {
        Self::Continue(vec![action])
    }
}

struct Rule {
    name: &'static str,
    growth: bool,
    check: fn(&RuleInput<'_>) -> RuleOutcome,
}

const RULES: &[Rule] = &[
    Rule { name: "survival", growth: false, check: survival_rule },
    Rule { name: "mode_exit", growth: false, check: mode_exit_rule },
    Rule { name: "conservation", growth: false, check: conservation_rule },
    Rule { name: "advanced_staking", growth: true, check: advanced_staking_rule },
    Rule { name: "molt", growth: true, check: molt_rule },
    Rule { name: "proposals", growth: true, check: proposal_rule },
    Rule { name: "periodic_post", growth: false, check: periodic_post_rule },
];

/// Evaluate every trigger and return the actions for this cycle, most urgent first.
///
/// The result is never empty: a quiet cycle yields `[NO_ACTION]`. Ties keep
/// rule declaration order.
pub fn evaluate(
    metrics: &MetricsSnapshot,
    state: &AgentState,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> EngineResult<Vec<EvolutionAction>> {
    thresholds.validate()?;
    metrics.validate()?;
    state.validate()?;

    let input = RuleInput { metrics, state, thresholds, now };
    let gated = state.conservation_in_effect();
    let mut actions = Vec::new();

    for rule in RULES {
        if rule.growth && gated {
            debug!(rule = rule.name, "skipped while conserving");
            continue;
        }
        match (rule.check)(&input) {
            RuleOutcome::Terminate(terminal) => {
                debug!(rule = rule.name, "evaluation terminated");
                return Ok(finish(terminal));
            }
            RuleOutcome::Continue(found) => {
                for action in &found {
                    debug!(rule = rule.name, action = %action, priority = action.priority(), "triggered");
                }
                actions.extend(found);
            }
        }
    }

    Ok(finish(actions))
}

fn finish(mut actions: Vec<EvolutionAction>) -> Vec<EvolutionAction> {
    // Stable: equal priorities keep rule order.
    actions.sort_by_key(|a| Reverse(a.priority()));
    if actions.is_empty() {
        actions.push(EvolutionAction::NoAction);
    }
    actions
}

fn survival_rule(input: &RuleInput<'_>) -> RuleOutcome {
    if input.metrics.treasury_eth < input.thresholds.survival_treasury_eth {
        RuleOutcome::Terminate(vec![EvolutionAction::SurvivalMode])
    } else {
        RuleOutcome::none()
    }
}

fn mode_exit_rule(input: &RuleInput<'_>) -> RuleOutcome {
    let treasury = input.metrics.treasury_eth;
    let t = input.thresholds;
    if input.state.survival_mode {
        if treasury >= t.conservation_treasury_eth {
            return RuleOutcome::one(EvolutionAction::ExitConservation {
                from: PreviousMode::Survival,
            });
        }
    } else if input.state.conservation_mode && treasury >= t.advanced_staking_treasury_eth {
        return RuleOutcome::one(EvolutionAction::ExitConservation {
            from: PreviousMode::Conservation,
        });
    }
    RuleOutcome::none()
}

fn conservation_rule(input: &RuleInput<'_>) -> RuleOutcome {
    if input.metrics.treasury_eth < input.thresholds.conservation_treasury_eth
        && !input.state.survival_mode
    {
        RuleOutcome::one(EvolutionAction::ConservationMode)
    } else {
        RuleOutcome::none()
    }
}

fn advanced_staking_rule(input: &RuleInput<'_>) -> RuleOutcome {
    if input.metrics.treasury_eth >= input.thresholds.advanced_staking_treasury_eth
        && !input.state.has_deployed(ADVANCED_STAKING_CONTRACT)
    {
        RuleOutcome::one(EvolutionAction::DeployAdvancedStaking)
    } else {
        RuleOutcome::none()
    }
}

/// Next unclaimed holder milestone: the smallest multiple of the interval
/// above the last claimed one, never below the base milestone.
pub fn next_molt_milestone(last_claimed: u64, thresholds: &Thresholds) -> u64 {
    let interval = thresholds.molt_holder_interval.max(1);
    let next = (last_claimed / interval)
        .saturating_add(1)
        .saturating_mul(interval);
    next.max(thresholds.molt_holder_base)
}

fn molt_rule(input: &RuleInput<'_>) -> RuleOutcome {
    let last = input.state.last_molt_holder_count;
    let milestone = next_molt_milestone(last, input.thresholds);
    if input.metrics.holder_count >= milestone && milestone > last {
        RuleOutcome::one(EvolutionAction::MoltEvent {
            holder_milestone: milestone,
        })
    } else {
        RuleOutcome::none()
    }
}

fn proposal_rule(input: &RuleInput<'_>) -> RuleOutcome {
    let t = input.thresholds;
    let max_spend = t.max_single_spend(input.metrics.treasury_eth);
    let ready = input
        .state
        .pending_proposals
        .iter()
        .filter(|p| score_proposal(p) >= t.proposal_feasibility_score && p.cost <= max_spend)
        .map(|p| EvolutionAction::ExecuteProposal {
            proposal_id: p.id.clone(),
        })
        .collect();
    RuleOutcome::Continue(ready)
}

/// Hours elapsed since the last periodic broadcast; negative if the clock went backwards.
pub fn hours_since(last: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - last).num_milliseconds() as f64 / 3_600_000.0
}

fn periodic_post_rule(input: &RuleInput<'_>) -> RuleOutcome {
    if hours_since(input.state.last_post_time, input.now) >= input.thresholds.post_interval_hours {
        RuleOutcome::one(EvolutionAction::PostMetrics)
    } else {
        RuleOutcome::none()
    }
}
