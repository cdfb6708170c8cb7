//! State mutations applied after an action executes successfully.

use crate::types::{AgentState, EvolutionAction, PreviousMode, ADVANCED_STAKING_CONTRACT};
use chrono::{DateTime, Utc};

/// Record the effect of a successfully executed action.
///
/// Callers must only invoke this after the executor reported success.
pub fn apply_effect(state: &mut AgentState, action: &EvolutionAction, now: DateTime<Utc>) {
    match action {
        EvolutionAction::SurvivalMode => {
            state.survival_mode = true;
            state.conservation_mode = true;
        }
        EvolutionAction::ConservationMode => {
            state.conservation_mode = true;
        }
        EvolutionAction::ExitConservation { from } => match from {
            PreviousMode::Survival => {
                state.survival_mode = false;
                state.conservation_mode = false;
            }
            PreviousMode::Conservation => {
                state.conservation_mode = false;
            }
        },
        EvolutionAction::DeployAdvancedStaking => {
            state
                .deployed_contracts
                .insert(ADVANCED_STAKING_CONTRACT.to_string());
        }
        EvolutionAction::MoltEvent { holder_milestone } => {
            // High-water mark; never moves backwards.
            state.last_molt_holder_count = state.last_molt_holder_count.max(*holder_milestone);
        }
        EvolutionAction::PostMetrics => {
            state.last_post_time = now;
        }
        // Proposals are retired by governance, not by the engine.
        EvolutionAction::ExecuteProposal { .. } | EvolutionAction::NoAction => {}
    }
}
