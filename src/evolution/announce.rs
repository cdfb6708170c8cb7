//! Broadcast text for engine output.

use crate::types::{EvolutionAction, MetricsSnapshot, PreviousMode};

/// Templated announcement for an action. Empty when the action has no
/// canonical message (proposal execution, the periodic post, the no-op).
pub fn generate_announcement(action: &EvolutionAction) -> String {
    match action {
        EvolutionAction::SurvivalMode => "\
⚠️ SURVIVAL MODE

Treasury critical. All non-essential operations halted.
Focus: revenue recovery and gas preservation.

Lobsters have outlived five mass extinctions. Diamond claws only. 💎🦞"
            .to_string(),

        EvolutionAction::ConservationMode => "\
🌊 CONSERVATION MODE

Treasury below optimal levels. New deployments paused until reserves recover.
Current operations continue normally.

The storm will pass. The lobster endures. 🦞"
            .to_string(),

        EvolutionAction::ExitConservation { from } => {
            let lifted = match from {
                PreviousMode::Survival => "SURVIVAL LIFTED",
                PreviousMode::Conservation => "CONSERVATION LIFTED",
            };
            format!(
                "🦞 {lifted}

Reserves restored. Evolution resumes.
The colony weathered the storm. Full operations online. ⚡"
            )
        }

        EvolutionAction::DeployAdvancedStaking => "\
🦞 EVOLUTION TRIGGERED

Treasury milestone reached. Deploying advanced staking with boosted rewards.
Stake $FORGE, earn more. Diamond claws get a 2x multiplier. ⚡"
            .to_string(),

        EvolutionAction::MoltEvent { holder_milestone } => format!(
            "🦞 MOLT COMPLETE

{holder_milestone} holders reached!

New shell acquired:
• Generative NFT drop for the colony
• 1% $FORGE burn

We shed. We grow. 💎"
        ),

        EvolutionAction::ExecuteProposal { .. }
        | EvolutionAction::PostMetrics
        | EvolutionAction::NoAction => String::new(),
    }
}

/// Periodic status post built from a metrics snapshot.
pub fn format_metrics_post(metrics: &MetricsSnapshot) -> String {
    format!(
        "GM from the depths 🌊

24h highlights:
- Treasury: {:.2} ETH
- Holders: {}
- Staking TVL: {:.0} $FORGE
- NFTs minted: {}/{}

Keep swimming. 🦞",
        metrics.treasury_eth,
        metrics.holder_count,
        metrics.staking_tvl,
        metrics.nfts_minted,
        metrics.nfts_max_supply,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_molt_announcement_names_milestone() {
        let text = generate_announcement(&EvolutionAction::MoltEvent { holder_milestone: 700 });
        assert!(text.contains("700 holders reached"));
    }

    #[test]
    fn test_exit_announcement_depends_on_previous_mode() {
        let survival = generate_announcement(&EvolutionAction::ExitConservation {
            from: PreviousMode::Survival,
        });
        let conservation = generate_announcement(&EvolutionAction::ExitConservation {
            from: PreviousMode::Conservation,
        });
        assert!(survival.contains("SURVIVAL LIFTED"));
        assert!(conservation.contains("CONSERVATION LIFTED"));
    }

    #[test]
    fn test_untemplated_actions_are_empty() {
        assert!(generate_announcement(&EvolutionAction::NoAction).is_empty());
        assert!(generate_announcement(&EvolutionAction::PostMetrics).is_empty());
        assert!(generate_announcement(&EvolutionAction::ExecuteProposal {
            proposal_id: "p".into()
        })
        .is_empty());
    }

    #[test]
    fn test_metrics_post() {
        let metrics = MetricsSnapshot {
            treasury_eth: 1.234,
            holder_count: 42,
            staking_tvl: 1_000.4,
            nfts_minted: 7,
            nfts_max_supply: 1_000,
            ..MetricsSnapshot::default()
        };
        let post = format_metrics_post(&metrics);
        assert!(post.contains("Treasury: 1.23 ETH"));
        assert!(post.contains("Holders: 42"));
        assert!(post.contains("Staking TVL: 1000 $FORGE"));
        assert!(post.contains("NFTs minted: 7/1000"));
    }
}
