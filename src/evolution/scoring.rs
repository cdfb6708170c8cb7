//! Proposal scoring.
//!
//! Weight table (each term clamped before weighting, total clamped to 1.0):
//!
//! | term                          | weight                                  |
//! |-------------------------------|-----------------------------------------|
//! | approved contract template    | +0.30                                   |
//! | technical feasibility         | min(feasibility, 1) * 0.20              |
//! | cost efficiency               | +0.10 below 0.5 ETH, +0.05 below 1 ETH  |
//! | community support             | min(votes / 100, 1) * 0.20              |
//! | thematic alignment            | +0.10                                   |
//! | financial signal              | +0.10                                   |
//!
//! Without an approved template a proposal tops out at 0.70.

use crate::types::Proposal;
use serde::Serialize;

/// Contract templates the deployer knows how to instantiate.
pub const APPROVED_TEMPLATES: &[&str] = &["ForgeToken", "LobsterVault", "GenesisLobsters"];

const THEME_TERMS: &[&str] = &["lobster", "colony", "molt", "shell", "claw", "forge"];
const FINANCIAL_TERMS: &[&str] = &["revenue", "yield", "profit", "earn", "reward"];

const TEMPLATE_WEIGHT: f64 = 0.3;
const FEASIBILITY_WEIGHT: f64 = 0.2;
const COMMUNITY_WEIGHT: f64 = 0.2;
const VOTES_FOR_FULL_SUPPORT: f64 = 100.0;
const THEME_BONUS: f64 = 0.1;
const FINANCIAL_BONUS: f64 = 0.1;

/// Per-term contributions to a proposal score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub template: f64,
    pub feasibility: f64,
    pub cost: f64,
    pub community: f64,
    pub theme: f64,
    pub financial: f64,
}

impl ScoreBreakdown {
    /// Clamped sum in [0, 1].
    pub fn total(&self) -> f64 {
        let sum = self.template
            + self.feasibility
            + self.cost
            + self.community
            + self.theme
            + self.financial;
        unit(sum)
    }
}

/// Score a proposal in [0, 1]. Pure: depends only on the proposal's fields.
pub fn score_proposal(proposal: &Proposal) -> f64 {
    score_breakdown(proposal).total()
}

pub fn score_breakdown(proposal: &Proposal) -> ScoreBreakdown {
    let text = format!("{} {}", proposal.title, proposal.description).to_lowercase();
    let mentions = |terms: &[&str]| terms.iter().any(|term| text.contains(term));

    let template = match proposal.template.as_deref() {
        Some(name) if APPROVED_TEMPLATES.contains(&name) => TEMPLATE_WEIGHT,
        _ => 0.0,
    };

    let cost = if proposal.cost < 0.5 {
        0.1
    } else if proposal.cost < 1.0 {
        0.05
    } else {
        0.0
    };

    ScoreBreakdown {
        template,
        feasibility: unit(proposal.feasibility_score) * FEASIBILITY_WEIGHT,
        cost,
        community: unit(proposal.votes as f64 / VOTES_FOR_FULL_SUPPORT) * COMMUNITY_WEIGHT,
        theme: if mentions(THEME_TERMS) { THEME_BONUS } else { 0.0 },
        financial: if mentions(FINANCIAL_TERMS) { FINANCIAL_BONUS } else { 0.0 },
    }
}

/// Clamp into [0, 1]; NaN counts as zero.
fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
