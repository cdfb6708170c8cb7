//! Shared types used across the agent runtime.

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Contract identifier recorded once advanced staking is live.
pub const ADVANCED_STAKING_CONTRACT: &str = "advanced_staking";

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Point-in-time reading of treasury and colony metrics, produced once per cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Treasury balance in ETH.
    pub treasury_eth: f64,
    /// Treasury balance of the colony token.
    #[serde(default)]
    pub treasury_forge: f64,
    pub holder_count: u64,
    #[serde(default)]
    pub total_supply: f64,
    pub staking_tvl: f64,
    #[serde(default)]
    pub staking_apy: f64,
    pub nfts_minted: u64,
    pub nfts_max_supply: u64,
    /// Share of the treasury earmarked for gas, in ETH.
    #[serde(default)]
    pub gas_reserve_eth: f64,
    /// Estimated hours of operation left at the current gas spend.
    pub gas_runway_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    /// Reject negative or non-finite readings instead of evaluating on garbage.
    pub fn validate(&self) -> EngineResult<()> {
        let fields = [
            ("treasuryEth", self.treasury_eth),
            ("treasuryForge", self.treasury_forge),
            ("totalSupply", self.total_supply),
            ("stakingTvl", self.staking_tvl),
            ("stakingApy", self.staking_apy),
            ("gasReserveEth", self.gas_reserve_eth),
            ("gasRunwayHours", self.gas_runway_hours),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidMetric { field, value });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Governance proposals
// ---------------------------------------------------------------------------

/// A community request for treasury spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub votes: u64,
    /// External technical review score, nominally in [0, 1].
    pub feasibility_score: f64,
    /// Cost in ETH.
    #[serde(alias = "costEth")]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposer: Option<String>,
    /// Name of the contract template the proposal builds on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl Proposal {
    pub fn validate(&self) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::InvalidProposal {
                id: self.id.clone(),
                reason: "empty id".into(),
            });
        }
        if !self.feasibility_score.is_finite() || self.feasibility_score < 0.0 {
            return Err(EngineError::InvalidProposal {
                id: self.id.clone(),
                reason: format!("feasibility score {} is not a non-negative number", self.feasibility_score),
            });
        }
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(EngineError::InvalidProposal {
                id: self.id.clone(),
                reason: format!("cost {} is not a non-negative number", self.cost),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Agent state
// ---------------------------------------------------------------------------

/// Durable agent state, loaded at cycle start and persisted at cycle end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    pub deployed_contracts: BTreeSet<String>,
    /// Highest holder milestone already celebrated.
    #[serde(default)]
    pub last_molt_holder_count: u64,
    pub conservation_mode: bool,
    pub survival_mode: bool,
    pub last_post_time: DateTime<Utc>,
    pub pending_proposals: Vec<Proposal>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            deployed_contracts: BTreeSet::new(),
            last_molt_holder_count: 0,
            conservation_mode: false,
            survival_mode: false,
            last_post_time: DateTime::<Utc>::UNIX_EPOCH,
            pending_proposals: Vec::new(),
        }
    }
}

impl AgentState {
    /// Survival implies conservation for gating purposes.
    pub fn conservation_in_effect(&self) -> bool {
        self.conservation_mode || self.survival_mode
    }

    pub fn has_deployed(&self, contract: &str) -> bool {
        self.deployed_contracts.contains(contract)
    }

    pub fn mode(&self) -> OperatingMode {
        if self.survival_mode {
            OperatingMode::Survival
        } else if self.conservation_mode {
            OperatingMode::Conservation
        } else {
            OperatingMode::Operational
        }
    }

    /// Check every pending proposal and reject duplicate ids.
    pub fn validate(&self) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for proposal in &self.pending_proposals {
            proposal.validate()?;
            if !seen.insert(proposal.id.as_str()) {
                return Err(EngineError::DuplicateProposal(proposal.id.clone()));
            }
        }
        Ok(())
    }
}

/// Operating mode derived from the persisted mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Growth allowed.
    Operational,
    /// Growth paused until reserves recover.
    Conservation,
    /// Only essential operations.
    Survival,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operational => write!(f, "operational"),
            Self::Conservation => write!(f, "conservation"),
            Self::Survival => write!(f, "survival"),
        }
    }
}

// ---------------------------------------------------------------------------
// Evolution actions
// ---------------------------------------------------------------------------

/// The degraded mode an EXIT_CONSERVATION action leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviousMode {
    Survival,
    Conservation,
}

impl fmt::Display for PreviousMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Survival => write!(f, "survival"),
            Self::Conservation => write!(f, "conservation"),
        }
    }
}

/// An operational action proposed by the decision engine for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionAction {
    SurvivalMode,
    ConservationMode,
    #[serde(rename_all = "camelCase")]
    ExitConservation { from: PreviousMode },
    DeployAdvancedStaking,
    #[serde(rename_all = "camelCase")]
    MoltEvent { holder_milestone: u64 },
    #[serde(rename_all = "camelCase")]
    ExecuteProposal { proposal_id: String },
    PostMetrics,
    NoAction,
}

impl EvolutionAction {
    /// Urgency in [0, 100]; higher runs first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::SurvivalMode => 100,
            Self::ExitConservation { .. } => 95,
            Self::ConservationMode => 90,
            Self::DeployAdvancedStaking => 70,
            Self::MoltEvent { .. } => 60,
            Self::ExecuteProposal { .. } => 50,
            Self::PostMetrics => 20,
            Self::NoAction => 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SurvivalMode => "SURVIVAL_MODE",
            Self::ConservationMode => "CONSERVATION_MODE",
            Self::ExitConservation { .. } => "EXIT_CONSERVATION",
            Self::DeployAdvancedStaking => "DEPLOY_ADVANCED_STAKING",
            Self::MoltEvent { .. } => "MOLT_EVENT",
            Self::ExecuteProposal { .. } => "EXECUTE_PROPOSAL",
            Self::PostMetrics => "POST_METRICS",
            Self::NoAction => "NO_ACTION",
        }
    }

    /// Deployment and spend actions that grow the colony.
    pub fn is_growth(&self) -> bool {
        matches!(
            self,
            Self::DeployAdvancedStaking | Self::MoltEvent { .. } | Self::ExecuteProposal { .. }
        )
    }
}

impl fmt::Display for EvolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitConservation { from } => write!(f, "{}(from {})", self.kind(), from),
            Self::MoltEvent { holder_milestone } => {
                write!(f, "{}({})", self.kind(), holder_milestone)
            }
            Self::ExecuteProposal { proposal_id } => write!(f, "{}({})", self.kind(), proposal_id),
            _ => write!(f, "{}", self.kind()),
        }
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// What became of a proposed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Executed,
    /// Blocked by the safety gate.
    Rejected,
    /// The executor reported an error; state was left untouched.
    Failed,
    DryRun,
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executed => write!(f, "executed"),
            Self::Rejected => write!(f, "rejected"),
            Self::Failed => write!(f, "failed"),
            Self::DryRun => write!(f, "dry_run"),
        }
    }
}

/// A journaled action outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub cycle_id: String,
    pub action: EvolutionAction,
    pub outcome: ActionOutcome,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A growth action awaiting the external deployer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: String,
    pub action: EvolutionAction,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Metric deltas between the oldest snapshot in a window and the latest one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsChange {
    pub treasury_eth: f64,
    pub holder_count: i64,
    pub staking_tvl: f64,
    pub nfts_minted: i64,
}

impl MetricsChange {
    pub fn between(old: &MetricsSnapshot, current: &MetricsSnapshot) -> Self {
        Self {
            treasury_eth: current.treasury_eth - old.treasury_eth,
            holder_count: current.holder_count as i64 - old.holder_count as i64,
            staking_tvl: current.staking_tvl - old.staking_tvl,
            nfts_minted: current.nfts_minted as i64 - old.nfts_minted as i64,
        }
    }
}
