//! Configuration schema for lobsterforge.toml.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Human-readable agent name.
    pub name: String,

    /// Path to the persisted agent state (JSON).
    pub state_path: String,

    /// Path to the SQLite cycle journal.
    pub journal_path: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,

    /// Six-field cron expression (with seconds) for the cycle timer.
    pub cycle_schedule: String,

    /// Base chain RPC URL.
    pub rpc_url: String,

    /// 8453 for Base mainnet, 84532 for Base Sepolia.
    pub chain_id: u64,

    /// Treasury wallet whose balance drives every decision.
    pub treasury_address: String,

    /// Block explorer API base URL (holder counts).
    pub explorer_api_url: String,

    pub explorer_api_key: String,

    pub contracts: ContractAddresses,

    pub social: SocialConfig,

    pub thresholds: Thresholds,

    pub allocation: Allocation,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "lobsterforge".into(),
            state_path: "~/.lobsterforge/state.json".into(),
            journal_path: "~/.lobsterforge/journal.db".into(),
            log_level: "info".into(),
            cycle_schedule: "0 0 */4 * * *".into(),
            rpc_url: "https://sepolia.base.org".into(),
            chain_id: 84532,
            treasury_address: String::new(),
            explorer_api_url: "https://api-sepolia.basescan.org".into(),
            explorer_api_key: String::new(),
            contracts: ContractAddresses::default(),
            social: SocialConfig::default(),
            thresholds: Thresholds::default(),
            allocation: Allocation::default(),
        }
    }
}

impl AgentConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> String {
        shellexpand::tilde(path).into_owned()
    }

    pub fn resolved_state_path(&self) -> String {
        self.resolve_path(&self.state_path)
    }

    pub fn resolved_journal_path(&self) -> String {
        self.resolve_path(&self.journal_path)
    }
}

/// Colony contract addresses; empty means "not deployed yet".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractAddresses {
    pub forge_token: String,
    pub lobster_vault: String,
    pub genesis_lobsters: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    /// Broadcast relay URL; empty disables posting.
    pub relay_url: String,
    pub handle: String,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            relay_url: String::new(),
            handle: "LobsterForge".into(),
        }
    }
}

/// Static decision thresholds threaded into every engine call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Below this treasury balance (ETH) the agent enters survival mode.
    pub survival_treasury_eth: f64,
    /// Below this treasury balance (ETH) growth is paused.
    pub conservation_treasury_eth: f64,
    /// Treasury balance (ETH) that unlocks advanced staking.
    pub advanced_staking_treasury_eth: f64,
    /// First holder milestone that can trigger a molt.
    pub molt_holder_base: u64,
    pub molt_holder_interval: u64,
    /// Quorum reported by the status readout.
    pub proposal_min_votes: u64,
    /// Minimum proposal score for automatic execution.
    pub proposal_feasibility_score: f64,
    pub max_single_spend_percent: f64,
    pub gas_runway_hours: f64,
    pub post_interval_hours: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            survival_treasury_eth: 0.3,
            conservation_treasury_eth: 0.5,
            advanced_staking_treasury_eth: 5.0,
            molt_holder_base: 500,
            molt_holder_interval: 100,
            proposal_min_votes: 50,
            proposal_feasibility_score: 0.8,
            max_single_spend_percent: 15.0,
            gas_runway_hours: 72.0,
            post_interval_hours: 24.0,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> EngineResult<()> {
        let amounts = [
            ("survival_treasury_eth", self.survival_treasury_eth),
            ("conservation_treasury_eth", self.conservation_treasury_eth),
            ("advanced_staking_treasury_eth", self.advanced_staking_treasury_eth),
            ("proposal_feasibility_score", self.proposal_feasibility_score),
            ("gas_runway_hours", self.gas_runway_hours),
            ("post_interval_hours", self.post_interval_hours),
        ];
        for (name, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidThreshold {
                    name,
                    reason: format!("{value} is not a non-negative number"),
                });
            }
        }
        if self.molt_holder_interval == 0 {
            return Err(EngineError::InvalidThreshold {
                name: "molt_holder_interval",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.max_single_spend_percent > 0.0 && self.max_single_spend_percent <= 100.0) {
            return Err(EngineError::InvalidThreshold {
                name: "max_single_spend_percent",
                reason: format!("{} is outside (0, 100]", self.max_single_spend_percent),
            });
        }
        if self.survival_treasury_eth > self.conservation_treasury_eth {
            return Err(EngineError::InvalidThreshold {
                name: "survival_treasury_eth",
                reason: format!(
                    "{} exceeds conservation_treasury_eth {}",
                    self.survival_treasury_eth, self.conservation_treasury_eth
                ),
            });
        }
        Ok(())
    }

    /// Largest single spend allowed for the given treasury balance.
    pub fn max_single_spend(&self, treasury_eth: f64) -> f64 {
        treasury_eth * self.max_single_spend_percent / 100.0
    }
}

/// Revenue allocation and gas assumptions used to derive the gas runway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Allocation {
    /// Fraction of the treasury held back for gas.
    pub gas_reserve: f64,
    pub avg_gas_cost_eth: f64,
    pub tx_per_hour: f64,
}

impl Default for Allocation {
    fn default() -> Self {
        Self {
            gas_reserve: 0.40,
            avg_gas_cost_eth: 0.001,
            tx_per_hour: 0.5,
        }
    }
}

impl Allocation {
    /// Gas reserve (ETH) and runway (hours) for a treasury balance.
    pub fn gas_runway(&self, treasury_eth: f64) -> (f64, f64) {
        let reserve = treasury_eth * self.gas_reserve;
        let burn_per_hour = self.avg_gas_cost_eth * self.tx_per_hour;
        let runway = if burn_per_hour > 0.0 {
            reserve / burn_per_hour
        } else {
            f64::MAX
        };
        (reserve, runway)
    }
}
