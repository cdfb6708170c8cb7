//! Treasury health classification and the plain-text status report.

use crate::config::Thresholds;
use crate::types::{MetricsChange, MetricsSnapshot};
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;

/// Health bucket derived purely from the treasury balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreasuryStatus {
    Healthy,
    Conservation,
    Survival,
}

impl fmt::Display for TreasuryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Conservation => write!(f, "conservation"),
            Self::Survival => write!(f, "survival"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: TreasuryStatus,
    pub warnings: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == TreasuryStatus::Healthy && self.warnings.is_empty()
    }
}

/// Classify a snapshot against the thresholds. Independent of the persisted
/// mode flags: this reports where the treasury is, not what the agent did.
pub fn check_health(metrics: &MetricsSnapshot, thresholds: &Thresholds) -> HealthReport {
    let mut warnings = Vec::new();

    let status = if metrics.treasury_eth < thresholds.survival_treasury_eth {
        warnings.push("Treasury below survival threshold".to_string());
        TreasuryStatus::Survival
    } else if metrics.treasury_eth < thresholds.conservation_treasury_eth {
        warnings.push("Treasury below conservation threshold".to_string());
        TreasuryStatus::Conservation
    } else {
        TreasuryStatus::Healthy
    };

    if metrics.gas_runway_hours < thresholds.gas_runway_hours {
        warnings.push(format!(
            "Gas runway low: {:.0} hours",
            metrics.gas_runway_hours
        ));
    }

    HealthReport { status, warnings }
}

fn signed(value: f64, precision: usize) -> String {
    if value >= 0.0 {
        format!("+{:.*}", precision, value)
    } else {
        format!("{:.*}", precision, value)
    }
}

/// Multi-line metrics report, with deltas when a change window is known.
pub fn metrics_report(
    metrics: &MetricsSnapshot,
    thresholds: &Thresholds,
    change: Option<&MetricsChange>,
) -> String {
    let health = check_health(metrics, thresholds);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "LobsterForge Metrics Report");
    let _ = writeln!(out, "{}", "=".repeat(40));
    let _ = writeln!(out);
    let _ = writeln!(out, "Status: {}", health.status.to_string().to_uppercase());
    let _ = writeln!(out);

    let _ = writeln!(out, "Treasury:");
    let _ = write!(out, "  ETH: {:.4}", metrics.treasury_eth);
    if let Some(c) = change.filter(|c| c.treasury_eth != 0.0) {
        let _ = write!(out, " ({})", signed(c.treasury_eth, 4));
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  $FORGE: {:.0}", metrics.treasury_forge);
    let _ = writeln!(out);

    let _ = writeln!(out, "Colony:");
    let _ = write!(out, "  Holders: {}", metrics.holder_count);
    if let Some(c) = change.filter(|c| c.holder_count != 0) {
        let _ = write!(out, " ({:+})", c.holder_count);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  Staking TVL: {:.0} $FORGE", metrics.staking_tvl);
    let _ = writeln!(
        out,
        "  NFTs Minted: {}/{}",
        metrics.nfts_minted, metrics.nfts_max_supply
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Operations:");
    let _ = writeln!(out, "  Gas Reserve: {:.4} ETH", metrics.gas_reserve_eth);
    let _ = writeln!(out, "  Runway: {:.0} hours", metrics.gas_runway_hours);

    if !health.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Warnings:");
        for warning in &health.warnings {
            let _ = writeln!(out, "  - {}", warning);
        }
    }

    out
}
