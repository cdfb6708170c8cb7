pub mod schema;

pub use schema::{AgentConfig, Allocation, ContractAddresses, SocialConfig, Thresholds};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default agent home directory (~/.lobsterforge).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".lobsterforge"))
        .unwrap_or_else(|| PathBuf::from(".lobsterforge"))
}

/// Load config from the given path, or return defaults.
///
/// Environment overrides are applied on top of whatever the file holds.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    let mut config = if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read agent config file")?;
        toml::from_str(&contents).context("Failed to parse agent config (TOML)")?
    } else {
        AgentConfig::default()
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &AgentConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

/// Apply `LOBSTERFORGE_*` overrides for secrets and deployment addresses.
pub fn apply_env_overrides(config: &mut AgentConfig, lookup: impl Fn(&str) -> Option<String>) {
    let overrides: [(&str, &mut String); 4] = [
        ("LOBSTERFORGE_RPC_URL", &mut config.rpc_url),
        ("LOBSTERFORGE_TREASURY_ADDRESS", &mut config.treasury_address),
        ("LOBSTERFORGE_EXPLORER_API_KEY", &mut config.explorer_api_key),
        ("LOBSTERFORGE_SOCIAL_RELAY_URL", &mut config.social.relay_url),
    ];
    for (key, slot) in overrides {
        if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
            debug!("Config override from {}", key);
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.thresholds, Thresholds::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/lobsterforge.toml");
        let mut cfg = AgentConfig::default();
        cfg.thresholds.gas_runway_hours = 48.0;
        save_config(&cfg, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.thresholds.gas_runway_hours, 48.0);
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = AgentConfig::default();
        apply_env_overrides(&mut cfg, |key| match key {
            "LOBSTERFORGE_TREASURY_ADDRESS" => Some("0xabc".into()),
            "LOBSTERFORGE_RPC_URL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.treasury_address, "0xabc");
        assert_eq!(cfg.rpc_url, "https://sepolia.base.org");
    }
}
