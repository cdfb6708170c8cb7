//! On-chain metrics over JSON-RPC plus the block explorer holder count.
//!
//! A colony contract that is not configured contributes 0 to its metric.
//! A missing treasury address, a token without an explorer key, an RPC error
//! or a malformed response fails the whole fetch; nothing is silently zeroed.

use crate::config::{AgentConfig, Allocation, ContractAddresses};
use crate::metrics::MetricsProvider;
use crate::types::MetricsSnapshot;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha3::{Digest, Keccak256};
use tracing::debug;

const WEI_PER_ETH: f64 = 1e18;

/// Collects a [`MetricsSnapshot`] from a Base RPC endpoint.
#[derive(Debug, Clone)]
pub struct ChainMetricsProvider {
    rpc_url: String,
    explorer_api_url: String,
    explorer_api_key: String,
    treasury_address: String,
    contracts: ContractAddresses,
    allocation: Allocation,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

impl ChainMetricsProvider {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            rpc_url: config.rpc_url.clone(),
            explorer_api_url: config.explorer_api_url.trim_end_matches('/').to_string(),
            explorer_api_key: config.explorer_api_key.clone(),
            treasury_address: config.treasury_address.clone(),
            contracts: config.contracts.clone(),
            allocation: config.allocation.clone(),
            http: reqwest::Client::new(),
        }
    }

    async fn rpc(&self, method: &str, params: serde_json::Value) -> Result<String> {
        let resp = self
            .http
            .post(&self.rpc_url)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{} failed ({}): {}", method, status, body);
        }

        let body: RpcResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;
        if let Some(err) = body.error {
            bail!("{} returned error {}: {}", method, err.code, err.message);
        }
        body.result
            .with_context(|| format!("{} returned no result", method))
    }

    async fn eth_balance(&self, address: &str) -> Result<f64> {
        let hex = self
            .rpc("eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;
        Ok(parse_quantity(&hex)? as f64 / WEI_PER_ETH)
    }

    /// `eth_call` a view returning a single uint256.
    async fn call_uint(&self, to: &str, signature: &str, arg: Option<&str>) -> Result<u128> {
        let data = encode_call(signature, arg)?;
        let hex = self
            .rpc(
                "eth_call",
                serde_json::json!([{ "to": to, "data": data }, "latest"]),
            )
            .await?;
        parse_quantity(&hex).with_context(|| format!("Bad {} result from {}", signature, to))
    }

    async fn total_supply(&self) -> Result<f64> {
        let token = &self.contracts.forge_token;
        if token.is_empty() {
            debug!("No token configured, total supply is 0");
            return Ok(0.0);
        }
        Ok(self.call_uint(token, "totalSupply()", None).await? as f64 / WEI_PER_ETH)
    }

    async fn token_balance_of(&self, holder: &str) -> Result<f64> {
        let token = &self.contracts.forge_token;
        if token.is_empty() || holder.is_empty() {
            return Ok(0.0);
        }
        Ok(self
            .call_uint(token, "balanceOf(address)", Some(holder))
            .await? as f64
            / WEI_PER_ETH)
    }

    async fn nft_counts(&self) -> Result<(u64, u64)> {
        let nft = &self.contracts.genesis_lobsters;
        if nft.is_empty() {
            debug!("No NFT collection configured");
            return Ok((0, 0));
        }
        let (minted, max) = tokio::try_join!(
            self.call_uint(nft, "totalMinted()", None),
            self.call_uint(nft, "MAX_SUPPLY()", None),
        )?;
        Ok((saturating_u64(minted), saturating_u64(max)))
    }

    async fn holder_count(&self) -> Result<u64> {
        let token = &self.contracts.forge_token;
        if token.is_empty() {
            debug!("No token configured, holder count is 0");
            return Ok(0);
        }
        if self.explorer_api_key.is_empty() {
            bail!("Token {} is configured but explorer_api_key is empty", token);
        }

        let resp = self
            .http
            .get(format!("{}/api", self.explorer_api_url))
            .query(&[
                ("module", "token"),
                ("action", "tokenholdercount"),
                ("contractaddress", token.as_str()),
                ("apikey", self.explorer_api_key.as_str()),
            ])
            .send()
            .await
            .context("Holder count request failed")?;

        let body: ExplorerResponse = resp
            .json()
            .await
            .context("Failed to parse holder count response")?;
        if body.status != "1" {
            bail!("Holder count lookup failed: {} ({})", body.message, body.result);
        }
        body.result
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Holder count is not a number: {}", body.result))
    }
}

#[async_trait]
impl MetricsProvider for ChainMetricsProvider {
    fn name(&self) -> &str {
        "chain"
    }

    async fn fetch(&self) -> Result<MetricsSnapshot> {
        if self.treasury_address.is_empty() {
            bail!("No treasury address configured");
        }

        let (treasury_eth, total_supply, treasury_forge, staking_tvl, (nfts_minted, nfts_max_supply), holder_count) =
            tokio::try_join!(
                self.eth_balance(&self.treasury_address),
                self.total_supply(),
                self.token_balance_of(&self.treasury_address),
                self.token_balance_of(&self.contracts.lobster_vault),
                self.nft_counts(),
                self.holder_count(),
            )?;

        let (gas_reserve_eth, gas_runway_hours) = self.allocation.gas_runway(treasury_eth);

        let metrics = MetricsSnapshot {
            treasury_eth,
            treasury_forge,
            holder_count,
            total_supply,
            staking_tvl,
            staking_apy: 0.0,
            nfts_minted,
            nfts_max_supply,
            gas_reserve_eth,
            gas_runway_hours,
            collected_at: Some(Utc::now()),
        };
        debug!(
            treasury_eth,
            holder_count,
            gas_runway_hours,
            "Metrics gathered from chain"
        );
        Ok(metrics)
    }
}

/// ABI-encode a call with an optional single address argument.
pub fn encode_call(signature: &str, address: Option<&str>) -> Result<String> {
    let selector = &Keccak256::digest(signature.as_bytes())[..4];
    let mut data = format!("0x{}", hex::encode(selector));
    if let Some(address) = address {
        let bare = address.strip_prefix("0x").unwrap_or(address);
        if bare.len() != 40 || hex::decode(bare).is_err() {
            bail!("Invalid address: {}", address);
        }
        data.push_str(&format!("{:0>64}", bare.to_lowercase()));
    }
    Ok(data)
}

/// Parse a hex quantity or a 32-byte word into an integer.
pub fn parse_quantity(hex: &str) -> Result<u128> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > 32 {
        bail!("Quantity does not fit in 128 bits: {}", hex);
    }
    u128::from_str_radix(significant, 16).with_context(|| format!("Invalid hex quantity: {}", hex))
}

fn saturating_u64(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_encoding() {
        // Well-known ERC-20 selectors.
        assert_eq!(encode_call("totalSupply()", None).unwrap(), "0x18160ddd");
        let data = encode_call(
            "balanceOf(address)",
            Some("0x5F5356E8E642759FaF9C206B125996705940BB07"),
        )
        .unwrap();
        assert!(data.starts_with("0x70a08231"));
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.ends_with("5f5356e8e642759faf9c206b125996705940bb07"));
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(encode_call("balanceOf(address)", Some("0x1234")).is_err());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0xde0b6b3a7640000").unwrap(), 1_000_000_000_000_000_000);
        let word = format!("0x{:0>64}", "3e8");
        assert_eq!(parse_quantity(&word).unwrap(), 1_000);
        assert!(parse_quantity(&format!("0x1{}", "0".repeat(40))).is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[tokio::test]
    async fn test_token_without_explorer_key_fails() {
        let mut config = AgentConfig::default();
        config.contracts.forge_token = "0x5F5356E8E642759FaF9C206B125996705940BB07".into();
        let provider = ChainMetricsProvider::from_config(&config);
        let err = provider.holder_count().await.unwrap_err();
        assert!(err.to_string().contains("explorer_api_key"));

        let unconfigured = ChainMetricsProvider::from_config(&AgentConfig::default());
        assert_eq!(unconfigured.holder_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_treasury_fails_fast() {
        let provider = ChainMetricsProvider::from_config(&AgentConfig::default());
        let err = provider.fetch().await.unwrap_err();
        assert!(err.to_string().contains("treasury"));
    }
}
