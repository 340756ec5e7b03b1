// src/blockchain/services/staking.rs

use anyhow::{anyhow, Context, Result};
use ethers_core::abi::Token;
use ethers_core::types::{Address, TransactionRequest, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::blockchain::rpc;

/// A staking pool as reported by the staking aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingPool {
    pub address: String,
    pub name: String,
    pub staking_token: String,
    #[serde(default)]
    pub rewards_token: Option<String>,
    #[serde(default)]
    pub apr_bps: Option<i64>,
    #[serde(default)]
    pub tvl_usd: Option<f64>,
}

/// One account's position in a pool. Amounts are raw-unit decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingPosition {
    pub pool_address: String,
    pub pool_name: String,
    pub staking_token: String,
    pub staked_raw: String,
    pub rewards_raw: String,
}

pub async fn get_pools(client: &Client, base_url: &str) -> Result<Vec<StakingPool>> {
    let url = format!("{}/v1/pools", base_url.trim_end_matches('/'));
    debug!("fetching staking pools from {}", url);

    let response = client
        .get(&url)
        .send()
        .await
        .context("staking pools request failed")?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("staking API returned {} for pools request", status));
    }
    response
        .json()
        .await
        .context("failed to parse staking pools")
}

pub async fn get_positions(
    client: &Client,
    base_url: &str,
    owner: &str,
) -> Result<Vec<StakingPosition>> {
    let url = format!(
        "{}/v1/positions/{}",
        base_url.trim_end_matches('/'),
        owner
    );
    debug!("fetching staking positions from {}", url);

    let response = client
        .get(&url)
        .send()
        .await
        .context("staking positions request failed")?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!(
            "staking API returned {} for positions request",
            status
        ));
    }
    response
        .json()
        .await
        .context("failed to parse staking positions")
}

/// Build a `withdraw(uint256)` transaction against a pool contract.
pub fn unstake_tx(pool: &str, amount_raw: &str) -> Result<TransactionRequest> {
    let amount = U256::from_dec_str(amount_raw).context("invalid unstake amount")?;
    let data = rpc::encode_call("withdraw(uint256)", vec![Token::Uint(amount)]);
    let contract = Address::from_str(pool).context("invalid pool address")?;
    Ok(TransactionRequest::new().to(contract).data(data))
}

/// Build a `getReward()` claim transaction against a pool contract.
pub fn claim_tx(pool: &str) -> Result<TransactionRequest> {
    let data = rpc::encode_call("getReward()", vec![]);
    let contract = Address::from_str(pool).context("invalid pool address")?;
    Ok(TransactionRequest::new().to(contract).data(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: &str = "0x00000000000000000000000000000000000000bb";

    #[test]
    fn unstake_tx_encodes_amount() {
        let tx = unstake_tx(POOL, "5000").unwrap();
        let data = tx.data.unwrap();
        // withdraw(uint256) selector plus one word.
        assert_eq!(&data[..4], &hex::decode("2e1a7d4d").unwrap()[..]);
        assert_eq!(data.len(), 4 + 32);
    }

    #[test]
    fn claim_tx_has_bare_selector() {
        let tx = claim_tx(POOL).unwrap();
        let data = tx.data.unwrap();
        assert_eq!(&data[..4], &hex::decode("3d18b912").unwrap()[..]);
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn unstake_rejects_bad_amount() {
        assert!(unstake_tx(POOL, "12.5").is_err());
    }
}
