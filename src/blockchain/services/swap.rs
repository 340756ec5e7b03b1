// src/blockchain/services/swap.rs

use anyhow::{anyhow, Context, Result};
use ethers_core::types::{Address, TransactionRequest, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// A quote from the liquidity aggregator. Token fields are normalized
/// addresses; amounts are raw-unit decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub quote_id: String,
    pub sell_token: String,
    pub buy_token: String,
    pub sell_amount: String,
    pub buy_amount: String,
    #[serde(default)]
    pub price_impact_bps: Option<i64>,
    #[serde(default)]
    pub route: Vec<String>,
}

/// Calldata for executing a previously quoted swap.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapCalldata {
    pub to: String,
    pub data: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Request a quote for selling `sell_amount` of `sell_token` into
/// `buy_token`. Both token arguments must already be resolved addresses.
pub async fn get_quote(
    client: &Client,
    base_url: &str,
    sell_token: &str,
    buy_token: &str,
    sell_amount: &str,
    taker: Option<&str>,
) -> Result<SwapQuote> {
    let url = format!("{}/v1/quote", base_url.trim_end_matches('/'));
    debug!(
        "requesting swap quote: {} {} -> {}",
        sell_amount, sell_token, buy_token
    );

    let mut query = vec![
        ("sellToken", sell_token.to_string()),
        ("buyToken", buy_token.to_string()),
        ("sellAmount", sell_amount.to_string()),
    ];
    if let Some(taker) = taker {
        query.push(("taker", taker.to_string()));
    }

    let response = client
        .get(&url)
        .query(&query)
        .send()
        .await
        .context("aggregator quote request failed")?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("aggregator returned {} for quote request", status));
    }
    response
        .json()
        .await
        .context("failed to parse aggregator quote")
}

/// Turn a quote into executable calldata.
pub async fn build_swap(
    client: &Client,
    base_url: &str,
    quote_id: &str,
    taker: &str,
    slippage_bps: u32,
) -> Result<SwapCalldata> {
    let url = format!("{}/v1/build", base_url.trim_end_matches('/'));
    let payload = serde_json::json!({
        "quoteId": quote_id,
        "taker": taker,
        "slippageBps": slippage_bps,
    });

    let response = client
        .post(&url)
        .json(&payload)
        .send()
        .await
        .context("aggregator build request failed")?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("aggregator returned {} for build request", status));
    }
    response
        .json()
        .await
        .context("failed to parse aggregator calldata")
}

/// Convert aggregator calldata into a signable transaction request.
pub fn swap_tx(calldata: &SwapCalldata) -> Result<TransactionRequest> {
    let to = Address::from_str(&calldata.to).context("invalid swap router address")?;
    let data = calldata.data.strip_prefix("0x").unwrap_or(&calldata.data);
    let data = hex::decode(data).context("invalid swap calldata hex")?;

    let mut tx = TransactionRequest::new().to(to).data(data);
    if let Some(value) = &calldata.value {
        tx = tx.value(U256::from_dec_str(value).context("invalid swap value")?);
    }
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_tx_decodes_calldata() {
        let calldata = SwapCalldata {
            to: "0x00000000000000000000000000000000000000aa".to_string(),
            data: "0xdeadbeef".to_string(),
            value: Some("1000".to_string()),
        };
        let tx = swap_tx(&calldata).unwrap();
        assert_eq!(tx.value, Some(U256::from(1000u64)));
        assert_eq!(tx.data.unwrap().to_vec(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn swap_tx_rejects_bad_hex() {
        let calldata = SwapCalldata {
            to: "0x00000000000000000000000000000000000000aa".to_string(),
            data: "0xnothex".to_string(),
            value: None,
        };
        assert!(swap_tx(&calldata).is_err());
    }
}
