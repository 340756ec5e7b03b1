//! Client for the remote token-metadata service.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Production metadata endpoint; override with `TOKEN_API_URL`.
pub const DEFAULT_TOKEN_API_URL: &str = "https://tokens.agentswap.io";

/// One token as reported by the metadata service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteToken {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(default)]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub daily_volume_usd: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

/// Fetch metadata for a single token by contract address.
pub async fn fetch_token_by_address(
    client: &Client,
    base_url: &str,
    address: &str,
) -> Result<RemoteToken> {
    let url = format!("{}/v1/tokens/{}", base_url.trim_end_matches('/'), address);
    debug!("fetching token metadata from {}", url);

    let response = client
        .get(&url)
        .send()
        .await
        .context("token metadata request failed")?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!(
            "token metadata API returned {} for address {}",
            status,
            address
        ));
    }

    response
        .json()
        .await
        .context("failed to parse token metadata response")
}

/// Fetch a token by symbol from the verified set only.
///
/// Unverified tokens are never auto-resolved by symbol; they must be
/// addressed by contract address instead.
pub async fn fetch_verified_token_by_symbol(
    client: &Client,
    base_url: &str,
    symbol: &str,
) -> Result<RemoteToken> {
    let url = format!("{}/v1/tokens/verified", base_url.trim_end_matches('/'));
    debug!("searching verified token set for symbol '{}'", symbol);

    let response = client
        .get(&url)
        .query(&[("symbol", symbol)])
        .send()
        .await
        .context("verified token request failed")?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!(
            "token metadata API returned {} for symbol {}",
            status,
            symbol
        ));
    }

    let tokens: Vec<RemoteToken> = response
        .json()
        .await
        .context("failed to parse verified token response")?;

    tokens
        .into_iter()
        .find(|token| token.symbol.eq_ignore_ascii_case(symbol))
        .ok_or_else(|| anyhow!("symbol '{}' not found in the verified token set", symbol))
}
