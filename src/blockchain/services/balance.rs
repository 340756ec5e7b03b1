//! Balance fetching with a batched primary path and a per-token fallback.
//!
//! Token identifiers are resolved through the token service's synchronous
//! resolver before any network call; the resolution is a pure mapping, so
//! duplicates and caller ordering survive into the response.

use anyhow::{bail, Context, Result};
use ethers_core::abi::Token;
use ethers_core::types::{Address, U256};
use reqwest::Client;
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::blockchain::rpc::{self, Call3};
use crate::token::{TokenService, NATIVE_TOKEN_ADDRESS};

/// Upper bound on tokens per balance request.
pub const MAX_BATCH_TOKENS: usize = 50;

/// One balance row. `token` is the identifier exactly as the caller supplied
/// it; `address` is its normalized resolution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub token: String,
    pub address: String,
    pub raw_balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub owner: String,
    /// Which path served the data: "multicall" or "per_token".
    pub method: &'static str,
    pub balances: Vec<TokenBalance>,
}

/// Fetch balances for a list of token identifiers (symbols or addresses).
///
/// The batch path goes through Multicall3; any failure there degrades to
/// individual queries. Only a failure of both paths is surfaced.
pub async fn get_token_balances(
    tokens: &TokenService,
    client: &Client,
    rpc_url: &str,
    owner: &str,
    requested: &[String],
) -> Result<BalancesResponse> {
    if requested.is_empty() {
        bail!("token list must not be empty");
    }
    if requested.len() > MAX_BATCH_TOKENS {
        bail!(
            "token list has {} entries, exceeding the {}-token batch limit",
            requested.len(),
            MAX_BATCH_TOKENS
        );
    }

    let owner_addr = crate::token::normalize_address(owner)?;

    let mut resolved = Vec::with_capacity(requested.len());
    for ident in requested {
        let address = tokens.resolve_symbol(ident)?;
        resolved.push((ident.clone(), address));
    }

    let (raw_balances, method) =
        match fetch_via_multicall(client, rpc_url, &owner_addr, &resolved).await {
            Ok(raw) => (raw, "multicall"),
            Err(err) => {
                warn!(
                    "multicall balance batch failed, falling back to per-token queries: {:#}",
                    err
                );
                let raw = fetch_per_token(client, rpc_url, &owner_addr, &resolved)
                    .await
                    .context("per-token balance fallback failed")?;
                (raw, "per_token")
            }
        };

    let balances = resolved
        .into_iter()
        .zip(raw_balances)
        .map(|((token, address), raw)| {
            // Cache-only annotation; balance reads never trigger fetches.
            let info = tokens.get_token_info(&address);
            TokenBalance {
                token,
                symbol: info.as_ref().map(|record| record.symbol.clone()),
                decimals: info.map(|record| record.decimals),
                address,
                raw_balance: raw.to_string(),
            }
        })
        .collect();

    Ok(BalancesResponse {
        owner: owner_addr,
        method,
        balances,
    })
}

async fn fetch_via_multicall(
    client: &Client,
    rpc_url: &str,
    owner: &str,
    resolved: &[(String, String)],
) -> Result<Vec<U256>> {
    let owner_token = Token::Address(Address::from_str(owner).context("invalid owner address")?);
    let calls: Vec<Call3> = resolved
        .iter()
        .map(|(_, address)| {
            if address == NATIVE_TOKEN_ADDRESS {
                // Multicall3 exposes the native balance as a view call on itself.
                Call3 {
                    target: rpc::MULTICALL3_ADDRESS.to_string(),
                    allow_failure: false,
                    calldata: rpc::encode_call("getEthBalance(address)", vec![owner_token.clone()]),
                }
            } else {
                Call3 {
                    target: address.clone(),
                    allow_failure: false,
                    calldata: rpc::encode_call("balanceOf(address)", vec![owner_token.clone()]),
                }
            }
        })
        .collect();

    debug!("querying {} balances via multicall", calls.len());
    let results = rpc::multicall_aggregate(client, rpc_url, &calls).await?;
    if results.len() != resolved.len() {
        bail!(
            "multicall returned {} results for {} calls",
            results.len(),
            resolved.len()
        );
    }

    results
        .into_iter()
        .zip(resolved)
        .map(|((success, data), (_, address))| {
            if !success {
                bail!("multicall sub-call failed for {}", address);
            }
            rpc::decode_uint_return(&data)
                .with_context(|| format!("bad balance payload for {}", address))
        })
        .collect()
}

async fn fetch_per_token(
    client: &Client,
    rpc_url: &str,
    owner: &str,
    resolved: &[(String, String)],
) -> Result<Vec<U256>> {
    let mut balances = Vec::with_capacity(resolved.len());
    for (_, address) in resolved {
        let balance = if address == NATIVE_TOKEN_ADDRESS {
            rpc::eth_get_balance(client, rpc_url, owner).await?
        } else {
            rpc::erc20_balance_of(client, rpc_url, address, owner)
                .await
                .with_context(|| format!("balanceOf failed for {}", address))?
        };
        balances.push(balance);
    }
    Ok(balances)
}
