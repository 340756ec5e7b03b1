//! Raw JSON-RPC plumbing and hand-encoded contract calls.
//!
//! Calls go out as plain `eth_call` payloads over reqwest rather than through
//! a full provider stack; selectors and ABI data are encoded with
//! `ethers-core` primitives.

use anyhow::{anyhow, Context, Result};
use ethers_core::abi::{decode, encode, ParamType, Token};
use ethers_core::types::{Address, Bytes, U256};
use ethers_core::utils::keccak256;
use reqwest::Client;
use serde_json::{json, Value};
use std::str::FromStr;

/// Multicall3, deployed at the same address on all major EVM chains.
pub const MULTICALL3_ADDRESS: &str = "0xca11bde05977b3631167028862be2a173976ca11";

fn selector(sig: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(sig.as_bytes())[0..4]);
    sel
}

pub fn encode_call(sig: &str, tokens: Vec<Token>) -> Bytes {
    let mut out = selector(sig).to_vec();
    let mut tail = encode(&tokens);
    out.append(&mut tail);
    Bytes::from(out)
}

fn hex_to_bytes(v: &Value) -> Result<Vec<u8>> {
    let s = v
        .as_str()
        .ok_or_else(|| anyhow!("RPC result is not a string: {:?}", v))?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).context("RPC result is not valid hex")
}

fn decode_u256(v: &Value) -> Result<U256> {
    let bytes = hex_to_bytes(v)?;
    let tokens = decode(&[ParamType::Uint(256)], &bytes)
        .map_err(|e| anyhow!("failed to ABI-decode uint256: {}", e))?;
    match tokens.first() {
        Some(Token::Uint(n)) => Ok(*n),
        other => Err(anyhow!("unexpected ABI token: {:?}", other)),
    }
}

/// Issue one JSON-RPC request and return its `result` field.
pub async fn rpc_request(
    client: &Client,
    rpc_url: &str,
    method: &str,
    params: Value,
) -> Result<Value> {
    let payload = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let response: Value = client
        .post(rpc_url)
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("{} request failed", method))?
        .json()
        .await
        .with_context(|| format!("{} response was not JSON", method))?;
    if let Some(err) = response.get("error") {
        return Err(anyhow!("{} error: {}", method, err));
    }
    Ok(response["result"].clone())
}

pub async fn eth_call(client: &Client, rpc_url: &str, to: &str, data: Bytes) -> Result<Value> {
    rpc_request(
        client,
        rpc_url,
        "eth_call",
        json!([{"to": to, "data": format!("0x{}", hex::encode(data))}, "latest"]),
    )
    .await
}

/// Read a token's `decimals()` on-chain.
pub async fn erc20_decimals(client: &Client, rpc_url: &str, token: &str) -> Result<u8> {
    let raw = eth_call(client, rpc_url, token, encode_call("decimals()", vec![])).await?;
    let value = decode_u256(&raw)?;
    if value > U256::from(u8::MAX) {
        return Err(anyhow!("decimals value {} out of range", value));
    }
    Ok(value.low_u64() as u8)
}

/// Read a single ERC-20 balance on-chain.
pub async fn erc20_balance_of(
    client: &Client,
    rpc_url: &str,
    token: &str,
    owner: &str,
) -> Result<U256> {
    let owner_addr = Address::from_str(owner).context("invalid owner address")?;
    let data = encode_call("balanceOf(address)", vec![Token::Address(owner_addr)]);
    let raw = eth_call(client, rpc_url, token, data).await?;
    decode_u256(&raw)
}

/// Native balance via `eth_getBalance`.
pub async fn eth_get_balance(client: &Client, rpc_url: &str, owner: &str) -> Result<U256> {
    let raw = rpc_request(client, rpc_url, "eth_getBalance", json!([owner, "latest"])).await?;
    let s = raw
        .as_str()
        .ok_or_else(|| anyhow!("eth_getBalance result is not a string"))?;
    U256::from_str_radix(s.trim_start_matches("0x"), 16).context("invalid balance hex")
}

/// One sub-call of a Multicall3 `aggregate3` batch.
pub struct Call3 {
    pub target: String,
    pub allow_failure: bool,
    pub calldata: Bytes,
}

/// Execute a batch of calls through Multicall3 and return each sub-call's
/// `(success, return_data)` pair in input order.
pub async fn multicall_aggregate(
    client: &Client,
    rpc_url: &str,
    calls: &[Call3],
) -> Result<Vec<(bool, Vec<u8>)>> {
    let tuples = calls
        .iter()
        .map(|call| {
            let target = Address::from_str(&call.target)
                .with_context(|| format!("invalid call target {}", call.target))?;
            Ok(Token::Tuple(vec![
                Token::Address(target),
                Token::Bool(call.allow_failure),
                Token::Bytes(call.calldata.to_vec()),
            ]))
        })
        .collect::<Result<Vec<_>>>()?;

    let data = encode_call(
        "aggregate3((address,bool,bytes)[])",
        vec![Token::Array(tuples)],
    );
    let raw = eth_call(client, rpc_url, MULTICALL3_ADDRESS, data).await?;
    let bytes = hex_to_bytes(&raw)?;

    let decoded = decode(
        &[ParamType::Array(Box::new(ParamType::Tuple(vec![
            ParamType::Bool,
            ParamType::Bytes,
        ])))],
        &bytes,
    )
    .map_err(|e| anyhow!("failed to ABI-decode aggregate3 result: {}", e))?;

    let results = match decoded.into_iter().next() {
        Some(Token::Array(items)) => items,
        other => return Err(anyhow!("unexpected aggregate3 shape: {:?}", other)),
    };

    let mut out = Vec::with_capacity(results.len());
    for item in results {
        match item {
            Token::Tuple(fields) => match (fields.first(), fields.get(1)) {
                (Some(Token::Bool(success)), Some(Token::Bytes(data))) => {
                    out.push((*success, data.clone()));
                }
                other => return Err(anyhow!("unexpected aggregate3 tuple: {:?}", other)),
            },
            other => return Err(anyhow!("unexpected aggregate3 item: {:?}", other)),
        }
    }
    Ok(out)
}

/// Decode a 32-byte uint return payload (e.g. a `balanceOf` result).
pub fn decode_uint_return(data: &[u8]) -> Result<U256> {
    let tokens = decode(&[ParamType::Uint(256)], data)
        .map_err(|e| anyhow!("failed to ABI-decode uint256 return: {}", e))?;
    match tokens.first() {
        Some(Token::Uint(n)) => Ok(*n),
        other => Err(anyhow!("unexpected ABI token: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_known_erc20_signatures() {
        // Well-known selectors: balanceOf(address) and decimals().
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("decimals()")), "313ce567");
        assert_eq!(
            hex::encode(selector("transfer(address,uint256)")),
            "a9059cbb"
        );
    }

    #[test]
    fn encode_call_prefixes_selector() {
        let data = encode_call("decimals()", vec![]);
        assert_eq!(data.len(), 4);
        let owner = Address::from_str("0x0000000000000000000000000000000000000001").unwrap();
        let with_arg = encode_call("balanceOf(address)", vec![Token::Address(owner)]);
        assert_eq!(with_arg.len(), 4 + 32);
    }

    #[test]
    fn decode_uint_return_round_trips() {
        let encoded = encode(&[Token::Uint(U256::from(123456u64))]);
        assert_eq!(decode_uint_return(&encoded).unwrap(), U256::from(123456u64));
    }
}
