//! Token identity resolution and caching.
//!
//! Maps human-facing token symbols and contract addresses to validated,
//! normalized on-chain identifiers and decimal precision. Combines an
//! immutable built-in registry, a TTL-bounded cache of remotely fetched
//! metadata, and an on-chain `decimals()` fallback. Trusted (static) entries
//! can never be replaced by remote or on-chain data.

pub mod address;
pub mod cache;
pub mod registry;
pub mod remote;
pub mod service;

pub use address::{is_address_like, normalize_address};
pub use service::TokenService;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long a dynamically fetched record stays fresh (24 hours).
pub const TOKEN_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Pseudo-address under which the chain's native asset is cached.
pub const NATIVE_TOKEN_ADDRESS: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

/// `last_updated` value carried by static records; never evaluated for expiry.
pub const STATIC_TIMESTAMP: i64 = 0;

// --- Error types for token resolution ---

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("invalid address '{0}': expected a hex string of at most 40 digits")]
    InvalidAddress(String),
    #[error("unknown token '{0}': not a known symbol and not an address")]
    UnknownToken(String),
    #[error("failed to fetch token metadata for '{what}': {cause}")]
    RemoteFetchFailed { what: String, cause: anyhow::Error },
    #[error("on-chain decimals read failed for {address}: {cause}")]
    OnChainReadFailed { address: String, cause: anyhow::Error },
    #[error("no RPC provider configured; cannot resolve decimals for {0} on-chain")]
    NoProviderConfigured(String),
}

// --- Token models ---

/// Display metadata for one token, without cache bookkeeping.
#[derive(Debug, Clone)]
pub struct TokenMeta {
    /// Normalized `0x` + 40 lowercase hex digit address.
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub logo_uri: Option<String>,
    pub daily_volume_usd: Option<f64>,
    pub tags: Vec<String>,
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

/// A resolved token as callers see it.
///
/// `last_updated` is epoch milliseconds of the last write for dynamic
/// records and [`STATIC_TIMESTAMP`] for built-in ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_volume_usd: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub extensions: serde_json::Map<String, serde_json::Value>,
    pub is_static: bool,
    pub last_updated: i64,
}

/// Shortened display form for addresses with no known symbol, e.g. `0x1234...abcd`.
pub fn short_address(address: &str) -> String {
    if address.len() > 12 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_address_truncates_long_addresses() {
        let addr = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
        assert_eq!(short_address(addr), "0xc02a...6cc2");
    }

    #[test]
    fn short_address_keeps_short_input() {
        assert_eq!(short_address("0xabc"), "0xabc");
    }
}
