//! Built-in registry of well-known tokens.
//!
//! The sole source of truth for trusted token identities. Loaded into the
//! cache once at service construction; entries never expire and can never be
//! overwritten by remote or on-chain data.

use super::{TokenMeta, NATIVE_TOKEN_ADDRESS};

struct StaticTokenDef {
    symbol: &'static str,
    name: &'static str,
    /// Must already be in canonical lowercase form.
    address: &'static str,
    decimals: u8,
    logo_uri: Option<&'static str>,
}

const STATIC_TOKENS: &[StaticTokenDef] = &[
    StaticTokenDef {
        symbol: "ETH",
        name: "Ether",
        address: NATIVE_TOKEN_ADDRESS,
        decimals: 18,
        logo_uri: Some("https://assets.agentswap.io/logos/eth.png"),
    },
    StaticTokenDef {
        symbol: "WETH",
        name: "Wrapped Ether",
        address: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
        decimals: 18,
        logo_uri: Some("https://assets.agentswap.io/logos/weth.png"),
    },
    StaticTokenDef {
        symbol: "USDC",
        name: "USD Coin",
        address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
        decimals: 6,
        logo_uri: Some("https://assets.agentswap.io/logos/usdc.png"),
    },
    StaticTokenDef {
        symbol: "USDT",
        name: "Tether USD",
        address: "0xdac17f958d2ee523a2206206994597c13d831ec7",
        decimals: 6,
        logo_uri: Some("https://assets.agentswap.io/logos/usdt.png"),
    },
    StaticTokenDef {
        symbol: "DAI",
        name: "Dai Stablecoin",
        address: "0x6b175474e89094c44da98b954eedeac495271d0f",
        decimals: 18,
        logo_uri: Some("https://assets.agentswap.io/logos/dai.png"),
    },
];

/// Expand the built-in definitions with shared defaults.
pub fn static_tokens() -> Vec<TokenMeta> {
    STATIC_TOKENS
        .iter()
        .map(|def| TokenMeta {
            address: def.address.to_string(),
            symbol: def.symbol.to_string(),
            name: def.name.to_string(),
            decimals: def.decimals,
            logo_uri: def.logo_uri.map(str::to_string),
            daily_volume_usd: None,
            tags: Vec::new(),
            extensions: serde_json::Map::new(),
        })
        .collect()
}

/// Number of built-in tokens.
pub fn static_token_count() -> usize {
    STATIC_TOKENS.len()
}
