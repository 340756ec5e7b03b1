// src/config.rs

use anyhow::{Context, Result};
use std::env;

use crate::token::remote::DEFAULT_TOKEN_API_URL;

pub const DEFAULT_AGGREGATOR_API_URL: &str = "https://aggregator.agentswap.io";
pub const DEFAULT_STAKING_API_URL: &str = "https://staking.agentswap.io";

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    /// JSON-RPC endpoint of the chain node. Optional: without it the
    /// on-chain decimals fallback and every transaction-submitting tool are
    /// disabled, but symbol resolution and remote metadata still work.
    pub rpc_url: Option<String>,

    // External services
    pub token_api_url: String,
    pub aggregator_api_url: String,
    pub staking_api_url: String,

    // Transaction settings
    pub tx_private_key: Option<String>,
    pub default_gas_limit: u64,
    pub default_gas_price: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,

            rpc_url: env::var("RPC_URL").ok(),

            token_api_url: env::var("TOKEN_API_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_API_URL.to_string()),
            aggregator_api_url: env::var("AGGREGATOR_API_URL")
                .unwrap_or_else(|_| DEFAULT_AGGREGATOR_API_URL.to_string()),
            staking_api_url: env::var("STAKING_API_URL")
                .unwrap_or_else(|_| DEFAULT_STAKING_API_URL.to_string()),

            tx_private_key: env::var("TX_PRIVATE_KEY").ok(),
            default_gas_limit: env::var("DEFAULT_GAS_LIMIT")
                .unwrap_or_else(|_| "300000".to_string())
                .parse()
                .context("DEFAULT_GAS_LIMIT must be a valid number")?,
            default_gas_price: env::var("DEFAULT_GAS_PRICE")
                .unwrap_or_else(|_| "20000000000".to_string())
                .parse()
                .context("DEFAULT_GAS_PRICE must be a valid number")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rpc_url: None,
            token_api_url: DEFAULT_TOKEN_API_URL.to_string(),
            aggregator_api_url: DEFAULT_AGGREGATOR_API_URL.to_string(),
            staking_api_url: DEFAULT_STAKING_API_URL.to_string(),
            tx_private_key: None,
            default_gas_limit: 300_000,
            default_gas_price: 20_000_000_000,
        }
    }
}
