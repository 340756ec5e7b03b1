// src/blockchain/nonce_manager.rs

use std::sync::Arc;

use dashmap::DashMap;
use ethers_core::types::{Address, U256};
use serde_json::json;
use tokio::sync::Mutex;

use crate::blockchain::rpc;

// Manages nonces for sender addresses so concurrent submissions stay sequential.
#[derive(Debug, Clone, Default)]
pub struct NonceManager {
    // Each address gets its own state behind a Mutex; the DashMap allows
    // concurrent access to different addresses.
    nonces: DashMap<Address, Arc<Mutex<NonceState>>>,
}

#[derive(Debug)]
struct NonceState {
    next_nonce: Option<U256>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self {
            nonces: DashMap::new(),
        }
    }

    /// Get the next valid nonce for an address, seeding from
    /// `eth_getTransactionCount` on first use and incrementing locally after.
    pub async fn get_next_nonce(&self, address: Address, rpc_url: &str) -> anyhow::Result<U256> {
        let address_nonce_lock = self
            .nonces
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(NonceState { next_nonce: None })))
            .clone();

        let mut state = address_nonce_lock.lock().await;

        let nonce_to_use = match state.next_nonce {
            Some(nonce) => nonce,
            None => {
                let client = reqwest::Client::new();
                let result = rpc::rpc_request(
                    &client,
                    rpc_url,
                    "eth_getTransactionCount",
                    json!([format!("{:?}", address), "latest"]),
                )
                .await?;
                let nonce_hex = result
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("nonce result is not a string"))?;
                U256::from_str_radix(nonce_hex.trim_start_matches("0x"), 16)?
            }
        };

        state.next_nonce = Some(nonce_to_use + U256::one());

        Ok(nonce_to_use)
    }
}
