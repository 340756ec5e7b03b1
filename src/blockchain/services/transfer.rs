// src/blockchain/services/transfer.rs

use anyhow::{anyhow, Context, Result};
use ethers_core::abi::Token;
use ethers_core::types::{Address, TransactionRequest, U256, U64};
use ethers_signers::{LocalWallet, Signer};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::str::FromStr;

use tracing::warn;

use crate::blockchain::nonce_manager::NonceManager;
use crate::blockchain::rpc;
use crate::config::Config;

#[derive(Debug, Clone, Serialize)]
pub struct TransactionResponse {
    pub tx_hash: String,
}

/// Build an ERC-20 `transfer(address,uint256)` transaction.
pub fn erc20_transfer_tx(token: &str, to: &str, amount_raw: &str) -> Result<TransactionRequest> {
    let to_addr = Address::from_str(to).context("invalid recipient address")?;
    let amount = U256::from_dec_str(amount_raw).context("invalid transfer amount")?;
    let data = rpc::encode_call(
        "transfer(address,uint256)",
        vec![Token::Address(to_addr), Token::Uint(amount)],
    );
    let contract = Address::from_str(token).context("invalid token address")?;
    Ok(TransactionRequest::new().to(contract).data(data))
}

/// Build a native value transfer.
pub fn native_transfer_tx(to: &str, amount_wei: &str) -> Result<TransactionRequest> {
    let to_addr = Address::from_str(to).context("invalid recipient address")?;
    let amount = U256::from_dec_str(amount_wei).context("invalid transfer amount")?;
    Ok(TransactionRequest::new().to(to_addr).value(amount))
}

/// Sign and submit a transaction, filling nonce, chain id, gas, and gas
/// price from the node when the request leaves them unset. Configured
/// defaults cover the node declining to estimate.
pub async fn send_transaction(
    config: &Config,
    rpc_url: &str,
    wallet: LocalWallet,
    tx_request: TransactionRequest,
    nonce_manager: &NonceManager,
) -> Result<TransactionResponse> {
    let client = Client::new();
    let from_address = wallet.address();

    let nonce = nonce_manager.get_next_nonce(from_address, rpc_url).await?;

    let chain_id_result = rpc::rpc_request(&client, rpc_url, "eth_chainId", json!([])).await?;
    let chain_id_hex = chain_id_result
        .as_str()
        .context("failed to get chain_id from RPC")?;
    let chain_id = U64::from_str_radix(chain_id_hex.trim_start_matches("0x"), 16)?;

    let mut tx = tx_request
        .from(from_address)
        .nonce(nonce)
        .chain_id(chain_id.as_u64());

    // Estimate gas via the node when the caller did not pin it; fall back
    // to the configured default if the node declines.
    if tx.gas.is_none() {
        let call_obj = serde_json::to_value(&tx)?;
        let gas = match rpc::rpc_request(&client, rpc_url, "eth_estimateGas", json!([call_obj]))
            .await
        {
            Ok(estimate) => {
                let gas_hex = estimate.as_str().context("failed to get gas estimate")?;
                U256::from_str_radix(gas_hex.trim_start_matches("0x"), 16)?
            }
            Err(err) => {
                warn!(
                    "gas estimation failed, using default limit {}: {:#}",
                    config.default_gas_limit, err
                );
                U256::from(config.default_gas_limit)
            }
        };
        tx = tx.gas(gas);
    }

    if tx.gas_price.is_none() {
        let gas_price = match rpc::rpc_request(&client, rpc_url, "eth_gasPrice", json!([])).await {
            Ok(price) => {
                let price_hex = price.as_str().context("failed to get gasPrice")?;
                U256::from_str_radix(price_hex.trim_start_matches("0x"), 16)?
            }
            Err(err) => {
                warn!(
                    "gas price query failed, using default {}: {:#}",
                    config.default_gas_price, err
                );
                U256::from(config.default_gas_price)
            }
        };
        tx = tx.gas_price(gas_price);
    }

    let signature = wallet.sign_transaction(&tx.clone().into()).await?;
    let raw_tx = tx.rlp_signed(&signature);

    let result = rpc::rpc_request(
        &client,
        rpc_url,
        "eth_sendRawTransaction",
        json!([format!("0x{}", hex::encode(raw_tx))]),
    )
    .await?;

    let tx_hash = result
        .as_str()
        .ok_or_else(|| anyhow!("failed to extract transaction hash from response"))?;

    Ok(TransactionResponse {
        tx_hash: tx_hash.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_transfer_tx_targets_the_token_contract() {
        let tx = erc20_transfer_tx(
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "0x0000000000000000000000000000000000000001",
            "1000000",
        )
        .unwrap();
        let data = tx.data.unwrap();
        // transfer(address,uint256) selector followed by two words.
        assert_eq!(&data[..4], &hex::decode("a9059cbb").unwrap()[..]);
        assert_eq!(data.len(), 4 + 64);
    }

    #[test]
    fn native_transfer_tx_carries_the_value() {
        let tx = native_transfer_tx(
            "0x0000000000000000000000000000000000000001",
            "1500000000000000000",
        )
        .unwrap();
        assert_eq!(tx.value, Some(U256::from_dec_str("1500000000000000000").unwrap()));
        assert!(tx.data.is_none());
    }

    #[test]
    fn bad_amounts_are_rejected() {
        assert!(erc20_transfer_tx(
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "0x0000000000000000000000000000000000000001",
            "not-a-number"
        )
        .is_err());
    }
}
