//! # MCP Handler Module
//!
//! Implements the Model Context Protocol dispatch for the agent DeFi server:
//! incoming JSON-RPC requests are routed to the wallet, token, swap, and
//! staking tools.
//!
//! ## Supported Tools
//!
//! ### Wallet
//! - `get_balances` - Batched token balance lookup with per-token fallback
//! - `transfer_token` - Send native or ERC-20 value from the server wallet
//!
//! ### Tokens
//! - `get_token_info` - Resolve symbol/address to full token metadata
//! - `resolve_token` - Resolve symbol/address to a normalized address
//! - `clear_token_cache` - Drop dynamically cached token records
//!
//! ### Swaps
//! - `get_swap_quote` - Price a swap through the liquidity aggregator
//! - `execute_swap` - Quote, build, sign, and submit a swap
//!
//! ### Staking
//! - `get_staking_pools` - List pools known to the staking aggregator
//! - `get_staking_positions` - Read an account's staking positions
//! - `unstake` - Withdraw staked tokens from a pool
//! - `claim_rewards` - Claim accrued rewards from a pool

use crate::{
    blockchain::services::{balance, staking, swap, transfer},
    mcp::protocol::{error_codes, Request, Response},
    token::{normalize_address, NATIVE_TOKEN_ADDRESS},
    utils, AppState,
};
use ethers_signers::{LocalWallet, Signer};
use reqwest::Client;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::info;

// Helper: produce a result Value that always contains a text content array
// and preserves structured data for JSON-friendly clients.
fn make_texty_result(text: String, payload: Value) -> Value {
    let content = json!([{ "type": "text", "text": text }]);
    match payload {
        Value::Object(mut map) => {
            if !map.contains_key("content") {
                map.insert("content".into(), content);
            }
            Value::Object(map)
        }
        other => json!({
            "data": other,
            "content": content
        }),
    }
}

fn require_rpc_url(state: &AppState, req_id: &Value) -> Result<String, Response> {
    state.config.rpc_url.clone().ok_or_else(|| {
        Response::invalid_params(req_id, "RPC_URL is not configured on the server")
    })
}

fn require_wallet(state: &AppState, req_id: &Value) -> Result<LocalWallet, Response> {
    let key = state.config.tx_private_key.as_deref().ok_or_else(|| {
        Response::invalid_params(req_id, "TX_PRIVATE_KEY is not configured on the server")
    })?;
    LocalWallet::from_str(key)
        .map_err(|e| Response::internal_error(req_id, format!("invalid server wallet key: {}", e)))
}

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, state).await,
        // Convenience aliases to support direct method calls from CLI
        // They are rewritten into tools/call internally to reuse the same logic
        "get_balances"
        | "get_token_info"
        | "resolve_token"
        | "get_swap_quote"
        | "get_staking_pools"
        | "get_staking_positions" => {
            let name = req.method.clone();
            let wrapped = Request {
                jsonrpc: req.jsonrpc.clone(),
                id: req.id.clone(),
                method: "tools/call".to_string(),
                params: Some(json!({
                    "name": name,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            };
            handle_tool_call(wrapped, state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the correct tool logic.
async fn handle_tool_call(req: Request, state: AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::invalid_params(&req.id, "Missing 'params' object");
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name.to_string(),
        None => {
            return Response::invalid_params(&req.id, "Missing 'name' field in params");
        }
    };

    let empty_args = json!({});
    let args = params.get("arguments").unwrap_or(&empty_args);
    let req_id = &req.id;

    match tool_name.as_str() {
        "get_balances" => {
            let res: Result<Response, Response> = async {
                let owner = utils::get_required_arg::<String>(args, "owner", req_id)?;
                let tokens = utils::get_required_arg::<Vec<String>>(args, "tokens", req_id)?;
                let rpc_url = require_rpc_url(&state, req_id)?;

                let client = Client::new();
                let result = balance::get_token_balances(
                    &state.tokens,
                    &client,
                    &rpc_url,
                    &owner,
                    &tokens,
                )
                .await
                .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;

                let lines: Vec<String> = result
                    .balances
                    .iter()
                    .map(|row| {
                        let label = row.symbol.as_deref().unwrap_or(&row.token);
                        match row.decimals {
                            Some(decimals) => format!(
                                "{}: {}",
                                label,
                                utils::format_units(&row.raw_balance, decimals)
                            ),
                            None => format!("{}: {} (raw)", label, row.raw_balance),
                        }
                    })
                    .collect();
                let summary = format!(
                    "Balances for {} via {}: {}",
                    result.owner,
                    result.method,
                    lines.join(", ")
                );
                let payload = serde_json::to_value(&result)
                    .map_err(|e| Response::internal_error(req_id, e))?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, payload),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "transfer_token" => {
            let res: Result<Response, Response> = async {
                let token = utils::get_required_arg::<String>(args, "token", req_id)?;
                let to = utils::get_required_arg::<String>(args, "to", req_id)?;
                let amount = utils::get_required_arg::<String>(args, "amount", req_id)?;
                let rpc_url = require_rpc_url(&state, req_id)?;
                let wallet = require_wallet(&state, req_id)?;

                let token_addr = state
                    .tokens
                    .resolve_symbol_async(&token)
                    .await
                    .map_err(|e| Response::invalid_params(req_id, e))?;
                let to_addr = normalize_address(&to)
                    .map_err(|e| Response::invalid_params(req_id, e))?;

                let tx_request = if token_addr == NATIVE_TOKEN_ADDRESS {
                    transfer::native_transfer_tx(&to_addr, &amount)
                } else {
                    transfer::erc20_transfer_tx(&token_addr, &to_addr, &amount)
                }
                .map_err(|e| Response::invalid_params(req_id, format!("{:#}", e)))?;

                let receipt =
                    transfer::send_transaction(&state.config, &rpc_url, wallet, tx_request, &state.nonce_manager)
                        .await
                        .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;

                let summary = format!("Sent {} {} to {}: {}", amount, token, to_addr, receipt.tx_hash);
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, json!({ "txHash": receipt.tx_hash })),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "get_token_info" => {
            let res: Result<Response, Response> = async {
                let token = utils::get_required_arg::<String>(args, "token", req_id)?;
                let record = if crate::token::is_address_like(&token) {
                    state.tokens.get_token_by_address(&token).await
                } else {
                    state.tokens.get_token_by_symbol(&token).await
                }
                .map_err(|e| Response::internal_error(req_id, e))?;

                let summary = format!(
                    "{} ({}) at {} with {} decimals{}",
                    record.symbol,
                    record.name,
                    record.address,
                    record.decimals,
                    if record.is_static { " [trusted]" } else { "" }
                );
                let payload = serde_json::to_value(&record)
                    .map_err(|e| Response::internal_error(req_id, e))?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, payload),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "resolve_token" => {
            let res: Result<Response, Response> = async {
                let token = utils::get_required_arg::<String>(args, "token", req_id)?;
                let address = state
                    .tokens
                    .resolve_symbol_async(&token)
                    .await
                    .map_err(|e| Response::invalid_params(req_id, e))?;
                let summary = format!("{} resolves to {}", token, address);
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, json!({ "token": token, "address": address })),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "clear_token_cache" => {
            let before = state.tokens.cache_size();
            state.tokens.clear_dynamic_cache();
            let after = state.tokens.cache_size();
            let summary = format!(
                "Cleared {} dynamic token records ({} static remain)",
                before - after,
                after
            );
            Response::success(
                req_id.clone(),
                make_texty_result(summary, json!({ "removed": before - after, "cacheSize": after })),
            )
        }
        "get_swap_quote" => {
            let res: Result<Response, Response> = async {
                let sell = utils::get_required_arg::<String>(args, "sell_token", req_id)?;
                let buy = utils::get_required_arg::<String>(args, "buy_token", req_id)?;
                let amount = utils::get_required_arg::<String>(args, "sell_amount", req_id)?;

                let sell_addr = state
                    .tokens
                    .resolve_symbol_async(&sell)
                    .await
                    .map_err(|e| Response::invalid_params(req_id, e))?;
                let buy_addr = state
                    .tokens
                    .resolve_symbol_async(&buy)
                    .await
                    .map_err(|e| Response::invalid_params(req_id, e))?;

                let client = Client::new();
                let quote = swap::get_quote(
                    &client,
                    &state.config.aggregator_api_url,
                    &sell_addr,
                    &buy_addr,
                    &amount,
                    None,
                )
                .await
                .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;

                let buy_display = match state.tokens.get_decimals(&buy_addr) {
                    Some(decimals) => utils::format_units(&quote.buy_amount, decimals),
                    None => format!("{} (raw)", quote.buy_amount),
                };
                let summary = format!(
                    "Swapping {} {} yields {} {} (quote {})",
                    amount, sell, buy_display, buy, quote.quote_id
                );
                let payload = serde_json::to_value(&quote)
                    .map_err(|e| Response::internal_error(req_id, e))?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, payload),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "execute_swap" => {
            let res: Result<Response, Response> = async {
                let sell = utils::get_required_arg::<String>(args, "sell_token", req_id)?;
                let buy = utils::get_required_arg::<String>(args, "buy_token", req_id)?;
                let amount = utils::get_required_arg::<String>(args, "sell_amount", req_id)?;
                let slippage_bps = args
                    .get("slippage_bps")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(50) as u32;
                let rpc_url = require_rpc_url(&state, req_id)?;
                let wallet = require_wallet(&state, req_id)?;

                let sell_addr = state
                    .tokens
                    .resolve_symbol_async(&sell)
                    .await
                    .map_err(|e| Response::invalid_params(req_id, e))?;
                let buy_addr = state
                    .tokens
                    .resolve_symbol_async(&buy)
                    .await
                    .map_err(|e| Response::invalid_params(req_id, e))?;

                let taker = format!("{:?}", wallet.address());
                let client = Client::new();
                let quote = swap::get_quote(
                    &client,
                    &state.config.aggregator_api_url,
                    &sell_addr,
                    &buy_addr,
                    &amount,
                    Some(&taker),
                )
                .await
                .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;
                let calldata = swap::build_swap(
                    &client,
                    &state.config.aggregator_api_url,
                    &quote.quote_id,
                    &taker,
                    slippage_bps,
                )
                .await
                .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;

                let tx_request = swap::swap_tx(&calldata)
                    .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;
                let receipt =
                    transfer::send_transaction(&state.config, &rpc_url, wallet, tx_request, &state.nonce_manager)
                        .await
                        .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;

                let summary = format!(
                    "Swapped {} {} for {} (max slippage {} bps): {}",
                    amount, sell, buy, slippage_bps, receipt.tx_hash
                );
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(
                        summary,
                        json!({ "txHash": receipt.tx_hash, "quote": quote }),
                    ),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "get_staking_pools" => {
            let res: Result<Response, Response> = async {
                let client = Client::new();
                let pools = staking::get_pools(&client, &state.config.staking_api_url)
                    .await
                    .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;
                let summary = format!("{} staking pools available", pools.len());
                let payload = serde_json::to_value(&pools)
                    .map_err(|e| Response::internal_error(req_id, e))?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, json!({ "pools": payload })),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "get_staking_positions" => {
            let res: Result<Response, Response> = async {
                let owner = utils::get_required_arg::<String>(args, "owner", req_id)?;
                let owner_addr = normalize_address(&owner)
                    .map_err(|e| Response::invalid_params(req_id, e))?;
                let client = Client::new();
                let positions =
                    staking::get_positions(&client, &state.config.staking_api_url, &owner_addr)
                        .await
                        .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;
                let summary = format!(
                    "{} staking positions for {}",
                    positions.len(),
                    owner_addr
                );
                let payload = serde_json::to_value(&positions)
                    .map_err(|e| Response::internal_error(req_id, e))?;
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, json!({ "positions": payload })),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "unstake" => {
            let res: Result<Response, Response> = async {
                let pool = utils::get_required_arg::<String>(args, "pool", req_id)?;
                let amount = utils::get_required_arg::<String>(args, "amount", req_id)?;
                let rpc_url = require_rpc_url(&state, req_id)?;
                let wallet = require_wallet(&state, req_id)?;

                let pool_addr = normalize_address(&pool)
                    .map_err(|e| Response::invalid_params(req_id, e))?;
                let tx_request = staking::unstake_tx(&pool_addr, &amount)
                    .map_err(|e| Response::invalid_params(req_id, format!("{:#}", e)))?;
                let receipt =
                    transfer::send_transaction(&state.config, &rpc_url, wallet, tx_request, &state.nonce_manager)
                        .await
                        .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;

                let summary = format!("Unstaked {} from {}: {}", amount, pool_addr, receipt.tx_hash);
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, json!({ "txHash": receipt.tx_hash })),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        "claim_rewards" => {
            let res: Result<Response, Response> = async {
                let pool = utils::get_required_arg::<String>(args, "pool", req_id)?;
                let rpc_url = require_rpc_url(&state, req_id)?;
                let wallet = require_wallet(&state, req_id)?;

                let pool_addr = normalize_address(&pool)
                    .map_err(|e| Response::invalid_params(req_id, e))?;
                let tx_request = staking::claim_tx(&pool_addr)
                    .map_err(|e| Response::invalid_params(req_id, format!("{:#}", e)))?;
                let receipt =
                    transfer::send_transaction(&state.config, &rpc_url, wallet, tx_request, &state.nonce_manager)
                        .await
                        .map_err(|e| Response::internal_error(req_id, format!("{:#}", e)))?;

                let summary = format!("Claimed rewards from {}: {}", pool_addr, receipt.tx_hash);
                Ok(Response::success(
                    req_id.clone(),
                    make_texty_result(summary, json!({ "txHash": receipt.tx_hash })),
                ))
            }
            .await;
            res.unwrap_or_else(|err_resp| err_resp)
        }
        unknown => Response::error(
            req.id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("Unknown tool: {}", unknown),
        ),
    }
}

fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "agent_defi_mcp",
        "version": "0.1.0"
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions =
        "DeFi MCP server for token balances, transfers, swaps, and staking. Token inputs accept symbols (ETH, USDC) or 0x addresses.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

/// Handles the 'tools/list' request by returning a JSON definition of all available tools.
fn handle_tools_list(req: &Request) -> Response {
    let tools = json!([
        {
            "name": "get_balances",
            "description": "Get token balances for an address. Accepts symbols or 0x addresses; duplicates are preserved.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "owner": {"type": "string", "description": "The 0x... address to check."},
                    "tokens": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Token symbols or addresses, e.g. [\"ETH\", \"USDC\"]."
                    }
                },
                "required": ["owner", "tokens"],
                "additionalProperties": false
            }
        },
        {
            "name": "transfer_token",
            "description": "Transfer native or ERC-20 value from the server wallet. Amount is in raw units.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "token": {"type": "string", "description": "Token symbol or address; ETH sends native value."},
                    "to": {"type": "string", "description": "Recipient 0x address."},
                    "amount": {"type": "string", "description": "Amount in raw units (decimal string)."}
                },
                "required": ["token", "to", "amount"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_token_info",
            "description": "Get metadata (address, name, decimals) for a token symbol or address.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "token": {"type": "string", "description": "Token symbol or 0x address."}
                },
                "required": ["token"],
                "additionalProperties": false
            }
        },
        {
            "name": "resolve_token",
            "description": "Resolve a token symbol or address to its normalized contract address.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "token": {"type": "string", "description": "Token symbol or 0x address."}
                },
                "required": ["token"],
                "additionalProperties": false
            }
        },
        {
            "name": "clear_token_cache",
            "description": "Clear dynamically cached token records. Built-in tokens are unaffected.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "get_swap_quote",
            "description": "Price a token swap through the liquidity aggregator without executing it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sell_token": {"type": "string", "description": "Token to sell (symbol or address)."},
                    "buy_token": {"type": "string", "description": "Token to buy (symbol or address)."},
                    "sell_amount": {"type": "string", "description": "Sell amount in raw units."}
                },
                "required": ["sell_token", "buy_token", "sell_amount"],
                "additionalProperties": false
            }
        },
        {
            "name": "execute_swap",
            "description": "Quote, build, sign, and submit a token swap from the server wallet.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sell_token": {"type": "string", "description": "Token to sell (symbol or address)."},
                    "buy_token": {"type": "string", "description": "Token to buy (symbol or address)."},
                    "sell_amount": {"type": "string", "description": "Sell amount in raw units."},
                    "slippage_bps": {"type": "number", "description": "Max slippage in basis points (default 50)."}
                },
                "required": ["sell_token", "buy_token", "sell_amount"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_staking_pools",
            "description": "List staking pools known to the staking aggregator.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "get_staking_positions",
            "description": "Get an address's staking positions (staked amounts and pending rewards).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "owner": {"type": "string", "description": "The 0x... address to check."}
                },
                "required": ["owner"],
                "additionalProperties": false
            }
        },
        {
            "name": "unstake",
            "description": "Withdraw staked tokens from a pool. Amount is in raw units.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pool": {"type": "string", "description": "Pool contract 0x address."},
                    "amount": {"type": "string", "description": "Amount to withdraw in raw units."}
                },
                "required": ["pool", "amount"],
                "additionalProperties": false
            }
        },
        {
            "name": "claim_rewards",
            "description": "Claim accrued staking rewards from a pool.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pool": {"type": "string", "description": "Pool contract 0x address."}
                },
                "required": ["pool"],
                "additionalProperties": false
            }
        }
    ]);

    Response::success(req.id.clone(), json!({ "tools": tools }))
}
