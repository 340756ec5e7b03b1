//! # API Module
//!
//! HTTP handlers for the agent DeFi server.
//!
//! ## Available Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /balances/:owner?tokens=ETH,USDC` - Batched balance lookup
//! - `GET /tokens` - All cached token records
//! - `GET /tokens/:token` - Resolve one token by symbol or address
//! - `POST /rpc` - JSON-RPC endpoint for MCP tool calls (wired in main)

pub mod balance;
pub mod health;
pub mod tokens;
