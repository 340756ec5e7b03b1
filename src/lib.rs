// src/lib.rs

use std::sync::Arc;

// Re-export commonly used types
pub use ethers_core::types::{Address, H256, U256, U64};

// Re-export modules
pub mod api;
pub mod blockchain;
pub mod config;
pub mod mcp;
pub mod token;
pub mod utils;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// Shared token resolution service
    pub tokens: Arc<token::TokenService>,
    /// Manages transaction nonces
    pub nonce_manager: blockchain::nonce_manager::NonceManager,
}
