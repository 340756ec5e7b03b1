// src/blockchain/mod.rs

pub mod nonce_manager;
pub mod rpc;
pub mod services;

// Re-export commonly used types
pub use ethers_core::types::{Address, H256, U256, U64};
