//! Service layer: balances, transfers, swaps, and staking.

pub mod balance;
pub mod staking;
pub mod swap;
pub mod transfer;
