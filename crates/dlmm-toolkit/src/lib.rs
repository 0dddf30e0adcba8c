#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

//! Meteora DLMM liquidity engine: amount calculation, pre-flight simulation,
//! post-flight verification and statistical-bug retries, behind trait seams
//! for the wallet, the chain connection and the pool client.

pub mod adapter;
pub mod amount;
pub mod audit;
pub mod chain;
pub mod config;
pub mod confirm;
pub mod context;
pub mod decode;
pub mod engine;
pub mod errors;
pub mod fsutil;
pub mod meteora_api;
pub mod paths;
pub mod pool;
pub mod resolver;
pub mod retry;
pub mod rpc;
pub mod simulator;
pub mod store;
pub mod types;
pub mod verifier;
pub mod wallet;

#[cfg(test)]
mod testing;
