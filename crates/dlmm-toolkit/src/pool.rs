//! The DLMM pool client the engine builds transactions with.

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::{pubkey::Pubkey, transaction::Transaction};

use crate::amount::price_per_token;
use crate::errors::DlmmError;
use crate::types::{
    ActiveBin, AddLiquidityByStrategy, Position, RemoveLiquidityRequest, TokenInfo,
};

#[async_trait]
pub trait PoolClient: Send + Sync {
    /// Snapshot a pool. Handles are not cached; every operation opens a fresh one.
    async fn open(&self, pool: &Pubkey) -> Result<Box<dyn PoolHandle>, DlmmError>;
}

#[async_trait]
pub trait PoolHandle: Send + Sync {
    fn address(&self) -> Pubkey;
    fn token_x(&self) -> TokenInfo;
    fn token_y(&self) -> TokenInfo;

    async fn get_active_bin(&self) -> Result<ActiveBin, DlmmError>;

    /// Per-token price (Y per X) from a per-lamport price.
    fn from_price_per_lamport(&self, price: &str) -> Result<Decimal, DlmmError> {
        price_per_token(price, self.token_x().decimals, self.token_y().decimals)
    }

    async fn get_positions_by_user(&self, user: &Pubkey) -> Result<Vec<Position>, DlmmError>;

    /// `Ok(None)` when the position account does not exist (e.g. closed).
    async fn get_position(&self, position: &Pubkey) -> Result<Option<Position>, DlmmError>;

    async fn initialize_position_and_add_liquidity_by_strategy(
        &self,
        params: &AddLiquidityByStrategy,
    ) -> Result<Transaction, DlmmError>;

    async fn add_liquidity_by_strategy(
        &self,
        params: &AddLiquidityByStrategy,
    ) -> Result<Transaction, DlmmError>;

    /// One or more transactions, to be submitted in order.
    async fn remove_liquidity(
        &self,
        req: &RemoveLiquidityRequest,
    ) -> Result<Vec<Transaction>, DlmmError>;

    async fn claim_swap_fee(
        &self,
        owner: &Pubkey,
        position: &Pubkey,
    ) -> Result<Vec<Transaction>, DlmmError>;
}
