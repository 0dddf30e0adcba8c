use solana_sdk::pubkey::Pubkey;

use crate::errors::DlmmError;
use crate::pool::PoolHandle;
use crate::retry::{with_read_retry, ReadRetryConfig};
use crate::types::{BinRange, Position};

pub const DEFAULT_RANGE_INTERVAL: u32 = 10;

/// Where the next add-liquidity goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionPlan {
    /// Add to the caller's existing position, over its current bin span.
    Extend { position: Position, range: BinRange },
    /// Open a new position centred on the active bin.
    Open { range: BinRange },
}

impl PositionPlan {
    pub const fn range(&self) -> BinRange {
        match self {
            Self::Extend { range, .. } | Self::Open { range } => *range,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PositionResolver {
    retry: ReadRetryConfig,
}

impl PositionResolver {
    pub const fn new(retry: ReadRetryConfig) -> Self {
        Self { retry }
    }

    pub async fn positions(
        &self,
        pool: &dyn PoolHandle,
        owner: &Pubkey,
    ) -> Result<Vec<Position>, DlmmError> {
        with_read_retry(self.retry, "get positions", || pool.get_positions_by_user(owner)).await
    }

    /// The caller's first position in the pool, if any.
    pub async fn first_position(
        &self,
        pool: &dyn PoolHandle,
        owner: &Pubkey,
    ) -> Result<Option<Position>, DlmmError> {
        Ok(self.positions(pool, owner).await?.into_iter().next())
    }

    pub async fn plan(
        &self,
        pool: &dyn PoolHandle,
        owner: &Pubkey,
        active_bin_id: i32,
        range_interval: u32,
    ) -> Result<PositionPlan, DlmmError> {
        match self.first_position(pool, owner).await? {
            Some(position) => {
                let range = BinRange::spanning(&position.bin_data).ok_or_else(|| {
                    DlmmError::Decode(format!("position {} has no bins", position.public_key))
                })?;
                Ok(PositionPlan::Extend { position, range })
            }
            None => Ok(PositionPlan::Open {
                range: BinRange::around(active_bin_id, range_interval),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{position, FakePool};

    #[tokio::test]
    async fn new_position_is_centred_on_active_bin() -> eyre::Result<()> {
        let pool = FakePool::new(9, 6, 100, "1");
        let owner = Pubkey::new_unique();
        let plan = PositionResolver::new(ReadRetryConfig::default())
            .plan(&pool.handle(), &owner, 100, DEFAULT_RANGE_INTERVAL)
            .await?;
        assert_eq!(
            plan,
            PositionPlan::Open {
                range: BinRange {
                    min_bin_id: 90,
                    max_bin_id: 110
                }
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn existing_position_keeps_its_range() -> eyre::Result<()> {
        let pool = FakePool::new(9, 6, 100, "1");
        let owner = Pubkey::new_unique();
        pool.insert_position(position(pool.address(), &[120, 118, 125], 0, 0));
        let plan = PositionResolver::new(ReadRetryConfig::default())
            .plan(&pool.handle(), &owner, 100, 3)
            .await?;
        assert!(
            matches!(plan, PositionPlan::Extend { range: BinRange { min_bin_id: 118, max_bin_id: 125 }, .. }),
            "got {plan:?}"
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn transient_position_reads_are_retried() -> eyre::Result<()> {
        let pool = FakePool::new(9, 6, 100, "1");
        pool.fail_position_reads(2);
        let found = PositionResolver::new(ReadRetryConfig::default())
            .first_position(&pool.handle(), &Pubkey::new_unique())
            .await?;
        assert!(found.is_none(), "no positions yet");
        assert_eq!(pool.calls_of("get_positions"), 3);
        Ok(())
    }
}
