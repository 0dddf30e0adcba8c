//! Add/remove-liquidity orchestration for DLMM pools.
//!
//! Every public operation re-reads pool and position state, runs transactions
//! one at a time and resolves to a single `OperationError` on failure.

use rust_decimal::Decimal;
use serde_json::json;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer as _,
    transaction::Transaction,
};
use std::str::FromStr as _;
use std::sync::Arc;
use std::time::Duration;

use crate::amount::{base_to_ui, calculate_amounts, requested_base};
use crate::audit::AuditLog;
use crate::chain::Connection;
use crate::confirm::{
    wait_for_confirmation_gracefully, DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
use crate::errors::{DlmmError, Operation, OperationError, RetryClass};
use crate::pool::{PoolClient, PoolHandle};
use crate::resolver::{PositionPlan, PositionResolver, DEFAULT_RANGE_INTERVAL};
use crate::retry::{with_read_retry, ReadRetryConfig};
use crate::simulator::{check_preflight, simulate_add_liquidity};
use crate::types::{
    ActiveBinResult, AddLiquidityByStrategy, AddLiquidityParameters, AddLiquidityResult,
    AmountPair, ClaimFeesResult, Position, PoolParameters, RemoveLiquidityParameters,
    RemoveLiquidityRequest, RemoveLiquidityResult, Strategy, StrategyType, TokenInfo,
};
use crate::verifier::{verify_add_liquidity_token_amounts, verify_remove_liquidity};
use crate::wallet::Wallet;

pub const DLMM_PROGRAM_ID: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";
pub const FULL_REMOVAL_BPS: u16 = 10_000;
pub const DEFAULT_MAX_ADD_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub range_interval: u32,
    pub max_add_attempts: u32,
    pub confirmation_timeout: Duration,
    pub confirmation_poll_interval: Duration,
    pub read_retry: ReadRetryConfig,
    pub tx_fetch: ReadRetryConfig,
    pub dlmm_program_id: String,
    pub strategy: StrategyType,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            range_interval: DEFAULT_RANGE_INTERVAL,
            max_add_attempts: DEFAULT_MAX_ADD_ATTEMPTS,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            confirmation_poll_interval: DEFAULT_POLL_INTERVAL,
            read_retry: ReadRetryConfig::default(),
            tx_fetch: ReadRetryConfig {
                attempts: 5,
                base_delay: Duration::from_secs(1),
            },
            dlmm_program_id: DLMM_PROGRAM_ID.to_owned(),
            strategy: StrategyType::BidAskImBalanced,
        }
    }
}

fn parse_address(label: &str, s: &str) -> Result<Pubkey, DlmmError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DlmmError::Validation(format!("{label} is required")));
    }
    Pubkey::from_str(s).map_err(|e| DlmmError::Validation(format!("invalid {label} {s:?}: {e}")))
}

fn require(label: &str, s: &str) -> Result<(), DlmmError> {
    if s.trim().is_empty() {
        return Err(DlmmError::Validation(format!("{label} is required")));
    }
    Ok(())
}

/// What a single add attempt produced.
struct AddOutcome {
    position: Pubkey,
    opened_new_position: bool,
    requested: AmountPair,
    verified: [Decimal; 2],
}

pub struct DlmmEngine {
    wallet: Arc<dyn Wallet>,
    connection: Arc<dyn Connection>,
    pools: Arc<dyn PoolClient>,
    cfg: EngineConfig,
    audit: Option<AuditLog>,
}

impl DlmmEngine {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        connection: Arc<dyn Connection>,
        pools: Arc<dyn PoolClient>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            wallet,
            connection,
            pools,
            cfg,
            audit: None,
        }
    }

    #[must_use]
    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    fn resolver(&self) -> PositionResolver {
        PositionResolver::new(self.cfg.read_retry)
    }

    fn audit(&self, op: &str, pool: &Pubkey, position: Option<&Pubkey>, sig: Option<&Signature>) {
        if let Some(log) = self.audit.as_ref() {
            log.record(&json!({
              "op": op,
              "pool": pool.to_string(),
              "position": position.map(ToString::to_string),
              "signature": sig.map(ToString::to_string),
              "result": "confirmed",
            }));
        }
    }

    fn audit_failure(&self, op: Operation, pool: &str, e: &DlmmError) {
        if let Some(log) = self.audit.as_ref() {
            log.record(&json!({
              "op": op.to_string(),
              "pool": pool,
              "result": "error",
              "error_code": e.code(),
            }));
        }
    }

    fn fail(&self, op: Operation, pool: &str, e: DlmmError) -> OperationError {
        self.audit_failure(op, pool, &e);
        OperationError::new(op, e)
    }

    async fn open_pool(&self, pool: &Pubkey) -> Result<Box<dyn PoolHandle>, DlmmError> {
        with_read_retry(self.cfg.read_retry, "get pool", || self.pools.open(pool)).await
    }

    async fn confirm(&self, sig: &Signature) -> Result<(), DlmmError> {
        wait_for_confirmation_gracefully(
            self.connection.as_ref(),
            sig,
            self.cfg.confirmation_timeout,
            self.cfg.confirmation_poll_interval,
        )
        .await
        .map(|_| ())
    }

    async fn verify_requested_balance(
        &self,
        token: &TokenInfo,
        amount: Option<u64>,
    ) -> Result<(), DlmmError> {
        match amount {
            Some(v) if v > 0 => self.wallet.verify_balance(token, v).await,
            Some(_) | None => Ok(()),
        }
    }

    // ── add liquidity ─────────────────────────────────────────────────

    pub async fn add_liquidity(
        &self,
        params: &AddLiquidityParameters,
    ) -> Result<AddLiquidityResult, OperationError> {
        self.add_liquidity_inner(params)
            .await
            .map_err(|e| self.fail(Operation::AddLiquidity, &params.pool_address, e))
    }

    async fn add_liquidity_inner(
        &self,
        params: &AddLiquidityParameters,
    ) -> Result<AddLiquidityResult, DlmmError> {
        require("amount", &params.amount)?;
        require("amountB", &params.amount_b)?;
        let pool = parse_address("poolAddress", &params.pool_address)?;
        let range_interval = params.range_interval.unwrap_or(self.cfg.range_interval);
        let max_attempts = self.cfg.max_add_attempts.max(1);

        let mut last_position = String::new();
        for attempt in 1..=max_attempts {
            let outcome = self.add_attempt(&pool, params, range_interval).await?;
            let Err(e) = detect_statistical_bug(&outcome) else {
                tracing::info!(
                    pool = %pool,
                    position = %outcome.position,
                    x = %outcome.verified[0],
                    y = %outcome.verified[1],
                    "liquidity added"
                );
                return Ok(AddLiquidityResult {
                    position_address: outcome.position.to_string(),
                    liquidity_added: outcome.verified,
                });
            };
            tracing::warn!(
                attempt,
                max_attempts,
                pool = %pool,
                error = %e,
                "statistical bug detected"
            );
            // Only a position this attempt opened can be closed and retried; the
            // landed side of an extended position cannot be drained on its own.
            if !closes_before_retry(&e) {
                return Err(e);
            }
            last_position = outcome.position.to_string();
            if attempt == max_attempts {
                break;
            }
            let closed = self
                .remove_liquidity_inner(&pool, Some(outcome.position), true)
                .await?;
            tracing::info!(
                position = %outcome.position,
                removed = %closed,
                "closed position before retry"
            );
        }
        Err(DlmmError::StatisticalBugExhausted {
            attempts: max_attempts,
            position: last_position,
        })
    }

    async fn add_attempt(
        &self,
        pool_address: &Pubkey,
        params: &AddLiquidityParameters,
        range_interval: u32,
    ) -> Result<AddOutcome, DlmmError> {
        let pool = self.open_pool(pool_address).await?;
        let (token_x, token_y) = (pool.token_x(), pool.token_y());

        let req_x = requested_base(&params.amount, token_x.decimals)?;
        let req_y = requested_base(&params.amount_b, token_y.decimals)?;
        self.verify_requested_balance(&token_x, req_x).await?;
        self.verify_requested_balance(&token_y, req_y).await?;

        let owner = self.wallet.public_key();
        let active = with_read_retry(self.cfg.read_retry, "get active bin", || {
            pool.get_active_bin()
        })
        .await?;
        let plan = self
            .resolver()
            .plan(pool.as_ref(), &owner, active.bin_id, range_interval)
            .await?;

        let price = pool.from_price_per_lamport(&active.price)?;
        let amounts = calculate_amounts(
            &params.amount,
            &params.amount_b,
            &price.to_string(),
            token_x.decimals,
            token_y.decimals,
        )?;
        let range = plan.range();
        tracing::debug!(
            active_bin = active.bin_id,
            %price,
            x = amounts.x,
            y = amounts.y,
            min_bin = range.min_bin_id,
            max_bin = range.max_bin_id,
            "computed liquidity amounts"
        );
        if amounts.is_zero() {
            return Err(DlmmError::ZeroLiquidity(
                "both computed amounts are zero".into(),
            ));
        }
        if req_x.is_none() {
            self.verify_requested_balance(&token_x, Some(amounts.x)).await?;
        }
        if req_y.is_none() {
            self.verify_requested_balance(&token_y, Some(amounts.y)).await?;
        }

        let strategy = Strategy {
            min_bin_id: range.min_bin_id,
            max_bin_id: range.max_bin_id,
            strategy_type: self.cfg.strategy,
        };
        let (position, new_position_key, tx) = match plan {
            PositionPlan::Extend { position, .. } => {
                let p = AddLiquidityByStrategy {
                    position: position.public_key,
                    user: owner,
                    total_x_amount: amounts.x,
                    total_y_amount: amounts.y,
                    strategy,
                };
                let tx = pool.add_liquidity_by_strategy(&p).await?;
                (position.public_key, None, tx)
            }
            PositionPlan::Open { .. } => {
                let kp = Keypair::new();
                let p = AddLiquidityByStrategy {
                    position: kp.pubkey(),
                    user: owner,
                    total_x_amount: amounts.x,
                    total_y_amount: amounts.y,
                    strategy,
                };
                let tx = pool
                    .initialize_position_and_add_liquidity_by_strategy(&p)
                    .await?;
                (kp.pubkey(), Some(kp), tx)
            }
        };

        let simulated = simulate_add_liquidity(self.connection.as_ref(), &tx).await?;
        check_preflight(&simulated)?;

        let extra: Vec<&Keypair> = new_position_key.iter().collect();
        let sig = self.wallet.send_transaction(tx, &extra).await?;
        self.confirm(&sig).await?;
        self.audit("add_liquidity", pool_address, Some(&position), Some(&sig));

        let verified = verify_add_liquidity_token_amounts(
            self.connection.as_ref(),
            &sig,
            &token_x,
            &token_y,
            self.cfg.tx_fetch,
        )
        .await?;

        Ok(AddOutcome {
            position,
            opened_new_position: new_position_key.is_some(),
            requested: amounts,
            verified,
        })
    }

    // ── remove liquidity ──────────────────────────────────────────────

    pub async fn remove_liquidity(
        &self,
        params: &RemoveLiquidityParameters,
    ) -> Result<RemoveLiquidityResult, OperationError> {
        let run = async {
            let pool = parse_address("poolAddress", &params.pool_address)?;
            let position = params
                .position_address
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_address("positionAddress", s))
                .transpose()?;
            let close = params.should_close_position.unwrap_or(true);
            self.remove_liquidity_inner(&pool, position, close).await
        };
        run.await
            .map_err(|e| self.fail(Operation::RemoveLiquidity, &params.pool_address, e))
    }

    async fn locate_position(
        &self,
        pool: &dyn PoolHandle,
        position: Option<Pubkey>,
    ) -> Result<Position, DlmmError> {
        let no_position = || DlmmError::NoPosition {
            pool: pool.address().to_string(),
        };
        match position {
            None => self
                .resolver()
                .first_position(pool, &self.wallet.public_key())
                .await?
                .ok_or_else(no_position),
            Some(pk) => with_read_retry(self.cfg.read_retry, "get position", || {
                pool.get_position(&pk)
            })
            .await?
            .ok_or_else(no_position),
        }
    }

    async fn remove_liquidity_inner(
        &self,
        pool_address: &Pubkey,
        position: Option<Pubkey>,
        should_claim_and_close: bool,
    ) -> Result<RemoveLiquidityResult, DlmmError> {
        let pool = self.open_pool(pool_address).await?;
        let position = self.locate_position(pool.as_ref(), position).await?;
        let req = RemoveLiquidityRequest {
            position: position.public_key,
            user: self.wallet.public_key(),
            bin_ids: position.bin_ids(),
            bps: FULL_REMOVAL_BPS,
            should_claim_and_close,
        };
        let txs = pool.remove_liquidity(&req).await?;
        if txs.is_empty() {
            return Err(DlmmError::protocol(
                "build remove liquidity transaction",
                "no transactions returned",
            ));
        }

        let (token_x, token_y) = (pool.token_x(), pool.token_y());
        let total_txs = txs.len();
        let mut total = RemoveLiquidityResult::default();
        for (completed, tx) in txs.into_iter().enumerate() {
            let step = self
                .submit_removal(
                    tx,
                    pool_address,
                    &position.public_key,
                    (&token_x, &token_y),
                    should_claim_and_close,
                )
                .await;
            match step {
                Ok(r) => total.accumulate(&r),
                Err(e) if completed > 0 => {
                    return Err(DlmmError::PartialRemoval {
                        completed,
                        total: total_txs,
                        partial: total,
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(
            pool = %pool_address,
            position = %position.public_key,
            result = %total,
            "liquidity removed"
        );
        Ok(total)
    }

    async fn submit_removal(
        &self,
        tx: Transaction,
        pool: &Pubkey,
        position: &Pubkey,
        (token_x, token_y): (&TokenInfo, &TokenInfo),
        expect_fee_claim: bool,
    ) -> Result<RemoveLiquidityResult, DlmmError> {
        let sig = self.wallet.send_transaction(tx, &[]).await?;
        self.confirm(&sig).await?;
        self.audit("remove_liquidity", pool, Some(position), Some(&sig));
        verify_remove_liquidity(
            self.connection.as_ref(),
            &sig,
            &self.cfg.dlmm_program_id,
            token_x,
            token_y,
            expect_fee_claim,
            self.cfg.tx_fetch,
        )
        .await
    }

    // ── fees and reads ────────────────────────────────────────────────

    pub async fn claim_fees(
        &self,
        params: &PoolParameters,
    ) -> Result<ClaimFeesResult, OperationError> {
        self.claim_fees_inner(params)
            .await
            .map_err(|e| self.fail(Operation::ClaimFees, &params.pool_address, e))
    }

    async fn claim_fees_inner(&self, params: &PoolParameters) -> Result<ClaimFeesResult, DlmmError> {
        let pool_address = parse_address("poolAddress", &params.pool_address)?;
        let pool = self.open_pool(&pool_address).await?;
        let owner = self.wallet.public_key();
        let before = self.locate_position(pool.as_ref(), None).await?;

        let txs = pool.claim_swap_fee(&owner, &before.public_key).await?;
        if txs.is_empty() {
            return Err(DlmmError::protocol(
                "build claim fee transaction",
                "no transactions returned",
            ));
        }
        let mut signatures = Vec::with_capacity(txs.len());
        for tx in txs {
            let sig = self.wallet.send_transaction(tx, &[]).await?;
            self.confirm(&sig).await?;
            self.audit("claim_fees", &pool_address, Some(&before.public_key), Some(&sig));
            signatures.push(sig.to_string());
        }

        let after = with_read_retry(self.cfg.read_retry, "get position", || {
            pool.get_position(&before.public_key)
        })
        .await?;
        let (after_x, after_y) = after.map_or((0, 0), |p| (p.fee_x, p.fee_y));
        let (token_x, token_y) = (pool.token_x(), pool.token_y());
        let fees_claimed = [
            base_to_ui(before.fee_x.saturating_sub(after_x), token_x.decimals)?,
            base_to_ui(before.fee_y.saturating_sub(after_y), token_y.decimals)?,
        ];
        tracing::info!(
            pool = %pool_address,
            position = %before.public_key,
            fee_x = %fees_claimed[0],
            fee_y = %fees_claimed[1],
            "fees claimed"
        );
        Ok(ClaimFeesResult {
            position_address: before.public_key.to_string(),
            signatures,
            fees_claimed,
        })
    }

    pub async fn get_active_bin(
        &self,
        params: &PoolParameters,
    ) -> Result<ActiveBinResult, OperationError> {
        let run = async {
            let pool_address = parse_address("poolAddress", &params.pool_address)?;
            let pool = self.open_pool(&pool_address).await?;
            let active = with_read_retry(self.cfg.read_retry, "get active bin", || {
                pool.get_active_bin()
            })
            .await?;
            let per_token = pool.from_price_per_lamport(&active.price)?;
            Ok::<_, DlmmError>(ActiveBinResult {
                bin_id: active.bin_id,
                price: active.price,
                price_per_token: per_token.to_string(),
            })
        };
        run.await
            .map_err(|e| OperationError::new(Operation::GetActiveBin, e))
    }

    pub async fn get_positions_from_pool(
        &self,
        params: &PoolParameters,
    ) -> Result<Vec<Position>, OperationError> {
        let run = async {
            let pool_address = parse_address("poolAddress", &params.pool_address)?;
            let pool = self.open_pool(&pool_address).await?;
            self.resolver()
                .positions(pool.as_ref(), &self.wallet.public_key())
                .await
        };
        run.await
            .map_err(|e| OperationError::new(Operation::GetPositions, e))
    }
}

fn closes_before_retry(e: &DlmmError) -> bool {
    e.retry_class() == RetryClass::StatisticalBug
        && matches!(
            e,
            DlmmError::StatisticalBug {
                opened_new_position: true,
                ..
            }
        )
}

/// A side that was asked to move a positive amount but verifiably moved nothing.
fn detect_statistical_bug(outcome: &AddOutcome) -> Result<(), DlmmError> {
    let [vx, vy] = outcome.verified;
    let AmountPair { x, y } = outcome.requested;
    if (x > 0 && vx.is_zero()) || (y > 0 && vy.is_zero()) {
        return Err(DlmmError::StatisticalBug {
            position: outcome.position.to_string(),
            opened_new_position: outcome.opened_new_position,
            requested_x: x,
            requested_y: y,
            verified_x: vx,
            verified_y: vy,
        });
    }
    Ok(())
}
