//! In-memory chain, wallet and pool doubles for unit tests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::chain::Connection;
use crate::decode::fixtures::transfer;
use crate::decode::{
    InnerInstructions, ParsedEnvelope, ParsedInstruction, ParsedMessage, ParsedTransaction,
    SignatureStatus, SimulationResponse, TransactionMeta,
};
use crate::errors::{DlmmError, FailureClass};
use crate::pool::{PoolClient, PoolHandle};
use crate::types::{
    ActiveBin, AddLiquidityByStrategy, Position, PositionBin, RemoveLiquidityRequest, TokenInfo,
};
use crate::wallet::{insufficient_balance, Wallet};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn from_json<T: DeserializeOwned>(v: Value) -> Result<T, DlmmError> {
    serde_json::from_value(v).map_err(|e| DlmmError::Decode(e.to_string()))
}

/// The tag a fake-built transaction carries in its first instruction.
pub fn tag_of(tx: &Transaction) -> String {
    tx.message
        .instructions
        .first()
        .map(|ix| String::from_utf8_lossy(&ix.data).into_owned())
        .unwrap_or_default()
}

fn tagged_tx(payer: &Pubkey, tag: &str) -> Transaction {
    let ix = Instruction::new_with_bytes(Pubkey::new_unique(), tag.as_bytes(), vec![]);
    Transaction::new_with_payer(&[ix], Some(payer))
}

pub fn position(pool: Pubkey, bins: &[i32], fee_x: u64, fee_y: u64) -> Position {
    Position {
        public_key: Pubkey::new_unique(),
        lb_pair: pool,
        bin_data: bins
            .iter()
            .map(|&bin_id| PositionBin {
                bin_id,
                position_x_amount: "0".into(),
                position_y_amount: "0".into(),
            })
            .collect(),
        fee_x,
        fee_y,
    }
}

// ── parsed records ────────────────────────────────────────────────────

fn transfer_ix(token: &TokenInfo, amount: u64) -> ParsedInstruction {
    let v = transfer(&token.mint.to_string(), amount, token.decimals);
    ParsedInstruction {
        program: Some("spl-token".into()),
        program_id: Some(spl_token::ID.to_string()),
        parsed: v.get("parsed").cloned(),
    }
}

fn outer_ix(program_id: &str) -> ParsedInstruction {
    ParsedInstruction {
        program: None,
        program_id: Some(program_id.to_owned()),
        parsed: None,
    }
}

fn record(outer: Vec<ParsedInstruction>, inner: Vec<InnerInstructions>) -> ParsedTransaction {
    ParsedTransaction {
        transaction: ParsedEnvelope {
            message: ParsedMessage {
                instructions: outer,
            },
        },
        meta: Some(TransactionMeta {
            err: None,
            inner_instructions: Some(inner),
        }),
    }
}

/// A confirmed add-liquidity record that moved `x` and `y` base units.
pub fn add_record(tx: &TokenInfo, ty: &TokenInfo, x: u64, y: u64) -> ParsedTransaction {
    record(
        vec![outer_ix("LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo")],
        vec![InnerInstructions {
            index: 0,
            instructions: vec![transfer_ix(tx, x), transfer_ix(ty, y)],
        }],
    )
}

/// A remove-and-claim record: removal transfers under the first DLMM
/// instruction, fee transfers under the second.
pub fn removal_record(
    program_id: &str,
    tx: &TokenInfo,
    ty: &TokenInfo,
    liquidity: (u64, u64),
    fees: (u64, u64),
) -> ParsedTransaction {
    record(
        vec![outer_ix(program_id), outer_ix(program_id)],
        vec![
            InnerInstructions {
                index: 0,
                instructions: vec![transfer_ix(tx, liquidity.0), transfer_ix(ty, liquidity.1)],
            },
            InnerInstructions {
                index: 1,
                instructions: vec![transfer_ix(tx, fees.0), transfer_ix(ty, fees.1)],
            },
        ],
    )
}

pub fn simulation(tx: &TokenInfo, ty: &TokenInfo, x: u64, y: u64) -> SimulationResponse {
    SimulationResponse {
        err: None,
        logs: Some(vec!["Program log: Instruction: AddLiquidityByStrategy".into()]),
        inner_instructions: Some(vec![InnerInstructions {
            index: 0,
            instructions: vec![transfer_ix(tx, x), transfer_ix(ty, y)],
        }]),
    }
}

// ── chain + wallet ────────────────────────────────────────────────────

type SimulateFn = Box<dyn Fn(&Transaction) -> Result<SimulationResponse, DlmmError> + Send + Sync>;
type LookupFn =
    Box<dyn Fn(Option<&Transaction>) -> Result<Option<ParsedTransaction>, DlmmError> + Send + Sync>;

struct Sent {
    signature: Signature,
    tx: Transaction,
    extra_signers: usize,
}

#[derive(Default)]
struct ChainState {
    sent: Vec<Sent>,
    statuses: VecDeque<Option<SignatureStatus>>,
    balances: HashMap<Pubkey, u64>,
    fetches: usize,
    status_calls: usize,
    simulations: usize,
}

/// Records submissions and answers reads from closures.
///
/// Signature statuses are served from a queue whose last entry repeats; with
/// nothing queued every signature reads as confirmed. Balances default to
/// unlimited.
pub struct FakeChain {
    owner: Pubkey,
    state: Mutex<ChainState>,
    simulate: SimulateFn,
    lookup: LookupFn,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            owner: Pubkey::new_unique(),
            state: Mutex::new(ChainState::default()),
            simulate: Box::new(|_| Ok(SimulationResponse::default())),
            lookup: Box::new(|_| Ok(None)),
        }
    }
}

impl FakeChain {
    #[must_use]
    pub fn with_simulation(
        mut self,
        f: impl Fn(&Transaction) -> Result<SimulationResponse, DlmmError> + Send + Sync + 'static,
    ) -> Self {
        self.simulate = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_transaction_lookup(
        mut self,
        f: impl Fn(Option<&Transaction>) -> Result<Option<ParsedTransaction>, DlmmError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.lookup = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_balance(self, mint: &Pubkey, amount: u64) -> Self {
        lock(&self.state).balances.insert(*mint, amount);
        self
    }

    pub fn push_status(&self, status: Option<SignatureStatus>) {
        lock(&self.state).statuses.push_back(status);
    }

    pub fn sends(&self) -> usize {
        lock(&self.state).sent.len()
    }

    pub fn sent_tags(&self) -> Vec<String> {
        lock(&self.state).sent.iter().map(|s| tag_of(&s.tx)).collect()
    }

    pub fn extra_signer_counts(&self) -> Vec<usize> {
        lock(&self.state)
            .sent
            .iter()
            .map(|s| s.extra_signers)
            .collect()
    }

    pub fn fetches(&self) -> usize {
        lock(&self.state).fetches
    }

    pub fn status_calls(&self) -> usize {
        lock(&self.state).status_calls
    }

    pub fn simulations(&self) -> usize {
        lock(&self.state).simulations
    }
}

#[async_trait]
impl Wallet for FakeChain {
    fn public_key(&self) -> Pubkey {
        self.owner
    }

    async fn send_transaction(
        &self,
        tx: Transaction,
        extra_signers: &[&Keypair],
    ) -> Result<Signature, DlmmError> {
        let mut st = lock(&self.state);
        let n = u64::try_from(st.sent.len()).unwrap_or(u64::MAX).saturating_add(1);
        let mut bytes = [0_u8; 64];
        for (b, v) in bytes.iter_mut().zip(n.to_le_bytes()) {
            *b = v;
        }
        let signature = Signature::from(bytes);
        st.sent.push(Sent {
            signature,
            tx,
            extra_signers: extra_signers.len(),
        });
        Ok(signature)
    }

    async fn verify_balance(&self, token: &TokenInfo, required: u64) -> Result<(), DlmmError> {
        match lock(&self.state).balances.get(&token.mint) {
            Some(&available) if available < required => {
                Err(insufficient_balance(token, required, available))
            }
            Some(_) | None => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for FakeChain {
    async fn simulate_transaction(&self, tx: &Transaction) -> Result<SimulationResponse, DlmmError> {
        lock(&self.state).simulations += 1;
        (self.simulate)(tx)
    }

    async fn get_parsed_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<ParsedTransaction>, DlmmError> {
        let tx = {
            let mut st = lock(&self.state);
            st.fetches += 1;
            st.sent
                .iter()
                .find(|s| s.signature == *signature)
                .map(|s| s.tx.clone())
        };
        (self.lookup)(tx.as_ref())
    }

    async fn get_signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, DlmmError> {
        let mut st = lock(&self.state);
        st.status_calls += 1;
        if st.statuses.len() > 1 {
            return Ok(st.statuses.pop_front().flatten());
        }
        Ok(st.statuses.front().cloned().unwrap_or_else(|| {
            Some(SignatureStatus {
                err: None,
                confirmation_status: Some("confirmed".into()),
            })
        }))
    }
}

// ── pool ──────────────────────────────────────────────────────────────

struct PoolState {
    address: Pubkey,
    token_x: TokenInfo,
    token_y: TokenInfo,
    active_bin_id: i32,
    price_per_lamport: String,
    positions: Vec<Position>,
    calls: Vec<&'static str>,
    failing_position_reads: u32,
    removal_tx_count: usize,
    last_strategy_range: Option<(i32, i32)>,
    last_removal_bins: Option<Vec<i32>>,
}

/// A single pool whose builders emit tagged transactions:
/// `init:<x>:<y>`, `add:<x>:<y>`, `remove:<n>` and `claim`.
///
/// Building a transaction applies its effect immediately.
#[derive(Clone)]
pub struct FakePool {
    state: Arc<Mutex<PoolState>>,
}

impl FakePool {
    pub fn new(decimals_x: u8, decimals_y: u8, active_bin_id: i32, price_per_lamport: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolState {
                address: Pubkey::new_unique(),
                token_x: TokenInfo {
                    mint: Pubkey::new_unique(),
                    decimals: decimals_x,
                },
                token_y: TokenInfo {
                    mint: Pubkey::new_unique(),
                    decimals: decimals_y,
                },
                active_bin_id,
                price_per_lamport: price_per_lamport.to_owned(),
                positions: Vec::new(),
                calls: Vec::new(),
                failing_position_reads: 0,
                removal_tx_count: 1,
                last_strategy_range: None,
                last_removal_bins: None,
            })),
        }
    }

    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn tokens(&self) -> (TokenInfo, TokenInfo) {
        let st = lock(&self.state);
        (st.token_x, st.token_y)
    }

    pub fn insert_position(&self, p: Position) {
        lock(&self.state).positions.push(p);
    }

    pub fn positions(&self) -> Vec<Position> {
        lock(&self.state).positions.clone()
    }

    /// Fail the next `n` position listings with a timeout.
    pub fn fail_position_reads(&self, n: u32) {
        lock(&self.state).failing_position_reads = n;
    }

    pub fn set_removal_tx_count(&self, n: usize) {
        lock(&self.state).removal_tx_count = n;
    }

    pub fn calls_of(&self, name: &str) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| **c == name)
            .count()
    }

    pub fn last_strategy_range(&self) -> Option<(i32, i32)> {
        lock(&self.state).last_strategy_range
    }

    pub fn last_removal_bins(&self) -> Option<Vec<i32>> {
        lock(&self.state).last_removal_bins.clone()
    }
}

#[async_trait]
impl PoolClient for FakePool {
    async fn open(&self, pool: &Pubkey) -> Result<Box<dyn PoolHandle>, DlmmError> {
        if *pool != lock(&self.state).address {
            return Err(DlmmError::protocol(
                "get pool",
                format!("unknown pool {pool}"),
            ));
        }
        Ok(Box::new(self.handle()))
    }
}

#[async_trait]
impl PoolHandle for FakePool {
    fn address(&self) -> Pubkey {
        lock(&self.state).address
    }

    fn token_x(&self) -> TokenInfo {
        lock(&self.state).token_x
    }

    fn token_y(&self) -> TokenInfo {
        lock(&self.state).token_y
    }

    async fn get_active_bin(&self) -> Result<ActiveBin, DlmmError> {
        let mut st = lock(&self.state);
        st.calls.push("active_bin");
        Ok(ActiveBin {
            bin_id: st.active_bin_id,
            price: st.price_per_lamport.clone(),
        })
    }

    async fn get_positions_by_user(&self, _user: &Pubkey) -> Result<Vec<Position>, DlmmError> {
        let mut st = lock(&self.state);
        st.calls.push("get_positions");
        if st.failing_position_reads > 0 {
            st.failing_position_reads -= 1;
            return Err(DlmmError::read(
                "get positions",
                "operation timed out",
                FailureClass::Timeout,
            ));
        }
        Ok(st.positions.clone())
    }

    async fn get_position(&self, position: &Pubkey) -> Result<Option<Position>, DlmmError> {
        let mut st = lock(&self.state);
        st.calls.push("get_position");
        Ok(st
            .positions
            .iter()
            .find(|p| p.public_key == *position)
            .cloned())
    }

    async fn initialize_position_and_add_liquidity_by_strategy(
        &self,
        params: &AddLiquidityByStrategy,
    ) -> Result<Transaction, DlmmError> {
        let mut st = lock(&self.state);
        st.calls.push("init");
        let s = &params.strategy;
        st.last_strategy_range = Some((s.min_bin_id, s.max_bin_id));
        let opened = Position {
            public_key: params.position,
            lb_pair: st.address,
            bin_data: (s.min_bin_id..=s.max_bin_id)
                .map(|bin_id| PositionBin {
                    bin_id,
                    position_x_amount: "0".into(),
                    position_y_amount: "0".into(),
                })
                .collect(),
            fee_x: 0,
            fee_y: 0,
        };
        st.positions.push(opened);
        let tag = format!("init:{}:{}", params.total_x_amount, params.total_y_amount);
        Ok(tagged_tx(&params.user, &tag))
    }

    async fn add_liquidity_by_strategy(
        &self,
        params: &AddLiquidityByStrategy,
    ) -> Result<Transaction, DlmmError> {
        let mut st = lock(&self.state);
        st.calls.push("add");
        st.last_strategy_range = Some((params.strategy.min_bin_id, params.strategy.max_bin_id));
        let tag = format!("add:{}:{}", params.total_x_amount, params.total_y_amount);
        Ok(tagged_tx(&params.user, &tag))
    }

    async fn remove_liquidity(
        &self,
        req: &RemoveLiquidityRequest,
    ) -> Result<Vec<Transaction>, DlmmError> {
        let mut st = lock(&self.state);
        st.calls.push("remove");
        st.last_removal_bins = Some(req.bin_ids.clone());
        if req.should_claim_and_close {
            st.positions.retain(|p| p.public_key != req.position);
        }
        Ok((0..st.removal_tx_count)
            .map(|i| tagged_tx(&req.user, &format!("remove:{i}")))
            .collect())
    }

    async fn claim_swap_fee(
        &self,
        owner: &Pubkey,
        position: &Pubkey,
    ) -> Result<Vec<Transaction>, DlmmError> {
        let mut st = lock(&self.state);
        st.calls.push("claim");
        for p in st.positions.iter_mut().filter(|p| p.public_key == *position) {
            p.fee_x = 0;
            p.fee_y = 0;
        }
        Ok(vec![tagged_tx(owner, "claim")])
    }
}
