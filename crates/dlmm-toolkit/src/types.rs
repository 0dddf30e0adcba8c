//! Request-scoped values exchanged between the engine, its collaborators and callers.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// (De)serialize a [`Pubkey`] as its base58 string.
pub mod pubkey_str {
    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr as _;

    pub fn serialize<S: Serializer>(pk: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(pk)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(d)?;
        Pubkey::from_str(s.trim()).map_err(D::Error::custom)
    }
}

/// One side of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(with = "pubkey_str")]
    pub mint: Pubkey,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBin {
    pub bin_id: i32,
    /// Price per lamport (Y base units per X base unit), as a decimal string.
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionBin {
    pub bin_id: i32,
    #[serde(default)]
    pub position_x_amount: String,
    #[serde(default)]
    pub position_y_amount: String,
}

/// An on-chain liquidity position owned by a wallet in one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(with = "pubkey_str")]
    pub public_key: Pubkey,
    #[serde(with = "pubkey_str")]
    pub lb_pair: Pubkey,
    pub bin_data: Vec<PositionBin>,
    #[serde(default)]
    pub fee_x: u64,
    #[serde(default)]
    pub fee_y: u64,
}

impl Position {
    pub fn bin_ids(&self) -> Vec<i32> {
        self.bin_data.iter().map(|b| b.bin_id).collect()
    }
}

/// Closed interval of bin ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinRange {
    pub min_bin_id: i32,
    pub max_bin_id: i32,
}

impl BinRange {
    /// `[active - interval, active + interval]`, saturating at the `i32` bounds.
    pub fn around(active_bin_id: i32, interval: u32) -> Self {
        let interval = i32::try_from(interval).unwrap_or(i32::MAX);
        Self {
            min_bin_id: active_bin_id.saturating_sub(interval),
            max_bin_id: active_bin_id.saturating_add(interval),
        }
    }

    pub fn spanning(bins: &[PositionBin]) -> Option<Self> {
        let min_bin_id = bins.iter().map(|b| b.bin_id).min()?;
        let max_bin_id = bins.iter().map(|b| b.bin_id).max()?;
        Some(Self {
            min_bin_id,
            max_bin_id,
        })
    }

    pub const fn contains(&self, bin_id: i32) -> bool {
        self.min_bin_id <= bin_id && bin_id <= self.max_bin_id
    }
}

/// Base-unit quantities for a pool's two assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AmountPair {
    pub x: u64,
    pub y: u64,
}

impl AmountPair {
    pub const fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    Spot,
    Curve,
    BidAsk,
    SpotImBalanced,
    CurveImBalanced,
    BidAskImBalanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Strategy {
    pub min_bin_id: i32,
    pub max_bin_id: i32,
    pub strategy_type: StrategyType,
}

/// Input of both add-liquidity transaction builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddLiquidityByStrategy {
    #[serde(with = "pubkey_str")]
    pub position: Pubkey,
    #[serde(with = "pubkey_str")]
    pub user: Pubkey,
    pub total_x_amount: u64,
    pub total_y_amount: u64,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveLiquidityRequest {
    #[serde(with = "pubkey_str")]
    pub position: Pubkey,
    #[serde(with = "pubkey_str")]
    pub user: Pubkey,
    pub bin_ids: Vec<i32>,
    pub bps: u16,
    pub should_claim_and_close: bool,
}

/// Accept an amount given either as a JSON string or a JSON number.
fn de_amount<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddLiquidityParameters {
    pub pool_address: String,
    #[serde(deserialize_with = "de_amount")]
    pub amount: String,
    #[serde(deserialize_with = "de_amount")]
    pub amount_b: String,
    #[serde(default)]
    pub range_interval: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveLiquidityParameters {
    pub pool_address: String,
    #[serde(default)]
    pub position_address: Option<String>,
    #[serde(default)]
    pub should_close_position: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PoolParameters {
    pub pool_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetPoolsParameters {
    pub asset: String,
    pub asset_b: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLiquidityResult {
    pub position_address: String,
    pub liquidity_added: [Decimal; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLiquidityResult {
    pub liquidity_removed: [Decimal; 2],
    pub fees_claimed: [Decimal; 2],
}

impl RemoveLiquidityResult {
    pub fn accumulate(&mut self, other: &Self) {
        let [rx, ry] = &mut self.liquidity_removed;
        let [fx, fy] = &mut self.fees_claimed;
        let [orx, ory] = other.liquidity_removed;
        let [ofx, ofy] = other.fees_claimed;
        *rx += orx;
        *ry += ory;
        *fx += ofx;
        *fy += ofy;
    }
}

impl fmt::Display for RemoveLiquidityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [rx, ry] = self.liquidity_removed;
        let [fx, fy] = self.fees_claimed;
        write!(f, "liquidity [{rx}, {ry}], fees [{fx}, {fy}]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimFeesResult {
    pub position_address: String,
    pub signatures: Vec<String>,
    pub fees_claimed: [Decimal; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveBinResult {
    pub bin_id: i32,
    pub price: String,
    pub price_per_token: String,
}
