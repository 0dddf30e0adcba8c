use rust_decimal::prelude::ToPrimitive as _;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr as _;

use crate::errors::DlmmError;
use crate::types::AmountPair;

/// Largest token precision the calculator scales by.
pub const MAX_DECIMALS: u8 = 18;

const AUTO: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Auto,
    Value(Decimal),
}

fn parse_side(label: &str, s: &str) -> Result<Side, DlmmError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DlmmError::InvalidAmount(format!("{label} is required")));
    }
    if s.eq_ignore_ascii_case(AUTO) {
        return Ok(Side::Auto);
    }
    Ok(Side::Value(parse_non_negative(label, s)?))
}

fn parse_non_negative(label: &str, s: &str) -> Result<Decimal, DlmmError> {
    let v = Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| DlmmError::InvalidAmount(format!("{label} {s:?} is not a number: {e}")))?;
    if v.is_sign_negative() && !v.is_zero() {
        return Err(DlmmError::InvalidAmount(format!(
            "{label} must be non-negative, got {s}"
        )));
    }
    Ok(v)
}

fn scale(decimals: u8) -> Result<Decimal, DlmmError> {
    if decimals > MAX_DECIMALS {
        return Err(DlmmError::InvalidAmount(format!(
            "token decimals {decimals} exceed {MAX_DECIMALS}"
        )));
    }
    10_u64
        .checked_pow(u32::from(decimals))
        .map(Decimal::from)
        .ok_or_else(|| DlmmError::InvalidAmount("decimals too large".into()))
}

/// Scale a UI quantity to base units, rounding half away from zero.
pub fn ui_to_base(ui: Decimal, decimals: u8) -> Result<u64, DlmmError> {
    ui.checked_mul(scale(decimals)?)
        .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|v| v.to_u64())
        .ok_or_else(|| DlmmError::InvalidAmount(format!("{ui} does not fit in base units")))
}

pub fn base_to_ui(base: u64, decimals: u8) -> Result<Decimal, DlmmError> {
    Decimal::try_from_i128_with_scale(i128::from(base), u32::from(decimals))
        .map(|d| d.normalize())
        .map_err(|e| DlmmError::InvalidAmount(format!("cannot scale {base} by {decimals}: {e}")))
}

/// Base units of a user amount, or `None` for `"auto"`.
pub fn requested_base(amount: &str, decimals: u8) -> Result<Option<u64>, DlmmError> {
    match parse_side("amount", amount)? {
        Side::Auto => Ok(None),
        Side::Value(v) => ui_to_base(v, decimals).map(Some),
    }
}

/// Convert two user amounts (either may be `"auto"`) and a Y-per-X price into
/// base-unit totals for the pool's two assets.
///
/// When neither side is `"auto"` the price is not consulted at all.
pub fn calculate_amounts(
    amount: &str,
    amount_b: &str,
    price: &str,
    decimals_x: u8,
    decimals_y: u8,
) -> Result<AmountPair, DlmmError> {
    let (ui_x, ui_y) = match (parse_side("amount", amount)?, parse_side("amountB", amount_b)?) {
        (Side::Auto, Side::Auto) => {
            return Err(DlmmError::InvalidAmount(
                "cannot auto-balance both sides".into(),
            ));
        }
        (Side::Value(x), Side::Value(y)) => (x, y),
        (Side::Auto, Side::Value(y)) => {
            let p = parse_price(price)?;
            let x = y
                .checked_div(p)
                .ok_or_else(|| DlmmError::InvalidAmount(format!("{y} / {p} overflows")))?;
            (x, y)
        }
        (Side::Value(x), Side::Auto) => {
            let p = parse_price(price)?;
            let y = x
                .checked_mul(p)
                .ok_or_else(|| DlmmError::InvalidAmount(format!("{x} * {p} overflows")))?;
            (x, y)
        }
    };

    Ok(AmountPair {
        x: ui_to_base(ui_x, decimals_x)?,
        y: ui_to_base(ui_y, decimals_y)?,
    })
}

fn parse_price(price: &str) -> Result<Decimal, DlmmError> {
    let p = parse_non_negative("price", price.trim())?;
    if p.is_zero() {
        return Err(DlmmError::InvalidAmount(
            "price must be positive to auto-balance".into(),
        ));
    }
    Ok(p)
}

/// Convert a per-lamport price (Y base units per X base unit) into a per-token
/// price: `price * 10^(decimals_x - decimals_y)`.
pub fn price_per_token(
    price_per_lamport: &str,
    decimals_x: u8,
    decimals_y: u8,
) -> Result<Decimal, DlmmError> {
    let p = parse_non_negative("price", price_per_lamport.trim())?;
    let out = if decimals_x >= decimals_y {
        p.checked_mul(scale(decimals_x.saturating_sub(decimals_y))?)
    } else {
        p.checked_div(scale(decimals_y.saturating_sub(decimals_x))?)
    };
    out.map(|d| d.normalize())
        .ok_or_else(|| DlmmError::InvalidAmount(format!("price {p} out of range")))
}
