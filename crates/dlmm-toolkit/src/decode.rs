//! JSON shapes of `jsonParsed` transaction records and simulation results, and
//! the token-transfer decoding shared by the simulator and the verifier.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::amount::base_to_ui;
use crate::errors::DlmmError;
use crate::types::RemoveLiquidityResult;

const TRANSFER_CHECKED: &str = "transferChecked";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub parsed: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InnerInstructions {
    pub index: usize,
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    pub amount: String,
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount_string: Option<String>,
}

impl TokenAmount {
    /// Exact UI amount, derived from the integer amount and its decimals.
    pub fn ui(&self) -> Result<Decimal, DlmmError> {
        let base: u64 = self
            .amount
            .trim()
            .parse()
            .map_err(|e| DlmmError::Decode(format!("token amount {:?}: {e}", self.amount)))?;
        base_to_ui(base, self.decimals)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferCheckedInfo {
    mint: String,
    token_amount: TokenAmount,
}

#[derive(Debug, Clone, Deserialize)]
struct ParsedBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    info: Value,
}

/// A decoded `transferChecked` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub mint: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedMessage {
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedEnvelope {
    #[serde(default)]
    pub message: ParsedMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<InnerInstructions>>,
}

/// A `getTransaction` record in `jsonParsed` encoding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedTransaction {
    #[serde(default)]
    pub transaction: ParsedEnvelope,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
}

/// The `value` of a `simulateTransaction` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub logs: Option<Vec<String>>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<InnerInstructions>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

impl SignatureStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed" | "finalized")
        )
    }
}

/// Decode one instruction if it is a `transferChecked`.
pub fn transfer_checked(ix: &ParsedInstruction) -> Result<Option<TokenTransfer>, DlmmError> {
    let Some(parsed) = ix.parsed.as_ref() else {
        return Ok(None);
    };
    let Ok(body) = serde_json::from_value::<ParsedBody>(parsed.clone()) else {
        return Ok(None);
    };
    if body.kind != TRANSFER_CHECKED {
        return Ok(None);
    }
    let info: TransferCheckedInfo = serde_json::from_value(body.info)
        .map_err(|e| DlmmError::Decode(format!("transferChecked info: {e}")))?;
    Ok(Some(TokenTransfer {
        amount: info.token_amount.ui()?,
        mint: info.mint,
    }))
}

pub fn transfers_in(instructions: &[ParsedInstruction]) -> Result<Vec<TokenTransfer>, DlmmError> {
    let mut out = Vec::new();
    for ix in instructions {
        if let Some(t) = transfer_checked(ix)? {
            out.push(t);
        }
    }
    Ok(out)
}

/// Every `transferChecked` across all inner-instruction groups, in order.
pub fn inner_transfers(inner: &[InnerInstructions]) -> Result<Vec<TokenTransfer>, DlmmError> {
    let mut out = Vec::new();
    for group in inner {
        out.extend(transfers_in(&group.instructions)?);
    }
    Ok(out)
}

/// First transfer of `mint`, or zero when absent.
pub fn amount_for_mint(transfers: &[TokenTransfer], mint: &str) -> Decimal {
    transfers
        .iter()
        .find(|t| t.mint == mint)
        .map_or(Decimal::ZERO, |t| t.amount)
}

/// Removal decode: the first DLMM-program outer instruction is the removal and
/// the second the fee claim; their inner transfers are split by mint.
pub fn extract_balance_changes(
    tx: &ParsedTransaction,
    program_id: &str,
    mint_x: &str,
    mint_y: &str,
    expect_fee_claim: bool,
) -> Result<RemoveLiquidityResult, DlmmError> {
    let meta = tx
        .meta
        .as_ref()
        .ok_or_else(|| DlmmError::Decode("transaction record has no meta".into()))?;

    let groups: BTreeMap<usize, &[ParsedInstruction]> = meta
        .inner_instructions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|g| (g.index, g.instructions.as_slice()))
        .collect();

    let dlmm_indices: Vec<usize> = tx
        .transaction
        .message
        .instructions
        .iter()
        .enumerate()
        .filter(|(_, ix)| ix.program_id.as_deref() == Some(program_id))
        .map(|(i, _)| i)
        .collect();

    let (remove_idx, claim_idx) = match (dlmm_indices.first(), dlmm_indices.get(1)) {
        (Some(r), Some(c)) => (*r, Some(*c)),
        (Some(r), None) if !expect_fee_claim => (*r, None),
        _ => {
            return Err(DlmmError::Decode(format!(
                "expected {} DLMM instructions, found {}",
                if expect_fee_claim { "two" } else { "one" },
                dlmm_indices.len()
            )));
        }
    };

    let decode_at = |idx: usize| -> Result<Vec<TokenTransfer>, DlmmError> {
        groups
            .get(&idx)
            .map_or_else(|| Ok(Vec::new()), |ixs| transfers_in(ixs))
    };

    let removed = decode_at(remove_idx)?;
    let fees = match claim_idx {
        Some(idx) => decode_at(idx)?,
        None => Vec::new(),
    };

    Ok(RemoveLiquidityResult {
        liquidity_removed: [
            amount_for_mint(&removed, mint_x),
            amount_for_mint(&removed, mint_y),
        ],
        fees_claimed: [amount_for_mint(&fees, mint_x), amount_for_mint(&fees, mint_y)],
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::{program_ix, transfer};
    use super::*;
    use serde_json::json;
    use std::str::FromStr as _;

    const DLMM: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";
    const MX: &str = "So11111111111111111111111111111111111111112";
    const MY: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn d(s: &str) -> eyre::Result<Decimal> {
        Ok(Decimal::from_str(s)?)
    }

    fn removal_tx() -> eyre::Result<ParsedTransaction> {
        Ok(serde_json::from_value(json!({
          "transaction": { "message": { "instructions": [
            program_ix("ComputeBudget111111111111111111111111111111"),
            program_ix(DLMM),
            program_ix(DLMM),
          ]}},
          "meta": {
            "err": null,
            "innerInstructions": [
              { "index": 1, "instructions": [transfer(MX, 3_000_000_000, 9), transfer(MY, 4_500_000, 6)] },
              { "index": 2, "instructions": [transfer(MY, 200_000, 6), { "program": "system", "parsed": { "type": "transfer", "info": {} } }] }
            ]
          }
        }))?)
    }

    #[test]
    fn removal_splits_liquidity_and_fees_by_mint() -> eyre::Result<()> {
        let r = extract_balance_changes(&removal_tx()?, DLMM, MX, MY, true)?;
        assert_eq!(r.liquidity_removed, [d("3")?, d("4.5")?]);
        assert_eq!(r.fees_claimed, [Decimal::ZERO, d("0.2")?]);
        Ok(())
    }

    #[test]
    fn removal_without_claim_needs_one_instruction() -> eyre::Result<()> {
        let tx: ParsedTransaction = serde_json::from_value(json!({
          "transaction": { "message": { "instructions": [program_ix(DLMM)] } },
          "meta": { "innerInstructions": [
            { "index": 0, "instructions": [transfer(MX, 1_000_000_000, 9)] }
          ]}
        }))?;
        let r = extract_balance_changes(&tx, DLMM, MX, MY, false)?;
        assert_eq!(r.liquidity_removed, [d("1")?, Decimal::ZERO]);
        assert_eq!(r.fees_claimed, [Decimal::ZERO, Decimal::ZERO]);

        let strict = extract_balance_changes(&tx, DLMM, MX, MY, true);
        assert!(
            matches!(strict, Err(DlmmError::Decode(_))),
            "one DLMM instruction cannot satisfy a claim: {strict:?}"
        );
        Ok(())
    }

    #[test]
    fn missing_meta_is_a_decode_error() {
        let r = extract_balance_changes(&ParsedTransaction::default(), DLMM, MX, MY, false);
        assert!(matches!(r, Err(DlmmError::Decode(_))), "got {r:?}");
    }

    #[test]
    fn inner_transfers_skip_other_instructions() -> eyre::Result<()> {
        let groups: Vec<InnerInstructions> = serde_json::from_value(json!([
          { "index": 0, "instructions": [
            { "program": "spl-token", "parsed": { "type": "initializeAccount3", "info": {} } },
            transfer(MX, 10, 9),
            { "programId": DLMM, "data": "abc" }
          ]},
          { "index": 3, "instructions": [transfer(MY, 15, 6)] }
        ]))?;
        let t = inner_transfers(&groups)?;
        assert_eq!(t.len(), 2);
        assert_eq!(amount_for_mint(&t, MY), d("0.000015")?);
        Ok(())
    }

    #[test]
    fn signature_status_terminal_states() {
        let mut s = SignatureStatus {
            err: None,
            confirmation_status: Some("processed".into()),
        };
        assert!(!s.is_terminal(), "processed is not terminal");
        s.confirmation_status = Some("confirmed".into());
        assert!(s.is_terminal(), "confirmed is terminal");
        s.confirmation_status = Some("finalized".into());
        assert!(s.is_terminal(), "finalized is terminal");
    }
}
