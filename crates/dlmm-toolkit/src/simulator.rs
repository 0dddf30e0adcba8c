use solana_sdk::transaction::Transaction;

use crate::chain::Connection;
use crate::decode::{inner_transfers, TokenTransfer};
use crate::errors::DlmmError;

const SIMULATION_LOG_TAIL: usize = 5;

/// Simulate an add-liquidity transaction and return the token transfers it
/// would perform. Nothing is submitted.
pub async fn simulate_add_liquidity(
    conn: &dyn Connection,
    tx: &Transaction,
) -> Result<Vec<TokenTransfer>, DlmmError> {
    let sim = conn
        .simulate_transaction(tx)
        .await
        .map_err(|e| DlmmError::Simulation(e.to_string()))?;

    if let Some(err) = sim.err.as_ref() {
        let logs = sim.logs.as_deref().unwrap_or_default();
        let tail = logs
            .iter()
            .skip(logs.len().saturating_sub(SIMULATION_LOG_TAIL))
            .cloned()
            .collect::<Vec<_>>()
            .join(" | ");
        return Err(DlmmError::Simulation(format!("{err}; logs: {tail}")));
    }

    let inner = sim
        .inner_instructions
        .as_deref()
        .ok_or_else(|| DlmmError::Simulation("no inner instructions in simulation result".into()))?;
    inner_transfers(inner)
}

/// Require exactly two transfers, both strictly positive.
pub fn check_preflight(transfers: &[TokenTransfer]) -> Result<(), DlmmError> {
    if transfers.len() != 2 {
        return Err(DlmmError::Simulation(format!(
            "expected 2 token transfers in simulation, got {}",
            transfers.len()
        )));
    }
    if let Some(t) = transfers.iter().find(|t| t.amount.is_zero()) {
        return Err(DlmmError::ZeroLiquidity(format!(
            "simulated transfer of {} is zero, aborting before submission",
            t.mint
        )));
    }
    Ok(())
}
