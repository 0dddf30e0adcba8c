use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

use crate::types::RemoveLiquidityResult;

/// A structured error suitable for returning to an MCP client as tool output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub data: Value,
}

impl ToolError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: Value::Null,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Why a read against an external data source failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Timeout,
    Connection,
    Other,
}

impl FailureClass {
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::Connection)
    }

    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() || e.is_request() {
            Self::Connection
        } else {
            Self::Other
        }
    }
}

/// What the engine is allowed to do after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Close the freshly opened position and rerun the whole add flow.
    StatisticalBug,
    /// Retry the single read that failed.
    TransientRead,
    Never,
}

#[derive(Debug, Error)]
pub enum DlmmError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient balance for {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: String,
        available: String,
    },

    #[error("zero liquidity: {0}")]
    ZeroLiquidity(String),

    #[error("simulation failed: {0}")]
    Simulation(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("transaction {signature} not found after {attempts} attempts")]
    TransactionNotFound { signature: String, attempts: u32 },

    #[error("transaction failed: signature {signature}, error {error}")]
    TransactionFailed { signature: String, error: String },

    #[error("transaction confirmation timed out after {timeout_ms}ms: {signature}")]
    ConfirmationTimeout { signature: String, timeout_ms: u64 },

    #[error(
        "statistical bug: position {position} received {verified_x}/{verified_y} for a requested {requested_x}/{requested_y} (base units)"
    )]
    StatisticalBug {
        position: String,
        opened_new_position: bool,
        requested_x: u64,
        requested_y: u64,
        verified_x: Decimal,
        verified_y: Decimal,
    },

    #[error("statistical bug persisted after {attempts} attempts (last position {position})")]
    StatisticalBugExhausted { attempts: u32, position: String },

    #[error("no position found in pool {pool}")]
    NoPosition { pool: String },

    #[error("{context}: {message}")]
    ProtocolRead {
        context: String,
        message: String,
        class: FailureClass,
    },

    #[error("{context}: {message}")]
    Protocol { context: String, message: String },

    #[error("send transaction: {message}")]
    Submit { message: String },

    #[error(
        "removal stopped after {completed} of {total} transactions (already removed {partial}): {source}"
    )]
    PartialRemoval {
        completed: usize,
        total: usize,
        partial: RemoveLiquidityResult,
        #[source]
        source: Box<DlmmError>,
    },
}

impl DlmmError {
    pub fn read(context: impl Into<String>, message: impl fmt::Display, class: FailureClass) -> Self {
        Self::ProtocolRead {
            context: context.into(),
            message: message.to_string(),
            class,
        }
    }

    pub fn protocol(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Protocol {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub const fn retry_class(&self) -> RetryClass {
        match self {
            Self::StatisticalBug { .. } => RetryClass::StatisticalBug,
            Self::ProtocolRead { class, .. } if class.is_transient() => RetryClass::TransientRead,
            _ => RetryClass::Never,
        }
    }

    pub const fn is_transient_read(&self) -> bool {
        matches!(self.retry_class(), RetryClass::TransientRead)
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::ZeroLiquidity(_) => "zero_liquidity",
            Self::Simulation(_) => "simulation_error",
            Self::Decode(_) => "decode_error",
            Self::TransactionNotFound { .. } => "transaction_not_found",
            Self::TransactionFailed { .. } => "transaction_failed",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::StatisticalBug { .. } | Self::StatisticalBugExhausted { .. } => {
                "statistical_bug"
            }
            Self::NoPosition { .. } => "no_position",
            Self::ProtocolRead { .. } => "protocol_read_error",
            Self::Protocol { .. } => "protocol_error",
            Self::Submit { .. } => "submit_error",
            Self::PartialRemoval { .. } => "partial_removal",
        }
    }
}

/// Engine operations, used as the prefix of surfaced errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddLiquidity,
    RemoveLiquidity,
    ClaimFees,
    GetActiveBin,
    GetPositions,
    GetPools,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AddLiquidity => "add liquidity",
            Self::RemoveLiquidity => "remove liquidity",
            Self::ClaimFees => "claim fees",
            Self::GetActiveBin => "get active bin",
            Self::GetPositions => "get positions",
            Self::GetPools => "get pools",
        };
        f.write_str(s)
    }
}

/// The single error a top-level call rejects with.
#[derive(Debug, Error)]
#[error("{op} failed: {source}")]
pub struct OperationError {
    pub op: Operation,
    #[source]
    pub source: DlmmError,
}

impl OperationError {
    pub const fn new(op: Operation, source: DlmmError) -> Self {
        Self { op, source }
    }

    pub const fn kind(&self) -> &DlmmError {
        &self.source
    }
}

impl From<&OperationError> for ToolError {
    fn from(e: &OperationError) -> Self {
        let te = Self::new(e.source.code(), e.to_string());
        match &e.source {
            DlmmError::InsufficientBalance {
                asset,
                required,
                available,
            } => te.with_data(json!({
              "asset": asset,
              "required": required,
              "available": available,
            })),
            DlmmError::TransactionFailed { signature, .. }
            | DlmmError::ConfirmationTimeout { signature, .. }
            | DlmmError::TransactionNotFound { signature, .. } => {
                te.with_data(json!({ "signature": signature }))
            }
            DlmmError::StatisticalBugExhausted { attempts, position } => {
                te.with_data(json!({ "attempts": attempts, "position": position }))
            }
            DlmmError::PartialRemoval {
                completed,
                total,
                partial,
                ..
            } => te.with_data(json!({
              "completed": completed,
              "total": total,
              "partial": partial,
            })),
            _ => te,
        }
    }
}
