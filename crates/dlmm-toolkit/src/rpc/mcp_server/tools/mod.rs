mod schema;

pub use schema::{list_tools_result, tool_schemas};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::ToolkitContext;
use crate::errors::{DlmmError, Operation, OperationError, ToolError};
use crate::types::{
    AddLiquidityParameters, GetPoolsParameters, PoolParameters, RemoveLiquidityParameters,
};

pub fn operation_for_tool(name: &str) -> Option<Operation> {
    match name {
        "meteora_add_liquidity" => Some(Operation::AddLiquidity),
        "meteora_remove_liquidity" => Some(Operation::RemoveLiquidity),
        "meteora_claim_fees" => Some(Operation::ClaimFees),
        "meteora_get_pools" => Some(Operation::GetPools),
        "meteora_get_active_bin" => Some(Operation::GetActiveBin),
        "meteora_get_positions_from_pool" => Some(Operation::GetPositions),
        _ => None,
    }
}

fn parse_args<T: DeserializeOwned>(op: Operation, args: Value) -> Result<T, OperationError> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| {
        OperationError::new(op, DlmmError::Validation(format!("invalid arguments: {e}")))
    })
}

fn to_payload<T: Serialize>(op: Operation, v: &T) -> Result<Value, OperationError> {
    serde_json::to_value(v).map_err(|e| OperationError::new(op, DlmmError::Decode(e.to_string())))
}

async fn dispatch(ctx: &ToolkitContext, op: Operation, args: Value) -> Result<Value, OperationError> {
    let fail = |e| OperationError::new(op, e);
    match op {
        Operation::AddLiquidity => {
            let p: AddLiquidityParameters = parse_args(op, args)?;
            let r = ctx.engine().map_err(fail)?.add_liquidity(&p).await?;
            to_payload(op, &r)
        }
        Operation::RemoveLiquidity => {
            let p: RemoveLiquidityParameters = parse_args(op, args)?;
            let r = ctx.engine().map_err(fail)?.remove_liquidity(&p).await?;
            to_payload(op, &r)
        }
        Operation::ClaimFees => {
            let p: PoolParameters = parse_args(op, args)?;
            let r = ctx.engine().map_err(fail)?.claim_fees(&p).await?;
            to_payload(op, &r)
        }
        Operation::GetActiveBin => {
            let p: PoolParameters = parse_args(op, args)?;
            let r = ctx.engine().map_err(fail)?.get_active_bin(&p).await?;
            to_payload(op, &r)
        }
        Operation::GetPositions => {
            let p: PoolParameters = parse_args(op, args)?;
            let r = ctx
                .engine()
                .map_err(fail)?
                .get_positions_from_pool(&p)
                .await?;
            to_payload(op, &r)
        }
        Operation::GetPools => {
            let p: GetPoolsParameters = parse_args(op, args)?;
            let r = ctx.meteora().map_err(fail)?.get_pools(&p).await.map_err(fail)?;
            to_payload(op, &r)
        }
    }
}

/// Run a named tool. Every failure comes back as a [`ToolError`].
pub async fn call_tool(ctx: &ToolkitContext, name: &str, args: Value) -> Result<Value, ToolError> {
    let Some(op) = operation_for_tool(name) else {
        return Err(ToolError::new("unknown_tool", format!("unknown tool: {name}")));
    };
    match dispatch(ctx, op, args).await {
        Ok(v) => Ok(v),
        Err(e) => {
            tracing::warn!(tool = name, code = e.kind().code(), error = %e, "tool call failed");
            Err(ToolError::from(&e))
        }
    }
}
