use serde_json::{json, Value};

fn pool_address_prop() -> Value {
    json!({ "type": "string", "minLength": 1, "description": "DLMM pool (lb pair) address." })
}

fn liquidity_tool_schemas() -> Vec<Value> {
    vec![
        json!({ "name": "meteora_add_liquidity", "description": "Add liquidity to a Meteora DLMM pool. Extends the caller's existing position in the pool, or opens a new one centred on the active bin. The transaction is simulated before signing and the confirmed amounts are verified on chain.", "inputSchema": {
          "type": "object",
          "properties": {
            "poolAddress": pool_address_prop(),
            "amount": { "type": ["string", "number"], "description": "Amount of token X in UI units, or \"auto\" to derive it from amountB at the active-bin price." },
            "amountB": { "type": ["string", "number"], "description": "Amount of token Y in UI units, or \"auto\" to derive it from amount at the active-bin price." },
            "rangeInterval": { "type": "integer", "minimum": 0, "description": "Bins on each side of the active bin for a new position (default 10)." }
          },
          "required": ["poolAddress", "amount", "amountB"],
          "additionalProperties": false
        }}),
        json!({ "name": "meteora_remove_liquidity", "description": "Remove all liquidity from a position (default: the caller's first position in the pool), claiming fees and closing it unless shouldClosePosition is false.", "inputSchema": {
          "type": "object",
          "properties": {
            "poolAddress": pool_address_prop(),
            "positionAddress": { "type": "string", "description": "Optional position address." },
            "shouldClosePosition": { "type": "boolean", "default": true }
          },
          "required": ["poolAddress"],
          "additionalProperties": false
        }}),
        json!({ "name": "meteora_claim_fees", "description": "Claim swap fees accrued by the caller's first position in the pool.", "inputSchema": {
          "type": "object",
          "properties": { "poolAddress": pool_address_prop() },
          "required": ["poolAddress"],
          "additionalProperties": false
        }}),
    ]
}

fn read_tool_schemas() -> Vec<Value> {
    vec![
        json!({ "name": "meteora_get_pools", "description": "Search Meteora DLMM pools by token pair (up to 10 results).", "inputSchema": {
          "type": "object",
          "properties": {
            "asset": { "type": "string", "minLength": 1, "description": "First token symbol or mint." },
            "assetB": { "type": "string", "minLength": 1, "description": "Second token symbol or mint." }
          },
          "required": ["asset", "assetB"],
          "additionalProperties": false
        }}),
        json!({ "name": "meteora_get_active_bin", "description": "Active bin id and price of a DLMM pool.", "inputSchema": {
          "type": "object",
          "properties": { "poolAddress": pool_address_prop() },
          "required": ["poolAddress"],
          "additionalProperties": false
        }}),
        json!({ "name": "meteora_get_positions_from_pool", "description": "The caller's positions in a DLMM pool.", "inputSchema": {
          "type": "object",
          "properties": { "poolAddress": pool_address_prop() },
          "required": ["poolAddress"],
          "additionalProperties": false
        }}),
    ]
}

pub fn tool_schemas() -> Vec<Value> {
    let mut out = liquidity_tool_schemas();
    out.extend(read_tool_schemas());
    out
}

pub fn list_tools_result() -> Value {
    json!({ "tools": tool_schemas() })
}
