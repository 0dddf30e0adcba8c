#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand};
use eyre::Context as _;
use serde_json::json;
use tracing_subscriber::prelude::*;

use dlmm_toolkit::context::ToolkitContext;
use dlmm_toolkit::paths::ToolkitPaths;
use dlmm_toolkit::rpc::mcp_server;
use dlmm_toolkit::types::{
    AddLiquidityParameters, GetPoolsParameters, PoolParameters, RemoveLiquidityParameters,
};

mod cli_output;

#[derive(Parser, Debug)]
#[command(name = "dlmm-toolkit", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server over stdio.
    Mcp,

    /// Add liquidity to a pool (extends your position there, or opens one).
    AddLiquidity {
        #[arg(long)]
        pool: String,
        /// Token X amount in UI units, or "auto".
        #[arg(long)]
        amount: String,
        /// Token Y amount in UI units, or "auto".
        #[arg(long)]
        amount_b: String,
        /// Bins on each side of the active bin when opening a new position.
        #[arg(long)]
        range_interval: Option<u32>,
    },

    /// Remove all liquidity from a position.
    RemoveLiquidity {
        #[arg(long)]
        pool: String,
        /// Defaults to your first position in the pool.
        #[arg(long)]
        position: Option<String>,
        /// Leave the position open and its fees unclaimed.
        #[arg(long, default_value_t = false)]
        keep_open: bool,
    },

    /// Claim swap fees of your first position in a pool.
    ClaimFees {
        #[arg(long)]
        pool: String,
    },

    /// Print the active bin and price of a pool.
    ActiveBin {
        #[arg(long)]
        pool: String,
    },

    /// List your positions in a pool.
    Positions {
        #[arg(long)]
        pool: String,
    },

    /// Search pools by token pair.
    Pools {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        asset_b: String,
    },

    /// Print the MCP tool schemas.
    Tools,

    /// Print resolved paths (useful for debugging).
    Paths,
}

fn init_logging(paths: &ToolkitPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dlmm-toolkit.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = ToolkitPaths::discover()?;
    std::fs::create_dir_all(&paths.data_dir).context("create data dir")?;
    let _log_guard = init_logging(&paths);

    // Commands that need no config.
    match cli.cmd {
        Command::Paths => {
            return cli_output::print_json(&json!({
              "config_dir": paths.config_dir,
              "data_dir": paths.data_dir,
              "log_file": paths.log_file,
              "config_file": paths.config_file(),
              "audit_log": paths.audit_log(),
            }));
        }
        Command::Tools => return cli_output::print_json(&mcp_server::tool_schemas()),
        Command::Mcp
        | Command::AddLiquidity { .. }
        | Command::RemoveLiquidity { .. }
        | Command::ClaimFees { .. }
        | Command::ActiveBin { .. }
        | Command::Positions { .. }
        | Command::Pools { .. } => {}
    }

    let ctx = ToolkitContext::load(paths)?;
    match cli.cmd {
        Command::Mcp => {
            cli_output::print_mcp_banner(
                env!("CARGO_PKG_VERSION"),
                ctx.cfg.http.dlmm_adapter_base_url.is_some(),
            );
            mcp_server::run(&ctx).await.context("mcp server failed")
        }
        Command::AddLiquidity {
            pool,
            amount,
            amount_b,
            range_interval,
        } => {
            let p = AddLiquidityParameters {
                pool_address: pool,
                amount,
                amount_b,
                range_interval,
            };
            let r = ctx.engine()?.add_liquidity(&p).await?;
            cli_output::print_json(&r)
        }
        Command::RemoveLiquidity {
            pool,
            position,
            keep_open,
        } => {
            let p = RemoveLiquidityParameters {
                pool_address: pool,
                position_address: position,
                should_close_position: Some(!keep_open),
            };
            let r = ctx.engine()?.remove_liquidity(&p).await?;
            cli_output::print_json(&r)
        }
        Command::ClaimFees { pool } => {
            let r = ctx
                .engine()?
                .claim_fees(&PoolParameters { pool_address: pool })
                .await?;
            cli_output::print_json(&r)
        }
        Command::ActiveBin { pool } => {
            let r = ctx
                .engine()?
                .get_active_bin(&PoolParameters { pool_address: pool })
                .await?;
            cli_output::print_json(&r)
        }
        Command::Positions { pool } => {
            let r = ctx
                .engine()?
                .get_positions_from_pool(&PoolParameters { pool_address: pool })
                .await?;
            cli_output::print_json(&r)
        }
        Command::Pools { asset, asset_b } => {
            let r = ctx
                .meteora()?
                .get_pools(&GetPoolsParameters { asset, asset_b })
                .await?;
            cli_output::print_json(&r)
        }
        Command::Paths | Command::Tools => Ok(()),
    }
}
