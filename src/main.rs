//! VPN credential allocator.
//!
//! Hands out personal Outline access keys to users, spreading them across
//! a pool of VPN servers listed in a watched file.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                 VPN ALLOCATOR                │
//!                      │                                              │
//!   Invite request     │  ┌────────┐    ┌───────────┐    ┌─────────┐  │
//!   ───────────────────┼─▶│  http  │───▶│ allocator │───▶│ backend │──┼──▶ Outline
//!                      │  │ server │    │ placement │    │ client  │  │    servers
//!                      │  └────────┘    └─────┬─────┘    └─────────┘  │
//!                      │                      │ snapshot              │
//!                      │                ┌─────┴─────┐                 │
//!   servers file ──────┼───────────────▶│   pool    │                 │
//!   (JSON / TOML)      │    notify      │  watcher  │                 │
//!                      │                └───────────┘                 │
//!                      │  config · observability · lifecycle          │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use vpn_allocator::config::{load_config, AllocatorConfig};
use vpn_allocator::lifecycle;
use vpn_allocator::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "vpn-allocator")]
#[command(about = "Allocates Outline VPN access keys across a pool of servers", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.config {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => AllocatorConfig::default(),
    };

    init_logging(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vpn-allocator starting");
    tracing::info!(
        servers_file = %config.pool.servers_file,
        bind_address = %config.listener.bind_address,
        max_users = config.allocation.max_users,
        traffic_limit_gb = config.allocation.traffic_limit_gb,
        "Configuration loaded"
    );

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
