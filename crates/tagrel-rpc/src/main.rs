//! Tagrel RPC Server - JSON-RPC backend for tag relationship lookups.
//!
//! This binary provides a JSON-RPC 2.0 server that wraps the tagrel-core
//! library, backed by an in-memory store loaded from a JSON snapshot.

mod handlers;
mod server;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tagrel_core::RpcConfig;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tagrel-rpc")]
#[command(about = "JSON-RPC server for tag siblings, parents and autocomplete")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = RpcConfig::DEFAULT_HOST)]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// JSON store snapshot to serve (empty store if omitted)
    #[arg(long)]
    store: Option<PathBuf>,

    /// JSON tag options file
    #[arg(long)]
    options: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Tagrel RPC Server");
    if let Some(path) = &args.store {
        info!("Store snapshot: {}", path.display());
    }

    let state = server::AppState::load(args.store.as_deref(), args.options.as_deref()).await?;
    let services = state.manager.services()?;
    info!("Loaded {} services", services.len());

    // Start the server
    let addr = server::start_server(state, &args.host, args.port).await?;

    // Print port for the parent process to read (intentional stdout for IPC)
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
