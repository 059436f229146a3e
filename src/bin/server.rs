//! storegate Server Binary
//!
//! Starts the UDP server that owns the store's capacity ledger.
//!
//! Operator console on stdin: `stats` prints the counters, `quit` stops.
//! Ctrl+C also stops the server; closing stdin does not.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use storegate::config::ConfigBuilder;
use storegate::console::run_console;
use storegate::network::{Server, ShutdownHandle};
use storegate::{CapacityLedger, Config, RouteMatching};
use tracing_subscriber::{fmt, EnvFilter};

/// storegate Server
#[derive(Parser, Debug)]
#[command(name = "storegate-server")]
#[command(about = "Capacity-limited store access server")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Maximum customers inside at once
    #[arg(short = 'n', long)]
    capacity: Option<usize>,

    /// Match paths by substring anywhere (legacy behaviour)
    #[arg(long)]
    legacy_routes: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,storegate=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("storegate Server v{}", storegate::VERSION);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listen address: {}", config.listen_addr);
    tracing::info!("Store capacity: {}", config.max_capacity);
    tracing::info!("Route matching: {:?}", config.route_matching);

    let ledger = Arc::new(CapacityLedger::new(config.max_capacity));

    let server = match Server::bind(config, Arc::clone(&ledger)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind server: {}", e);
            std::process::exit(1);
        }
    };

    install_ctrlc_handler(server.shutdown_handle());
    spawn_console(server.shutdown_handle(), ledger);

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

fn build_config(args: &Args) -> storegate::Result<Config> {
    let base = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(listen) = &args.listen {
        builder = builder.listen_addr(listen);
    }
    if let Some(capacity) = args.capacity {
        builder = builder.max_capacity(capacity);
    }
    if args.legacy_routes {
        builder = builder.route_matching(RouteMatching::Legacy);
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}

/// Read operator commands from stdin on a background thread
fn spawn_console(shutdown: ShutdownHandle, ledger: Arc<CapacityLedger>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        if let Err(e) = run_console(stdin.lock(), std::io::stdout(), &shutdown, &ledger) {
            tracing::warn!("Console stopped: {}", e);
        }
    });
}

/// Stop the receive loop on Ctrl+C
fn install_ctrlc_handler(shutdown: ShutdownHandle) {
    let result = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down");
        shutdown.shutdown();
    });
    if let Err(e) = result {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }
}
