//! storegate Access Point Client
//!
//! Simulated access point: each stdin line is a sensor trip
//! (`entry` / `exit`), the door is a logging indicator.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use storegate::client::{AccessPoint, Correlator, Indicator, LogDoor, SensorEvent};
use storegate::config::ConfigBuilder;
use storegate::network::{resolve_addr, UdpTransport};
use storegate::Config;
use tracing_subscriber::{fmt, EnvFilter};

/// storegate Access Point
#[derive(Parser, Debug)]
#[command(name = "storegate-client")]
#[command(about = "Access point client for the store access server")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server address (host:port)
    #[arg(short, long)]
    server: Option<String>,

    /// Door dwell time in milliseconds
    #[arg(long)]
    dwell_ms: Option<u64>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,storegate=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("storegate Client v{}", storegate::VERSION);

    if let Err(e) = run(&args) {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> storegate::Result<()> {
    let config = build_config(args)?;
    let server = resolve_addr(&config.server_addr)?;
    tracing::info!("Server address: {}", server);

    let transport = UdpTransport::bind("0.0.0.0:0")?;
    let correlator = Arc::new(Correlator::new(transport, server, &config));

    tracing::info!("Testing server connectivity...");
    if !correlator.probe() {
        tracing::warn!("Server connection test failed, continuing anyway");
    }

    let indicator = Arc::new(Indicator::new(LogDoor, config.blink()));
    indicator.close();

    let access_point = Arc::new(AccessPoint::new(correlator, indicator, &config));
    let workers = access_point.spawn_workers()?;

    println!("Type 'entry' or 'exit' to trip a sensor, 'quit' to stop.");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let event = match line.trim() {
            "entry" | "in" | "e" => SensorEvent::EntryTrip,
            "exit" | "out" | "x" => SensorEvent::ExitTrip,
            "quit" | "q" => break,
            "" => continue,
            other => {
                println!("unknown sensor '{}' (try: entry, exit, quit)", other);
                continue;
            }
        };
        workers.trigger(event);
    }

    workers.shutdown();
    tracing::info!("Client stopped");
    Ok(())
}

fn build_config(args: &Args) -> storegate::Result<Config> {
    let base = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(server) = &args.server {
        builder = builder.server_addr(server);
    }
    if let Some(dwell) = args.dwell_ms {
        builder = builder.door_dwell_ms(dwell);
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}
