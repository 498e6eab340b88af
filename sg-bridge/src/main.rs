//! `sg-bridge`: unidirectional AMQP 1.0 to UNIX/INET datagram telemetry
//! bridge. See `BridgeSupervisor` for the worker lifecycle.

mod cli;
mod config;
mod egress;
mod receiver;
mod supervisor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::config::BridgeConfig;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = BridgeConfig::from_args(args)?;
    info_startup(&config);

    let shutdown = Arc::new(AtomicBool::new(true));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            tracing::info!("signal received, stopping bridge workers");
            shutdown.store(false, Ordering::Release);
        })
        .expect("failed to install signal handler");
    }

    match supervisor::run(config, shutdown) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("sg-bridge: fatal error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn info_startup(config: &BridgeConfig) {
    if config.standalone {
        tracing::info!("standalone mode");
    } else {
        tracing::info!(host = %config.amqp.host, port = config.amqp.port, "connecting to QDR");
    }
    match &config.domain {
        config::SocketDomain::Unix { path } => tracing::info!(%path, "UNIX downstream socket"),
        config::SocketDomain::Inet { host, port } => tracing::info!(%host, port, "INET downstream socket"),
    }
    tracing::info!(address = %config.amqp.address, cid = %config.container_id, "AMQP endpoint");
}
