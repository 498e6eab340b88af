//! `sg-generator`: synthetic collectd/rsyslog/Ceilometer AMQP 1.0 load
//! generator. See `GeneratorBurstScheduler` (`scheduler::run`) for the
//! per-thread send loop.

mod cli;
mod config;
mod scheduler;
mod templates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use sg_core::Counters;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::config::GeneratorConfig;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Arc::new(GeneratorConfig::from_args(args)?);
    info_startup(&config);

    let counters = Arc::new(Counters::new());
    let running = Arc::new(AtomicBool::new(true));

    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            tracing::info!("signal received, stopping sender threads");
            running.store(false, Ordering::Release);
        })
        .expect("failed to install signal handler");
    }

    let exit_code = scheduler::run(config, counters, running)?;
    std::process::exit(exit_code);
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

fn info_startup(config: &GeneratorConfig) {
    tracing::info!(
        host = %config.amqp_host,
        port = config.amqp_port,
        address = %config.address,
        cid = %config.container_id,
        threads = config.num_threads,
        template = ?config.template,
        presettle = config.presettle,
        "starting generator"
    );
}
