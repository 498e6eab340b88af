//! Command-line surface for `sg-generator`.
//!
//! Flag names follow `original_source/generator/gen.c`'s getopt table
//! (`-i`, `-a`, `-c`, `-n`, `-o`, `-m`, `-t`, `-b`, `-s`, `-p`, `-v`); the
//! template selector is not present in the distilled flag set and is
//! added here so the three payload shapes in the data model are
//! actually reachable from the CLI.

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "sg-generator", version, about = "Synthetic AMQP 1.0 telemetry load generator")]
pub struct Args {
    /// AMQP peer hostname or address.
    #[arg(default_value = "127.0.0.1")]
    pub amqp_ip: String,

    /// AMQP peer port.
    #[arg(default_value_t = 5672)]
    pub amqp_port: u16,

    /// Container id. A random `sa-<hex>` id is generated if omitted.
    #[arg(short = 'i', long)]
    pub cid: Option<String>,

    /// Target address (link name) to send to.
    #[arg(short = 'a', long, default_value = "collectd/telemetry")]
    pub address: String,

    /// Total messages to send before closing, per thread. 0 means unbounded.
    #[arg(short = 'c', long, default_value_t = 0)]
    pub count: u64,

    /// Number of records per message body.
    #[arg(short = 'n', long = "num-per-msg", default_value_t = 1)]
    pub cd_per_mesg: usize,

    /// Number of distinct synthetic hosts to rotate through.
    #[arg(short = 'o', long, default_value_t = 10)]
    pub num_hosts: usize,

    /// Number of distinct metric series per host.
    #[arg(short = 'm', long, default_value_t = 10)]
    pub metrics_per_host: usize,

    /// Number of independent sender threads.
    #[arg(short = 't', long, default_value_t = 1)]
    pub num_threads: usize,

    /// Messages sent per burst before pausing. 0 means unbounded.
    #[arg(short = 'b', long, default_value_t = 0)]
    pub burst_size: usize,

    /// Microseconds to sleep between bursts.
    #[arg(short = 's', long, default_value_t = 0)]
    pub sleep_usec: u64,

    /// Send presettled (fire-and-forget) rather than waiting for settlement.
    #[arg(short = 'p', long)]
    pub presettle: bool,

    /// Payload shape to emit.
    #[arg(long, value_enum, default_value_t = TemplateArg::Metric)]
    pub template: TemplateArg,

    /// Verbosity; repeat for more detail (-v, -vv, -vvv).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateArg {
    Metric,
    Log,
    Event,
}
