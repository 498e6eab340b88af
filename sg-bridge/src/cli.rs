//! Command-line surface for `sg-bridge`, mapped 1:1 onto the
//! configuration table: `amqp_url`, `gw_unix`/`gw_inet`, `block`,
//! `stat_period`, `cid`, `count`, `standalone`, `verbose`.

use clap::Parser;

/// AMQP 1.0 to UNIX/INET datagram telemetry bridge.
#[derive(Parser, Debug)]
#[command(name = "sg-bridge", version, about)]
pub struct Args {
    /// amqp://[user[:pw]@]host[:port]/address of the upstream router or broker.
    #[arg(long, default_value = "amqp://127.0.0.1:5672/collectd/telemetry")]
    pub amqp_url: String,

    /// Select the UNIX domain downstream, optionally overriding the socket path.
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "/tmp/smartgateway")]
    pub gw_unix: Option<String>,

    /// Select the INET UDP downstream: host[:port] (default port 30000).
    #[arg(long, value_name = "HOST[:PORT]", conflicts_with = "gw_unix")]
    pub gw_inet: Option<String>,

    /// Block on downstream send instead of using MSG_DONTWAIT.
    #[arg(long)]
    pub block: bool,

    /// Seconds between stat reports; 0 disables reporting.
    #[arg(long, default_value_t = 1)]
    pub stat_period: u64,

    /// AMQP container id; unique. Defaults to `sa-<8 hex chars>`.
    #[arg(long)]
    pub cid: Option<String>,

    /// Stop after this many AMQP messages received; 0 = unlimited.
    #[arg(long, default_value_t = 0)]
    pub count: u64,

    /// Listen for an incoming AMQP connection instead of dialling one.
    #[arg(long)]
    pub standalone: bool,

    /// Increase log verbosity. Repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
