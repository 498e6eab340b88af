//! Bridge configuration: the parsed AMQP URL, downstream socket domain
//! selection, and the runtime knobs from the configuration table.

use std::fmt;

use sg_core::config_error;
use sg_core::constants::{DEFAULT_RING_SLOTS, DEFAULT_SLOT_CAPACITY};
use sg_core::{Result, SgError};

use crate::cli::Args;

/// A parsed `amqp://[user[:pw]@]host[:port]/address` URL.
///
/// Hand-rolled rather than regex-based: the teacher's stack carries no
/// regex dependency, and this grammar is simple enough to split on `@`,
/// `:` and the first `/` without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmqpUrl {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub address: String,
}

impl AmqpUrl {
    /// Default AMQP port when the URL omits one.
    const DEFAULT_PORT: u16 = 5672;

    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix("amqp://")
            .ok_or_else(|| config_error!("amqp_url must start with 'amqp://': {raw}"))?;

        let (authority_and_host, address) = rest
            .split_once('/')
            .ok_or_else(|| config_error!("amqp_url is missing an address path: {raw}"))?;
        if address.is_empty() {
            return Err(config_error!("amqp_url address must not be empty: {raw}"));
        }

        let (userinfo, host_port) = match authority_and_host.split_once('@') {
            Some((userinfo, host_port)) => (Some(userinfo), host_port),
            None => (None, authority_and_host),
        };

        let (user, password) = match userinfo {
            Some(userinfo) => match userinfo.split_once(':') {
                Some((u, p)) => (Some(u.to_string()), Some(p.to_string())),
                None => (Some(userinfo.to_string()), None),
            },
            None => (None, None),
        };

        if host_port.is_empty() {
            return Err(config_error!("amqp_url is missing a host: {raw}"));
        }

        let (host, port) = match host_port.split_once(':') {
            Some((host, port_str)) => {
                let port: u16 = port_str
                    .parse()
                    .map_err(|_| config_error!("amqp_url has a non-numeric port: {port_str}"))?;
                (host.to_string(), port)
            }
            None => (host_port.to_string(), Self::DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(config_error!("amqp_url is missing a host: {raw}"));
        }

        Ok(Self { user, password, host, port, address: address.to_string() })
    }
}

impl fmt::Display for AmqpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amqp://{}:{}/{}", self.host, self.port, self.address)
    }
}

/// Downstream datagram peer selection.
#[derive(Debug, Clone)]
pub enum SocketDomain {
    /// `AF_UNIX`/`SOCK_SEQPACKET` at the given path.
    Unix { path: String },
    /// `AF_INET`/`SOCK_DGRAM` at the given host/port.
    Inet { host: String, port: u16 },
}

/// Fully resolved bridge configuration: CLI flags combined with defaults.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub amqp: AmqpUrl,
    pub domain: SocketDomain,
    /// When true, downstream sends block instead of using `MSG_DONTWAIT`.
    pub block: bool,
    pub stat_period_secs: u64,
    pub container_id: String,
    /// Stop after this many received messages; 0 means unlimited.
    pub message_count: u64,
    pub standalone: bool,
    pub verbose: u8,
    pub ring_slots: usize,
    pub slot_capacity: usize,
}

impl BridgeConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let amqp = AmqpUrl::parse(&args.amqp_url)?;

        let domain = match args.gw_inet {
            Some(host_port) => {
                let (host, port) = match host_port.split_once(':') {
                    Some((host, port_str)) => {
                        let port: u16 = port_str.parse().map_err(|_| {
                            config_error!("gw_inet has a non-numeric port: {port_str}")
                        })?;
                        (host.to_string(), port)
                    }
                    None => (host_port, sg_core::constants::DEFAULT_INET_PORT),
                };
                SocketDomain::Inet { host, port }
            }
            None => {
                let path = args.gw_unix.unwrap_or_else(|| {
                    sg_core::constants::DEFAULT_UNIX_SOCKET_PATH.to_string()
                });
                SocketDomain::Unix { path }
            }
        };

        let container_id = args.cid.unwrap_or_else(sg_core::default_container_id);

        Ok(Self {
            amqp,
            domain,
            block: args.block,
            stat_period_secs: args.stat_period,
            container_id,
            message_count: args.count,
            standalone: args.standalone,
            verbose: args.verbose,
            ring_slots: DEFAULT_RING_SLOTS,
            slot_capacity: DEFAULT_SLOT_CAPACITY,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_url() {
        let url = AmqpUrl::parse("amqp://guest:pw@broker.local:5673/collectd/telemetry").unwrap();
        assert_eq!(url.user.as_deref(), Some("guest"));
        assert_eq!(url.password.as_deref(), Some("pw"));
        assert_eq!(url.host, "broker.local");
        assert_eq!(url.port, 5673);
        assert_eq!(url.address, "collectd/telemetry");
    }

    #[test]
    fn defaults_port_when_omitted() {
        let url = AmqpUrl::parse("amqp://broker.local/addr").unwrap();
        assert_eq!(url.port, 5672);
        assert!(url.user.is_none());
    }

    #[test]
    fn user_without_password() {
        let url = AmqpUrl::parse("amqp://guest@broker.local/addr").unwrap();
        assert_eq!(url.user.as_deref(), Some("guest"));
        assert!(url.password.is_none());
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(matches!(
            AmqpUrl::parse("broker.local/addr"),
            Err(SgError::Config { .. })
        ));
    }

    #[test]
    fn rejects_missing_address() {
        assert!(matches!(
            AmqpUrl::parse("amqp://broker.local"),
            Err(SgError::Config { .. })
        ));
    }

    #[test]
    fn rejects_empty_address() {
        assert!(matches!(
            AmqpUrl::parse("amqp://broker.local/"),
            Err(SgError::Config { .. })
        ));
    }
}
