//! SocketEgress (C3): drains the ring on a blocking thread, decodes each
//! slot as a framed AMQP message, extracts the body's first binary value,
//! and sends it as one datagram per message.
//!
//! Grounded on `original_source/bridge/socket_snd_th.c`: one scratch
//! message reused across iterations (here: one `serde_amqp::from_slice`
//! call per slot, there is no long-lived scratch object to clear because
//! `serde_amqp` decodes into an owned value rather than reusing a parser
//! handle — the "no reallocate" contract from the design notes is instead
//! honored by the ring slot itself, which is never reallocated), and one
//! `sendto`-equivalent per message with `MSG_DONTWAIT` accounting.

use std::net::ToSocketAddrs;
use std::sync::atomic::AtomicBool;

use fe2o3_amqp_types::messaging::{Body, Message};
use fe2o3_amqp_types::primitives::Value;
use socket2::{Domain, SockAddr, Socket, Type};
use sg_core::{Counters, Ring};
use tracing::{debug, warn};

use crate::config::{BridgeConfig, SocketDomain};

/// Extract the message body's first binary element, if present.
fn extract_body_bytes(message: &Message<Body<Value>>) -> Option<Vec<u8>> {
    match &message.body {
        Body::Data(batch) => batch.iter().next().map(|d| d.0.to_vec()),
        _ => None,
    }
}

fn open_socket(domain: &SocketDomain) -> sg_core::Result<(Socket, SockAddr)> {
    match domain {
        SocketDomain::Unix { path } => {
            let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)
                .map_err(|e| sg_core::SgError::socket(format!("opening UNIX datagram socket: {e}")))?;
            let addr = SockAddr::unix(path)
                .map_err(|e| sg_core::SgError::socket(format!("invalid UNIX socket path {path}: {e}")))?;
            Ok((socket, addr))
        }
        SocketDomain::Inet { host, port } => {
            let resolved = (host.as_str(), *port)
                .to_socket_addrs()
                .map_err(|e| sg_core::SgError::socket(format!("resolving {host}:{port}: {e}")))?
                .next()
                .ok_or_else(|| sg_core::SgError::socket(format!("no addresses for {host}:{port}")))?;
            let socket = Socket::new(Domain::for_address(resolved), Type::DGRAM, None)
                .map_err(|e| sg_core::SgError::socket(format!("opening INET datagram socket: {e}")))?;
            Ok((socket, resolved.into()))
        }
    }
}

/// Drain the ring until `running` is cleared, sending one datagram per
/// decoded AMQP message.
pub fn run(config: &BridgeConfig, ring: &Ring, counters: &Counters, running: &AtomicBool) -> sg_core::Result<()> {
    let (socket, peer_addr) = open_socket(&config.domain)?;
    socket
        .connect(&peer_addr)
        .map_err(|e| sg_core::SgError::socket(format!("connecting send socket: {e}")))?;

    let send_flags: i32 = if config.block { 0 } else { libc::MSG_DONTWAIT };

    tracing::info!(domain = ?config.domain, block = config.block, "egress socket ready");

    while let Some(slot) = ring.pop_while(running) {
        let bytes = slot.as_bytes();

        let message: Message<Body<Value>> = match serde_amqp::from_slice(bytes) {
            Ok(message) => message,
            Err(e) => {
                counters.inc_amqp_decode_errs();
                debug!(error = %e, "AMQP decode failed");
                continue;
            }
        };

        let Some(body) = extract_body_bytes(&message) else {
            debug!("message had no binary body, skipping");
            continue;
        };
        drop(slot);

        match socket.send_with_flags(&body, send_flags) {
            Ok(_) => counters.inc_sock_sent(),
            Err(e) if would_block(&e) => counters.inc_sock_would_block(),
            Err(e) => warn!(error = %e, "datagram send failed"),
        }
    }

    Ok(())
}

fn would_block(e: &std::io::Error) -> bool {
    matches!(e.kind(), std::io::ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_binary_body_value() {
        let msg: Message<Body<Value>> = Message::builder().data(b"hello".to_vec()).build();
        assert_eq!(extract_body_bytes(&msg), Some(b"hello".to_vec()));
    }

    #[test]
    fn non_data_body_yields_no_bytes() {
        let msg: Message<Body<Value>> = Message::builder().value(Value::Bool(true)).build();
        assert_eq!(extract_body_bytes(&msg), None);
    }

    #[test]
    fn unix_socket_domain_resolves_to_a_unix_sockaddr() {
        let (_socket, addr) =
            open_socket(&SocketDomain::Unix { path: "/tmp/sg-bridge-test.sock".to_string() }).unwrap();
        assert!(addr.is_unix());
    }
}
