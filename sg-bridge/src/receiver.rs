//! AMQPReceiver (C2): drives one receiver link over an async AMQP 1.0
//! event loop, reassembles deliveries into the ring's head slot, settles
//! with `ACCEPTED`, and keeps outstanding credit pinned to free ring
//! capacity.
//!
//! Grounded on `original_source/bridge/amqp_rcv_th.c`'s `handle_receive`
//! and the `PN_CONNECTION_INIT`/`PN_CONNECTION_BOUND`/`PN_DELIVERY`
//! dispatch in `handle`. fe2o3-amqp's `Receiver::recv` already reassembles
//! a delivery's transfer frames before returning it, so the wire-level
//! partial-frame bookkeeping `pn_link_recv` did by hand is internal to
//! the link implementation here; this module keeps the rest of the
//! algorithm (slot write, commit, settle, credit top-up, stop-at-count)
//! exactly as specified, driven off of one complete `Delivery` per loop
//! iteration instead of one transfer frame per iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fe2o3_amqp::acceptor::{ConnectionAcceptor, LinkAcceptor, LinkEndpoint, SessionAcceptor};
use fe2o3_amqp::sasl_profile::SaslProfile;
use fe2o3_amqp::link::receiver::CreditMode;
use fe2o3_amqp::link::{Receiver, RecvError};
use fe2o3_amqp::{Connection, Session};
use fe2o3_amqp_types::messaging::{Body, Message};
use fe2o3_amqp_types::primitives::Value;
use sg_core::{Counters, Ring};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;

/// Reason the receive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverExit {
    /// `message_count` was reached; the supervisor should treat this as
    /// a worker-initiated shutdown (exit code 1 per §6).
    CountReached,
    /// The proactor went inactive on its own (clean peer-initiated close).
    ProactorInactive,
    /// The supervisor asked us to stop.
    Cancelled,
}

/// Outcome of placing one complete delivery's bytes into the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryOutcome {
    Committed,
    /// Ring was full at commit time; dropped and counted by the ring itself.
    OverrunDropped,
    /// Delivery exceeded the slot's byte capacity; dropped here.
    TooLarge,
}

/// Encode `message` and write it into the ring's head slot, committing on
/// success. Pulled out as a pure function so it is testable without a
/// network connection.
///
/// Per §4.2 step 6, sub-steps a-d (commit attempt, max-queue observation,
/// settlement, `amqp_received` increment) run for every *complete*
/// delivery regardless of whether the commit itself lands or overruns —
/// an overrun is still a delivery the peer presented to us, just one the
/// ring had no room for.
fn apply_delivery(ring: &Ring, counters: &Counters, message: &Message<Body<Value>>) -> DeliveryOutcome {
    let bytes = match serde_amqp::to_vec(message) {
        Ok(bytes) => bytes,
        Err(_) => return DeliveryOutcome::TooLarge,
    };

    let slot = ring.head_slot();
    slot.clear();
    if slot.extend_from_slice(&bytes).is_err() {
        slot.clear();
        return DeliveryOutcome::TooLarge;
    }

    let committed = ring.commit();
    counters.inc_amqp_received();
    counters.observe_max_q_depth(ring.in_use() as u64);
    if committed {
        DeliveryOutcome::Committed
    } else {
        DeliveryOutcome::OverrunDropped
    }
}

/// Additional credit to grant so that outstanding credit never exceeds
/// free ring capacity (the central backpressure invariant, §9).
fn credit_topup(current_credit: u32, free_capacity: usize) -> u32 {
    let free_capacity = free_capacity as u32;
    free_capacity.saturating_sub(current_credit)
}

/// Drive the receiver's event loop until a terminal event, `message_count`
/// is reached, or `running` is cleared by the supervisor.
pub async fn run(
    config: &BridgeConfig,
    ring: &Ring,
    counters: &Counters,
    running: &AtomicBool,
) -> sg_core::Result<ReceiverExit> {
    let initial_credit = ring.capacity() as u32;

    let mut receiver = if config.standalone {
        attach_as_listener(config).await?
    } else {
        attach_as_client(config).await?
    };

    receiver
        .set_credit(initial_credit)
        .await
        .map_err(|e| sg_core::amqp_error!("failed to grant initial credit: {e}"))?;
    let mut credit = initial_credit;
    info!(credit, "receiver link attached, initial credit granted");

    loop {
        if !running.load(Ordering::Acquire) {
            return Ok(ReceiverExit::Cancelled);
        }

        let delivery = match tokio::time::timeout(Duration::from_millis(200), receiver.recv::<Body<Value>>()).await {
            Ok(Ok(delivery)) => delivery,
            Ok(Err(RecvError::Aborted)) => {
                // §4.2 step 3: an aborted delivery is a Transient error (§7),
                // not a Transport/protocol one. `recv` never hands back a
                // `Delivery` to settle explicitly for an aborted transfer —
                // the link considers it already disposed — so there is no
                // ring slot to zero (the head slot was never written to for
                // this iteration) and nothing to `accept`; the only
                // remaining obligation is to compensate the peer with the
                // one credit this delivery consumed.
                debug!("delivery aborted by peer, replenishing one credit");
                receiver
                    .set_credit(credit + 1)
                    .await
                    .map_err(|e| sg_core::amqp_error!("failed to replenish credit after abort: {e}"))?;
                credit += 1;
                continue;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "receiver link error, closing");
                return Err(sg_core::amqp_error!("receiver recv failed: {e}"));
            }
            Err(_elapsed) => continue,
        };

        match apply_delivery(ring, counters, delivery.message()) {
            DeliveryOutcome::Committed => {
                receiver
                    .accept(&delivery)
                    .await
                    .map_err(|e| sg_core::amqp_error!("failed to settle delivery: {e}"))?;
            }
            DeliveryOutcome::OverrunDropped => {
                debug!("ring overrun, delivery dropped");
                receiver
                    .accept(&delivery)
                    .await
                    .map_err(|e| sg_core::amqp_error!("failed to settle delivery: {e}"))?;
            }
            DeliveryOutcome::TooLarge => {
                counters.inc_amqp_decode_errs();
                debug!("delivery exceeded slot capacity, dropped");
                receiver
                    .accept(&delivery)
                    .await
                    .map_err(|e| sg_core::amqp_error!("failed to settle delivery: {e}"))?;
            }
        }

        let free = ring.free_count() as u32;
        if credit < free {
            let grant = credit_topup(credit, free as usize);
            receiver
                .set_credit(credit + grant)
                .await
                .map_err(|e| sg_core::amqp_error!("failed to top up credit: {e}"))?;
            credit += grant;
        }

        if config.message_count > 0 && counters.amqp_received() >= config.message_count {
            info!(received = counters.amqp_received(), "message_count reached, closing");
            return Ok(ReceiverExit::CountReached);
        }
    }
}

async fn attach_as_client(config: &BridgeConfig) -> sg_core::Result<Receiver> {
    let url = format!("amqp://{}:{}", config.amqp.host, config.amqp.port);
    info!(%url, address = %config.amqp.address, "connecting to AMQP peer");

    let mut connection = Connection::builder()
        .container_id(config.container_id.clone())
        .sasl_profile(SaslProfile::Anonymous)
        .open(url.as_str())
        .await
        .map_err(|e| sg_core::amqp_error!("connection open failed: {e}"))?;

    let mut session = Session::begin(&mut connection)
        .await
        .map_err(|e| sg_core::amqp_error!("session begin failed: {e}"))?;

    let receiver = Receiver::builder()
        .name("sa_receiver")
        .source(config.amqp.address.clone())
        .credit_mode(CreditMode::Manual)
        .attach(&mut session)
        .await
        .map_err(|e| sg_core::amqp_error!("receiver attach failed: {e}"))?;

    Ok(receiver)
}

async fn attach_as_listener(config: &BridgeConfig) -> sg_core::Result<Receiver> {
    let bind_addr = format!("{}:{}", config.amqp.host, config.amqp.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(sg_core::SgError::Io)?;
    info!(addr = %listener.local_addr().map_err(sg_core::SgError::Io)?, "listening for AMQP connections");

    let (stream, peer) = listener.accept().await.map_err(sg_core::SgError::Io)?;
    info!(%peer, "accepted AMQP connection");

    let connection_acceptor = ConnectionAcceptor::new(config.container_id.clone());
    let mut connection = connection_acceptor
        .accept(stream)
        .await
        .map_err(|e| sg_core::amqp_error!("listener connection accept failed: {e}"))?;

    let mut session = SessionAcceptor::new()
        .accept(&mut connection)
        .await
        .map_err(|e| sg_core::amqp_error!("listener session accept failed: {e}"))?;

    let link_acceptor = LinkAcceptor::new();
    loop {
        match link_acceptor
            .accept(&mut session)
            .await
            .map_err(|e| sg_core::amqp_error!("listener link accept failed: {e}"))?
        {
            LinkEndpoint::Receiver(receiver) => return Ok(receiver),
            LinkEndpoint::Sender(_) => {
                warn!("peer attached a sender link to the receiver-only bridge, ignoring");
                continue;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fe2o3_amqp_types::messaging::Message;

    use super::*;

    fn message_with_body(bytes: &[u8]) -> Message<Body<Value>> {
        Message::builder()
            .data(bytes.to_vec())
            .build()
    }

    #[test]
    fn commits_a_small_delivery() {
        let counters = Arc::new(Counters::new());
        let ring = Ring::alloc(4, 64, counters.clone()).unwrap();
        let msg = message_with_body(b"hello");

        assert_eq!(apply_delivery(&ring, &counters, &msg), DeliveryOutcome::Committed);
        assert_eq!(counters.amqp_received(), 1);
        assert_eq!(ring.in_use(), 1);
    }

    #[test]
    fn overrun_is_counted_not_fatal() {
        let counters = Arc::new(Counters::new());
        let ring = Ring::alloc(2, 64, counters.clone()).unwrap();
        let msg = message_with_body(b"A");

        // N=2 has zero usable slots before the consumer ever runs (the
        // ring's own free-count formula: free = N - 1 - 1 = 0), so every
        // delivery overruns from the very first one.
        assert_eq!(apply_delivery(&ring, &counters, &msg), DeliveryOutcome::OverrunDropped);
        assert_eq!(apply_delivery(&ring, &counters, &msg), DeliveryOutcome::OverrunDropped);
        assert_eq!(counters.overruns(), 2);
        assert_eq!(counters.amqp_received(), 2);
    }

    #[test]
    fn fill_and_overrun_scenario_still_counts_every_delivery_received() {
        // Literal scenario 2 (§8): N=2, push 5 deliveries of "A" with
        // nobody consuming. Every delivery overruns, but all 5 must still
        // count as amqp_received — overrun is a disposition of the
        // commit, not a reason to skip the receive accounting.
        let counters = Arc::new(Counters::new());
        let ring = Ring::alloc(2, 64, counters.clone()).unwrap();
        let msg = message_with_body(b"A");

        for _ in 0..5 {
            apply_delivery(&ring, &counters, &msg);
        }

        assert_eq!(counters.amqp_received(), 5);
        assert!(counters.overruns() >= 3);
        assert!(ring.in_use() <= 2);
    }

    #[test]
    fn credit_never_exceeds_free_capacity() {
        assert_eq!(credit_topup(0, 10), 10);
        assert_eq!(credit_topup(10, 10), 0);
        assert_eq!(credit_topup(12, 10), 0);
    }
}
