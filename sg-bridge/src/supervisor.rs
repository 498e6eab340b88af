//! BridgeSupervisor (C4): owns configuration and the ring, starts the
//! receiver and egress workers on separate threads, and coordinates
//! shutdown asymmetrically — the receiver exits cleanly via the AMQP
//! close path, the egress worker is a blocking consumer and is instead
//! asked to stop via a shared flag observed at every ring wakeup.
//!
//! Grounded on `original_source/bridge/bridge.c`'s `main` stat loop and
//! join/cancel ordering; `pthread_cancel` is replaced by the cooperative
//! `AtomicBool` + condvar-wakeup pattern `sg_core::Ring::pop_while` and
//! `Ring::wake_all` implement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sg_core::{Counters, Ring};
use tracing::info;

use crate::config::BridgeConfig;
use crate::{egress, receiver};

/// Process exit code the supervisor should report to `main`.
///
/// `shutdown` is polled once per stat tick; a caller (`main`, via a
/// `ctrlc` handler) clears it to request a clean shutdown indistinguishable
/// from either worker exiting on its own.
pub fn run(config: BridgeConfig, shutdown: Arc<AtomicBool>) -> sg_core::Result<i32> {
    let counters = Arc::new(Counters::new());
    let ring = Arc::new(Ring::alloc(config.ring_slots, config.slot_capacity, counters.clone())?);

    let receiver_running = Arc::new(AtomicBool::new(true));
    let egress_running = Arc::new(AtomicBool::new(true));

    let receiver_handle = {
        let ring = ring.clone();
        let counters = counters.clone();
        let running = receiver_running.clone();
        let config = config.clone();
        thread::Builder::new()
            .name("amqp-receiver".into())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build receiver runtime");
                let result = rt.block_on(receiver::run(&config, &ring, &counters, &running));
                running.store(false, Ordering::Release);
                result
            })
            .expect("failed to spawn amqp-receiver thread")
    };

    let egress_handle = {
        let ring = ring.clone();
        let counters = counters.clone();
        let running = egress_running.clone();
        let config = config.clone();
        thread::Builder::new()
            .name("socket-egress".into())
            .spawn(move || {
                let result = egress::run(&config, &ring, &counters, &running);
                running.store(false, Ordering::Release);
                result
            })
            .expect("failed to spawn socket-egress thread")
    };

    let mut sleep_count: u64 = 1;
    let mut last_amqp_received = 0u64;
    let mut last_overruns = 0u64;
    let mut last_sock_sent = 0u64;

    let exit_code = loop {
        thread::sleep(Duration::from_secs(1));

        if config.stat_period_secs > 0 && sleep_count >= config.stat_period_secs {
            info!(
                received = counters.amqp_received(),
                received_delta = counters.amqp_received() - last_amqp_received,
                overruns = counters.overruns(),
                overruns_delta = counters.overruns() - last_overruns,
                sent = counters.sock_sent(),
                sent_delta = counters.sock_sent() - last_sock_sent,
                "bridge stats"
            );
            sleep_count = 0;
        }
        sleep_count += 1;
        last_amqp_received = counters.amqp_received();
        last_overruns = counters.overruns();
        last_sock_sent = counters.sock_sent();

        if !shutdown.load(Ordering::Acquire) {
            info!("shutdown requested, cancelling both workers");
            receiver_running.store(false, Ordering::Release);
            egress_running.store(false, Ordering::Release);
            ring.wake_all();
            let receiver_result = receiver_handle.join().expect("receiver thread panicked");
            let egress_result = egress_handle.join().expect("egress thread panicked");
            break exit_code_for(egress_result, receiver_result);
        }
        if !egress_running.load(Ordering::Acquire) {
            info!("egress worker exited, joining and cancelling receiver");
            let egress_result = egress_handle.join().expect("egress thread panicked");
            receiver_running.store(false, Ordering::Release);
            ring.wake_all();
            let receiver_result = receiver_handle.join().expect("receiver thread panicked");
            break exit_code_for(egress_result, receiver_result);
        }
        if !receiver_running.load(Ordering::Acquire) {
            info!("receiver worker exited, joining and cancelling egress");
            let receiver_result = receiver_handle.join().expect("receiver thread panicked");
            egress_running.store(false, Ordering::Release);
            ring.wake_all();
            let egress_result = egress_handle.join().expect("egress thread panicked");
            break exit_code_for(egress_result, receiver_result);
        }
    };

    Ok(exit_code)
}

fn exit_code_for(
    egress_result: sg_core::Result<()>,
    receiver_result: sg_core::Result<receiver::ReceiverExit>,
) -> i32 {
    match receiver_result {
        Ok(receiver::ReceiverExit::CountReached) => 1,
        Ok(receiver::ReceiverExit::ProactorInactive) | Ok(receiver::ReceiverExit::Cancelled) => {
            if egress_result.is_err() {
                1
            } else {
                0
            }
        }
        Err(_) => 1,
    }
}
