//! GeneratorBurstScheduler (C5): `num_threads` independent sender links,
//! each looping burst-send/sleep over a rotating host/metric list until
//! `message_count` is reached or the process is asked to stop.
//!
//! Grounded on `original_source/generator/amqp_snd_th.c`'s `send_burst`
//! and `handle` (the `PN_LINK_FLOW` burst trigger and `PN_DELIVERY`
//! settlement handling) and `gen.c`'s `run` (one detached pthread per
//! `-t` thread, each with its own connection). The original polls
//! `pn_link_credit` and only starts a burst once credit exceeds
//! `MIN_BURST_CREDIT`; `fe2o3_amqp::link::Sender::send` already awaits
//! available credit internally; this scheduler transfers the burst-size
//! cap from the original (how many messages to push before yielding back
//! to the reactor) but delegates the credit wait itself to `send`'s
//! await point rather than polling link state by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fe2o3_amqp::sasl_profile::SaslProfile;
use fe2o3_amqp::link::Sender;
use fe2o3_amqp::{Connection, Sendable, Session};
use fe2o3_amqp_types::messaging::{ApplicationProperties, Body, Message, Outcome};
use fe2o3_amqp_types::primitives::Value;
use sg_core::Counters;
use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;
use crate::templates::{build_host_metrics, render, Scratch};

/// Why a sender thread's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    /// `message_count` (tracked via settlement acknowledgements) was reached.
    CountReached,
    /// The supervisor asked this thread to stop.
    Cancelled,
}

fn now_epoch_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// Render the timestamp string a payload template embeds. `Log` uses an
/// ISO-8601 string with a fixed `+02:00` suffix, matching the literal
/// (non-timezone-aware) convention `amqp_snd_th.c` hardcodes; the other
/// templates use collectd's `seconds.nanoseconds` convention.
fn render_timestamp(template: crate::templates::PayloadTemplate) -> String {
    if template.uses_iso8601_timestamp() {
        let now = chrono::Local::now();
        format!("{}+02:00", now.format("%Y-%m-%dT%H:%M:%S"))
    } else {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        format!("{}.{:09}", since_epoch.as_secs(), since_epoch.subsec_nanos())
    }
}

/// Drive one sender thread's connection, session and link to completion.
pub async fn run_sender_thread(
    config: &GeneratorConfig,
    thread_index: usize,
    counters: &Counters,
    running: &AtomicBool,
) -> sg_core::Result<SchedulerExit> {
    let url = format!("amqp://{}:{}", config.amqp_host, config.amqp_port);
    let container_id = format!("{}-{thread_index}", config.container_id);

    let mut connection = Connection::builder()
        .container_id(container_id)
        .sasl_profile(SaslProfile::Anonymous)
        .open(url.as_str())
        .await
        .map_err(|e| sg_core::amqp_error!("connection open failed: {e}"))?;

    let mut session =
        Session::begin(&mut connection).await.map_err(|e| sg_core::amqp_error!("session begin failed: {e}"))?;

    let mut sender: Sender = Sender::builder()
        .name(format!("sa_sender_{thread_index}"))
        .target(config.address.clone())
        .attach(&mut session)
        .await
        .map_err(|e| sg_core::amqp_error!("sender attach failed: {e}"))?;

    info!(thread_index, address = %config.address, "sender link attached");

    let mut hosts = build_host_metrics(config.num_hosts, config.metrics_per_host);
    let mut cursor = 0usize;
    let mut scratch = Scratch::new(config.scratch_capacity);

    let exit = 'outer: loop {
        if !running.load(Ordering::Acquire) {
            break SchedulerExit::Cancelled;
        }
        if config.message_count > 0 && counters.metrics_sent() >= config.message_count {
            break SchedulerExit::CountReached;
        }

        counters.inc_total_bursts();
        let burst_cap = config.burst_size.unwrap_or(usize::MAX);

        let mut sent_this_burst = 0usize;
        while sent_this_burst < burst_cap {
            // An unbounded burst (`--burst-size 0`, the default) combined
            // with an unbounded count (`--count 0`, the default) would
            // otherwise spin in here forever and never observe a `ctrlc`
            // shutdown request, which only sets `running` and relies on
            // this loop to notice it.
            if !running.load(Ordering::Acquire) {
                break 'outer SchedulerExit::Cancelled;
            }
            if config.message_count > 0 && counters.metrics_sent() >= config.message_count {
                break;
            }

            let now = render_timestamp(config.template);
            if let Err(e) = render(&mut scratch, config.template, &mut hosts, &mut cursor, config.cd_per_mesg, &now) {
                warn!(error = %e, "payload render overflowed scratch buffer, skipping burst entry");
                break;
            }

            let props = ApplicationProperties::builder()
                .insert("SendTime", Value::Long(now_epoch_millis()))
                .insert("AMQPSent", Value::Long(counters.amqp_sent() as i64))
                .build();
            let message: Message<Body<Value>> =
                Message::builder().application_properties(props).data(scratch.as_bytes().to_vec()).build();

            let sendable = Sendable::builder().message(message).settled(config.presettle).build();

            match sender.send(sendable).await {
                Ok(outcome) => {
                    counters.inc_amqp_sent();
                    counters.add_metrics_sent(config.cd_per_mesg as u64);
                    if !config.presettle && matches!(outcome, Outcome::Accepted(_)) {
                        counters.add_acknowledged(config.cd_per_mesg as u64);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "send failed, closing sender link");
                    return Err(sg_core::amqp_error!("send failed: {e}"));
                }
            }

            sent_this_burst += 1;
        }

        debug!(thread_index, sent_this_burst, "burst complete");

        if config.sleep_usec > 0 {
            tokio::time::sleep(Duration::from_micros(config.sleep_usec)).await;
        }
    };

    if let Err(e) = sender.close().await {
        debug!(error = %e, "sender close failed, ignoring");
    }
    if let Err(e) = session.close().await {
        debug!(error = %e, "session close failed, ignoring");
    }
    if let Err(e) = connection.close().await {
        debug!(error = %e, "connection close failed, ignoring");
    }

    Ok(exit)
}

/// Spawn `config.num_threads` sender threads, each with its own
/// current-thread Tokio runtime (mirroring `sg-bridge`'s receiver thread
/// and the original's one-pthread-per-`-t` model), and wait for all of
/// them to finish.
pub fn run(config: Arc<GeneratorConfig>, counters: Arc<Counters>, running: Arc<AtomicBool>) -> sg_core::Result<i32> {
    let mut handles = Vec::with_capacity(config.num_threads);

    for thread_index in 0..config.num_threads {
        let config = config.clone();
        let counters = counters.clone();
        let running = running.clone();
        let handle = std::thread::Builder::new()
            .name(format!("amqp-sender-{thread_index}"))
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build sender runtime");
                rt.block_on(run_sender_thread(&config, thread_index, &counters, &running))
            })
            .expect("failed to spawn sender thread");
        handles.push(handle);
    }

    let mut any_error = false;
    for handle in handles {
        match handle.join().expect("sender thread panicked") {
            Ok(SchedulerExit::CountReached) => {}
            Ok(SchedulerExit::Cancelled) => {}
            Err(e) => {
                warn!(error = %e, "sender thread exited with an error");
                any_error = true;
            }
        }
    }

    Ok(if any_error { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::PayloadTemplate;

    #[test]
    fn event_and_metric_templates_use_seconds_dot_nanoseconds() {
        let ts = render_timestamp(PayloadTemplate::Metric);
        assert!(ts.contains('.'));
        assert!(!ts.contains('T'));
    }

    #[test]
    fn log_template_uses_iso8601_with_fixed_offset() {
        let ts = render_timestamp(PayloadTemplate::Log);
        assert!(ts.ends_with("+02:00"));
        assert!(ts.contains('T'));
    }
}
