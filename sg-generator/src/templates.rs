//! Synthetic payload template set: collectd-style metrics, rsyslog-style
//! logs, and Ceilometer-style nested events.
//!
//! Grounded on `original_source/generator/amqp_snd_th.c`'s `CD_MSG*`,
//! `RSYSLOG_MSG*` and `CEIL_MSG*` fixed-string fragments and `build_*_mesg`
//! functions. The original's `msg_cpy` bounded-copy helper (returns NULL
//! instead of overflowing the fixed `char[4096]`) is reimplemented as
//! [`Scratch::push`], returning `SgError::Overflow` rather than a null
//! pointer — the design notes call this out explicitly as the
//! `sprintf`-into-fixed-buffer pattern that must not survive the port.

use sg_core::constants::GENERATOR_SCRATCH_SIZE;
use sg_core::{Result, SgError};

/// One rotating host/metric pairing, plus collectd's per-series sample
/// counter (`host_info_t.count` upstream).
#[derive(Debug, Clone)]
pub struct HostMetric {
    pub hostname: String,
    pub metric: String,
    pub count: u64,
}

/// Build the `num_hosts * num_metrics` rotation list, shuffled once at
/// startup (the original's `host_list` construction). This implementation
/// wraps the rotation cursor at the true list length; the original wraps
/// one short (`curr_host == host_list_len - 1`), silently never visiting
/// the last entry — treated here as a bug, not a semantic to preserve.
pub fn build_host_metrics(num_hosts: usize, num_metrics: usize) -> Vec<HostMetric> {
    use rand::seq::SliceRandom;

    let mut list = Vec::with_capacity(num_hosts * num_metrics);
    for h in 0..num_hosts {
        for m in 0..num_metrics {
            list.push(HostMetric {
                hostname: format!("hostname{h}"),
                metric: format!("metrics{m:03}"),
                count: 0,
            });
        }
    }
    list.shuffle(&mut rand::thread_rng());
    list
}

/// Which record shape the generator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadTemplate {
    /// collectd-like JSON array of metric samples.
    Metric,
    /// rsyslog-like JSON log record.
    Log,
    /// Ceilometer-like nested `oslo.message` JSON event.
    Event,
}

impl PayloadTemplate {
    /// `Log` uses an ISO-8601-with-fixed-offset timestamp; the other two
    /// use `seconds.nanoseconds`, per the design notes' supplemented
    /// convention from `amqp_snd_th.c`.
    pub fn uses_iso8601_timestamp(self) -> bool {
        matches!(self, PayloadTemplate::Log)
    }
}

/// Fixed-capacity reusable write buffer, replacing the original's
/// `sprintf`-into-`char[4096]` pattern with bounded, checked appends.
pub struct Scratch {
    buf: String,
    capacity: usize,
}

impl Scratch {
    pub fn new(capacity: usize) -> Self {
        Self { buf: String::with_capacity(capacity), capacity }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn push(&mut self, s: &str) -> Result<()> {
        let needed = self.buf.len() + s.len();
        if needed > self.capacity {
            return Err(SgError::Overflow { needed, capacity: self.capacity });
        }
        self.buf.push_str(s);
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new(GENERATOR_SCRATCH_SIZE)
    }
}

/// Render `count` rotating host/metric records into `scratch` using
/// `template`, advancing `cursor` as it goes. Never truncates silently —
/// a capacity overflow propagates as `SgError::Overflow` and the caller
/// treats the burst entry as send-zero.
pub fn render(
    scratch: &mut Scratch,
    template: PayloadTemplate,
    hosts: &mut [HostMetric],
    cursor: &mut usize,
    count: usize,
    now: &str,
) -> Result<()> {
    scratch.clear();
    match template {
        PayloadTemplate::Metric => render_metric(scratch, hosts, cursor, count, now),
        PayloadTemplate::Log => render_log(scratch, hosts, cursor, count, now),
        PayloadTemplate::Event => render_event(scratch, count, now),
    }
}

fn advance(cursor: &mut usize, len: usize) {
    *cursor += 1;
    if *cursor >= len {
        *cursor = 0;
    }
}

fn render_metric(
    scratch: &mut Scratch,
    hosts: &mut [HostMetric],
    cursor: &mut usize,
    count: usize,
    now: &str,
) -> Result<()> {
    scratch.push("[")?;
    for i in 0..count {
        let entry = &mut hosts[*cursor];
        let sample = entry.count;
        entry.count += 1;
        scratch.push("{\"values\": [")?;
        scratch.push(&sample.to_string())?;
        scratch.push("], \"dstypes\": [\"derive\"], \"dsnames\": [\"samples\"], \"time\": ")?;
        scratch.push(now)?;
        scratch.push(", \"interval\": 1,\"host\": \"")?;
        scratch.push(&entry.hostname)?;
        scratch.push("\", \"plugin\": \"")?;
        scratch.push(&entry.metric)?;
        scratch
            .push("\", \"plugin_instance\": \"pluginInst0\",\"type\": \"type0\",\"type_instance\": \"typInst0\"}")?;
        advance(cursor, hosts.len());
        if i + 1 < count {
            scratch.push(",")?;
        }
    }
    scratch.push("]")
}

fn render_log(
    scratch: &mut Scratch,
    hosts: &mut [HostMetric],
    cursor: &mut usize,
    count: usize,
    now: &str,
) -> Result<()> {
    for _ in 0..count {
        let hostname = hosts[*cursor].hostname.clone();
        scratch.push("{\"@timestamp\":\"")?;
        scratch.push(now)?;
        scratch.push("\", \"host\":\"")?;
        scratch.push(&hostname)?;
        scratch.push(
            "\", \"severity\":\"5\", \"facility\":\"user\", \"tag\":\"tag1\", \"source\":\"some-source\", \
             \"message\":\"a log message from generator\", \"file\":\"\", \"cloud\": \"cloud1\", \"region\": \
             \"some-region\"}",
        )?;
        advance(cursor, hosts.len());
    }
    Ok(())
}

fn render_event(scratch: &mut Scratch, count: usize, now: &str) -> Result<()> {
    scratch.push(
        "{\"request\": {\"oslo.version\": \"2.0\", \"oslo.message\": \"{\\\"message_id\\\": \
         \\\"111c1c6e-21b8-4113-1a21-d10121214113\\\", \\\"publisher_id\\\": \
         \\\"telemetry.publisher.somethingk.cloud.internal\\\", \\\"event_type\\\": \\\"metering\\\", \
         \\\"priority\\\": \\\"SAMPLE\\\", \\\"payload\\\": [",
    )?;
    for i in 0..count {
        scratch.push(
            "{\\\"source\\\": \\\"openstack\\\", \\\"counter_name\\\": \\\"some_counter_name\\\", \
             \\\"counter_type\\\": \\\"delta\\\", \\\"counter_unit\\\": \\\"user\\\", \\\"counter_volume\\\": 1, \
             \\\"user_id\\\": \\\"11118c1fa1d019019b118c1901e41151\\\", \\\"project_id\\\": \\\"None\\\", \
             \\\"resource_id\\\": \\\"161b1cd1a6d1491e9b11811918e41151\\\", \\\"timestamp\\\": \\\"",
        )?;
        scratch.push(now)?;
        scratch.push(
            "\\\", \\\"resource_metadata\\\": {\\\"host\\\": \\\"compute-0.redhat.local\\\", \\\"flavor_id\\\": \
             \\\"71cd0af1-afd3-4ee4-b918-cec05bf89578\\\", \\\"flavor_name\\\": \\\"m1.tiny\\\", \
             \\\"display_name\\\": \\\"new-instance\\\", \\\"image_ref\\\": \
             \\\"45333e02-643d-4f4f-a817-065060753983\\\", \\\"launched_at\\\": \
             \\\"2020-09-14T16:12:49.839122\\\", \\\"created_at\\\": \\\"2020-09-14 16:12:39+00:00\\\"}, \
             \\\"message_id\\\": \\\"22a22d22-0292-12e2-8232-c2a2e02d52a5\\\", \\\"monotonic_time\\\": \
             \\\"None\\\", \\\"message_signature\\\": \
             \\\"6322324324323b2d32832932132432c32732e32e323d2f3732d32e3232c32323\\\"}",
        )?;
        if i + 1 < count {
            scratch.push(",")?;
        }
    }
    scratch.push("], \\\"timestamp\\\": \\\"")?;
    scratch.push(now)?;
    scratch.push("\\\"}\"}, \"context\": {}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_metric_rotation_covers_every_entry() {
        let hosts = build_host_metrics(3, 2);
        assert_eq!(hosts.len(), 6);
    }

    #[test]
    fn metric_template_renders_valid_json_array() {
        let mut hosts = build_host_metrics(2, 1);
        let mut cursor = 0;
        let mut scratch = Scratch::default();
        render(&mut scratch, PayloadTemplate::Metric, &mut hosts, &mut cursor, 2, "123.456").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(scratch.as_str()).unwrap();
        assert!(parsed.is_array());
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn log_template_renders_one_object_per_record_concatenated() {
        let mut hosts = build_host_metrics(1, 1);
        let mut cursor = 0;
        let mut scratch = Scratch::default();
        render(&mut scratch, PayloadTemplate::Log, &mut hosts, &mut cursor, 1, "2026-07-28T00:00:00+02:00").unwrap();
        assert!(scratch.as_str().contains("\"@timestamp\":\"2026-07-28T00:00:00+02:00\""));
    }

    #[test]
    fn event_template_embeds_timestamp_twice() {
        let mut scratch = Scratch::default();
        render(&mut scratch, PayloadTemplate::Event, &mut [], &mut 0, 1, "123.456").unwrap();
        assert_eq!(scratch.as_str().matches("123.456").count(), 2);
    }

    #[test]
    fn rotation_cursor_wraps_at_true_length() {
        let mut hosts = build_host_metrics(1, 2);
        let mut cursor = 0;
        let mut scratch = Scratch::default();
        // three records over a two-entry list must touch both entries,
        // unlike the original's off-by-one wrap.
        render(&mut scratch, PayloadTemplate::Log, &mut hosts, &mut cursor, 3, "1.0").unwrap();
        assert_eq!(cursor, 1);
    }

    #[test]
    fn oversized_render_reports_overflow_without_truncating() {
        let mut hosts = build_host_metrics(50, 50);
        let mut cursor = 0;
        let mut scratch = Scratch::new(32);
        let err = render(&mut scratch, PayloadTemplate::Metric, &mut hosts, &mut cursor, 50, "1.0").unwrap_err();
        assert!(matches!(err, SgError::Overflow { .. }));
    }
}
