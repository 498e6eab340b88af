//! Resolved generator configuration, built once from [`crate::cli::Args`].

use sg_core::constants::GENERATOR_SCRATCH_SIZE;

use crate::cli::{Args, TemplateArg};
use crate::templates::PayloadTemplate;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub amqp_host: String,
    pub amqp_port: u16,
    pub container_id: String,
    pub address: String,
    pub message_count: u64,
    pub cd_per_mesg: usize,
    pub num_hosts: usize,
    pub metrics_per_host: usize,
    pub num_threads: usize,
    pub burst_size: Option<usize>,
    pub sleep_usec: u64,
    pub presettle: bool,
    pub template: PayloadTemplate,
    pub scratch_capacity: usize,
}

impl GeneratorConfig {
    pub fn from_args(args: Args) -> sg_core::Result<Self> {
        if args.num_threads == 0 {
            return Err(sg_core::config_error!("--num-threads must be at least 1"));
        }
        if args.num_hosts == 0 || args.metrics_per_host == 0 {
            return Err(sg_core::config_error!("--num-hosts and --metrics-per-host must be at least 1"));
        }
        if args.address.is_empty() {
            return Err(sg_core::config_error!("--address must not be empty"));
        }

        let container_id = args.cid.unwrap_or_else(sg_core::default_container_id);
        let template = match args.template {
            TemplateArg::Metric => PayloadTemplate::Metric,
            TemplateArg::Log => PayloadTemplate::Log,
            TemplateArg::Event => PayloadTemplate::Event,
        };

        Ok(Self {
            amqp_host: args.amqp_ip,
            amqp_port: args.amqp_port,
            container_id,
            address: args.address,
            message_count: args.count,
            cd_per_mesg: args.cd_per_mesg.max(1),
            num_hosts: args.num_hosts,
            metrics_per_host: args.metrics_per_host,
            num_threads: args.num_threads,
            burst_size: if args.burst_size == 0 { None } else { Some(args.burst_size) },
            sleep_usec: args.sleep_usec,
            presettle: args.presettle,
            template,
            scratch_capacity: GENERATOR_SCRATCH_SIZE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            amqp_ip: "127.0.0.1".into(),
            amqp_port: 5672,
            cid: None,
            address: "collectd/telemetry".into(),
            count: 0,
            cd_per_mesg: 1,
            num_hosts: 10,
            metrics_per_host: 10,
            num_threads: 4,
            burst_size: 0,
            sleep_usec: 0,
            presettle: false,
            template: TemplateArg::Metric,
            verbose: 0,
        }
    }

    #[test]
    fn zero_burst_size_means_unbounded() {
        let config = GeneratorConfig::from_args(base_args()).unwrap();
        assert_eq!(config.burst_size, None);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let mut args = base_args();
        args.num_threads = 0;
        assert!(GeneratorConfig::from_args(args).is_err());
    }

    #[test]
    fn generates_a_default_container_id() {
        let config = GeneratorConfig::from_args(base_args()).unwrap();
        assert!(config.container_id.starts_with("sa-"));
    }
}
