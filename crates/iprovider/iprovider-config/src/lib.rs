//! Interactive provider tool configuration (§6.1: "Provider flags add"
//! on top of the shared flag set), same CLI-over-TOML-defaults layering
//! as [`consumer_config`].

use clap::Parser;
use perfcore_config::RateFields;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
    #[error(transparent)]
    Validation(#[from] perfcore_config::ValidationError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlDefaults {
    pub threads: Option<String>,
    pub tick_rate: Option<u32>,
    pub update_rate: Option<u32>,
    pub latency_update_rate: Option<u32>,
    pub generic_msg_rate: Option<u32>,
    pub generic_msg_latency_rate: Option<u32>,
    pub refresh_burst_size: Option<u32>,
    pub max_pack_count: Option<u32>,
    pub pack_buf_size: Option<u32>,
    pub run_time: Option<u32>,
    pub provider_name: Option<String>,
    pub service_name: Option<String>,
    pub msg_file: Option<String>,
    pub summary_file: Option<String>,
    pub stats_file: Option<String>,
    pub latency_file: Option<String>,
    pub write_stats_interval: Option<u32>,
    pub no_display_stats: Option<bool>,
    pub nano_time: Option<bool>,
    pub measure_encode: Option<bool>,
    pub measure_decode: Option<bool>,
    pub pre_enc: Option<bool>,
}

impl TomlDefaults {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
    }
}

#[derive(Debug, Parser)]
#[command(name = "iprov-perf")]
pub struct Cli {
    #[arg(long = "config-file")]
    pub config_file: Option<String>,
    #[arg(long = "threads")]
    pub threads: Option<String>,
    #[arg(long = "tick-rate")]
    pub tick_rate: Option<u32>,
    #[arg(long = "update-rate")]
    pub update_rate: Option<u32>,
    /// `"all"` maps to the `ALWAYS` sentinel (§4.4); a numeric value is the
    /// per-second latency-update rate.
    #[arg(long = "latency-update-rate")]
    pub latency_update_rate: Option<String>,
    #[arg(long = "generic-msg-rate")]
    pub generic_msg_rate: Option<u32>,
    #[arg(long = "generic-msg-latency-rate")]
    pub generic_msg_latency_rate: Option<u32>,
    #[arg(long = "refresh-burst-size")]
    pub refresh_burst_size: Option<u32>,
    #[arg(long = "max-pack-count")]
    pub max_pack_count: Option<u32>,
    #[arg(long = "pack-buf-size")]
    pub pack_buf_size: Option<u32>,
    #[arg(long = "run-time")]
    pub run_time: Option<u32>,
    #[arg(long = "provider-name")]
    pub provider_name: Option<String>,
    #[arg(long = "service-name")]
    pub service_name: Option<String>,
    #[arg(long = "msg-file")]
    pub msg_file: Option<String>,
    #[arg(long = "summary-file")]
    pub summary_file: Option<String>,
    #[arg(long = "stats-file")]
    pub stats_file: Option<String>,
    #[arg(long = "latency-file")]
    pub latency_file: Option<String>,
    #[arg(long = "write-stats-interval")]
    pub write_stats_interval: Option<u32>,
    #[arg(long = "no-display-stats")]
    pub no_display_stats: bool,
    #[arg(long = "nano-time")]
    pub nano_time: bool,
    #[arg(long = "measure-encode")]
    pub measure_encode: bool,
    #[arg(long = "measure-decode")]
    pub measure_decode: bool,
    #[arg(long = "pre-enc")]
    pub pre_enc: bool,
}

/// `None` means "every update carries a stamp" (`-latencyUpdateRate all`,
/// the `ALWAYS` sentinel); `Some(n)` is a concrete per-second rate.
#[derive(Debug, Clone, Copy)]
pub enum LatencyUpdateRate {
    Always,
    Rate(u32),
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub threads: Vec<usize>,
    pub tick_rate: u32,
    pub update_rate: u32,
    pub latency_update_rate: LatencyUpdateRate,
    pub generic_msg_rate: u32,
    pub generic_msg_latency_rate: u32,
    pub refresh_burst_size: u32,
    pub max_pack_count: u32,
    pub pack_buf_size: u32,
    pub run_time: u32,
    pub provider_name: String,
    pub service_name: String,
    pub msg_file: String,
    pub summary_file: String,
    pub stats_file: String,
    pub latency_file: String,
    pub write_stats_interval: u32,
    pub display_stats: bool,
    pub nano_time: bool,
    pub measure_encode: bool,
    pub measure_decode: bool,
    pub pre_enc: bool,
}

macro_rules! pick {
    ($cli:expr, $toml:expr, $default:expr) => {
        $cli.unwrap_or_else(|| $toml.clone().unwrap_or($default))
    };
}

impl ProviderConfig {
    pub fn resolve(cli: Cli, toml_defaults: &TomlDefaults) -> Result<Self, ConfigError> {
        let latency_update_rate_str = pick!(cli.latency_update_rate, toml_defaults.latency_update_rate, "0".into());
        let update_rate = pick!(cli.update_rate, toml_defaults.update_rate, 0);
        let latency_update_rate = if latency_update_rate_str.eq_ignore_ascii_case("all") {
            LatencyUpdateRate::Always
        } else {
            LatencyUpdateRate::Rate(latency_update_rate_str.parse().unwrap_or(0))
        };

        let cfg = ProviderConfig {
            threads: perfcore_config::affinity::parse_cpu_list(&pick!(cli.threads, toml_defaults.threads, "0".to_string()))
                .map_err(|e| ConfigError::Read {
                    path: "-threads".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                })?,
            tick_rate: pick!(cli.tick_rate, toml_defaults.tick_rate, 1000),
            update_rate,
            latency_update_rate,
            generic_msg_rate: pick!(cli.generic_msg_rate, toml_defaults.generic_msg_rate, 0),
            generic_msg_latency_rate: pick!(cli.generic_msg_latency_rate, toml_defaults.generic_msg_latency_rate, 0),
            refresh_burst_size: pick!(cli.refresh_burst_size, toml_defaults.refresh_burst_size, 10),
            max_pack_count: pick!(cli.max_pack_count, toml_defaults.max_pack_count, 1),
            pack_buf_size: pick!(cli.pack_buf_size, toml_defaults.pack_buf_size, 6000),
            run_time: pick!(cli.run_time, toml_defaults.run_time, 300),
            provider_name: pick!(cli.provider_name, toml_defaults.provider_name, "provider".to_string()),
            service_name: pick!(cli.service_name, toml_defaults.service_name, "DIRECT_FEED".to_string()),
            msg_file: pick!(cli.msg_file, toml_defaults.msg_file, "MsgData.xml".to_string()),
            summary_file: pick!(cli.summary_file, toml_defaults.summary_file, "ProvSummary.out".to_string()),
            stats_file: pick!(cli.stats_file, toml_defaults.stats_file, "ProvStats".to_string()),
            latency_file: pick!(cli.latency_file, toml_defaults.latency_file, "ProvLatency".to_string()),
            write_stats_interval: pick!(cli.write_stats_interval, toml_defaults.write_stats_interval, 5),
            display_stats: !(cli.no_display_stats || toml_defaults.no_display_stats.unwrap_or(false)),
            nano_time: cli.nano_time || toml_defaults.nano_time.unwrap_or(false),
            measure_encode: cli.measure_encode || toml_defaults.measure_encode.unwrap_or(false),
            measure_decode: cli.measure_decode || toml_defaults.measure_decode.unwrap_or(false),
            pre_enc: cli.pre_enc || toml_defaults.pre_enc.unwrap_or(false),
        };

        let latency_rate_for_validation = match cfg.latency_update_rate {
            LatencyUpdateRate::Always => cfg.update_rate,
            LatencyUpdateRate::Rate(r) => r,
        };
        perfcore_config::validate_rates(&RateFields {
            snapshot: false,
            posting_rate: 0,
            latency_posting_rate: 0,
            update_rate: cfg.update_rate,
            latency_update_rate: latency_rate_for_validation,
            generic_rate: cfg.generic_msg_rate,
            latency_generic_rate: cfg.generic_msg_latency_rate,
        })?;

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_cli() -> Cli {
        Cli {
            config_file: None,
            threads: None,
            tick_rate: None,
            update_rate: None,
            latency_update_rate: None,
            generic_msg_rate: None,
            generic_msg_latency_rate: None,
            refresh_burst_size: None,
            max_pack_count: None,
            pack_buf_size: None,
            run_time: None,
            provider_name: None,
            service_name: None,
            msg_file: None,
            summary_file: None,
            stats_file: None,
            latency_file: None,
            write_stats_interval: None,
            no_display_stats: false,
            nano_time: false,
            measure_encode: false,
            measure_decode: false,
            pre_enc: false,
        }
    }

    #[test]
    fn latency_update_rate_all_maps_to_always() {
        let mut cli = bare_cli();
        cli.latency_update_rate = Some("all".to_string());
        cli.update_rate = Some(1000);
        let cfg = ProviderConfig::resolve(cli, &TomlDefaults::default()).unwrap();
        assert!(matches!(cfg.latency_update_rate, LatencyUpdateRate::Always));
    }

    #[test]
    fn numeric_latency_update_rate_is_parsed() {
        let mut cli = bare_cli();
        cli.latency_update_rate = Some("10".to_string());
        cli.update_rate = Some(1000);
        let cfg = ProviderConfig::resolve(cli, &TomlDefaults::default()).unwrap();
        assert!(matches!(cfg.latency_update_rate, LatencyUpdateRate::Rate(10)));
    }

    #[test]
    fn latency_rate_exceeding_update_rate_is_rejected() {
        let mut cli = bare_cli();
        cli.latency_update_rate = Some("50".to_string());
        cli.update_rate = Some(10);
        assert!(ProviderConfig::resolve(cli, &TomlDefaults::default()).is_err());
    }

    #[test]
    fn hardcoded_defaults_apply() {
        let cfg = ProviderConfig::resolve(bare_cli(), &TomlDefaults::default()).unwrap();
        assert_eq!(cfg.tick_rate, 1000);
        assert_eq!(cfg.max_pack_count, 1);
    }
}
