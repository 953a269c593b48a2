//! Consumer tool configuration (§6.1): CLI flags via `clap`, layered over
//! an optional TOML defaults file via `serde` + `toml`.

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

/// Optional TOML overlay supplying defaults that unset CLI flags fall back
/// to. Every field is optional so a partial file only overrides the flags
/// it names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlDefaults {
    pub threads: Option<String>,
    pub item_count: Option<u32>,
    pub common_item_count: Option<u32>,
    pub request_rate: Option<u32>,
    pub snapshot: Option<bool>,
    pub posting_rate: Option<u32>,
    pub posting_latency_rate: Option<u32>,
    pub generic_msg_rate: Option<u32>,
    pub generic_msg_latency_rate: Option<u32>,
    pub tick_rate: Option<u32>,
    pub uname: Option<String>,
    pub service_name: Option<String>,
    pub use_service_id: Option<bool>,
    pub item_file: Option<String>,
    pub msg_file: Option<String>,
    pub summary_file: Option<String>,
    pub stats_file: Option<String>,
    pub latency_file: Option<String>,
    pub write_stats_interval: Option<u32>,
    pub no_display_stats: Option<bool>,
    pub steady_state_time: Option<u32>,
    pub delay_steady_state_calc_ms: Option<u32>,
    pub nano_time: Option<bool>,
    pub measure_encode: Option<bool>,
    pub measure_decode: Option<bool>,
}

impl TomlDefaults {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
    }
}

/// CLI surface (§6.1). Every field is `Option` so the merge step can tell
/// an explicit flag apart from "use the TOML/hardcoded default".
#[derive(Debug, Parser)]
#[command(name = "cons-perf")]
pub struct Cli {
    #[arg(long = "config-file")]
    pub config_file: Option<String>,
    #[arg(long = "threads")]
    pub threads: Option<String>,
    #[arg(long = "item-count")]
    pub item_count: Option<u32>,
    #[arg(long = "common-item-count")]
    pub common_item_count: Option<u32>,
    #[arg(long = "request-rate")]
    pub request_rate: Option<u32>,
    #[arg(long = "snapshot")]
    pub snapshot: bool,
    #[arg(long = "posting-rate")]
    pub posting_rate: Option<u32>,
    #[arg(long = "posting-latency-rate")]
    pub posting_latency_rate: Option<u32>,
    #[arg(long = "generic-msg-rate")]
    pub generic_msg_rate: Option<u32>,
    #[arg(long = "generic-msg-latency-rate")]
    pub generic_msg_latency_rate: Option<u32>,
    #[arg(long = "tick-rate")]
    pub tick_rate: Option<u32>,
    #[arg(long = "uname")]
    pub uname: Option<String>,
    #[arg(long = "service-name")]
    pub service_name: Option<String>,
    #[arg(long = "use-service-id")]
    pub use_service_id: Option<bool>,
    #[arg(long = "item-file")]
    pub item_file: Option<String>,
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
    #[arg(long = "steady-state-time")]
    pub steady_state_time: Option<u32>,
    #[arg(long = "delay-steady-state-calc")]
    pub delay_steady_state_calc_ms: Option<u32>,
    #[arg(long = "nano-time")]
    pub nano_time: bool,
    #[arg(long = "measure-encode")]
    pub measure_encode: bool,
    #[arg(long = "measure-decode")]
    pub measure_decode: bool,
}

/// Fully-resolved consumer configuration: every field concrete, hardcoded
/// fallback applied where neither the CLI nor the TOML overlay set one.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub threads: Vec<usize>,
    pub item_count: u32,
    pub common_item_count: u32,
    pub request_rate: u32,
    pub snapshot: bool,
    pub posting_rate: u32,
    pub posting_latency_rate: u32,
    pub generic_msg_rate: u32,
    pub generic_msg_latency_rate: u32,
    pub tick_rate: u32,
    pub uname: String,
    pub service_name: String,
    pub use_service_id: bool,
    pub item_file: String,
    pub msg_file: String,
    pub summary_file: String,
    pub stats_file: String,
    pub latency_file: String,
    pub write_stats_interval: u32,
    pub display_stats: bool,
    pub steady_state_time: u32,
    pub delay_steady_state_calc_ms: u32,
    pub nano_time: bool,
    pub measure_encode: bool,
    pub measure_decode: bool,
}

macro_rules! pick {
    ($cli:expr, $toml:expr, $default:expr) => {
        $cli.unwrap_or_else(|| $toml.clone().unwrap_or($default))
    };
}

impl ConsumerConfig {
    pub fn resolve(cli: Cli, toml_defaults: &TomlDefaults) -> Result<Self, ConfigError> {
        let cfg = ConsumerConfig {
            threads: perfcore_config::affinity::parse_cpu_list(&pick!(
                cli.threads,
                toml_defaults.threads,
                "0".to_string()
            ))
            .map_err(|e| ConfigError::Read {
                path: "-threads".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            })?,
            item_count: pick!(cli.item_count, toml_defaults.item_count, 100),
            common_item_count: pick!(cli.common_item_count, toml_defaults.common_item_count, 0),
            request_rate: pick!(cli.request_rate, toml_defaults.request_rate, 100),
            snapshot: cli.snapshot || toml_defaults.snapshot.unwrap_or(false),
            posting_rate: pick!(cli.posting_rate, toml_defaults.posting_rate, 0),
            posting_latency_rate: pick!(cli.posting_latency_rate, toml_defaults.posting_latency_rate, 0),
            generic_msg_rate: pick!(cli.generic_msg_rate, toml_defaults.generic_msg_rate, 0),
            generic_msg_latency_rate: pick!(
                cli.generic_msg_latency_rate,
                toml_defaults.generic_msg_latency_rate,
                0
            ),
            tick_rate: pick!(cli.tick_rate, toml_defaults.tick_rate, 1000),
            uname: pick!(cli.uname, toml_defaults.uname, "perfuser".to_string()),
            service_name: pick!(cli.service_name, toml_defaults.service_name, "DIRECT_FEED".to_string()),
            use_service_id: cli.use_service_id.unwrap_or(toml_defaults.use_service_id.unwrap_or(false)),
            item_file: pick!(cli.item_file, toml_defaults.item_file, "350k.xml".to_string()),
            msg_file: pick!(cli.msg_file, toml_defaults.msg_file, "MsgData.xml".to_string()),
            summary_file: pick!(
                cli.summary_file,
                toml_defaults.summary_file,
                "ConsSummary.out".to_string()
            ),
            stats_file: pick!(cli.stats_file, toml_defaults.stats_file, "ConsStats".to_string()),
            latency_file: pick!(cli.latency_file, toml_defaults.latency_file, "ConsLatency".to_string()),
            write_stats_interval: pick!(cli.write_stats_interval, toml_defaults.write_stats_interval, 5),
            display_stats: !(cli.no_display_stats || toml_defaults.no_display_stats.unwrap_or(false)),
            steady_state_time: pick!(cli.steady_state_time, toml_defaults.steady_state_time, 300),
            delay_steady_state_calc_ms: pick!(
                cli.delay_steady_state_calc_ms,
                toml_defaults.delay_steady_state_calc_ms,
                5000
            ),
            nano_time: cli.nano_time || toml_defaults.nano_time.unwrap_or(false),
            measure_encode: cli.measure_encode || toml_defaults.measure_encode.unwrap_or(false),
            measure_decode: cli.measure_decode || toml_defaults.measure_decode.unwrap_or(false),
        };

        perfcore_config::validate_rates(&RateFields {
            snapshot: cfg.snapshot,
            posting_rate: cfg.posting_rate,
            latency_posting_rate: cfg.posting_latency_rate,
            update_rate: 0,
            latency_update_rate: 0,
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
            item_count: None,
            common_item_count: None,
            request_rate: None,
            snapshot: false,
            posting_rate: None,
            posting_latency_rate: None,
            generic_msg_rate: None,
            generic_msg_latency_rate: None,
            tick_rate: None,
            uname: None,
            service_name: None,
            use_service_id: None,
            item_file: None,
            msg_file: None,
            summary_file: None,
            stats_file: None,
            latency_file: None,
            write_stats_interval: None,
            no_display_stats: false,
            steady_state_time: None,
            delay_steady_state_calc_ms: None,
            nano_time: false,
            measure_encode: false,
            measure_decode: false,
        }
    }

    #[test]
    fn hardcoded_defaults_apply_with_no_cli_or_toml() {
        let cfg = ConsumerConfig::resolve(bare_cli(), &TomlDefaults::default()).unwrap();
        assert_eq!(cfg.tick_rate, 1000);
        assert_eq!(cfg.threads, vec![0]);
        assert!(cfg.display_stats);
    }

    #[test]
    fn toml_overlay_fills_unset_cli_flags() {
        let toml = TomlDefaults { tick_rate: Some(500), ..Default::default() };
        let cfg = ConsumerConfig::resolve(bare_cli(), &toml).unwrap();
        assert_eq!(cfg.tick_rate, 500);
    }

    #[test]
    fn explicit_cli_flag_overrides_toml_overlay() {
        let toml = TomlDefaults { tick_rate: Some(500), ..Default::default() };
        let mut cli = bare_cli();
        cli.tick_rate = Some(2000);
        let cfg = ConsumerConfig::resolve(cli, &toml).unwrap();
        assert_eq!(cfg.tick_rate, 2000);
    }

    #[test]
    fn posting_with_snapshot_fails_validation() {
        let mut cli = bare_cli();
        cli.snapshot = true;
        cli.posting_rate = Some(5);
        assert!(ConsumerConfig::resolve(cli, &TomlDefaults::default()).is_err());
    }
}
