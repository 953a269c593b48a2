//! Non-interactive provider tool configuration (§6.1, shared flag set
//! minus anything subscription-related — this tool never receives item
//! requests).

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
    pub item_count: Option<u32>,
    pub run_time: Option<u32>,
    pub provider_name: Option<String>,
    pub service_name: Option<String>,
    pub item_file: Option<String>,
    pub msg_file: Option<String>,
    pub summary_file: Option<String>,
    pub stats_file: Option<String>,
    pub latency_file: Option<String>,
    pub write_stats_interval: Option<u32>,
    pub no_display_stats: Option<bool>,
    pub nano_time: Option<bool>,
    pub measure_encode: Option<bool>,
}

impl TomlDefaults {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
    }
}

#[derive(Debug, Parser)]
#[command(name = "niprov-perf")]
pub struct Cli {
    #[arg(long = "config-file")]
    pub config_file: Option<String>,
    #[arg(long = "threads")]
    pub threads: Option<String>,
    #[arg(long = "tick-rate")]
    pub tick_rate: Option<u32>,
    #[arg(long = "update-rate")]
    pub update_rate: Option<u32>,
    #[arg(long = "latency-update-rate")]
    pub latency_update_rate: Option<u32>,
    #[arg(long = "item-count")]
    pub item_count: Option<u32>,
    #[arg(long = "run-time")]
    pub run_time: Option<u32>,
    #[arg(long = "provider-name")]
    pub provider_name: Option<String>,
    #[arg(long = "service-name")]
    pub service_name: Option<String>,
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
    #[arg(long = "nano-time")]
    pub nano_time: bool,
    #[arg(long = "measure-encode")]
    pub measure_encode: bool,
}

#[derive(Debug, Clone)]
pub struct NiProviderConfig {
    pub threads: Vec<usize>,
    pub tick_rate: u32,
    pub update_rate: u32,
    pub latency_update_rate: u32,
    pub item_count: u32,
    pub run_time: u32,
    pub provider_name: String,
    pub service_name: String,
    pub item_file: String,
    pub msg_file: String,
    pub summary_file: String,
    pub stats_file: String,
    pub latency_file: String,
    pub write_stats_interval: u32,
    pub display_stats: bool,
    pub nano_time: bool,
    pub measure_encode: bool,
}

macro_rules! pick {
    ($cli:expr, $toml:expr, $default:expr) => {
        $cli.unwrap_or_else(|| $toml.clone().unwrap_or($default))
    };
}

impl NiProviderConfig {
    pub fn resolve(cli: Cli, toml_defaults: &TomlDefaults) -> Result<Self, ConfigError> {
        let cfg = NiProviderConfig {
            threads: perfcore_config::affinity::parse_cpu_list(&pick!(cli.threads, toml_defaults.threads, "0".to_string()))
                .map_err(|e| ConfigError::Read {
                    path: "-threads".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                })?,
            tick_rate: pick!(cli.tick_rate, toml_defaults.tick_rate, 1000),
            update_rate: pick!(cli.update_rate, toml_defaults.update_rate, 0),
            latency_update_rate: pick!(cli.latency_update_rate, toml_defaults.latency_update_rate, 0),
            item_count: pick!(cli.item_count, toml_defaults.item_count, 100),
            run_time: pick!(cli.run_time, toml_defaults.run_time, 300),
            provider_name: pick!(cli.provider_name, toml_defaults.provider_name, "niprovider".to_string()),
            service_name: pick!(cli.service_name, toml_defaults.service_name, "DIRECT_FEED".to_string()),
            item_file: pick!(cli.item_file, toml_defaults.item_file, "350k.xml".to_string()),
            msg_file: pick!(cli.msg_file, toml_defaults.msg_file, "MsgData.xml".to_string()),
            summary_file: pick!(cli.summary_file, toml_defaults.summary_file, "NIProvSummary.out".to_string()),
            stats_file: pick!(cli.stats_file, toml_defaults.stats_file, "NIProvStats".to_string()),
            latency_file: pick!(cli.latency_file, toml_defaults.latency_file, "NIProvLatency".to_string()),
            write_stats_interval: pick!(cli.write_stats_interval, toml_defaults.write_stats_interval, 5),
            display_stats: !(cli.no_display_stats || toml_defaults.no_display_stats.unwrap_or(false)),
            nano_time: cli.nano_time || toml_defaults.nano_time.unwrap_or(false),
            measure_encode: cli.measure_encode || toml_defaults.measure_encode.unwrap_or(false),
        };

        perfcore_config::validate_rates(&RateFields {
            snapshot: false,
            posting_rate: 0,
            latency_posting_rate: 0,
            update_rate: cfg.update_rate,
            latency_update_rate: cfg.latency_update_rate,
            generic_rate: 0,
            latency_generic_rate: 0,
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
            item_count: None,
            run_time: None,
            provider_name: None,
            service_name: None,
            item_file: None,
            msg_file: None,
            summary_file: None,
            stats_file: None,
            latency_file: None,
            write_stats_interval: None,
            no_display_stats: false,
            nano_time: false,
            measure_encode: false,
        }
    }

    #[test]
    fn hardcoded_defaults_apply() {
        let cfg = NiProviderConfig::resolve(bare_cli(), &TomlDefaults::default()).unwrap();
        assert_eq!(cfg.item_count, 100);
        assert_eq!(cfg.provider_name, "niprovider");
    }

    #[test]
    fn latency_rate_exceeding_update_rate_is_rejected() {
        let mut cli = bare_cli();
        cli.update_rate = Some(10);
        cli.latency_update_rate = Some(50);
        assert!(NiProviderConfig::resolve(cli, &TomlDefaults::default()).is_err());
    }
}
