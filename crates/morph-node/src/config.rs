//! Node configuration

use crate::cli::Cli;
use crate::error::NodeResult;
use morph_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Node configuration, read from TOML and overridden by CLI flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Log level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Random workload settings
    #[serde(default)]
    pub bank: BankConfig,
}

/// Random workload settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankConfig {
    /// Number of accounts
    #[serde(default = "default_accounts")]
    pub accounts: usize,
    /// Opening balance of every account
    #[serde(default = "default_initial_balance")]
    pub initial_balance: i64,
    /// Largest deposit or transfer amount
    #[serde(default = "default_max_amount")]
    pub max_amount: i64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_accounts() -> usize {
    16
}

fn default_initial_balance() -> i64 {
    1_000
}

fn default_max_amount() -> i64 {
    100
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            accounts: default_accounts(),
            initial_balance: default_initial_balance(),
            max_amount: default_max_amount(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            scheduler: SchedulerConfig::default(),
            bank: BankConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> NodeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply command-line overrides
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        if let Some(mode) = cli.mode {
            self.scheduler.mode = mode;
        }
        if let Some(threshold) = cli.threshold {
            self.scheduler.notify_threshold = threshold;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use morph_scheduler::ExecutionMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = NodeConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.scheduler.mode, ExecutionMode::Dfs);
        assert_eq!(config.bank.accounts, 16);
        assert_eq!(config.bank.initial_balance, 1_000);
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml = r#"
            log_level = "debug"

            [scheduler]
            mode = "dfs-notify"
            notify_threshold = 10

            [bank]
            accounts = 4
        "#;
        let config: NodeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.scheduler.mode, ExecutionMode::DfsNotify);
        assert_eq!(config.scheduler.notify_threshold, 10);
        assert_eq!(config.scheduler.stall_timeout_ms, 5_000);
        assert_eq!(config.bank.accounts, 4);
        assert_eq!(config.bank.max_amount, 100);
    }

    #[test]
    fn test_config_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler]\nmode = \"dfs\"\nnotify_threshold = 7").unwrap();

        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.scheduler.notify_threshold, 7);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_load_rejects_unknown_mode() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler]\nmode = \"bfs\"").unwrap();
        assert!(NodeConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = NodeConfig::default();
        let cli = Cli::parse_from([
            "morph",
            "--mode", "dfs-notify",
            "--threshold", "5",
            "--log-level", "warn",
            "banker",
        ]);
        config.apply_cli(&cli);
        assert_eq!(config.scheduler.mode, ExecutionMode::DfsNotify);
        assert_eq!(config.scheduler.notify_threshold, 5);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = NodeConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("[scheduler]"));
        let back: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
