//! Scheduler configuration

use crate::error::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default stack length under which a worker asks to be notified
pub const DEFAULT_NOTIFY_THRESHOLD: usize = 100;

/// Graph traversal strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Depth-first walk; unblocked nodes stay on the releasing worker
    #[default]
    Dfs,
    /// Depth-first walk with hand-off of unblocked nodes to idle workers
    DfsNotify,
}

impl FromStr for ExecutionMode {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dfs" => Ok(Self::Dfs),
            "dfs-notify" | "dfs_notify" => Ok(Self::DfsNotify),
            other => Err(SchedulerError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dfs => write!(f, "dfs"),
            Self::DfsNotify => write!(f, "dfs-notify"),
        }
    }
}

/// Scheduler configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Traversal strategy
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Stack length below which a worker registers for hand-offs
    #[serde(default = "default_notify_threshold")]
    pub notify_threshold: usize,
    /// How long all workers may sit idle with nodes pending (milliseconds)
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,
}

fn default_notify_threshold() -> usize {
    DEFAULT_NOTIFY_THRESHOLD
}

fn default_stall_timeout_ms() -> u64 {
    5_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            notify_threshold: default_notify_threshold(),
            stall_timeout_ms: default_stall_timeout_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Configuration for `mode` with default tuning
    pub fn with_mode(mode: ExecutionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Stall timeout as a duration
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    /// Check the configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.mode == ExecutionMode::DfsNotify && self.notify_threshold == 0 {
            return Err(SchedulerError::InvalidConfig(
                "notify_threshold must be positive in dfs-notify mode".into(),
            ));
        }
        if self.stall_timeout_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "stall_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.mode, ExecutionMode::Dfs);
        assert_eq!(config.notify_threshold, 100);
        assert_eq!(config.stall_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("dfs".parse::<ExecutionMode>().unwrap(), ExecutionMode::Dfs);
        assert_eq!(
            "DFS-Notify".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::DfsNotify
        );
        let err = "bfs".parse::<ExecutionMode>().unwrap_err();
        assert!(matches!(err, SchedulerError::UnsupportedMode(m) if m == "bfs"));
    }

    #[test]
    fn test_mode_display_roundtrip() {
        for mode in [ExecutionMode::Dfs, ExecutionMode::DfsNotify] {
            assert_eq!(mode.to_string().parse::<ExecutionMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_config_deserialize() {
        let json = r#"{"mode": "dfs-notify", "notify_threshold": 8}"#;
        let config: SchedulerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.mode, ExecutionMode::DfsNotify);
        assert_eq!(config.notify_threshold, 8);
        assert_eq!(config.stall_timeout_ms, 5_000);
    }

    #[test]
    fn test_config_rejects_unknown_mode() {
        let json = r#"{"mode": "round-robin"}"#;
        assert!(serde_json::from_str::<SchedulerConfig>(json).is_err());
    }

    #[test]
    fn test_validate_zero_threshold() {
        let config = SchedulerConfig {
            notify_threshold: 0,
            ..SchedulerConfig::with_mode(ExecutionMode::DfsNotify)
        };
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));

        // Threshold is unused in plain dfs
        let config = SchedulerConfig {
            notify_threshold: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
