//! Configuration for the nodewatch daemon.
//!
//! The config file declares the poll cadence, the node alert rules, and
//! the alerter instances alerts are delivered through. YAML and JSON
//! files are supported, chosen by extension.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::fs;
use std::path::Path;

use alerters::AlertersConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Node name sentinel meaning "select nodes by label filter".
pub const WILDCARD_NODE: &str = "*";

/// Pending threshold applied when a rule leaves it unset.
pub const DEFAULT_PENDING_THRESHOLD_SECS: i64 = 10;

fn default_poll_interval() -> u64 {
    30
}

/// Root of the nodewatch config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Port for the health listener; absent means no listener unless the
    /// CLI provides one.
    #[serde(default)]
    pub health_port: Option<u16>,
    /// Node alert rules evaluated every cycle.
    #[serde(default)]
    pub node_alerts: Vec<NodeAlertSpec>,
    /// Alerter instances, grouped by backend.
    #[serde(default)]
    pub alerters: AlertersConfig,
}

/// One declarative node alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAlertSpec {
    /// Exact node name, or [`WILDCARD_NODE`] to select by `node_filter`.
    pub name: String,
    /// Label selector used when `name` is the wildcard. Empty matches all
    /// nodes.
    #[serde(default)]
    pub node_filter: String,
    /// Which condition transitions alert, plus the rule's policy knobs.
    #[serde(default)]
    pub report_status: ReportStatusSpec,
    /// Backend kind the alert goes to ("stdout", "slack", "pagerduty").
    pub alerter_type: String,
    /// Named alerter instance within that backend.
    pub alerter_name: String,
}

impl NodeAlertSpec {
    /// Whether this rule selects nodes by label filter rather than name.
    #[must_use]
    pub fn selects_by_filter(&self) -> bool {
        self.name == WILDCARD_NODE
    }
}

/// Per-condition opt-ins and evaluation policy for a node rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportStatusSpec {
    #[serde(default)]
    pub node_ready: bool,
    #[serde(default)]
    pub node_out_of_disk: bool,
    #[serde(default)]
    pub node_memory_pressure: bool,
    #[serde(default)]
    pub node_disk_pressure: bool,
    /// Nodes younger than this many seconds are not evaluated. Zero or
    /// negative means "use the default".
    #[serde(default)]
    pub pending_threshold_secs: i64,
    /// Minimum number of nodes a filtered rule must match.
    #[serde(default)]
    pub min_nodes: usize,
}

impl ReportStatusSpec {
    /// The pending threshold normalized to a positive value.
    #[must_use]
    pub fn effective_pending_threshold(&self) -> i64 {
        if self.pending_threshold_secs <= 0 {
            DEFAULT_PENDING_THRESHOLD_SECS
        } else {
            self.pending_threshold_secs
        }
    }
}

/// Errors raised while loading or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported config format {extension:?} (expected .yaml, .yml or .json)")]
    UnsupportedFormat { extension: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load and validate a config file, YAML or JSON by extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// it fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: Self = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: display,
                message: e.to_string(),
            })?,
            "json" => serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: display,
                message: e.to_string(),
            })?,
            other => {
                return Err(ConfigError::UnsupportedFormat {
                    extension: other.to_string(),
                })
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field invariants the serde model cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation
    /// found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be positive".to_string(),
            ));
        }

        if self.node_alerts.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one node alert rule is required".to_string(),
            ));
        }

        for spec in &self.node_alerts {
            if spec.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "node alert rules require a name (\"*\" selects by filter)".to_string(),
                ));
            }
            if !self.alerters.contains(&spec.alerter_type, &spec.alerter_name) {
                return Err(ConfigError::Invalid(format!(
                    "rule {:?} references unknown alerter {}/{}",
                    spec.name, spec.alerter_type, spec.alerter_name
                )));
            }
        }

        Ok(())
    }
}
