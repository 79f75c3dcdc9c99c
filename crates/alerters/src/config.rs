//! Serde model for the alerters section of the config file.

use serde::{Deserialize, Serialize};

/// Named alerter instances, grouped by backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertersConfig {
    #[serde(default)]
    pub stdout: Vec<StdoutAlerter>,
    #[serde(default)]
    pub slack: Vec<SlackAlerter>,
    #[serde(default)]
    pub pagerduty: Vec<PagerDutyAlerter>,
}

impl AlertersConfig {
    /// Whether a `(type, name)` pair resolves to a configured instance.
    #[must_use]
    pub fn contains(&self, alerter_type: &str, name: &str) -> bool {
        match alerter_type {
            "stdout" => self.stdout.iter().any(|a| a.name == name),
            "slack" => self.slack.iter().any(|a| a.name == name),
            "pagerduty" => self.pagerduty.iter().any(|a| a.name == name),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.slack.is_empty() && self.pagerduty.is_empty()
    }
}

/// Stdout alerter instance, mostly for development and log scraping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdoutAlerter {
    pub name: String,
}

/// Slack incoming-webhook alerter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackAlerter {
    pub name: String,
    pub webhook_url: String,
}

/// PagerDuty Events v2 alerter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagerDutyAlerter {
    pub name: String,
    pub routing_key: String,
}
