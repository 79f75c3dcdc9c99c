//! Alert delivery for nodewatch checks.
//!
//! Checks hand finished [`AlertMessage`]s to a [`Dispatcher`], which routes
//! them to named alerter instances (stdout, Slack webhooks, PagerDuty
//! Events v2). Delivery is fire-and-forget from the check's perspective:
//! backend failures are logged here and never propagated back into the
//! poll cycle.
//!
//! # Usage
//!
//! ```no_run
//! use alerters::{AlertMessage, AlertSink, AlertersConfig, Dispatcher, Severity};
//!
//! # async fn example(config: AlertersConfig) {
//! let dispatcher = Dispatcher::from_config(&config);
//!
//! let message = AlertMessage::new(Severity::Critical, "node-status", "worker-1 flapped")
//!     .for_node("worker-1");
//! dispatcher.dispatch("slack", "ops", &message).await;
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`AlertChannel`] is the interface a backend implements
//! - [`StdoutChannel`], [`SlackChannel`] and [`PagerDutyChannel`] are the
//!   built-in backends
//! - [`Dispatcher`] indexes configured instances by `(type, name)` and
//!   implements [`AlertSink`], the seam checks dispatch through

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod config;
pub mod error;
pub mod message;

pub use channels::pagerduty::PagerDutyChannel;
pub use channels::slack::SlackChannel;
pub use channels::stdout::StdoutChannel;
pub use channels::AlertChannel;
pub use config::AlertersConfig;
pub use error::ChannelError;
pub use message::{AlertMessage, Severity};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

/// The seam checks dispatch alerts through.
///
/// Implementations must not propagate delivery failures; a check never
/// learns whether its alert actually landed.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn dispatch(&self, alerter_type: &str, alerter_name: &str, message: &AlertMessage);
}

/// Routes alerts to the configured channel instances.
pub struct Dispatcher {
    channels: HashMap<(String, String), Arc<dyn AlertChannel>>,
}

impl Dispatcher {
    /// Build a dispatcher from the alerters section of the config file.
    #[must_use]
    pub fn from_config(config: &AlertersConfig) -> Self {
        let mut channels: HashMap<(String, String), Arc<dyn AlertChannel>> = HashMap::new();

        for alerter in &config.stdout {
            channels.insert(
                ("stdout".to_string(), alerter.name.clone()),
                Arc::new(StdoutChannel::new(&alerter.name)),
            );
        }
        for alerter in &config.slack {
            channels.insert(
                ("slack".to_string(), alerter.name.clone()),
                Arc::new(SlackChannel::new(&alerter.name, &alerter.webhook_url)),
            );
        }
        for alerter in &config.pagerduty {
            channels.insert(
                ("pagerduty".to_string(), alerter.name.clone()),
                Arc::new(PagerDutyChannel::new(&alerter.name, &alerter.routing_key)),
            );
        }

        Self { channels }
    }

    /// Build a dispatcher over explicit channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn AlertChannel>>) -> Self {
        Self {
            channels: channels
                .into_iter()
                .map(|c| ((c.kind().to_string(), c.name().to_string()), c))
                .collect(),
        }
    }

    /// Number of configured channel instances.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[async_trait]
impl AlertSink for Dispatcher {
    async fn dispatch(&self, alerter_type: &str, alerter_name: &str, message: &AlertMessage) {
        let key = (alerter_type.to_string(), alerter_name.to_string());
        let Some(channel) = self.channels.get(&key) else {
            warn!(
                alerter_type,
                alerter_name, "Alert references an unknown alerter, dropping"
            );
            return;
        };

        match channel.send(message).await {
            Ok(()) => {
                debug!(alerter_type, alerter_name, "Alert dispatched");
            }
            Err(e) => {
                error!(
                    alerter_type,
                    alerter_name,
                    error = %e,
                    "Failed to dispatch alert"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SlackAlerter, StdoutAlerter};
    use std::sync::Mutex;

    struct RecordingChannel {
        name: String,
        sent: Mutex<Vec<AlertMessage>>,
    }

    impl RecordingChannel {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                sent: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl AlertChannel for RecordingChannel {
        fn kind(&self) -> &'static str {
            "recording"
        }

        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[test]
    fn test_from_config_indexes_all_instances() {
        let config = AlertersConfig {
            stdout: vec![StdoutAlerter {
                name: "console".to_string(),
            }],
            slack: vec![
                SlackAlerter {
                    name: "ops".to_string(),
                    webhook_url: "https://hooks.slack.com/services/T0/B0/XX".to_string(),
                },
                SlackAlerter {
                    name: "oncall".to_string(),
                    webhook_url: "https://hooks.slack.com/services/T0/B1/YY".to_string(),
                },
            ],
            pagerduty: vec![],
        };

        let dispatcher = Dispatcher::from_config(&config);
        assert_eq!(dispatcher.channel_count(), 3);
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_matching_channel() {
        let channel = Arc::new(RecordingChannel::new("ops"));
        let dispatcher = Dispatcher::with_channels(vec![channel.clone()]);

        let message = AlertMessage::new(Severity::Info, "node-status", "hello");
        dispatcher.dispatch("recording", "ops", &message).await;

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "hello");
    }

    #[tokio::test]
    async fn test_dispatch_to_unknown_alerter_is_dropped() {
        let channel = Arc::new(RecordingChannel::new("ops"));
        let dispatcher = Dispatcher::with_channels(vec![channel.clone()]);

        let message = AlertMessage::new(Severity::Info, "node-status", "hello");
        dispatcher.dispatch("recording", "nobody", &message).await;
        dispatcher.dispatch("slack", "ops", &message).await;

        assert!(channel.sent.lock().unwrap().is_empty());
    }
}
