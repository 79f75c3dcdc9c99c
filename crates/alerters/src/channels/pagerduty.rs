//! PagerDuty Events API v2 alert channel.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::channels::AlertChannel;
use crate::error::ChannelError;
use crate::message::{AlertMessage, Severity};

const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";

/// Source reported to PagerDuty when an alert has no node.
const DEFAULT_SOURCE: &str = "nodewatch";

/// PagerDuty Events v2 channel.
pub struct PagerDutyChannel {
    name: String,
    routing_key: String,
    api_url: String,
    client: reqwest::Client,
}

impl PagerDutyChannel {
    #[must_use]
    pub fn new(name: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routing_key: routing_key.into(),
            api_url: EVENTS_API_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a channel pointed at a specific events API URL (for testing).
    #[must_use]
    pub fn with_api_url(
        name: impl Into<String>,
        routing_key: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            routing_key: routing_key.into(),
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn format_event(&self, message: &AlertMessage) -> PagerDutyEvent {
        PagerDutyEvent {
            routing_key: self.routing_key.clone(),
            event_action: "trigger",
            payload: PagerDutyEventPayload {
                summary: message.body.clone(),
                source: message
                    .node
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                severity: pagerduty_severity(message.severity),
                timestamp: message.timestamp.to_rfc3339(),
                component: message.node.clone(),
                group: Some(message.check.clone()),
            },
        }
    }
}

/// Map alert severity onto the PagerDuty event severity scale.
fn pagerduty_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Critical => "critical",
    }
}

#[async_trait]
impl AlertChannel for PagerDutyChannel {
    fn kind(&self) -> &'static str {
        "pagerduty"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        let event = self.format_event(message);

        debug!(channel = "pagerduty", alerter = %self.name, "Sending alert");

        let response = self.client.post(&self.api_url).json(&event).send().await?;

        if response.status().is_success() {
            debug!(channel = "pagerduty", alerter = %self.name, "Alert delivered");
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            warn!(
                channel = "pagerduty",
                alerter = %self.name,
                status,
                body = %body,
                "PagerDuty enqueue request failed"
            );

            Err(ChannelError::Rejected {
                backend: "pagerduty",
                status,
                body,
            })
        }
    }
}

// =============================================================================
// PagerDuty API types
// =============================================================================

#[derive(Debug, Serialize)]
struct PagerDutyEvent {
    routing_key: String,
    event_action: &'static str,
    payload: PagerDutyEventPayload,
}

#[derive(Debug, Serialize)]
struct PagerDutyEventPayload {
    summary: String,
    source: String,
    severity: &'static str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
}
