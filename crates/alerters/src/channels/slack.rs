//! Slack webhook alert channel.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::channels::AlertChannel;
use crate::error::ChannelError;
use crate::message::AlertMessage;

/// Slack incoming-webhook channel.
pub struct SlackChannel {
    name: String,
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackChannel {
    #[must_use]
    pub fn new(name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Format an alert as a Slack webhook payload.
    fn format_payload(message: &AlertMessage) -> SlackPayload {
        let mut fields = vec![SlackField {
            title: "Check".to_string(),
            value: message.check.clone(),
            short: true,
        }];
        if let Some(node) = &message.node {
            fields.push(SlackField {
                title: "Node".to_string(),
                value: node.clone(),
                short: true,
            });
        }

        let title = match &message.node {
            Some(node) => format!("{}: {node}", message.check),
            None => message.check.clone(),
        };

        let attachment = SlackAttachment {
            fallback: message.render_line(),
            color: format!("#{:06x}", message.severity.color()),
            title,
            text: message.body.clone(),
            fields,
            footer: Some(format!(
                "{} | {}",
                message.severity.as_str(),
                message.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            ts: Some(message.timestamp.timestamp()),
        };

        SlackPayload {
            attachments: vec![attachment],
        }
    }
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn kind(&self) -> &'static str {
        "slack"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        let payload = Self::format_payload(message);

        debug!(channel = "slack", alerter = %self.name, "Sending alert");

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            debug!(channel = "slack", alerter = %self.name, "Alert delivered");
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            warn!(
                channel = "slack",
                alerter = %self.name,
                status,
                body = %body,
                "Slack webhook request failed"
            );

            Err(ChannelError::Rejected {
                backend: "slack",
                status,
                body,
            })
        }
    }
}

// =============================================================================
// Slack API types
// =============================================================================

#[derive(Debug, Serialize)]
struct SlackPayload {
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    fallback: String,
    color: String,
    title: String,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<SlackField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Severity;

    #[test]
    fn test_payload_carries_severity_color() {
        let message = AlertMessage::new(Severity::Critical, "node-status", "Node worker-1 flapped")
            .for_node("worker-1");
        let payload = SlackChannel::format_payload(&message);

        assert_eq!(payload.attachments.len(), 1);
        let attachment = &payload.attachments[0];
        assert_eq!(attachment.color, "#e74c3c");
        assert_eq!(attachment.title, "node-status: worker-1");
        assert_eq!(attachment.text, "Node worker-1 flapped");
        assert_eq!(attachment.fields.len(), 2);
    }

    #[test]
    fn test_payload_without_node_has_single_field() {
        let message = AlertMessage::new(Severity::Warning, "node-count", "Below minimum");
        let payload = SlackChannel::format_payload(&message);

        let attachment = &payload.attachments[0];
        assert_eq!(attachment.color, "#f39c12");
        assert_eq!(attachment.title, "node-count");
        assert_eq!(attachment.fields.len(), 1);
    }
}
