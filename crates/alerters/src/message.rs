//! Alert message model shared by all channels.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Severity as a lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Embed color used by webhook channels.
    #[must_use]
    pub const fn color(self) -> u32 {
        match self {
            Self::Info => 0x0034_98db,
            Self::Warning => 0x00f3_9c12,
            Self::Critical => 0x00e7_4c3c,
        }
    }
}

/// A single alert handed to a channel for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct AlertMessage {
    pub severity: Severity,
    /// Check that produced the alert (e.g. "node-status").
    pub check: String,
    /// Node the alert concerns, when there is one.
    pub node: Option<String>,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertMessage {
    #[must_use]
    pub fn new(severity: Severity, check: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity,
            check: check.into(),
            node: None,
            body: body.into(),
            timestamp: Utc::now(),
        }
    }

    /// Attach the node this alert concerns.
    #[must_use]
    pub fn for_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// One-line rendering used by plain-text channels.
    #[must_use]
    pub fn render_line(&self) -> String {
        let severity = self.severity.as_str().to_uppercase();
        match &self.node {
            Some(node) => format!("[{severity}] {} node={node}: {}", self.check, self.body),
            None => format!("[{severity}] {}: {}", self.check, self.body),
        }
    }
}
