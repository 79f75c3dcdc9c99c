//! Alert channel implementations.

pub mod pagerduty;
pub mod slack;
pub mod stdout;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::message::AlertMessage;

/// Trait for alert delivery channels (Slack, PagerDuty, stdout).
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Backend kind this channel delivers to (e.g. "slack").
    fn kind(&self) -> &'static str;

    /// Configured instance name.
    fn name(&self) -> &str;

    /// Deliver one alert to this channel.
    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError>;
}
