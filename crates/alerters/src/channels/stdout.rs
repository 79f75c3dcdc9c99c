//! Stdout alert channel.

use async_trait::async_trait;

use crate::channels::AlertChannel;
use crate::error::ChannelError;
use crate::message::AlertMessage;

/// Writes alerts as single lines on stdout.
pub struct StdoutChannel {
    name: String,
}

impl StdoutChannel {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl AlertChannel for StdoutChannel {
    fn kind(&self) -> &'static str {
        "stdout"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        println!("{}", message.render_line());
        Ok(())
    }
}
