//! Fixed-interval scheduling of the configured checks.

use std::sync::Arc;
use std::time::Duration;

use alerters::AlertSink;
use chrono::{DateTime, Utc};
use config::Config;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::checks::{poll_node, PollContext};
use crate::cluster::NodeFetcher;

/// Rolling record of scheduler progress, shared with the health listener.
#[derive(Debug, Clone)]
pub struct WatchStatus {
    pub started_at: DateTime<Utc>,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_poll_errors: usize,
    pub polls_completed: u64,
}

impl WatchStatus {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            last_poll_at: None,
            last_poll_errors: 0,
            polls_completed: 0,
        }
    }
}

/// Drives the configured node alert rules on a fixed cadence.
pub struct Watcher {
    fetcher: Arc<dyn NodeFetcher>,
    sink: Arc<dyn AlertSink>,
    config: Config,
    status: Arc<RwLock<WatchStatus>>,
}

impl Watcher {
    #[must_use]
    pub fn new(fetcher: Arc<dyn NodeFetcher>, sink: Arc<dyn AlertSink>, config: Config) -> Self {
        Self {
            fetcher,
            sink,
            config,
            status: Arc::new(RwLock::new(WatchStatus::new())),
        }
    }

    /// Handle to the status record for the health listener.
    #[must_use]
    pub fn status(&self) -> Arc<RwLock<WatchStatus>> {
        Arc::clone(&self.status)
    }

    /// Run every configured rule once.
    ///
    /// Each rule is polled to completion before the next starts; a rule
    /// that fails with a fetch error is logged and does not stop the
    /// others. Returns the number of rules that failed.
    pub async fn poll_all(&self) -> usize {
        let tick_interval = self.config.poll_interval_secs as i64;
        let mut errors = 0;

        for spec in &self.config.node_alerts {
            let ctx = PollContext {
                now: Utc::now(),
                tick_interval,
                sink: self.sink.as_ref(),
            };
            if let Err(e) = poll_node(self.fetcher.as_ref(), spec, &ctx).await {
                error!(rule = %spec.name, error = %e, "Node poll failed");
                errors += 1;
            }
        }

        let mut status = self.status.write().await;
        status.last_poll_at = Some(Utc::now());
        status.last_poll_errors = errors;
        status.polls_completed += 1;

        errors
    }

    /// Poll on the configured interval, forever.
    pub async fn run(&self) {
        let period = Duration::from_secs(self.config.poll_interval_secs);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.poll_interval_secs,
            rules = self.config.node_alerts.len(),
            "Node watch started"
        );

        loop {
            ticker.tick().await;
            self.poll_all().await;
        }
    }
}
