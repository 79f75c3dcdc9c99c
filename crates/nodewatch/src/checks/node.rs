//! Node status check.
//!
//! Resolves the nodes an alert rule applies to and alerts on status
//! condition transitions that happened within the current poll window.
//! The window math works purely off the condition's own transition
//! timestamp and the tick interval, so the check carries no state between
//! cycles.

use alerters::{AlertMessage, AlertSink, Severity};
use chrono::{DateTime, Utc};
use config::{NodeAlertSpec, ReportStatusSpec};
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use thiserror::Error;
use tracing::debug;

use crate::cluster::NodeFetcher;

/// Check name carried on condition transition alerts.
const STATUS_CHECK: &str = "node-status";

/// Check name carried on minimum-count alerts.
const COUNT_CHECK: &str = "node-count";

/// A node fetch that failed, aborting the rest of the poll for the rule.
#[derive(Debug, Error)]
#[error("unable to fetch {target}: {source}")]
pub struct FetchError {
    target: String,
    #[source]
    source: kube::Error,
}

impl FetchError {
    fn node(name: &str, source: kube::Error) -> Self {
        Self {
            target: format!("node {name}"),
            source,
        }
    }

    fn list(source: kube::Error) -> Self {
        Self {
            target: "node list".to_string(),
            source,
        }
    }

    /// The fetch target that failed (a named node, or the node list).
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Ambient values for one poll cycle.
pub struct PollContext<'a> {
    /// Wall-clock time the cycle started.
    pub now: DateTime<Utc>,
    /// Scheduler tick interval in seconds. A transition younger than this
    /// happened since the previous poll and is new information for the
    /// cycle.
    pub tick_interval: i64,
    /// Dispatch handle alerts are delivered through.
    pub sink: &'a dyn AlertSink,
}

/// The node status conditions the check recognizes.
///
/// Anything else reported by the kubelet is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    Ready,
    OutOfDisk,
    MemoryPressure,
    DiskPressure,
}

impl ConditionKind {
    /// Map a reported condition type onto a recognized kind.
    #[must_use]
    pub fn from_condition_type(condition_type: &str) -> Option<Self> {
        match condition_type {
            "Ready" => Some(Self::Ready),
            "OutOfDisk" => Some(Self::OutOfDisk),
            "MemoryPressure" => Some(Self::MemoryPressure),
            "DiskPressure" => Some(Self::DiskPressure),
            _ => None,
        }
    }

    /// Whether the rule opted in to alerts for this kind.
    #[must_use]
    pub fn enabled(self, report: &ReportStatusSpec) -> bool {
        match self {
            Self::Ready => report.node_ready,
            Self::OutOfDisk => report.node_out_of_disk,
            Self::MemoryPressure => report.node_memory_pressure,
            Self::DiskPressure => report.node_disk_pressure,
        }
    }

    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::Ready | Self::OutOfDisk => Severity::Critical,
            Self::MemoryPressure | Self::DiskPressure => Severity::Warning,
        }
    }

    /// Alert body for a fresh transition on `node`.
    #[must_use]
    pub fn message(self, node: &str) -> String {
        match self {
            Self::Ready => format!(
                "Node {node} changed Ready status since the last poll and may be restarting"
            ),
            Self::OutOfDisk => format!(
                "Node {node} changed OutOfDisk status since the last poll and may be out of disk space"
            ),
            Self::MemoryPressure => format!(
                "Node {node} changed MemoryPressure status since the last poll and may be under memory pressure"
            ),
            Self::DiskPressure => format!(
                "Node {node} changed DiskPressure status since the last poll and may be under disk pressure"
            ),
        }
    }
}

/// Poll one node alert rule to completion.
///
/// Resolves the rule to a concrete set of nodes (a single named node, or
/// a label filter match with a minimum-count policy), then evaluates each
/// node's status conditions in sequence. Alerts are dispatched
/// synchronously as they are found.
///
/// # Errors
///
/// Returns [`FetchError`] if any node fetch fails. The remainder of the
/// rule's nodes are not evaluated for this cycle; the next tick starts
/// over from fresh state.
pub async fn poll_node(
    fetcher: &dyn NodeFetcher,
    spec: &NodeAlertSpec,
    ctx: &PollContext<'_>,
) -> Result<(), FetchError> {
    if !spec.selects_by_filter() {
        let node = fetcher
            .get_node(&spec.name)
            .await
            .map_err(|e| FetchError::node(&spec.name, e))?;
        evaluate_node(&node, spec, ctx).await;
        return Ok(());
    }

    let nodes = fetcher
        .list_nodes(&spec.node_filter)
        .await
        .map_err(FetchError::list)?;

    if nodes.len() < spec.report_status.min_nodes {
        let body = format!(
            "Matched {} nodes with filter {:?}, below the minimum of {}",
            nodes.len(),
            spec.node_filter,
            spec.report_status.min_nodes
        );
        let message = AlertMessage::new(Severity::Critical, COUNT_CHECK, body);
        ctx.sink
            .dispatch(&spec.alerter_type, &spec.alerter_name, &message)
            .await;
    }

    // The list result can be stale; re-fetch each node by name before
    // evaluating it.
    for listed in &nodes {
        let name = listed.name_any();
        let node = fetcher
            .get_node(&name)
            .await
            .map_err(|e| FetchError::node(&name, e))?;
        evaluate_node(&node, spec, ctx).await;
    }

    Ok(())
}

/// Evaluate one node's status conditions against the rule.
///
/// Nodes younger than the rule's pending threshold are skipped outright
/// so that nodes still joining the cluster do not false-positive.
/// Conditions are scanned in reported order and the first fresh, opted-in
/// transition wins: at most one alert per node per cycle, even when
/// several conditions transitioned in the same window.
async fn evaluate_node(node: &Node, spec: &NodeAlertSpec, ctx: &PollContext<'_>) {
    let name = node.name_any();

    if let Some(created) = node.metadata.creation_timestamp.as_ref() {
        let age = (ctx.now - created.0).num_seconds();
        if age <= spec.report_status.effective_pending_threshold() {
            debug!(node = %name, age, "Node younger than pending threshold, skipping");
            return;
        }
    }

    let Some(conditions) = node.status.as_ref().and_then(|s| s.conditions.as_deref()) else {
        return;
    };

    for condition in conditions {
        let Some(kind) = ConditionKind::from_condition_type(&condition.type_) else {
            continue;
        };
        let Some(transitioned) = condition.last_transition_time.as_ref() else {
            continue;
        };

        let since_transition = (ctx.now - transitioned.0).num_seconds();
        if since_transition < ctx.tick_interval && kind.enabled(&spec.report_status) {
            let message = AlertMessage::new(kind.severity(), STATUS_CHECK, kind.message(&name))
                .for_node(name.as_str());
            ctx.sink
                .dispatch(&spec.alerter_type, &spec.alerter_name, &message)
                .await;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{condition, node, spec_for, FakeFetcher, RecordingSink};
    use config::WILDCARD_NODE;

    fn ready_report() -> ReportStatusSpec {
        ReportStatusSpec {
            node_ready: true,
            ..ReportStatusSpec::default()
        }
    }

    #[tokio::test]
    async fn named_rule_fetches_once_and_alerts_on_fresh_ready() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![node(
            "worker-1",
            60,
            now,
            vec![condition("Ready", 5, now)],
        )]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        poll_node(&fetcher, &spec_for("worker-1", ready_report()), &ctx)
            .await
            .unwrap();

        assert_eq!(*fetcher.get_calls.lock().unwrap(), vec!["worker-1"]);
        assert!(fetcher.list_calls.lock().unwrap().is_empty());

        let dispatched = sink.dispatched.lock().unwrap();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].alerter_type, "stdout");
        assert_eq!(dispatched[0].alerter_name, "console");
        assert_eq!(dispatched[0].message.check, "node-status");
        assert!(dispatched[0].message.body.contains("Ready"));
        assert_eq!(dispatched[0].message.node.as_deref(), Some("worker-1"));
    }

    #[tokio::test]
    async fn named_rule_fetch_failure_aborts_without_dispatch() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![]).failing_get("worker-1");
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        let err = poll_node(&fetcher, &spec_for("worker-1", ready_report()), &ctx)
            .await
            .unwrap_err();

        assert_eq!(err.target(), "node worker-1");
        assert!(sink.dispatched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_node_is_not_evaluated() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![node(
            "worker-1",
            5,
            now,
            vec![condition("Ready", 1, now)],
        )]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        poll_node(&fetcher, &spec_for("worker-1", ready_report()), &ctx)
            .await
            .unwrap();

        assert!(sink.dispatched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unset_pending_threshold_behaves_like_the_default() {
        let now = Utc::now();

        for (threshold, age, expect_alert) in [(0, 10, false), (10, 10, false), (0, 11, true), (10, 11, true)] {
            let fetcher = FakeFetcher::new(vec![node(
                "worker-1",
                age,
                now,
                vec![condition("Ready", 1, now)],
            )]);
            let sink = RecordingSink::default();
            let ctx = PollContext {
                now,
                tick_interval: 10,
                sink: &sink,
            };

            let mut report = ready_report();
            report.pending_threshold_secs = threshold;

            poll_node(&fetcher, &spec_for("worker-1", report), &ctx)
                .await
                .unwrap();

            assert_eq!(
                sink.dispatched.lock().unwrap().len(),
                usize::from(expect_alert),
                "threshold={threshold} age={age}"
            );
        }
    }

    #[tokio::test]
    async fn stale_transition_does_not_alert() {
        let now = Utc::now();
        // Exactly tick_interval old is already stale; the window is strict.
        let fetcher = FakeFetcher::new(vec![node(
            "worker-1",
            60,
            now,
            vec![condition("Ready", 10, now)],
        )]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        poll_node(&fetcher, &spec_for("worker-1", ready_report()), &ctx)
            .await
            .unwrap();

        assert!(sink.dispatched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_fresh_condition_wins() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![node(
            "worker-1",
            60,
            now,
            vec![condition("Ready", 5, now), condition("MemoryPressure", 2, now)],
        )]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        let report = ReportStatusSpec {
            node_ready: true,
            node_memory_pressure: true,
            ..ReportStatusSpec::default()
        };
        poll_node(&fetcher, &spec_for("worker-1", report), &ctx)
            .await
            .unwrap();

        let dispatched = sink.dispatched.lock().unwrap();
        assert_eq!(dispatched.len(), 1);
        assert!(dispatched[0].message.body.contains("Ready"));
    }

    #[tokio::test]
    async fn opted_out_condition_is_scanned_past() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![node(
            "worker-1",
            60,
            now,
            vec![condition("Ready", 5, now), condition("MemoryPressure", 2, now)],
        )]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        let report = ReportStatusSpec {
            node_memory_pressure: true,
            ..ReportStatusSpec::default()
        };
        poll_node(&fetcher, &spec_for("worker-1", report), &ctx)
            .await
            .unwrap();

        let dispatched = sink.dispatched.lock().unwrap();
        assert_eq!(dispatched.len(), 1);
        assert!(dispatched[0].message.body.contains("MemoryPressure"));
    }

    #[tokio::test]
    async fn unrecognized_condition_types_are_ignored() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![node(
            "worker-1",
            60,
            now,
            vec![condition("NetworkUnavailable", 1, now), condition("PIDPressure", 1, now)],
        )]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        poll_node(&fetcher, &spec_for("worker-1", ready_report()), &ctx)
            .await
            .unwrap();

        assert!(sink.dispatched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn node_without_creation_timestamp_is_evaluated() {
        let now = Utc::now();
        let mut bare = node("worker-1", 60, now, vec![condition("Ready", 5, now)]);
        bare.metadata.creation_timestamp = None;

        let fetcher = FakeFetcher::new(vec![bare]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        poll_node(&fetcher, &spec_for("worker-1", ready_report()), &ctx)
            .await
            .unwrap();

        assert_eq!(sink.dispatched.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn filtered_rule_below_minimum_alerts_once() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![
            node("worker-1", 60, now, vec![condition("Ready", 30, now)]),
            node("worker-2", 60, now, vec![condition("Ready", 30, now)]),
        ]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        let mut report = ready_report();
        report.min_nodes = 3;
        let mut spec = spec_for(WILDCARD_NODE, report);
        spec.node_filter = "role=worker".to_string();

        poll_node(&fetcher, &spec, &ctx).await.unwrap();

        assert_eq!(*fetcher.list_calls.lock().unwrap(), vec!["role=worker"]);

        let dispatched = sink.dispatched.lock().unwrap();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].message.check, "node-count");
        assert!(dispatched[0].message.body.contains("role=worker"));
        assert!(dispatched[0].message.body.contains("minimum of 3"));
    }

    #[tokio::test]
    async fn filtered_rule_at_minimum_has_no_count_alert() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![
            node("worker-1", 60, now, vec![condition("Ready", 30, now)]),
            node("worker-2", 60, now, vec![condition("Ready", 30, now)]),
        ]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        let mut report = ready_report();
        report.min_nodes = 2;
        poll_node(&fetcher, &spec_for(WILDCARD_NODE, report), &ctx)
            .await
            .unwrap();

        assert!(sink.dispatched.lock().unwrap().is_empty());
        // Every listed node was re-fetched by name before evaluation.
        assert_eq!(
            *fetcher.get_calls.lock().unwrap(),
            vec!["worker-1", "worker-2"]
        );
    }

    #[tokio::test]
    async fn filtered_rule_refetch_failure_aborts_remaining_nodes() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![
            node("worker-1", 60, now, vec![condition("Ready", 30, now)]),
            node("worker-2", 60, now, vec![condition("Ready", 1, now)]),
        ])
        .failing_get("worker-1");
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        let err = poll_node(&fetcher, &spec_for(WILDCARD_NODE, ready_report()), &ctx)
            .await
            .unwrap_err();

        assert_eq!(err.target(), "node worker-1");
        // worker-2 was never re-fetched, so its fresh transition went
        // unreported this cycle.
        assert_eq!(*fetcher.get_calls.lock().unwrap(), vec!["worker-1"]);
        assert!(sink.dispatched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn filtered_rule_list_failure_aborts_without_dispatch() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![]).failing_list();
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };

        let err = poll_node(&fetcher, &spec_for(WILDCARD_NODE, ready_report()), &ctx)
            .await
            .unwrap_err();

        assert_eq!(err.target(), "node list");
        assert!(sink.dispatched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn evaluation_is_idempotent_for_identical_inputs() {
        let now = Utc::now();
        let fetcher = FakeFetcher::new(vec![node(
            "worker-1",
            60,
            now,
            vec![condition("Ready", 5, now)],
        )]);
        let sink = RecordingSink::default();
        let ctx = PollContext {
            now,
            tick_interval: 10,
            sink: &sink,
        };
        let spec = spec_for("worker-1", ready_report());

        poll_node(&fetcher, &spec, &ctx).await.unwrap();
        poll_node(&fetcher, &spec, &ctx).await.unwrap();

        let dispatched = sink.dispatched.lock().unwrap();
        assert_eq!(dispatched.len(), 2);
        assert_eq!(dispatched[0].message.body, dispatched[1].message.body);
    }
}
