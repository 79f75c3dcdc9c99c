//! Shared fakes and builders for check and scheduler tests.

use std::sync::Mutex;

use alerters::{AlertMessage, AlertSink};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use config::{NodeAlertSpec, ReportStatusSpec};
use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::core::ErrorResponse;

use crate::cluster::NodeFetcher;

/// Build a node created `age_secs` before `now` with the given conditions.
pub fn node(name: &str, age_secs: i64, now: DateTime<Utc>, conditions: Vec<NodeCondition>) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            creation_timestamp: Some(Time(now - Duration::seconds(age_secs))),
            ..ObjectMeta::default()
        },
        status: Some(NodeStatus {
            conditions: Some(conditions),
            ..NodeStatus::default()
        }),
        ..Node::default()
    }
}

/// Build a condition that last transitioned `seconds_ago` before `now`.
pub fn condition(condition_type: &str, seconds_ago: i64, now: DateTime<Utc>) -> NodeCondition {
    NodeCondition {
        type_: condition_type.to_string(),
        status: "True".to_string(),
        last_transition_time: Some(Time(now - Duration::seconds(seconds_ago))),
        ..NodeCondition::default()
    }
}

/// Build a rule targeting the stdout/console alerter.
pub fn spec_for(name: &str, report_status: ReportStatusSpec) -> NodeAlertSpec {
    NodeAlertSpec {
        name: name.to_string(),
        node_filter: String::new(),
        report_status,
        alerter_type: "stdout".to_string(),
        alerter_name: "console".to_string(),
    }
}

fn not_found(name: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("nodes {name:?} not found"),
        reason: "NotFound".to_string(),
        code: 404,
    })
}

/// In-memory fetcher over a fixed node set, recording every call.
///
/// Label filtering is the API server's job; the fake returns the whole
/// set for any selector and leaves the selector in `list_calls` for
/// assertions.
#[derive(Default)]
pub struct FakeFetcher {
    nodes: Vec<Node>,
    fail_get: Vec<String>,
    fail_list: bool,
    pub get_calls: Mutex<Vec<String>>,
    pub list_calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    pub fn failing_get(mut self, name: &str) -> Self {
        self.fail_get.push(name.to_string());
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }
}

#[async_trait]
impl NodeFetcher for FakeFetcher {
    async fn get_node(&self, name: &str) -> Result<Node, kube::Error> {
        self.get_calls.lock().unwrap().push(name.to_string());
        if self.fail_get.iter().any(|n| n == name) {
            return Err(not_found(name));
        }
        self.nodes
            .iter()
            .find(|n| n.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>, kube::Error> {
        self.list_calls
            .lock()
            .unwrap()
            .push(label_selector.to_string());
        if self.fail_list {
            return Err(not_found("*"));
        }
        Ok(self.nodes.clone())
    }
}

/// One dispatch captured by [`RecordingSink`].
pub struct DispatchRecord {
    pub alerter_type: String,
    pub alerter_name: String,
    pub message: AlertMessage,
}

/// Sink that records every dispatch instead of delivering it.
#[derive(Default)]
pub struct RecordingSink {
    pub dispatched: Mutex<Vec<DispatchRecord>>,
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn dispatch(&self, alerter_type: &str, alerter_name: &str, message: &AlertMessage) {
        self.dispatched.lock().unwrap().push(DispatchRecord {
            alerter_type: alerter_type.to_string(),
            alerter_name: alerter_name.to_string(),
            message: message.clone(),
        });
    }
}
