//! Cluster health checks.

pub mod node;

pub use node::{poll_node, ConditionKind, FetchError, PollContext};
