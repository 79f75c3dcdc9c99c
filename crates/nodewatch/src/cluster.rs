//! Cluster access for node checks.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client};

/// Server-side timeout applied to node list calls.
const LIST_TIMEOUT_SECS: u32 = 30;

/// Fetch capability the node checks run against.
///
/// Production code uses [`KubeNodeFetcher`]; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait NodeFetcher: Send + Sync {
    /// Fetch a single node by exact name.
    async fn get_node(&self, name: &str) -> Result<Node, kube::Error>;

    /// List nodes matching a label selector. An empty selector matches
    /// all nodes.
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>, kube::Error>;
}

/// [`NodeFetcher`] backed by the cluster API.
pub struct KubeNodeFetcher {
    api: Api<Node>,
}

impl KubeNodeFetcher {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl NodeFetcher for KubeNodeFetcher {
    async fn get_node(&self, name: &str) -> Result<Node, kube::Error> {
        self.api.get(name).await
    }

    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>, kube::Error> {
        let mut params = ListParams::default().timeout(LIST_TIMEOUT_SECS);
        if !label_selector.is_empty() {
            params = params.labels(label_selector);
        }

        let nodes = self.api.list(&params).await?;
        Ok(nodes.items)
    }
}
