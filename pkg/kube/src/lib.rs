//! Kubernetes API access for the RBAC scan.
//!
//! [`ClusterSource`] is the fetch interface the graph builder consumes;
//! [`client::KubeClient`] implements it over the REST API.

pub mod client;
pub mod retry;
pub mod wire;

use async_trait::async_trait;
use pkg_types::pod::Pod;
use pkg_types::rbac::{RoleBinding, RoleRef, Rule};

/// Read-only view of the cluster objects the scan needs.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// All pods in all namespaces.
    async fn list_pods(&self) -> anyhow::Result<Vec<Pod>>;

    /// All ClusterRoleBindings (bindings without a namespace).
    async fn list_cluster_role_bindings(&self) -> anyhow::Result<Vec<RoleBinding>>;

    /// All RoleBindings in all namespaces.
    async fn list_role_bindings(&self) -> anyhow::Result<Vec<RoleBinding>>;

    /// Rules of the referenced Role or ClusterRole.
    async fn get_rules(&self, role_ref: &RoleRef) -> anyhow::Result<Vec<Rule>>;
}
