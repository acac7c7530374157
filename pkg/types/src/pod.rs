use serde::{Deserialize, Serialize};

/// Snapshot of a live pod, as far as ServiceAccount analysis cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub namespace: String,
    pub name: String,
    /// Pod UID; names the pod's volume directory on its node.
    pub uid: String,
    /// Node the pod is scheduled on (empty while pending)
    #[serde(default)]
    pub node_name: String,
    /// ServiceAccount the pod runs as
    pub service_account: String,
    /// Kinds of the owning controllers (e.g. "ReplicaSet", "DaemonSet")
    #[serde(default)]
    pub controlled_by: Vec<String>,
    /// Whether a ServiceAccount token is auto-mounted into the pod
    #[serde(default = "default_token_mounted")]
    pub token_mounted: bool,
}

fn default_token_mounted() -> bool {
    true
}

impl Pod {
    /// `namespace/serviceAccount`, the key used by the permission index.
    pub fn service_account_key(&self) -> String {
        format!("{}/{}", self.namespace, self.service_account)
    }

    pub fn runs_on(&self, node_name: &str) -> bool {
        !self.node_name.is_empty() && self.node_name == node_name
    }
}
