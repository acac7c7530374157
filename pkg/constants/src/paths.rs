//! Filesystem and API path constants.

// ─── Console ──────────────────────────────────────────────────────────────

/// Default config file path for the console.
pub const DEFAULT_CONFIG: &str = "./conf/config.yaml";

/// Default directory for staged ServiceAccount token records.
pub const DEFAULT_LOOT_DIR: &str = "./loot";

// ─── Controlled node ──────────────────────────────────────────────────────

/// Kubelet directory holding per-pod volumes on a node.
pub const KUBELET_PODS_DIR: &str = "/var/lib/kubelet/pods";

/// Glob (relative to the pod directory) matching the projected SA token file.
pub const SA_TOKEN_VOLUME_GLOB: &str = "volumes/kubernetes.io*/*/token";

// ─── Kubernetes API ───────────────────────────────────────────────────────

/// Core API path listing pods across all namespaces.
pub const PODS_API: &str = "/api/v1/pods";

/// RBAC API group prefix.
pub const RBAC_API: &str = "/apis/rbac.authorization.k8s.io/v1";
