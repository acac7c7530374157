//! RBAC catalogue constants shared by the classifier and planner.

/// Namespace whose grants are treated as cluster-wide sensitive.
pub const KUBE_SYSTEM_NAMESPACE: &str = "kube-system";

/// Wildcard used for both verbs and resources.
pub const WILDCARD: &str = "*";

/// Verbs that can trigger a capability.
pub const TRIGGER_VERBS: &[&str] = &[
    "get",
    "watch",
    "patch",
    "create",
    "bind",
    "delete",
    "escalate",
    "impersonate",
    "update",
    WILDCARD,
];

/// Number of independent trigger matches that fire a compound capability.
pub const COMPOUND_TRIGGER_THRESHOLD: u32 = 2;

/// Operator input that cancels the current selection.
pub const CANCEL_SENTINEL: i64 = -1;

/// Subject kind kept when reading binding subjects.
pub const SERVICE_ACCOUNT_KIND: &str = "ServiceAccount";

/// ServiceAccount assumed when a pod spec names none.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";
