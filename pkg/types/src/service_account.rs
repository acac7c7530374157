use crate::capability::Capability;
use crate::pod::Pod;
use crate::rbac::ResourceRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Resource → granted verbs.
pub type PermissionIndex = BTreeMap<ResourceRef, BTreeSet<String>>;

/// `namespace/name` → ServiceAccount.
pub type ServiceAccountIndex = BTreeMap<String, ServiceAccount>;

// --- ServiceAccount ---

/// A ServiceAccount and everything the bindings grant it.
///
/// Accreted while bindings are folded in, read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceAccount {
    /// `namespace/name`
    pub name: String,
    /// Whether a running pod mounts this account's token
    #[serde(default)]
    pub is_mounted: bool,
    /// The mounting pod, if any
    #[serde(default)]
    pub pod: Option<Pod>,
    /// Grants aggregated across all roles
    #[serde(default)]
    pub permissions: PermissionIndex,
    /// The same grants broken down by role reference
    #[serde(default)]
    pub roles: BTreeMap<String, PermissionIndex>,
    /// Names of the RoleBindings / ClusterRoleBindings granting access
    #[serde(default)]
    pub role_bindings: Vec<String>,
}

impl ServiceAccount {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Record one `(resource, verb)` grant coming from `role`.
    pub fn grant(&mut self, role: &str, resource: ResourceRef, verb: &str) {
        self.roles
            .entry(role.to_string())
            .or_default()
            .entry(resource.clone())
            .or_default()
            .insert(verb.to_string());
        self.permissions
            .entry(resource)
            .or_default()
            .insert(verb.to_string());
    }

    pub fn mount(&mut self, pod: Pod) {
        self.is_mounted = true;
        self.pod = Some(pod);
    }

    pub fn namespace(&self) -> &str {
        self.name.split_once('/').map(|(ns, _)| ns).unwrap_or_default()
    }

    pub fn node_name(&self) -> Option<&str> {
        self.pod.as_ref().map(|p| p.node_name.as_str())
    }
}

// --- Scope level ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeLevel {
    Cluster,
    #[default]
    Namespace,
}

impl std::fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeLevel::Cluster => write!(f, "cluster"),
            ScopeLevel::Namespace => write!(f, "namespace"),
        }
    }
}

// --- CriticalServiceAccount ---

/// A ServiceAccount that exhibits at least one dangerous capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalServiceAccount {
    pub account: ServiceAccount,
    /// The mounting pod runs on the controlled node
    pub in_node: bool,
    pub capabilities: Vec<Capability>,
    pub level: ScopeLevel,
    /// Last namespace constraint seen on a capability
    #[serde(default)]
    pub namespace: Option<String>,
    /// Last resource-name constraint seen on a capability
    #[serde(default)]
    pub resource_name: Option<String>,
    /// Role references the capabilities were drawn from
    #[serde(default)]
    pub roles: Vec<String>,
}

impl CriticalServiceAccount {
    pub fn new(account: ServiceAccount, controlled_node: &str) -> Self {
        let in_node = account
            .pod
            .as_ref()
            .is_some_and(|p| p.runs_on(controlled_node));
        Self {
            account,
            in_node,
            capabilities: Vec::new(),
            level: ScopeLevel::default(),
            namespace: None,
            resource_name: None,
            roles: Vec::new(),
        }
    }

    /// Append a capability, promoting the scope level when it is unrestricted
    /// and remembering its constraint otherwise. Identical tags are kept once.
    pub fn add(&mut self, capability: Capability) {
        let constraint = &capability.constraint;
        if constraint.is_unrestricted() {
            self.level = ScopeLevel::Cluster;
        }
        if let Some(name) = &constraint.resource_name {
            self.resource_name = Some(name.clone());
        }
        if let Some(ns) = &constraint.namespace {
            self.namespace = Some(ns.clone());
        }
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
    }

    /// Only mounted, in-node accounts can be exercised from the foothold.
    pub fn is_exploitable(&self) -> bool {
        self.in_node && self.account.is_mounted
    }

    pub fn capability_tags(&self) -> Vec<String> {
        self.capabilities.iter().map(|c| c.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityKind;
    use crate::rbac::Constraint;

    #[test]
    fn grant_aggregates_across_roles() {
        let mut sa = ServiceAccount::new("dev/builder");
        sa.grant("edit", ResourceRef::new("pods"), "create");
        sa.grant("view", ResourceRef::new("pods"), "get");
        sa.grant("view", ResourceRef::new("pods"), "get");

        let verbs = &sa.permissions[&ResourceRef::new("pods")];
        assert_eq!(verbs.len(), 2);
        assert_eq!(sa.roles.len(), 2);
        assert_eq!(sa.roles["view"][&ResourceRef::new("pods")].len(), 1);
        assert_eq!(sa.namespace(), "dev");
    }

    #[test]
    fn add_promotes_and_records_constraints() {
        let mut crit = CriticalServiceAccount::new(ServiceAccount::new("dev/builder"), "node-1");
        assert_eq!(crit.level, ScopeLevel::Namespace);

        crit.add(Capability::new(
            CapabilityKind::GetSecrets,
            Constraint {
                resource_name: Some("db-cred".to_string()),
                namespace: None,
            },
        ));
        assert_eq!(crit.level, ScopeLevel::Namespace);
        assert_eq!(crit.resource_name.as_deref(), Some("db-cred"));

        crit.add(Capability::unrestricted(CapabilityKind::Impersonate));
        assert_eq!(crit.level, ScopeLevel::Cluster);
        assert_eq!(crit.capability_tags(), vec!["getsecrets(db-cred)", "impersonate"]);
    }

    #[test]
    fn in_node_requires_matching_pod() {
        let mut sa = ServiceAccount::new("dev/builder");
        assert!(!CriticalServiceAccount::new(sa.clone(), "node-1").in_node);

        sa.mount(Pod {
            namespace: "dev".to_string(),
            name: "builder-0".to_string(),
            uid: "u1".to_string(),
            node_name: "node-1".to_string(),
            service_account: "builder".to_string(),
            controlled_by: vec![],
            token_mounted: true,
        });
        let crit = CriticalServiceAccount::new(sa, "node-1");
        assert!(crit.in_node);
        assert!(crit.is_exploitable());
    }
}
