use pkg_constants::rbac::{KUBE_SYSTEM_NAMESPACE, SERVICE_ACCOUNT_KIND, WILDCARD};
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Policy rules ---

/// Wire-compatible with the Kubernetes `PolicyRule` JSON shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// API groups this rule applies to (e.g., "" for core, "*" for all)
    #[serde(default)]
    pub api_groups: Vec<String>,
    /// Resource types (e.g., "pods", "pods/exec", "*" for all)
    #[serde(default)]
    pub resources: Vec<String>,
    /// Named instances the rule is restricted to; empty means any instance
    #[serde(default)]
    pub resource_names: Vec<String>,
    /// Allowed verbs (e.g., "get", "patch", "bind", "*" for all)
    #[serde(default)]
    pub verbs: Vec<String>,
}

impl PolicyRule {
    /// Expand into a [`Rule`], producing one resource reference per
    /// `resource × resourceName` pair when the rule names instances.
    pub fn expand(&self) -> Rule {
        let mut resources = Vec::new();
        for resource in &self.resources {
            if self.resource_names.is_empty() {
                resources.push(ResourceRef::new(resource));
            } else {
                for name in &self.resource_names {
                    resources.push(ResourceRef::new(resource).with_name(name));
                }
            }
        }
        Rule {
            resources,
            verbs: self.verbs.clone(),
        }
    }
}

/// A flattened rule: every resource it covers and every verb it grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub resources: Vec<ResourceRef>,
    pub verbs: Vec<String>,
}

// --- Constraint ---

/// Restriction carried by a grant: a named instance, a namespace, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Constraint {
    /// True when neither a resource name nor a namespace narrows the grant.
    pub fn is_unrestricted(&self) -> bool {
        self.resource_name.is_none() && self.namespace.is_none()
    }

    pub fn is_kube_system(&self) -> bool {
        self.namespace.as_deref() == Some(KUBE_SYSTEM_NAMESPACE)
    }
}

/// Renders as the suffix used in capability tags: `(name)[namespace]`.
impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.resource_name {
            write!(f, "({})", name)?;
        }
        if let Some(ns) = &self.namespace {
            write!(f, "[{}]", ns)?;
        }
        Ok(())
    }
}

// --- Resource reference ---

/// A resource type plus the constraint under which it was granted.
///
/// Ordering is derived so the permission index iterates deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource: String,
    #[serde(default)]
    pub constraint: Constraint,
}

impl ResourceRef {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            constraint: Constraint::default(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.constraint.resource_name = Some(name.to_string());
        self
    }

    /// Tag the reference with the namespace of the binding that granted it.
    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.constraint.namespace = Some(namespace.to_string());
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.resource == WILDCARD
    }

    /// Substring match against a resource family; the wildcard matches anything.
    pub fn matches(&self, family: &str) -> bool {
        self.is_wildcard() || self.resource.contains(family)
    }

    /// Exact match against a resource type; the wildcard matches anything.
    pub fn is_exactly(&self, resource: &str) -> bool {
        self.is_wildcard() || self.resource == resource
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.resource, self.constraint)
    }
}

// --- RoleRef ---

/// Reference from a binding to the role it grants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleRef {
    ClusterRole(String),
    Role { namespace: String, name: String },
}

impl RoleRef {
    /// Parse `namespace/name` as a Role and a bare name as a ClusterRole.
    pub fn parse(s: &str) -> Self {
        match s.split_once('/') {
            Some((namespace, name)) => RoleRef::Role {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            None => RoleRef::ClusterRole(s.to_string()),
        }
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleRef::ClusterRole(name) => write!(f, "{}", name),
            RoleRef::Role { namespace, name } => write!(f, "{}/{}", namespace, name),
        }
    }
}

// --- Subject ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
}

impl SubjectKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            SERVICE_ACCOUNT_KIND => SubjectKind::ServiceAccount,
            "Group" => SubjectKind::Group,
            _ => SubjectKind::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Subject {
    /// `namespace/name` for ServiceAccount subjects, `None` for anything else.
    pub fn service_account_key(&self) -> Option<String> {
        if self.kind != SubjectKind::ServiceAccount {
            return None;
        }
        let namespace = self.namespace.as_deref().unwrap_or_default();
        Some(format!("{}/{}", namespace, self.name))
    }
}

// --- RoleBinding ---

/// A RoleBinding (namespaced) or ClusterRoleBinding (`namespace == None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBinding {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub role_ref: RoleRef,
    /// ServiceAccount subjects as `namespace/name`.
    pub subjects: Vec<String>,
}

impl RoleBinding {
    /// Build a binding keeping only ServiceAccount subjects.
    pub fn new(name: &str, namespace: Option<&str>, role_ref: RoleRef, subjects: &[Subject]) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            role_ref,
            subjects: subjects
                .iter()
                .filter_map(Subject::service_account_key)
                .collect(),
        }
    }

    /// Tag a resource with this binding's namespace, if it has one.
    pub fn scope(&self, resource: ResourceRef) -> ResourceRef {
        match &self.namespace {
            Some(ns) => resource.in_namespace(ns),
            None => resource,
        }
    }
}
