//! Kubernetes JSON shapes, reduced to the fields the scan reads.

use pkg_constants::rbac::DEFAULT_SERVICE_ACCOUNT;
use pkg_types::pod::Pod;
use pkg_types::rbac::{PolicyRule, RoleBinding, RoleRef, Subject, SubjectKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct List<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
}

// --- Pods ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub service_account_name: Option<String>,
    #[serde(default)]
    pub automount_service_account_token: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PodObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

impl From<PodObject> for Pod {
    fn from(obj: PodObject) -> Self {
        Pod {
            namespace: obj.metadata.namespace,
            name: obj.metadata.name,
            uid: obj.metadata.uid,
            node_name: obj.spec.node_name.unwrap_or_default(),
            service_account: obj
                .spec
                .service_account_name
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVICE_ACCOUNT.to_string()),
            controlled_by: obj
                .metadata
                .owner_references
                .into_iter()
                .map(|o| o.kind)
                .collect(),
            // The API server mounts the token unless told otherwise.
            token_mounted: obj.spec.automount_service_account_token.unwrap_or(true),
        }
    }
}

// --- Bindings ---

#[derive(Debug, Deserialize)]
pub struct WireRoleRef {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WireSubject {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl From<WireSubject> for Subject {
    fn from(s: WireSubject) -> Self {
        Subject {
            kind: SubjectKind::parse(&s.kind),
            name: s.name,
            namespace: s.namespace,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub role_ref: WireRoleRef,
    /// `null` when the binding has no subjects
    #[serde(default)]
    pub subjects: Option<Vec<WireSubject>>,
}

impl BindingObject {
    /// Convert a ClusterRoleBinding; its roleRef is always a ClusterRole.
    pub fn into_cluster_binding(self) -> RoleBinding {
        let role_ref = RoleRef::ClusterRole(self.role_ref.name.clone());
        self.into_binding(None, role_ref)
    }

    /// Convert a namespaced RoleBinding, which may reference a Role or a ClusterRole.
    pub fn into_namespaced_binding(self) -> RoleBinding {
        let namespace = self.metadata.namespace.clone();
        let role_ref = if self.role_ref.kind == "Role" {
            RoleRef::Role {
                namespace: namespace.clone(),
                name: self.role_ref.name.clone(),
            }
        } else {
            RoleRef::ClusterRole(self.role_ref.name.clone())
        };
        self.into_binding(Some(&namespace), role_ref)
    }

    fn into_binding(self, namespace: Option<&str>, role_ref: RoleRef) -> RoleBinding {
        let subjects: Vec<Subject> = self
            .subjects
            .unwrap_or_default()
            .into_iter()
            .map(Subject::from)
            .collect();
        RoleBinding::new(&self.metadata.name, namespace, role_ref, &subjects)
    }
}

// --- Roles ---

#[derive(Debug, Deserialize)]
pub struct RoleObject {
    #[serde(default)]
    pub rules: Option<Vec<PolicyRule>>,
}
