//! Capability tags emitted by the classifier and the attack kinds they map to.
//!
//! A [`Capability`] keeps the raw, per-resource tag shown to the operator
//! (`patchdaemonsets(web)[dev]`). Its [`AttackKind`] folds pod controllers and
//! webhook configurations into single families for dispatch and severity.

use crate::rbac::Constraint;
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Resource families ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PodController {
    DaemonSets,
    Deployments,
    StatefulSets,
    ReplicaSets,
    Jobs,
    CronJobs,
    ReplicationControllers,
}

impl PodController {
    pub const ALL: [PodController; 7] = [
        PodController::DaemonSets,
        PodController::Deployments,
        PodController::StatefulSets,
        PodController::ReplicaSets,
        PodController::Jobs,
        PodController::CronJobs,
        PodController::ReplicationControllers,
    ];

    pub fn resource(&self) -> &'static str {
        match self {
            PodController::DaemonSets => "daemonsets",
            PodController::Deployments => "deployments",
            PodController::StatefulSets => "statefulsets",
            PodController::ReplicaSets => "replicasets",
            PodController::Jobs => "jobs",
            PodController::CronJobs => "cronjobs",
            PodController::ReplicationControllers => "replicationcontrollers",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WebhookKind {
    Mutating,
    Validating,
}

impl WebhookKind {
    pub const ALL: [WebhookKind; 2] = [WebhookKind::Mutating, WebhookKind::Validating];

    pub fn resource(&self) -> &'static str {
        match self {
            WebhookKind::Mutating => "mutatingwebhookconfigurations",
            WebhookKind::Validating => "validatingwebhookconfigurations",
        }
    }
}

// --- Capability kinds ---

/// One dangerous action a ServiceAccount can exercise, before constraints.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    GetSecrets,
    WatchSecrets,
    CreateSecrets,
    PatchNodes,
    PatchNodeStatus,
    CreateNodes,
    DeleteNodes,
    PatchClusterRoles,
    PatchRoles,
    CreateClusterRoleBindings,
    PatchClusterRoleBindings,
    CreateRoleBindings,
    PatchRoleBindings,
    CreateTokens,
    CreatePods,
    PatchPods,
    DeletePods,
    ExecPods,
    EphemeralContainersPods,
    CreatePodEviction,
    CreateController(PodController),
    PatchController(PodController),
    CreateWebhook(WebhookKind),
    PatchWebhook(WebhookKind),
    DeleteValidatingWebhookConfigurations,
    Impersonate,
    /// `update` on an arbitrary resource type.
    Update(String),
}

impl CapabilityKind {
    /// Normalized dispatch kind, or `None` when no attack exists for this tag.
    pub fn attack_kind(&self) -> Option<AttackKind> {
        let kind = match self {
            CapabilityKind::GetSecrets => AttackKind::GetSecrets,
            CapabilityKind::WatchSecrets => AttackKind::WatchSecrets,
            CapabilityKind::CreateSecrets => AttackKind::CreateSecrets,
            CapabilityKind::PatchNodes => AttackKind::PatchNodes,
            CapabilityKind::PatchNodeStatus => AttackKind::PatchNodeStatus,
            CapabilityKind::CreateNodes => return None,
            CapabilityKind::DeleteNodes => AttackKind::DeleteNodes,
            CapabilityKind::PatchClusterRoles => AttackKind::PatchClusterRoles,
            CapabilityKind::PatchRoles => AttackKind::PatchRoles,
            CapabilityKind::CreateClusterRoleBindings => AttackKind::CreateClusterRoleBindings,
            CapabilityKind::PatchClusterRoleBindings => AttackKind::PatchClusterRoleBindings,
            CapabilityKind::CreateRoleBindings => AttackKind::CreateRoleBindings,
            CapabilityKind::PatchRoleBindings => AttackKind::PatchRoleBindings,
            CapabilityKind::CreateTokens => AttackKind::CreateTokens,
            CapabilityKind::CreatePods => AttackKind::CreatePods,
            CapabilityKind::PatchPods => AttackKind::PatchPods,
            CapabilityKind::DeletePods => AttackKind::DeletePods,
            CapabilityKind::ExecPods => AttackKind::ExecPods,
            CapabilityKind::EphemeralContainersPods => AttackKind::EphemeralContainersPods,
            CapabilityKind::CreatePodEviction => AttackKind::CreatePodEviction,
            CapabilityKind::CreateController(_) => AttackKind::CreatePodControllers,
            CapabilityKind::PatchController(_) => AttackKind::PatchPodControllers,
            CapabilityKind::CreateWebhook(_) => AttackKind::CreateWebhookConfig,
            CapabilityKind::PatchWebhook(_) => AttackKind::PatchWebhookConfig,
            CapabilityKind::DeleteValidatingWebhookConfigurations => {
                AttackKind::DeleteValidatingWebhookConfigurations
            }
            CapabilityKind::Impersonate => AttackKind::Impersonate,
            CapabilityKind::Update(resource) => match resource.as_str() {
                "secrets" => AttackKind::UpdateSecrets,
                "pods" => AttackKind::UpdatePods,
                _ => return None,
            },
        };
        Some(kind)
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::GetSecrets => write!(f, "getsecrets"),
            CapabilityKind::WatchSecrets => write!(f, "watchsecrets"),
            CapabilityKind::CreateSecrets => write!(f, "createsecrets"),
            CapabilityKind::PatchNodes => write!(f, "patchnodes"),
            CapabilityKind::PatchNodeStatus => write!(f, "patchnodestatus"),
            CapabilityKind::CreateNodes => write!(f, "createnodes"),
            CapabilityKind::DeleteNodes => write!(f, "deletenodes"),
            CapabilityKind::PatchClusterRoles => write!(f, "patchclusterroles"),
            CapabilityKind::PatchRoles => write!(f, "patchroles"),
            CapabilityKind::CreateClusterRoleBindings => write!(f, "createclusterrolebindings"),
            CapabilityKind::PatchClusterRoleBindings => write!(f, "patchclusterrolebindings"),
            CapabilityKind::CreateRoleBindings => write!(f, "createrolebindings"),
            CapabilityKind::PatchRoleBindings => write!(f, "patchrolebindings"),
            CapabilityKind::CreateTokens => write!(f, "createtokens"),
            CapabilityKind::CreatePods => write!(f, "createpods"),
            CapabilityKind::PatchPods => write!(f, "patchpods"),
            CapabilityKind::DeletePods => write!(f, "deletepods"),
            CapabilityKind::ExecPods => write!(f, "execpods"),
            CapabilityKind::EphemeralContainersPods => write!(f, "ephemeralcontainerspods"),
            CapabilityKind::CreatePodEviction => write!(f, "createpodeviction"),
            CapabilityKind::CreateController(c) => write!(f, "create{}", c.resource()),
            CapabilityKind::PatchController(c) => write!(f, "patch{}", c.resource()),
            CapabilityKind::CreateWebhook(w) => write!(f, "create{}", w.resource()),
            CapabilityKind::PatchWebhook(w) => write!(f, "patch{}", w.resource()),
            CapabilityKind::DeleteValidatingWebhookConfigurations => {
                write!(f, "deletevalidatingwebhookconfigurations")
            }
            CapabilityKind::Impersonate => write!(f, "impersonate"),
            CapabilityKind::Update(resource) => write!(f, "update{}", resource),
        }
    }
}

/// A capability kind together with the constraint it was granted under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub kind: CapabilityKind,
    #[serde(default)]
    pub constraint: Constraint,
}

impl Capability {
    pub fn new(kind: CapabilityKind, constraint: Constraint) -> Self {
        Self { kind, constraint }
    }

    pub fn unrestricted(kind: CapabilityKind) -> Self {
        Self::new(kind, Constraint::default())
    }
}

/// The raw tag, e.g. `getsecrets(db-cred)` or `deletepods[kube-system]`.
impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.constraint)
    }
}

// --- Attack categories and tiers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Escalate,
    Hijack,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Escalate => write!(f, "escalate"),
            Category::Hijack => write!(f, "hijack"),
        }
    }
}

/// Severity tier. `Any*` tiers reach any workload; `Restrict*` tiers are
/// confined to a namespace or named resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    AnyEscalate,
    RestrictEscalate,
    AnyHijack,
    RestrictHijack,
}

impl Tier {
    pub fn category(&self) -> Category {
        match self {
            Tier::AnyEscalate | Tier::RestrictEscalate => Category::Escalate,
            Tier::AnyHijack | Tier::RestrictHijack => Category::Hijack,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Tier::AnyEscalate | Tier::AnyHijack)
    }

    /// The restricted tier of the same category.
    pub fn restricted(&self) -> Tier {
        match self.category() {
            Category::Escalate => Tier::RestrictEscalate,
            Category::Hijack => Tier::RestrictHijack,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::AnyEscalate => write!(f, "anyescalate"),
            Tier::RestrictEscalate => write!(f, "restrictescalate"),
            Tier::AnyHijack => write!(f, "anyhijack"),
            Tier::RestrictHijack => write!(f, "restricthijack"),
        }
    }
}

// --- Attack kinds ---

/// Normalized dispatch key: the closed set of attacks a registry can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttackKind {
    Impersonate,
    CreateClusterRoleBindings,
    PatchClusterRoles,
    CreateTokens,
    CreatePods,
    CreatePodControllers,
    PatchPodControllers,
    CreateWebhookConfig,
    PatchWebhookConfig,
    CreateRoleBindings,
    PatchClusterRoleBindings,
    PatchRoleBindings,
    PatchRoles,
    CreateSecrets,
    GetSecrets,
    WatchSecrets,
    UpdateSecrets,
    ExecPods,
    EphemeralContainersPods,
    PatchPods,
    UpdatePods,
    PatchNodes,
    PatchNodeStatus,
    DeleteNodes,
    DeleteValidatingWebhookConfigurations,
    DeletePods,
    CreatePodEviction,
}

impl AttackKind {
    pub const ALL: [AttackKind; 27] = [
        AttackKind::Impersonate,
        AttackKind::CreateClusterRoleBindings,
        AttackKind::PatchClusterRoles,
        AttackKind::CreateTokens,
        AttackKind::CreatePods,
        AttackKind::CreatePodControllers,
        AttackKind::PatchPodControllers,
        AttackKind::CreateWebhookConfig,
        AttackKind::PatchWebhookConfig,
        AttackKind::CreateRoleBindings,
        AttackKind::PatchClusterRoleBindings,
        AttackKind::PatchRoleBindings,
        AttackKind::PatchRoles,
        AttackKind::CreateSecrets,
        AttackKind::GetSecrets,
        AttackKind::WatchSecrets,
        AttackKind::UpdateSecrets,
        AttackKind::ExecPods,
        AttackKind::EphemeralContainersPods,
        AttackKind::PatchPods,
        AttackKind::UpdatePods,
        AttackKind::PatchNodes,
        AttackKind::PatchNodeStatus,
        AttackKind::DeleteNodes,
        AttackKind::DeleteValidatingWebhookConfigurations,
        AttackKind::DeletePods,
        AttackKind::CreatePodEviction,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AttackKind::Impersonate => "impersonate",
            AttackKind::CreateClusterRoleBindings => "createclusterrolebindings",
            AttackKind::PatchClusterRoles => "patchclusterroles",
            AttackKind::CreateTokens => "createtokens",
            AttackKind::CreatePods => "createpods",
            AttackKind::CreatePodControllers => "createpodcontrollers",
            AttackKind::PatchPodControllers => "patchpodcontrollers",
            AttackKind::CreateWebhookConfig => "createwebhookconfig",
            AttackKind::PatchWebhookConfig => "patchwebhookconfig",
            AttackKind::CreateRoleBindings => "createrolebindings",
            AttackKind::PatchClusterRoleBindings => "patchclusterrolebindings",
            AttackKind::PatchRoleBindings => "patchrolebindings",
            AttackKind::PatchRoles => "patchroles",
            AttackKind::CreateSecrets => "createsecrets",
            AttackKind::GetSecrets => "getsecrets",
            AttackKind::WatchSecrets => "watchsecrets",
            AttackKind::UpdateSecrets => "updatesecrets",
            AttackKind::ExecPods => "execpods",
            AttackKind::EphemeralContainersPods => "ephemeralcontainerspods",
            AttackKind::PatchPods => "patchpods",
            AttackKind::UpdatePods => "updatepods",
            AttackKind::PatchNodes => "patchnodes",
            AttackKind::PatchNodeStatus => "patchnodestatus",
            AttackKind::DeleteNodes => "deletenodes",
            AttackKind::DeleteValidatingWebhookConfigurations => {
                "deletevalidatingwebhookconfigurations"
            }
            AttackKind::DeletePods => "deletepods",
            AttackKind::CreatePodEviction => "createpodeviction",
        }
    }

    /// Static severity tier, before the namespace-scope override.
    pub fn tier(&self) -> Tier {
        match self {
            AttackKind::Impersonate
            | AttackKind::CreateClusterRoleBindings
            | AttackKind::PatchClusterRoles
            | AttackKind::CreateTokens
            | AttackKind::CreatePods
            | AttackKind::CreatePodControllers
            | AttackKind::PatchPodControllers
            | AttackKind::CreateWebhookConfig
            | AttackKind::PatchWebhookConfig => Tier::AnyEscalate,
            AttackKind::CreateRoleBindings
            | AttackKind::PatchClusterRoleBindings
            | AttackKind::PatchRoleBindings
            | AttackKind::PatchRoles
            | AttackKind::CreateSecrets
            | AttackKind::GetSecrets
            | AttackKind::WatchSecrets
            | AttackKind::UpdateSecrets
            | AttackKind::ExecPods
            | AttackKind::EphemeralContainersPods
            | AttackKind::PatchPods
            | AttackKind::UpdatePods => Tier::RestrictEscalate,
            AttackKind::PatchNodes
            | AttackKind::PatchNodeStatus
            | AttackKind::DeleteNodes
            | AttackKind::DeleteValidatingWebhookConfigurations
            | AttackKind::DeletePods => Tier::AnyHijack,
            AttackKind::CreatePodEviction => Tier::RestrictHijack,
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
