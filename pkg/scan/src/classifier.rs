use pkg_constants::rbac::{COMPOUND_TRIGGER_THRESHOLD, TRIGGER_VERBS, WILDCARD};
use pkg_types::capability::{Capability, CapabilityKind, PodController, WebhookKind};
use pkg_types::rbac::ResourceRef;
use pkg_types::service_account::{CriticalServiceAccount, ServiceAccount, ServiceAccountIndex};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Classify every indexed ServiceAccount against the capability catalogue.
///
/// Accounts without any matching capability are dropped. Output order follows
/// the index order; stable ordering for presentation is applied by the planner.
pub fn classify(index: &ServiceAccountIndex, controlled_node: &str) -> Vec<CriticalServiceAccount> {
    let critical: Vec<CriticalServiceAccount> = index
        .values()
        .filter(|sa| !sa.permissions.is_empty())
        .filter_map(|sa| classify_account(sa, controlled_node))
        .collect();
    info!(
        "{} of {} ServiceAccounts carry dangerous capabilities",
        critical.len(),
        index.len()
    );
    critical
}

/// Classify one account; `None` when it exhibits no capability.
pub fn classify_account(sa: &ServiceAccount, controlled_node: &str) -> Option<CriticalServiceAccount> {
    let mut pass = Pass {
        critical: CriticalServiceAccount::new(sa.clone(), controlled_node),
        counters: [0; CompoundFamily::COUNT],
    };
    for (role, grants) in &sa.roles {
        pass.critical.roles.push(role.clone());
        for (resource, verbs) in grants {
            pass.inspect(resource, verbs);
        }
    }
    if pass.critical.capabilities.is_empty() {
        return None;
    }
    debug!(
        "{} → {:?} (level={})",
        sa.name,
        pass.critical.capability_tags(),
        pass.critical.level
    );
    Some(pass.critical)
}

/// Capabilities that need two independent grants on the same account.
#[derive(Debug, Clone, Copy)]
enum CompoundFamily {
    CreateClusterRoleBindings,
    PatchClusterRoleBindings,
    CreateRoleBindings,
    PatchRoleBindings,
    PatchClusterRoles,
    PatchRoles,
}

impl CompoundFamily {
    const COUNT: usize = 6;

    fn capability(self) -> CapabilityKind {
        match self {
            CompoundFamily::CreateClusterRoleBindings => CapabilityKind::CreateClusterRoleBindings,
            CompoundFamily::PatchClusterRoleBindings => CapabilityKind::PatchClusterRoleBindings,
            CompoundFamily::CreateRoleBindings => CapabilityKind::CreateRoleBindings,
            CompoundFamily::PatchRoleBindings => CapabilityKind::PatchRoleBindings,
            CompoundFamily::PatchClusterRoles => CapabilityKind::PatchClusterRoles,
            CompoundFamily::PatchRoles => CapabilityKind::PatchRoles,
        }
    }
}

/// State of one account's classification pass.
struct Pass {
    critical: CriticalServiceAccount,
    counters: [u32; CompoundFamily::COUNT],
}

impl Pass {
    fn emit(&mut self, kind: CapabilityKind, resource: &ResourceRef) {
        self.critical
            .add(Capability::new(kind, resource.constraint.clone()));
    }

    /// Count one trigger for `family`; the capability fires exactly when the
    /// counter reaches the threshold, never again after that.
    fn trigger(&mut self, family: CompoundFamily, resource: &ResourceRef) {
        let counter = &mut self.counters[family as usize];
        *counter += 1;
        if *counter == COMPOUND_TRIGGER_THRESHOLD {
            self.emit(family.capability(), resource);
        }
    }

    fn inspect(&mut self, r: &ResourceRef, verbs: &BTreeSet<String>) {
        if !verbs.iter().any(|v| TRIGGER_VERBS.contains(&v.as_str())) {
            return;
        }
        let wildcard = verbs.contains(WILDCARD);
        let has = |verb: &str| wildcard || verbs.contains(verb);

        if has("get") && r.matches("secrets") {
            self.emit(CapabilityKind::GetSecrets, r);
        }
        if has("watch") && r.matches("secrets") {
            self.emit(CapabilityKind::WatchSecrets, r);
        }

        if has("patch") {
            if r.is_exactly("nodes") {
                self.emit(CapabilityKind::PatchNodes, r);
            }
            if r.is_exactly("nodes/status") {
                self.emit(CapabilityKind::PatchNodeStatus, r);
            }
            if r.matches("clusterroles") {
                self.trigger(CompoundFamily::PatchClusterRoles, r);
            }
            if r.matches("roles") {
                self.trigger(CompoundFamily::PatchRoles, r);
            }
            if r.matches("clusterrolebindings") {
                self.trigger(CompoundFamily::PatchClusterRoleBindings, r);
            }
            if r.matches("rolebindings") {
                self.trigger(CompoundFamily::PatchRoleBindings, r);
            }
            if r.matches("pods") {
                self.emit(CapabilityKind::PatchPods, r);
            }
            for controller in matching_controllers(r) {
                self.emit(CapabilityKind::PatchController(controller), r);
            }
            for webhook in WebhookKind::ALL {
                if r.matches(webhook.resource()) {
                    self.emit(CapabilityKind::PatchWebhook(webhook), r);
                }
            }
        }

        if has("create") {
            if r.matches("secrets") {
                self.emit(CapabilityKind::CreateSecrets, r);
            }
            if r.matches("clusterrolebindings") {
                self.trigger(CompoundFamily::CreateClusterRoleBindings, r);
            }
            if r.matches("rolebindings") {
                self.trigger(CompoundFamily::CreateRoleBindings, r);
            }
            if r.matches("serviceaccounts/token") {
                self.emit(CapabilityKind::CreateTokens, r);
            }
            if r.matches("pods") {
                self.emit(CapabilityKind::CreatePods, r);
            }
            if r.matches("pods/exec") {
                self.emit(CapabilityKind::ExecPods, r);
            }
            if r.matches("pods/ephemeralcontainers") {
                self.emit(CapabilityKind::EphemeralContainersPods, r);
            }
            if r.is_exactly("pods/eviction") {
                self.emit(CapabilityKind::CreatePodEviction, r);
            }
            for controller in matching_controllers(r) {
                self.emit(CapabilityKind::CreateController(controller), r);
            }
            for webhook in WebhookKind::ALL {
                if r.matches(webhook.resource()) {
                    self.emit(CapabilityKind::CreateWebhook(webhook), r);
                }
            }
            if r.matches("nodes") {
                self.emit(CapabilityKind::CreateNodes, r);
            }
        }

        if has("bind") {
            if r.matches("clusterroles") {
                self.trigger(CompoundFamily::CreateClusterRoleBindings, r);
                self.trigger(CompoundFamily::PatchClusterRoleBindings, r);
            }
            if r.matches("roles") {
                self.trigger(CompoundFamily::CreateRoleBindings, r);
                self.trigger(CompoundFamily::PatchRoleBindings, r);
            }
        }

        if has("delete") {
            if r.matches("pods") {
                self.emit(CapabilityKind::DeletePods, r);
            }
            if r.matches("nodes") {
                self.emit(CapabilityKind::DeleteNodes, r);
            }
            if r.matches("validatingwebhookconfigurations") {
                self.emit(CapabilityKind::DeleteValidatingWebhookConfigurations, r);
            }
        }

        if has("escalate") {
            if r.matches("clusterroles") {
                self.trigger(CompoundFamily::PatchClusterRoles, r);
            }
            if r.matches("roles") {
                self.trigger(CompoundFamily::PatchRoles, r);
            }
        }

        // Neither impersonate nor update is implied by the wildcard verb.
        if verbs.contains("impersonate") {
            self.emit(CapabilityKind::Impersonate, r);
        }
        if verbs.contains("update") {
            self.emit(CapabilityKind::Update(r.resource.clone()), r);
        }
    }
}

/// Pod controller families named by `r`. `jobs` is a substring of `cronjobs`,
/// so a cronjob grant is not also reported as a job grant.
fn matching_controllers(r: &ResourceRef) -> Vec<PodController> {
    PodController::ALL
        .into_iter()
        .filter(|c| match c {
            PodController::Jobs => !r.matches("cronjobs") && r.matches("jobs"),
            other => r.matches(other.resource()),
        })
        .collect()
}
