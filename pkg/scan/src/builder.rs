use pkg_kube::ClusterSource;
use pkg_types::pod::Pod;
use pkg_types::rbac::{RoleBinding, RoleRef, Rule};
use pkg_types::service_account::{ServiceAccount, ServiceAccountIndex};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Build the per-ServiceAccount permission index.
///
/// Every ClusterRoleBinding and RoleBinding is resolved to its rules and each
/// `(resource, verb)` pair is accreted onto every ServiceAccount subject. A
/// second pass over live pods marks the accounts that are actually mounted.
///
/// Fetch failures are logged and skipped: the result may be partial or empty.
pub async fn build_permission_index(source: &dyn ClusterSource) -> ServiceAccountIndex {
    let mut index = ServiceAccountIndex::new();
    let mut rules_cache: HashMap<RoleRef, Vec<Rule>> = HashMap::new();

    let cluster_bindings = source.list_cluster_role_bindings().await.unwrap_or_else(|e| {
        warn!("Failed to list ClusterRoleBindings: {:#}", e);
        Vec::new()
    });
    let bindings = source.list_role_bindings().await.unwrap_or_else(|e| {
        warn!("Failed to list RoleBindings: {:#}", e);
        Vec::new()
    });
    info!(
        "Resolving {} ClusterRoleBindings and {} RoleBindings",
        cluster_bindings.len(),
        bindings.len()
    );

    for binding in cluster_bindings.iter().chain(bindings.iter()) {
        if binding.subjects.is_empty() {
            continue;
        }
        if !rules_cache.contains_key(&binding.role_ref) {
            let rules = source.get_rules(&binding.role_ref).await.unwrap_or_else(|e| {
                warn!(
                    "Failed to resolve {} for binding {}: {:#}",
                    binding.role_ref, binding.name, e
                );
                Vec::new()
            });
            rules_cache.insert(binding.role_ref.clone(), rules);
        }
        let rules = &rules_cache[&binding.role_ref];
        fold_binding(&mut index, binding, rules);
    }

    match source.list_pods().await {
        Ok(pods) => mark_mounted(&mut index, pods),
        Err(e) => warn!("Failed to list pods: {:#}", e),
    }

    info!("Indexed {} ServiceAccounts", index.len());
    index
}

/// Accrete one binding's rules onto each of its ServiceAccount subjects.
pub fn fold_binding(index: &mut ServiceAccountIndex, binding: &RoleBinding, rules: &[Rule]) {
    let role = binding.role_ref.to_string();
    for subject in &binding.subjects {
        let sa = index
            .entry(subject.clone())
            .or_insert_with(|| ServiceAccount::new(subject));
        sa.role_bindings.push(binding.name.clone());
        for rule in rules {
            for resource in &rule.resources {
                let resource = binding.scope(resource.clone());
                for verb in &rule.verbs {
                    sa.grant(&role, resource.clone(), verb);
                }
            }
        }
        debug!("Folded binding {} ({}) into {}", binding.name, role, subject);
    }
}

/// Attach each pod to the ServiceAccount it runs as.
///
/// Pods that opt out of token automounting carry no token to pull and are skipped.
pub fn mark_mounted(index: &mut ServiceAccountIndex, pods: Vec<Pod>) {
    for pod in pods {
        if !pod.token_mounted {
            debug!("Pod {}/{} does not mount its token", pod.namespace, pod.name);
            continue;
        }
        if let Some(sa) = index.get_mut(&pod.service_account_key()) {
            debug!("{} is mounted by pod {}/{}", sa.name, pod.namespace, pod.name);
            sa.mount(pod);
        }
    }
}
