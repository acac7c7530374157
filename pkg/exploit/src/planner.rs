use pkg_types::capability::{AttackKind, Capability, Category, Tier};
use pkg_types::service_account::CriticalServiceAccount;
use std::fmt;
use tracing::{debug, info};

/// One capability of one critical account, ready for selection.
#[derive(Debug, Clone)]
pub struct CapabilityRecord {
    pub account: CriticalServiceAccount,
    pub capability: Capability,
    pub kind: AttackKind,
    /// Severity after the namespace-scope override.
    pub tier: Tier,
}

impl CapabilityRecord {
    /// `tier-rawtag`, e.g. `restricthijack-deletepods[dev]`.
    pub fn sort_key(&self) -> String {
        format!("{}-{}", self.tier, self.capability)
    }

    pub fn category(&self) -> Category {
        self.tier.category()
    }

    pub fn account_name(&self) -> &str {
        &self.account.account.name
    }
}

impl fmt::Display for CapabilityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  ServiceAccount: {}", self.capability, self.account_name())
    }
}

/// Records grouped by category, each group in presentation order.
#[derive(Debug, Clone, Default)]
pub struct AttackPlan {
    pub escalate: Vec<CapabilityRecord>,
    pub hijack: Vec<CapabilityRecord>,
}

impl AttackPlan {
    pub fn records(&self, category: Category) -> &[CapabilityRecord] {
        match category {
            Category::Escalate => &self.escalate,
            Category::Hijack => &self.hijack,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.escalate.is_empty() && self.hijack.is_empty()
    }

    fn push(&mut self, record: CapabilityRecord) {
        match record.category() {
            Category::Escalate => self.escalate.push(record),
            Category::Hijack => self.hijack.push(record),
        }
    }
}

/// Effective tier of `capability`: constrained grants outside `kube-system`
/// are demoted to the restricted tier of their category.
pub fn resolve_tier(kind: AttackKind, capability: &Capability) -> Tier {
    let base = kind.tier();
    let constraint = &capability.constraint;
    if !constraint.is_unrestricted() && !constraint.is_kube_system() {
        base.restricted()
    } else {
        base
    }
}

/// Group and order the capabilities of every exploitable account.
pub fn plan(critical: &[CriticalServiceAccount]) -> AttackPlan {
    let mut plan = AttackPlan::default();
    for sa in critical.iter().filter(|sa| sa.is_exploitable()) {
        for capability in &sa.capabilities {
            let Some(kind) = capability.kind.attack_kind() else {
                debug!("{}: no attack for {}", sa.account.name, capability);
                continue;
            };
            plan.push(CapabilityRecord {
                account: sa.clone(),
                capability: capability.clone(),
                kind,
                tier: resolve_tier(kind, capability),
            });
        }
    }
    for group in [&mut plan.escalate, &mut plan.hijack] {
        group.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.account_name().cmp(b.account_name()))
        });
    }
    info!(
        "Planned {} escalate and {} hijack options",
        plan.escalate.len(),
        plan.hijack.len()
    );
    plan
}
