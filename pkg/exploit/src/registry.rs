use async_trait::async_trait;
use pkg_types::capability::AttackKind;
use pkg_types::config::SshConfig;
use pkg_types::service_account::CriticalServiceAccount;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Performs one attack with the selected accounts from the controlled node.
#[async_trait]
pub trait AttackPrimitive: Send + Sync {
    async fn run(
        &self,
        kind: AttackKind,
        targets: &[CriticalServiceAccount],
        connection: &SshConfig,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no attack available for {0}")]
    Unregistered(AttackKind),
    #[error("{kind} failed: {cause:#}")]
    Failed { kind: AttackKind, cause: anyhow::Error },
}

/// Table from attack kind to the primitive that performs it.
#[derive(Default, Clone)]
pub struct Registry {
    primitives: HashMap<AttackKind, Arc<dyn AttackPrimitive>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: AttackKind, primitive: Arc<dyn AttackPrimitive>) -> Self {
        self.primitives.insert(kind, primitive);
        self
    }

    /// Route every attack kind to the same primitive.
    pub fn register_all(mut self, primitive: Arc<dyn AttackPrimitive>) -> Self {
        for kind in AttackKind::ALL {
            self.primitives.insert(kind, Arc::clone(&primitive));
        }
        self
    }

    pub fn contains(&self, kind: AttackKind) -> bool {
        self.primitives.contains_key(&kind)
    }

    /// Run the primitive for `kind` against the single selected account.
    pub async fn dispatch(
        &self,
        kind: AttackKind,
        target: &CriticalServiceAccount,
        connection: &SshConfig,
    ) -> Result<(), DispatchError> {
        let Some(primitive) = self.primitives.get(&kind) else {
            warn!("No attack primitive registered for {}", kind);
            return Err(DispatchError::Unregistered(kind));
        };
        info!("Dispatching {} with {}", kind, target.account.name);
        primitive
            .run(kind, std::slice::from_ref(target), connection)
            .await
            .map_err(|cause| DispatchError::Failed { kind, cause })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::planner::tests::critical;
    use pkg_types::capability::{Capability, CapabilityKind};
    use std::sync::Mutex;

    /// Remembers every call; fails when `fail` is set.
    #[derive(Default)]
    pub(crate) struct RecordingPrimitive {
        pub(crate) calls: Mutex<Vec<(AttackKind, Vec<String>)>>,
        pub(crate) fail: bool,
    }

    impl RecordingPrimitive {
        pub(crate) fn calls(&self) -> Vec<(AttackKind, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AttackPrimitive for RecordingPrimitive {
        async fn run(
            &self,
            kind: AttackKind,
            targets: &[CriticalServiceAccount],
            _connection: &SshConfig,
        ) -> anyhow::Result<()> {
            let names = targets.iter().map(|t| t.account.name.clone()).collect();
            self.calls.lock().unwrap().push((kind, names));
            if self.fail {
                anyhow::bail!("apiserver said no");
            }
            Ok(())
        }
    }

    fn target() -> CriticalServiceAccount {
        critical(
            "dev/admin",
            vec![Capability::unrestricted(CapabilityKind::Impersonate)],
        )
    }

    #[tokio::test]
    async fn dispatch_wraps_single_target() {
        let primitive = Arc::new(RecordingPrimitive::default());
        let registry = Registry::new().register(AttackKind::Impersonate, primitive.clone());

        registry
            .dispatch(AttackKind::Impersonate, &target(), &SshConfig::default())
            .await
            .unwrap();
        assert_eq!(
            primitive.calls(),
            vec![(AttackKind::Impersonate, vec!["dev/admin".to_string()])]
        );
    }

    #[tokio::test]
    async fn unregistered_kind_is_reported() {
        let registry = Registry::new();
        let err = registry
            .dispatch(AttackKind::PatchNodes, &target(), &SshConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unregistered(AttackKind::PatchNodes)));
        assert_eq!(err.to_string(), "no attack available for patchnodes");
    }

    #[tokio::test]
    async fn primitive_failure_keeps_cause() {
        let primitive = Arc::new(RecordingPrimitive {
            fail: true,
            ..Default::default()
        });
        let registry = Registry::new().register_all(primitive);
        assert!(AttackKind::ALL.iter().all(|k| registry.contains(*k)));

        let err = registry
            .dispatch(AttackKind::CreateTokens, &target(), &SshConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "createtokens failed: apiserver said no");
    }
}
