use anyhow::Context;
use pkg_exploit::{Registry, TokenStager};
use pkg_kube::ClusterSource;
use pkg_kube::client::KubeClient;
use pkg_remote::ssh::SshReader;
use pkg_scan::{build_permission_index, classify};
use pkg_types::config::ConsoleConfig;
use pkg_types::service_account::{CriticalServiceAccount, ServiceAccountIndex};
use std::sync::Arc;
use tracing::info;

/// Everything one console session knows: the effective configuration, its
/// collaborators, and the cached scan results. A config reset replaces the
/// whole session.
pub struct Session {
    pub config: ConsoleConfig,
    pub registry: Registry,
    source: Arc<dyn ClusterSource>,
    index: Option<ServiceAccountIndex>,
    critical: Option<Vec<CriticalServiceAccount>>,
}

impl Session {
    /// Connect the real collaborators for `config`.
    pub fn open(config: ConsoleConfig) -> anyhow::Result<Self> {
        let client = KubeClient::new(&config.kube).context("failed to set up the API client")?;
        let stager = TokenStager::new(Arc::new(SshReader::new()), &config.loot_dir);
        let registry = Registry::new().register_all(Arc::new(stager));
        Ok(Self::with_parts(config, Arc::new(client), registry))
    }

    pub fn with_parts(config: ConsoleConfig, source: Arc<dyn ClusterSource>, registry: Registry) -> Self {
        Self {
            config,
            registry,
            source,
            index: None,
            critical: None,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.critical.is_some()
    }

    /// Rebuild the index and classification unconditionally.
    pub async fn rescan(&mut self) -> &[CriticalServiceAccount] {
        self.index = None;
        self.critical = None;
        self.critical().await
    }

    /// Cached classification, (re)built whenever the cache is empty.
    pub async fn critical(&mut self) -> &[CriticalServiceAccount] {
        if self.index.as_ref().is_none_or(|index| index.is_empty()) {
            self.index = Some(build_permission_index(self.source.as_ref()).await);
            self.critical = None;
        }
        if self.critical.as_ref().is_none_or(|critical| critical.is_empty()) {
            let critical = match &self.index {
                Some(index) => classify(index, &self.config.ssh.node_name),
                None => Vec::new(),
            };
            self.critical = Some(critical);
        }
        info!("Session holds {} critical ServiceAccounts", self.critical.as_ref().map_or(0, Vec::len));
        self.critical.as_deref().unwrap_or_default()
    }
}
