//! Remote file access on the controlled node.

pub mod ssh;

use anyhow::Context;
use async_trait::async_trait;
use pkg_constants::paths::{KUBELET_PODS_DIR, SA_TOKEN_VOLUME_GLOB};
use pkg_types::config::SshConfig;
use pkg_types::pod::Pod;
use pkg_types::service_account::CriticalServiceAccount;
use pkg_types::validate::validate_pod_uid;
use tracing::info;

/// Reads a file on the controlled node.
#[async_trait]
pub trait RemoteReader: Send + Sync {
    async fn read_remote_file(&self, connection: &SshConfig, path: &str) -> anyhow::Result<String>;
}

/// Path of the projected ServiceAccount token inside a pod's kubelet volume directory.
pub fn token_path(pod: &Pod) -> anyhow::Result<String> {
    validate_pod_uid(&pod.uid)?;
    Ok(format!("{}/{}/{}", KUBELET_PODS_DIR, pod.uid, SA_TOKEN_VOLUME_GLOB))
}

/// Pull the mounted token of `sa` off the controlled node.
pub async fn fetch_token(
    reader: &dyn RemoteReader,
    sa: &CriticalServiceAccount,
    connection: &SshConfig,
) -> anyhow::Result<String> {
    let pod = sa
        .account
        .pod
        .as_ref()
        .with_context(|| format!("ServiceAccount {} is not mounted by any pod", sa.account.name))?;
    let path = token_path(pod)?;
    info!(
        "Reading token of {} from pod {}/{} on {}",
        sa.account.name, pod.namespace, pod.name, connection.host
    );
    let token = reader
        .read_remote_file(connection, &path)
        .await
        .with_context(|| format!("failed to read token of {}", sa.account.name))?;
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("token file of {} is empty", sa.account.name);
    }
    Ok(token.to_string())
}
