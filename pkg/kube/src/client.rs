use crate::ClusterSource;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::wire::{BindingObject, List, PodObject, RoleObject};
use anyhow::Context;
use async_trait::async_trait;
use pkg_constants::network::{API_REQUEST_TIMEOUT_SECS, DEFAULT_API_SCHEME};
use pkg_constants::paths::{PODS_API, RBAC_API};
use pkg_types::config::KubeConfig;
use pkg_types::pod::Pod;
use pkg_types::rbac::{PolicyRule, RoleBinding, RoleRef, Rule};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl RequestError {
    /// Transport failures and server errors are worth retrying; client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            RequestError::Transport(e) => !e.is_decode(),
            RequestError::Status { status, .. } => status.is_server_error(),
        }
    }
}

/// Kubernetes REST client authenticated with a bearer token or a client certificate.
#[derive(Clone)]
pub struct KubeClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl KubeClient {
    pub fn new(config: &KubeConfig) -> anyhow::Result<Self> {
        let base = normalize_server(&config.api_server)?;

        // The target cluster's CA is not known from the foothold.
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(API_REQUEST_TIMEOUT_SECS));

        if let Some(proxy) = &config.proxy_address {
            info!("Routing API requests through proxy {}", proxy);
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        let token = match &config.token_file {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(t) if !t.trim().is_empty() => Some(t.trim().to_string()),
                Ok(_) => {
                    warn!("Token file {} is empty, falling back to client certificate", path);
                    None
                }
                Err(e) => {
                    warn!("Failed to read token file {}: {}", path, e);
                    None
                }
            },
            None => None,
        };

        if token.is_none() {
            match (&config.admin_cert, &config.admin_cert_key) {
                (Some(cert), Some(key)) => {
                    let mut pem = std::fs::read(cert)
                        .with_context(|| format!("failed to read client certificate {}", cert))?;
                    pem.extend(
                        std::fs::read(key)
                            .with_context(|| format!("failed to read client key {}", key))?,
                    );
                    builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
                    info!("Authenticating to {} with client certificate {}", base, cert);
                }
                _ => anyhow::bail!(
                    "no usable credentials: set token-file or admin-cert/admin-cert-key"
                ),
            }
        } else {
            info!("Authenticating to {} with bearer token", base);
        }

        Ok(Self {
            http: builder.build()?,
            base,
            token,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base, path);
        let body = retry_with_backoff(
            &self.retry,
            path,
            || self.get_once(&url),
            RequestError::is_retryable,
        )
        .await
        .with_context(|| format!("GET {} failed", url))?;
        serde_json::from_str(&body).with_context(|| format!("failed to decode response from {}", url))
    }

    async fn get_once(&self, url: &str) -> Result<String, RequestError> {
        debug!("GET {}", url);
        let mut req = self.http.get(url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_client_error() || status.is_server_error() {
            return Err(RequestError::Status { status, body });
        }
        Ok(body)
    }
}

#[async_trait]
impl ClusterSource for KubeClient {
    async fn list_pods(&self) -> anyhow::Result<Vec<Pod>> {
        let list: List<PodObject> = self.get_json(PODS_API).await?;
        Ok(list.items.into_iter().map(Pod::from).collect())
    }

    async fn list_cluster_role_bindings(&self) -> anyhow::Result<Vec<RoleBinding>> {
        let path = format!("{}/clusterrolebindings", RBAC_API);
        let list: List<BindingObject> = self.get_json(&path).await?;
        Ok(list
            .items
            .into_iter()
            .map(BindingObject::into_cluster_binding)
            .collect())
    }

    async fn list_role_bindings(&self) -> anyhow::Result<Vec<RoleBinding>> {
        let path = format!("{}/rolebindings", RBAC_API);
        let list: List<BindingObject> = self.get_json(&path).await?;
        Ok(list
            .items
            .into_iter()
            .map(BindingObject::into_namespaced_binding)
            .collect())
    }

    async fn get_rules(&self, role_ref: &RoleRef) -> anyhow::Result<Vec<Rule>> {
        let path = role_path(role_ref);
        let role: RoleObject = self.get_json(&path).await?;
        Ok(role
            .rules
            .unwrap_or_default()
            .iter()
            .map(PolicyRule::expand)
            .collect())
    }
}

fn role_path(role_ref: &RoleRef) -> String {
    match role_ref {
        RoleRef::ClusterRole(name) => format!("{}/clusterroles/{}", RBAC_API, name),
        RoleRef::Role { namespace, name } => {
            format!("{}/namespaces/{}/roles/{}", RBAC_API, namespace, name)
        }
    }
}

/// Accept `host:port` or a full URL and return a base URL without a trailing slash.
fn normalize_server(server: &str) -> anyhow::Result<String> {
    let server = server.trim().trim_end_matches('/');
    if server.is_empty() {
        anyhow::bail!("API server address is not configured");
    }
    if server.starts_with("http://") || server.starts_with("https://") {
        Ok(server.to_string())
    } else {
        Ok(format!("{}{}", DEFAULT_API_SCHEME, server))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_normalization() {
        assert_eq!(
            normalize_server("10.0.0.1:6443").unwrap(),
            "https://10.0.0.1:6443"
        );
        assert_eq!(
            normalize_server("http://127.0.0.1:8001/").unwrap(),
            "http://127.0.0.1:8001"
        );
        assert!(normalize_server("  ").is_err());
    }

    #[test]
    fn role_paths() {
        assert_eq!(
            role_path(&RoleRef::ClusterRole("cluster-admin".to_string())),
            "/apis/rbac.authorization.k8s.io/v1/clusterroles/cluster-admin"
        );
        assert_eq!(
            role_path(&RoleRef::parse("ci/deployer")),
            "/apis/rbac.authorization.k8s.io/v1/namespaces/ci/roles/deployer"
        );
    }

    #[test]
    fn client_requires_credentials() {
        let config = KubeConfig {
            api_server: "10.0.0.1:6443".to_string(),
            ..Default::default()
        };
        assert!(KubeClient::new(&config).is_err());
    }

    #[test]
    fn client_with_token_file() {
        let path = std::env::temp_dir().join(format!("sahunt-token-{}", std::process::id()));
        std::fs::write(&path, "eyJhbGciOi.test\n").unwrap();
        let config = KubeConfig {
            api_server: "10.0.0.1:6443".to_string(),
            token_file: Some(path.to_string_lossy().to_string()),
            ..Default::default()
        };
        let client = KubeClient::new(&config).unwrap();
        assert_eq!(client.token.as_deref(), Some("eyJhbGciOi.test"));
        assert_eq!(client.base, "https://10.0.0.1:6443");
        std::fs::remove_file(path).ok();
    }
}
