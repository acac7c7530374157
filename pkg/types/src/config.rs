use pkg_constants::network::DEFAULT_SSH_PORT;
use pkg_constants::paths::DEFAULT_LOOT_DIR;
use serde::{Deserialize, Serialize};

/// Connection parameters for the controlled node.
#[derive(Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "private-key-file")]
    pub private_key_file: Option<String>,
    /// Cluster node name of the controlled host
    #[serde(default, alias = "node-name")]
    pub node_name: String,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            username: String::new(),
            password: String::new(),
            private_key_file: None,
            node_name: String::new(),
        }
    }
}

// Never print the password, not even in debug logs.
impl std::fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("private_key_file", &self.private_key_file)
            .field("node_name", &self.node_name)
            .finish()
    }
}

/// How the console reaches the Kubernetes API server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubeConfig {
    /// `host:port` or a full URL; https is assumed without a scheme
    pub api_server: String,
    pub proxy_address: Option<String>,
    /// File holding a bearer token; preferred over the client certificate
    pub token_file: Option<String>,
    pub admin_cert: Option<String>,
    pub admin_cert_key: Option<String>,
}

/// Console configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// api-server: 10.0.0.1:6443
/// token-file: /root/token
/// loot-dir: ./loot
/// ssh:
///   host: 10.0.0.2
///   port: 22
///   username: root
///   password: hunter2
///   node-name: worker-1
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfigFile {
    #[serde(default, alias = "api-server")]
    pub api_server: Option<String>,
    #[serde(default, alias = "proxy-address")]
    pub proxy_address: Option<String>,
    #[serde(default, alias = "token-file")]
    pub token_file: Option<String>,
    #[serde(default, alias = "admin-cert")]
    pub admin_cert: Option<String>,
    #[serde(default, alias = "admin-cert-key")]
    pub admin_cert_key: Option<String>,
    #[serde(default, alias = "loot-dir")]
    pub loot_dir: Option<String>,
    #[serde(default)]
    pub ssh: Option<SshConfig>,
}

/// Effective configuration after merging file values with defaults.
#[derive(Debug, Clone, Default)]
pub struct ConsoleConfig {
    pub kube: KubeConfig,
    pub ssh: SshConfig,
    pub loot_dir: String,
}

impl From<ConsoleConfigFile> for ConsoleConfig {
    fn from(file: ConsoleConfigFile) -> Self {
        // Empty strings in YAML mean "not set".
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            kube: KubeConfig {
                api_server: file.api_server.unwrap_or_default(),
                proxy_address: non_empty(file.proxy_address),
                token_file: non_empty(file.token_file),
                admin_cert: non_empty(file.admin_cert),
                admin_cert_key: non_empty(file.admin_cert_key),
            },
            ssh: file.ssh.unwrap_or_default(),
            loot_dir: non_empty(file.loot_dir).unwrap_or_else(|| DEFAULT_LOOT_DIR.to_string()),
        }
    }
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_file() {
        let yaml = r#"
api-server: 10.0.0.1:6443
proxy-address: ""
token-file: /root/token
ssh:
  host: 10.0.0.2
  username: root
  password: hunter2
  node-name: worker-1
"#;
        let file: ConsoleConfigFile = serde_yaml::from_str(yaml).unwrap();
        let config = ConsoleConfig::from(file);
        assert_eq!(config.kube.api_server, "10.0.0.1:6443");
        assert_eq!(config.kube.proxy_address, None);
        assert_eq!(config.kube.token_file.as_deref(), Some("/root/token"));
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.ssh.node_name, "worker-1");
        assert_eq!(config.loot_dir, DEFAULT_LOOT_DIR);
    }

    #[test]
    fn missing_file_yields_default() {
        let file: ConsoleConfigFile =
            load_config_file("/nonexistent/sahunt/config.yaml").unwrap();
        assert!(file.api_server.is_none());
        assert!(file.ssh.is_none());
    }

    #[test]
    fn debug_redacts_password() {
        let ssh = SshConfig {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let rendered = format!("{:?}", ssh);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
