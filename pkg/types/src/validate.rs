use crate::config::ConsoleConfig;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("API server address must not be empty")]
    EmptyApiServer,
    #[error("SSH port {0} is invalid (1-65535)")]
    InvalidSshPort(u16),
    #[error("SSH host must not be empty")]
    EmptySshHost,
}

/// Check the fields every scan or exploit run depends on.
pub fn validate_config(config: &ConsoleConfig) -> Result<(), ConfigError> {
    if config.kube.api_server.trim().is_empty() {
        return Err(ConfigError::EmptyApiServer);
    }
    // u16 already caps the upper bound.
    if config.ssh.port == 0 {
        return Err(ConfigError::InvalidSshPort(config.ssh.port));
    }
    if config.ssh.host.trim().is_empty() {
        return Err(ConfigError::EmptySshHost);
    }
    Ok(())
}

/// Validate a pod UID before it is interpolated into a remote shell command.
/// Rules: non-empty, `[A-Za-z0-9-]` only.
pub fn validate_pod_uid(uid: &str) -> anyhow::Result<()> {
    if uid.is_empty() {
        anyhow::bail!("pod uid must not be empty");
    }
    if !uid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        anyhow::bail!("pod uid '{}' must contain only [A-Za-z0-9-]", uid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KubeConfig, SshConfig};

    fn valid() -> ConsoleConfig {
        ConsoleConfig {
            kube: KubeConfig {
                api_server: "10.0.0.1:6443".to_string(),
                ..Default::default()
            },
            ssh: SshConfig {
                host: "10.0.0.2".to_string(),
                ..Default::default()
            },
            loot_dir: "./loot".to_string(),
        }
    }

    #[test]
    fn valid_config() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn invalid_configs() {
        let mut c = valid();
        c.kube.api_server = " ".to_string();
        assert_eq!(validate_config(&c), Err(ConfigError::EmptyApiServer));

        let mut c = valid();
        c.ssh.port = 0;
        assert_eq!(validate_config(&c), Err(ConfigError::InvalidSshPort(0)));

        let mut c = valid();
        c.ssh.host.clear();
        assert_eq!(validate_config(&c), Err(ConfigError::EmptySshHost));
    }

    #[test]
    fn pod_uids() {
        assert!(validate_pod_uid("0f9c2b1e-6a7d-4c7e-9d0a-3b5f2e1c8a77").is_ok());
        assert!(validate_pod_uid("").is_err());
        assert!(validate_pod_uid("abc; rm -rf /").is_err());
        assert!(validate_pod_uid("../etc").is_err());
    }
}
