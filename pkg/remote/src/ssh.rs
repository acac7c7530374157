//! SSH transport built on `ssh2`.

use crate::RemoteReader;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use pkg_constants::network::SSH_TIMEOUT_SECS;
use pkg_types::config::SshConfig;
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Reads remote files by running `cat` over an SSH exec channel.
#[derive(Debug, Clone)]
pub struct SshReader {
    timeout: Duration,
}

impl SshReader {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(SSH_TIMEOUT_SECS),
        }
    }

    fn connect(&self, config: &SshConfig) -> Result<Session> {
        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve {}:{}", config.host, config.port))?
            .next()
            .ok_or_else(|| anyhow!("no address for {}:{}", config.host, config.port))?;

        let tcp = TcpStream::connect_timeout(&addr, self.timeout)
            .with_context(|| format!("failed to connect to {}", addr))?;
        tcp.set_read_timeout(Some(self.timeout))?;
        tcp.set_write_timeout(Some(self.timeout))?;

        let mut sess = Session::new().context("failed to create SSH session")?;
        sess.set_tcp_stream(tcp);
        sess.set_timeout(self.timeout.as_millis() as u32);
        sess.handshake().context("SSH handshake failed")?;

        match config.private_key_file.as_deref().filter(|p| !p.is_empty()) {
            Some(key) => {
                let key = expand_home(key, std::env::var("HOME").ok());
                sess.userauth_pubkey_file(&config.username, None, &key, None)
                    .with_context(|| format!("SSH key authentication with {} failed", key.display()))?
            }
            None => sess
                .userauth_password(&config.username, &config.password)
                .context("SSH password authentication failed")?,
        }
        if !sess.authenticated() {
            return Err(anyhow!("SSH authentication failed for {}", config.username));
        }
        Ok(sess)
    }

    fn exec(sess: &Session, command: &str) -> Result<String> {
        let mut channel = sess.channel_session().context("failed to open SSH channel")?;
        channel.exec(command).context("failed to execute command")?;

        let mut output = String::new();
        channel
            .read_to_string(&mut output)
            .context("failed to read command output")?;
        channel.wait_close().context("failed to close channel")?;

        let status = channel.exit_status()?;
        if status != 0 {
            let mut stderr = String::new();
            channel.stderr().read_to_string(&mut stderr).ok();
            return Err(anyhow!("`{}` exited with {}: {}", command, status, stderr.trim()));
        }
        Ok(output)
    }

    /// Blocking read; callers on the async runtime go through [`RemoteReader`].
    pub fn read_blocking(&self, config: &SshConfig, path: &str) -> Result<String> {
        debug!("Reading {} from {}:{}", path, config.host, config.port);
        let sess = self.connect(config)?;
        Self::exec(&sess, &format!("cat {}", path))
    }
}

/// libssh2 takes key paths literally, so a leading `~/` is resolved against `home` here.
fn expand_home(path: &str, home: Option<String>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

impl Default for SshReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteReader for SshReader {
    async fn read_remote_file(&self, connection: &SshConfig, path: &str) -> Result<String> {
        let reader = self.clone();
        let connection = connection.clone();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || reader.read_blocking(&connection, &path))
            .await
            .context("SSH read task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_key_path_resolves_against_home() {
        assert_eq!(
            expand_home("~/.ssh/id_rsa", Some("/home/op".to_string())),
            PathBuf::from("/home/op/.ssh/id_rsa")
        );
    }

    #[test]
    fn other_key_paths_are_left_alone() {
        let home = Some("/home/op".to_string());
        assert_eq!(expand_home("/etc/keys/id_ed25519", home.clone()), PathBuf::from("/etc/keys/id_ed25519"));
        assert_eq!(expand_home("keys/id_rsa", home), PathBuf::from("keys/id_rsa"));
        assert_eq!(expand_home("~/.ssh/id_rsa", None), PathBuf::from("~/.ssh/id_rsa"));
    }
}
