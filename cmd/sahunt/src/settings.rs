use pkg_exploit::Operator;
use pkg_types::config::{ConsoleConfig, ConsoleConfigFile, load_config_file};
use tracing::info;

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_server: Option<String>,
    pub node_name: Option<String>,
    pub ssh_host: Option<String>,
    pub loot_dir: Option<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut ConsoleConfig) {
        if let Some(v) = &self.api_server {
            config.kube.api_server = v.clone();
        }
        if let Some(v) = &self.node_name {
            config.ssh.node_name = v.clone();
        }
        if let Some(v) = &self.ssh_host {
            config.ssh.host = v.clone();
        }
        if let Some(v) = &self.loot_dir {
            config.loot_dir = v.clone();
        }
    }
}

/// Merge: CLI args > config file > defaults.
pub fn load(path: &str, overrides: &Overrides) -> anyhow::Result<ConsoleConfig> {
    let file: ConsoleConfigFile = load_config_file(path)?;
    info!("Config file: {}", path);
    let mut config = ConsoleConfig::from(file);
    overrides.apply(&mut config);
    Ok(config)
}

/// Human-readable effective configuration, password masked.
pub fn describe(config: &ConsoleConfig) -> Vec<String> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let password = if config.ssh.password.is_empty() { "-" } else { "********" };
    vec![
        format!("API server:        {}", config.kube.api_server),
        format!("Proxy:             {}", opt(&config.kube.proxy_address)),
        format!("Token file:        {}", opt(&config.kube.token_file)),
        format!("Admin cert:        {}", opt(&config.kube.admin_cert)),
        format!("Admin cert key:    {}", opt(&config.kube.admin_cert_key)),
        format!("Loot dir:          {}", config.loot_dir),
        format!("SSH host:          {}:{}", config.ssh.host, config.ssh.port),
        format!("SSH user:          {}", config.ssh.username),
        format!("SSH password:      {}", password),
        format!("SSH key:           {}", opt(&config.ssh.private_key_file)),
        format!("Controlled node:   {}", config.ssh.node_name),
    ]
}

fn edit_text(operator: &mut impl Operator, label: &str, current: &mut String) {
    if let Some(answer) = operator.ask(&format!("{} [{}]: ", label, current)) {
        let answer = answer.trim();
        if !answer.is_empty() {
            *current = answer.to_string();
        }
    }
}

fn edit_optional(operator: &mut impl Operator, label: &str, current: &mut Option<String>) {
    let shown = current.as_deref().unwrap_or("");
    if let Some(answer) = operator.ask(&format!("{} [{}]: ", label, shown)) {
        let answer = answer.trim();
        if !answer.is_empty() {
            *current = Some(answer.to_string());
        }
    }
}

/// Walk the operator through every field. Empty input keeps the current value.
pub fn edit(mut config: ConsoleConfig, operator: &mut impl Operator) -> ConsoleConfig {
    operator.say("Press enter to keep the value in brackets.");
    edit_text(operator, "API server", &mut config.kube.api_server);
    edit_optional(operator, "Proxy address", &mut config.kube.proxy_address);
    edit_optional(operator, "Token file", &mut config.kube.token_file);
    edit_optional(operator, "Admin cert", &mut config.kube.admin_cert);
    edit_optional(operator, "Admin cert key", &mut config.kube.admin_cert_key);
    edit_text(operator, "Loot dir", &mut config.loot_dir);
    edit_text(operator, "SSH host", &mut config.ssh.host);

    let mut port = config.ssh.port.to_string();
    edit_text(operator, "SSH port", &mut port);
    match port.parse::<u16>() {
        Ok(p) => config.ssh.port = p,
        Err(_) => operator.say(&format!(
            "[!] '{}' is not a port, keeping {}",
            port, config.ssh.port
        )),
    }

    edit_text(operator, "SSH user", &mut config.ssh.username);
    if let Some(answer) = operator.ask("SSH password [********]: ") {
        let answer = answer.trim_end_matches(['\r', '\n']);
        if !answer.is_empty() {
            config.ssh.password = answer.to_string();
        }
    }
    edit_optional(operator, "SSH private key file", &mut config.ssh.private_key_file);
    edit_text(operator, "Controlled node name", &mut config.ssh.node_name);
    config
}
