use crate::session::Session;
use crate::settings::{self, Overrides};
use pkg_exploit::{Operator, Orchestrator, plan};
use pkg_types::config::ConsoleConfig;
use pkg_types::service_account::CriticalServiceAccount;
use pkg_types::validate::validate_config;
use std::io::{BufRead, Write};
use tracing::warn;

const HELP: &[&str] = &[
    "Commands:",
    "  scan        - find ServiceAccounts with dangerous permissions",
    "  exp         - pick and run an escalation or hijack",
    "  config      - show the current configuration",
    "  resetconfig - reload and edit the configuration",
    "  help        - show this help",
    "  exit        - quit",
];

/// Operator backed by a line reader and a writer (stdin/stdout in the binary).
pub struct StdioOperator<R, W> {
    input: R,
    pub(crate) output: W,
}

impl<R: BufRead, W: Write> StdioOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Operator for StdioOperator<R, W> {
    fn say(&mut self, line: &str) {
        let _ = writeln!(self.output, "{}", line);
    }

    fn ask(&mut self, prompt: &str) -> Option<String> {
        let _ = write!(self.output, "{}", prompt);
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                warn!("Failed to read operator input: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan,
    Exp,
    Config,
    ResetConfig,
    Help,
    Exit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "scan" => Command::Scan,
            "exp" => Command::Exp,
            "config" => Command::Config,
            "resetconfig" => Command::ResetConfig,
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            "" => Command::Empty,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Scan report: one block per mounted critical account.
pub fn report(critical: &[CriticalServiceAccount]) -> Vec<String> {
    let mut lines = Vec::new();
    for sa in critical.iter().filter(|c| c.account.is_mounted) {
        let Some(pod) = &sa.account.pod else { continue };
        let node = if sa.in_node {
            format!("{} (controlled)", pod.node_name)
        } else {
            pod.node_name.clone()
        };
        lines.push(format!("[namespace]:      {}", pod.namespace));
        lines.push(format!("[pod]:            {}", pod.name));
        lines.push(format!("[ServiceAccount]: {}", sa.account.name));
        lines.push(format!("[capabilities]:   {}", sa.capability_tags().join(", ")));
        lines.push(format!("[level]:          {}", sa.level));
        lines.push(format!("[node]:           {}", node));
        lines.push(format!("[roles]:          {}", sa.roles.join(", ")));
        lines.push(format!("[bindings]:       {}", sa.account.role_bindings.join(", ")));
        lines.push("-------------------------------------------".to_string());
    }
    if lines.is_empty() {
        lines.push("(no mounted ServiceAccount with dangerous permissions)".to_string());
    }
    lines
}

/// Builds a session for a freshly loaded configuration.
pub type Opener = Box<dyn Fn(ConsoleConfig) -> anyhow::Result<Session>>;

pub struct Console<O: Operator> {
    operator: O,
    session: Session,
    config_path: String,
    overrides: Overrides,
    open: Opener,
}

impl<O: Operator> Console<O> {
    pub fn new(
        operator: O,
        session: Session,
        config_path: String,
        overrides: Overrides,
        open: Opener,
    ) -> Self {
        Self {
            operator,
            session,
            config_path,
            overrides,
            open,
        }
    }

    /// Command loop; returns on `exit` or end of input.
    pub async fn run(&mut self) {
        self.help();
        while let Some(line) = self.operator.ask("sahunt> ") {
            match Command::parse(&line) {
                Command::Scan => self.scan().await,
                Command::Exp => self.exploit().await,
                Command::Config => {
                    for line in settings::describe(&self.session.config) {
                        self.operator.say(&line);
                    }
                }
                Command::ResetConfig => self.reset_config(),
                Command::Help => self.help(),
                Command::Exit => {
                    self.operator.say("Bye.");
                    return;
                }
                Command::Empty => {}
                Command::Unknown(cmd) => self
                    .operator
                    .say(&format!("Unknown command '{}', try 'help'", cmd)),
            }
        }
    }

    fn help(&mut self) {
        for line in HELP {
            self.operator.say(line);
        }
    }

    async fn scan(&mut self) {
        let lines = report(self.session.rescan().await);
        self.operator.say("");
        for line in lines {
            self.operator.say(&line);
        }
    }

    async fn exploit(&mut self) {
        let plan = plan(self.session.critical().await);
        let report = Orchestrator::new(
            &self.session.registry,
            &self.session.config.ssh,
            &mut self.operator,
        )
        .run(&plan)
        .await;
        if !report.escalate.is_dispatched() {
            warn!("Escalation ended without a dispatched attack: {:?}", report.escalate);
        }
    }

    fn reset_config(&mut self) {
        let config = match settings::load(&self.config_path, &self.overrides) {
            Ok(config) => config,
            Err(e) => {
                self.operator
                    .say(&format!("[!] Failed to read {}: {:#}", self.config_path, e));
                return;
            }
        };
        let config = settings::edit(config, &mut self.operator);
        if let Err(e) = validate_config(&config) {
            self.operator
                .say(&format!("[!] {}; keeping the current configuration", e));
            return;
        }
        match (self.open)(config) {
            Ok(session) => {
                self.session = session;
                self.operator.say("[+] Configuration reloaded, cached scan discarded");
            }
            Err(e) => self.operator.say(&format!("[!] {:#}", e)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::tests::{StaticCluster, config};
    use async_trait::async_trait;
    use pkg_exploit::{AttackPrimitive, Registry};
    use pkg_types::capability::AttackKind;
    use pkg_types::config::SshConfig;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// In-memory operator: scripted input lines, captured output.
    pub(crate) struct Script(StdioOperator<Cursor<Vec<u8>>, Vec<u8>>);

    impl Script {
        pub(crate) fn new(lines: &[&str]) -> Self {
            let input: String = lines.iter().map(|l| format!("{}\n", l)).collect();
            Self(StdioOperator::new(Cursor::new(input.into_bytes()), Vec::new()))
        }

        pub(crate) fn output(&self) -> String {
            String::from_utf8_lossy(&self.0.output).into_owned()
        }
    }

    impl Operator for Script {
        fn say(&mut self, line: &str) {
            self.0.say(line)
        }

        fn ask(&mut self, prompt: &str) -> Option<String> {
            self.0.ask(prompt)
        }
    }

    #[derive(Default)]
    struct Dispatched(Mutex<Vec<AttackKind>>);

    #[async_trait]
    impl AttackPrimitive for Dispatched {
        async fn run(
            &self,
            kind: AttackKind,
            _targets: &[CriticalServiceAccount],
            _connection: &SshConfig,
        ) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(kind);
            Ok(())
        }
    }

    fn console(lines: &[&str], primitive: Arc<Dispatched>) -> Console<Script> {
        let registry = Registry::new().register_all(primitive.clone());
        let session = Session::with_parts(config(), Arc::new(StaticCluster::default()), registry);
        let open: Opener = Box::new(move |config: ConsoleConfig| {
            Ok(Session::with_parts(
                config,
                Arc::new(StaticCluster::default()),
                Registry::new().register_all(primitive.clone()),
            ))
        });
        let overrides = Overrides {
            api_server: Some("10.0.0.1:6443".to_string()),
            ssh_host: Some("10.0.0.2".to_string()),
            node_name: Some("worker-1".to_string()),
            ..Default::default()
        };
        Console::new(
            Script::new(lines),
            session,
            "/nonexistent/sahunt.yaml".to_string(),
            overrides,
            open,
        )
    }

    #[test]
    fn command_parsing() {
        assert_eq!(Command::parse(" SCAN \n"), Command::Scan);
        assert_eq!(Command::parse("resetconfig"), Command::ResetConfig);
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(Command::parse("pwn"), Command::Unknown("pwn".to_string()));
    }

    #[tokio::test]
    async fn scan_prints_mounted_accounts() {
        let mut console = console(&["scan", "exit"], Arc::default());
        console.run().await;
        let out = console.operator.output();
        assert!(out.contains("[ServiceAccount]: kube-system/operator"));
        assert!(out.contains("[capabilities]:   impersonate"));
        assert!(out.contains("[node]:           worker-1 (controlled)"));
        assert!(out.contains("[bindings]:       operator-impersonator"));
        assert!(out.contains("Bye."));
    }

    #[tokio::test]
    async fn exp_dispatches_selected_attack() {
        let primitive = Arc::new(Dispatched::default());
        let mut console = console(&["exp", "0", "exit"], primitive.clone());
        console.run().await;
        assert_eq!(*primitive.0.lock().unwrap(), vec![AttackKind::Impersonate]);
        assert!(console.operator.output().contains("0 impersonate  ServiceAccount: kube-system/operator"));
    }

    #[tokio::test]
    async fn unknown_command_hints_help() {
        let mut console = console(&["pwn"], Arc::default());
        console.run().await;
        assert!(console.operator.output().contains("Unknown command 'pwn', try 'help'"));
    }

    #[tokio::test]
    async fn resetconfig_discards_cached_scan() {
        let answers = [
            "resetconfig",
            "", "", "", "", "", "", "", "", "", "", "",
            "worker-9",
            "config",
            "exit",
        ];
        let mut console = console(&answers, Arc::default());
        console.session.critical().await;
        assert!(console.session.is_cached());

        console.run().await;

        assert!(!console.session.is_cached());
        assert_eq!(console.session.config.ssh.node_name, "worker-9");
        let out = console.operator.output();
        assert!(out.contains("cached scan discarded"));
        assert!(out.contains("Controlled node:   worker-9"));
    }

    #[tokio::test]
    async fn invalid_reset_keeps_session() {
        let mut console = console(&["resetconfig", "", "", "", "", "", "", "", "0"], Arc::default());
        console.run().await;
        assert_eq!(console.session.config.ssh.node_name, "worker-1");
        assert!(console.operator.output().contains("SSH port 0 is invalid"));
    }

    #[test]
    fn report_skips_unmounted() {
        let mut sa = pkg_types::service_account::ServiceAccount::new("dev/idle");
        sa.grant("r", pkg_types::rbac::ResourceRef::new("secrets"), "get");
        let crit = CriticalServiceAccount::new(sa, "worker-1");
        assert_eq!(
            report(&[crit]),
            vec!["(no mounted ServiceAccount with dangerous permissions)"]
        );
    }
}
