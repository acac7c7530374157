//! Interactive attack selection.
//!
//! The flow first looks for an unrestricted escalation. Failing that it runs
//! the hijack phase once, then offers every escalation that remains,
//! restricted ones included.

use crate::planner::{AttackPlan, CapabilityRecord};
use crate::registry::{DispatchError, Registry};
use pkg_constants::rbac::CANCEL_SENTINEL;
use pkg_types::capability::AttackKind;
use pkg_types::config::SshConfig;
use tracing::{info, warn};

/// The person at the console.
pub trait Operator {
    fn say(&mut self, line: &str);

    /// Read one answer; `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Pick(usize),
    Cancel,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("choice {index} is out of range, pick 0..={max} or {cancel} to cancel", max = .len.saturating_sub(1), cancel = CANCEL_SENTINEL)]
    OutOfRange { index: i64, len: usize },
}

/// Parse an operator answer against a list of `len` options.
pub fn parse_selection(input: &str, len: usize) -> Result<Selection, SelectionError> {
    let input = input.trim();
    let index: i64 = input
        .parse()
        .map_err(|_| SelectionError::NotANumber(input.to_string()))?;
    if index == CANCEL_SENTINEL {
        return Ok(Selection::Cancel);
    }
    match usize::try_from(index) {
        Ok(i) if i < len => Ok(Selection::Pick(i)),
        _ => Err(SelectionError::OutOfRange { index, len }),
    }
}

#[derive(Debug)]
pub enum Outcome {
    Dispatched { kind: AttackKind, account: String },
    DispatchFailed(DispatchError),
    Cancelled,
    /// Nothing to offer in this phase.
    Unavailable,
}

impl Outcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Outcome::Dispatched { .. })
    }
}

/// Result of one run: the hijack phase outcome (if it ran) and the final
/// escalation outcome.
#[derive(Debug)]
pub struct ExploitReport {
    pub hijack: Option<Outcome>,
    pub escalate: Outcome,
}

pub struct Orchestrator<'a, O: Operator> {
    registry: &'a Registry,
    connection: &'a SshConfig,
    operator: &'a mut O,
}

impl<'a, O: Operator> Orchestrator<'a, O> {
    pub fn new(registry: &'a Registry, connection: &'a SshConfig, operator: &'a mut O) -> Self {
        Self {
            registry,
            connection,
            operator,
        }
    }

    pub async fn run(&mut self, plan: &AttackPlan) -> ExploitReport {
        let mut hijack = None;
        loop {
            let any: Vec<&CapabilityRecord> =
                plan.escalate.iter().filter(|r| r.tier.is_any()).collect();
            if !any.is_empty() {
                self.operator.say("[+] Unrestricted privilege escalation available:");
                let escalate = self.select_and_dispatch(&any, "escalation").await;
                return ExploitReport { hijack, escalate };
            }
            if hijack.is_none() {
                self.operator.say("[-] No unrestricted privilege escalation");
                self.operator.say("[*] Looking for workloads to hijack");
                hijack = Some(self.hijack(plan).await);
                continue;
            }
            if plan.escalate.is_empty() {
                self.operator.say("[!] No privilege escalation path detected");
                return ExploitReport {
                    hijack,
                    escalate: Outcome::Unavailable,
                };
            }
            self.operator.say("[-] Still no unrestricted privilege escalation");
            self.operator.say("[*] Restricted escalation paths:");
            let all: Vec<&CapabilityRecord> = plan.escalate.iter().collect();
            let escalate = self.select_and_dispatch(&all, "escalation").await;
            return ExploitReport { hijack, escalate };
        }
    }

    async fn hijack(&mut self, plan: &AttackPlan) -> Outcome {
        if plan.hijack.is_empty() {
            self.operator.say("[!] No hijack capability detected");
            return Outcome::Unavailable;
        }
        let any: Vec<&CapabilityRecord> = plan.hijack.iter().filter(|r| r.tier.is_any()).collect();
        if !any.is_empty() {
            self.operator.say("[+] Any workload can be hijacked:");
            return self.select_and_dispatch(&any, "hijack").await;
        }
        self.operator.say("[*] Only some workloads can be hijacked:");
        let all: Vec<&CapabilityRecord> = plan.hijack.iter().collect();
        self.select_and_dispatch(&all, "hijack").await
    }

    async fn select_and_dispatch(&mut self, options: &[&CapabilityRecord], action: &str) -> Outcome {
        self.operator.say("---------------------------");
        for (i, record) in options.iter().enumerate() {
            self.operator.say(&format!("{} {}", i, record));
        }
        self.operator.say("---------------------------");

        let Some(record) = self.choose(options.len(), action) else {
            info!("{} cancelled by operator", action);
            return Outcome::Cancelled;
        };
        let record = options[record];
        self.operator.say(&format!(
            "[*] Running {} as {} ({})",
            action,
            record.account_name(),
            record.capability
        ));
        match self
            .registry
            .dispatch(record.kind, &record.account, self.connection)
            .await
        {
            Ok(()) => Outcome::Dispatched {
                kind: record.kind,
                account: record.account_name().to_string(),
            },
            Err(e) => {
                warn!("{} via {} failed: {}", action, record.capability, e);
                self.operator.say(&format!("[!] {}", e));
                Outcome::DispatchFailed(e)
            }
        }
    }

    /// Prompt until a valid index is entered; `None` on cancel or end of input.
    fn choose(&mut self, len: usize, action: &str) -> Option<usize> {
        let prompt = format!("[?] Choose a {} ({} to cancel): ", action, CANCEL_SENTINEL);
        loop {
            let answer = self.operator.ask(&prompt)?;
            match parse_selection(&answer, len) {
                Ok(Selection::Pick(i)) => return Some(i),
                Ok(Selection::Cancel) => return None,
                Err(e) => self.operator.say(&format!("[!] {}", e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan;
    use crate::planner::tests::{critical, in_ns};
    use crate::registry::tests::RecordingPrimitive;
    use pkg_types::capability::{Capability, CapabilityKind};
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Replays canned answers and keeps everything said.
    #[derive(Default)]
    struct ScriptedOperator {
        answers: VecDeque<String>,
        said: Vec<String>,
        asked: usize,
    }

    impl ScriptedOperator {
        fn answering(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            }
        }

        fn said(&self, needle: &str) -> bool {
            self.said.iter().any(|l| l.contains(needle))
        }
    }

    impl Operator for ScriptedOperator {
        fn say(&mut self, line: &str) {
            self.said.push(line.to_string());
        }

        fn ask(&mut self, _prompt: &str) -> Option<String> {
            self.asked += 1;
            self.answers.pop_front()
        }
    }

    fn setup() -> (Arc<RecordingPrimitive>, Registry) {
        let primitive = Arc::new(RecordingPrimitive::default());
        let registry = Registry::new().register_all(primitive.clone());
        (primitive, registry)
    }

    #[test]
    fn selection_parsing() {
        assert_eq!(parse_selection(" 1\n", 2), Ok(Selection::Pick(1)));
        assert_eq!(parse_selection("-1", 2), Ok(Selection::Cancel));
        assert_eq!(
            parse_selection("2", 2),
            Err(SelectionError::OutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            parse_selection("-3", 2),
            Err(SelectionError::OutOfRange { index: -3, len: 2 })
        );
        assert!(matches!(parse_selection("x", 2), Err(SelectionError::NotANumber(_))));
        assert_eq!(
            SelectionError::OutOfRange { index: 5, len: 2 }.to_string(),
            "choice 5 is out of range, pick 0..=1 or -1 to cancel"
        );
    }

    #[tokio::test]
    async fn unrestricted_escalation_skips_hijack() {
        let (primitive, registry) = setup();
        let plan = plan(&[critical(
            "dev/admin",
            vec![
                Capability::unrestricted(CapabilityKind::Impersonate),
                Capability::unrestricted(CapabilityKind::PatchNodes),
            ],
        )]);
        let mut operator = ScriptedOperator::answering(&["0"]);
        let ssh = SshConfig::default();

        let report = Orchestrator::new(&registry, &ssh, &mut operator).run(&plan).await;

        assert!(report.hijack.is_none());
        assert!(report.escalate.is_dispatched());
        assert_eq!(
            primitive.calls(),
            vec![(AttackKind::Impersonate, vec!["dev/admin".to_string()])]
        );
        assert!(!operator.said("hijack"));
    }

    #[tokio::test]
    async fn kube_system_hijack_is_offered_as_unrestricted() {
        let (primitive, registry) = setup();
        let plan = plan(&[critical(
            "kube-system/cleaner",
            vec![in_ns(CapabilityKind::DeletePods, "kube-system")],
        )]);
        let mut operator = ScriptedOperator::answering(&["0"]);
        let ssh = SshConfig::default();

        let report = Orchestrator::new(&registry, &ssh, &mut operator).run(&plan).await;

        assert!(operator.said("Any workload can be hijacked"));
        assert!(report.hijack.unwrap().is_dispatched());
        assert!(matches!(report.escalate, Outcome::Unavailable));
        assert_eq!(primitive.calls().len(), 1);
        assert_eq!(primitive.calls()[0].0, AttackKind::DeletePods);
    }

    #[tokio::test]
    async fn restricted_hijack_then_escalation_fails() {
        let (primitive, registry) = setup();
        let plan = plan(&[critical("dev/app", vec![in_ns(CapabilityKind::DeletePods, "dev")])]);
        let mut operator = ScriptedOperator::answering(&["0"]);
        let ssh = SshConfig::default();

        let report = Orchestrator::new(&registry, &ssh, &mut operator).run(&plan).await;

        assert!(operator.said("Only some workloads can be hijacked"));
        assert!(operator.said("0 deletepods[dev]  ServiceAccount: dev/app"));
        assert!(report.hijack.unwrap().is_dispatched());
        assert!(matches!(report.escalate, Outcome::Unavailable));
        assert!(operator.said("No privilege escalation path detected"));
        assert_eq!(primitive.calls().len(), 1);
    }

    #[tokio::test]
    async fn restricted_escalation_offered_after_hijack() {
        let (primitive, registry) = setup();
        let plan = plan(&[critical(
            "dev/app",
            vec![
                in_ns(CapabilityKind::CreatePods, "dev"),
                in_ns(CapabilityKind::GetSecrets, "dev"),
            ],
        )]);
        let mut operator = ScriptedOperator::answering(&["1"]);
        let ssh = SshConfig::default();

        let report = Orchestrator::new(&registry, &ssh, &mut operator).run(&plan).await;

        assert!(matches!(report.hijack, Some(Outcome::Unavailable)));
        assert!(report.escalate.is_dispatched());
        assert_eq!(primitive.calls()[0].0, AttackKind::GetSecrets);
    }

    #[tokio::test]
    async fn invalid_input_reprompts_and_cancel_dispatches_nothing() {
        let (primitive, registry) = setup();
        let plan = plan(&[critical(
            "dev/admin",
            vec![Capability::unrestricted(CapabilityKind::CreateTokens)],
        )]);
        let mut operator = ScriptedOperator::answering(&["7", "abc", "-1"]);
        let ssh = SshConfig::default();

        let report = Orchestrator::new(&registry, &ssh, &mut operator).run(&plan).await;

        assert!(matches!(report.escalate, Outcome::Cancelled));
        assert_eq!(operator.asked, 3);
        assert!(operator.said("out of range"));
        assert!(operator.said("not a number"));
        assert!(primitive.calls().is_empty());
    }

    #[tokio::test]
    async fn cancelled_hijack_still_reaches_escalation() {
        let (_primitive, registry) = setup();
        let plan = plan(&[critical(
            "dev/app",
            vec![
                in_ns(CapabilityKind::DeletePods, "dev"),
                in_ns(CapabilityKind::ExecPods, "dev"),
            ],
        )]);
        let mut operator = ScriptedOperator::answering(&["-1", "0"]);
        let ssh = SshConfig::default();

        let report = Orchestrator::new(&registry, &ssh, &mut operator).run(&plan).await;

        assert!(matches!(report.hijack, Some(Outcome::Cancelled)));
        assert!(report.escalate.is_dispatched());
    }

    #[tokio::test]
    async fn end_of_input_cancels() {
        let (primitive, registry) = setup();
        let plan = plan(&[critical(
            "dev/admin",
            vec![Capability::unrestricted(CapabilityKind::CreatePods)],
        )]);
        let mut operator = ScriptedOperator::default();
        let ssh = SshConfig::default();

        let report = Orchestrator::new(&registry, &ssh, &mut operator).run(&plan).await;

        assert!(matches!(report.escalate, Outcome::Cancelled));
        assert!(primitive.calls().is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_is_reported() {
        let primitive = Arc::new(RecordingPrimitive {
            fail: true,
            ..Default::default()
        });
        let registry = Registry::new().register_all(primitive);
        let plan = plan(&[critical(
            "dev/admin",
            vec![Capability::unrestricted(CapabilityKind::CreatePods)],
        )]);
        let mut operator = ScriptedOperator::answering(&["0"]);
        let ssh = SshConfig::default();

        let report = Orchestrator::new(&registry, &ssh, &mut operator).run(&plan).await;

        assert!(matches!(
            report.escalate,
            Outcome::DispatchFailed(DispatchError::Failed { .. })
        ));
        assert!(operator.said("createpods failed: apiserver said no"));
    }

    #[tokio::test]
    async fn empty_plan_fails_both_phases() {
        let (_primitive, registry) = setup();
        let mut operator = ScriptedOperator::default();
        let ssh = SshConfig::default();

        let report = Orchestrator::new(&registry, &ssh, &mut operator)
            .run(&AttackPlan::default())
            .await;

        assert!(matches!(report.hijack, Some(Outcome::Unavailable)));
        assert!(matches!(report.escalate, Outcome::Unavailable));
        assert_eq!(operator.asked, 0);
    }
}
