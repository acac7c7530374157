pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod stager;

pub use orchestrator::{ExploitReport, Operator, Orchestrator, Outcome};
pub use planner::{AttackPlan, CapabilityRecord, plan};
pub use registry::{AttackPrimitive, DispatchError, Registry};
pub use stager::TokenStager;
