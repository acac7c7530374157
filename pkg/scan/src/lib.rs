//! RBAC scan: fold bindings into per-ServiceAccount permission indexes,
//! then classify which accounts carry escalation or hijack capabilities.

pub mod builder;
pub mod classifier;

pub use builder::build_permission_index;
pub use classifier::classify;
