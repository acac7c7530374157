pub mod capability;
pub mod config;
pub mod pod;
pub mod rbac;
pub mod service_account;
pub mod validate;
