//! Network-related constants.

/// Default SSH port on the controlled node.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Scheme prepended to an API server address configured without one.
pub const DEFAULT_API_SCHEME: &str = "https://";

/// Per-request timeout for the Kubernetes API transport, in seconds.
pub const API_REQUEST_TIMEOUT_SECS: u64 = 10;

/// TCP connect / session timeout for the SSH transport, in seconds.
pub const SSH_TIMEOUT_SECS: u64 = 15;

/// Number of retries after the first failed API request.
pub const API_RETRY_TIMES: u32 = 3;

/// Initial backoff between API retries, in milliseconds.
pub const API_RETRY_INITIAL_BACKOFF_MS: u64 = 1000;

/// Upper bound for a single API retry backoff, in milliseconds.
pub const API_RETRY_MAX_BACKOFF_MS: u64 = 8000;
