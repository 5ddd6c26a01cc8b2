//! Utility functions and helpers.

pub mod date;
pub mod http;
pub mod retry;
pub mod url;

pub use retry::{RetryPolicy, Retryable};
pub use url::resolve_url;
