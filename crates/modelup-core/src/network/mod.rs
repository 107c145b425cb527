//! Network utilities: the shared HTTP client and retry helper.

mod client;
mod retry;

pub use client::{extract_domain, HttpClient};
pub use retry::{retry_async, RetryConfig};
