pub mod github;
pub mod http;

use std::thread;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::config::RetryPolicy;

pub const USER_AGENT: &str = concat!("wineport/", env!("CARGO_PKG_VERSION"));

/// Outcome of one failed attempt at a network operation
#[derive(Debug)]
pub enum Attempt {
    /// Transient failure, worth another try
    Retry(String),
    /// Permanent failure, retrying cannot help
    Fatal(String),
    Cancelled,
}

/// Run `op` until it succeeds, fails fatally, or `policy.retries` attempts are used up.
///
/// Sleeps with exponential backoff between attempts and checks `cancel`
/// before each one. The returned error is never `Attempt::Retry` unless the
/// attempts were exhausted, in which case it carries the last reason.
pub fn with_retries<T>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    label: &str,
    mut op: impl FnMut() -> Result<T, Attempt>,
) -> Result<T, Attempt> {
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(Attempt::Cancelled);
        }

        match op() {
            Ok(value) => return Ok(value),
            Err(Attempt::Retry(reason)) if attempt < policy.retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{label}: attempt {attempt}/{} failed ({reason}), retrying in {delay:?}",
                    policy.retries
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(Attempt::Retry(reason)) => {
                return Err(Attempt::Retry(format!(
                    "{reason} (gave up after {attempt} attempts)"
                )));
            }
            Err(other) => return Err(other),
        }
    }
}

/// Classify a ureq error: transport problems and server-side statuses are transient
pub fn classify_ureq_error(err: ureq::Error) -> Attempt {
    match err {
        ureq::Error::Status(code, _) if code == 429 || code >= 500 => {
            Attempt::Retry(format!("HTTP status {code}"))
        }
        ureq::Error::Status(code, _) => Attempt::Fatal(format!("HTTP status {code}")),
        ureq::Error::Transport(transport) => Attempt::Retry(transport.to_string()),
    }
}

/// Build the blocking HTTP agent shared by catalog and download requests
pub fn build_agent(policy: &RetryPolicy) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(policy.timeout)
        .user_agent(USER_AGENT)
        .build()
}
