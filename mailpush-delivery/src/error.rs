//! Typed error handling for delivery operations.
//!
//! A single HTTP attempt fails with an [`AttemptError`], which is always
//! retryable. Once the [`crate::RetryPolicy`] is exhausted the last attempt
//! error is wrapped in a terminal [`DeliveryError`]. Building jobs from rules
//! fails per rule with a [`RuleError`]; those are gathered into an
//! [`ApplyError`] without stopping the remaining rules.

use mailpush_common::rule::{ContentKind, ForwardingRule};
use thiserror::Error;

/// A single failed POST.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The request never produced a response (connect, timeout, TLS, ...).
    #[error("Request failed: {0}")]
    Network(String),

    /// The endpoint answered with a non-2xx status.
    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Terminal failure of a job.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Delivery to {url} failed after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: AttemptError,
    },
}

impl DeliveryError {
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Why a single rule produced no job.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Message has no {0} content")]
    MissingContent(ContentKind),

    #[error("Unable to serialise notification: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The rules of one message that could not be routed.
#[derive(Debug, Default, Error)]
#[error("{} rule(s) could not be applied{}", .failures.len(), describe(.failures))]
pub struct ApplyError {
    /// Jobs the dispatcher still accepted from the remaining rules
    pub enqueued: usize,
    pub failures: Vec<(ForwardingRule, RuleError)>,
}

impl ApplyError {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

fn describe(failures: &[(ForwardingRule, RuleError)]) -> String {
    failures
        .iter()
        .map(|(rule, err)| format!("; {rule}: {err}"))
        .collect()
}
