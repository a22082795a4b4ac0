//! Turning forwarding rules into outbound notification jobs.

use mailpush_common::{
    content::Content,
    internal,
    rule::{ContentKind, ForwardingRule},
};
use serde::{Deserialize, Serialize};

use crate::{
    dispatcher::{Dispatcher, EnqueueOutcome},
    error::{ApplyError, RuleError},
};

/// The JSON body sent to the notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub format: String,
}

impl Notification {
    /// Build the notification `rule` asks for from `content`
    ///
    /// # Errors
    /// [`RuleError::MissingContent`] if the message has no representation of
    /// the rule's content kind
    pub fn for_rule(rule: &ForwardingRule, content: &Content) -> Result<Self, RuleError> {
        let body = content
            .get(rule.content_kind)
            .ok_or(RuleError::MissingContent(rule.content_kind))?;

        Ok(Self {
            title: content.subject().to_string(),
            body: body.to_string(),
            tag: rule.tag.clone(),
            format: rule.content_kind.format().to_string(),
        })
    }
}

/// A serialised notification bound for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchJob {
    pub url: String,
    pub payload: Vec<u8>,
    /// The rule that produced this job, kept for logging
    pub rule: ForwardingRule,
}

impl DispatchJob {
    /// Build the job for `rule`, posting to `base_url/<destination key>`
    ///
    /// # Errors
    /// If the message lacks the requested content, or the notification
    /// cannot be serialised
    pub fn for_rule(
        rule: &ForwardingRule,
        content: &Content,
        base_url: &str,
    ) -> Result<Self, RuleError> {
        let notification = Notification::for_rule(rule, content)?;

        Ok(Self {
            url: join_url(base_url, &rule.destination_key),
            payload: serde_json::to_vec(&notification)?,
            rule: rule.clone(),
        })
    }
}

/// Join `key` onto `base` with exactly one `/` between them
pub fn join_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

///
/// Build a job for every rule and hand each to `dispatcher`.
///
/// Rules that fail do not stop the others. Returns the number of jobs the
/// dispatcher accepted.
///
/// # Errors
/// An [`ApplyError`] listing every rule that produced no job, along with
/// the number of jobs the others still queued
///
pub fn apply_rules(
    rules: &[ForwardingRule],
    content: &Content,
    base_url: &str,
    dispatcher: &Dispatcher,
) -> Result<usize, ApplyError> {
    let mut failures = ApplyError::default();
    let mut enqueued = 0;

    for rule in rules {
        match DispatchJob::for_rule(rule, content, base_url) {
            Ok(job) => {
                if dispatcher.enqueue(job) == EnqueueOutcome::Enqueued {
                    enqueued += 1;
                }
            }
            Err(err) => {
                internal!(
                    level = WARN,
                    "Skipping rule {rule}: {err} (message has {:?})",
                    available_kinds(content)
                );
                failures.failures.push((rule.clone(), err));
            }
        }
    }

    if failures.is_empty() {
        Ok(enqueued)
    } else {
        failures.enqueued = enqueued;
        Err(failures)
    }
}

/// Kinds a message can satisfy, for diagnostics
pub fn available_kinds(content: &Content) -> Vec<ContentKind> {
    ContentKind::ALL
        .into_iter()
        .filter(|kind| content.get(*kind).is_some())
        .collect()
}
