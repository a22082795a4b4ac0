//! What happens to a message once the client has sent the final dot.
//!
//! The session owns the protocol; a [`TransactionHandler`] owns the outcome.
//! [`ForwardingHandler`] is the relay's: look up the recipient's rules, extract
//! the message content, and queue one notification per rule.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use mailpush_common::{content::Content, internal};
use mailpush_delivery::{Dispatcher, apply_rules};
use mailpush_store::MappingStore;

use crate::error::HandlerError;

/// How a completed message was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The dispatcher accepted this many jobs, possibly none
    Forwarded(usize),
    /// The recipient has no rules; the message is absorbed
    Unmapped,
}

#[async_trait]
pub trait TransactionHandler: Send + Sync + Debug {
    /// Process the body of a completed transaction for `recipient`.
    ///
    /// # Errors
    /// A [`HandlerError`] means nothing was forwarded and the client should
    /// be told to try again later.
    async fn handle_message(
        &self,
        recipient: &str,
        message: &[u8],
    ) -> Result<Disposition, HandlerError>;
}

#[derive(Debug)]
pub struct ForwardingHandler {
    store: Arc<dyn MappingStore>,
    dispatcher: Arc<Dispatcher>,
    base_url: Arc<str>,
}

impl ForwardingHandler {
    pub fn new(
        store: Arc<dyn MappingStore>,
        dispatcher: Arc<Dispatcher>,
        base_url: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TransactionHandler for ForwardingHandler {
    async fn handle_message(
        &self,
        recipient: &str,
        message: &[u8],
    ) -> Result<Disposition, HandlerError> {
        let rules = self.store.lookup(recipient).await.inspect_err(|err| {
            internal!(level = ERROR, "Unable to look up rules for {recipient}: {err}");
        })?;

        if rules.is_empty() {
            internal!(level = INFO, "No forwarding rules for {recipient}, discarding message");
            return Ok(Disposition::Unmapped);
        }

        let content = Content::extract(message);

        let enqueued = match apply_rules(&rules, &content, &self.base_url, &self.dispatcher) {
            Ok(enqueued) => enqueued,
            Err(err) => {
                internal!(level = WARN, "Message for {recipient} partially routed: {err}");
                err.enqueued
            }
        };

        internal!(
            level = INFO,
            "Queued {enqueued} of {} notification(s) for {recipient}",
            rules.len()
        );

        Ok(Disposition::Forwarded(enqueued))
    }
}
