use async_trait::async_trait;
use mailpush_common::rule::{ContentKind, ForwardingRule};

use crate::Result;

/// Storage of recipient to notification rules.
///
/// Recipients are normalised by every operation, so callers may pass
/// addresses exactly as they appeared on the wire.
#[async_trait]
pub trait MappingStore: Send + Sync + std::fmt::Debug {
    /// Every rule for `recipient`; an unknown recipient is an empty list, not
    /// an error
    async fn lookup(&self, recipient: &str) -> Result<Vec<ForwardingRule>>;

    /// Every stored rule, ordered by recipient
    async fn list(&self) -> Result<Vec<ForwardingRule>>;

    /// Insert `rule`, replacing any rule with the same
    /// `(recipient, destination_key, content_kind)`
    async fn insert(&self, rule: ForwardingRule) -> Result<()>;

    /// Change one field on the rules of `recipient` with `content_kind`.
    ///
    /// # Errors
    /// [`crate::StoreError::InvalidField`] if `field` is not one of
    /// `destination_key`, `tag` or `content_kind`
    async fn update_field(
        &self,
        field: &str,
        value: &str,
        recipient: &str,
        content_kind: ContentKind,
    ) -> Result<usize>;

    /// Remove a single rule, returning whether it existed
    async fn delete(
        &self,
        recipient: &str,
        destination_key: &str,
        content_kind: ContentKind,
    ) -> Result<bool>;
}
