use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use mailpush_common::rule::{ContentKind, ForwardingRule};

use crate::{Result, RuleField, RuleSet, r#trait::MappingStore};

/// In-memory rule store
///
/// Rules live in a [`RuleSet`] behind an `RwLock`. Lookups take the read lock
/// only, so concurrent sessions never block each other.
#[derive(Debug, Clone, Default)]
pub struct MemoryMappingStore {
    rules: Arc<RwLock<RuleSet>>,
}

impl MemoryMappingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `rules`
    pub fn with_rules(rules: impl IntoIterator<Item = ForwardingRule>) -> Self {
        Self {
            rules: Arc::new(RwLock::new(RuleSet::from_rules(rules))),
        }
    }

    /// Number of stored rules
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn lookup(&self, recipient: &str) -> Result<Vec<ForwardingRule>> {
        Ok(self.rules.read()?.lookup(recipient))
    }

    async fn list(&self) -> Result<Vec<ForwardingRule>> {
        Ok(self.rules.read()?.list())
    }

    async fn insert(&self, rule: ForwardingRule) -> Result<()> {
        self.rules.write()?.insert(rule);
        Ok(())
    }

    async fn update_field(
        &self,
        field: &str,
        value: &str,
        recipient: &str,
        content_kind: ContentKind,
    ) -> Result<usize> {
        let field = field.parse::<RuleField>()?;
        self.rules
            .write()?
            .update_field(field, value, recipient, content_kind)
    }

    async fn delete(
        &self,
        recipient: &str,
        destination_key: &str,
        content_kind: ContentKind,
    ) -> Result<bool> {
        Ok(self
            .rules
            .write()?
            .delete(recipient, destination_key, content_kind))
    }
}
