//! The in-memory rule collection shared by every backend.

use mailpush_common::rule::{ContentKind, ForwardingRule, normalize_address};
use serde::{Deserialize, Serialize};

use crate::{Result, RuleField};

/// A set of forwarding rules, unique on `(recipient, destination_key, content_kind)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(Vec<ForwardingRule>);

impl RuleSet {
    /// Build a set from arbitrary rules, normalising recipients and keeping the
    /// last of any duplicated triple
    pub fn from_rules(rules: impl IntoIterator<Item = ForwardingRule>) -> Self {
        let mut set = Self::default();
        for rule in rules {
            set.insert(rule);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every rule for `recipient`, in insertion order
    pub fn lookup(&self, recipient: &str) -> Vec<ForwardingRule> {
        let recipient = normalize_address(recipient);

        self.0
            .iter()
            .filter(|rule| rule.recipient == recipient)
            .cloned()
            .collect()
    }

    /// Every rule, ordered by recipient then destination key
    pub fn list(&self) -> Vec<ForwardingRule> {
        let mut rules = self.0.clone();
        rules.sort_by(|a, b| {
            a.recipient
                .cmp(&b.recipient)
                .then_with(|| a.destination_key.cmp(&b.destination_key))
                .then_with(|| a.content_kind.cmp(&b.content_kind))
        });
        rules
    }

    /// Insert `rule`, replacing any rule with the same identity.
    ///
    /// Returns `true` if an existing rule was replaced.
    pub fn insert(&mut self, mut rule: ForwardingRule) -> bool {
        rule.recipient = normalize_address(&rule.recipient);

        if let Some(existing) = self
            .0
            .iter_mut()
            .find(|r| r.is(&rule.recipient, &rule.destination_key, rule.content_kind))
        {
            *existing = rule;
            true
        } else {
            self.0.push(rule);
            false
        }
    }

    /// Set `field` to `value` on every rule of `recipient` with `content_kind`.
    ///
    /// Returns the number of rules changed. Rules that collide after the
    /// update are merged, the updated rule winning.
    pub fn update_field(
        &mut self,
        field: RuleField,
        value: &str,
        recipient: &str,
        content_kind: ContentKind,
    ) -> Result<usize> {
        let kind = match field {
            RuleField::ContentKind => Some(value.parse::<ContentKind>()?),
            RuleField::DestinationKey | RuleField::Tag => None,
        };

        let recipient = normalize_address(recipient);
        let (mut updated, kept): (Vec<_>, Vec<_>) = self
            .0
            .drain(..)
            .partition(|rule| rule.recipient == recipient && rule.content_kind == content_kind);
        self.0 = kept;

        for rule in &mut updated {
            match field {
                RuleField::DestinationKey => rule.destination_key = value.to_string(),
                RuleField::Tag => rule.tag = value.to_string(),
                RuleField::ContentKind => rule.content_kind = kind.unwrap_or(rule.content_kind),
            }
        }

        let count = updated.len();
        for rule in updated {
            self.insert(rule);
        }

        Ok(count)
    }

    /// Remove the rule with the given identity, returning whether it existed
    pub fn delete(
        &mut self,
        recipient: &str,
        destination_key: &str,
        content_kind: ContentKind,
    ) -> bool {
        let before = self.0.len();
        self.0
            .retain(|rule| !rule.is(recipient, destination_key, content_kind));
        before != self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::StoreError;

    fn rule(recipient: &str, key: &str, tag: &str, kind: ContentKind) -> ForwardingRule {
        ForwardingRule::new(recipient, key, tag, kind)
    }

    #[test]
    fn insert_replaces_same_identity() {
        let mut set = RuleSet::default();

        assert!(!set.insert(rule("a@x.com", "k1", "first", ContentKind::PlainText)));
        assert!(set.insert(rule("A@X.com", "k1", "second", ContentKind::PlainText)));
        assert!(!set.insert(rule("a@x.com", "k1", "html", ContentKind::Html)));

        assert_eq!(set.len(), 2);
        assert_eq!(set.lookup("a@x.com")[0].tag, "second");
    }

    #[test]
    fn lookup_of_unknown_recipient_is_empty() {
        let set = RuleSet::from_rules([rule("a@x.com", "k1", "", ContentKind::PlainText)]);

        assert!(set.lookup("nobody@x.com").is_empty());
        assert_eq!(set.lookup("<A@x.com>").len(), 1);
    }

    #[test]
    fn list_is_ordered_by_recipient() {
        let set = RuleSet::from_rules([
            rule("c@x.com", "k", "", ContentKind::PlainText),
            rule("a@x.com", "k", "", ContentKind::PlainText),
            rule("b@x.com", "k", "", ContentKind::PlainText),
        ]);

        let recipients: Vec<_> = set.list().into_iter().map(|r| r.recipient).collect();
        assert_eq!(recipients, ["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[test]
    fn update_tag_touches_matching_kind_only() {
        let mut set = RuleSet::from_rules([
            rule("a@x.com", "k1", "old", ContentKind::PlainText),
            rule("a@x.com", "k2", "old", ContentKind::PlainText),
            rule("a@x.com", "k1", "old", ContentKind::Html),
        ]);

        let changed = set
            .update_field(RuleField::Tag, "new", "a@x.com", ContentKind::PlainText)
            .unwrap_or_default();
        assert_eq!(changed, 2);

        let tags: Vec<_> = set
            .list()
            .into_iter()
            .map(|r| (r.destination_key, r.content_kind, r.tag))
            .collect();
        assert_eq!(
            tags,
            [
                ("k1".to_string(), ContentKind::PlainText, "new".to_string()),
                ("k1".to_string(), ContentKind::Html, "old".to_string()),
                ("k2".to_string(), ContentKind::PlainText, "new".to_string()),
            ]
        );
    }

    #[test]
    fn update_content_kind_merges_collisions() {
        let mut set = RuleSet::from_rules([
            rule("a@x.com", "k1", "plain", ContentKind::PlainText),
            rule("a@x.com", "k1", "html", ContentKind::Html),
        ]);

        let changed = set
            .update_field(
                RuleField::ContentKind,
                "text/html",
                "a@x.com",
                ContentKind::PlainText,
            )
            .unwrap_or_default();

        assert_eq!(changed, 1);
        assert_eq!(set.len(), 1);
        assert_eq!(set.lookup("a@x.com")[0].tag, "plain");
    }

    #[test]
    fn update_with_bad_content_kind_changes_nothing() {
        let original = RuleSet::from_rules([rule("a@x.com", "k1", "", ContentKind::PlainText)]);
        let mut set = original.clone();

        let result = set.update_field(
            RuleField::ContentKind,
            "image/png",
            "a@x.com",
            ContentKind::PlainText,
        );

        assert!(matches!(result, Err(StoreError::UnknownContentKind(_))));
        assert_eq!(set, original);
    }

    #[test]
    fn delete_removes_exact_identity() {
        let mut set = RuleSet::from_rules([
            rule("a@x.com", "k1", "", ContentKind::PlainText),
            rule("a@x.com", "k1", "", ContentKind::Html),
        ]);

        assert!(set.delete("a@x.com", "k1", ContentKind::Html));
        assert!(!set.delete("a@x.com", "k1", ContentKind::Html));
        assert_eq!(set.len(), 1);
    }
}
