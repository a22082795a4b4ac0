//! Recipient forwarding rules.

use core::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// The representation of a message body that a rule wants delivered.
///
/// Serialised as its media type string (`"text/plain"`, `"text/html"` or
/// `"multipart"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentKind {
    PlainText,
    Html,
    /// The verbatim message, headers and all
    Raw,
}

impl ContentKind {
    pub const ALL: [Self; 3] = [Self::PlainText, Self::Html, Self::Raw];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Html => "text/html",
            Self::Raw => "multipart",
        }
    }

    /// Value of the `format` field sent to the notification endpoint
    #[must_use]
    pub const fn format(self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Html | Self::Raw => "html",
        }
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown content kind: {0}")]
pub struct UnknownContentKind(pub String);

impl FromStr for ContentKind {
    type Err = UnknownContentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownContentKind(s.to_string()))
    }
}

impl Serialize for ContentKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ContentKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = String::deserialize(deserializer)?;
        kind.parse().map_err(de::Error::custom)
    }
}

/// Normalise an email address for rule matching.
///
/// Surrounding whitespace and angle brackets are removed and the address is
/// lowercased, so `<Alice@Example.com>` and `alice@example.com` are the same
/// recipient.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let trimmed = trimmed
        .strip_prefix('<')
        .and_then(|a| a.strip_suffix('>'))
        .unwrap_or(trimmed);

    trimmed.trim().to_ascii_lowercase()
}

/// A persisted association from a recipient to a notification destination.
///
/// `(recipient, destination_key, content_kind)` identifies a rule; a recipient
/// may have several rules differing in destination or content kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForwardingRule {
    pub recipient: String,
    pub destination_key: String,
    #[serde(default)]
    pub tag: String,
    pub content_kind: ContentKind,
}

impl ForwardingRule {
    pub fn new(
        recipient: &str,
        destination_key: impl Into<String>,
        tag: impl Into<String>,
        content_kind: ContentKind,
    ) -> Self {
        Self {
            recipient: normalize_address(recipient),
            destination_key: destination_key.into(),
            tag: tag.into(),
            content_kind,
        }
    }

    /// Whether this rule has the given identity triple
    #[must_use]
    pub fn is(&self, recipient: &str, destination_key: &str, content_kind: ContentKind) -> bool {
        self.recipient == normalize_address(recipient)
            && self.destination_key == destination_key
            && self.content_kind == content_kind
    }
}

impl Display for ForwardingRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}, tag={})",
            self.recipient, self.destination_key, self.content_kind, self.tag
        )
    }
}
