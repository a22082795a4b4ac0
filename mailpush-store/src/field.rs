use core::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::StoreError;

/// The rule fields an administrator may change in place.
///
/// The recipient is not among them; moving a rule to another recipient is a
/// delete followed by an insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleField {
    DestinationKey,
    Tag,
    ContentKind,
}

impl RuleField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DestinationKey => "destination_key",
            Self::Tag => "tag",
            Self::ContentKind => "content_kind",
        }
    }
}

impl FromStr for RuleField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "destination_key" => Ok(Self::DestinationKey),
            "tag" => Ok(Self::Tag),
            "content_kind" => Ok(Self::ContentKind),
            other => Err(StoreError::InvalidField(other.to_string())),
        }
    }
}

impl Display for RuleField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_allow_listed_fields_parse() {
        assert_eq!("tag".parse::<RuleField>().ok(), Some(RuleField::Tag));
        assert_eq!(
            "destination_key".parse::<RuleField>().ok(),
            Some(RuleField::DestinationKey)
        );

        for field in ["recipient", "email", "tag; DROP TABLE records", ""] {
            assert!(matches!(
                field.parse::<RuleField>(),
                Err(StoreError::InvalidField(name)) if name == field
            ));
        }
    }
}
