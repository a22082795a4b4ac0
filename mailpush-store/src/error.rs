//! Error types for the mailpush-store crate.

use std::{io, path::PathBuf};

use mailpush_common::rule::UnknownContentKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the rule file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The rule set could not be written as RON.
    #[error("Unable to serialise rules: {0}")]
    Serialize(#[from] ron::Error),

    /// The rule file is not valid RON.
    #[error("Unable to parse rule file: {0}")]
    Deserialize(#[from] ron::error::SpannedError),

    /// A field outside the update allow-list was named.
    #[error("Field {0:?} cannot be updated")]
    InvalidField(String),

    #[error(transparent)]
    UnknownContentKind(#[from] UnknownContentKind),

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
