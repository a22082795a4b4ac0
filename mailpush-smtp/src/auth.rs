//! SASL `PLAIN` (RFC 4616) against a single configured identity.

use core::fmt::{self, Debug, Formatter};

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::AuthError;

/// The only mechanism the relay offers
pub const PLAIN: &str = "PLAIN";

/// A username and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Decode a `PLAIN` initial response and check it against `self`.
    ///
    /// The authorisation identity is ignored.
    ///
    /// # Errors
    /// See [`AuthError`]; only [`AuthError::Rejected`] means the client
    /// presented well-formed but wrong credentials.
    pub fn verify(&self, response: &str) -> Result<(), AuthError> {
        let offered = decode_plain(response)?;

        if offered == *self {
            Ok(())
        } else {
            Err(AuthError::Rejected(offered.username))
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Decode the base64 `authzid NUL authcid NUL passwd` message
///
/// # Errors
/// If the client cancelled, the encoding is invalid, or the message does not
/// have exactly three fields
pub fn decode_plain(response: &str) -> Result<Credentials, AuthError> {
    let response = response.trim();

    if response == "*" {
        return Err(AuthError::Cancelled);
    }

    // A lone `=` is an empty initial response
    let decoded = if response == "=" {
        Vec::new()
    } else {
        STANDARD.decode(response)?
    };

    let text = String::from_utf8(decoded).map_err(|_| AuthError::Malformed)?;
    let mut fields = text.split('\0');

    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(_authzid), Some(username), Some(password), None) if !username.is_empty() => {
            Ok(Credentials::new(username, password))
        }
        _ => Err(AuthError::Malformed),
    }
}
