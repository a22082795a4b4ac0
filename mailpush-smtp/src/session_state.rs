//! Protocol state carried between SMTP commands.
//!
//! This is the context the FSM transitions over. It holds what the protocol
//! itself needs (greeting, authentication, envelope) and nothing the
//! business side produces.

use crate::state::{Connect, Ehlo, Helo, State};

/// SMTP session state for the finite state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Client identifier from EHLO/HELO command
    pub id: String,

    /// `true` if client sent EHLO (extended SMTP), `false` for HELO
    pub extended: bool,

    /// Set once `AUTH` succeeds; survives `RSET` and completed transactions
    pub authenticated: bool,

    /// Reverse-path of the open transaction
    pub sender: Option<String>,

    /// The single recipient of the open transaction
    pub recipient: Option<String>,

    /// Largest acceptable message in bytes, zero for unlimited
    pub max_message_size: usize,
}

impl SessionState {
    #[must_use]
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            ..Self::default()
        }
    }

    /// Creates a session state with a specific client ID and ESMTP mode
    #[must_use]
    pub fn with_id(id: impl Into<String>, extended: bool) -> Self {
        Self {
            id: id.into(),
            extended,
            ..Self::default()
        }
    }

    /// Clears the envelope, keeping the greeting and authentication
    pub fn reset_transaction(&mut self) {
        self.sender = None;
        self.recipient = None;
    }

    /// The state a client returns to between transactions
    #[must_use]
    pub fn ready_state(&self) -> State {
        if self.id.is_empty() {
            State::Connect(Connect)
        } else if self.extended {
            State::Ehlo(Ehlo {
                id: self.id.clone(),
            })
        } else {
            State::Helo(Helo {
                id: self.id.clone(),
            })
        }
    }

    /// Whether `size` bytes exceeds the configured limit
    #[must_use]
    pub const fn exceeds_limit(&self, size: usize) -> bool {
        self.max_message_size > 0 && size > self.max_message_size
    }
}
