//! [`FiniteStateMachine`] over SMTP commands.
//!
//! Lets the session drive the protocol through the shared trait while the
//! transition table itself stays in [`crate::state`].

use mailpush_common::traits::fsm::FiniteStateMachine;

use crate::{command::Command, session_state::SessionState, state::State};

impl FiniteStateMachine for State {
    type Input = Command;

    /// Protocol state only; business outcomes are applied by the session
    type Context = SessionState;

    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self {
        Self::transition(self, input, context)
    }
}
