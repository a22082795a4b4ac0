use mailpush_common::{internal, status::Status};
use tokio::io::{AsyncRead, AsyncWrite};

use super::Session;
use crate::{error::AuthError, state::State};

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    /// Do the work the current state calls for.
    ///
    /// Authentication results and message handling are decided here, and
    /// recorded as a [`State::Reply`] for `response()` to format.
    pub(super) async fn emit(&mut self) {
        match std::mem::take(&mut self.state) {
            State::AuthResponse(auth) => self.state = self.authenticate(&auth.response),
            State::PostDot(_) => self.state = self.handle_message().await,
            state => self.state = state,
        }
    }

    fn authenticate(&mut self, response: &str) -> State {
        let next = self.session_state.ready_state();

        let Some(credentials) = self.config.credentials.as_ref() else {
            internal!(level = WARN, "AUTH attempted, but no credentials are configured");
            return State::reply(Status::AuthFailed, "Authentication credentials invalid", next);
        };

        match credentials.verify(response) {
            Ok(()) => {
                internal!(level = INFO, "Authenticated as {}", credentials.username());
                self.session_state.authenticated = true;
                State::reply(Status::AuthSuccess, "Authentication successful", next)
            }
            Err(AuthError::Cancelled) => {
                State::reply(Status::ArgumentError, "Authentication cancelled", next)
            }
            Err(err) if err.is_syntax() => {
                internal!(level = DEBUG, "{err}");
                State::reply(
                    Status::ArgumentError,
                    "Malformed authentication response",
                    next,
                )
            }
            Err(err) => {
                internal!(level = WARN, "{err}");
                State::reply(Status::AuthFailed, "Authentication credentials invalid", next)
            }
        }
    }

    async fn handle_message(&mut self) -> State {
        let message = std::mem::take(&mut self.message);
        let recipient = self.session_state.recipient.take().unwrap_or_default();

        self.session_state.reset_transaction();
        let next = self.session_state.ready_state();

        match self
            .config
            .handler
            .handle_message(&recipient, &message)
            .await
        {
            Ok(disposition) => {
                internal!(
                    level = DEBUG,
                    "Message of {} bytes for {recipient}: {disposition:?}",
                    message.len()
                );
                State::reply(Status::Ok, "Ok: message accepted", next)
            }
            Err(err) => {
                internal!(level = ERROR, "Unable to process message for {recipient}: {err}");
                State::reply(
                    Status::ActionUnavailable,
                    "Requested action aborted: local error in processing",
                    next,
                )
            }
        }
    }
}
