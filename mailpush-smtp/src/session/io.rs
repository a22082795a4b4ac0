use mailpush_common::{incoming, internal, status::Status, traits::fsm::FiniteStateMachine};
use tokio::io::{AsyncRead, AsyncWrite};

use super::Session;
use crate::{
    command::Command,
    state::{AuthResponse, PostDot, State},
};

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    /// Feed one line (or line fragment) from the client into the session
    pub(super) fn receive(&mut self, line: &[u8]) {
        if !matches!(self.state, State::Reading(_)) && self.skip_overlong(line) {
            return;
        }

        match self.state {
            State::Reading(_) => self.receive_data(line),
            State::AuthChallenge(_) => {
                incoming!("<authentication response>");

                self.state = State::AuthResponse(AuthResponse {
                    response: String::from_utf8_lossy(line).trim().to_string(),
                });
                self.sent = false;
            }
            _ => {
                let command = Command::try_from(line).unwrap_or_else(|e| e);

                incoming!("{command}");

                let state = std::mem::take(&mut self.state);
                self.state =
                    FiniteStateMachine::transition(state, command, &mut self.session_state);
                self.sent = false;

                internal!(level = DEBUG, "Transitioned to {}", self.state);
            }
        }
    }

    /// Swallow a command line that ran past its limit, replying once it ends.
    ///
    /// Returns whether `line` was consumed. An over-long response to an AUTH
    /// challenge abandons the exchange.
    fn skip_overlong(&mut self, line: &[u8]) -> bool {
        let ends_line = line.ends_with(b"\n");

        if !ends_line {
            if !self.overlong {
                internal!(level = WARN, "Command line too long, discarding it");
            }
            self.overlong = true;
            return true;
        }

        if !std::mem::take(&mut self.overlong) {
            return false;
        }

        let next = match std::mem::take(&mut self.state) {
            State::AuthChallenge(_) => self.session_state.ready_state(),
            state => state,
        };
        self.state = State::reply(Status::SyntaxError, "Line too long", next);
        self.sent = false;

        true
    }

    /// Handle a chunk of message data
    ///
    /// Only a chunk that starts a line can be the terminator or carry a
    /// stuffed dot.
    fn receive_data(&mut self, chunk: &[u8]) {
        let ends_line = chunk.ends_with(b"\n");

        if self.at_line_start && ends_line {
            let content = chunk.strip_suffix(b"\n").unwrap_or(chunk);
            let content = content.strip_suffix(b"\r").unwrap_or(content);

            if content == b"." {
                self.finish_data();
                return;
            }
        }

        let chunk = if self.at_line_start {
            chunk.strip_prefix(b".").unwrap_or(chunk)
        } else {
            chunk
        };
        self.at_line_start = ends_line;

        if self.oversized {
            return;
        }

        if self
            .session_state
            .exceeds_limit(self.message.len().saturating_add(chunk.len()))
        {
            internal!(
                level = WARN,
                "Message exceeds {} bytes, discarding the rest of it",
                self.session_state.max_message_size
            );
            self.oversized = true;
            self.message = Vec::new();
            return;
        }

        self.message.extend_from_slice(chunk);
    }

    fn finish_data(&mut self) {
        self.at_line_start = true;
        self.sent = false;

        if std::mem::take(&mut self.oversized) {
            self.session_state.reset_transaction();
            self.state = State::reply(
                Status::ExceededStorage,
                format!(
                    "Message size exceeds fixed maximum of {} bytes",
                    self.session_state.max_message_size
                ),
                self.session_state.ready_state(),
            );
            return;
        }

        // The line break before the dot belongs to the terminator
        if self.message.ends_with(b"\r\n") {
            self.message.truncate(self.message.len() - 2);
        } else if self.message.ends_with(b"\n") {
            self.message.truncate(self.message.len() - 1);
        }

        self.state = State::PostDot(PostDot);
    }
}
