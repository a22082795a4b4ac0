use mailpush_common::status::Status;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    session::{Event, Response, Session},
    state::{Reading, State},
};

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    /// Format the reply for the current state.
    ///
    /// A pure formatter: decisions were made by the FSM or by `emit()`. The
    /// only state changes here are leaving a [`State::Reply`] and entering
    /// [`State::Reading`] once the `354` has been produced.
    pub(super) fn response(&mut self) -> Response {
        match std::mem::take(&mut self.state) {
            State::Reply(reply) => {
                self.state = *reply.next;

                return (
                    Some(vec![format!("{} {}", reply.status, reply.message)]),
                    Event::ConnectionKeepAlive,
                );
            }
            State::Data(_) => return self.data_response(),
            state => self.state = state,
        }

        let banner = &self.config.banner;

        match &self.state {
            State::Connect(_) => (
                Some(vec![format!("{} {banner} ESMTP ready", Status::ServiceReady)]),
                Event::ConnectionKeepAlive,
            ),
            State::Ehlo(ehlo) => (Some(self.ehlo_response(&ehlo.id)), Event::ConnectionKeepAlive),
            State::Helo(helo) => (
                Some(vec![format!(
                    "{} {banner} says hello to {}",
                    Status::Ok,
                    helo.id
                )]),
                Event::ConnectionKeepAlive,
            ),
            State::AuthChallenge(_) => (
                Some(vec![format!("{} ", Status::AuthContinue)]),
                Event::ConnectionKeepAlive,
            ),
            State::MailFrom(_) | State::RcptTo(_) => (
                Some(vec![format!("{} Ok", Status::Ok)]),
                Event::ConnectionKeepAlive,
            ),
            State::Quit(_) => (
                Some(vec![format!("{} {banner} closing connection", Status::GoodBye)]),
                Event::ConnectionClose,
            ),
            State::Close(_) => (
                Some(vec![format!(
                    "{} {banner} Service shutting down",
                    Status::Unavailable
                )]),
                Event::ConnectionClose,
            ),
            State::AuthResponse(_)
            | State::Data(_)
            | State::Reading(_)
            | State::PostDot(_)
            | State::Reply(_) => (None, Event::ConnectionKeepAlive),
        }
    }

    /// Multi-line EHLO reply: greeting, then one line per extension
    fn ehlo_response(&self, id: &str) -> Vec<String> {
        let mut lines = vec![format!("{} greets {id}", self.config.banner)];
        lines.extend(self.config.extensions.iter().map(ToString::to_string));

        let last = lines.len() - 1;
        lines
            .into_iter()
            .enumerate()
            .map(|(ix, line)| {
                let separator = if ix == last { ' ' } else { '-' };
                format!("{}{separator}{line}", Status::Ok)
            })
            .collect()
    }

    /// Reply to DATA and start reading the message
    fn data_response(&mut self) -> Response {
        self.state = State::Reading(Reading);
        self.message.clear();
        self.oversized = false;
        self.at_line_start = true;

        (
            Some(vec![format!(
                "{} End data with <CR><LF>.<CR><LF>",
                Status::StartMailInput
            )]),
            Event::ConnectionKeepAlive,
        )
    }
}
