use core::fmt::{self, Display, Formatter};

use mailpush_common::{internal, status::Status};

use crate::{
    auth::PLAIN,
    command::{Command, HeloVariant},
    session_state::SessionState,
};

/// Initial connection state - client just connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connect;

/// After successful EHLO command (extended SMTP)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ehlo {
    pub id: String,
}

/// After successful HELO command (basic SMTP)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Helo {
    pub id: String,
}

/// `AUTH PLAIN` without an initial response; a `334` is owed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthChallenge;

/// A `PLAIN` response waiting to be verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub response: String,
}

/// After MAIL FROM command (beginning of mail transaction)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailFrom {
    pub sender: Option<String>,
}

/// After RCPT TO command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcptTo {
    pub recipient: String,
}

/// After DATA command (ready to receive message body)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Data;

/// Reading message data (after DATA command, before end-of-data marker)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading;

/// After end-of-data marker (.\r\n), message complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostDot;

/// A one-off reply, after which the session continues in `next`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub message: String,
    pub next: Box<State>,
}

/// Client issued QUIT command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quit;

/// Connection closing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Close;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Connect(Connect),
    Ehlo(Ehlo),
    Helo(Helo),
    AuthChallenge(AuthChallenge),
    AuthResponse(AuthResponse),
    MailFrom(MailFrom),
    RcptTo(RcptTo),
    Data(Data),
    Reading(Reading),
    PostDot(PostDot),
    Reply(Reply),
    Quit(Quit),
    Close(Close),
}

impl Default for State {
    fn default() -> Self {
        Self::Connect(Connect)
    }
}

impl Display for State {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            Self::Reading(_) | Self::PostDot(_) => "",
            Self::Connect(_) => "Connect",
            Self::Close(_) => "Close",
            Self::Ehlo(_) => "EHLO",
            Self::Helo(_) => "HELO",
            Self::AuthChallenge(_) | Self::AuthResponse(_) => "AUTH",
            Self::MailFrom(_) => "MAIL",
            Self::RcptTo(_) => "RCPT",
            Self::Data(_) => "DATA",
            Self::Reply(_) => "Reply",
            Self::Quit(_) => "QUIT",
        })
    }
}

impl State {
    pub fn reply(status: Status, message: impl Into<String>, next: Self) -> Self {
        Self::Reply(Reply {
            status,
            message: message.into(),
            next: Box::new(next),
        })
    }

    /// The state a pending reply continues in
    #[must_use]
    pub fn settle(self) -> Self {
        match self {
            Self::Reply(reply) => *reply.next,
            state => state,
        }
    }

    /// Transition from current state based on received command.
    ///
    /// Pure over `ctx`: nothing here touches the network, the rule store or
    /// the dispatcher. Anything the client got wrong becomes a [`Reply`] that
    /// leaves the session where it was.
    #[must_use]
    pub fn transition(self, command: Command, ctx: &mut SessionState) -> Self {
        match (self.settle(), command) {
            (_, Command::Quit) => Self::Quit(Quit),
            (state, Command::Noop) => Self::reply(Status::Ok, "Ok", state),

            (_, Command::Helo(variant)) => {
                ctx.reset_transaction();

                match variant {
                    HeloVariant::Ehlo(id) => {
                        ctx.id.clone_from(&id);
                        ctx.extended = true;
                        Self::Ehlo(Ehlo { id })
                    }
                    HeloVariant::Helo(id) => {
                        ctx.id.clone_from(&id);
                        ctx.extended = false;
                        Self::Helo(Helo { id })
                    }
                }
            }

            (Self::Connect(_), Command::Rset) => {
                Self::reply(Status::Ok, "Ok", Self::Connect(Connect))
            }
            (_, Command::Rset) => {
                ctx.reset_transaction();
                Self::reply(Status::Ok, "Ok", ctx.ready_state())
            }

            (state, Command::Auth { mechanism, initial }) => {
                Self::authenticate(state, &mechanism, initial, ctx)
            }

            (state @ Self::Connect(_), Command::MailFrom(..)) => Self::reply(
                Status::InvalidCommandSequence,
                "Send HELO/EHLO first",
                state,
            ),
            (state, Command::MailFrom(sender, params)) if state.is_ready() => {
                match params.size() {
                    Some(size) if ctx.exceeds_limit(size) => Self::reply(
                        Status::ExceededStorage,
                        format!(
                            "Declared message size {size} exceeds maximum {}",
                            ctx.max_message_size
                        ),
                        state,
                    ),
                    _ => {
                        ctx.reset_transaction();
                        ctx.sender.clone_from(&sender);
                        Self::MailFrom(MailFrom { sender })
                    }
                }
            }
            (state, Command::MailFrom(..)) => {
                Self::reply(Status::InvalidCommandSequence, "Nested MAIL command", state)
            }

            (Self::MailFrom(_) | Self::RcptTo(_), Command::RcptTo(recipient)) => {
                if let Some(previous) = ctx.recipient.replace(recipient.clone()) {
                    internal!(
                        level = WARN,
                        "Only one recipient per transaction is supported, \
                         {recipient} replaces {previous}"
                    );
                }

                Self::RcptTo(RcptTo { recipient })
            }
            (state, Command::RcptTo(_)) => Self::reply(
                Status::InvalidCommandSequence,
                "Need MAIL before RCPT",
                state,
            ),

            (Self::RcptTo(_), Command::Data) if !ctx.authenticated => {
                ctx.reset_transaction();
                Self::reply(
                    Status::AuthRequired,
                    "Authentication required",
                    ctx.ready_state(),
                )
            }
            (Self::RcptTo(_), Command::Data) => Self::Data(Data),
            (state, Command::Data) => Self::reply(
                Status::InvalidCommandSequence,
                "Need RCPT before DATA",
                state,
            ),

            (state, Command::Invalid(reason)) => Self::reply(Status::ArgumentError, reason, state),
            (state, Command::Unknown(_)) => {
                Self::reply(Status::SyntaxError, "Command not recognized", state)
            }
        }
    }

    fn authenticate(
        state: Self,
        mechanism: &str,
        initial: Option<String>,
        ctx: &SessionState,
    ) -> Self {
        if !ctx.extended || matches!(state, Self::Connect(_)) {
            return Self::reply(Status::InvalidCommandSequence, "Send EHLO first", state);
        }

        if !state.is_ready() {
            return Self::reply(
                Status::InvalidCommandSequence,
                "AUTH not permitted during a mail transaction",
                state,
            );
        }

        if ctx.authenticated {
            return Self::reply(Status::InvalidCommandSequence, "Already authenticated", state);
        }

        if !mechanism.eq_ignore_ascii_case(PLAIN) {
            return Self::reply(
                Status::MechanismUnsupported,
                "Unrecognized authentication type",
                state,
            );
        }

        initial.map_or(Self::AuthChallenge(AuthChallenge), |response| {
            Self::AuthResponse(AuthResponse { response })
        })
    }

    /// Between transactions, with a greeting done
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ehlo(_) | Self::Helo(_))
    }

    /// Check if this state should close the connection
    #[must_use]
    pub const fn should_close(&self) -> bool {
        matches!(self, Self::Quit(_) | Self::Close(_))
    }
}
