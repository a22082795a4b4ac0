//! SMTP ingestion for mailpush.
//!
//! Each accepted connection runs a [`Session`]: a pure [`State`] machine over
//! parsed [`command::Command`]s, with authentication and message handling
//! applied between transitions. Completed messages go to a
//! [`TransactionHandler`], normally the [`ForwardingHandler`] which turns them
//! into push notifications.

pub mod auth;
pub mod command;
pub mod connection;
pub mod error;
pub mod extensions;
pub mod fsm;
pub mod session;
pub mod session_state;
pub mod state;
pub mod transaction_handler;

use std::{future::Future, net::SocketAddr, sync::Arc};

use mailpush_common::{
    Signal,
    error::SessionError,
    traits::protocol::{Protocol, SessionHandler},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::broadcast::Receiver,
};

pub use crate::{
    auth::Credentials,
    extensions::Extension,
    session::{Session, SessionConfig},
    state::State,
    transaction_handler::{Disposition, ForwardingHandler, TransactionHandler},
};

mod defaults {
    pub const fn command_secs() -> u64 {
        300
    }

    pub const fn data_block_secs() -> u64 {
        180
    }

    pub const fn connection_secs() -> u64 {
        1800
    }
}

/// Session timeouts in seconds, after RFC 5321 Section 4.5.3.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Waiting for the next command
    pub command_secs: u64,
    /// Waiting for the next line of a message
    pub data_block_secs: u64,
    /// Total lifetime of a connection
    pub connection_secs: u64,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            command_secs: defaults::command_secs(),
            data_block_secs: defaults::data_block_secs(),
            connection_secs: defaults::connection_secs(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Smtp;

/// Shared by every session a listener starts
#[derive(Clone, Debug)]
pub struct SmtpArgs {
    config: Arc<SessionConfig>,
}

impl SmtpArgs {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

}

impl Protocol for Smtp {
    type Session = Session<TcpStream>;
    type Args = SmtpArgs;

    fn ty() -> &'static str {
        "SMTP"
    }

    fn handle(&self, stream: TcpStream, peer: SocketAddr, args: Self::Args) -> Self::Session {
        Session::create(stream, peer, args.config)
    }
}

impl<Stream> SessionHandler for Session<Stream>
where
    Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    fn run(
        self,
        signal: Receiver<Signal>,
    ) -> impl Future<Output = Result<(), SessionError>> + Send {
        Self::run(self, signal)
    }
}
