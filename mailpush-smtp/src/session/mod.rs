use std::{net::SocketAddr, sync::Arc, time::Duration};

use mailpush_common::{Signal, error::SessionError, internal, outgoing, status::Status};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::broadcast::Receiver,
    time::Instant,
};

use crate::{
    SessionTimeouts,
    auth::Credentials,
    connection::Connection,
    extensions::Extension,
    session_state::SessionState,
    state::{Close, State},
    transaction_handler::TransactionHandler,
};

// Submodules containing implementation details
mod events;
mod io;
mod response;

#[derive(PartialEq, Eq, Debug)]
pub enum Event {
    ConnectionClose,
    ConnectionKeepAlive,
}

pub type Response = (Option<Vec<String>>, Event);

/// Longest command line read in one piece. `AUTH` responses may be up to
/// 12288 octets (RFC 4954).
const COMMAND_LINE_LIMIT: usize = 16 * 1024;

/// Message lines longer than this are buffered in pieces
const DATA_LINE_LIMIT: usize = 64 * 1024;

#[derive(Debug)]
pub struct SessionConfig {
    pub extensions: Vec<Extension>,
    /// The only identity `AUTH` accepts; `None` refuses every attempt
    pub credentials: Option<Credentials>,
    pub handler: Arc<dyn TransactionHandler>,
    pub banner: String,
    pub timeouts: SessionTimeouts,
}

impl SessionConfig {
    /// Create a new `SessionConfig` builder around the handler that receives
    /// completed messages
    #[must_use]
    pub fn builder(handler: Arc<dyn TransactionHandler>) -> SessionConfigBuilder {
        SessionConfigBuilder {
            extensions: Vec::new(),
            credentials: None,
            handler,
            banner: String::new(),
            timeouts: SessionTimeouts::default(),
        }
    }

    /// Maximum message size from the SIZE extension, zero when unlimited
    #[must_use]
    pub fn max_message_size(&self) -> usize {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Size(size) => Some(*size),
                Extension::Auth => None,
            })
            .unwrap_or(0)
    }
}

/// Builder for `SessionConfig`
#[derive(Debug)]
pub struct SessionConfigBuilder {
    extensions: Vec<Extension>,
    credentials: Option<Credentials>,
    handler: Arc<dyn TransactionHandler>,
    banner: String,
    timeouts: SessionTimeouts,
}

impl SessionConfigBuilder {
    /// Set the SMTP extensions advertised in the EHLO response
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<Extension>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Set the identity `AUTH PLAIN` must present
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the server banner hostname
    #[must_use]
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    /// Set the timeout configuration for this session
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Build the final `SessionConfig`
    #[must_use]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            extensions: self.extensions,
            credentials: self.credentials,
            handler: self.handler,
            banner: if self.banner.is_empty() {
                "localhost".to_string()
            } else {
                self.banner
            },
            timeouts: self.timeouts,
        }
    }
}

pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    peer: SocketAddr,
    pub(super) state: State,
    pub(super) session_state: SessionState,
    /// Body of the message being received
    pub(super) message: Vec<u8>,
    /// The current message grew past the size limit and is being discarded
    pub(super) oversized: bool,
    /// The last data chunk ended a line, so the next one starts a new line
    pub(super) at_line_start: bool,
    /// A command line ran past its limit and is being skipped to its end
    pub(super) overlong: bool,
    /// Whether the reply for the current state has been written
    pub(super) sent: bool,
    pub(super) config: Arc<SessionConfig>,
    pub(super) connection: Connection<Stream>,
    start_time: Instant,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    pub(crate) fn create(stream: Stream, peer: SocketAddr, config: Arc<SessionConfig>) -> Self {
        Self {
            peer,
            state: State::default(),
            session_state: SessionState::new(config.max_message_size()),
            message: Vec::new(),
            oversized: false,
            at_line_start: true,
            overlong: false,
            sent: false,
            config,
            connection: Connection::new(stream),
            start_time: Instant::now(),
        }
    }

    /// Idle timeout for the current state
    fn timeout_secs(&self) -> u64 {
        match self.state {
            State::Reading(_) => self.config.timeouts.data_block_secs,
            _ => self.config.timeouts.command_secs,
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(peer = %self.peer))]
    pub(crate) async fn run(mut self, mut signal: Receiver<Signal>) -> Result<(), SessionError> {
        internal!(level = DEBUG, "Connected");

        let result = self.drive(&mut signal).await;

        internal!(level = DEBUG, "Connection closed");
        result
    }

    async fn drive(&mut self, signal: &mut Receiver<Signal>) -> Result<(), SessionError> {
        loop {
            let lifetime = self.config.timeouts.connection_secs;
            if self.start_time.elapsed() >= Duration::from_secs(lifetime) {
                internal!(
                    level = WARN,
                    "Connection exceeded maximum lifetime of {lifetime}s, closing"
                );
                self.send_line(&format!("{} Connection lifetime exceeded", Status::Unavailable))
                    .await?;
                return Err(SessionError::Timeout(lifetime));
            }

            if self.respond().await? == Event::ConnectionClose {
                return Ok(());
            }

            let reading = matches!(self.state, State::Reading(_));
            let timeout_secs = self.timeout_secs();
            let limit = if reading {
                DATA_LINE_LIMIT
            } else {
                COMMAND_LINE_LIMIT
            };

            // A message already being received is allowed to complete
            let received = tokio::select! {
                _ = signal.recv(), if !reading => None,
                line = tokio::time::timeout(
                    Duration::from_secs(timeout_secs),
                    self.connection.receive_line(limit),
                ) => Some(line),
            };

            let Some(received) = received else {
                internal!(level = DEBUG, "Shutdown requested, closing session");
                self.state = State::Close(Close);
                self.sent = false;
                continue;
            };

            match received {
                Err(_) => {
                    internal!(
                        level = WARN,
                        "Client timed out after {timeout_secs}s in state {}",
                        self.state
                    );
                    self.send_line(&format!("{} Timeout waiting for input", Status::Unavailable))
                        .await?;
                    return Err(SessionError::Timeout(timeout_secs));
                }
                Ok(Err(err)) => return Err(err.into()),
                Ok(Ok(None)) => {
                    internal!(level = DEBUG, "Peer closed the connection");
                    return Ok(());
                }
                Ok(Ok(Some(line))) => self.receive(&line),
            }
        }
    }

    /// Run the business side of the current state, then write its reply
    async fn respond(&mut self) -> Result<Event, SessionError> {
        if self.sent {
            return Ok(Event::ConnectionKeepAlive);
        }

        self.emit().await;

        let (lines, event) = self.response();
        self.sent = true;

        for line in lines.unwrap_or_default() {
            self.send_line(&line).await?;
        }

        Ok(event)
    }

    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        outgoing!("{line}");
        self.connection.send(&line).await?;
        Ok(())
    }
}
