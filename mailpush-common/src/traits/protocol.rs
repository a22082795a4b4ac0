use std::{fmt::Debug, future::Future, net::SocketAddr};

use tokio::{net::TcpStream, sync::broadcast::Receiver};

use crate::{Signal, error::SessionError};

pub trait SessionHandler {
    fn run(self, signal: Receiver<Signal>) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// A protocol that can be served by a [`crate::listener::Listener`].
///
/// `Args` carries the shared runtime resources every session of the protocol
/// needs, and is cloned once per accepted connection.
pub trait Protocol: Send + Sync {
    type Session: SessionHandler + Send + 'static;
    type Args: Clone + Debug + Send + Sync;

    fn handle(&self, stream: TcpStream, peer: SocketAddr, args: Self::Args) -> Self::Session;

    fn ty() -> &'static str;
}
