use std::{io, net::SocketAddr, time::Duration};

use futures_util::future::join_all;
use tokio::{
    net::TcpListener,
    sync::broadcast::{Receiver, error::RecvError},
};

use crate::{
    Signal,
    error::ListenerError,
    internal,
    traits::protocol::{Protocol, SessionHandler},
};

/// A bound TCP socket serving a single [`Protocol`].
pub struct Listener<Proto: Protocol> {
    handler: Proto,
    listener: TcpListener,
    args: Proto::Args,
}

impl<Proto: Protocol> Listener<Proto> {
    ///
    /// Bind `socket` for `handler`. Binding happens eagerly so that a port
    /// conflict is reported before anything else is started.
    ///
    /// # Errors
    /// If the socket cannot be bound
    ///
    pub async fn bind(
        socket: SocketAddr,
        handler: Proto,
        args: Proto::Args,
    ) -> Result<Self, ListenerError> {
        let listener =
            TcpListener::bind(socket)
                .await
                .map_err(|source| ListenerError::BindFailed {
                    address: socket.to_string(),
                    source,
                })?;

        internal!(
            level = INFO,
            "{} listener bound to {}",
            Proto::ty(),
            listener.local_addr().unwrap_or(socket)
        );

        Ok(Self {
            handler,
            listener,
            args,
        })
    }

    /// The address actually bound, useful when binding port 0
    ///
    /// # Errors
    /// If the underlying socket has gone away
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    ///
    /// Accept connections until a shutdown signal arrives, then wait for every
    /// session that is still running.
    ///
    /// A failed `accept` is logged and the loop carries on, pausing first when
    /// the process is out of file descriptors.
    ///
    #[tracing::instrument(level = "trace", skip_all, fields(protocol = Proto::ty()))]
    pub async fn serve(self, mut shutdown: Receiver<Signal>) {
        let mut sessions = Vec::default();

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    if matches!(sig, Ok(Signal::Shutdown) | Err(RecvError::Closed)) {
                        internal!(
                            level = INFO,
                            "{} listener received shutdown signal, finishing {} sessions ...",
                            Proto::ty(),
                            sessions.len()
                        );
                        join_all(sessions).await;
                        return;
                    }
                }

                connection = self.listener.accept() => {
                    let (stream, peer) = match connection {
                        Ok(connection) => connection,
                        Err(err) => {
                            internal!(level = ERROR, "Error accepting connection: {err}");
                            tokio::time::sleep(accept_pause(&err)).await;
                            continue;
                        }
                    };
                    internal!(level = DEBUG, "Connection received from {peer}");

                    let session = self.handler.handle(stream, peer, self.args.clone());
                    let signal = shutdown.resubscribe();

                    sessions.retain(|handle: &tokio::task::JoinHandle<()>| !handle.is_finished());
                    sessions.push(tokio::spawn(async move {
                        if let Err(err) = session.run(signal).await {
                            if err.is_client_error() {
                                internal!(level = WARN, "Session with {peer} ended: {err}");
                            } else {
                                internal!(level = ERROR, "Session with {peer} failed: {err}");
                            }
                        }
                    }));
                }
            }
        }
    }
}

/// How long to wait before accepting again after `err`.
///
/// A connection that died before it was accepted only affects that peer, but
/// running out of descriptors would fail every retry until sessions close.
fn accept_pause(err: &io::Error) -> Duration {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted => Duration::ZERO,
        _ => Duration::from_secs(1),
    }
}
