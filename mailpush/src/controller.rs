use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use mailpush_common::{Signal, internal, listener::Listener, logging};
use mailpush_delivery::{Dispatcher, HttpTransport, Transport};
use mailpush_smtp::{ForwardingHandler, SessionConfig, Smtp, SmtpArgs};
use mailpush_store::{FileMappingStore, MappingStore};
use tokio::{sync::broadcast, task::JoinHandle};

use crate::config::Config;

/// Owns the process: the rule store, the dispatcher and the SMTP listener
#[derive(Debug)]
pub struct Mailpush {
    config: Config,
}

/// A started relay, stopped with [`Running::shutdown`]
#[derive(Debug)]
pub struct Running {
    address: SocketAddr,
    shutdown: broadcast::Sender<Signal>,
    listener: JoinHandle<()>,
    dispatcher: Arc<Dispatcher>,
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            r?;
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    Ok(())
}

impl Mailpush {
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until SIGINT or SIGTERM, then shut down gracefully
    ///
    /// # Errors
    ///
    /// If the data directory or rule store cannot be opened, the listen
    /// address cannot be bound, or a running component fails.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init(self.config.log_level.as_deref());

        let running = self.start().await?;
        internal!(level = INFO, "Controller running");

        shutdown_signal().await?;

        internal!(level = INFO, "Shutting down...");
        running.shutdown().await
    }

    /// Open the store, start the dispatcher and begin accepting connections
    ///
    /// # Errors
    ///
    /// If any component fails to initialise
    #[tracing::instrument(level = "trace", skip_all, err)]
    pub async fn start(self) -> anyhow::Result<Running> {
        let config = self.config;

        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("Unable to create {}", config.data_dir.display()))?;

        let store: Arc<dyn MappingStore> = Arc::new(
            FileMappingStore::open(config.store_path())
                .await
                .context("Unable to open the rule store")?,
        );

        let transport: Arc<dyn Transport> = Arc::new(
            HttpTransport::new(config.request_timeout())
                .context("Unable to build the notification client")?,
        );
        let dispatcher = Arc::new(Dispatcher::new(config.dispatcher(), transport));

        if config.credentials().is_none() {
            internal!(
                level = WARN,
                "ADMIN_USER/ADMIN_PASS are not set, every AUTH attempt will be refused"
            );
        }

        let handler = ForwardingHandler::new(
            store,
            Arc::clone(&dispatcher),
            config.apprise_url.trim_end_matches('/'),
        );
        let session = SessionConfig::builder(Arc::new(handler))
            .with_banner(config.hostname.as_str())
            .with_extensions(config.extensions())
            .with_credentials(config.credentials())
            .build();

        let listener = Listener::bind(config.listen, Smtp, SmtpArgs::new(session)).await?;
        let address = listener.local_addr()?;

        let (shutdown, receiver) = broadcast::channel(1);
        let listener = tokio::spawn(listener.serve(receiver));

        Ok(Running {
            address,
            shutdown,
            listener,
            dispatcher,
        })
    }
}

impl Running {
    pub const fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Stop accepting mail, let open sessions finish, then drain the queue
    ///
    /// # Errors
    ///
    /// If the listener task panicked
    pub async fn shutdown(self) -> anyhow::Result<()> {
        // No receivers only means the listener has already stopped
        let _ = self.shutdown.send(Signal::Shutdown);

        let served = self.listener.await.context("SMTP listener panicked");
        self.dispatcher.close().await;

        served
    }
}
