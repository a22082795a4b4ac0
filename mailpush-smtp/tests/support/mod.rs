//! Shared fixtures for SMTP integration tests
#![allow(dead_code, clippy::unwrap_used)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use mailpush_common::{Signal, listener::Listener, rule::ForwardingRule};
use mailpush_delivery::{AttemptError, Dispatcher, DispatcherConfig, Notification, Transport};
use mailpush_smtp::{
    Credentials, Extension, ForwardingHandler, SessionConfig, Smtp, SmtpArgs,
};
use mailpush_store::MemoryMappingStore;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::broadcast,
    task::JoinHandle,
};

pub const BASE_URL: &str = "http://apprise:8000/notify";
pub const USER: &str = "admin";
pub const PASS: &str = "secret";

/// A transport that records every POST instead of sending it
#[derive(Debug, Default)]
pub struct RecordingTransport {
    posts: Mutex<Vec<(String, Notification)>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, url: &str, payload: &[u8]) -> Result<(), AttemptError> {
        let notification = serde_json::from_slice(payload).unwrap();
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), notification));
        Ok(())
    }
}

impl RecordingTransport {
    /// Every recorded POST, ordered by URL
    pub fn posts(&self) -> Vec<(String, Notification)> {
        let mut posts = self.posts.lock().unwrap().clone();
        posts.sort_by(|a, b| a.0.cmp(&b.0));
        posts
    }
}

/// A running relay: SMTP listener, in-memory rules and a recording dispatcher
pub struct Relay {
    pub address: SocketAddr,
    pub transport: Arc<RecordingTransport>,
    pub dispatcher: Arc<Dispatcher>,
    shutdown: broadcast::Sender<Signal>,
    listener: JoinHandle<()>,
}

impl Relay {
    pub async fn start(rules: Vec<ForwardingRule>) -> Self {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Arc::new(Dispatcher::new(
            DispatcherConfig::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
        ));
        let handler = ForwardingHandler::new(
            Arc::new(MemoryMappingStore::with_rules(rules)),
            Arc::clone(&dispatcher),
            BASE_URL,
        );

        let config = SessionConfig::builder(Arc::new(handler))
            .with_banner("relay.test")
            .with_credentials(Some(Credentials::new(USER, PASS)))
            .with_extensions(vec![Extension::Auth, Extension::Size(1024 * 1024)])
            .build();

        let listener = Listener::bind(
            "127.0.0.1:0".parse().unwrap(),
            Smtp,
            SmtpArgs::new(config),
        )
        .await
        .unwrap();
        let address = listener.local_addr().unwrap();

        let (shutdown, receiver) = broadcast::channel(1);
        let listener = tokio::spawn(listener.serve(receiver));

        Self {
            address,
            transport,
            dispatcher,
            shutdown,
            listener,
        }
    }

    pub async fn connect(&self) -> SmtpTestClient {
        SmtpTestClient::connect(self.address).await
    }

    /// Stop accepting, finish sessions, then drain the dispatcher
    pub async fn stop(self) -> Arc<RecordingTransport> {
        self.shutdown.send(Signal::Shutdown).unwrap();
        self.listener.await.unwrap();
        self.dispatcher.close().await;
        self.transport
    }
}

/// A raw line-oriented SMTP client
pub struct SmtpTestClient {
    stream: BufReader<TcpStream>,
}

impl SmtpTestClient {
    pub async fn connect(address: SocketAddr) -> Self {
        let mut client = Self {
            stream: BufReader::new(TcpStream::connect(address).await.unwrap()),
        };

        assert_eq!(client.code().await, 220, "Expected a greeting");
        client
    }

    /// Read one complete reply, joining continuation lines
    pub async fn reply(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        loop {
            let mut line = String::new();
            self.stream.read_line(&mut line).await.unwrap();
            let line = line.trim_end().to_string();
            let done = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line);

            if done {
                return lines;
            }
        }
    }

    pub async fn code(&mut self) -> u16 {
        self.reply().await.last().unwrap()[..3].parse().unwrap()
    }

    pub async fn send(&mut self, line: &str) {
        self.stream
            .get_mut()
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    pub async fn command(&mut self, line: &str) -> u16 {
        self.send(line).await;
        self.code().await
    }

    pub async fn ehlo(&mut self) -> Vec<String> {
        self.send("EHLO client.test").await;
        self.reply().await
    }

    pub async fn login(&mut self) -> u16 {
        let response = STANDARD.encode(format!("\0{USER}\0{PASS}"));
        self.command(&format!("AUTH PLAIN {response}")).await
    }

    /// Send a whole message with dot-stuffing, returning the final reply code
    pub async fn data(&mut self, message: &str) -> u16 {
        assert_eq!(self.command("DATA").await, 354);

        for line in message.split("\r\n") {
            if line.starts_with('.') {
                self.send(&format!(".{line}")).await;
            } else {
                self.send(line).await;
            }
        }

        self.command(".").await
    }
}
