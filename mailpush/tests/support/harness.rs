//! Starts a complete relay against a mock notification endpoint
#![allow(dead_code, clippy::unwrap_used)]

use std::{net::SocketAddr, path::Path};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::Parser;
use mailpush::{Config, Mailpush, Running};
use mailpush_common::rule::ForwardingRule;
use mailpush_store::{FileMappingStore, MappingStore};
use tempfile::TempDir;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};

use super::mock_notify::MockNotifyServer;

pub const USER: &str = "admin";
pub const PASS: &str = "secret";

pub struct E2ETestHarness {
    pub mock: MockNotifyServer,
    running: Running,
    data_dir: TempDir,
}

#[derive(Default)]
pub struct E2ETestHarnessBuilder {
    rules: Vec<ForwardingRule>,
    max_message_size: Option<usize>,
}

impl E2ETestHarnessBuilder {
    pub fn with_rule(mut self, rule: ForwardingRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    pub async fn build(self) -> E2ETestHarness {
        let mock = MockNotifyServer::start().await.unwrap();
        let data_dir = tempfile::tempdir().unwrap();

        let config = Config::try_parse_from([
            "mailpush".to_string(),
            "--listen".to_string(),
            "127.0.0.1:0".to_string(),
            "--apprise-url".to_string(),
            mock.base_url(),
            "--data-dir".to_string(),
            data_dir.path().display().to_string(),
            "--admin-user".to_string(),
            USER.to_string(),
            "--admin-pass".to_string(),
            PASS.to_string(),
            "--max-message-size".to_string(),
            self.max_message_size.unwrap_or(1024 * 1024).to_string(),
        ])
        .unwrap();

        let store = FileMappingStore::open(config.store_path()).await.unwrap();
        for rule in self.rules {
            store.insert(rule).await.unwrap();
        }
        drop(store);

        let running = Mailpush::new(config).start().await.unwrap();

        E2ETestHarness {
            mock,
            running,
            data_dir,
        }
    }
}

impl E2ETestHarness {
    pub fn builder() -> E2ETestHarnessBuilder {
        E2ETestHarnessBuilder::default()
    }

    pub const fn smtp_addr(&self) -> SocketAddr {
        self.running.local_addr()
    }

    pub async fn client(&self) -> SmtpClient {
        SmtpClient::connect(self.smtp_addr()).await
    }

    /// Authenticate and send one message, returning the code for the body
    pub async fn send_email(&self, recipient: &str, message: &str) -> u16 {
        let mut client = self.client().await;

        assert_eq!(client.command("EHLO client.test").await, 250);
        assert_eq!(client.login().await, 235);
        assert_eq!(client.command("MAIL FROM:<sender@example.org>").await, 250);
        assert_eq!(client.command(&format!("RCPT TO:<{recipient}>")).await, 250);
        assert_eq!(client.command("DATA").await, 354);
        for line in message.split("\r\n") {
            client.send(line).await;
        }
        let code = client.command(".").await;
        assert_eq!(client.command("QUIT").await, 221);

        code
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    /// Stop the relay, handing back the data directory so it outlives the run
    pub async fn shutdown(self) -> TempDir {
        self.running.shutdown().await.unwrap();
        self.data_dir
    }
}

pub struct SmtpClient {
    stream: BufReader<TcpStream>,
}

impl SmtpClient {
    pub async fn connect(address: SocketAddr) -> Self {
        let mut client = Self {
            stream: BufReader::new(TcpStream::connect(address).await.unwrap()),
        };
        assert_eq!(client.code().await, 220);
        client
    }

    pub async fn code(&mut self) -> u16 {
        loop {
            let mut line = String::new();
            self.stream.read_line(&mut line).await.unwrap();
            if line.as_bytes().get(3) != Some(&b'-') {
                return line[..3].parse().unwrap();
            }
        }
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

    pub async fn login(&mut self) -> u16 {
        let response = STANDARD.encode(format!("\0{USER}\0{PASS}"));
        self.command(&format!("AUTH PLAIN {response}")).await
    }
}
