//! Notification endpoint that records what the relay posts to it
#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use mailpush_delivery::Notification;
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};

type Received = Arc<Mutex<Vec<(String, Notification)>>>;

pub struct MockNotifyServer {
    address: SocketAddr,
    received: Received,
    handle: JoinHandle<()>,
}

impl MockNotifyServer {
    pub async fn start() -> std::io::Result<Self> {
        let received = Received::default();

        let app = Router::new()
            .route("/notify/{key}", post(notify))
            .with_state(Arc::clone(&received));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            address,
            received,
            handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/notify", self.address)
    }

    pub async fn received(&self) -> Vec<(String, Notification)> {
        let mut received = self.received.lock().await.clone();
        received.sort_by(|a, b| a.0.cmp(&b.0));
        received
    }

    /// Wait until at least `count` notifications arrived, or `timeout` passed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<(String, Notification)> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let received = self.received().await;
            if received.len() >= count || tokio::time::Instant::now() >= deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for MockNotifyServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn notify(
    State(received): State<Received>,
    Path(key): Path<String>,
    Json(notification): Json<Notification>,
) -> StatusCode {
    received.lock().await.push((key, notification));
    StatusCode::OK
}
