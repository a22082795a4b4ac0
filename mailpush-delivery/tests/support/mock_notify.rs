//! Mock notification endpoint for testing delivery
//!
//! Serves `POST /notify/{key}` and records every request. The server can be
//! told to fail a number of requests before succeeding, to exercise retries.
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    routing::post,
};
use mailpush_delivery::Notification;
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};

/// A request the mock endpoint accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub key: String,
    pub content_type: Option<String>,
    pub notification: Notification,
}

#[derive(Debug, Default)]
struct MockState {
    received: Mutex<Vec<Received>>,
    requests: AtomicUsize,
    failures_remaining: AtomicUsize,
    failure_status: AtomicUsize,
}

pub struct MockNotifyServer {
    address: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockNotifyServer {
    pub fn builder() -> MockNotifyServerBuilder {
        MockNotifyServerBuilder::default()
    }

    /// Base URL rules are resolved against, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}/notify", self.address)
    }

    pub async fn received(&self) -> Vec<Received> {
        self.state.received.lock().await.clone()
    }

    /// Every request seen, including deliberately failed ones
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` notifications have been accepted
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Received> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let received = self.received().await;
            if received.len() >= count || tokio::time::Instant::now() >= deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for MockNotifyServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Default)]
pub struct MockNotifyServerBuilder {
    failures: usize,
    failure_status: Option<StatusCode>,
}

impl MockNotifyServerBuilder {
    /// Answer the first `failures` requests with an error status
    pub const fn with_failures(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    pub const fn with_failure_status(mut self, status: StatusCode) -> Self {
        self.failure_status = Some(status);
        self
    }

    pub async fn build(self) -> std::io::Result<MockNotifyServer> {
        let state = Arc::new(MockState {
            failures_remaining: AtomicUsize::new(self.failures),
            failure_status: AtomicUsize::new(usize::from(
                self.failure_status
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                    .as_u16(),
            )),
            ..MockState::default()
        });

        let app = Router::new()
            .route("/notify/{key}", post(notify))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(MockNotifyServer {
            address,
            state,
            handle,
        })
    }
}

async fn notify(
    State(state): State<Arc<MockState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let fail = state
        .failures_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if fail {
        let status = u16::try_from(state.failure_status.load(Ordering::SeqCst)).unwrap_or(500);
        return StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let Ok(notification) = serde_json::from_slice::<Notification>(&body) else {
        return StatusCode::BAD_REQUEST;
    };

    state.received.lock().await.push(Received {
        key,
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        notification,
    });

    StatusCode::OK
}
