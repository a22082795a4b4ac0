//! Outbound HTTP delivery.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use mailpush_common::internal;
use reqwest::header::CONTENT_TYPE;

use crate::{
    error::{AttemptError, DeliveryError},
    policy::RetryPolicy,
};

/// Something that can make a single delivery attempt.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// POST `payload` as JSON to `url`. Any outcome other than a 2xx response
    /// is an error.
    async fn post(&self, url: &str, payload: &[u8]) -> Result<(), AttemptError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    ///
    /// Create a transport whose requests give up after `timeout`
    ///
    /// # Errors
    /// If the HTTP client cannot be initialised (e.g. no TLS backend)
    ///
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mailpush/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, payload: &[u8]) -> Result<(), AttemptError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AttemptError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

///
/// Deliver `payload` to `url`, retrying with backoff according to `policy`.
///
/// There is no delay after the final attempt. Returns the number of attempts
/// used on success.
///
/// # Errors
/// [`DeliveryError::Exhausted`] carrying the last attempt's error once every
/// attempt has failed
///
#[tracing::instrument(level = "debug", skip(transport, payload, policy))]
pub async fn deliver(
    transport: &dyn Transport,
    url: &str,
    payload: &[u8],
    policy: &RetryPolicy,
) -> Result<u32, DeliveryError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match transport.post(url, payload).await {
            Ok(()) => return Ok(attempt),
            Err(err) if policy.should_retry(attempt) => {
                let delay = policy.backoff(attempt);
                internal!(
                    level = WARN,
                    "Attempt {attempt}/{max_attempts} to {url} failed: {err}, retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(last) => {
                return Err(DeliveryError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last,
                });
            }
        }
    }
}
