//! # XML-RPC Transport
//!
//! Carries an encoded call to an endpoint and brings back the raw body.
//! The trait is the seam the ERP client is tested through.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::retry::{with_retry, RetryPolicy};

/// Request timeout for ERP calls.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(12);

/// Retry policy for ERP calls.
pub const RPC_RETRY: RetryPolicy = RetryPolicy::new(2, Duration::from_millis(200));

/// Posts XML-RPC documents.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Posts `body` to `url` and returns the response body.
    ///
    /// Non-2xx answers are `SyncError::Remote`; connection failures and
    /// timeouts are `SyncError::Transport`.
    async fn post(&self, url: &str, body: String) -> SyncResult<String>;
}

/// [`RpcTransport`] over reqwest.
#[derive(Debug, Clone)]
pub struct HttpRpcTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpRpcTransport {
    pub fn new() -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(HttpRpcTransport {
            client,
            retry: RPC_RETRY,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post_once(&self, url: &str, body: &str) -> SyncResult<String> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body.to_owned())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(SyncError::remote(Some(status.as_u16()), &text));
        }

        Ok(text)
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn post(&self, url: &str, body: String) -> SyncResult<String> {
        debug!(%url, bytes = body.len(), "XML-RPC call");
        let body = body.as_str();
        with_retry("xmlrpc", self.retry, move || self.post_once(url, body)).await
    }
}
