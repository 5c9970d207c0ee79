//! HTTP transport for peer bootstrap calls
//!
//! A thin wrapper over a pooled reqwest client. The one job of this
//! layer beyond issuing the request is classification: a send-level
//! failure (refused connection, timeout, DNS) is reported as
//! [`CallError::Network`], while a response that arrived but carried an
//! error status is [`CallError::Status`]. Callers branch on that
//! distinction to decide between retrying and aborting.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, ClientBuilder, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::error::{BootstrapError, BootstrapResult};

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Enable TLS certificate verification
    pub verify_tls: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            verify_tls: true,
        }
    }
}

/// Failure modes of a single peer call.
#[derive(Error, Debug)]
pub enum CallError {
    /// The request never produced a response; the peer is treated as
    /// offline and the call may be retried.
    #[error("network error: {0}")]
    Network(String),

    /// The peer responded with a non-success status. The peer is
    /// reachable, so this is not retryable.
    #[error("unexpected status {status}")]
    Status { status: StatusCode },
}

/// Pooled HTTP client shared by all peer clients of one node.
pub struct PeerTransport {
    client: Client,
    config: TransportConfig,
}

impl PeerTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: TransportConfig) -> BootstrapResult<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| BootstrapError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Issue one empty-bodied POST and return the raw response body.
    /// Decoding belongs to the caller.
    pub async fn call(&self, url: &str) -> Result<Bytes, CallError> {
        debug!("bootstrap call to {}", url);

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| CallError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CallError::Status {
                status: response.status(),
            });
        }

        // A body that dies mid-stream is a reachability problem.
        response
            .bytes()
            .await
            .map_err(|e| CallError::Network(e.to_string()))
    }
}

impl std::fmt::Debug for PeerTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerTransport")
            .field("config", &self.config)
            .finish()
    }
}
