//! Per-peer verify client
//!
//! One [`PeerClient`] exists per distinct remote host. Its single
//! operation fetches the peer's topology snapshot and compares it
//! against the local one, classifying the result as verified, offline,
//! or fatal. The offline/fatal split is the load-bearing contract here:
//! the convergence loop retries offline peers forever but aborts node
//! startup on the first fatal outcome.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use wasiq_core::types::{ClusterTopology, Endpoint, TopologySnapshot};

use crate::error::BootstrapError;
use crate::server::VERIFY_PATH;
use crate::transport::{CallError, PeerTransport};

/// Signal that the local storage layer has already been brought up.
/// Once it has, bootstrap verification is moot and peers are treated
/// as verified without an RPC.
pub trait StorageState: Send + Sync {
    fn is_initialized(&self) -> bool;
}

impl StorageState for AtomicBool {
    fn is_initialized(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// Result of one verification attempt against one peer.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// Peer reachable and its snapshot matches ours.
    Verified,
    /// Peer unreachable; retry on a later round.
    Offline { reason: String },
    /// Peer reachable but incompatible; abort startup.
    Fatal(BootstrapError),
}

/// The seam the convergence loop drives. [`PeerClient`] is the real
/// implementation; tests substitute scripted ones.
#[async_trait]
pub trait PeerVerifier: Send + Sync {
    /// Display identity of the peer, used in logs and errors.
    fn peer(&self) -> &str;

    /// Fetch the peer's snapshot and compare it against `local`.
    async fn verify(&self, local: &TopologySnapshot) -> VerifyOutcome;
}

/// Handle to one remote peer's bootstrap endpoint.
pub struct PeerClient {
    peer: String,
    verify_url: String,
    transport: Arc<PeerTransport>,
    storage: Arc<dyn StorageState>,
}

impl PeerClient {
    pub fn new(
        endpoint: &Endpoint,
        transport: Arc<PeerTransport>,
        storage: Arc<dyn StorageState>,
    ) -> Self {
        Self {
            peer: endpoint.to_string(),
            verify_url: format!("{}://{}{}", endpoint.scheme(), endpoint.host(), VERIFY_PATH),
            transport,
            storage,
        }
    }
}

#[async_trait]
impl PeerVerifier for PeerClient {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn verify(&self, local: &TopologySnapshot) -> VerifyOutcome {
        if self.storage.is_initialized() {
            return VerifyOutcome::Verified;
        }

        let body = match self.transport.call(&self.verify_url).await {
            Ok(body) => body,
            Err(CallError::Network(reason)) => {
                debug!("peer {} offline: {}", self.peer, reason);
                return VerifyOutcome::Offline { reason };
            }
            Err(err @ CallError::Status { .. }) => {
                return VerifyOutcome::Fatal(BootstrapError::MalformedResponse {
                    peer: self.peer.clone(),
                    reason: err.to_string(),
                });
            }
        };

        let remote: TopologySnapshot = match serde_json::from_slice(&body) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                return VerifyOutcome::Fatal(BootstrapError::MalformedResponse {
                    peer: self.peer.clone(),
                    reason: err.to_string(),
                });
            }
        };

        match local.diff(&remote) {
            None => VerifyOutcome::Verified,
            Some(discrepancy) => VerifyOutcome::Fatal(BootstrapError::ConfigMismatch {
                peer: self.peer.clone(),
                discrepancy,
            }),
        }
    }
}

impl fmt::Display for PeerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.peer)
    }
}

impl fmt::Debug for PeerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerClient")
            .field("peer", &self.peer)
            .field("verify_url", &self.verify_url)
            .finish()
    }
}

/// Build one client per distinct remote host in the topology.
///
/// The dedup key is host identity, so two endpoints on the same node
/// (even in different sets) share one client, and a host first seen as
/// local is never contacted at all. Output order follows the first
/// encounter while scanning sets and endpoints positionally.
pub fn peer_clients(
    topology: &ClusterTopology,
    transport: Arc<PeerTransport>,
    storage: Arc<dyn StorageState>,
) -> Vec<PeerClient> {
    let mut seen_hosts = HashSet::new();
    let mut clients = Vec::new();

    for set in &topology.endpoint_sets {
        for endpoint in &set.endpoints {
            if !seen_hosts.insert(endpoint.host()) {
                continue;
            }
            if endpoint.is_local {
                continue;
            }
            clients.push(PeerClient::new(
                endpoint,
                Arc::clone(&transport),
                Arc::clone(&storage),
            ));
        }
    }

    clients
}
