//! Wasiq Bootstrap - cluster topology agreement at node startup
//!
//! Before a node begins serving, every node in the cluster must have
//! been started with an identical view of the topology: the same set
//! and drive layout, the same endpoints in the same order, the same
//! platform. This crate detects disagreement before it can corrupt
//! data placement; it does not resolve it.
//!
//! The active half is [`verify_cluster_topology`]: it builds one
//! [`PeerClient`] per distinct remote host and drives verification
//! rounds until at least half of the remote peers confirm a matching
//! snapshot within one round. Unreachable peers are retried without
//! bound; a confirmed mismatch or a malformed response aborts startup
//! immediately. The passive half is the axum [`router`] answering the
//! same check for other nodes.

mod client;
mod error;
mod server;
mod transport;
mod verify;

pub use client::{peer_clients, PeerClient, PeerVerifier, StorageState, VerifyOutcome};
pub use error::{BootstrapError, BootstrapResult};
pub use server::{
    router, BootstrapState, BOOTSTRAP_PREFIX, BOOTSTRAP_VERSION, HEALTH_PATH, VERIFY_PATH,
};
pub use transport::{CallError, PeerTransport, TransportConfig};
pub use verify::{converge, verify_cluster_topology, VerifyConfig};

// Re-export the topology types peers exchange
pub use wasiq_core::types::{
    ClusterTopology, Discrepancy, Endpoint, EndpointSet, SnapshotSet, TopologySnapshot,
};
