//! Cluster topology description
//!
//! A node is started with an ordered list of endpoint sets; the order
//! encodes set placement and is semantically significant. The topology
//! is built once from the node's configuration and never mutated.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::types::{SnapshotSet, TopologySnapshot};

/// A single storage endpoint (scheme + host + path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Full endpoint URL
    pub url: Url,
    /// Whether this endpoint belongs to the local process
    pub is_local: bool,
}

impl Endpoint {
    /// Parse an endpoint from its URL form.
    pub fn new(url: impl AsRef<str>, is_local: bool) -> Result<Self> {
        let raw = url.as_ref();
        let url = Url::parse(raw).map_err(|e| Error::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: e.to_string(),
        })?;

        if url.host_str().is_none() {
            return Err(Error::InvalidEndpoint {
                endpoint: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self { url, is_local })
    }

    /// Network host identity (`host` or `host:port`), used to collapse
    /// endpoints that live on the same node.
    pub fn host(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// URL scheme (`http` or `https`).
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// A group of endpoints sharing one set layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSet {
    /// Number of storage sets carved out of this group
    pub set_count: usize,
    /// Number of drives composing each set
    pub drives_per_set: usize,
    /// Member endpoints, in positional order
    pub endpoints: Vec<Endpoint>,
}

impl EndpointSet {
    pub fn new(set_count: usize, drives_per_set: usize, endpoints: Vec<Endpoint>) -> Self {
        Self {
            set_count,
            drives_per_set,
            endpoints,
        }
    }
}

/// The local node's view of the whole cluster layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    /// Platform string of this node
    pub platform: String,
    /// Endpoint sets, in positional order
    pub endpoint_sets: Vec<EndpointSet>,
}

impl ClusterTopology {
    /// Create a topology for the platform this process was built for.
    pub fn new(endpoint_sets: Vec<EndpointSet>) -> Self {
        Self {
            platform: local_platform(),
            endpoint_sets,
        }
    }

    /// Create a topology with an explicit platform string.
    pub fn with_platform(platform: impl Into<String>, endpoint_sets: Vec<EndpointSet>) -> Self {
        Self {
            platform: platform.into(),
            endpoint_sets,
        }
    }

    /// Build the snapshot exchanged with peers. Computed fresh on every
    /// call so it always reflects the current in-memory topology.
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            platform: self.platform.clone(),
            endpoint_topology: self
                .endpoint_sets
                .iter()
                .map(|set| SnapshotSet {
                    set_count: set.set_count,
                    drives_per_set: set.drives_per_set,
                    endpoints: set.endpoints.iter().map(|e| e.to_string()).collect(),
                })
                .collect(),
        }
    }
}

/// Platform identity of the running process.
pub fn local_platform() -> String {
    format!(
        "OS: {} | Arch: {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
