//! Topology snapshots and snapshot comparison
//!
//! A snapshot is what a node reports about its own configuration during
//! the bootstrap check. Comparison is strictly positional and stops at
//! the first field that disagrees; the resulting [`Discrepancy`] names
//! the field along with the expected and observed values so an operator
//! can see exactly which start-up argument differs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One node's self-reported platform and endpoint layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub platform: String,
    #[serde(rename = "endpointTopology")]
    pub endpoint_topology: Vec<SnapshotSet>,
}

/// Wire form of one endpoint set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSet {
    #[serde(rename = "setCount")]
    pub set_count: usize,
    #[serde(rename = "drivesPerSet")]
    pub drives_per_set: usize,
    pub endpoints: Vec<String>,
}

/// First structural difference between two snapshots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    #[error("Expected platform '{expected}', found to be running '{found}'")]
    Platform { expected: String, found: String },

    #[error("Expected number of endpoints {expected}, seen {found}")]
    EndpointCount { expected: usize, found: usize },

    #[error("Expected number of endpoint sets {expected}, seen {found}")]
    EndpointSetCount { expected: usize, found: usize },

    #[error("Expected set count {expected}, seen {found} (endpoint set {set})")]
    SetCount {
        set: usize,
        expected: usize,
        found: usize,
    },

    #[error("Expected drives per set {expected}, seen {found} (endpoint set {set})")]
    DrivesPerSet {
        set: usize,
        expected: usize,
        found: usize,
    },

    #[error("Expected {expected} endpoints in endpoint set {set}, seen {found}")]
    SetEndpointCount {
        set: usize,
        expected: usize,
        found: usize,
    },

    #[error("Expected endpoint '{expected}', seen '{found}' (endpoint set {set}, endpoint {index})")]
    Endpoint {
        set: usize,
        index: usize,
        expected: String,
        found: String,
    },
}

impl TopologySnapshot {
    /// Total number of endpoints across all sets.
    pub fn total_endpoints(&self) -> usize {
        self.endpoint_topology.iter().map(|s| s.endpoints.len()).sum()
    }

    /// Compare against a peer's snapshot, returning the first field that
    /// differs. Walks platform, then overall endpoint counts, then each
    /// set in positional order. `None` means full structural agreement.
    pub fn diff(&self, other: &TopologySnapshot) -> Option<Discrepancy> {
        if self.platform != other.platform {
            return Some(Discrepancy::Platform {
                expected: self.platform.clone(),
                found: other.platform.clone(),
            });
        }

        if self.total_endpoints() != other.total_endpoints() {
            return Some(Discrepancy::EndpointCount {
                expected: self.total_endpoints(),
                found: other.total_endpoints(),
            });
        }

        if self.endpoint_topology.len() != other.endpoint_topology.len() {
            return Some(Discrepancy::EndpointSetCount {
                expected: self.endpoint_topology.len(),
                found: other.endpoint_topology.len(),
            });
        }

        for (i, (ours, theirs)) in self
            .endpoint_topology
            .iter()
            .zip(other.endpoint_topology.iter())
            .enumerate()
        {
            if ours.set_count != theirs.set_count {
                return Some(Discrepancy::SetCount {
                    set: i,
                    expected: ours.set_count,
                    found: theirs.set_count,
                });
            }
            if ours.drives_per_set != theirs.drives_per_set {
                return Some(Discrepancy::DrivesPerSet {
                    set: i,
                    expected: ours.drives_per_set,
                    found: theirs.drives_per_set,
                });
            }
            if ours.endpoints.len() != theirs.endpoints.len() {
                return Some(Discrepancy::SetEndpointCount {
                    set: i,
                    expected: ours.endpoints.len(),
                    found: theirs.endpoints.len(),
                });
            }
            for (j, (our_ep, their_ep)) in
                ours.endpoints.iter().zip(theirs.endpoints.iter()).enumerate()
            {
                if our_ep != their_ep {
                    return Some(Discrepancy::Endpoint {
                        set: i,
                        index: j,
                        expected: our_ep.clone(),
                        found: their_ep.clone(),
                    });
                }
            }
        }

        None
    }
}
