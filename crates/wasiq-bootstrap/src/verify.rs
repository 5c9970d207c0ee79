//! Quorum convergence loop
//!
//! Drives rounds of per-peer verification until at least half of the
//! distinct remote peers confirm, within a single round, that they were
//! started with the same topology. Unreachable peers are retried
//! without bound; the loop blocks node startup rather than proceed with
//! unverifiable agreement. A confirmed mismatch or a malformed peer
//! response aborts immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use wasiq_core::types::{ClusterTopology, TopologySnapshot};

use crate::client::{peer_clients, PeerVerifier, StorageState, VerifyOutcome};
use crate::error::{BootstrapError, BootstrapResult};
use crate::transport::PeerTransport;

/// Convergence loop configuration
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Pause between rounds while peers are still coming up
    pub round_delay: Duration,
    /// Emit the slow-convergence diagnostic after this many rounds
    pub log_after_rounds: u32,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            round_delay: Duration::from_millis(100),
            log_after_rounds: 5,
        }
    }
}

/// Verify topology agreement against the whole cluster. Builds one
/// client per distinct remote host and runs the convergence loop with
/// a freshly computed local snapshot.
pub async fn verify_cluster_topology(
    cancel: &CancellationToken,
    topology: &ClusterTopology,
    transport: Arc<PeerTransport>,
    storage: Arc<dyn StorageState>,
) -> BootstrapResult<()> {
    let local = topology.snapshot();
    let clients = peer_clients(topology, transport, storage);
    converge(cancel, &clients, &local, &VerifyConfig::default()).await
}

/// Run verification rounds until quorum, cancellation, or a fatal
/// outcome.
///
/// Quorum is at least half of `clients` (integer floor) verified within
/// one round; the tally is not carried across rounds, so agreement must
/// be simultaneous. With no remote peers the quorum is met trivially
/// before any RPC. There is no round limit: a cluster whose peers never
/// come online blocks here until cancelled.
pub async fn converge<V: PeerVerifier>(
    cancel: &CancellationToken,
    clients: &[V],
    local: &TopologySnapshot,
    config: &VerifyConfig,
) -> BootstrapResult<()> {
    let needed = clients.len() / 2;
    let mut rounds_since_log = 0u32;

    loop {
        let mut verified = 0usize;
        let mut offline: Vec<&str> = Vec::new();

        for client in clients {
            match client.verify(local).await {
                VerifyOutcome::Verified => verified += 1,
                VerifyOutcome::Offline { .. } => offline.push(client.peer()),
                VerifyOutcome::Fatal(err) => return Err(err),
            }
        }

        if verified >= needed {
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Err(BootstrapError::Cancelled);
        }

        // Pause so a half-offline cluster does not spin the CPU; bail
        // out mid-pause if cancelled.
        tokio::select! {
            _ = cancel.cancelled() => return Err(BootstrapError::Cancelled),
            _ = tokio::time::sleep(config.round_delay) => {}
        }

        rounds_since_log += 1;
        if rounds_since_log >= config.log_after_rounds {
            info!(
                "Waiting for at least {} remote servers to be online for the bootstrap check",
                needed
            );
            info!(
                "Currently offline or unreachable: {}",
                offline.join(", ")
            );
            rounds_since_log = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use wasiq_core::types::{Discrepancy, TopologySnapshot};

    /// Scripted stand-in for a peer: plays back one outcome per round,
    /// repeating the last one forever.
    struct ScriptedPeer {
        name: String,
        script: Mutex<VecDeque<Script>>,
        calls: AtomicUsize,
    }

    #[derive(Clone)]
    enum Script {
        Verified,
        Offline,
        Mismatch,
        Malformed,
    }

    impl ScriptedPeer {
        fn new(name: &str, script: &[Script]) -> Self {
            Self {
                name: name.to_string(),
                script: Mutex::new(script.to_vec().into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PeerVerifier for ScriptedPeer {
        fn peer(&self) -> &str {
            &self.name
        }

        async fn verify(&self, _local: &TopologySnapshot) -> VerifyOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            let step = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            };
            match step {
                Script::Verified => VerifyOutcome::Verified,
                Script::Offline => VerifyOutcome::Offline {
                    reason: "connection refused".to_string(),
                },
                Script::Mismatch => VerifyOutcome::Fatal(BootstrapError::ConfigMismatch {
                    peer: self.name.clone(),
                    discrepancy: Discrepancy::EndpointCount {
                        expected: 4,
                        found: 2,
                    },
                }),
                Script::Malformed => VerifyOutcome::Fatal(BootstrapError::MalformedResponse {
                    peer: self.name.clone(),
                    reason: "expected value at line 1".to_string(),
                }),
            }
        }
    }

    fn local() -> TopologySnapshot {
        TopologySnapshot {
            platform: "OS: linux | Arch: x86_64".to_string(),
            endpoint_topology: vec![],
        }
    }

    fn config() -> VerifyConfig {
        VerifyConfig {
            round_delay: Duration::from_millis(1),
            log_after_rounds: 5,
        }
    }

    #[tokio::test]
    async fn test_zero_peers_succeeds_without_rpc() {
        let clients: Vec<ScriptedPeer> = vec![];
        let result = converge(&CancellationToken::new(), &clients, &local(), &config()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_majority_online_reaches_quorum_first_round() {
        let clients = vec![
            ScriptedPeer::new("http://n1:9000/d", &[Script::Verified]),
            ScriptedPeer::new("http://n2:9000/d", &[Script::Verified]),
            ScriptedPeer::new("http://n3:9000/d", &[Script::Offline]),
        ];

        let result = converge(&CancellationToken::new(), &clients, &local(), &config()).await;
        assert!(result.is_ok());
        assert_eq!(clients[0].calls(), 1);
        assert_eq!(clients[2].calls(), 1);
    }

    #[tokio::test]
    async fn test_mismatch_aborts_even_with_peers_offline() {
        let clients = vec![
            ScriptedPeer::new("http://n1:9000/d", &[Script::Offline]),
            ScriptedPeer::new("http://n2:9000/d", &[Script::Mismatch]),
            ScriptedPeer::new("http://n3:9000/d", &[Script::Offline]),
        ];

        let err = converge(&CancellationToken::new(), &clients, &local(), &config())
            .await
            .unwrap_err();
        match err {
            BootstrapError::ConfigMismatch { peer, .. } => {
                assert_eq!(peer, "http://n2:9000/d");
            }
            other => panic!("expected ConfigMismatch, got {other:?}"),
        }
        // Aborted mid-round: the peer after the mismatch was never asked.
        assert_eq!(clients[2].calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_response_is_fatal_not_offline() {
        let clients = vec![
            ScriptedPeer::new("http://n1:9000/d", &[Script::Malformed]),
            ScriptedPeer::new("http://n2:9000/d", &[Script::Offline]),
        ];

        let err = converge(&CancellationToken::new(), &clients, &local(), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::MalformedResponse { .. }));
        // Fatal on the first attempt, never retried.
        assert_eq!(clients[0].calls(), 1);
    }

    #[tokio::test]
    async fn test_quorum_requires_agreement_within_one_round() {
        // Successes spread across rounds must not accumulate: n1 and n2
        // are each verified in some round, but only in round 3 do two
        // of them agree simultaneously.
        let clients = vec![
            ScriptedPeer::new(
                "http://n1:9000/d",
                &[Script::Verified, Script::Offline, Script::Verified],
            ),
            ScriptedPeer::new(
                "http://n2:9000/d",
                &[Script::Offline, Script::Verified, Script::Verified],
            ),
            ScriptedPeer::new("http://n3:9000/d", &[Script::Offline]),
            ScriptedPeer::new("http://n4:9000/d", &[Script::Offline]),
        ];

        let result = converge(&CancellationToken::new(), &clients, &local(), &config()).await;
        assert!(result.is_ok());
        assert_eq!(clients[0].calls(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_round() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let clients = vec![
            ScriptedPeer::new("http://n1:9000/d", &[Script::Offline]),
            ScriptedPeer::new("http://n2:9000/d", &[Script::Offline]),
        ];

        let err = converge(&cancel, &clients, &local(), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Cancelled));
        // One full pass ran, then the token was observed; no second round.
        assert_eq!(clients[0].calls(), 1);
        assert_eq!(clients[1].calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_pause_returns_promptly() {
        let cancel = CancellationToken::new();
        let clients = vec![
            ScriptedPeer::new("http://n1:9000/d", &[Script::Offline]),
            ScriptedPeer::new("http://n2:9000/d", &[Script::Offline]),
        ];

        let loop_config = VerifyConfig {
            round_delay: Duration::from_secs(3600),
            log_after_rounds: 5,
        };

        let child = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });

        let err = converge(&cancel, &clients, &local(), &loop_config)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Cancelled));
        handle.await.unwrap();
    }
}
