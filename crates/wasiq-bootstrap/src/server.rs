//! Bootstrap responder routes
//!
//! The passive half of the protocol: peers POST to the verify route and
//! get this node's freshly computed topology snapshot back; the health
//! route answers liveness probes with an empty 200. Authentication and
//! listener setup belong to the embedding server, which nests this
//! router under its own listener.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use wasiq_core::types::{ClusterTopology, TopologySnapshot};

/// Reserved path prefix for bootstrap routes.
pub const BOOTSTRAP_PREFIX: &str = "/wasiq/bootstrap";
/// Protocol version segment.
pub const BOOTSTRAP_VERSION: &str = "v1";

/// Full path of the health probe route.
pub const HEALTH_PATH: &str = "/wasiq/bootstrap/v1/health";
/// Full path of the verify route.
pub const VERIFY_PATH: &str = "/wasiq/bootstrap/v1/verify";

/// State shared by the bootstrap handlers
#[derive(Clone)]
pub struct BootstrapState {
    /// The topology this node was started with
    pub topology: Arc<ClusterTopology>,
}

/// Build the bootstrap router for this node.
pub fn router(state: BootstrapState) -> Router {
    Router::new()
        .route(HEALTH_PATH, post(health_handler))
        .route(VERIFY_PATH, post(verify_handler))
        .with_state(state)
}

/// Liveness probe: bare success, no body.
async fn health_handler() -> StatusCode {
    StatusCode::OK
}

/// Report this node's topology snapshot. Recomputed per request so it
/// always reflects the in-memory topology.
async fn verify_handler(State(state): State<BootstrapState>) -> Json<TopologySnapshot> {
    Json(state.topology.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use wasiq_core::types::{Endpoint, EndpointSet};

    fn test_router() -> (Router, Arc<ClusterTopology>) {
        let topology = Arc::new(ClusterTopology::new(vec![EndpointSet::new(
            1,
            4,
            vec![
                Endpoint::new("http://node1:9000/data", true).unwrap(),
                Endpoint::new("http://node2:9000/data", false).unwrap(),
            ],
        )]));
        let router = router(BootstrapState {
            topology: Arc::clone(&topology),
        });
        (router, topology)
    }

    #[tokio::test]
    async fn test_health_returns_empty_success() {
        let (router, _) = test_router();

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(HEALTH_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_verify_returns_current_snapshot() {
        let (router, topology) = test_router();

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(VERIFY_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let snapshot: TopologySnapshot = serde_json::from_slice(&body).unwrap();
        assert_eq!(snapshot, topology.snapshot());
        assert_eq!(snapshot.endpoint_topology[0].set_count, 1);
        assert_eq!(snapshot.endpoint_topology[0].drives_per_set, 4);
    }

    #[tokio::test]
    async fn test_verify_rejects_get() {
        let (router, _) = test_router();

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(VERIFY_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
