use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use drip_core::component::ComponentRegistry;
use drip_core::config::ServerConfig;
use drip_core::store::{AnalyticsSink, EngineStore};

use super::handlers;
use crate::dispatch::EventDispatcher;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ComponentRegistry>,
    pub store: Arc<dyn EngineStore>,
    pub events: Arc<EventDispatcher<dyn EngineStore>>,
    pub analytics: Arc<dyn AnalyticsSink>,
}

impl AppState {
    pub fn new(
        registry: Arc<ComponentRegistry>,
        store: Arc<dyn EngineStore>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            registry,
            events: Arc::new(EventDispatcher::new(store.clone())),
            store,
            analytics,
        }
    }
}

/// Gateway HTTP server.
pub struct GatewayServer {
    config: ServerConfig,
    state: AppState,
}

impl GatewayServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/api/workflow-components/{kind}",
                get(handlers::list_components),
            )
            .route(
                "/api/workflow-components/{kind}/{name}",
                get(handlers::get_component),
            )
            .route("/api/workflows/validate", post(handlers::validate_graph))
            .route("/api/workflows/{id}/graph", put(handlers::save_graph))
            .route(
                "/api/workflows/{id}/executions",
                get(handlers::list_executions),
            )
            .route("/api/executions/{id}", get(handlers::get_execution))
            .route("/api/events", post(handlers::track_event))
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
    }

    /// Get the socket address to bind to.
    pub fn addr(&self) -> Result<SocketAddr, std::io::Error> {
        format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = self.addr()?;
        let router = self.router();

        tracing::info!("Gateway server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use drip_core::execution::NewExecution;
    use drip_core::store::ExecutionStore;
    use drip_core::testing::InMemoryStore;
    use drip_core::trigger::TriggerKind;

    use crate::analytics::TracingAnalyticsSink;
    use crate::components::builtin_registry;

    fn server(store: Arc<InMemoryStore>) -> GatewayServer {
        let state = AppState::new(
            Arc::new(builtin_registry()),
            store,
            Arc::new(TracingAnalyticsSink),
        );
        GatewayServer::new(ServerConfig::default(), state)
    }

    async fn send(
        server: &GatewayServer,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let server = server(Arc::new(InMemoryStore::new()));
        let (status, body) = send(&server, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_component_schemas() {
        let server = server(Arc::new(InMemoryStore::new()));

        let (status, body) = send(&server, Method::GET, "/api/workflow-components/actions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 5);

        let (status, body) = send(
            &server,
            Method::GET,
            "/api/workflow-components/actions/Send%20Email",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Send Email");
        assert_eq!(body["type"], "action");
        assert_eq!(body["fields"][0]["name"], "template_id");
        assert_eq!(body["fields"][0]["type"], "integer");
        assert_eq!(body["fields"][0]["required"], true);

        let (status, body) =
            send(&server, Method::GET, "/api/workflow-components/logic/Condition", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fields"][0]["name"], "force");

        for (uri, error) in [
            ("/api/workflow-components/actions/Nope", "Action not found"),
            ("/api/workflow-components/logic/Nope", "Logic not found"),
            ("/api/workflow-components/triggers/Nope", "Trigger not found"),
        ] {
            let (status, body) = send(&server, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, json!({"error": error}));
        }
    }

    #[tokio::test]
    async fn test_validate_graph() {
        let server = server(Arc::new(InMemoryStore::new()));

        let good = json!({
            "nodes": [{"id": "t", "type": "TRIGGER", "properties": {"trigger_event": "signup"}}],
            "edges": []
        });
        let (status, body) =
            send(&server, Method::POST, "/api/workflows/validate", Some(good)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"valid": true}));

        let bad = json!({
            "nodes": [{"id": "a", "type": "ACTION", "properties": {}}],
            "edges": []
        });
        let (status, body) = send(&server, Method::POST, "/api/workflows/validate", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Workflow graph is invalid");
        assert_eq!(body["details"], json!(["node a: missing 'action' property"]));

        let (status, _) = send(
            &server,
            Method::POST,
            "/api/workflows/validate",
            Some(json!({"nodes": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_save_graph() {
        let store = Arc::new(InMemoryStore::new());
        store.add_workflow(2, "{}", "ACTIVE");
        let server = server(store.clone());

        let graph = json!({
            "nodes": [{"id": "t", "type": "TRIGGER", "properties": {"trigger_event": "signup"}}],
            "edges": []
        });
        let (status, body) =
            send(&server, Method::PUT, "/api/workflows/2/graph", Some(graph.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"workflow_id": 2, "triggers": 1}));
        assert_eq!(store.triggers()[0].kind, TriggerKind::Event);

        let (status, _) = send(&server, Method::PUT, "/api/workflows/77/graph", Some(graph)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_events_start_executions() {
        let store = Arc::new(InMemoryStore::new());
        store.add_workflow(1, "{}", "ACTIVE");
        store.add_trigger(
            1,
            "t",
            TriggerKind::Event,
            json!({"trigger_event": "signup", "site_ids": [5]}),
            None,
        );
        let server = server(store.clone());

        let (status, body) = send(
            &server,
            Method::POST,
            "/api/events",
            Some(json!({"site_id": 5, "event": "signup", "data": {"email": "jo@example.com"}})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let ids = body["executions"].as_array().unwrap();
        assert_eq!(ids.len(), 1);

        let id = ids[0].as_i64().unwrap();
        let (status, body) =
            send(&server, Method::GET, &format!("/api/executions/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["context"]["email"], "jo@example.com");

        let (status, body) = send(&server, Method::GET, "/api/executions/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Execution not found");
    }

    #[tokio::test]
    async fn test_list_executions() {
        let store = Arc::new(InMemoryStore::new());
        for _ in 0..3 {
            store
                .insert_execution(NewExecution::at_node(4, "t", json!({}), Utc::now()))
                .await
                .unwrap();
        }
        let server = server(store);

        let (status, body) =
            send(&server, Method::GET, "/api/workflows/4/executions?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        let listed = body.as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0]["id"].as_i64() > listed[1]["id"].as_i64());
    }
}
