//! GraphQL service: owns schema building and exposes HTTP routes for /graphql and /graphql/ws.
//!
//! Depends on the notification bus; builds the schema in [start](Service::start) once the bus
//! is available. The HTTP server merges [GraphqlService::router] into the app and uses
//! [GraphqlService::schema] to build [AppState].

use std::sync::Arc;

use anyhow::Result;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use async_trait::async_trait;
use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::app::AppState;
use crate::services::ServicesManager;
use crate::services::manager::{Service, ServiceHealth};
use crate::services::upstream::ResourceStore;

use super::{GatewaySchema, build_schema};

/// Path serving queries, mutations and the playground.
pub const GRAPHQL_PATH: &str = "/graphql";

/// Path accepting WebSocket upgrades for subscriptions.
pub const GRAPHQL_WS_PATH: &str = "/graphql/ws";

/// Configuration for the GraphQL service.
#[derive(Clone)]
pub struct GraphqlServiceConfig {
    /// Server port, for logging the playground URL.
    pub server_port: u16,
    /// Backend the resolvers read from and write to.
    pub store: Arc<dyn ResourceStore>,
}

/// GraphQL service: builds and holds the schema, provides routes for the playground and API.
pub struct GraphqlService {
    manager: Arc<ServicesManager>,
    config: GraphqlServiceConfig,
    schema: RwLock<Option<GatewaySchema>>,
}

impl GraphqlService {
    /// Create the service. [start](Service::start) obtains the bus from the
    /// manager and builds the schema.
    pub fn new(manager: Arc<ServicesManager>, config: GraphqlServiceConfig) -> Self {
        Self {
            manager,
            config,
            schema: RwLock::new(None),
        }
    }

    /// Return the built schema, if the service has been started.
    pub async fn schema(&self) -> Option<GatewaySchema> {
        self.schema.read().await.clone()
    }

    /// Return a router with /graphql and /graphql/ws. Merge this into the app and call
    /// `.with_state(state)` on the combined router so handlers receive [AppState].
    pub fn router() -> Router<AppState> {
        Router::new()
            .route(GRAPHQL_PATH, get(graphiql).post(graphql_handler))
            .route(GRAPHQL_WS_PATH, get(graphql_ws_handler))
    }
}

async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        axum::response::Html(
            GraphiQLSource::build()
                .endpoint(GRAPHQL_PATH)
                .subscription_endpoint(GRAPHQL_WS_PATH)
                .finish(),
        )
        .into_response()
    } else {
        (
            axum::http::StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

async fn graphql_handler(State(state): State<AppState>, req: GraphQLRequest) -> GraphQLResponse {
    let request = req.into_inner();
    debug!(operation = ?request.operation_name, "GraphQL request");
    state.schema.execute(request).await.into()
}

async fn graphql_ws_handler(
    State(state): State<AppState>,
    protocol: GraphQLProtocol,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.protocols(["graphql-transport-ws", "graphql-ws"])
        .on_upgrade(move |socket| async move {
            debug!("Subscription connection opened");
            GraphQLWebSocket::new(socket, state.schema.clone(), protocol)
                .serve()
                .await;
            debug!("Subscription connection closed");
        })
}

#[async_trait]
impl Service for GraphqlService {
    fn name(&self) -> &str {
        "graphql"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["bus".to_string()]
    }

    async fn start(&self) -> Result<()> {
        info!(service = "graphql", "GraphQL service starting");
        let bus = self
            .manager
            .get_bus()
            .await
            .ok_or_else(|| anyhow::anyhow!("notification bus not available"))?;
        let schema = build_schema(self.config.store.clone(), bus);
        *self.schema.write().await = Some(schema);
        info!(service = "graphql", "GraphQL service started");
        info!(
            service = "graphql",
            "GraphQL playground: http://localhost:{}{}",
            self.config.server_port,
            GRAPHQL_PATH
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.schema.write().await = None;
        info!(service = "graphql", "Stopped");
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        if self.schema.read().await.is_none() {
            return Ok(ServiceHealth::unhealthy("schema not built"));
        }
        match self.manager.get_bus().await {
            Some(bus) if !bus.is_closed() => Ok(ServiceHealth::healthy()),
            _ => Ok(ServiceHealth::degraded("notification bus unavailable")),
        }
    }
}
