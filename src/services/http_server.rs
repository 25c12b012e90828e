//! `http` service: serves the gateway's Axum app from a background task.
//!
//! Runs after `graphql` so the schema exists when the router is built. Stopping
//! the service closes the listener and waits for requests already accepted to
//! finish, so a mutation that reached the upstream still gets its reply out.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::app::{AppState, build_app};
use crate::config::Config;
use crate::services::ServicesManager;
use crate::services::manager::{Service, ServiceHealth};

/// Configuration for the HTTP server service.
#[derive(Clone)]
pub struct HttpServerConfig {
    pub config: Arc<Config>,
}

/// A server started by [HttpServerService::start].
struct RunningServer {
    local_addr: SocketAddr,
    /// Fires the graceful shutdown; dropping it has the same effect.
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

pub struct HttpServerService {
    manager: Arc<ServicesManager>,
    config: Arc<Config>,
    running: Mutex<Option<RunningServer>>,
}

impl HttpServerService {
    pub fn new(manager: Arc<ServicesManager>, config: Arc<Config>) -> Self {
        Self {
            manager,
            config,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Service for HttpServerService {
    fn name(&self) -> &str {
        "http"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["graphql".to_string()]
    }

    async fn start(&self) -> Result<()> {
        if self.running.lock().is_some() {
            return Ok(());
        }

        let schema = self
            .manager
            .get_graphql()
            .await
            .ok_or_else(|| anyhow!("graphql service not available"))?
            .schema()
            .await
            .ok_or_else(|| anyhow!("graphql schema not built"))?;

        let app = build_app(AppState {
            schema,
            services: self.manager.clone(),
        });

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("HTTP server: bind to {addr} failed"))?;
        let local_addr = listener.local_addr().context("HTTP server: no local address")?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        *self.running.lock() = Some(RunningServer {
            local_addr,
            shutdown,
            task,
        });

        info!(
            service = "http",
            addr = %local_addr,
            "GraphQL at {}/graphql",
            self.config.public_base_url()
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(server) = self.running.lock().take() else {
            return Ok(());
        };

        info!(service = "http", addr = %server.local_addr, "Draining in-flight requests");
        let _ = server.shutdown.send(());
        server
            .task
            .await
            .context("HTTP server task panicked")?
            .context("HTTP server exited with an error")?;
        info!(service = "http", "HTTP server stopped");
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        Ok(match self.running.lock().as_ref() {
            Some(server) if !server.task.is_finished() => ServiceHealth::healthy(),
            Some(_) => ServiceHealth::unhealthy("server task exited"),
            None => ServiceHealth::unhealthy("server not running"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::services::graphql::{GraphqlServiceConfig, ResourceBus};
    use crate::services::manager::HealthStatus;
    use crate::services::upstream::tests::InMemoryStore;

    const ADD_GOLD: &str = r#"mutation { addResource(kind: "gold", description: "ounce", salePrice: 100, purchasePrice: 80) { id kind } }"#;

    async fn start_server(store: Arc<InMemoryStore>) -> (HttpServerService, SocketAddr) {
        let services = ServicesManager::builder()
            .add_service(Arc::new(ResourceBus::new()))
            .add_service(GraphqlServiceConfig {
                server_port: 0,
                store,
            })
            .start()
            .await
            .unwrap();
        let config = Config::from_lookup(|key| (key == "PORT").then(|| "0".to_string())).unwrap();
        let server = HttpServerService::new(services, Arc::new(config));
        server.start().await.unwrap();

        let port = server.running.lock().as_ref().unwrap().local_addr.port();
        (server, SocketAddr::from(([127, 0, 0, 1], port)))
    }

    #[tokio::test]
    async fn test_serves_graphql_on_bound_port() {
        let (server, addr) = start_server(Arc::new(InMemoryStore::default())).await;
        assert_eq!(server.health().await.unwrap(), ServiceHealth::healthy());

        let body: Value = reqwest::Client::new()
            .post(format!("http://{addr}/graphql"))
            .json(&json!({ "query": "{ health }" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["data"]["health"], true);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_lets_in_flight_request_finish() {
        let store = Arc::new(InMemoryStore::slow(Duration::from_millis(300)));
        let (server, addr) = start_server(store.clone()).await;

        let request = tokio::spawn(async move {
            reqwest::Client::new()
                .post(format!("http://{addr}/graphql"))
                .json(&json!({ "query": ADD_GOLD }))
                .send()
                .await
                .unwrap()
                .json::<Value>()
                .await
                .unwrap()
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.create_calls.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("mutation never reached the store");

        server.stop().await.unwrap();
        assert_eq!(store.records.lock().len(), 1);

        let body = request.await.unwrap();
        assert_eq!(body["data"]["addResource"]["kind"], "gold");

        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
        assert_eq!(server.health().await.unwrap().status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let services = ServicesManager::builder().build().await.unwrap();
        let config = Arc::new(Config::from_lookup(|_| None).unwrap());
        let server = HttpServerService::new(services, config);
        server.stop().await.unwrap();
        assert_eq!(server.health().await.unwrap().status, HealthStatus::Unhealthy);
    }
}
