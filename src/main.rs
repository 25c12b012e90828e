//! Coin Gateway - GraphQL front for the coins API
//!
//! Queries and mutations are served at /graphql, subscriptions over
//! WebSocket at /graphql/ws.

mod api;
mod app;
mod cli;
mod config;
mod services;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::CliOptions;
use crate::config::Config;
use crate::services::ServicesManager;
use crate::services::graphql::{GraphqlServiceConfig, ResourceBus};
use crate::services::http_server::HttpServerConfig;
use crate::services::upstream::HttpResourceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mut config = Config::from_env()?;
    CliOptions::from_args().apply(&mut config)?;
    let config = Arc::new(config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coin_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Coin Gateway");
    tracing::info!(upstream = %config.upstream_url, port = config.port, "Configuration loaded");

    let store = Arc::new(HttpResourceStore::new(config.upstream_url.clone()));

    let services = ServicesManager::builder()
        .add_api_routes("health", |_| api::health::router())
        .add_service(Arc::new(ResourceBus::new()))
        .add_service(GraphqlServiceConfig {
            server_port: config.port,
            store,
        })
        .add_service(HttpServerConfig {
            config: config.clone(),
        })
        .start()
        .await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    services.stop_all().await?;
    tracing::info!("Coin Gateway stopped");
    Ok(())
}
