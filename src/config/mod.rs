//! Application configuration management

use std::env;

use anyhow::{Context, Result};
use url::Url;

/// Collection endpoint of the fake coins API the gateway fronts by default.
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:4001/coins";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (for generating URLs)
    pub host: Option<String>,

    /// Server port
    pub port: u16,

    /// Collection URL of the upstream resource service.
    /// `GET` lists resources, `POST` creates one.
    pub upstream_url: Url,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("PORT")
            .unwrap_or_else(|| "4002".to_string())
            .parse()
            .context("Invalid PORT")?;

        let upstream_url = parse_upstream_url(
            &lookup("UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
        )?;

        Ok(Self {
            host: lookup("HOST").filter(|h| !h.is_empty()),
            port,
            upstream_url,
        })
    }

    /// Base URL clients use to reach this server, for log messages.
    pub fn public_base_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.host.as_deref().unwrap_or("localhost"),
            self.port
        )
    }
}

/// Parse and validate an upstream collection URL (must be http or https).
pub fn parse_upstream_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Invalid UPSTREAM_URL: {raw}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => anyhow::bail!("UPSTREAM_URL must use http or https, got {other}"),
    }
}
