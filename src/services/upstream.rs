//! Client for the upstream coins API.
//!
//! The upstream is a plain REST collection: `GET <url>` lists every resource,
//! `POST <url>` with a complete resource (identity included) creates one and
//! returns it. There is no retry; every failure is final for that call.

use async_graphql::ErrorExtensions;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::services::graphql::entities::Resource;

/// Maximum number of response body bytes kept in a status error.
const ERROR_BODY_LIMIT: usize = 512;

/// Failure talking to the upstream resource service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("upstream response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
}

impl UpstreamError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Request(e) | UpstreamError::Decode(e) => e.status(),
        }
    }
}

impl ErrorExtensions for UpstreamError {
    fn extend(&self) -> async_graphql::Error {
        let status = self.status();
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", "UPSTREAM_FAILURE");
            if let Some(status) = status {
                e.set("status", status.as_u16());
            }
        })
    }
}

/// Storage backend for resources. The gateway only ever lists and creates.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch every resource, unmodified.
    async fn list(&self) -> Result<Vec<Resource>, UpstreamError>;

    /// Create `resource` and return the record as stored.
    async fn create(&self, resource: &Resource) -> Result<Resource, UpstreamError>;
}

/// [ResourceStore] backed by the upstream REST collection.
pub struct HttpResourceStore {
    client: Client,
    url: Url,
}

impl HttpResourceStore {
    pub fn new(url: Url) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

/// Turn a non-success response into [UpstreamError::Status].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    Err(UpstreamError::Status { status, body })
}

#[async_trait]
impl ResourceStore for HttpResourceStore {
    async fn list(&self) -> Result<Vec<Resource>, UpstreamError> {
        debug!(url = %self.url, "Listing resources from upstream");

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(UpstreamError::Request)?;
        let response = check_status(response).await?;

        let resources: Vec<Resource> = response.json().await.map_err(UpstreamError::Decode)?;

        debug!(count = resources.len(), "Upstream returned resources");
        Ok(resources)
    }

    async fn create(&self, resource: &Resource) -> Result<Resource, UpstreamError> {
        info!(url = %self.url, resource_id = %resource.id, "Creating resource upstream");

        let response = self
            .client
            .post(self.url.clone())
            .json(resource)
            .send()
            .await
            .map_err(UpstreamError::Request)?;
        let response = check_status(response).await?;

        response.json().await.map_err(UpstreamError::Decode)
    }
}
