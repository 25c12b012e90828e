//! Resource queries, answered straight from the upstream coins API.

use std::sync::Arc;

use async_graphql::{Context, ErrorExtensions, Object, Result};
use tracing::warn;

use crate::services::graphql::entities::Resource;
use crate::services::upstream::ResourceStore;

#[derive(Default)]
pub struct ResourceQueries;

#[Object]
impl ResourceQueries {
    /// All resources known to the upstream service, as received.
    async fn resources(&self, ctx: &Context<'_>) -> Result<Vec<Resource>> {
        let store = ctx.data::<Arc<dyn ResourceStore>>()?;
        store.list().await.map_err(|e| {
            warn!(error = %e, "Failed to list resources");
            e.extend()
        })
    }
}
