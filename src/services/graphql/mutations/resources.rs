//! Resource mutations. A successful create is announced on the notification
//! bus so `resourceCreated` subscribers see it; a failed one is not.

use std::sync::Arc;

use async_graphql::{Context, ErrorExtensions, Object, Result};
use tracing::{debug, info, warn};

use crate::services::graphql::entities::Resource;
use crate::services::graphql::subscriptions::{RESOURCE_CREATED, ResourceBus};
use crate::services::upstream::ResourceStore;

#[derive(Default)]
pub struct ResourceMutations;

#[Object]
impl ResourceMutations {
    /// Create a resource upstream with a freshly generated identity.
    async fn add_resource(
        &self,
        ctx: &Context<'_>,
        kind: String,
        description: String,
        sale_price: i32,
        purchase_price: i32,
    ) -> Result<Resource> {
        let store = ctx.data::<Arc<dyn ResourceStore>>()?;
        let bus = ctx.data::<Arc<ResourceBus>>()?;

        let resource = Resource::with_new_id(kind, description, sale_price, purchase_price);
        let created = store.create(&resource).await.map_err(|e| {
            warn!(resource_id = %resource.id, error = %e, "Failed to create resource");
            e.extend()
        })?;

        info!(resource_id = %created.id, kind = %created.kind, "Resource created");
        let delivered = bus.publish(RESOURCE_CREATED, created.clone());
        debug!(resource_id = %created.id, delivered, "Published resource creation");

        Ok(created)
    }
}
