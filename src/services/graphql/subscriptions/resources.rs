//! ResourceCreated subscription: one event per successful `addResource`,
//! delivered to every subscriber connected at publish time.

use std::sync::Arc;

use async_graphql::{Context, Result, Subscription};
use futures::Stream;
use tracing::debug;

use crate::services::bus::NotificationBus;
use crate::services::graphql::entities::Resource;

/// Topic carrying newly created resources.
pub const RESOURCE_CREATED: &str = "resource-created";

/// Notification bus carrying [Resource] payloads. Added to the schema as data.
pub type ResourceBus = NotificationBus<Resource>;

#[derive(Default)]
pub struct ResourceSubscriptions;

#[Subscription]
impl ResourceSubscriptions {
    /// Resources created after the subscription started. No replay. The
    /// consumer is unregistered when the subscription ends.
    async fn resource_created(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = Resource>> {
        let bus = ctx.data::<Arc<ResourceBus>>()?;
        let handle = bus.subscribe(RESOURCE_CREATED);
        debug!(
            topic = handle.topic(),
            consumer_id = handle.id(),
            subscribers = bus.consumer_count(RESOURCE_CREATED),
            "resourceCreated subscription started"
        );
        Ok(handle)
    }
}
