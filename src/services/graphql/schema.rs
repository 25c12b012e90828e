//! GraphQL schema definition with queries, mutations, and subscriptions

use std::sync::Arc;

use async_graphql::extensions::Tracing;
use async_graphql::{MergedObject, MergedSubscription, Schema};

use crate::services::upstream::ResourceStore;

use super::mutations::ResourceMutations;
use super::queries::{ResourceQueries, SystemQueries};
use super::subscriptions::{ResourceBus, ResourceSubscriptions};

#[derive(MergedObject, Default)]
pub struct QueryRoot(ResourceQueries, SystemQueries);

#[derive(MergedObject, Default)]
pub struct MutationRoot(ResourceMutations);

#[derive(MergedSubscription, Default)]
pub struct SubscriptionRoot(ResourceSubscriptions);

/// The GraphQL schema type
pub type GatewaySchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

/// Build the GraphQL schema over a resource store and the notification bus.
pub fn build_schema(store: Arc<dyn ResourceStore>, bus: Arc<ResourceBus>) -> GatewaySchema {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        SubscriptionRoot::default(),
    )
    .data(store)
    .data(bus)
    .extension(Tracing)
    .finish()
}
