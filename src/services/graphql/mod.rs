//! GraphQL API with subscriptions for real-time updates
//!
//! Queries and mutations are forwarded to the upstream coins API through a
//! [ResourceStore](crate::services::upstream::ResourceStore); successful
//! creations are fanned out to `resourceCreated` subscribers through the
//! [ResourceBus].

pub mod entities;
pub mod mutations;
pub mod queries;
mod schema;
pub mod service;
pub mod subscriptions;

pub use schema::{GatewaySchema, build_schema};
pub use service::{GraphqlService, GraphqlServiceConfig};
pub use subscriptions::{RESOURCE_CREATED, ResourceBus};
