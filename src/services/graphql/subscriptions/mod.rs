//! GraphQL subscription modules.

pub mod resources;

pub use resources::{RESOURCE_CREATED, ResourceBus, ResourceSubscriptions};
