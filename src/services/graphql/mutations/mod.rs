//! GraphQL mutation modules.

pub mod resources;

pub use resources::ResourceMutations;
