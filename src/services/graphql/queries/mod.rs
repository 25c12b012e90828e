//! GraphQL query modules.

pub mod resources;
pub mod system;

pub use resources::ResourceQueries;
pub use system::SystemQueries;
