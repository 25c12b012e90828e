//! Long-running services and the upstream client

pub mod bus;
pub mod graphql;
pub mod http_server;
pub mod manager;
pub mod upstream;

pub use manager::ServicesManager;
