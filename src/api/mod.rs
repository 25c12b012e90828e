//! REST route definitions
//!
//! The primary API is GraphQL at /graphql. REST only carries operational
//! endpoints.

pub mod health;
