//! Resource Entity

use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resource Entity - a coin record held by the upstream coins API.
///
/// On the wire the upstream calls `kind` `coinType`.
#[derive(SimpleObject, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[graphql(name = "Resource")]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Identity assigned when the resource is created
    pub id: String,

    #[serde(rename = "coinType")]
    pub kind: String,

    pub description: String,

    pub sale_price: i32,

    pub purchase_price: i32,
}

impl Resource {
    /// Build a complete record from creation input with a fresh identity.
    pub fn with_new_id(
        kind: String,
        description: String,
        sale_price: i32,
        purchase_price: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            description,
            sale_price,
            purchase_price,
        }
    }
}
