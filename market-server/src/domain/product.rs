use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    /// Owning seller. Immutable after creation; the only field
    /// authorization ever compares against.
    pub seller_id: Uuid,
    /// Display snapshot of the seller's store, captured at creation.
    pub store_name: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        seller_id: Uuid,
        store_name: String,
        name: String,
        description: String,
        price: Decimal,
        image_path: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            seller_id,
            store_name,
            name,
            description,
            price,
            image_path,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A catalog row with the seller's current display name joined in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductListing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub store_name: String,
    pub seller_name: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
