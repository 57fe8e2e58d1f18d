use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a product in a shop's catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: i64,
    pub stock: u32,
    pub sold_count: u32,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Product {
    pub fn new(shop_id: Uuid, new_product: NewProduct) -> Self {
        Self {
            id: Uuid::new_v4(),
            shop_id,
            name: new_product.name.trim().to_string(),
            description: new_product.description,
            category: new_product.category,
            price_cents: new_product.price_cents,
            stock: new_product.stock,
            sold_count: 0,
            images: new_product.images,
            created_at: Utc::now(),
        }
    }
}
