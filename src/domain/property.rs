use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Sale,
    Rent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    Available,
    UnderOffer,
    Sold,
    Rented,
    OffMarket,
}

/// Real-estate listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub listing_type: ListingType,
    pub price_cents: i64,
    pub district: String,
    pub address: Option<String>,
    pub bedrooms: u16,
    pub bathrooms: u16,
    pub area_sq_ft: Option<u32>,
    pub images: Vec<String>,
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub listing_type: ListingType,
    pub price_cents: i64,
    pub district: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bedrooms: u16,
    #[serde(default)]
    pub bathrooms: u16,
    #[serde(default)]
    pub area_sq_ft: Option<u32>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Property {
    pub fn new(owner_id: Uuid, input: PropertyInput) -> Self {
        let now = Utc::now();
        let mut property = Self {
            id: Uuid::new_v4(),
            owner_id,
            title: String::new(),
            description: None,
            listing_type: input.listing_type,
            price_cents: 0,
            district: String::new(),
            address: None,
            bedrooms: 0,
            bathrooms: 0,
            area_sq_ft: None,
            images: Vec::new(),
            status: PropertyStatus::Available,
            created_at: now,
            updated_at: now,
        };
        property.apply(input);
        property
    }

    /// Overwrites the editable fields from `input`.
    pub fn apply(&mut self, input: PropertyInput) {
        self.title = input.title.trim().to_string();
        self.description = input.description;
        self.listing_type = input.listing_type;
        self.price_cents = input.price_cents;
        self.district = input.district.trim().to_string();
        self.address = input.address;
        self.bedrooms = input.bedrooms;
        self.bathrooms = input.bathrooms;
        self.area_sq_ft = input.area_sq_ft;
        self.images = input.images;
        self.updated_at = Utc::now();
    }
}
