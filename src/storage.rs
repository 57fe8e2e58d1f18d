//! Persistence boundary for marketplace documents.
//!
//! Two implementations: [`InMemoryStorage`] for development and tests, and
//! [`SqliteStorage`] for a single-node deployment. Both serialize writes, and
//! both run [`Storage::place_orders`] as one unit so that stock, sequences and
//! orders move together.

pub mod in_memory;
pub mod sqlite;

use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

/// Storage trait for persisting marketplace data
#[async_trait]
pub trait Storage: Send + Sync {
    /// Atomically increments and returns the named sequence (first value is 1).
    async fn next_sequence(&self, name: &str) -> Result<u64>;

    // Shop operations
    /// Fails with `Conflict` when the owner already has a shop.
    async fn create_shop(&self, shop: &Shop) -> Result<()>;
    async fn get_shop(&self, shop_id: Uuid) -> Result<Option<Shop>>;
    async fn update_shop(&self, shop: &Shop) -> Result<()>;
    async fn list_shops(&self, status: Option<ApprovalStatus>) -> Result<Vec<Shop>>;

    // Product operations
    async fn create_product(&self, product: &Product) -> Result<()>;
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>>;
    /// Applies `mutate` to the stored product under the write lock and
    /// returns the result. An error from `mutate` leaves the product unchanged.
    async fn modify_product(
        &self,
        product_id: Uuid,
        mutate: ProductMutation<'_>,
    ) -> Result<Product>;
    async fn list_products_by_shop(&self, shop_id: Uuid) -> Result<Vec<Product>>;

    // Order operations

    /// Stores a checkout as one unit.
    ///
    /// Decrements stock and bumps `sold_count` for every cart line, assigns an
    /// order number from the order sequence to each order that lacks one, and
    /// inserts the orders. On any error nothing is written.
    async fn place_orders(
        &self,
        orders: Vec<Order>,
        numbering: &OrderNumberFormat,
    ) -> Result<Vec<Order>>;
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>>;
    /// Applies `mutate` to the current order and stores it in one unit.
    ///
    /// `mutate` sees the latest state, so status checks inside it cannot race
    /// another writer. [`StockEffect::Restock`] returns the cart to stock in
    /// the same unit.
    async fn modify_order(
        &self,
        order_id: Uuid,
        mutate: OrderMutation<'_>,
    ) -> Result<Order>;
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>>;

    // Advertisement operations
    async fn create_ad(&self, ad: &Advertisement) -> Result<()>;
    async fn get_ad(&self, ad_id: Uuid) -> Result<Option<Advertisement>>;
    /// Applies `mutate` to the current ad under the same lock as
    /// [`Storage::increment_ad_counter`], so counters are never rolled back.
    async fn modify_ad(
        &self,
        ad_id: Uuid,
        mutate: AdMutation<'_>,
    ) -> Result<Advertisement>;
    async fn list_ads(&self, filter: &AdFilter) -> Result<Vec<Advertisement>>;
    /// Atomically bumps a view or click counter and returns the updated ad.
    async fn increment_ad_counter(&self, ad_id: Uuid, counter: AdCounter)
        -> Result<Advertisement>;

    // FAQ operations
    async fn create_faq(&self, faq: &Faq) -> Result<()>;
    async fn get_faq(&self, faq_id: Uuid) -> Result<Option<Faq>>;
    async fn update_faq(&self, faq: &Faq) -> Result<()>;
    /// Sorted by position, then creation time.
    async fn list_faqs(&self, include_unpublished: bool) -> Result<Vec<Faq>>;
    /// Deletes the listed FAQs that exist; returns how many were removed.
    async fn delete_faqs(&self, faq_ids: &[Uuid]) -> Result<u64>;

    // Property operations
    async fn create_property(&self, property: &Property) -> Result<()>;
    async fn get_property(&self, property_id: Uuid) -> Result<Option<Property>>;
    async fn update_property(&self, property: &Property) -> Result<()>;
    async fn delete_property(&self, property_id: Uuid) -> Result<bool>;
    async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>>;
}

/// Stock side effect of an order mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    Keep,
    Restock,
}

pub type OrderMutation<'a> = &'a (dyn Fn(&mut Order) -> Result<StockEffect> + Send + Sync);
pub type ProductMutation<'a> = &'a (dyn Fn(&mut Product) -> Result<()> + Send + Sync);
pub type AdMutation<'a> = &'a (dyn Fn(&mut Advertisement) -> Result<()> + Send + Sync);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub buyer_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.buyer_id.map_or(true, |id| order.buyer_id == id)
            && self.shop_id.map_or(true, |id| order.shop_id == id)
            && self.status.map_or(true, |s| order.status == s)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdFilter {
    pub shop_id: Option<Uuid>,
    pub ad_type: Option<AdType>,
    pub slot: Option<u32>,
    pub approval_status: Option<AdApproval>,
}

impl AdFilter {
    pub fn matches(&self, ad: &Advertisement) -> bool {
        self.shop_id.map_or(true, |id| ad.shop_id == id)
            && self.ad_type.map_or(true, |t| ad.ad_type == t)
            && self.slot.map_or(true, |s| ad.slot == s)
            && self.approval_status.map_or(true, |s| ad.approval_status == s)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyFilter {
    pub status: Option<PropertyStatus>,
    pub listing_type: Option<ListingType>,
    pub district: Option<String>,
    pub max_price_cents: Option<i64>,
    pub owner_id: Option<Uuid>,
}

impl PropertyFilter {
    pub fn matches(&self, property: &Property) -> bool {
        self.status.map_or(true, |s| property.status == s)
            && self.listing_type.map_or(true, |t| property.listing_type == t)
            && self
                .district
                .as_deref()
                .map_or(true, |d| property.district.eq_ignore_ascii_case(d.trim()))
            && self
                .max_price_cents
                .map_or(true, |max| property.price_cents <= max)
            && self.owner_id.map_or(true, |id| property.owner_id == id)
    }
}

/// Checks every cart line against `available` stock lookups.
///
/// Shared by both backends so they reject a checkout the same way.
pub(crate) fn check_stock<F>(orders: &[Order], mut available: F) -> Result<()>
where
    F: FnMut(Uuid) -> Result<Option<(String, u32)>>,
{
    use crate::error::MarketError;
    use std::collections::HashMap;

    let mut requested: HashMap<Uuid, u32> = HashMap::new();
    for item in orders.iter().flat_map(|o| o.cart.iter()) {
        let total = requested.entry(item.product_id).or_default();
        *total = total
            .checked_add(item.quantity)
            .ok_or_else(|| MarketError::Validation("quantity too large".to_string()))?;
    }

    for (product_id, quantity) in requested {
        let (name, stock) =
            available(product_id)?.ok_or_else(|| MarketError::not_found("Product", product_id))?;
        if stock < quantity {
            return Err(MarketError::InsufficientStock {
                product: name,
                requested: quantity,
                available: stock,
            });
        }
    }
    Ok(())
}

/// Puts a cancelled cart back on the shelf.
pub(crate) fn restock(product: &mut Product, quantity: u32) {
    product.stock = product.stock.saturating_add(quantity);
    product.sold_count = product.sold_count.saturating_sub(quantity);
}
