use super::{
    check_stock, restock, AdFilter, AdMutation, OrderFilter, OrderMutation, ProductMutation,
    PropertyFilter, StockEffect, Storage,
};
use crate::domain::*;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    sequences: Arc<Mutex<HashMap<String, u64>>>,
    shops: Arc<Mutex<HashMap<Uuid, Shop>>>,
    products: Arc<Mutex<HashMap<Uuid, Product>>>,
    orders: Arc<Mutex<HashMap<Uuid, Order>>>,
    ads: Arc<Mutex<HashMap<Uuid, Advertisement>>>,
    faqs: Arc<Mutex<HashMap<Uuid, Faq>>>,
    properties: Arc<Mutex<HashMap<Uuid, Property>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            sequences: Arc::new(Mutex::new(HashMap::new())),
            shops: Arc::new(Mutex::new(HashMap::new())),
            products: Arc::new(Mutex::new(HashMap::new())),
            orders: Arc::new(Mutex::new(HashMap::new())),
            ads: Arc::new(Mutex::new(HashMap::new())),
            faqs: Arc::new(Mutex::new(HashMap::new())),
            properties: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| MarketError::Database {
        message: format!("storage lock poisoned: {e}"),
    })
}

fn replace<T: Clone>(
    map: &mut HashMap<Uuid, T>,
    id: Uuid,
    value: &T,
    entity: &'static str,
) -> Result<()> {
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(MarketError::not_found(entity, id)),
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn next_sequence(&self, name: &str) -> Result<u64> {
        let mut sequences = lock(&self.sequences)?;
        let value = sequences.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn create_shop(&self, shop: &Shop) -> Result<()> {
        let mut shops = lock(&self.shops)?;
        if shops.values().any(|s| s.owner_id == shop.owner_id) {
            return Err(MarketError::Conflict(
                "You already have a registered shop".to_string(),
            ));
        }
        shops.insert(shop.id, shop.clone());
        debug!("Created shop: {} with id {}", shop.name, shop.id);
        Ok(())
    }

    async fn get_shop(&self, shop_id: Uuid) -> Result<Option<Shop>> {
        Ok(lock(&self.shops)?.get(&shop_id).cloned())
    }

    async fn update_shop(&self, shop: &Shop) -> Result<()> {
        let mut shops = lock(&self.shops)?;
        replace(&mut shops, shop.id, shop, "Shop")
    }

    async fn list_shops(&self, status: Option<ApprovalStatus>) -> Result<Vec<Shop>> {
        let shops = lock(&self.shops)?;
        let mut found: Vec<Shop> = shops
            .values()
            .filter(|s| status.map_or(true, |st| s.approval_status == st))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn create_product(&self, product: &Product) -> Result<()> {
        let mut products = lock(&self.products)?;
        products.insert(product.id, product.clone());
        debug!("Created product: {} with id {}", product.name, product.id);
        Ok(())
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        Ok(lock(&self.products)?.get(&product_id).cloned())
    }

    async fn modify_product(
        &self,
        product_id: Uuid,
        mutate: ProductMutation<'_>,
    ) -> Result<Product> {
        let mut products = lock(&self.products)?;
        let stored = products
            .get_mut(&product_id)
            .ok_or_else(|| MarketError::not_found("Product", product_id))?;
        let mut product = stored.clone();
        mutate(&mut product)?;
        *stored = product.clone();
        Ok(product)
    }

    async fn list_products_by_shop(&self, shop_id: Uuid) -> Result<Vec<Product>> {
        let products = lock(&self.products)?;
        let mut found: Vec<Product> = products
            .values()
            .filter(|p| p.shop_id == shop_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn place_orders(
        &self,
        mut orders: Vec<Order>,
        numbering: &OrderNumberFormat,
    ) -> Result<Vec<Order>> {
        // Lock order: sequences, products, orders
        let mut sequences = lock(&self.sequences)?;
        let mut products = lock(&self.products)?;
        let mut stored = lock(&self.orders)?;

        check_stock(&orders, |id| {
            Ok(products.get(&id).map(|p| (p.name.clone(), p.stock)))
        })?;

        for item in orders.iter().flat_map(|o| o.cart.iter()) {
            if let Some(product) = products.get_mut(&item.product_id) {
                product.stock -= item.quantity;
                product.sold_count = product.sold_count.saturating_add(item.quantity);
            }
        }

        let counter = sequences
            .entry(crate::constants::ORDER_NUMBER_SEQUENCE.to_string())
            .or_insert(0);
        for order in orders.iter_mut() {
            if order.order_number.is_none() {
                *counter += 1;
                order.order_number = Some(numbering.format(*counter));
            }
            stored.insert(order.id, order.clone());
            debug!(
                "Placed order {} with id {}",
                order.order_number.as_deref().unwrap_or_default(),
                order.id
            );
        }

        Ok(orders)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        Ok(lock(&self.orders)?.get(&order_id).cloned())
    }

    async fn modify_order(
        &self,
        order_id: Uuid,
        mutate: OrderMutation<'_>,
    ) -> Result<Order> {
        // Lock order matches place_orders: products before orders
        let mut products = lock(&self.products)?;
        let mut orders = lock(&self.orders)?;
        let stored = orders
            .get_mut(&order_id)
            .ok_or_else(|| MarketError::not_found("Order", order_id))?;
        let mut order = stored.clone();
        if mutate(&mut order)? == StockEffect::Restock {
            for item in &order.cart {
                if let Some(product) = products.get_mut(&item.product_id) {
                    restock(product, item.quantity);
                }
            }
        }
        *stored = order.clone();
        Ok(order)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let orders = lock(&self.orders)?;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn create_ad(&self, ad: &Advertisement) -> Result<()> {
        let mut ads = lock(&self.ads)?;
        ads.insert(ad.id, ad.clone());
        debug!("Created advertisement {} in slot {}", ad.id, ad.slot_key());
        Ok(())
    }

    async fn get_ad(&self, ad_id: Uuid) -> Result<Option<Advertisement>> {
        Ok(lock(&self.ads)?.get(&ad_id).cloned())
    }

    async fn modify_ad(
        &self,
        ad_id: Uuid,
        mutate: AdMutation<'_>,
    ) -> Result<Advertisement> {
        let mut ads = lock(&self.ads)?;
        let stored = ads
            .get_mut(&ad_id)
            .ok_or_else(|| MarketError::not_found("Advertisement", ad_id))?;
        let mut ad = stored.clone();
        mutate(&mut ad)?;
        *stored = ad.clone();
        Ok(ad)
    }

    async fn list_ads(&self, filter: &AdFilter) -> Result<Vec<Advertisement>> {
        let ads = lock(&self.ads)?;
        let mut found: Vec<Advertisement> =
            ads.values().filter(|a| filter.matches(a)).cloned().collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn increment_ad_counter(
        &self,
        ad_id: Uuid,
        counter: AdCounter,
    ) -> Result<Advertisement> {
        let mut ads = lock(&self.ads)?;
        let ad = ads
            .get_mut(&ad_id)
            .ok_or_else(|| MarketError::not_found("Advertisement", ad_id))?;
        match counter {
            AdCounter::View => ad.views += 1,
            AdCounter::Click => ad.clicks += 1,
        }
        Ok(ad.clone())
    }

    async fn create_faq(&self, faq: &Faq) -> Result<()> {
        lock(&self.faqs)?.insert(faq.id, faq.clone());
        Ok(())
    }

    async fn get_faq(&self, faq_id: Uuid) -> Result<Option<Faq>> {
        Ok(lock(&self.faqs)?.get(&faq_id).cloned())
    }

    async fn update_faq(&self, faq: &Faq) -> Result<()> {
        let mut faqs = lock(&self.faqs)?;
        replace(&mut faqs, faq.id, faq, "FAQ")
    }

    async fn list_faqs(&self, include_unpublished: bool) -> Result<Vec<Faq>> {
        let faqs = lock(&self.faqs)?;
        let mut found: Vec<Faq> = faqs
            .values()
            .filter(|f| include_unpublished || f.published)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(found)
    }

    async fn delete_faqs(&self, faq_ids: &[Uuid]) -> Result<u64> {
        let mut faqs = lock(&self.faqs)?;
        let mut deleted = 0;
        for id in faq_ids {
            if faqs.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn create_property(&self, property: &Property) -> Result<()> {
        lock(&self.properties)?.insert(property.id, property.clone());
        Ok(())
    }

    async fn get_property(&self, property_id: Uuid) -> Result<Option<Property>> {
        Ok(lock(&self.properties)?.get(&property_id).cloned())
    }

    async fn update_property(&self, property: &Property) -> Result<()> {
        let mut properties = lock(&self.properties)?;
        replace(&mut properties, property.id, property, "Property")
    }

    async fn delete_property(&self, property_id: Uuid) -> Result<bool> {
        Ok(lock(&self.properties)?.remove(&property_id).is_some())
    }

    async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>> {
        let properties = lock(&self.properties)?;
        let mut found: Vec<Property> = properties
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
