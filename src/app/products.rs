use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::access::ensure_dashboard_access;
use super::validation::{require_non_empty, require_non_negative};
use crate::domain::{Actor, NewProduct, Product};
use crate::error::{MarketError, Result};
use crate::storage::Storage;

/// Adds a product to the actor's (approved) shop.
pub async fn create_product(
    storage: &dyn Storage,
    actor: &Actor,
    shop_id: Uuid,
    new_product: NewProduct,
) -> Result<Product> {
    require_non_empty("name", &new_product.name)?;
    require_non_negative("price_cents", new_product.price_cents)?;
    let shop = ensure_dashboard_access(storage, actor, shop_id).await?;

    let product = Product::new(shop.id, new_product);
    storage.create_product(&product).await?;
    info!(product_id = %product.id, shop_id = %shop.id, "Product created");
    Ok(product)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockUpdate {
    pub price_cents: Option<i64>,
    pub stock: Option<u32>,
}

/// Patches price and stock only; `sold_count` and concurrent checkout
/// decrements are left as stored.
pub async fn update_product(
    storage: &dyn Storage,
    actor: &Actor,
    product_id: Uuid,
    update: StockUpdate,
) -> Result<Product> {
    if let Some(price) = update.price_cents {
        require_non_negative("price_cents", price)?;
    }
    let snapshot = storage
        .get_product(product_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Product", product_id))?;
    ensure_dashboard_access(storage, actor, snapshot.shop_id).await?;

    let product = storage
        .modify_product(product_id, &|product: &mut Product| {
            if let Some(price) = update.price_cents {
                product.price_cents = price;
            }
            if let Some(stock) = update.stock {
                product.stock = stock;
            }
            Ok(())
        })
        .await?;
    info!(product_id = %product.id, stock = product.stock, "Product updated");
    Ok(product)
}

pub async fn list_shop_products(storage: &dyn Storage, shop_id: Uuid) -> Result<Vec<Product>> {
    storage.list_products_by_shop(shop_id).await
}
