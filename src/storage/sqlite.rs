use super::{
    check_stock, restock, AdFilter, AdMutation, OrderFilter, OrderMutation, ProductMutation,
    PropertyFilter, StockEffect, Storage,
};
use crate::constants::ORDER_NUMBER_SEQUENCE;
use crate::domain::*;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

const SHOP: &str = "shop";
const PRODUCT: &str = "product";
const ORDER: &str = "order";
const AD: &str = "advertisement";
const FAQ: &str = "faq";
const PROPERTY: &str = "property";

/// SQLite storage: one JSON document per entity plus a sequences table.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening SQLite database at {}", db_path.display());
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Creates tables and indexes; safe to run repeatedly.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS documents (
                id          TEXT PRIMARY KEY,
                kind        TEXT NOT NULL,
                data        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_kind ON documents(kind);
            CREATE TABLE IF NOT EXISTS sequences (
                name   TEXT PRIMARY KEY,
                value  INTEGER NOT NULL
            );
            "#,
        )?;
        debug!("SQLite migrations applied");
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| MarketError::Database {
            message: format!("connection lock poisoned: {e}"),
        })
    }
}

fn insert_doc<T: Serialize>(conn: &Connection, kind: &str, id: Uuid, value: &T) -> Result<()> {
    let data = serde_json::to_string(value)?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO documents (id, kind, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        params![id.to_string(), kind, data, now],
    )?;
    Ok(())
}

fn put_doc<T: Serialize>(
    conn: &Connection,
    kind: &str,
    id: Uuid,
    value: &T,
    entity: &'static str,
) -> Result<()> {
    let data = serde_json::to_string(value)?;
    let changed = conn.execute(
        "UPDATE documents SET data = ?1, updated_at = ?2 WHERE id = ?3 AND kind = ?4",
        params![data, Utc::now().to_rfc3339(), id.to_string(), kind],
    )?;
    if changed == 0 {
        return Err(MarketError::not_found(entity, id));
    }
    Ok(())
}

fn get_doc<T: DeserializeOwned>(conn: &Connection, kind: &str, id: Uuid) -> Result<Option<T>> {
    let mut stmt = conn.prepare("SELECT data FROM documents WHERE id = ?1 AND kind = ?2")?;
    let mut rows = stmt.query(params![id.to_string(), kind])?;
    if let Some(row) = rows.next()? {
        let data: String = row.get(0)?;
        Ok(Some(serde_json::from_str(&data)?))
    } else {
        Ok(None)
    }
}

fn list_docs<T: DeserializeOwned>(conn: &Connection, kind: &str) -> Result<Vec<T>> {
    let mut stmt =
        conn.prepare("SELECT data FROM documents WHERE kind = ?1 ORDER BY created_at, id")?;
    let mut rows = stmt.query(params![kind])?;
    let mut docs = Vec::new();
    while let Some(row) = rows.next()? {
        let data: String = row.get(0)?;
        docs.push(serde_json::from_str(&data)?);
    }
    Ok(docs)
}

fn delete_doc(conn: &Connection, kind: &str, id: Uuid) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM documents WHERE id = ?1 AND kind = ?2",
        params![id.to_string(), kind],
    )?;
    Ok(removed > 0)
}

/// Takes the write lock up front so read-check-write units cannot interleave
/// with another process on the same file.
fn write_tx(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn bump_sequence(tx: &Transaction<'_>, name: &str) -> Result<u64> {
    tx.execute(
        "INSERT INTO sequences (name, value) VALUES (?1, 1)
         ON CONFLICT(name) DO UPDATE SET value = value + 1",
        params![name],
    )?;
    let value: i64 = tx.query_row(
        "SELECT value FROM sequences WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(value as u64)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn next_sequence(&self, name: &str) -> Result<u64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let value = bump_sequence(&tx, name)?;
        tx.commit()?;
        Ok(value)
    }

    async fn create_shop(&self, shop: &Shop) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM documents WHERE kind = ?1 AND json_extract(data, '$.owner_id') = ?2",
            params![SHOP, shop.owner_id.to_string()],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(MarketError::Conflict(
                "You already have a registered shop".to_string(),
            ));
        }
        insert_doc(&tx, SHOP, shop.id, shop)?;
        tx.commit()?;
        debug!("Created shop: {} with id {}", shop.name, shop.id);
        Ok(())
    }

    async fn get_shop(&self, shop_id: Uuid) -> Result<Option<Shop>> {
        get_doc(&*self.conn()?, SHOP, shop_id)
    }

    async fn update_shop(&self, shop: &Shop) -> Result<()> {
        put_doc(&*self.conn()?, SHOP, shop.id, shop, "Shop")
    }

    async fn list_shops(&self, status: Option<ApprovalStatus>) -> Result<Vec<Shop>> {
        let mut shops: Vec<Shop> = list_docs(&*self.conn()?, SHOP)?;
        shops.retain(|s| status.map_or(true, |st| s.approval_status == st));
        shops.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(shops)
    }

    async fn create_product(&self, product: &Product) -> Result<()> {
        insert_doc(&*self.conn()?, PRODUCT, product.id, product)
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        get_doc(&*self.conn()?, PRODUCT, product_id)
    }

    async fn modify_product(
        &self,
        product_id: Uuid,
        mutate: ProductMutation<'_>,
    ) -> Result<Product> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let mut product: Product = get_doc(&tx, PRODUCT, product_id)?
            .ok_or_else(|| MarketError::not_found("Product", product_id))?;
        mutate(&mut product)?;
        put_doc(&tx, PRODUCT, product.id, &product, "Product")?;
        tx.commit()?;
        Ok(product)
    }

    async fn list_products_by_shop(&self, shop_id: Uuid) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = list_docs(&*self.conn()?, PRODUCT)?;
        products.retain(|p| p.shop_id == shop_id);
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn place_orders(
        &self,
        mut orders: Vec<Order>,
        numbering: &OrderNumberFormat,
    ) -> Result<Vec<Order>> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;

        check_stock(&orders, |id| {
            let product: Option<Product> = get_doc(&tx, PRODUCT, id)?;
            Ok(product.map(|p| (p.name, p.stock)))
        })?;

        for item in orders.iter().flat_map(|o| o.cart.iter()) {
            let mut product: Product = get_doc(&tx, PRODUCT, item.product_id)?
                .ok_or_else(|| MarketError::not_found("Product", item.product_id))?;
            product.stock -= item.quantity;
            product.sold_count = product.sold_count.saturating_add(item.quantity);
            put_doc(&tx, PRODUCT, product.id, &product, "Product")?;
        }

        for order in orders.iter_mut() {
            if order.order_number.is_none() {
                let n = bump_sequence(&tx, ORDER_NUMBER_SEQUENCE)?;
                order.order_number = Some(numbering.format(n));
            }
            insert_doc(&tx, ORDER, order.id, order)?;
        }

        // Dropping the transaction on an early return rolls everything back
        tx.commit()?;
        debug!("Placed {} orders", orders.len());
        Ok(orders)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        get_doc(&*self.conn()?, ORDER, order_id)
    }

    async fn modify_order(
        &self,
        order_id: Uuid,
        mutate: OrderMutation<'_>,
    ) -> Result<Order> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let mut order: Order = get_doc(&tx, ORDER, order_id)?
            .ok_or_else(|| MarketError::not_found("Order", order_id))?;
        if mutate(&mut order)? == StockEffect::Restock {
            for item in &order.cart {
                let product: Option<Product> = get_doc(&tx, PRODUCT, item.product_id)?;
                if let Some(mut product) = product {
                    restock(&mut product, item.quantity);
                    put_doc(&tx, PRODUCT, product.id, &product, "Product")?;
                }
            }
        }
        put_doc(&tx, ORDER, order.id, &order, "Order")?;
        tx.commit()?;
        Ok(order)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = list_docs(&*self.conn()?, ORDER)?;
        orders.retain(|o| filter.matches(o));
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn create_ad(&self, ad: &Advertisement) -> Result<()> {
        insert_doc(&*self.conn()?, AD, ad.id, ad)?;
        debug!("Created advertisement {} in slot {}", ad.id, ad.slot_key());
        Ok(())
    }

    async fn get_ad(&self, ad_id: Uuid) -> Result<Option<Advertisement>> {
        get_doc(&*self.conn()?, AD, ad_id)
    }

    async fn modify_ad(
        &self,
        ad_id: Uuid,
        mutate: AdMutation<'_>,
    ) -> Result<Advertisement> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let mut ad: Advertisement = get_doc(&tx, AD, ad_id)?
            .ok_or_else(|| MarketError::not_found("Advertisement", ad_id))?;
        mutate(&mut ad)?;
        put_doc(&tx, AD, ad.id, &ad, "Advertisement")?;
        tx.commit()?;
        Ok(ad)
    }

    async fn list_ads(&self, filter: &AdFilter) -> Result<Vec<Advertisement>> {
        let mut ads: Vec<Advertisement> = list_docs(&*self.conn()?, AD)?;
        ads.retain(|a| filter.matches(a));
        Ok(ads)
    }

    async fn increment_ad_counter(
        &self,
        ad_id: Uuid,
        counter: AdCounter,
    ) -> Result<Advertisement> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let mut ad: Advertisement = get_doc(&tx, AD, ad_id)?
            .ok_or_else(|| MarketError::not_found("Advertisement", ad_id))?;
        match counter {
            AdCounter::View => ad.views += 1,
            AdCounter::Click => ad.clicks += 1,
        }
        put_doc(&tx, AD, ad.id, &ad, "Advertisement")?;
        tx.commit()?;
        Ok(ad)
    }

    async fn create_faq(&self, faq: &Faq) -> Result<()> {
        insert_doc(&*self.conn()?, FAQ, faq.id, faq)
    }

    async fn get_faq(&self, faq_id: Uuid) -> Result<Option<Faq>> {
        get_doc(&*self.conn()?, FAQ, faq_id)
    }

    async fn update_faq(&self, faq: &Faq) -> Result<()> {
        put_doc(&*self.conn()?, FAQ, faq.id, faq, "FAQ")
    }

    async fn list_faqs(&self, include_unpublished: bool) -> Result<Vec<Faq>> {
        let mut faqs: Vec<Faq> = list_docs(&*self.conn()?, FAQ)?;
        faqs.retain(|f| include_unpublished || f.published);
        faqs.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(faqs)
    }

    async fn delete_faqs(&self, faq_ids: &[Uuid]) -> Result<u64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for id in faq_ids {
            if delete_doc(&tx, FAQ, *id)? {
                deleted += 1;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    async fn create_property(&self, property: &Property) -> Result<()> {
        insert_doc(&*self.conn()?, PROPERTY, property.id, property)
    }

    async fn get_property(&self, property_id: Uuid) -> Result<Option<Property>> {
        get_doc(&*self.conn()?, PROPERTY, property_id)
    }

    async fn update_property(&self, property: &Property) -> Result<()> {
        put_doc(&*self.conn()?, PROPERTY, property.id, property, "Property")
    }

    async fn delete_property(&self, property_id: Uuid) -> Result<bool> {
        delete_doc(&*self.conn()?, PROPERTY, property_id)
    }

    async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>> {
        let mut properties: Vec<Property> = list_docs(&*self.conn()?, PROPERTY)?;
        properties.retain(|p| filter.matches(p));
        properties.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(properties)
    }
}
