use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::access::load_shop;
use super::delivery::{resolve_delivery_fee, DeliveryQuote};
use super::validation::{require_non_empty, require_phone};
use crate::domain::*;
use crate::error::{MarketError, Result};
use crate::observability::metrics;
use crate::storage::Storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    pub delivery_method: DeliveryMethod,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub orders: Vec<Order>,
    pub grand_total_cents: i64,
}

/// Turns a multi-vendor cart into one order per shop.
///
/// Prices are snapshotted from the catalog, delivery fees are resolved per
/// shop, and the orders are stored through [`Storage::place_orders`] so stock
/// and order numbers change only if every order is accepted.
pub async fn checkout(
    storage: &dyn Storage,
    numbering: &OrderNumberFormat,
    actor: &Actor,
    request: CheckoutRequest,
) -> Result<CheckoutReceipt> {
    let started = Instant::now();
    let result = build_and_place(storage, numbering, actor, request).await;
    match &result {
        Ok(receipt) => {
            metrics::record_checkout(
                receipt.orders.len(),
                receipt.grand_total_cents,
                started.elapsed().as_secs_f64(),
            );
            info!(
                buyer = %actor.user_id,
                orders = receipt.orders.len(),
                total_cents = receipt.grand_total_cents,
                "Checkout completed"
            );
        }
        Err(e) => {
            let reason = match e {
                MarketError::InsufficientStock { .. } => "stock",
                MarketError::Validation(_) => "validation",
                MarketError::NotFound { .. } => "not_found",
                _ => "other",
            };
            metrics::record_checkout_failure(reason);
            warn!(buyer = %actor.user_id, error = %e, "Checkout rejected");
        }
    }
    result
}

async fn build_and_place(
    storage: &dyn Storage,
    numbering: &OrderNumberFormat,
    actor: &Actor,
    request: CheckoutRequest,
) -> Result<CheckoutReceipt> {
    validate_request(&request)?;

    // Merge repeated lines for the same product
    let mut quantities: BTreeMap<Uuid, u32> = BTreeMap::new();
    for line in &request.items {
        let quantity = quantities.entry(line.product_id).or_default();
        *quantity = quantity
            .checked_add(line.quantity)
            .ok_or_else(too_large("quantity"))?;
    }

    let mut by_shop: BTreeMap<Uuid, Vec<CartItem>> = BTreeMap::new();
    for (product_id, quantity) in quantities {
        let product = storage
            .get_product(product_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Product", product_id))?;
        by_shop.entry(product.shop_id).or_default().push(CartItem {
            product_id: product.id,
            shop_id: product.shop_id,
            name: product.name,
            unit_price_cents: product.price_cents,
            quantity,
        });
    }

    let mut orders = Vec::with_capacity(by_shop.len());
    for (shop_id, cart) in by_shop {
        let shop = load_shop(storage, shop_id).await?;
        if !shop.is_approved() {
            return Err(MarketError::Validation(format!(
                "{} is not accepting orders",
                shop.name
            )));
        }
        orders.push(build_order(&shop, actor, cart, &request)?);
    }

    let orders = storage.place_orders(orders, numbering).await?;
    let grand_total_cents = orders
        .iter()
        .try_fold(0i64, |sum, o| sum.checked_add(o.total_cents))
        .ok_or_else(too_large("order total"))?;
    Ok(CheckoutReceipt {
        orders,
        grand_total_cents,
    })
}

fn too_large(what: &'static str) -> impl FnOnce() -> MarketError {
    move || MarketError::Validation(format!("{what} too large"))
}

fn validate_request(request: &CheckoutRequest) -> Result<()> {
    if request.items.is_empty() {
        return Err(MarketError::Validation("Cart is empty".to_string()));
    }
    if request.items.iter().any(|line| line.quantity == 0) {
        return Err(MarketError::Validation(
            "Quantities must be at least 1".to_string(),
        ));
    }

    let address = &request.shipping_address;
    require_non_empty("recipient", &address.recipient)?;
    require_phone("phone", &address.phone)?;
    if request.delivery_method == DeliveryMethod::Delivery {
        let has_location = address
            .address_line
            .as_deref()
            .map_or(false, |line| !line.trim().is_empty());
        if !has_location {
            return Err(MarketError::Validation(
                "Delivery orders need an address line".to_string(),
            ));
        }
    }
    Ok(())
}

fn build_order(
    shop: &Shop,
    actor: &Actor,
    cart: Vec<CartItem>,
    request: &CheckoutRequest,
) -> Result<Order> {
    let subtotal_cents = cart
        .iter()
        .try_fold(0i64, |sum, item| sum.checked_add(item.line_total_cents()?))
        .ok_or_else(too_large("order subtotal"))?;
    let quote = resolve_delivery_fee(
        &shop.delivery,
        request.delivery_method,
        request.shipping_address.district.as_deref(),
        subtotal_cents,
    )?;

    let payee_email = match request.payment_method {
        PaymentMethod::Paypal => Some(shop.paypal_email.clone().ok_or_else(|| {
            MarketError::Validation(format!("{} does not accept PayPal", shop.name))
        })?),
        PaymentMethod::CashOnDelivery => None,
    };

    let now = Utc::now();
    Ok(Order {
        id: Uuid::new_v4(),
        order_number: None,
        shop_id: shop.id,
        buyer_id: actor.user_id,
        cart,
        shipping_address: request.shipping_address.clone(),
        payment: PaymentInfo {
            method: request.payment_method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            payee_email,
        },
        delivery_method: request.delivery_method,
        delivery_fee_cents: quote.fee_cents,
        subtotal_cents,
        total_cents: subtotal_cents
            .checked_add(quote.fee_cents)
            .ok_or_else(too_large("order total"))?,
        status: OrderStatus::Processing,
        status_history: vec![StatusChange {
            status: OrderStatus::Processing,
            note: Some("Order placed".to_string()),
            changed_by: Some(actor.user_id),
            changed_at: now,
        }],
        paid_at: None,
        delivered_at: None,
        created_at: now,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub shop_id: Uuid,
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub subtotal_cents: i64,
}

/// Fee preview for the cart page; does not touch stock.
pub async fn delivery_quote(storage: &dyn Storage, request: QuoteRequest) -> Result<DeliveryQuote> {
    let shop = load_shop(storage, request.shop_id).await?;
    resolve_delivery_fee(
        &shop.delivery,
        request.delivery_method,
        request.district.as_deref(),
        request.subtotal_cents,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    struct Fixture {
        storage: InMemoryStorage,
        buyer: Actor,
        shop: Shop,
        mango: Product,
    }

    async fn fixture() -> Fixture {
        let storage = InMemoryStorage::new();
        let mut shop = Shop::register(
            Uuid::new_v4(),
            NewShop {
                name: "Bodden Town Produce".to_string(),
                email: "farm@bt.ky".to_string(),
                phone: None,
                address: None,
                paypal_email: Some("farm-pay@bt.ky".to_string()),
                delivery: Some(DeliveryConfig {
                    delivery_enabled: true,
                    collect_enabled: true,
                    district_fees: vec![DistrictFee {
                        district: "Bodden Town".to_string(),
                        fee_cents: 500,
                    }],
                    default_fee_cents: 1_200,
                    free_delivery_threshold_cents: Some(5_000),
                }),
            },
        );
        shop.approval_status = ApprovalStatus::Approved;
        storage.create_shop(&shop).await.unwrap();

        let mango = Product::new(
            shop.id,
            NewProduct {
                name: "Mango".to_string(),
                description: None,
                category: None,
                price_cents: 300,
                stock: 10,
                images: vec![],
            },
        );
        storage.create_product(&mango).await.unwrap();

        Fixture {
            storage,
            buyer: Actor::buyer(Uuid::new_v4()),
            shop,
            mango,
        }
    }

    fn request(items: Vec<CartLine>, method: DeliveryMethod) -> CheckoutRequest {
        CheckoutRequest {
            items,
            shipping_address: ShippingAddress {
                recipient: "Ana Ebanks".to_string(),
                phone: "+1 345 555 0101".to_string(),
                district: Some("Bodden Town".to_string()),
                address_line: Some("12 Coe Wood Rd".to_string()),
                notes: None,
            },
            delivery_method: method,
            payment_method: PaymentMethod::Paypal,
        }
    }

    #[tokio::test]
    async fn test_checkout_assigns_numbers_and_decrements_stock() {
        let f = fixture().await;
        let numbering = OrderNumberFormat::default();
        let line = CartLine {
            product_id: f.mango.id,
            quantity: 2,
        };

        let first = checkout(&f.storage, &numbering, &f.buyer, request(vec![line.clone()], DeliveryMethod::Delivery))
            .await
            .unwrap();
        let second = checkout(&f.storage, &numbering, &f.buyer, request(vec![line], DeliveryMethod::Collect))
            .await
            .unwrap();

        let a = &first.orders[0];
        assert_eq!(a.order_number.as_deref(), Some("wanttar-00001"));
        assert_eq!(a.subtotal_cents, 600);
        assert_eq!(a.delivery_fee_cents, 500);
        assert_eq!(a.total_cents, 1_100);
        assert_eq!(a.payment.payee_email.as_deref(), Some("farm-pay@bt.ky"));
        assert_eq!(a.status_history.len(), 1);

        let b = &second.orders[0];
        assert_eq!(b.order_number.as_deref(), Some("wanttar-00002"));
        assert_eq!(b.delivery_fee_cents, 0);

        let mango = f.storage.get_product(f.mango.id).await.unwrap().unwrap();
        assert_eq!(mango.stock, 6);
        assert_eq!(mango.sold_count, 4);
        assert_eq!(f.shop.id, a.shop_id);
    }

    #[tokio::test]
    async fn test_free_delivery_threshold() {
        let f = fixture().await;
        let receipt = checkout(
            &f.storage,
            &OrderNumberFormat::default(),
            &f.buyer,
            request(
                vec![CartLine {
                    product_id: f.mango.id,
                    quantity: 10,
                }],
                DeliveryMethod::Delivery,
            ),
        )
        .await
        .unwrap();
        assert_eq!(receipt.orders[0].subtotal_cents, 3_000);
        assert_eq!(receipt.orders[0].delivery_fee_cents, 500);

        // Restock and buy enough to cross the threshold
        f.storage
            .modify_product(f.mango.id, &|p: &mut Product| {
                p.stock = 50;
                Ok(())
            })
            .await
            .unwrap();
        let receipt = checkout(
            &f.storage,
            &OrderNumberFormat::default(),
            &f.buyer,
            request(
                vec![CartLine {
                    product_id: f.mango.id,
                    quantity: 20,
                }],
                DeliveryMethod::Delivery,
            ),
        )
        .await
        .unwrap();
        assert_eq!(receipt.orders[0].delivery_fee_cents, 0);
        assert_eq!(receipt.grand_total_cents, 6_000);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let f = fixture().await;
        let err = checkout(
            &f.storage,
            &OrderNumberFormat::default(),
            &f.buyer,
            request(
                vec![
                    CartLine {
                        product_id: f.mango.id,
                        quantity: 6,
                    },
                    CartLine {
                        product_id: f.mango.id,
                        quantity: 6,
                    },
                ],
                DeliveryMethod::Collect,
            ),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            MarketError::InsufficientStock {
                requested: 12,
                available: 10,
                ..
            }
        ));

        let mango = f.storage.get_product(f.mango.id).await.unwrap().unwrap();
        assert_eq!(mango.stock, 10);
        assert!(f
            .storage
            .list_orders(&Default::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unapproved_shop_rejects_orders() {
        let f = fixture().await;
        let mut shop = f.shop.clone();
        shop.approval_status = ApprovalStatus::Pending;
        f.storage.update_shop(&shop).await.unwrap();

        let err = checkout(
            &f.storage,
            &OrderNumberFormat::default(),
            &f.buyer,
            request(
                vec![CartLine {
                    product_id: f.mango.id,
                    quantity: 1,
                }],
                DeliveryMethod::Collect,
            ),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_cart_and_zero_quantity() {
        let f = fixture().await;
        let numbering = OrderNumberFormat::default();
        assert!(checkout(&f.storage, &numbering, &f.buyer, request(vec![], DeliveryMethod::Collect))
            .await
            .is_err());
        assert!(checkout(
            &f.storage,
            &numbering,
            &f.buyer,
            request(
                vec![CartLine {
                    product_id: f.mango.id,
                    quantity: 0
                }],
                DeliveryMethod::Collect
            )
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn test_oversized_quantities_are_rejected() {
        let f = fixture().await;
        let numbering = OrderNumberFormat::default();
        let err = checkout(
            &f.storage,
            &numbering,
            &f.buyer,
            request(
                vec![
                    CartLine {
                        product_id: f.mango.id,
                        quantity: u32::MAX,
                    },
                    CartLine {
                        product_id: f.mango.id,
                        quantity: 2,
                    },
                ],
                DeliveryMethod::Collect,
            ),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketError::Validation(ref m) if m.contains("too large")));

        // Price times quantity past i64 range
        let gold = Product::new(
            f.shop.id,
            NewProduct {
                name: "Gold doubloon".to_string(),
                description: None,
                category: None,
                price_cents: i64::MAX / 2,
                stock: 10,
                images: vec![],
            },
        );
        f.storage.create_product(&gold).await.unwrap();
        let err = checkout(
            &f.storage,
            &numbering,
            &f.buyer,
            request(
                vec![CartLine {
                    product_id: gold.id,
                    quantity: 3,
                }],
                DeliveryMethod::Collect,
            ),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));

        let mango = f.storage.get_product(f.mango.id).await.unwrap().unwrap();
        assert_eq!(mango.stock, 10);
        let gold = f.storage.get_product(gold.id).await.unwrap().unwrap();
        assert_eq!(gold.stock, 10);
        assert!(f
            .storage
            .list_orders(&Default::default())
            .await
            .unwrap()
            .is_empty());
    }
}
