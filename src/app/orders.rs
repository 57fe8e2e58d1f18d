use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::access::ensure_dashboard_access;
use super::validation::require_non_empty;
use crate::domain::*;
use crate::error::{MarketError, Result};
use crate::observability::metrics;
use crate::storage::{OrderFilter, StockEffect, Storage};

async fn load_order(storage: &dyn Storage, order_id: Uuid) -> Result<Order> {
    storage
        .get_order(order_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Order", order_id))
}

fn is_shop_staff(actor: &Actor, order: &Order) -> bool {
    actor.works_for(order.shop_id)
}

/// An order is visible to its buyer, the selling shop's staff and admins.
pub async fn get_order(storage: &dyn Storage, actor: &Actor, order_id: Uuid) -> Result<Order> {
    let order = load_order(storage, order_id).await?;
    if order.buyer_id == actor.user_id || actor.is_admin() || is_shop_staff(actor, &order) {
        return Ok(order);
    }
    // Owners without a shop header still get through the dashboard gate
    ensure_dashboard_access(storage, actor, order.shop_id).await?;
    Ok(order)
}

pub async fn list_my_orders(storage: &dyn Storage, actor: &Actor) -> Result<Vec<Order>> {
    storage
        .list_orders(&OrderFilter {
            buyer_id: Some(actor.user_id),
            ..Default::default()
        })
        .await
}

pub async fn list_shop_orders(
    storage: &dyn Storage,
    actor: &Actor,
    shop_id: Uuid,
    status: Option<OrderStatus>,
) -> Result<Vec<Order>> {
    ensure_dashboard_access(storage, actor, shop_id).await?;
    storage
        .list_orders(&OrderFilter {
            shop_id: Some(shop_id),
            status,
            ..Default::default()
        })
        .await
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// Moves an order along its fulfilment path.
///
/// Shop staff and admins drive fulfilment; the buyer may only ask for a
/// refund on a delivered or collected order. The transition is checked
/// against the stored order inside [`Storage::modify_order`], so concurrent
/// updates cannot both apply.
pub async fn update_status(
    storage: &dyn Storage,
    actor: &Actor,
    order_id: Uuid,
    update: StatusUpdate,
) -> Result<Order> {
    let snapshot = load_order(storage, order_id).await?;

    if !actor.is_admin() {
        let is_buyer = snapshot.buyer_id == actor.user_id;
        if is_buyer && !is_shop_staff(actor, &snapshot) {
            if update.status != OrderStatus::ProcessingRefund {
                return Err(MarketError::Forbidden(
                    "Buyers can only request a refund".to_string(),
                ));
            }
        } else {
            // Staff of a shop that lost its approval cannot move orders
            ensure_dashboard_access(storage, actor, snapshot.shop_id).await?;
        }
    }

    let target = update.status;
    let order = storage
        .modify_order(order_id, &|order: &mut Order| {
            apply_status(order, target, update.note.clone(), actor.user_id)
        })
        .await?;

    let from = order
        .status_history
        .iter()
        .rev()
        .nth(1)
        .map_or(snapshot.status, |change| change.status);
    metrics::record_status_change(target);
    info!(
        order_id = %order.id,
        order_number = order.order_number.as_deref().unwrap_or("-"),
        %from,
        to = %target,
        "Order status updated"
    );
    Ok(order)
}

fn apply_status(
    order: &mut Order,
    status: OrderStatus,
    note: Option<String>,
    changed_by: Uuid,
) -> Result<StockEffect> {
    if !order.status.can_transition_to(status, order.delivery_method) {
        return Err(MarketError::InvalidTransition {
            from: order.status.to_string(),
            to: status.to_string(),
        });
    }
    if status == OrderStatus::Cancelled && order.payment.status == PaymentStatus::Captured {
        return Err(MarketError::Conflict(
            "Payment is already captured; fulfil the order and use the refund flow".to_string(),
        ));
    }

    let now = Utc::now();
    order.push_status(status, note, Some(changed_by));
    match status {
        status if status.is_fulfilled() => {
            order.delivered_at = Some(now);
            if order.payment.method == PaymentMethod::CashOnDelivery
                && order.payment.status == PaymentStatus::Pending
            {
                order.payment.status = PaymentStatus::Captured;
                order.paid_at = Some(now);
                metrics::record_payment_captured();
            }
        }
        OrderStatus::RefundSuccess => order.payment.status = PaymentStatus::Refunded,
        OrderStatus::Cancelled => return Ok(StockEffect::Restock),
        _ => {}
    }
    Ok(StockEffect::Keep)
}

/// Capture result reported by the buyer's PayPal client.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCapture {
    pub transaction_id: String,
    pub status: String,
}

pub async fn record_payment(
    storage: &dyn Storage,
    actor: &Actor,
    order_id: Uuid,
    capture: PaymentCapture,
) -> Result<Order> {
    require_non_empty("transaction_id", &capture.transaction_id)?;
    let snapshot = load_order(storage, order_id).await?;
    if snapshot.buyer_id != actor.user_id && !actor.is_admin() {
        return Err(MarketError::Forbidden(
            "Only the buyer can report a payment".to_string(),
        ));
    }
    if !capture.status.trim().eq_ignore_ascii_case("completed") {
        return Err(MarketError::Validation(format!(
            "Payment status '{}' is not a completed capture",
            capture.status
        )));
    }

    let transaction_id = capture.transaction_id.trim().to_string();
    let order = storage
        .modify_order(order_id, &|order: &mut Order| {
            if order.payment.method != PaymentMethod::Paypal {
                return Err(MarketError::Validation(
                    "Order is paid cash on delivery".to_string(),
                ));
            }
            if order.payment.status != PaymentStatus::Pending {
                let state = match order.payment.status {
                    PaymentStatus::Refunded => "refunded",
                    _ => "captured",
                };
                return Err(MarketError::Conflict(format!("Payment is already {state}")));
            }
            if order.status == OrderStatus::Cancelled {
                return Err(MarketError::Conflict("Order is cancelled".to_string()));
            }
            order.payment.status = PaymentStatus::Captured;
            order.payment.transaction_id = Some(transaction_id.clone());
            order.paid_at = Some(Utc::now());
            Ok(StockEffect::Keep)
        })
        .await?;

    metrics::record_payment_captured();
    info!(order_id = %order.id, "Payment captured");
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::checkout::{checkout, CartLine, CheckoutRequest};
    use crate::storage::InMemoryStorage;

    struct Fixture {
        storage: InMemoryStorage,
        buyer: Actor,
        seller: Actor,
        product: Product,
    }

    async fn fixture() -> Fixture {
        let storage = InMemoryStorage::new();
        let owner = Uuid::new_v4();
        let mut shop = Shop::register(
            owner,
            NewShop {
                name: "Rum Point Crafts".to_string(),
                email: "hello@rumpoint.ky".to_string(),
                phone: None,
                address: None,
                paypal_email: Some("pay@rumpoint.ky".to_string()),
                delivery: None,
            },
        );
        shop.approval_status = ApprovalStatus::Approved;
        storage.create_shop(&shop).await.unwrap();

        let product = Product::new(
            shop.id,
            NewProduct {
                name: "Driftwood frame".to_string(),
                description: None,
                category: None,
                price_cents: 2_500,
                stock: 5,
                images: vec![],
            },
        );
        storage.create_product(&product).await.unwrap();

        Fixture {
            storage,
            buyer: Actor::buyer(Uuid::new_v4()),
            seller: Actor::seller(owner, shop.id),
            product,
        }
    }

    async fn place(f: &Fixture, method: DeliveryMethod, payment: PaymentMethod) -> Order {
        let receipt = checkout(
            &f.storage,
            &OrderNumberFormat::default(),
            &f.buyer,
            CheckoutRequest {
                items: vec![CartLine {
                    product_id: f.product.id,
                    quantity: 2,
                }],
                shipping_address: ShippingAddress {
                    recipient: "Lee Bush".to_string(),
                    phone: "345-555-0199".to_string(),
                    district: Some("North Side".to_string()),
                    address_line: Some("Rum Point Dr".to_string()),
                    notes: None,
                },
                delivery_method: method,
                payment_method: payment,
            },
        )
        .await
        .unwrap();
        receipt.orders.into_iter().next().unwrap()
    }

    fn to(status: OrderStatus) -> StatusUpdate {
        StatusUpdate { status, note: None }
    }

    #[tokio::test]
    async fn test_delivery_path_captures_cash_on_delivery() {
        let f = fixture().await;
        let order = place(&f, DeliveryMethod::Delivery, PaymentMethod::CashOnDelivery).await;

        for status in [
            OrderStatus::Shipping,
            OrderStatus::OnTheWay,
            OrderStatus::Delivered,
        ] {
            update_status(&f.storage, &f.seller, order.id, to(status))
                .await
                .unwrap();
        }

        let order = get_order(&f.storage, &f.buyer, order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.status_history.len(), 4);
        assert!(order.delivered_at.is_some());
        assert_eq!(order.payment.status, PaymentStatus::Captured);
    }

    #[tokio::test]
    async fn test_invalid_transition_is_rejected() {
        let f = fixture().await;
        let order = place(&f, DeliveryMethod::Collect, PaymentMethod::Paypal).await;
        let err = update_status(&f.storage, &f.seller, order.id, to(OrderStatus::Shipping))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_buyer_can_only_request_refund() {
        let f = fixture().await;
        let order = place(&f, DeliveryMethod::Collect, PaymentMethod::Paypal).await;

        assert!(matches!(
            update_status(&f.storage, &f.buyer, order.id, to(OrderStatus::ReadyForCollection)).await,
            Err(MarketError::Forbidden(_))
        ));

        update_status(&f.storage, &f.seller, order.id, to(OrderStatus::ReadyForCollection))
            .await
            .unwrap();
        update_status(&f.storage, &f.seller, order.id, to(OrderStatus::Collected))
            .await
            .unwrap();
        update_status(&f.storage, &f.buyer, order.id, to(OrderStatus::ProcessingRefund))
            .await
            .unwrap();
        let refunded = update_status(&f.storage, &f.seller, order.id, to(OrderStatus::RefundSuccess))
            .await
            .unwrap();
        assert_eq!(refunded.payment.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_cancel_releases_stock() {
        let f = fixture().await;
        let order = place(&f, DeliveryMethod::Collect, PaymentMethod::Paypal).await;
        let product = f.storage.get_product(f.product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 3);

        update_status(&f.storage, &f.seller, order.id, to(OrderStatus::Cancelled))
            .await
            .unwrap();
        let product = f.storage.get_product(f.product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn test_payment_capture_once() {
        let f = fixture().await;
        let order = place(&f, DeliveryMethod::Collect, PaymentMethod::Paypal).await;
        let capture = PaymentCapture {
            transaction_id: "9XK12345AB".to_string(),
            status: "COMPLETED".to_string(),
        };

        let stranger = Actor::buyer(Uuid::new_v4());
        assert!(record_payment(&f.storage, &stranger, order.id, capture.clone())
            .await
            .is_err());

        let paid = record_payment(&f.storage, &f.buyer, order.id, capture.clone())
            .await
            .unwrap();
        assert_eq!(paid.payment.status, PaymentStatus::Captured);
        assert_eq!(paid.payment.transaction_id.as_deref(), Some("9XK12345AB"));
        assert!(paid.paid_at.is_some());

        assert!(matches!(
            record_payment(&f.storage, &f.buyer, order.id, capture).await,
            Err(MarketError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_order_visibility() {
        let f = fixture().await;
        let order = place(&f, DeliveryMethod::Collect, PaymentMethod::Paypal).await;
        let stranger = Actor::buyer(Uuid::new_v4());
        assert!(get_order(&f.storage, &stranger, order.id).await.is_err());
        assert!(get_order(&f.storage, &f.seller, order.id).await.is_ok());
        assert_eq!(list_my_orders(&f.storage, &f.buyer).await.unwrap().len(), 1);
        assert!(list_my_orders(&f.storage, &stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_captured_paypal_order_cannot_be_cancelled() {
        let f = fixture().await;
        let order = place(&f, DeliveryMethod::Collect, PaymentMethod::Paypal).await;
        let capture = PaymentCapture {
            transaction_id: "3FT77781QX".to_string(),
            status: "completed".to_string(),
        };
        record_payment(&f.storage, &f.buyer, order.id, capture)
            .await
            .unwrap();

        let err = update_status(&f.storage, &f.seller, order.id, to(OrderStatus::Cancelled))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
        let order = get_order(&f.storage, &f.buyer, order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        let product = f.storage.get_product(f.product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 3);
    }

    #[tokio::test]
    async fn test_cancelled_order_rejects_payment() {
        let f = fixture().await;
        let order = place(&f, DeliveryMethod::Collect, PaymentMethod::Paypal).await;
        update_status(&f.storage, &f.seller, order.id, to(OrderStatus::Cancelled))
            .await
            .unwrap();
        let capture = PaymentCapture {
            transaction_id: "LATE0001".to_string(),
            status: "COMPLETED".to_string(),
        };
        assert!(matches!(
            record_payment(&f.storage, &f.buyer, order.id, capture).await,
            Err(MarketError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_staff_of_rejected_shop_cannot_move_orders() {
        let f = fixture().await;
        let order = place(&f, DeliveryMethod::Collect, PaymentMethod::CashOnDelivery).await;

        let mut shop = f.storage.get_shop(order.shop_id).await.unwrap().unwrap();
        shop.approval_status = ApprovalStatus::Rejected;
        f.storage.update_shop(&shop).await.unwrap();

        let err = update_status(
            &f.storage,
            &f.seller,
            order.id,
            to(OrderStatus::ReadyForCollection),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        let admin = Actor::admin(Uuid::new_v4());
        update_status(&f.storage, &admin, order.id, to(OrderStatus::ReadyForCollection))
            .await
            .unwrap();
    }
}
