use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::access::{ensure_dashboard_access, load_shop, require_admin};
use super::validation::{require_email, require_non_empty, require_non_negative};
use crate::domain::*;
use crate::error::{MarketError, Result};
use crate::observability::metrics;
use crate::storage::{AdFilter, OrderFilter, Storage};

/// Registers a shop for the caller. New shops wait for admin approval.
pub async fn register_shop(storage: &dyn Storage, actor: &Actor, new_shop: NewShop) -> Result<Shop> {
    require_non_empty("name", &new_shop.name)?;
    require_email("email", &new_shop.email)?;
    if let Some(paypal) = new_shop.paypal_email.as_deref() {
        require_email("paypal_email", paypal)?;
    }
    if let Some(delivery) = new_shop.delivery.as_ref() {
        validate_delivery_config(delivery)?;
    }

    // Storage rejects a second shop for the same owner
    let shop = Shop::register(actor.user_id, new_shop);
    storage.create_shop(&shop).await?;
    metrics::record_shop_registered();
    info!(shop_id = %shop.id, name = %shop.name, "Shop registered, awaiting approval");
    Ok(shop)
}

pub async fn approve_shop(storage: &dyn Storage, actor: &Actor, shop_id: Uuid) -> Result<Shop> {
    require_admin(actor)?;
    let mut shop = load_shop(storage, shop_id).await?;
    if shop.approval_status == ApprovalStatus::Approved {
        return Err(MarketError::Conflict("Shop is already approved".to_string()));
    }

    shop.approval_status = ApprovalStatus::Approved;
    shop.rejection_reason = None;
    shop.approved_at = Some(Utc::now());
    storage.update_shop(&shop).await?;

    metrics::record_approval_decision(shop.approval_status);
    info!(shop_id = %shop.id, admin = %actor.user_id, "Shop approved");
    Ok(shop)
}

pub async fn reject_shop(
    storage: &dyn Storage,
    actor: &Actor,
    shop_id: Uuid,
    reason: &str,
) -> Result<Shop> {
    require_admin(actor)?;
    require_non_empty("reason", reason)?;
    let mut shop = load_shop(storage, shop_id).await?;
    if shop.approval_status != ApprovalStatus::Pending {
        return Err(MarketError::InvalidTransition {
            from: shop.approval_status.to_string(),
            to: ApprovalStatus::Rejected.to_string(),
        });
    }

    shop.approval_status = ApprovalStatus::Rejected;
    shop.rejection_reason = Some(reason.trim().to_string());
    storage.update_shop(&shop).await?;

    metrics::record_approval_decision(shop.approval_status);
    info!(shop_id = %shop.id, admin = %actor.user_id, "Shop rejected");
    Ok(shop)
}

/// Puts a rejected shop back in the review queue.
pub async fn resubmit_shop(storage: &dyn Storage, actor: &Actor, shop_id: Uuid) -> Result<Shop> {
    let mut shop = load_shop(storage, shop_id).await?;
    if shop.owner_id != actor.user_id {
        return Err(MarketError::Forbidden(
            "Only the shop owner can resubmit".to_string(),
        ));
    }
    if shop.approval_status != ApprovalStatus::Rejected {
        return Err(MarketError::InvalidTransition {
            from: shop.approval_status.to_string(),
            to: ApprovalStatus::Pending.to_string(),
        });
    }

    shop.approval_status = ApprovalStatus::Pending;
    shop.rejection_reason = None;
    storage.update_shop(&shop).await?;
    Ok(shop)
}

pub async fn set_ad_fee_exempt(
    storage: &dyn Storage,
    actor: &Actor,
    shop_id: Uuid,
    exempt: bool,
) -> Result<Shop> {
    require_admin(actor)?;
    let mut shop = load_shop(storage, shop_id).await?;
    shop.ad_fee_exempt = exempt;
    storage.update_shop(&shop).await?;
    info!(shop_id = %shop.id, exempt, "Ad fee exemption updated");
    Ok(shop)
}

pub async fn update_delivery_config(
    storage: &dyn Storage,
    actor: &Actor,
    shop_id: Uuid,
    delivery: DeliveryConfig,
) -> Result<Shop> {
    validate_delivery_config(&delivery)?;
    let mut shop = ensure_dashboard_access(storage, actor, shop_id).await?;
    shop.delivery = delivery;
    storage.update_shop(&shop).await?;
    Ok(shop)
}

fn validate_delivery_config(delivery: &DeliveryConfig) -> Result<()> {
    require_non_negative("default_fee_cents", delivery.default_fee_cents)?;
    if let Some(threshold) = delivery.free_delivery_threshold_cents {
        require_non_negative("free_delivery_threshold_cents", threshold)?;
    }
    for fee in &delivery.district_fees {
        require_non_empty("district", &fee.district)?;
        require_non_negative("fee_cents", fee.fee_cents)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub shop: Shop,
    pub product_count: usize,
    pub order_count: usize,
    pub open_orders: usize,
    pub revenue_cents: i64,
    pub live_ads: usize,
}

/// Overview for the seller dashboard; requires an approved shop.
pub async fn dashboard(storage: &dyn Storage, actor: &Actor, shop_id: Uuid) -> Result<DashboardSummary> {
    let shop = ensure_dashboard_access(storage, actor, shop_id).await?;

    let products = storage.list_products_by_shop(shop.id).await?;
    let orders = storage
        .list_orders(&OrderFilter {
            shop_id: Some(shop.id),
            ..Default::default()
        })
        .await?;
    let ads = storage
        .list_ads(&AdFilter {
            shop_id: Some(shop.id),
            ..Default::default()
        })
        .await?;

    let now = Utc::now();
    let open_orders = orders
        .iter()
        .filter(|o| {
            !o.status.is_fulfilled()
                && !matches!(o.status, OrderStatus::Cancelled | OrderStatus::RefundSuccess)
        })
        .count();
    let revenue_cents = orders
        .iter()
        .filter(|o| o.payment.status == PaymentStatus::Captured)
        .map(|o| o.total_cents)
        .sum();

    Ok(DashboardSummary {
        product_count: products.len(),
        order_count: orders.len(),
        open_orders,
        revenue_cents,
        live_ads: ads.iter().filter(|a| a.is_live(now)).count(),
        shop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn new_shop() -> NewShop {
        NewShop {
            name: "Seven Mile Surf".to_string(),
            email: "Owner@SevenMile.ky".to_string(),
            phone: None,
            address: None,
            paypal_email: Some("pay@sevenmile.ky".to_string()),
            delivery: None,
        }
    }

    #[tokio::test]
    async fn test_approval_unlocks_dashboard() {
        let storage = InMemoryStorage::new();
        let owner = Actor::buyer(Uuid::new_v4());
        let admin = Actor::admin(Uuid::new_v4());

        let shop = register_shop(&storage, &owner, new_shop()).await.unwrap();
        assert_eq!(shop.approval_status, ApprovalStatus::Pending);
        assert_eq!(shop.email, "owner@sevenmile.ky");

        let seller = Actor::seller(owner.user_id, shop.id);
        let err = dashboard(&storage, &seller, shop.id).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        let approved = approve_shop(&storage, &admin, shop.id).await.unwrap();
        assert_eq!(approved.approval_status, ApprovalStatus::Approved);
        assert!(approved.approved_at.is_some());

        let summary = dashboard(&storage, &seller, shop.id).await.unwrap();
        assert_eq!(summary.shop.id, shop.id);
        assert_eq!(summary.order_count, 0);
    }

    #[tokio::test]
    async fn test_reject_and_resubmit() {
        let storage = InMemoryStorage::new();
        let owner = Actor::buyer(Uuid::new_v4());
        let admin = Actor::admin(Uuid::new_v4());
        let shop = register_shop(&storage, &owner, new_shop()).await.unwrap();

        assert!(reject_shop(&storage, &admin, shop.id, "  ").await.is_err());
        let rejected = reject_shop(&storage, &admin, shop.id, "Missing trade licence")
            .await
            .unwrap();
        assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Missing trade licence"));

        // Rejecting twice is not a valid move
        assert!(matches!(
            reject_shop(&storage, &admin, shop.id, "again").await,
            Err(MarketError::InvalidTransition { .. })
        ));

        let other = Actor::buyer(Uuid::new_v4());
        assert!(resubmit_shop(&storage, &other, shop.id).await.is_err());

        let pending = resubmit_shop(&storage, &owner, shop.id).await.unwrap();
        assert_eq!(pending.approval_status, ApprovalStatus::Pending);
        assert!(pending.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn test_only_admin_approves_and_one_shop_per_owner() {
        let storage = InMemoryStorage::new();
        let owner = Actor::buyer(Uuid::new_v4());
        let shop = register_shop(&storage, &owner, new_shop()).await.unwrap();

        assert!(matches!(
            approve_shop(&storage, &owner, shop.id).await,
            Err(MarketError::Forbidden(_))
        ));
        assert!(matches!(
            register_shop(&storage, &owner, new_shop()).await,
            Err(MarketError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_registration() {
        let storage = InMemoryStorage::new();
        let owner = Actor::buyer(Uuid::new_v4());
        let mut bad = new_shop();
        bad.email = "nope".to_string();
        assert!(matches!(
            register_shop(&storage, &owner, bad).await,
            Err(MarketError::Validation(_))
        ));
    }
}
