use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::access::{ensure_dashboard_access, require_admin};
use super::validation::require_non_empty;
use crate::config::AdsConfig;
use crate::constants::{ad_duration_discount, supported_ad_durations};
use crate::domain::*;
use crate::error::{MarketError, Result};
use crate::observability::metrics;
use crate::storage::{AdFilter, Storage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdQuote {
    pub ad_type: AdType,
    pub duration_months: u32,
    pub monthly_price_cents: i64,
    pub discount_percent: i64,
    pub price_cents: i64,
}

/// Price for running an ad of `ad_type` for `months`.
pub fn quote_price(config: &AdsConfig, ad_type: AdType, months: u32) -> Result<AdQuote> {
    let discount_percent = ad_duration_discount(months).ok_or_else(|| {
        MarketError::Validation(format!(
            "Ad duration must be one of {:?} months",
            supported_ad_durations()
        ))
    })?;
    let monthly_price_cents = config.for_type(ad_type).monthly_price_cents;
    let gross = monthly_price_cents * i64::from(months);
    Ok(AdQuote {
        ad_type,
        duration_months: months,
        monthly_price_cents,
        discount_percent,
        price_cents: gross - gross * discount_percent / 100,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAd {
    pub shop_id: Uuid,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    pub ad_type: AdType,
    pub slot: u32,
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    pub duration_months: u32,
}

async fn load_ad(storage: &dyn Storage, ad_id: Uuid) -> Result<Advertisement> {
    storage
        .get_ad(ad_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Advertisement", ad_id))
}

/// Books an ad for an approved shop. Ad-fee exempt shops pay nothing.
pub async fn create_ad(
    storage: &dyn Storage,
    config: &AdsConfig,
    actor: &Actor,
    new_ad: NewAd,
) -> Result<Advertisement> {
    require_non_empty("title", &new_ad.title)?;
    let slots = config.for_type(new_ad.ad_type).slots;
    if new_ad.slot == 0 || new_ad.slot > slots {
        return Err(MarketError::Validation(format!(
            "{} slot must be between 1 and {slots}",
            new_ad.ad_type
        )));
    }
    let quote = quote_price(config, new_ad.ad_type, new_ad.duration_months)?;
    let shop = ensure_dashboard_access(storage, actor, new_ad.shop_id).await?;

    match (new_ad.ad_type, new_ad.product_id) {
        (AdType::FeaturedProduct, None) => {
            return Err(MarketError::Validation(
                "Featured product ads need a product_id".to_string(),
            ))
        }
        (_, Some(product_id)) => {
            let product = storage
                .get_product(product_id)
                .await?
                .ok_or_else(|| MarketError::not_found("Product", product_id))?;
            if product.shop_id != shop.id {
                return Err(MarketError::Validation(
                    "Product belongs to another shop".to_string(),
                ));
            }
        }
        _ => {}
    }

    let (price_cents, payment_status) = if shop.ad_fee_exempt {
        (0, AdPaymentStatus::Exempt)
    } else {
        (quote.price_cents, AdPaymentStatus::Pending)
    };

    let ad = Advertisement {
        id: Uuid::new_v4(),
        shop_id: shop.id,
        product_id: new_ad.product_id,
        ad_type: new_ad.ad_type,
        slot: new_ad.slot,
        title: new_ad.title.trim().to_string(),
        image_url: new_ad.image_url,
        link_url: new_ad.link_url,
        duration_months: new_ad.duration_months,
        price_cents,
        approval_status: AdApproval::Pending,
        rejection_reason: None,
        payment_status,
        payment_reference: None,
        paused: false,
        starts_at: None,
        expires_at: None,
        views: 0,
        clicks: 0,
        created_at: Utc::now(),
    };
    storage.create_ad(&ad).await?;
    metrics::record_ad_created();
    info!(ad_id = %ad.id, slot = %ad.slot_key(), price_cents, "Advertisement booked");
    Ok(ad)
}

/// Admins see every ad; sellers see their own shop's.
pub async fn list_ads(
    storage: &dyn Storage,
    actor: &Actor,
    mut filter: AdFilter,
) -> Result<Vec<Advertisement>> {
    if !actor.is_admin() {
        let shop_id = actor
            .shop_id
            .or(filter.shop_id)
            .ok_or_else(|| MarketError::Forbidden("No shop selected".to_string()))?;
        ensure_dashboard_access(storage, actor, shop_id).await?;
        filter.shop_id = Some(shop_id);
    }
    storage.list_ads(&filter).await
}

pub async fn approve_ad(storage: &dyn Storage, actor: &Actor, ad_id: Uuid) -> Result<Advertisement> {
    require_admin(actor)?;
    let ad = storage
        .modify_ad(ad_id, &|ad: &mut Advertisement| {
            if ad.approval_status == AdApproval::Approved {
                return Err(MarketError::Conflict("Ad is already approved".to_string()));
            }
            ad.approval_status = AdApproval::Approved;
            ad.rejection_reason = None;
            ad.activate_if_ready(Utc::now());
            Ok(())
        })
        .await?;
    info!(ad_id = %ad.id, live_from = ?ad.starts_at, "Advertisement approved");
    Ok(ad)
}

pub async fn reject_ad(
    storage: &dyn Storage,
    actor: &Actor,
    ad_id: Uuid,
    reason: &str,
) -> Result<Advertisement> {
    require_admin(actor)?;
    require_non_empty("reason", reason)?;
    storage
        .modify_ad(ad_id, &|ad: &mut Advertisement| {
            if ad.approval_status != AdApproval::Pending {
                return Err(MarketError::InvalidTransition {
                    from: format!("{:?}", ad.approval_status).to_lowercase(),
                    to: "rejected".to_string(),
                });
            }
            ad.approval_status = AdApproval::Rejected;
            ad.rejection_reason = Some(reason.trim().to_string());
            Ok(())
        })
        .await
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdPayment {
    pub reference: String,
}

pub async fn record_ad_payment(
    storage: &dyn Storage,
    actor: &Actor,
    ad_id: Uuid,
    payment: AdPayment,
) -> Result<Advertisement> {
    require_non_empty("reference", &payment.reference)?;
    let snapshot = load_ad(storage, ad_id).await?;
    ensure_dashboard_access(storage, actor, snapshot.shop_id).await?;
    let reference = payment.reference.trim();
    let ad = storage
        .modify_ad(ad_id, &|ad: &mut Advertisement| {
            if ad.payment_status != AdPaymentStatus::Pending {
                return Err(MarketError::Conflict(
                    "Ad is already paid or exempt".to_string(),
                ));
            }
            ad.payment_status = AdPaymentStatus::Paid;
            ad.payment_reference = Some(reference.to_string());
            ad.activate_if_ready(Utc::now());
            Ok(())
        })
        .await?;
    info!(ad_id = %ad.id, "Advertisement paid");
    Ok(ad)
}

pub async fn set_paused(
    storage: &dyn Storage,
    actor: &Actor,
    ad_id: Uuid,
    paused: bool,
) -> Result<Advertisement> {
    let snapshot = load_ad(storage, ad_id).await?;
    ensure_dashboard_access(storage, actor, snapshot.shop_id).await?;
    storage
        .modify_ad(ad_id, &|ad: &mut Advertisement| {
            ad.paused = paused;
            Ok(())
        })
        .await
}

/// Counts an impression or click-through.
pub async fn record_counter(
    storage: &dyn Storage,
    ad_id: Uuid,
    counter: AdCounter,
) -> Result<Advertisement> {
    let ad = storage.increment_ad_counter(ad_id, counter).await?;
    metrics::record_ad_counter(counter);
    debug!(ad_id = %ad.id, ?counter, views = ad.views, clicks = ad.clicks, "Ad counter");
    Ok(ad)
}

#[derive(Debug, Clone, Serialize)]
pub struct AdAnalytics {
    pub ad_id: Uuid,
    pub slot: SlotKey,
    pub views: u64,
    pub clicks: u64,
    pub click_through_rate: f64,
    pub live: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn analytics(storage: &dyn Storage, actor: &Actor, ad_id: Uuid) -> Result<AdAnalytics> {
    let ad = load_ad(storage, ad_id).await?;
    ensure_dashboard_access(storage, actor, ad.shop_id).await?;
    Ok(AdAnalytics {
        ad_id: ad.id,
        slot: ad.slot_key(),
        views: ad.views,
        clicks: ad.clicks,
        click_through_rate: ad.click_through_rate(),
        live: ad.is_live(Utc::now()),
        expires_at: ad.expires_at,
    })
}

/// Live ads for one slot, oldest booking first.
pub async fn live_ads_for_slot(
    storage: &dyn Storage,
    slot: SlotKey,
    now: DateTime<Utc>,
) -> Result<Vec<Advertisement>> {
    let mut ads: Vec<Advertisement> = storage
        .list_ads(&AdFilter {
            ad_type: Some(slot.ad_type),
            slot: Some(slot.slot),
            approval_status: Some(AdApproval::Approved),
            ..Default::default()
        })
        .await?
        .into_iter()
        .filter(|ad| ad.is_live(now))
        .collect();
    ads.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(ads)
}

/// Pauses every ad whose running window has ended. Returns how many changed.
pub async fn expire_ads(storage: &dyn Storage, now: DateTime<Utc>) -> Result<usize> {
    let ads = storage.list_ads(&AdFilter::default()).await?;
    let mut expired = 0;
    for candidate in ads.into_iter().filter(|ad| ad.is_expired(now) && !ad.paused) {
        let result = storage
            .modify_ad(candidate.id, &|ad: &mut Advertisement| {
                if ad.paused || !ad.is_expired(now) {
                    return Err(MarketError::Conflict("no longer expirable".to_string()));
                }
                ad.paused = true;
                Ok(())
            })
            .await;
        match result {
            Ok(ad) => {
                debug!(ad_id = %ad.id, slot = %ad.slot_key(), "Advertisement expired");
                expired += 1;
            }
            // Paused, renewed or deleted since the listing
            Err(MarketError::Conflict(_)) | Err(MarketError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    metrics::record_ads_expired(expired);
    info!(expired, "Expired advertisement sweep finished");
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use chrono::Duration;

    async fn approved_shop(storage: &InMemoryStorage, exempt: bool) -> (Shop, Actor) {
        let owner = Uuid::new_v4();
        let mut shop = Shop::register(
            owner,
            NewShop {
                name: "Camana Bay Books".to_string(),
                email: "books@camana.ky".to_string(),
                phone: None,
                address: None,
                paypal_email: None,
                delivery: None,
            },
        );
        shop.approval_status = ApprovalStatus::Approved;
        shop.ad_fee_exempt = exempt;
        storage.create_shop(&shop).await.unwrap();
        let seller = Actor::seller(owner, shop.id);
        (shop, seller)
    }

    fn banner(shop_id: Uuid, slot: u32, months: u32) -> NewAd {
        NewAd {
            shop_id,
            product_id: None,
            ad_type: AdType::Banner,
            slot,
            title: "Summer reading".to_string(),
            image_url: Some("https://cdn.example.ky/banner.png".to_string()),
            link_url: None,
            duration_months: months,
        }
    }

    #[test]
    fn test_quote_applies_duration_discount() {
        let config = AdsConfig::default();
        assert_eq!(quote_price(&config, AdType::Banner, 1).unwrap().price_cents, 15_000);
        assert_eq!(quote_price(&config, AdType::Banner, 3).unwrap().price_cents, 40_500);
        assert_eq!(quote_price(&config, AdType::Banner, 6).unwrap().price_cents, 76_500);
        assert_eq!(quote_price(&config, AdType::Banner, 12).unwrap().price_cents, 144_000);
        assert!(quote_price(&config, AdType::Banner, 2).is_err());
    }

    #[tokio::test]
    async fn test_ad_goes_live_after_approval_and_payment() {
        let storage = InMemoryStorage::new();
        let config = AdsConfig::default();
        let (shop, seller) = approved_shop(&storage, false).await;
        let admin = Actor::admin(Uuid::new_v4());

        let ad = create_ad(&storage, &config, &seller, banner(shop.id, 1, 3))
            .await
            .unwrap();
        assert_eq!(ad.price_cents, 40_500);
        assert_eq!(ad.approval_status, AdApproval::Pending);

        let ad = approve_ad(&storage, &admin, ad.id).await.unwrap();
        assert!(ad.starts_at.is_none());

        let ad = record_ad_payment(
            &storage,
            &seller,
            ad.id,
            AdPayment {
                reference: "PAY-778".to_string(),
            },
        )
        .await
        .unwrap();
        let starts = ad.starts_at.unwrap();
        assert_eq!(ad.expires_at, Some(starts + Duration::days(90)));

        let slot = ad.slot_key();
        let live = live_ads_for_slot(&storage, slot, Utc::now()).await.unwrap();
        assert_eq!(live.len(), 1);
    }

    #[tokio::test]
    async fn test_exempt_shop_pays_nothing() {
        let storage = InMemoryStorage::new();
        let (shop, seller) = approved_shop(&storage, true).await;
        let ad = create_ad(&storage, &AdsConfig::default(), &seller, banner(shop.id, 2, 12))
            .await
            .unwrap();
        assert_eq!(ad.price_cents, 0);
        assert_eq!(ad.payment_status, AdPaymentStatus::Exempt);
    }

    #[tokio::test]
    async fn test_slot_range_and_featured_product_rules() {
        let storage = InMemoryStorage::new();
        let config = AdsConfig::default();
        let (shop, seller) = approved_shop(&storage, false).await;

        assert!(create_ad(&storage, &config, &seller, banner(shop.id, 0, 1)).await.is_err());
        assert!(create_ad(&storage, &config, &seller, banner(shop.id, 4, 1)).await.is_err());

        let mut featured = banner(shop.id, 1, 1);
        featured.ad_type = AdType::FeaturedProduct;
        assert!(matches!(
            create_ad(&storage, &config, &seller, featured).await,
            Err(MarketError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_analytics_and_expiry_sweep() {
        let storage = InMemoryStorage::new();
        let (shop, seller) = approved_shop(&storage, true).await;
        let admin = Actor::admin(Uuid::new_v4());
        let ad = create_ad(&storage, &AdsConfig::default(), &seller, banner(shop.id, 1, 1))
            .await
            .unwrap();
        approve_ad(&storage, &admin, ad.id).await.unwrap();

        for _ in 0..4 {
            record_counter(&storage, ad.id, AdCounter::View).await.unwrap();
        }
        record_counter(&storage, ad.id, AdCounter::Click).await.unwrap();

        let stats = analytics(&storage, &seller, ad.id).await.unwrap();
        assert_eq!(stats.views, 4);
        assert_eq!(stats.clicks, 1);
        assert!((stats.click_through_rate - 0.25).abs() < f64::EPSILON);
        assert!(stats.live);

        let later = Utc::now() + Duration::days(31);
        assert_eq!(expire_ads(&storage, later).await.unwrap(), 1);
        assert_eq!(expire_ads(&storage, later).await.unwrap(), 0);
        assert!(live_ads_for_slot(&storage, ad.slot_key(), Utc::now())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_state_changes_keep_counters() {
        let storage = InMemoryStorage::new();
        let (shop, seller) = approved_shop(&storage, false).await;
        let admin = Actor::admin(Uuid::new_v4());
        let ad = create_ad(&storage, &AdsConfig::default(), &seller, banner(shop.id, 3, 1))
            .await
            .unwrap();

        record_counter(&storage, ad.id, AdCounter::View).await.unwrap();
        approve_ad(&storage, &admin, ad.id).await.unwrap();
        record_counter(&storage, ad.id, AdCounter::Click).await.unwrap();
        record_ad_payment(
            &storage,
            &seller,
            ad.id,
            AdPayment {
                reference: "PAY-101".to_string(),
            },
        )
        .await
        .unwrap();
        record_counter(&storage, ad.id, AdCounter::View).await.unwrap();
        let paused = set_paused(&storage, &seller, ad.id, true).await.unwrap();
        assert_eq!((paused.views, paused.clicks), (2, 1));

        expire_ads(&storage, Utc::now() + Duration::days(60))
            .await
            .unwrap();
        let stats = analytics(&storage, &seller, ad.id).await.unwrap();
        assert_eq!((stats.views, stats.clicks), (2, 1));
    }
}
