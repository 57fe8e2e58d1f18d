//! Homepage ad rotation
//!
//! Each slot keeps an [`AdCarousel`] of its live ads. The [`AdRotator`] task
//! refreshes the carousels from storage on every interval tick, advances
//! them, and records one view for each ad that just came on screen.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ads::{live_ads_for_slot, record_counter};
use crate::config::AdsConfig;
use crate::domain::{AdCounter, AdType, Advertisement, SlotKey};
use crate::error::Result;
use crate::observability::metrics;
use crate::storage::Storage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdCarousel {
    ads: Vec<Uuid>,
    current_index: usize,
}

impl AdCarousel {
    pub fn new(ads: Vec<Uuid>) -> Self {
        Self {
            ads,
            current_index: 0,
        }
    }

    pub fn current(&self) -> Option<Uuid> {
        self.ads.get(self.current_index).copied()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.ads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ads.is_empty()
    }

    /// Moves to the next ad, wrapping around. Returns whether the index moved.
    pub fn advance(&mut self) -> bool {
        if self.ads.len() <= 1 {
            return false;
        }
        self.current_index = (self.current_index + 1) % self.ads.len();
        true
    }

    /// Replaces the ad set, keeping the displayed ad selected if it is still live.
    pub fn refresh(&mut self, ads: Vec<Uuid>) {
        let shown = self.current();
        self.ads = ads;
        self.current_index = shown
            .and_then(|id| self.ads.iter().position(|a| *a == id))
            .unwrap_or(0);
    }
}

pub struct AdRotator {
    storage: Arc<dyn Storage>,
    config: AdsConfig,
    carousels: RwLock<HashMap<SlotKey, AdCarousel>>,
}

impl AdRotator {
    pub fn new(storage: Arc<dyn Storage>, config: AdsConfig) -> Self {
        Self {
            storage,
            config,
            carousels: RwLock::new(HashMap::new()),
        }
    }

    fn slot_keys(&self) -> Vec<SlotKey> {
        AdType::ALL
            .iter()
            .flat_map(|&ad_type| {
                (1..=self.config.for_type(ad_type).slots).map(move |slot| SlotKey { ad_type, slot })
            })
            .collect()
    }

    /// One rotation step over every slot. Returns the number of views recorded.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let mut live = Vec::new();
        for key in self.slot_keys() {
            let ids: Vec<Uuid> = live_ads_for_slot(self.storage.as_ref(), key, now)
                .await?
                .into_iter()
                .map(|ad| ad.id)
                .collect();
            live.push((key, ids));
        }

        let mut shown = Vec::new();
        {
            let mut carousels = self.carousels.write().await;
            for (key, ids) in live {
                if ids.is_empty() {
                    carousels.remove(&key);
                    continue;
                }
                match carousels.get_mut(&key) {
                    Some(carousel) => {
                        carousel.refresh(ids);
                        if carousel.advance() {
                            metrics::record_ad_rotation();
                            shown.extend(carousel.current());
                        }
                    }
                    None => {
                        carousels.insert(key, AdCarousel::new(ids));
                    }
                }
            }
        }

        for ad_id in &shown {
            record_counter(self.storage.as_ref(), *ad_id, AdCounter::View).await?;
        }
        debug!(views = shown.len(), "Ad rotation tick");
        Ok(shown.len())
    }

    /// Id of the ad currently displayed in `slot`, if the slot has been rotated.
    pub async fn current(&self, slot: SlotKey) -> Option<Uuid> {
        self.carousels
            .read()
            .await
            .get(&slot)
            .and_then(AdCarousel::current)
    }

    /// The ad on screen for `slot`, falling back to the first live ad before
    /// the rotator has seen the slot.
    pub async fn current_ad(&self, slot: SlotKey) -> Result<Option<Advertisement>> {
        if let Some(ad_id) = self.current(slot).await {
            if let Some(ad) = self.storage.get_ad(ad_id).await? {
                if ad.is_live(Utc::now()) {
                    return Ok(Some(ad));
                }
            }
        }
        Ok(live_ads_for_slot(self.storage.as_ref(), slot, Utc::now())
            .await?
            .into_iter()
            .next())
    }

    /// Runs [`tick`](Self::tick) on the configured interval until `shutdown` flips.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = self.config.rotation_interval();
        tokio::spawn(async move {
            info!(interval_secs = period.as_secs(), "Ad rotator started");
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.tick().await {
                            warn!("Ad rotation failed: {e}");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Ad rotator stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use crate::storage::InMemoryStorage;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_advance_wraps_modulo_len() {
        let ads = ids(3);
        let mut carousel = AdCarousel::new(ads.clone());
        let mut seen = Vec::new();
        for _ in 0..6 {
            assert!(carousel.advance());
            seen.push(carousel.current_index());
        }
        assert_eq!(seen, vec![1, 2, 0, 1, 2, 0]);
        assert_eq!(carousel.current(), Some(ads[0]));
    }

    #[test]
    fn test_single_or_empty_carousel_does_not_move() {
        let mut single = AdCarousel::new(ids(1));
        assert!(!single.advance());
        assert_eq!(single.current_index(), 0);

        let mut empty = AdCarousel::default();
        assert!(!empty.advance());
        assert_eq!(empty.current(), None);
    }

    #[test]
    fn test_refresh_keeps_displayed_ad() {
        let ads = ids(3);
        let mut carousel = AdCarousel::new(ads.clone());
        carousel.advance();
        assert_eq!(carousel.current(), Some(ads[1]));

        // First ad dropped out; ads[1] is still on screen
        carousel.refresh(vec![ads[1], ads[2]]);
        assert_eq!(carousel.current(), Some(ads[1]));
        assert_eq!(carousel.current_index(), 0);

        carousel.refresh(vec![ads[0]]);
        assert_eq!(carousel.current(), Some(ads[0]));
    }

    async fn live_banner(storage: &InMemoryStorage, shop_id: Uuid, title: &str) -> Advertisement {
        let now = Utc::now();
        let mut ad = Advertisement {
            id: Uuid::new_v4(),
            shop_id,
            product_id: None,
            ad_type: AdType::Banner,
            slot: 1,
            title: title.to_string(),
            image_url: None,
            link_url: None,
            duration_months: 1,
            price_cents: 0,
            approval_status: AdApproval::Approved,
            rejection_reason: None,
            payment_status: AdPaymentStatus::Exempt,
            payment_reference: None,
            paused: false,
            starts_at: None,
            expires_at: None,
            views: 0,
            clicks: 0,
            created_at: now,
        };
        ad.activate_if_ready(now - chrono::Duration::seconds(1));
        storage.create_ad(&ad).await.unwrap();
        ad
    }

    #[tokio::test]
    async fn test_rotator_advances_and_records_views() {
        let storage = Arc::new(InMemoryStorage::new());
        let shop_id = Uuid::new_v4();
        let first = live_banner(&storage, shop_id, "first").await;
        let second = live_banner(&storage, shop_id, "second").await;
        let slot = first.slot_key();

        let rotator = AdRotator::new(storage.clone(), AdsConfig::default());
        assert!(rotator.current_ad(slot).await.unwrap().is_some());

        // First tick only builds the carousel
        assert_eq!(rotator.tick().await.unwrap(), 0);
        let shown = rotator.current(slot).await.unwrap();

        assert_eq!(rotator.tick().await.unwrap(), 1);
        let next = rotator.current(slot).await.unwrap();
        assert_ne!(shown, next);

        let viewed = storage.get_ad(next).await.unwrap().unwrap();
        assert_eq!(viewed.views, 1);
        assert!([first.id, second.id].contains(&next));
    }
}
