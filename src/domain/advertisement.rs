use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::AD_DAYS_PER_MONTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdType {
    Banner,
    Sidebar,
    FeaturedProduct,
    FeaturedStore,
}

impl AdType {
    pub const ALL: [AdType; 4] = [
        AdType::Banner,
        AdType::Sidebar,
        AdType::FeaturedProduct,
        AdType::FeaturedStore,
    ];
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdType::Banner => "banner",
            AdType::Sidebar => "sidebar",
            AdType::FeaturedProduct => "featured_product",
            AdType::FeaturedStore => "featured_store",
        };
        write!(f, "{name}")
    }
}

impl FromStr for AdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "banner" => Ok(AdType::Banner),
            "sidebar" => Ok(AdType::Sidebar),
            "featured_product" => Ok(AdType::FeaturedProduct),
            "featured_store" => Ok(AdType::FeaturedStore),
            other => Err(format!("unknown ad type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdApproval {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdPaymentStatus {
    Pending,
    Paid,
    /// Shop is ad-fee exempt
    Exempt,
}

/// Homepage position: an ad type plus a 1-based slot number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub ad_type: AdType,
    pub slot: u32,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.ad_type, self.slot)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub product_id: Option<Uuid>,
    pub ad_type: AdType,
    pub slot: u32,
    pub title: String,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub duration_months: u32,
    pub price_cents: i64,
    pub approval_status: AdApproval,
    pub rejection_reason: Option<String>,
    pub payment_status: AdPaymentStatus,
    pub payment_reference: Option<String>,
    pub paused: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub views: u64,
    pub clicks: u64,
    pub created_at: DateTime<Utc>,
}

impl Advertisement {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            ad_type: self.ad_type,
            slot: self.slot,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self.payment_status,
            AdPaymentStatus::Paid | AdPaymentStatus::Exempt
        )
    }

    /// Approved, settled, not paused and within its running window.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if self.approval_status != AdApproval::Approved || !self.is_settled() || self.paused {
            return false;
        }
        match (self.starts_at, self.expires_at) {
            (Some(start), Some(end)) => start <= now && now < end,
            _ => false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |end| end <= now)
    }

    /// Starts the running window once the ad is both approved and settled.
    pub fn activate_if_ready(&mut self, now: DateTime<Utc>) {
        if self.starts_at.is_some()
            || self.approval_status != AdApproval::Approved
            || !self.is_settled()
        {
            return;
        }
        self.starts_at = Some(now);
        self.expires_at =
            Some(now + Duration::days(AD_DAYS_PER_MONTH * i64::from(self.duration_months)));
    }

    pub fn click_through_rate(&self) -> f64 {
        if self.views == 0 {
            return 0.0;
        }
        self.clicks as f64 / self.views as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdCounter {
    View,
    Click,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad() -> Advertisement {
        Advertisement {
            id: Uuid::new_v4(),
            shop_id: Uuid::new_v4(),
            product_id: None,
            ad_type: AdType::Banner,
            slot: 1,
            title: "Sunset sale".to_string(),
            image_url: None,
            link_url: None,
            duration_months: 1,
            price_cents: 15_000,
            approval_status: AdApproval::Pending,
            rejection_reason: None,
            payment_status: AdPaymentStatus::Pending,
            payment_reference: None,
            paused: false,
            starts_at: None,
            expires_at: None,
            views: 0,
            clicks: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_activation_requires_approval_and_payment() {
        let now = Utc::now();
        let mut ad = ad();
        ad.payment_status = AdPaymentStatus::Paid;
        ad.activate_if_ready(now);
        assert!(ad.starts_at.is_none());

        ad.approval_status = AdApproval::Approved;
        ad.activate_if_ready(now);
        assert_eq!(ad.starts_at, Some(now));
        assert_eq!(ad.expires_at, Some(now + Duration::days(30)));
        assert!(ad.is_live(now));
        assert!(!ad.is_live(now + Duration::days(30)));
        assert!(ad.is_expired(now + Duration::days(30)));
    }

    #[test]
    fn test_paused_ad_is_not_live() {
        let now = Utc::now();
        let mut ad = ad();
        ad.approval_status = AdApproval::Approved;
        ad.payment_status = AdPaymentStatus::Exempt;
        ad.activate_if_ready(now);
        ad.paused = true;
        assert!(!ad.is_live(now));
    }

    #[test]
    fn test_click_through_rate() {
        let mut ad = ad();
        assert_eq!(ad.click_through_rate(), 0.0);
        ad.views = 200;
        ad.clicks = 5;
        assert!((ad.click_through_rate() - 0.025).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ad_type_parsing() {
        assert_eq!("featured-store".parse::<AdType>().unwrap(), AdType::FeaturedStore);
        assert!("popup".parse::<AdType>().is_err());
    }
}
