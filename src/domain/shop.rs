use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Seller account state gating dashboard access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(format!("unknown approval status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictFee {
    pub district: String,
    pub fee_cents: i64,
}

/// Vendor-configured delivery options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub delivery_enabled: bool,
    pub collect_enabled: bool,
    pub district_fees: Vec<DistrictFee>,
    pub default_fee_cents: i64,
    pub free_delivery_threshold_cents: Option<i64>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            delivery_enabled: true,
            collect_enabled: true,
            district_fees: Vec::new(),
            default_fee_cents: 0,
            free_delivery_threshold_cents: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Payee for PayPal captures on this shop's orders
    pub paypal_email: Option<String>,
    pub approval_status: ApprovalStatus,
    pub rejection_reason: Option<String>,
    pub ad_fee_exempt: bool,
    pub delivery: DeliveryConfig,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Registration payload for a new shop.
#[derive(Debug, Clone, Deserialize)]
pub struct NewShop {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub paypal_email: Option<String>,
    #[serde(default)]
    pub delivery: Option<DeliveryConfig>,
}

impl Shop {
    pub fn register(owner_id: Uuid, new_shop: NewShop) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: new_shop.name.trim().to_string(),
            email: new_shop.email.trim().to_lowercase(),
            phone: new_shop.phone,
            address: new_shop.address,
            paypal_email: new_shop.paypal_email.map(|e| e.trim().to_lowercase()),
            approval_status: ApprovalStatus::Pending,
            rejection_reason: None,
            ad_fee_exempt: false,
            delivery: new_shop.delivery.unwrap_or_default(),
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }
}
