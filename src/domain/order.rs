use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    /// Buyer picks the order up at the shop
    Collect,
    Delivery,
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMethod::Collect => write!(f, "COLLECT"),
            DeliveryMethod::Delivery => write!(f, "DELIVERY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    ReadyForCollection,
    Shipping,
    OnTheWay,
    Delivered,
    Collected,
    ProcessingRefund,
    RefundSuccess,
    Cancelled,
}

impl OrderStatus {
    /// Statuses reachable from `self` for an order using `method`.
    pub fn next_allowed(self, method: DeliveryMethod) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match (self, method) {
            (Processing, DeliveryMethod::Delivery) => &[Shipping, Cancelled],
            (Processing, DeliveryMethod::Collect) => &[ReadyForCollection, Cancelled],
            (Shipping, DeliveryMethod::Delivery) => &[OnTheWay],
            (OnTheWay, DeliveryMethod::Delivery) => &[Delivered],
            (ReadyForCollection, DeliveryMethod::Collect) => &[Collected],
            (Delivered, _) | (Collected, _) => &[ProcessingRefund],
            (ProcessingRefund, _) => &[RefundSuccess],
            _ => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus, method: DeliveryMethod) -> bool {
        self.next_allowed(method).contains(&next)
    }

    /// The order reached the buyer.
    pub fn is_fulfilled(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Collected)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Processing => "processing",
            OrderStatus::ReadyForCollection => "ready_for_collection",
            OrderStatus::Shipping => "shipping",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Collected => "collected",
            OrderStatus::ProcessingRefund => "processing_refund",
            OrderStatus::RefundSuccess => "refund_success",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
            .map_err(|_| format!("unknown order status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Paypal,
    CashOnDelivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Captured,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    /// Seller PayPal account the buyer pays directly
    pub payee_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub phone: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub address_line: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A cart line as snapshotted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

impl CartItem {
    /// `None` when the line total does not fit in an `i64`.
    pub fn line_total_cents(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Assigned from the order sequence on first save when absent
    pub order_number: Option<String>,
    pub shop_id: Uuid,
    pub buyer_id: Uuid,
    pub cart: Vec<CartItem>,
    pub shipping_address: ShippingAddress,
    pub payment: PaymentInfo,
    pub delivery_method: DeliveryMethod,
    pub delivery_fee_cents: i64,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub status_history: Vec<StatusChange>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Appends a history entry and moves the order to `status`.
    pub fn push_status(&mut self, status: OrderStatus, note: Option<String>, by: Option<Uuid>) {
        self.status = status;
        self.status_history.push(StatusChange {
            status,
            note,
            changed_by: by,
            changed_at: Utc::now(),
        });
    }

    pub fn item_count(&self) -> u32 {
        self.cart.iter().map(|item| item.quantity).sum()
    }
}

/// Renders sequence values as `<prefix>-<zero padded number>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNumberFormat {
    pub prefix: String,
    pub width: usize,
}

impl OrderNumberFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    pub fn format(&self, sequence: u64) -> String {
        format!("{}-{:0width$}", self.prefix, sequence, width = self.width)
    }
}

impl Default for OrderNumberFormat {
    fn default() -> Self {
        Self::new(
            crate::constants::DEFAULT_ORDER_NUMBER_PREFIX,
            crate::constants::DEFAULT_ORDER_NUMBER_WIDTH,
        )
    }
}
