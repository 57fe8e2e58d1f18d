//! Metrics for the marketplace service
//!
//! Metric names live in [`MetricName`] so recording sites never spell them
//! out. The Prometheus recorder is installed once by [`init`]; the HTTP layer
//! renders it at `/metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::domain::{AdCounter, ApprovalStatus, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Checkout
    CheckoutsCompleted,
    CheckoutsFailed,
    CheckoutDuration,
    OrdersCreated,
    OrderValueCents,

    // Order lifecycle
    OrderStatusChanges,
    PaymentsCaptured,

    // Sellers
    ShopsRegistered,
    ShopApprovalDecisions,

    // Advertisements
    AdsCreated,
    AdViews,
    AdClicks,
    AdRotations,
    AdsExpired,

    // HTTP
    HttpRequests,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::CheckoutsCompleted => "cayman_checkouts_completed_total",
            MetricName::CheckoutsFailed => "cayman_checkouts_failed_total",
            MetricName::CheckoutDuration => "cayman_checkout_duration_seconds",
            MetricName::OrdersCreated => "cayman_orders_created_total",
            MetricName::OrderValueCents => "cayman_order_value_cents",
            MetricName::OrderStatusChanges => "cayman_order_status_changes_total",
            MetricName::PaymentsCaptured => "cayman_payments_captured_total",
            MetricName::ShopsRegistered => "cayman_shops_registered_total",
            MetricName::ShopApprovalDecisions => "cayman_shop_approval_decisions_total",
            MetricName::AdsCreated => "cayman_ads_created_total",
            MetricName::AdViews => "cayman_ad_views_total",
            MetricName::AdClicks => "cayman_ad_clicks_total",
            MetricName::AdRotations => "cayman_ad_rotations_total",
            MetricName::AdsExpired => "cayman_ads_expired_total",
            MetricName::HttpRequests => "cayman_http_requests_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder. Calling it again is a no-op.
pub fn init() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
            info!("Metrics recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {e}"),
    }
}

/// Prometheus text exposition, if the recorder is installed.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub fn record_checkout(orders_created: usize, total_cents: i64, duration_secs: f64) {
    ::metrics::counter!(MetricName::CheckoutsCompleted.as_str()).increment(1);
    ::metrics::counter!(MetricName::OrdersCreated.as_str()).increment(orders_created as u64);
    ::metrics::histogram!(MetricName::OrderValueCents.as_str()).record(total_cents as f64);
    ::metrics::histogram!(MetricName::CheckoutDuration.as_str()).record(duration_secs);
}

pub fn record_checkout_failure(reason: &'static str) {
    ::metrics::counter!(MetricName::CheckoutsFailed.as_str(), "reason" => reason).increment(1);
}

pub fn record_status_change(status: OrderStatus) {
    ::metrics::counter!(MetricName::OrderStatusChanges.as_str(), "status" => status.to_string())
        .increment(1);
}

pub fn record_payment_captured() {
    ::metrics::counter!(MetricName::PaymentsCaptured.as_str()).increment(1);
}

pub fn record_shop_registered() {
    ::metrics::counter!(MetricName::ShopsRegistered.as_str()).increment(1);
}

pub fn record_approval_decision(status: ApprovalStatus) {
    ::metrics::counter!(MetricName::ShopApprovalDecisions.as_str(), "status" => status.to_string())
        .increment(1);
}

pub fn record_ad_created() {
    ::metrics::counter!(MetricName::AdsCreated.as_str()).increment(1);
}

pub fn record_ad_counter(counter: AdCounter) {
    let name = match counter {
        AdCounter::View => MetricName::AdViews,
        AdCounter::Click => MetricName::AdClicks,
    };
    ::metrics::counter!(name.as_str()).increment(1);
}

pub fn record_ad_rotation() {
    ::metrics::counter!(MetricName::AdRotations.as_str()).increment(1);
}

pub fn record_ads_expired(count: usize) {
    ::metrics::counter!(MetricName::AdsExpired.as_str()).increment(count as u64);
}

pub fn record_http_request(method: &str, status: u16) {
    ::metrics::counter!(
        MetricName::HttpRequests.as_str(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
