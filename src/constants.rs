/// Shared names and defaults used across the service

pub const API_PREFIX: &str = "/api/v2";

// Order numbering
pub const ORDER_NUMBER_SEQUENCE: &str = "order_number";
pub const DEFAULT_ORDER_NUMBER_PREFIX: &str = "wanttar";
pub const DEFAULT_ORDER_NUMBER_WIDTH: usize = 5;

// Advertisements
pub const DEFAULT_AD_ROTATION_SECS: u64 = 10;
pub const AD_DAYS_PER_MONTH: i64 = 30;

/// Allowed ad durations in months and their discount in percent
pub const AD_DURATION_DISCOUNTS: [(u32, i64); 4] = [(1, 0), (3, 10), (6, 15), (12, 20)];

// Identity headers set by the upstream auth gateway
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const SHOP_ID_HEADER: &str = "x-shop-id";

/// Discount percent for a supported ad duration
pub fn ad_duration_discount(months: u32) -> Option<i64> {
    AD_DURATION_DISCOUNTS
        .iter()
        .find(|(m, _)| *m == months)
        .map(|(_, pct)| *pct)
}

/// All supported ad durations in months
pub fn supported_ad_durations() -> Vec<u32> {
    AD_DURATION_DISCOUNTS.iter().map(|(m, _)| *m).collect()
}
