use serde::{Deserialize, Serialize};

use crate::domain::{DeliveryConfig, DeliveryMethod};
use crate::error::{MarketError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryQuote {
    pub method: DeliveryMethod,
    pub district: Option<String>,
    pub fee_cents: i64,
    /// Fee waived because the cart reached the free-delivery threshold
    pub free_delivery_applied: bool,
}

/// Resolves the delivery fee a shop charges for one order.
///
/// `COLLECT` is free. `DELIVERY` uses the district fee when the shop lists
/// the district, the shop default otherwise, and is waived once
/// `subtotal_cents` reaches the free-delivery threshold.
pub fn resolve_delivery_fee(
    config: &DeliveryConfig,
    method: DeliveryMethod,
    district: Option<&str>,
    subtotal_cents: i64,
) -> Result<DeliveryQuote> {
    let district = district
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    match method {
        DeliveryMethod::Collect => {
            if !config.collect_enabled {
                return Err(MarketError::Validation(
                    "This shop does not offer collection".to_string(),
                ));
            }
            Ok(DeliveryQuote {
                method,
                district,
                fee_cents: 0,
                free_delivery_applied: false,
            })
        }
        DeliveryMethod::Delivery => {
            if !config.delivery_enabled {
                return Err(MarketError::Validation(
                    "This shop does not offer delivery".to_string(),
                ));
            }

            let base_fee = district
                .as_deref()
                .and_then(|d| {
                    config
                        .district_fees
                        .iter()
                        .find(|fee| fee.district.trim().eq_ignore_ascii_case(d))
                })
                .map(|fee| fee.fee_cents)
                .unwrap_or(config.default_fee_cents);

            let free = config
                .free_delivery_threshold_cents
                .map_or(false, |threshold| subtotal_cents >= threshold);

            Ok(DeliveryQuote {
                method,
                district,
                fee_cents: if free { 0 } else { base_fee },
                free_delivery_applied: free && base_fee > 0,
            })
        }
    }
}
