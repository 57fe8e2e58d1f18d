use uuid::Uuid;

use crate::domain::{Actor, Shop};
use crate::error::{MarketError, Result};
use crate::storage::Storage;

pub fn require_admin(actor: &Actor) -> Result<()> {
    if !actor.is_admin() {
        return Err(MarketError::Forbidden(
            "Admin access required".to_string(),
        ));
    }
    Ok(())
}

pub async fn load_shop(storage: &dyn Storage, shop_id: Uuid) -> Result<Shop> {
    storage
        .get_shop(shop_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Shop", shop_id))
}

/// Seller dashboard gate: the actor must own or work for the shop and the
/// shop must be approved. Admins always pass.
pub async fn ensure_dashboard_access(
    storage: &dyn Storage,
    actor: &Actor,
    shop_id: Uuid,
) -> Result<Shop> {
    let shop = load_shop(storage, shop_id).await?;
    if actor.is_admin() {
        return Ok(shop);
    }
    if !(actor.works_for(shop.id) || shop.owner_id == actor.user_id) {
        return Err(MarketError::Forbidden(
            "You do not manage this shop".to_string(),
        ));
    }
    if !shop.is_approved() {
        return Err(MarketError::Forbidden(format!(
            "Shop approval is {}; dashboard is available once approved",
            shop.approval_status
        )));
    }
    Ok(shop)
}
