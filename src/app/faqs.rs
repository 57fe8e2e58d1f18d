use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;

use super::access::require_admin;
use super::validation::require_non_empty;
use crate::domain::{Actor, Faq, FaqInput};
use crate::error::{MarketError, Result};
use crate::storage::Storage;

fn validate(input: &FaqInput) -> Result<()> {
    require_non_empty("question", &input.question)?;
    require_non_empty("answer", &input.answer)
}

/// Published FAQs for everyone; admins also see drafts.
pub async fn list_faqs(storage: &dyn Storage, actor: Option<&Actor>) -> Result<Vec<Faq>> {
    let include_unpublished = actor.map_or(false, Actor::is_admin);
    storage.list_faqs(include_unpublished).await
}

pub async fn get_faq(storage: &dyn Storage, actor: Option<&Actor>, faq_id: Uuid) -> Result<Faq> {
    let faq = storage
        .get_faq(faq_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Faq", faq_id))?;
    if !faq.published && !actor.map_or(false, Actor::is_admin) {
        return Err(MarketError::not_found("Faq", faq_id));
    }
    Ok(faq)
}

pub async fn create_faq(storage: &dyn Storage, actor: &Actor, input: FaqInput) -> Result<Faq> {
    require_admin(actor)?;
    validate(&input)?;
    let faq = Faq::new(input);
    storage.create_faq(&faq).await?;
    info!(faq_id = %faq.id, "FAQ created");
    Ok(faq)
}

pub async fn update_faq(
    storage: &dyn Storage,
    actor: &Actor,
    faq_id: Uuid,
    input: FaqInput,
) -> Result<Faq> {
    require_admin(actor)?;
    validate(&input)?;
    let mut faq = storage
        .get_faq(faq_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Faq", faq_id))?;
    faq.question = input.question.trim().to_string();
    faq.answer = input.answer.trim().to_string();
    faq.category = input.category;
    faq.position = input.position;
    faq.published = input.published;
    faq.updated_at = Utc::now();
    storage.update_faq(&faq).await?;
    Ok(faq)
}

pub async fn delete_faq(storage: &dyn Storage, actor: &Actor, faq_id: Uuid) -> Result<()> {
    require_admin(actor)?;
    if storage.delete_faqs(&[faq_id]).await? == 0 {
        return Err(MarketError::not_found("Faq", faq_id));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkDeleteResult {
    pub deleted_count: u64,
}

/// Deletes the selected FAQs. Unknown ids are skipped and repeats count once.
pub async fn bulk_delete(
    storage: &dyn Storage,
    actor: &Actor,
    request: BulkDeleteRequest,
) -> Result<BulkDeleteResult> {
    require_admin(actor)?;
    if request.ids.is_empty() {
        return Err(MarketError::Validation(
            "Select at least one FAQ to delete".to_string(),
        ));
    }
    let ids: Vec<Uuid> = request.ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    let deleted_count = storage.delete_faqs(&ids).await?;
    info!(requested = ids.len(), deleted_count, "FAQs bulk deleted");
    Ok(BulkDeleteResult { deleted_count })
}
