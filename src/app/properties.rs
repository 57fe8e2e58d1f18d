use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::validation::{require_non_empty, require_non_negative};
use crate::domain::{Actor, Property, PropertyInput, PropertyStatus};
use crate::error::{MarketError, Result};
use crate::storage::{PropertyFilter, Storage};

fn validate(input: &PropertyInput) -> Result<()> {
    require_non_empty("title", &input.title)?;
    require_non_empty("district", &input.district)?;
    require_non_negative("price_cents", input.price_cents)
}

async fn load_owned(storage: &dyn Storage, actor: &Actor, property_id: Uuid) -> Result<Property> {
    let property = get_property(storage, property_id).await?;
    if property.owner_id != actor.user_id && !actor.is_admin() {
        return Err(MarketError::Forbidden(
            "Only the listing owner can change it".to_string(),
        ));
    }
    Ok(property)
}

pub async fn list_properties(storage: &dyn Storage, filter: &PropertyFilter) -> Result<Vec<Property>> {
    storage.list_properties(filter).await
}

pub async fn get_property(storage: &dyn Storage, property_id: Uuid) -> Result<Property> {
    storage
        .get_property(property_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Property", property_id))
}

pub async fn create_property(
    storage: &dyn Storage,
    actor: &Actor,
    input: PropertyInput,
) -> Result<Property> {
    validate(&input)?;
    let property = Property::new(actor.user_id, input);
    storage.create_property(&property).await?;
    info!(property_id = %property.id, district = %property.district, "Property listed");
    Ok(property)
}

pub async fn update_property(
    storage: &dyn Storage,
    actor: &Actor,
    property_id: Uuid,
    input: PropertyInput,
) -> Result<Property> {
    validate(&input)?;
    let mut property = load_owned(storage, actor, property_id).await?;
    property.apply(input);
    storage.update_property(&property).await?;
    Ok(property)
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyStatusUpdate {
    pub status: PropertyStatus,
}

pub async fn update_property_status(
    storage: &dyn Storage,
    actor: &Actor,
    property_id: Uuid,
    update: PropertyStatusUpdate,
) -> Result<Property> {
    let mut property = load_owned(storage, actor, property_id).await?;
    property.status = update.status;
    property.updated_at = Utc::now();
    storage.update_property(&property).await?;
    Ok(property)
}

pub async fn delete_property(storage: &dyn Storage, actor: &Actor, property_id: Uuid) -> Result<()> {
    load_owned(storage, actor, property_id).await?;
    if !storage.delete_property(property_id).await? {
        return Err(MarketError::not_found("Property", property_id));
    }
    info!(%property_id, "Property removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ListingType;
    use crate::storage::InMemoryStorage;

    fn condo(price_cents: i64, district: &str) -> PropertyInput {
        PropertyInput {
            title: "Seven Mile Beach condo".to_string(),
            description: None,
            listing_type: ListingType::Sale,
            price_cents,
            district: district.to_string(),
            address: None,
            bedrooms: 2,
            bathrooms: 0,
            area_sq_ft: Some(1_100),
            images: vec![],
        }
    }

    #[tokio::test]
    async fn test_owner_manages_listing() {
        let storage = InMemoryStorage::new();
        let owner = Actor::buyer(Uuid::new_v4());
        let other = Actor::buyer(Uuid::new_v4());

        let listing = create_property(&storage, &owner, condo(65_000_000, "West Bay"))
            .await
            .unwrap();
        assert_eq!(listing.status, PropertyStatus::Available);

        assert!(matches!(
            update_property_status(
                &storage,
                &other,
                listing.id,
                PropertyStatusUpdate { status: PropertyStatus::Sold }
            )
            .await,
            Err(MarketError::Forbidden(_))
        ));

        let sold = update_property_status(
            &storage,
            &owner,
            listing.id,
            PropertyStatusUpdate {
                status: PropertyStatus::UnderOffer,
            },
        )
        .await
        .unwrap();
        assert_eq!(sold.status, PropertyStatus::UnderOffer);

        delete_property(&storage, &owner, listing.id).await.unwrap();
        assert!(get_property(&storage, listing.id).await.is_err());
    }

    #[tokio::test]
    async fn test_filters() {
        let storage = InMemoryStorage::new();
        let owner = Actor::buyer(Uuid::new_v4());
        create_property(&storage, &owner, condo(50_000_000, "West Bay")).await.unwrap();
        create_property(&storage, &owner, condo(90_000_000, "George Town")).await.unwrap();

        let filter = PropertyFilter {
            district: Some("west bay".to_string()),
            ..Default::default()
        };
        assert_eq!(list_properties(&storage, &filter).await.unwrap().len(), 1);

        let filter = PropertyFilter {
            max_price_cents: Some(95_000_000),
            listing_type: Some(ListingType::Sale),
            ..Default::default()
        };
        assert_eq!(list_properties(&storage, &filter).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_validation() {
        let storage = InMemoryStorage::new();
        let owner = Actor::buyer(Uuid::new_v4());
        assert!(create_property(&storage, &owner, condo(-1, "West Bay")).await.is_err());
        let mut untitled = condo(1, "West Bay");
        untitled.title = " ".to_string();
        assert!(create_property(&storage, &owner, untitled).await.is_err());
    }
}
