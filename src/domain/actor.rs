use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Marketplace roles, as asserted by the upstream auth gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Seller,
    StoreManager,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
            Role::StoreManager => "store_manager",
            Role::Admin => "admin",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buyer" | "user" => Ok(Role::Buyer),
            "seller" => Ok(Role::Seller),
            "store_manager" | "storemanager" | "manager" => Ok(Role::StoreManager),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    /// Shop a seller owns or a store manager works for
    pub shop_id: Option<Uuid>,
}

impl Actor {
    pub fn buyer(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Buyer,
            shop_id: None,
        }
    }

    pub fn seller(user_id: Uuid, shop_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Seller,
            shop_id: Some(shop_id),
        }
    }

    pub fn store_manager(user_id: Uuid, shop_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::StoreManager,
            shop_id: Some(shop_id),
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            shop_id: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True for the seller or store manager attached to `shop_id`.
    pub fn works_for(&self, shop_id: Uuid) -> bool {
        matches!(self.role, Role::Seller | Role::StoreManager) && self.shop_id == Some(shop_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("store_manager".parse::<Role>().unwrap(), Role::StoreManager);
        assert_eq!("user".parse::<Role>().unwrap(), Role::Buyer);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_works_for() {
        let shop = Uuid::new_v4();
        assert!(Actor::seller(Uuid::new_v4(), shop).works_for(shop));
        assert!(Actor::store_manager(Uuid::new_v4(), shop).works_for(shop));
        assert!(!Actor::seller(Uuid::new_v4(), Uuid::new_v4()).works_for(shop));
        assert!(!Actor::admin(Uuid::new_v4()).works_for(shop));
    }
}
