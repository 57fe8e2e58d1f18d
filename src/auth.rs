//! Caller identity from the gateway's headers.
//!
//! Authentication happens upstream; this service only reads the asserted
//! user id, role and (for shop staff) shop id.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use uuid::Uuid;

use crate::constants::{SHOP_ID_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use crate::domain::{Actor, Role};
use crate::error::MarketError;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, MarketError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| MarketError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?;
    let user_id = Uuid::parse_str(user_id)
        .map_err(|_| MarketError::Unauthorized(format!("invalid {USER_ID_HEADER} header")))?;

    let role = match header(headers, USER_ROLE_HEADER) {
        Some(role) => role.parse::<Role>().map_err(MarketError::Unauthorized)?,
        None => Role::Buyer,
    };

    let shop_id = header(headers, SHOP_ID_HEADER)
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|_| MarketError::Unauthorized(format!("invalid {SHOP_ID_HEADER} header")))?;

    Ok(Actor {
        user_id,
        role,
        shop_id,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
    }
}
