use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MarketError, Result};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("email pattern compiles")
});

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]{7,20}$").expect("phone pattern compiles"));

pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MarketError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub fn require_email(field: &str, value: &str) -> Result<()> {
    if !EMAIL_RE.is_match(value.trim()) {
        return Err(MarketError::Validation(format!(
            "{field} is not a valid email address"
        )));
    }
    Ok(())
}

pub fn require_phone(field: &str, value: &str) -> Result<()> {
    if !PHONE_RE.is_match(value.trim()) {
        return Err(MarketError::Validation(format!(
            "{field} is not a valid phone number"
        )));
    }
    Ok(())
}

pub fn require_non_negative(field: &str, cents: i64) -> Result<()> {
    if cents < 0 {
        return Err(MarketError::Validation(format!(
            "{field} must not be negative"
        )));
    }
    Ok(())
}
