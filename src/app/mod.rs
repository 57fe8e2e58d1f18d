//! Marketplace use cases, written against the [`Storage`](crate::storage::Storage) trait.

pub mod access;
pub mod ads;
pub mod checkout;
pub mod delivery;
pub mod faqs;
pub mod orders;
pub mod products;
pub mod properties;
pub mod rotation;
pub mod sellers;
pub mod validation;
