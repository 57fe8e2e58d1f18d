pub mod app;
pub mod auth;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod observability;
pub mod server;
pub mod state;
pub mod storage;
