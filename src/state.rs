use std::sync::Arc;

use crate::app::rotation::AdRotator;
use crate::config::Config;
use crate::domain::OrderNumberFormat;
use crate::storage::Storage;

/// Shared handler state
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub config: Config,
    pub numbering: OrderNumberFormat,
    pub rotator: Arc<AdRotator>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> SharedState {
        let numbering = OrderNumberFormat::new(
            config.orders.number_prefix.clone(),
            config.orders.number_width,
        );
        let rotator = Arc::new(AdRotator::new(storage.clone(), config.ads.clone()));
        Arc::new(Self {
            storage,
            config,
            numbering,
            rotator,
        })
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }
}
