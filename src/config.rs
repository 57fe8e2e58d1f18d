use serde::Deserialize;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::constants;
use crate::domain::AdType;
use crate::error::{MarketError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub orders: OrdersConfig,
    pub ads: AdsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Exposes `/metrics` when set
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            metrics_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_path: PathBuf::from("data/cayman_mall.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub default_directive: String,
    pub file_logging: bool,
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_directive: "cayman_mall=info,tower_http=info".to_string(),
            file_logging: true,
            directory: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    pub number_prefix: String,
    pub number_width: usize,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            number_prefix: constants::DEFAULT_ORDER_NUMBER_PREFIX.to_string(),
            number_width: constants::DEFAULT_ORDER_NUMBER_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdsConfig {
    pub rotation_interval_secs: u64,
    pub banner: AdTypeConfig,
    pub sidebar: AdTypeConfig,
    pub featured_product: AdTypeConfig,
    pub featured_store: AdTypeConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AdTypeConfig {
    pub monthly_price_cents: i64,
    pub slots: u32,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            rotation_interval_secs: constants::DEFAULT_AD_ROTATION_SECS,
            banner: AdTypeConfig {
                monthly_price_cents: 15_000,
                slots: 3,
            },
            sidebar: AdTypeConfig {
                monthly_price_cents: 7_500,
                slots: 4,
            },
            featured_product: AdTypeConfig {
                monthly_price_cents: 5_000,
                slots: 8,
            },
            featured_store: AdTypeConfig {
                monthly_price_cents: 10_000,
                slots: 4,
            },
        }
    }
}

impl AdsConfig {
    pub fn for_type(&self, ad_type: AdType) -> AdTypeConfig {
        match ad_type {
            AdType::Banner => self.banner,
            AdType::Sidebar => self.sidebar,
            AdType::FeaturedProduct => self.featured_product,
            AdType::FeaturedStore => self.featured_store,
        }
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_secs.max(1))
    }
}

impl Config {
    /// Loads `config.toml` (or `$CAYMAN_CONFIG`) and applies environment overrides.
    ///
    /// A missing file is not an error; every section has defaults.
    pub fn load() -> Result<Self> {
        let path = env::var("CAYMAN_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            info!("{path} not found, using default configuration");
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MarketError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(port) = override_var::<u16>("CAYMAN_PORT")? {
            self.server.port = port;
        }
        if let Some(backend) = override_var::<StorageBackend>("CAYMAN_STORAGE")? {
            self.storage.backend = backend;
        }
        if let Some(path) = override_var::<PathBuf>("CAYMAN_DATABASE_PATH")? {
            self.storage.database_path = path;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.orders.number_prefix.trim().is_empty() {
            return Err(MarketError::Config(
                "orders.number_prefix must not be empty".to_string(),
            ));
        }
        if self.orders.number_width == 0 {
            return Err(MarketError::Config(
                "orders.number_width must be at least 1".to_string(),
            ));
        }
        for ad_type in AdType::ALL {
            let cfg = self.ads.for_type(ad_type);
            if cfg.slots == 0 || cfg.monthly_price_cents < 0 {
                return Err(MarketError::Config(format!(
                    "ads.{ad_type} needs at least one slot and a non-negative price"
                )));
            }
        }
        Ok(())
    }
}

fn override_var<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => {
            let value = raw.parse::<T>().map_err(|e| {
                warn!("Invalid {key} value: {e}");
                MarketError::Config(format!("Invalid {key} value '{raw}': {e}"))
            })?;
            info!("{key} overrides configuration");
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.orders.number_prefix, "wanttar");
        assert_eq!(config.orders.number_width, 5);
        assert_eq!(config.ads.rotation_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml_str(
            r#"
            [server]
            port = 9100

            [storage]
            backend = "memory"

            [ads.banner]
            monthly_price_cents = 20000
            slots = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.ads.for_type(AdType::Banner).slots, 2);
        assert_eq!(config.ads.for_type(AdType::Sidebar).slots, 4);
    }

    #[test]
    fn test_rejects_empty_prefix() {
        let err = Config::from_toml_str("[orders]\nnumber_prefix = \"  \"\n").unwrap_err();
        assert!(matches!(err, MarketError::Config(_)));
    }
}
