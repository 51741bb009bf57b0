pub mod app_config;
pub mod config;
pub mod customers;
pub mod orders;
pub mod products;
pub mod sales;
pub mod time;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use customers::{Address, Attribution, CanonicalCustomer};
pub use orders::{CanonicalCoupon, CanonicalOrder, CanonicalOrderItem, OrderStatus};
pub use products::{BundleComponent, CanonicalProduct, ProductKind};
pub use sales::{BundleInfo, DateRange, SaleLine};
pub use time::{to_utc, DEFAULT_SOURCE_TIMEZONE};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid order status: {0}")]
    InvalidOrderStatus(String),
    #[error("invalid product kind: {0}")]
    InvalidProductKind(String),
    #[error("invalid granularity: {0}")]
    InvalidGranularity(String),
}
