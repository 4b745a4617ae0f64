//! Domain types, configuration and the dual-currency pricing engine shared by
//! the server and CLI binaries.

pub mod app_config;
pub mod config;
pub mod domain;
pub mod password;
pub mod pricing;
pub mod validation;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, SmtpConfig, TwilioConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use domain::{Currency, OrderStatus, OrderType, ParseEnumError, Role};
pub use password::{hash_password, verify_password, PasswordHashError};
pub use pricing::{
    compute_totals, price_item, round_usd_total, ExchangeRates, ItemRequest, OrderLimits,
    OrderTotals, PricedItem, PricingError, PricingPolicy, UnitPrice,
};
pub use validation::ValidationError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
