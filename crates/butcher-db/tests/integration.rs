//! Offline unit tests for butcher-db pool configuration and row types.
//! These tests do not require a live database connection.

use butcher_core::{AppConfig, Environment, OrderStatus, PricingPolicy, Role};
use butcher_db::{PoolConfig, SettingsRow, UserRow};
use chrono::Utc;
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5001),
        log_level: "info".to_string(),
        jwt_secret: "secret".to_string(),
        jwt_ttl_hours: 168,
        upload_dir: PathBuf::from("./uploads"),
        max_upload_bytes: 5_242_880,
        public_base_url: "http://localhost:5001".to_string(),
        cors_origin: None,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        smtp: None,
        twilio: None,
        notify_timeout_secs: 30,
        notify_max_retries: 2,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn user_row(role: &str) -> UserRow {
    UserRow {
        id: 1,
        first_name: "Maya".to_string(),
        last_name: "Khoury".to_string(),
        father_name: "Georges".to_string(),
        email: "maya@example.com".to_string(),
        mobile: "03123456".to_string(),
        password_hash: "$argon2id$...".to_string(),
        role: role.to_string(),
        is_banned: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn user_row_role_parses_admin() {
    let row = user_row("admin");
    assert_eq!(row.role(), Role::Admin);
    assert!(row.is_admin());
    assert_eq!(row.full_name(), "Maya Khoury");
}

#[test]
fn user_row_unknown_role_falls_back_to_customer() {
    let row = user_row("superuser");
    assert_eq!(row.role(), Role::Customer);
    assert!(!row.is_admin());
}

#[test]
fn settings_row_with_custom_fee_feeds_pricing_policy() {
    let row = SettingsRow {
        usd_to_lbp: Decimal::from(89_500),
        lbp_to_usd: Decimal::from(89_000),
        legacy_exchange_rate: Decimal::from(89_000),
        min_order_usd: Decimal::from(5),
        min_order_lbp: Decimal::from(300_000),
        delivery_fee_lbp: Decimal::from(150_000),
        updated_at: Utc::now(),
    };

    let policy = row.pricing_policy().unwrap();
    assert_ne!(policy, PricingPolicy::default());
    assert_eq!(policy.rates.usd_to_lbp, Decimal::from(89_500));
    assert_eq!(policy.limits.min_usd, Decimal::from(5));
    assert_eq!(policy.delivery_fee_lbp, Decimal::from(150_000));
}

#[test]
fn every_order_status_fits_the_check_constraint_vocabulary() {
    let allowed = [
        "pending",
        "confirmed",
        "ready",
        "out_for_delivery",
        "completed",
        "rejected",
    ];
    for status in OrderStatus::ALL {
        assert!(allowed.contains(&status.as_str()), "{status}");
    }
}
