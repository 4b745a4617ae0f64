//! The single-row `settings` table: exchange rates, order minimums and the
//! delivery fee.

use butcher_core::{ExchangeRates, OrderLimits, PricingPolicy};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

const SETTINGS_COLUMNS: &str = "usd_to_lbp, lbp_to_usd, legacy_exchange_rate, min_order_usd, \
                                min_order_lbp, delivery_fee_lbp, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettingsRow {
    pub usd_to_lbp: Decimal,
    pub lbp_to_usd: Decimal,
    /// Single rate kept for older clients that only know one exchange rate.
    pub legacy_exchange_rate: Decimal,
    pub min_order_usd: Decimal,
    pub min_order_lbp: Decimal,
    pub delivery_fee_lbp: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl SettingsRow {
    /// Pricing inputs derived from the stored settings.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidData`] if a stored rate is not positive.
    pub fn pricing_policy(&self) -> Result<PricingPolicy, DbError> {
        let rates = ExchangeRates::new(self.usd_to_lbp, self.lbp_to_usd)
            .map_err(|e| DbError::InvalidData(e.to_string()))?;
        Ok(PricingPolicy {
            rates,
            limits: OrderLimits {
                min_usd: self.min_order_usd,
                min_lbp: self.min_order_lbp,
            },
            delivery_fee_lbp: self.delivery_fee_lbp,
        })
    }
}

/// Returns the settings row, creating it with column defaults on first use.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_settings(pool: &PgPool) -> Result<SettingsRow, DbError> {
    sqlx::query("INSERT INTO settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
        .execute(pool)
        .await?;

    let row = sqlx::query_as::<_, SettingsRow>(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM settings WHERE id = 1"
    ))
    .fetch_one(pool)
    .await?;
    Ok(row)
}

async fn update_settings(
    pool: &PgPool,
    assignments: &str,
    values: &[Option<Decimal>],
) -> Result<SettingsRow, DbError> {
    sqlx::query("INSERT INTO settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
        .execute(pool)
        .await?;

    let sql = format!(
        "UPDATE settings SET {assignments}, updated_at = NOW() WHERE id = 1 \
         RETURNING {SETTINGS_COLUMNS}"
    );
    let mut query = sqlx::query_as::<_, SettingsRow>(&sql);
    for value in values {
        query = query.bind(*value);
    }
    let row = query.fetch_one(pool).await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails (including the positive-rate
/// CHECK constraint).
pub async fn update_exchange_rates(
    pool: &PgPool,
    usd_to_lbp: Decimal,
    lbp_to_usd: Decimal,
) -> Result<SettingsRow, DbError> {
    update_settings(
        pool,
        "usd_to_lbp = $1, lbp_to_usd = $2",
        &[Some(usd_to_lbp), Some(lbp_to_usd)],
    )
    .await
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_legacy_exchange_rate(
    pool: &PgPool,
    rate: Decimal,
) -> Result<SettingsRow, DbError> {
    update_settings(pool, "legacy_exchange_rate = $1", &[Some(rate)]).await
}

/// Updates either minimum; `None` keeps the stored value.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_min_order_amounts(
    pool: &PgPool,
    min_usd: Option<Decimal>,
    min_lbp: Option<Decimal>,
) -> Result<SettingsRow, DbError> {
    update_settings(
        pool,
        "min_order_usd = COALESCE($1, min_order_usd), \
         min_order_lbp = COALESCE($2, min_order_lbp)",
        &[min_usd, min_lbp],
    )
    .await
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_delivery_fee(pool: &PgPool, fee_lbp: Decimal) -> Result<SettingsRow, DbError> {
    update_settings(pool, "delivery_fee_lbp = $1", &[Some(fee_lbp)]).await
}
