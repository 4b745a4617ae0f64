//! Dual-currency pricing for cart lines and order totals.
//!
//! Every line is priced in both US dollars and Lebanese lira. A customer asks
//! for a line in one of three ways: a dollar amount, a lira amount, or a
//! quantity of a product (optionally a specific meat type). The other currency
//! is derived through the shop's exchange rates, which differ by direction.
//!
//! Order totals follow the shop's cash-register convention: the dollar total
//! is rounded to a whole dollar, up when the leftover exceeds 30 cents and
//! down otherwise.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_USD_TO_LBP: i64 = 90_000;
pub const DEFAULT_LBP_TO_USD: i64 = 89_000;
pub const DEFAULT_MIN_ORDER_USD: i64 = 3;
pub const DEFAULT_MIN_ORDER_LBP: i64 = 200_000;
pub const DEFAULT_DELIVERY_FEE_LBP: i64 = 100_000;

/// Leftover cents strictly above this are rounded up to the next dollar.
const ROUND_UP_CENTS_THRESHOLD: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("minimum USD order amount is ${minimum}")]
    BelowMinimumUsd { minimum: Decimal },

    #[error("minimum LBP order amount is {minimum} LBP")]
    BelowMinimumLbp { minimum: Decimal },

    #[error("{field} must be greater than zero")]
    NonPositiveAmount { field: &'static str },

    #[error("each item must have either quantity, amount_usd, or amount_lbp")]
    MissingAmount,

    #[error("exchange rate {name} must be positive, got {value}")]
    InvalidRate { name: &'static str, value: Decimal },
}

/// Direction-specific conversion rates, both expressed as lira per dollar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRates {
    /// Used when a dollar figure is converted into lira.
    pub usd_to_lbp: Decimal,
    /// Used when a lira figure is converted into dollars (divisor).
    pub lbp_to_usd: Decimal,
}

impl Default for ExchangeRates {
    fn default() -> Self {
        Self {
            usd_to_lbp: Decimal::from(DEFAULT_USD_TO_LBP),
            lbp_to_usd: Decimal::from(DEFAULT_LBP_TO_USD),
        }
    }
}

impl ExchangeRates {
    /// # Errors
    ///
    /// Returns [`PricingError::InvalidRate`] if either rate is zero or negative.
    pub fn new(usd_to_lbp: Decimal, lbp_to_usd: Decimal) -> Result<Self, PricingError> {
        if usd_to_lbp <= Decimal::ZERO {
            return Err(PricingError::InvalidRate {
                name: "usd_to_lbp",
                value: usd_to_lbp,
            });
        }
        if lbp_to_usd <= Decimal::ZERO {
            return Err(PricingError::InvalidRate {
                name: "lbp_to_usd",
                value: lbp_to_usd,
            });
        }
        Ok(Self {
            usd_to_lbp,
            lbp_to_usd,
        })
    }

    #[must_use]
    pub fn usd_in_lbp(&self, usd: Decimal) -> Decimal {
        usd * self.usd_to_lbp
    }

    #[must_use]
    pub fn lbp_in_usd(&self, lbp: Decimal) -> Decimal {
        lbp / self.lbp_to_usd
    }
}

/// Per-line minimums for amount-based requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLimits {
    pub min_usd: Decimal,
    pub min_lbp: Decimal,
}

impl Default for OrderLimits {
    fn default() -> Self {
        Self {
            min_usd: Decimal::from(DEFAULT_MIN_ORDER_USD),
            min_lbp: Decimal::from(DEFAULT_MIN_ORDER_LBP),
        }
    }
}

/// Everything the pricing functions need from the shop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub rates: ExchangeRates,
    pub limits: OrderLimits,
    pub delivery_fee_lbp: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            rates: ExchangeRates::default(),
            limits: OrderLimits::default(),
            delivery_fee_lbp: Decimal::from(DEFAULT_DELIVERY_FEE_LBP),
        }
    }
}

/// Catalog price of one unit, from the product or from the chosen meat type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPrice {
    pub usd: Decimal,
    pub lbp: Decimal,
}

/// How the customer asked for a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRequest {
    AmountUsd(Decimal),
    AmountLbp(Decimal),
    Quantity {
        quantity: Decimal,
        unit_price: UnitPrice,
    },
}

impl ItemRequest {
    /// Pick the request kind from loosely-typed cart fields.
    ///
    /// Precedence is dollar amount, then lira amount, then quantity. Zero is
    /// treated the same as an absent field; a negative value is an error.
    ///
    /// # Errors
    ///
    /// - [`PricingError::NonPositiveAmount`] for a negative field.
    /// - [`PricingError::MissingAmount`] when no field carries a positive value.
    pub fn from_fields(
        amount_usd: Option<Decimal>,
        amount_lbp: Option<Decimal>,
        quantity: Option<Decimal>,
        unit_price: UnitPrice,
    ) -> Result<Self, PricingError> {
        let present = |field: &'static str, value: Option<Decimal>| match value {
            Some(v) if v < Decimal::ZERO => Err(PricingError::NonPositiveAmount { field }),
            Some(v) if v > Decimal::ZERO => Ok(Some(v)),
            _ => Ok(None),
        };

        let usd = present("amount_usd", amount_usd)?;
        let lbp = present("amount_lbp", amount_lbp)?;
        let qty = present("quantity", quantity)?;

        match (usd, lbp, qty) {
            (Some(usd), _, _) => Ok(ItemRequest::AmountUsd(usd)),
            (None, Some(lbp), _) => Ok(ItemRequest::AmountLbp(lbp)),
            (None, None, Some(quantity)) => Ok(ItemRequest::Quantity {
                quantity,
                unit_price,
            }),
            (None, None, None) => Err(PricingError::MissingAmount),
        }
    }
}

/// A line priced in both currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedItem {
    pub amount_usd: Decimal,
    pub amount_lbp: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total_usd: Decimal,
    pub total_lbp: Decimal,
    pub delivery_applied: bool,
    pub delivery_fee_lbp: Decimal,
}

fn whole(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Price a single cart line.
///
/// - Dollar amounts are rounded to whole dollars and converted at `usd_to_lbp`.
/// - Lira amounts are kept as given and divided by `lbp_to_usd`.
/// - Quantities multiply the unit price; the dollar side is rounded to whole
///   dollars and the lira side to whole lira.
///
/// # Errors
///
/// - [`PricingError::NonPositiveAmount`] for a zero or negative input.
/// - [`PricingError::BelowMinimumUsd`] / [`PricingError::BelowMinimumLbp`]
///   when an amount-based line is under the shop minimum.
pub fn price_item(policy: &PricingPolicy, request: ItemRequest) -> Result<PricedItem, PricingError> {
    match request {
        ItemRequest::AmountUsd(amount) => {
            if amount <= Decimal::ZERO {
                return Err(PricingError::NonPositiveAmount {
                    field: "amount_usd",
                });
            }
            let usd = whole(amount);
            if usd < policy.limits.min_usd {
                return Err(PricingError::BelowMinimumUsd {
                    minimum: policy.limits.min_usd,
                });
            }
            Ok(PricedItem {
                amount_usd: usd,
                amount_lbp: whole(policy.rates.usd_in_lbp(usd)),
            })
        }
        ItemRequest::AmountLbp(amount) => {
            if amount <= Decimal::ZERO {
                return Err(PricingError::NonPositiveAmount {
                    field: "amount_lbp",
                });
            }
            let lbp = whole(amount);
            if lbp < policy.limits.min_lbp {
                return Err(PricingError::BelowMinimumLbp {
                    minimum: policy.limits.min_lbp,
                });
            }
            Ok(PricedItem {
                amount_usd: cents(policy.rates.lbp_in_usd(lbp)),
                amount_lbp: lbp,
            })
        }
        ItemRequest::Quantity {
            quantity,
            unit_price,
        } => {
            if quantity <= Decimal::ZERO {
                return Err(PricingError::NonPositiveAmount { field: "quantity" });
            }
            Ok(PricedItem {
                amount_usd: whole(quantity * unit_price.usd),
                amount_lbp: whole(quantity * unit_price.lbp),
            })
        }
    }
}

/// Apply the register rounding rule to a dollar total.
///
/// More than 30 leftover cents rounds up to the next dollar; 30 cents or
/// fewer are dropped.
#[must_use]
pub fn round_usd_total(total: Decimal) -> Decimal {
    let floor = total.floor();
    let leftover_cents = (total - floor) * Decimal::ONE_HUNDRED;
    if leftover_cents > Decimal::from(ROUND_UP_CENTS_THRESHOLD) {
        floor + Decimal::ONE
    } else {
        floor
    }
}

/// Sum priced lines into order totals, adding the delivery fee when requested.
///
/// The delivery fee is charged in lira and converted to dollars at
/// `lbp_to_usd` before the dollar total is rounded.
#[must_use]
pub fn compute_totals(
    policy: &PricingPolicy,
    items: &[PricedItem],
    delivery_applied: bool,
) -> OrderTotals {
    let mut total_usd: Decimal = items.iter().map(|i| i.amount_usd).sum();
    let mut total_lbp: Decimal = items.iter().map(|i| i.amount_lbp).sum();

    let delivery_fee_lbp = if delivery_applied {
        policy.delivery_fee_lbp
    } else {
        Decimal::ZERO
    };

    if delivery_applied {
        total_lbp += delivery_fee_lbp;
        total_usd += policy.rates.lbp_in_usd(delivery_fee_lbp);
    }

    OrderTotals {
        total_usd: round_usd_total(total_usd),
        total_lbp: whole(total_lbp),
        delivery_applied,
        delivery_fee_lbp,
    }
}

#[cfg(test)]
#[path = "pricing_test.rs"]
mod tests;
