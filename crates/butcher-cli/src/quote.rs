//! `quote`: price a cart file the way the order endpoint would.
//!
//! The file is JSON:
//!
//! ```json
//! { "delivery_applied": true,
//!   "items": [ { "product_id": 4, "meat_type_id": 2, "quantity": "1.5" },
//!              { "product_id": 9, "amount_lbp": 500000 } ] }
//! ```

use std::path::Path;

use anyhow::{bail, Context};
use butcher_core::{
    compute_totals, price_item, Currency, ItemRequest, OrderTotals, PricedItem, PricingPolicy,
    UnitPrice,
};
use butcher_db::{MeatTypeRow, ProductRow};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct CartFile {
    #[serde(default)]
    pub delivery_applied: bool,
    pub items: Vec<CartLine>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CartLine {
    pub product_id: i64,
    pub meat_type_id: Option<i64>,
    pub quantity: Option<Decimal>,
    pub amount_usd: Option<Decimal>,
    pub amount_lbp: Option<Decimal>,
}

/// # Errors
///
/// Returns an error if the text is not a cart document or has no items.
pub(crate) fn parse_cart(raw: &str) -> anyhow::Result<CartFile> {
    let cart: CartFile = serde_json::from_str(raw).context("cart file is not valid JSON")?;
    if cart.items.is_empty() {
        bail!("cart has no items");
    }
    Ok(cart)
}

/// Unit price for a line: the chosen meat type's, else the product's.
///
/// # Errors
///
/// Returns an error if the product cannot be ordered or the meat type does
/// not belong to it.
pub(crate) fn unit_price_for(
    product: &ProductRow,
    meat_type: Option<&MeatTypeRow>,
) -> anyhow::Result<UnitPrice> {
    if !product.is_active {
        bail!("product {} not found", product.id);
    }
    if !product.is_available {
        bail!("product '{}' is not available", product.name);
    }
    match meat_type {
        Some(variant) if variant.is_active && variant.product_id == product.id => Ok(UnitPrice {
            usd: variant.price_usd,
            lbp: variant.price_lbp,
        }),
        Some(variant) => bail!(
            "meat type {} is not offered for product '{}'",
            variant.id,
            product.name
        ),
        None => Ok(UnitPrice {
            usd: product.price_usd,
            lbp: product.price_lbp,
        }),
    }
}

/// # Errors
///
/// Returns the pricing error for the line.
pub(crate) fn price_line(
    policy: &PricingPolicy,
    line: &CartLine,
    unit_price: UnitPrice,
) -> anyhow::Result<PricedItem> {
    let request =
        ItemRequest::from_fields(line.amount_usd, line.amount_lbp, line.quantity, unit_price)?;
    Ok(price_item(policy, request)?)
}

fn print_totals(totals: &OrderTotals) {
    if totals.delivery_applied {
        println!(
            "{:<28}{:>14}",
            "delivery",
            Currency::Lbp.format_amount(totals.delivery_fee_lbp)
        );
    }
    println!(
        "{:<28}{:>14}  {}",
        "TOTAL",
        Currency::Usd.format_amount(totals.total_usd),
        Currency::Lbp.format_amount(totals.total_lbp)
    );
}

/// Price the cart in `path` against the live catalog and settings.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a referenced product or
/// meat type is missing, or any line fails pricing.
pub(crate) async fn run_quote(
    pool: &sqlx::PgPool,
    path: &Path,
    force_delivery: bool,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cart = parse_cart(&raw)?;
    let policy = butcher_db::get_settings(pool).await?.pricing_policy()?;

    let mut priced = Vec::with_capacity(cart.items.len());
    for (index, line) in cart.items.iter().enumerate() {
        let position = index + 1;
        let product = butcher_db::get_product(pool, line.product_id)
            .await?
            .with_context(|| format!("item {position}: product {} not found", line.product_id))?;
        let meat_type = match line.meat_type_id {
            Some(id) => Some(
                butcher_db::get_meat_type(pool, id)
                    .await?
                    .with_context(|| format!("item {position}: meat type {id} not found"))?,
            ),
            None => None,
        };

        let item = unit_price_for(&product, meat_type.as_ref())
            .and_then(|unit_price| price_line(&policy, line, unit_price))
            .with_context(|| format!("item {position}"))?;

        let label = match &meat_type {
            Some(variant) => format!("{} ({})", product.name, variant.name),
            None => product.name.clone(),
        };
        println!(
            "{label:<28}{:>14}  {}",
            Currency::Usd.format_amount(item.amount_usd),
            Currency::Lbp.format_amount(item.amount_lbp)
        );
        priced.push(item);
    }

    let totals = compute_totals(&policy, &priced, cart.delivery_applied || force_delivery);
    print_totals(&totals);
    Ok(())
}
