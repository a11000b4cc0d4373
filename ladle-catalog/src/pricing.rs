use crate::product::MenuItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pricing knobs, loaded from config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Sales tax in basis points (875 = 8.75%). Integer so money math stays
    /// in integer cents.
    pub tax_rate_bps: i32,

    /// Flat discounts by promo code, in cents. Codes not in this map are
    /// treated as no discount, not as an error.
    pub promo_discounts_cents: HashMap<String, i32>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate_bps: 0,
            promo_discounts_cents: HashMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    /// The cart's totals do not fit in i32 cents. No real cart gets here,
    /// but a hostile quantity must not wrap into a small charge.
    #[error("cart total exceeds the maximum chargeable amount")]
    AmountOverflow,
}

/// Server-computed order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal_cents: i32,
    pub tax_cents: i32,
    pub discount_cents: i32,
    pub total_cents: i32,
}

/// Computes the authoritative order total from current catalog prices.
/// Any price the client sent with the cart is ignored upstream of this.
pub struct Pricer {
    config: PricingConfig,
}

impl Pricer {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn price(
        &self,
        lines: &[(MenuItem, u32)],
        promo_code: Option<&str>,
    ) -> Result<Totals, PricingError> {
        let subtotal: i64 = lines
            .iter()
            .map(|(item, qty)| i64::from(item.price_cents) * i64::from(*qty))
            .sum();

        // Half-up rounding on the subtotal.
        let tax = (subtotal * i64::from(self.config.tax_rate_bps) + 5_000) / 10_000;

        let discount = promo_code
            .and_then(|code| self.config.promo_discounts_cents.get(code))
            .copied()
            .unwrap_or(0) as i64;

        // A promo can never push the total below zero.
        let discount = discount.min(subtotal + tax);
        let total = subtotal + tax - discount;

        Ok(Totals {
            subtotal_cents: to_cents(subtotal)?,
            tax_cents: to_cents(tax)?,
            discount_cents: to_cents(discount)?,
            total_cents: to_cents(total)?,
        })
    }
}

fn to_cents(amount: i64) -> Result<i32, PricingError> {
    i32::try_from(amount).map_err(|_| PricingError::AmountOverflow)
}
