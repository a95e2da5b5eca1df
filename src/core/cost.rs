//! Cost model - Pure pricing arithmetic for components and products.
//!
//! Every function here is deterministic and side-effect free. All arithmetic is done
//! on [`Decimal`] with checked operations and is never rounded; rounding only happens
//! at display boundaries through [`round_for_display`].

use crate::errors::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places shown to users.
pub const DISPLAY_DECIMALS: u32 = 2;

/// One bill-of-materials entry as seen by the cost model.
///
/// Carries the component's *current* purchase price and margin; the sale price is
/// always recomputed from them rather than read from a cached column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItem {
    /// Component unit purchase price
    pub purchase_price: Decimal,
    /// Component margin in percent
    pub margin_percent: Decimal,
    /// Component units per product unit
    pub quantity: u32,
}

/// Labor parameters of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Labor {
    /// Rate per hour
    pub hourly_rate: Decimal,
    /// Number of hours
    pub hours: Decimal,
}

impl Labor {
    /// Creates labor parameters.
    #[must_use]
    pub const fn new(hourly_rate: Decimal, hours: Decimal) -> Self {
        Self { hourly_rate, hours }
    }

    /// Labor cost: `hourly_rate * hours`.
    ///
    /// # Errors
    /// Returns `Error::Validation` for negative inputs and `Error::Arithmetic` on overflow.
    pub fn cost(&self) -> Result<Decimal> {
        ensure_non_negative(self.hourly_rate, "Hourly rate")?;
        ensure_non_negative(self.hours, "Hours")?;
        self.hourly_rate
            .checked_mul(self.hours)
            .ok_or(Error::Arithmetic { what: "labor cost" })
    }
}

/// Margin of a sale over a cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margin {
    /// `sale - cost`
    pub amount: Decimal,
    /// `amount / cost * 100`, `None` when the cost is zero
    pub percent: Option<Decimal>,
}

/// Unit sale price of a component: `purchase_price * (1 + margin_percent / 100)`.
///
/// Any margin is accepted, including negative ones.
///
/// # Errors
/// Returns `Error::Validation` if the purchase price is negative and
/// `Error::Arithmetic` if the result overflows.
pub fn component_sale_price(purchase_price: Decimal, margin_percent: Decimal) -> Result<Decimal> {
    ensure_non_negative(purchase_price, "Purchase price")?;
    let factor = margin_percent
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(|ratio| Decimal::ONE.checked_add(ratio))
        .ok_or(Error::Arithmetic {
            what: "component margin factor",
        })?;
    purchase_price
        .checked_mul(factor)
        .ok_or(Error::Arithmetic {
            what: "component sale price",
        })
}

/// Unit cost of a product: `Σ(purchase_price × quantity) + hourly_rate × hours`.
///
/// # Errors
/// Returns `Error::Validation` for negative prices, zero quantities or negative labor,
/// and `Error::Arithmetic` on overflow.
pub fn product_cost(items: &[LineItem], labor: Labor) -> Result<Decimal> {
    let mut total = labor.cost()?;
    for item in items {
        ensure_non_negative(item.purchase_price, "Purchase price")?;
        let line = line_total(item.purchase_price, item.quantity, "product cost")?;
        total = total.checked_add(line).ok_or(Error::Arithmetic {
            what: "product cost",
        })?;
    }
    Ok(total)
}

/// Unit sale price of a product: `Σ(component_sale_price × quantity) + hourly_rate × hours`.
///
/// # Errors
/// Same conditions as [`product_cost`].
pub fn product_sale_price(items: &[LineItem], labor: Labor) -> Result<Decimal> {
    let mut total = labor.cost()?;
    for item in items {
        let unit = component_sale_price(item.purchase_price, item.margin_percent)?;
        let line = line_total(unit, item.quantity, "product sale price")?;
        total = total.checked_add(line).ok_or(Error::Arithmetic {
            what: "product sale price",
        })?;
    }
    Ok(total)
}

/// Margin of `sale` over `cost`. The percentage is `None` when `cost` is zero.
#[must_use]
pub fn margin(cost: Decimal, sale: Decimal) -> Margin {
    let amount = sale - cost;
    let percent = if cost.is_zero() {
        None
    } else {
        amount
            .checked_div(cost)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
    };
    Margin { amount, percent }
}

/// Rounds a value to [`DISPLAY_DECIMALS`] places, half away from zero.
#[must_use]
pub fn round_for_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Multiplies a unit price by a quantity, rejecting zero quantities.
pub(crate) fn line_total(unit: Decimal, quantity: u32, what: &'static str) -> Result<Decimal> {
    if quantity == 0 {
        return Err(Error::validation("Quantity must be at least 1"));
    }
    unit.checked_mul(Decimal::from(quantity))
        .ok_or(Error::Arithmetic { what })
}

/// Rejects negative money amounts with a `Validation` error naming the field.
pub(crate) fn ensure_non_negative(value: Decimal, field: &str) -> Result<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

/// Converts a stored quantity into the cost model's unsigned form.
pub(crate) fn quantity_from_db(quantity: i32) -> Result<u32> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| Error::validation(format!("Quantity must be at least 1, got {quantity}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn item(purchase: &str, margin: &str, quantity: u32) -> LineItem {
        LineItem {
            purchase_price: dec(purchase),
            margin_percent: dec(margin),
            quantity,
        }
    }

    #[test]
    fn test_component_sale_price_basic() {
        assert_eq!(component_sale_price(dec("10"), dec("20")).unwrap(), dec("12"));
        assert_eq!(component_sale_price(dec("10"), dec("50")).unwrap(), dec("15"));
        assert_eq!(component_sale_price(dec("0"), dec("35")).unwrap(), dec("0"));
    }

    #[test]
    fn test_component_sale_price_negative_margin_allowed() {
        assert_eq!(component_sale_price(dec("80"), dec("-25")).unwrap(), dec("60"));
    }

    #[test]
    fn test_component_sale_price_rejects_negative_purchase() {
        let result = component_sale_price(dec("-0.01"), dec("10"));
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));
    }

    #[test]
    fn test_component_sale_price_has_no_drift() {
        // 0.1 and 0.2 are not representable in binary floats
        let first = component_sale_price(dec("0.1"), dec("0.2")).unwrap();
        assert_eq!(first, dec("0.1002"));
        for _ in 0..1_000 {
            assert_eq!(component_sale_price(dec("0.1"), dec("0.2")).unwrap(), first);
        }
    }

    #[test]
    fn test_product_cost_and_sale_price() {
        let items = [item("10", "20", 2)];
        let labor = Labor::new(dec("50"), dec("1"));

        assert_eq!(product_cost(&items, labor).unwrap(), dec("70"));
        assert_eq!(product_sale_price(&items, labor).unwrap(), dec("74"));
    }

    #[test]
    fn test_product_price_with_several_components() {
        let items = [item("3.30", "10", 3), item("1.25", "0", 4), item("19.99", "15", 1)];
        let labor = Labor::new(dec("42.50"), dec("0.75"));

        // 9.90 + 5.00 + 19.99 + 31.875
        assert_eq!(product_cost(&items, labor).unwrap(), dec("66.765"));
        // 10.89 + 5.00 + 22.9885 + 31.875
        assert_eq!(product_sale_price(&items, labor).unwrap(), dec("70.7535"));
    }

    #[test]
    fn test_product_sale_price_is_idempotent() {
        let items = [item("7.77", "33.3", 5), item("0.01", "12.5", 9)];
        let labor = Labor::new(dec("61.10"), dec("2.5"));
        let first = product_sale_price(&items, labor).unwrap();
        let second = product_sale_price(&items, labor).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_product_without_components_is_labor_only() {
        let labor = Labor::new(dec("45"), dec("2"));
        assert_eq!(product_cost(&[], labor).unwrap(), dec("90"));
        assert_eq!(product_sale_price(&[], labor).unwrap(), dec("90"));
    }

    #[test]
    fn test_product_rejects_zero_quantity_and_negative_labor() {
        let result = product_cost(&[item("1", "0", 0)], Labor::default());
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let result = product_sale_price(&[], Labor::new(dec("-1"), dec("1")));
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let result = product_sale_price(&[], Labor::new(dec("1"), dec("-1")));
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));
    }

    #[test]
    fn test_overflow_is_reported() {
        let result = product_cost(&[item("79228162514264337593543950335", "0", 2)], Labor::default());
        assert!(matches!(result.unwrap_err(), Error::Arithmetic { what: _ }));
    }

    #[test]
    fn test_margin_percent() {
        let m = margin(dec("70"), dec("74"));
        assert_eq!(m.amount, dec("4"));
        assert_eq!(round_for_display(m.percent.unwrap()), dec("5.71"));
    }

    #[test]
    fn test_margin_with_zero_cost_has_no_percent() {
        let m = margin(Decimal::ZERO, dec("25"));
        assert_eq!(m.amount, dec("25"));
        assert_eq!(m.percent, None);
    }

    #[test]
    fn test_round_for_display() {
        assert_eq!(round_for_display(dec("2.345")), dec("2.35"));
        assert_eq!(round_for_display(dec("-2.345")), dec("-2.35"));
        assert_eq!(round_for_display(dec("2.344")), dec("2.34"));
    }

    #[test]
    fn test_quantity_from_db() {
        assert_eq!(quantity_from_db(3).unwrap(), 3);
        assert!(quantity_from_db(0).is_err());
        assert!(quantity_from_db(-2).is_err());
    }
}
