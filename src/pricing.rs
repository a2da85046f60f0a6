//! Invoice total computation.
//!
//! Every line contributes `quantity * price` minus its own discount. The
//! invoice-level discount is applied to the sum of those nets and tax is
//! applied last. Amounts stay exact until they are presented: each figure in
//! [`Totals`] is rounded half-to-even to two decimal places.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::views::{InvoiceData, LineItemData};

pub const DEFAULT_CURRENCY_SYMBOL: &str = "$";

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    #[default]
    Percentage,
    #[serde(alias = "fixed")]
    Amount,
}

impl DiscountType {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Amount => "amount",
        }
    }

    /// Parse used for stored rows. Unknown or empty values carry no discount.
    pub fn from_db(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "percentage" => Some(DiscountType::Percentage),
            "amount" | "fixed" => Some(DiscountType::Amount),
            _ => None,
        }
    }
}

/// Raised instead of panicking when a figure leaves the `Decimal` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invoice amounts are too large to calculate")]
pub struct PricingOverflow;

pub type PricingResult<T> = Result<T, PricingOverflow>;

fn mul(a: Decimal, b: Decimal) -> PricingResult<Decimal> {
    a.checked_mul(b).ok_or(PricingOverflow)
}

fn add(a: Decimal, b: Decimal) -> PricingResult<Decimal> {
    a.checked_add(b).ok_or(PricingOverflow)
}

fn sub(a: Decimal, b: Decimal) -> PricingResult<Decimal> {
    a.checked_sub(b).ok_or(PricingOverflow)
}

fn percent_of(base: Decimal, rate: Decimal) -> PricingResult<Decimal> {
    mul(base, rate)?.checked_div(HUNDRED).ok_or(PricingOverflow)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Discount {
    pub kind: DiscountType,
    pub value: Decimal,
}

impl Discount {
    pub fn new(kind: DiscountType, value: Decimal) -> Self {
        Self { kind, value }
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// How much this discount takes off `base`.
    pub fn reduction(&self, base: Decimal) -> PricingResult<Decimal> {
        match self.kind {
            DiscountType::Percentage => percent_of(base, self.value),
            DiscountType::Amount => Ok(self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingOptions {
    /// Floor every line net and the discounted subtotal at zero.
    pub clamp_negative: bool,
}

impl Default for PricingOptions {
    fn default() -> Self {
        Self {
            clamp_negative: true,
        }
    }
}

impl PricingOptions {
    pub fn unclamped() -> Self {
        Self {
            clamp_negative: false,
        }
    }

    fn floor(&self, value: Decimal) -> Decimal {
        if self.clamp_negative && value.is_sign_negative() {
            Decimal::ZERO
        } else {
            value
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub quantity: Decimal,
    pub price: Decimal,
    pub discount: Discount,
}

impl From<&LineItemData> for PricedLine {
    fn from(item: &LineItemData) -> Self {
        Self {
            quantity: item.quantity,
            price: item.price,
            discount: Discount::new(item.discount_type, item.discount_value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTerms {
    pub discount: Discount,
    pub tax_rate: Decimal,
    /// When false, a percentage invoice discount only applies to lines that
    /// carry no discount of their own.
    pub apply_to_discounted_items: bool,
}

impl Default for InvoiceTerms {
    fn default() -> Self {
        Self {
            discount: Discount::default(),
            tax_rate: Decimal::ZERO,
            apply_to_discounted_items: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub formatted_total: String,
}

pub fn line_net(line: &PricedLine, options: PricingOptions) -> PricingResult<Decimal> {
    let gross = mul(line.quantity, line.price)?;
    Ok(options.floor(sub(gross, line.discount.reduction(gross)?)?))
}

/// Unrounded figures, in order: subtotal, invoice discount, tax, total.
pub fn compute_exact(
    lines: &[PricedLine],
    terms: &InvoiceTerms,
    options: PricingOptions,
) -> PricingResult<(Decimal, Decimal, Decimal, Decimal)> {
    let mut subtotal = Decimal::ZERO;
    let mut undiscounted = Decimal::ZERO;
    for line in lines {
        let net = line_net(line, options)?;
        subtotal = add(subtotal, net)?;
        if line.discount.is_zero() {
            undiscounted = add(undiscounted, net)?;
        }
    }

    let discount_base = match terms.discount.kind {
        DiscountType::Percentage if !terms.apply_to_discounted_items => undiscounted,
        _ => subtotal,
    };
    let mut discount = terms.discount.reduction(discount_base)?;
    let discounted = options.floor(sub(subtotal, discount)?);
    if discounted.is_zero() && options.clamp_negative {
        discount = subtotal;
    }

    let tax = percent_of(discounted, terms.tax_rate)?;
    Ok((subtotal, discount, tax, add(discounted, tax)?))
}

pub fn compute_totals(
    lines: &[PricedLine],
    terms: &InvoiceTerms,
    options: PricingOptions,
    currency: Option<&str>,
) -> PricingResult<Totals> {
    let (subtotal, discount, tax, total) = compute_exact(lines, terms, options)?;
    Ok(Totals {
        subtotal: round_money(subtotal),
        discount: round_money(discount),
        tax: round_money(tax),
        total: round_money(total),
        formatted_total: format_money(currency, total),
    })
}

pub fn invoice_totals(invoice: &InvoiceData, options: PricingOptions) -> PricingResult<Totals> {
    let lines: Vec<PricedLine> = invoice.items.iter().map(PricedLine::from).collect();
    let terms = InvoiceTerms {
        discount: Discount::new(invoice.discount_type, invoice.discount_value),
        tax_rate: invoice.tax_rate,
        apply_to_discounted_items: invoice.apply_invoice_discount_to_discounted_items,
    };
    compute_totals(&lines, &terms, options, invoice.currency.as_deref())
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

pub fn currency_symbol(currency: Option<&str>) -> &str {
    match currency.map(str::trim) {
        Some(symbol) if !symbol.is_empty() => symbol,
        _ => DEFAULT_CURRENCY_SYMBOL,
    }
}

pub fn format_money(currency: Option<&str>, amount: Decimal) -> String {
    let rounded = round_money(amount);
    let symbol = currency_symbol(currency);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{symbol}{:.2}", rounded.abs())
    } else {
        format!("{symbol}{:.2}", rounded.abs())
    }
}
