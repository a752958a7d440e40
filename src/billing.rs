use std::fmt;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::BillingError;
use crate::parties::Party;

type BillingResult<T> = Result<T, BillingError>;

/// Unit of measure printed on every invoice line.
pub const UNIT_LABEL: &str = "BUC";

/// Round a monetary amount to cents, ties to even.
fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

#[derive(Debug, PartialEq, Clone)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl Product {
    fn value(&self) -> BillingResult<Decimal> {
        Decimal::from(self.quantity)
            .checked_mul(self.unit_price)
            .ok_or_else(|| BillingError::Overflow {
                item: self.name.clone(),
            })
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#{} {}, {} {} @ {:.2}",
            self.id, self.name, self.quantity, UNIT_LABEL, self.unit_price
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct NewProduct {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl NewProduct {
    pub fn stored_as(self, id: i64) -> Product {
        Product {
            id,
            name: self.name,
            quantity: self.quantity,
            unit_price: self.unit_price,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(transparent)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Negative rates are rejected.
    pub fn new(fraction: Decimal) -> Option<Self> {
        (!fraction.is_sign_negative()).then_some(Self(fraction))
    }

    pub fn fraction(&self) -> Decimal {
        self.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self(Decimal::new(19, 2))
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.checked_mul(Decimal::ONE_HUNDRED) {
            Some(percent) => write!(f, "{}%", percent.normalize()),
            None => write!(f, "{}", self.0),
        }
    }
}

/// One product's contribution to an invoice.
#[derive(Debug, PartialEq, Clone)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub tax: Decimal,
}

impl LineItem {
    pub fn new(product: &Product, rate: TaxRate) -> BillingResult<Self> {
        let value = product.value()?;
        let tax = value
            .checked_mul(rate.fraction())
            .ok_or_else(|| BillingError::Overflow {
                item: product.name.clone(),
            })?;
        Ok(Self {
            name: product.name.clone(),
            quantity: product.quantity,
            unit_price: product.unit_price,
            total: cents(value),
            tax: cents(tax),
        })
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}, {} {} @ {:.2}: {:.2} + {:.2} tax",
            self.name,
            self.quantity,
            UNIT_LABEL,
            self.unit_price,
            self.total,
            self.tax
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct InvoiceTotal {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl InvoiceTotal {
    /// Lines are summed after their own rounding, and the grand total is
    /// derived from the rounded subtotal rather than from `subtotal + tax`.
    pub fn new(lines: &[LineItem], rate: TaxRate) -> BillingResult<Self> {
        let subtotal = cents(checked_sum(lines.iter().map(|l| l.total), "subtotal")?);
        let tax = cents(checked_sum(lines.iter().map(|l| l.tax), "tax")?);
        let total = Decimal::ONE
            .checked_add(rate.fraction())
            .and_then(|factor| subtotal.checked_mul(factor))
            .ok_or_else(|| BillingError::Overflow {
                item: "total".to_string(),
            })?;
        Ok(Self {
            subtotal,
            tax,
            total: cents(total),
        })
    }
}

fn checked_sum(
    mut amounts: impl Iterator<Item = Decimal>,
    item: &str,
) -> BillingResult<Decimal> {
    amounts
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| BillingError::Overflow {
            item: item.to_string(),
        })
}

impl fmt::Display for InvoiceTotal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtotal: {:.2}", self.subtotal)?;
        writeln!(f, "Tax: {:.2}", self.tax)?;
        write!(f, "\nTotal: {:.2}", self.total)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Invoice {
    pub id: i64,
    pub issue_date: NaiveDate,
    pub supplier_id: i64,
    pub client_id: i64,
    pub product_ids: Vec<i64>,
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let products: Vec<String> =
            self.product_ids.iter().map(|id| id.to_string()).collect();
        write!(
            f,
            "#{} {}, supplier #{}, client #{}, products [{}]",
            self.id,
            self.issue_date,
            self.supplier_id,
            self.client_id,
            products.join(", ")
        )
    }
}

/// An invoice with every record it references resolved.
#[derive(Debug, PartialEq, Clone)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub supplier: Party,
    pub client: Party,
    pub products: Vec<Product>,
}

impl InvoiceDetails {
    pub fn calculate(
        &self,
        rate: TaxRate,
    ) -> BillingResult<(Vec<LineItem>, InvoiceTotal)> {
        calculate(&self.products, rate)
    }
}

/// Line items and totals for a set of products.
pub fn calculate(
    products: &[Product],
    rate: TaxRate,
) -> BillingResult<(Vec<LineItem>, InvoiceTotal)> {
    let lines = products
        .iter()
        .map(|product| LineItem::new(product, rate))
        .collect::<BillingResult<Vec<_>>>()?;
    let total = InvoiceTotal::new(&lines, rate)?;
    Ok((lines, total))
}

impl fmt::Display for InvoiceDetails {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Invoice: #{}\n\
             Date: {}\n\
             Supplier: {}\n\
             Client: {}\n",
            self.invoice.id, self.invoice.issue_date, self.supplier, self.client
        )
    }
}
