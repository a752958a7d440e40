use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use askama::Template;
use askama_escape::Escaper;
use tracing::info;

use crate::billing::{InvoiceDetails, LineItem, TaxRate, UNIT_LABEL};
use crate::error::BillingError;
use crate::run::RunError;

/// One row of the product table. Every value is already text.
#[derive(Debug, PartialEq, Clone)]
pub struct DocumentRow {
    pub sequence: String,
    pub description: String,
    pub unit: String,
    pub quantity: String,
    pub unit_price: String,
    pub line_total: String,
    pub line_tax: String,
}

impl DocumentRow {
    fn new(sequence: usize, line: &LineItem) -> Self {
        Self {
            sequence: sequence.to_string(),
            description: line.name.clone(),
            unit: UNIT_LABEL.to_string(),
            quantity: line.quantity.to_string(),
            unit_price: format!("{:.2}", line.unit_price),
            line_total: format!("{:.2}", line.total),
            line_tax: format!("{:.2}", line.tax),
        }
    }
}

#[derive(Template)]
#[template(path = "invoice.tex")]
struct InvoiceDocument<'a> {
    invoice_id: String,
    issue_date: String,
    supplier_name: &'a str,
    supplier_tax_id: &'a str,
    supplier_address: &'a str,
    client_name: &'a str,
    client_tax_id: &'a str,
    client_address: &'a str,
    tax_rate: String,
    subtotal: String,
    subtotal_tax: String,
    total: String,
    rows: Vec<DocumentRow>,
}

impl<'a> InvoiceDocument<'a> {
    fn new(details: &'a InvoiceDetails, rate: TaxRate) -> Result<Self, BillingError> {
        let (lines, total) = details.calculate(rate)?;
        Ok(Self {
            invoice_id: details.invoice.id.to_string(),
            issue_date: details.invoice.issue_date.to_string(),
            supplier_name: &details.supplier.name,
            supplier_tax_id: &details.supplier.tax_id,
            supplier_address: &details.supplier.address,
            client_name: &details.client.name,
            client_tax_id: &details.client.tax_id,
            client_address: &details.client.address,
            tax_rate: rate.to_string(),
            subtotal: format!("{:.2}", total.subtotal),
            subtotal_tax: format!("{:.2}", total.tax),
            total: format!("{:.2}", total.total),
            rows: lines
                .iter()
                .enumerate()
                .map(|(i, line)| DocumentRow::new(i + 1, line))
                .collect(),
        })
    }
}

pub fn file_name(invoice_id: i64) -> String {
    format!("invoice{}.tex", invoice_id)
}

pub fn render(details: &InvoiceDetails, rate: TaxRate) -> Result<String, RunError> {
    Ok(InvoiceDocument::new(details, rate)?.render()?)
}

/// Write the invoice document into `dir`, replacing an earlier export of the
/// same invoice.
pub fn export(
    details: &InvoiceDetails,
    rate: TaxRate,
    dir: &Path,
) -> Result<PathBuf, RunError> {
    let document = render(details, rate)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name(details.invoice.id));
    fs::write(&path, document)?;
    info!(invoice = details.invoice.id, path = %path.display(), "exported");
    Ok(path)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tex;

impl Escaper for Tex {
    fn write_escaped<W>(&self, mut fmt: W, string: &str) -> fmt::Result
    where
        W: fmt::Write,
    {
        for c in string.chars() {
            match c {
                '%' | '$' | '&' | '#' | '_' | '{' | '}' => {
                    fmt.write_char('\\')?;
                    fmt.write_char(c)?
                }
                '~' => fmt.write_str("\\textasciitilde{}")?,
                '^' => fmt.write_str("\\textasciicircum{}")?,
                '\\' => fmt.write_str("\\textbackslash{}")?,
                _ => fmt.write_char(c)?,
            }
        }
        Ok(())
    }
}
