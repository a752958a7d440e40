/*
 * Invoicing records kept in a local SQLite database
 *
 * 0.1 Requirements:
 * Add, list and remove
 * - suppliers and clients (name, tax id, address)
 * - products (name, quantity on hand, unit price)
 * Issue an invoice
 * - one supplier, one client, a set of products
 * - refuse the invoice when any referenced record is missing
 * - Record the invoice with today's date
 * - Export the invoice to a LaTeX document
 * - Re-export an existing invoice
 *
 * Totals of an invoice:
 *  - Line value: quantity * unit price, rounded to cents
 *  - Line tax: line value * tax rate, rounded to cents
 *  - Subtotal: sum of rounded line values
 *  - Tax: sum of rounded line taxes
 *  - Total: subtotal * (1 + tax rate), rounded to cents
 *
 *  Tax rate and file locations come from an s-expression config file,
 *  overridable on the command line.
 */

mod billing;
mod cli;
mod config;
mod error;
mod input;
mod parties;
mod run;
mod store;
mod templates;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Opts;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // stderr keeps log lines out of the prompts and exported listings
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_logging();
    let opts = Opts::parse();

    if let Err(error) = run::run(opts) {
        eprintln!("{}", error);
    }
}
