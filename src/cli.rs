use clap::{Parser, ValueHint};
use std::path::PathBuf;

/* Argument Stucture
 *
 * (no subcommand)   interactive menu
 * list [suppliers | clients | products | invoices]
 * export <invoice-id>
 */

#[derive(Parser)]
pub struct Opts {
    /// Configuration file, read if it exists
    #[clap(short, long, default_value="facturare.conf",
        value_hint=ValueHint::FilePath)]
    pub config: PathBuf,

    /// SQLite database, overrides the configuration file
    #[clap(long, value_hint=ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Directory exported invoices are written to
    #[clap(short, long, value_hint=ValueHint::DirPath)]
    pub out_dir: Option<PathBuf>,

    /// Tax rate as a fraction, e.g. 0.19
    #[clap(short, long)]
    pub tax_rate: Option<String>,

    #[clap(subcommand)]
    pub subcommand: Option<Command>,
}

#[derive(Parser)]
pub enum Command {
    /// List suppliers, clients, products, or invoices
    List {
        #[clap(subcommand)]
        listing: Listable,
    },

    /// Export an issued invoice to a document
    Export {
        /// Invoice id to export
        invoice: i64,
    },
}

#[derive(Parser, Clone, Copy)]
pub enum Listable {
    /// List all suppliers
    Suppliers,
    /// List all clients
    Clients,
    /// List all products
    Products,
    /// List issued invoices
    Invoices,
}
