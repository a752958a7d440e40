use std::io;
use std::path::PathBuf;

use const_format::formatcp;
use inquire::error::InquireError;
use strum_macros::FromRepr;
use thiserror::Error;
use tracing::warn;

use crate::billing::InvoiceDetails;
use crate::cli::{Command, Listable, Opts};
use crate::config::Config;
use crate::error::{BillingError, ConfigError, InputError, StoreError};
use crate::input::{self, LineSource, Terminal};
use crate::parties::PartyKind;
use crate::store::{EntityKind, Store};
use crate::templates;

/* Menu Structure
 *
 * 1 list   (suppliers | clients | products | invoices)
 * 2 add    (supplier | client | product | issue invoice)
 * 3 delete (supplier | client | product | invoice)
 * 0 exit
 */

const CHOOSE: &str = "Enter the number of the operation:";
const BACK: &str = "0 Back";

const MAIN_MENU: &str = formatcp!(
    "{}\n  1 List suppliers, clients, products, invoices\n  \
     2 Add suppliers, clients, products, issue invoices\n  \
     3 Delete suppliers, clients, products, invoices\n  \
     0 Exit\n",
    CHOOSE
);

const LIST_MENU: &str = formatcp!(
    "{}\n  1 List suppliers\n  2 List clients\n  3 List products\n  \
     4 List issued invoices\n  {}\n",
    CHOOSE,
    BACK
);

const ADD_MENU: &str = formatcp!(
    "{}\n  1 Add supplier\n  2 Add client\n  3 Add product\n  \
     4 Issue invoice\n  {}\n",
    CHOOSE,
    BACK
);

const DELETE_MENU: &str = formatcp!(
    "{}\n  1 Delete supplier\n  2 Delete client\n  3 Delete product\n  \
     4 Delete invoice\n  {}\n",
    CHOOSE,
    BACK
);

const PARTY_FORMAT: &str = "Name, RO123456, Address";
const PRODUCT_FORMAT: &str = "Product name, quantity, unit price";
const INVOICE_FORMAT: &str = "supplier id, client id, product 1, product 2, ...";

#[derive(FromRepr, Debug, Clone, Copy)]
#[repr(u8)]
enum Section {
    List = 1,
    Add = 2,
    Delete = 3,
}

impl Section {
    fn menu(&self) -> &'static str {
        match self {
            Section::List => LIST_MENU,
            Section::Add => ADD_MENU,
            Section::Delete => DELETE_MENU,
        }
    }
}

impl From<Listable> for EntityKind {
    fn from(listing: Listable) -> Self {
        match listing {
            Listable::Suppliers => EntityKind::Supplier,
            Listable::Clients => EntityKind::Client,
            Listable::Products => EntityKind::Product,
            Listable::Invoices => EntityKind::Invoice,
        }
    }
}

fn party_kind(kind: EntityKind) -> Option<PartyKind> {
    match kind {
        EntityKind::Supplier => Some(PartyKind::Supplier),
        EntityKind::Client => Some(PartyKind::Client),
        _ => None,
    }
}

pub fn run(opts: Opts) -> Result<(), RunError> {
    let config = Config::load(&opts.config)?.with_overrides(&opts)?;
    let mut store = Store::open(&config.database)?;
    let result = run_cmd(opts.subcommand, &mut store, &config);
    store.close()?;
    result
}

fn run_cmd(
    cmd: Option<Command>,
    store: &mut Store,
    config: &Config,
) -> Result<(), RunError> {
    match cmd {
        None => match shell(&mut Terminal, store, config) {
            Err(error) if error.interrupted() => Ok(()),
            result => result,
        },
        Some(Command::List { listing }) => {
            print!("{}", list(store, listing.into())?);
            Ok(())
        }
        Some(Command::Export { invoice }) => {
            let path = export(store, config, invoice)?;
            println!("Invoice {} exported to {}", invoice, path.display());
            Ok(())
        }
    }
}

/// What to do once an error has been reported.
enum Flow {
    Continue,
    Back,
    Quit,
}

impl RunError {
    fn flow(&self) -> Flow {
        match self {
            RunError::Input {
                source:
                    InputError::Prompt {
                        source: InquireError::OperationCanceled,
                    },
            } => Flow::Back,
            RunError::Input {
                source: InputError::Prompt { .. },
            } => Flow::Quit,
            _ => Flow::Continue,
        }
    }

    /// Ctrl-C at a prompt.
    fn interrupted(&self) -> bool {
        matches!(
            self,
            RunError::Input {
                source: InputError::Prompt {
                    source: InquireError::OperationInterrupted
                }
            }
        )
    }
}

/// Read a menu choice. `None` means leave this level.
fn read_choice(
    lines: &mut impl LineSource,
    menu: &str,
    max: u8,
) -> Result<Option<u8>, RunError> {
    loop {
        let outcome = lines
            .read_line(menu, None)
            .and_then(|raw| input::choice(&raw, max));
        match outcome {
            Ok(0) => return Ok(None),
            Ok(choice) => return Ok(Some(choice)),
            Err(error) => {
                let error = RunError::from(error);
                match error.flow() {
                    Flow::Continue => println!("{}", error),
                    Flow::Back => return Ok(None),
                    Flow::Quit => return Err(error),
                }
            }
        }
    }
}

fn shell(
    lines: &mut impl LineSource,
    store: &mut Store,
    config: &Config,
) -> Result<(), RunError> {
    while let Some(choice) = read_choice(lines, MAIN_MENU, 3)? {
        let Some(section) = Section::from_repr(choice) else {
            continue;
        };
        section_loop(lines, store, config, section)?;
    }
    Ok(())
}

fn section_loop(
    lines: &mut impl LineSource,
    store: &mut Store,
    config: &Config,
    section: Section,
) -> Result<(), RunError> {
    while let Some(choice) = read_choice(lines, section.menu(), 4)? {
        let Some(kind) = EntityKind::from_repr(choice) else {
            continue;
        };
        let outcome = match section {
            Section::List => list(store, kind).map(|listing| print!("{}", listing)),
            Section::Add => add(lines, store, config, kind),
            Section::Delete => delete(lines, store, kind),
        };
        if let Err(error) = outcome {
            match error.flow() {
                Flow::Continue => {
                    warn!(%error, "operation failed");
                    println!("{}", error);
                }
                Flow::Back => continue,
                Flow::Quit => return Err(error),
            }
        }
    }
    Ok(())
}

fn list(store: &Store, kind: EntityKind) -> Result<String, RunError> {
    let lines: Vec<String> = match kind {
        EntityKind::Supplier => store
            .parties(PartyKind::Supplier)?
            .iter()
            .map(ToString::to_string)
            .collect(),
        EntityKind::Client => store
            .parties(PartyKind::Client)?
            .iter()
            .map(ToString::to_string)
            .collect(),
        EntityKind::Product => {
            store.products()?.iter().map(ToString::to_string).collect()
        }
        EntityKind::Invoice => {
            store.invoices()?.iter().map(ToString::to_string).collect()
        }
    };
    if lines.is_empty() {
        return Ok(format!("No {} records\n", kind));
    }
    Ok(lines.iter().map(|line| format!("{}\n", line)).collect())
}

fn add(
    lines: &mut impl LineSource,
    store: &mut Store,
    config: &Config,
    kind: EntityKind,
) -> Result<(), RunError> {
    let (message, format) = match kind {
        EntityKind::Supplier => ("New supplier:", PARTY_FORMAT),
        EntityKind::Client => ("New client:", PARTY_FORMAT),
        EntityKind::Product => ("New product:", PRODUCT_FORMAT),
        EntityKind::Invoice => {
            for listed in [EntityKind::Supplier, EntityKind::Client, EntityKind::Product] {
                print!("{}", list(store, listed)?);
            }
            ("Invoice:", INVOICE_FORMAT)
        }
    };
    let raw = lines.read_line(message, Some(format))?;
    println!("{}", add_record(store, config, kind, &raw)?);
    Ok(())
}

/// Parse `raw` for `kind` and store it. Issued invoices are exported right
/// away.
fn add_record(
    store: &mut Store,
    config: &Config,
    kind: EntityKind,
    raw: &str,
) -> Result<String, RunError> {
    if let Some(party_kind) = party_kind(kind) {
        let party = store.add_party(party_kind, input::party(raw)?)?;
        return Ok(format!("Added {} {}", kind, party));
    }
    if kind == EntityKind::Product {
        let product = store.add_product(input::product(raw)?)?;
        return Ok(format!("Added product {}", product));
    }

    let request = input::issue_request(raw)?;
    let invoice = store.issue(
        request.supplier_id,
        request.client_id,
        &request.product_ids,
        config.tax_rate,
    )?;
    let details = store.invoice_details(invoice.id)?;
    let path = templates::export(&details, config.tax_rate, &config.output_dir)?;
    Ok(format!(
        "Invoice {} issued\n{}\n{}\nExported to {}",
        invoice.id,
        details,
        summary(&details, config)?,
        path.display()
    ))
}

fn summary(details: &InvoiceDetails, config: &Config) -> Result<String, RunError> {
    let (lines, total) = details.calculate(config.tax_rate)?;
    let mut summary: String = lines.iter().map(|line| format!("{}\n", line)).collect();
    summary.push_str(&format!("\n{}", total));
    Ok(summary)
}

fn delete(
    lines: &mut impl LineSource,
    store: &mut Store,
    kind: EntityKind,
) -> Result<(), RunError> {
    print!("{}", list(store, kind)?);
    let raw = lines.read_line(
        &format!("Id of the {} to delete:", kind),
        Some("One of the ids listed above"),
    )?;
    println!("{}", delete_record(store, kind, &raw)?);
    Ok(())
}

fn delete_record(store: &mut Store, kind: EntityKind, raw: &str) -> Result<String, RunError> {
    let id = input::id(raw)?;
    match store.delete(kind, id) {
        Ok(()) => Ok(format!("Deleted {} {}", kind, id)),
        Err(StoreError::NotFound { kind, id }) => {
            warn!(%kind, id, "nothing to delete");
            Ok(format!("No {} found with id {}", kind, id))
        }
        Err(error) => Err(error.into()),
    }
}

fn export(store: &Store, config: &Config, invoice: i64) -> Result<PathBuf, RunError> {
    let details = store.invoice_details(invoice)?;
    templates::export(&details, config.tax_rate, &config.output_dir)
}


#[derive(Debug, Error)]
pub enum RunError {
    #[error("IO Error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("{source}")]
    Input {
        #[from]
        source: InputError,
    },

    #[error("{source}")]
    Store {
        #[from]
        source: StoreError,
    },

    #[error("{source}")]
    Billing {
        #[from]
        source: BillingError,
    },

    #[error("Error rendering invoice: {source}")]
    Render {
        #[from]
        source: askama::Error,
    },
}
