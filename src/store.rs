use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use strum_macros::{Display, FromRepr, VariantNames};
use tracing::{debug, info};

use crate::billing::{self, Invoice, InvoiceDetails, NewProduct, Product, TaxRate};
use crate::error::StoreError;
use crate::parties::{NewParty, Party, PartyKind};

type StoreResult<T> = Result<T, StoreError>;

/// Every record kind the store holds. The discriminants double as menu
/// choices.
#[derive(Display, FromRepr, VariantNames, Debug, PartialEq, Eq, Clone, Copy)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum EntityKind {
    Supplier = 1,
    Client = 2,
    Product = 3,
    Invoice = 4,
}

impl EntityKind {
    fn table(&self) -> &'static str {
        match self {
            EntityKind::Supplier => "suppliers",
            EntityKind::Client => "clients",
            EntityKind::Product => "products",
            EntityKind::Invoice => "invoices",
        }
    }
}

impl From<PartyKind> for EntityKind {
    fn from(kind: PartyKind) -> Self {
        match kind {
            PartyKind::Supplier => EntityKind::Supplier,
            PartyKind::Client => EntityKind::Client,
        }
    }
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS suppliers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        tax_id TEXT NOT NULL,
        address TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS clients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        tax_id TEXT NOT NULL,
        address TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS invoices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_date TEXT NOT NULL,
        supplier_id INTEGER NOT NULL,
        client_id INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS invoice_products (
        invoice_id INTEGER NOT NULL,
        product_id INTEGER NOT NULL,
        PRIMARY KEY (invoice_id, product_id)
    );
"#;

/// Handle on the invoicing database. Opened once at startup and passed to
/// every operation.
///
/// References between tables are not enforced: deleting a supplier, client
/// or product leaves invoices that mention it untouched.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> StoreResult<Self> {
        debug!(path = %path.display(), "opening database");
        Self::with_connection(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, source)| source)?;
        Ok(())
    }

    pub fn add_party(
        &mut self,
        kind: PartyKind,
        party: NewParty,
    ) -> StoreResult<Party> {
        let table = EntityKind::from(kind).table();
        self.conn.execute(
            &format!(
                "INSERT INTO {} (name, tax_id, address) VALUES (?1, ?2, ?3)",
                table
            ),
            params![party.name, party.tax_id, party.address],
        )?;
        let party = party.stored_as(self.conn.last_insert_rowid());
        info!(%kind, id = party.id, name = %party.name, "added");
        Ok(party)
    }

    pub fn parties(&self, kind: PartyKind) -> StoreResult<Vec<Party>> {
        let table = EntityKind::from(kind).table();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name, tax_id, address FROM {} ORDER BY id",
            table
        ))?;
        let parties = stmt
            .query_map([], party_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parties)
    }

    pub fn party(&self, kind: PartyKind, id: i64) -> StoreResult<Option<Party>> {
        let table = EntityKind::from(kind).table();
        let party = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, name, tax_id, address FROM {} WHERE id = ?1",
                    table
                ),
                params![id],
                party_from_row,
            )
            .optional()?;
        Ok(party)
    }

    pub fn add_product(&mut self, product: NewProduct) -> StoreResult<Product> {
        self.conn.execute(
            "INSERT INTO products (name, quantity, unit_price) \
             VALUES (?1, ?2, ?3)",
            params![
                product.name,
                product.quantity,
                product.unit_price.to_string()
            ],
        )?;
        let product = product.stored_as(self.conn.last_insert_rowid());
        info!(id = product.id, name = %product.name, "added product");
        Ok(product)
    }

    pub fn products(&self) -> StoreResult<Vec<Product>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, quantity, unit_price FROM products ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], product_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    fn products_by_id(&self, ids: &BTreeSet<i64>) -> StoreResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name, quantity, unit_price FROM products \
             WHERE id IN ({}) ORDER BY id",
            placeholders
        ))?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), product_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    pub fn invoices(&self) -> StoreResult<Vec<Invoice>> {
        let mut product_ids: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT invoice_id, product_id FROM invoice_products \
             ORDER BY invoice_id, product_id",
        )?;
        let links = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        for link in links {
            let (invoice_id, product_id) = link?;
            product_ids.entry(invoice_id).or_default().push(product_id);
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, issue_date, supplier_id, client_id FROM invoices \
             ORDER BY id",
        )?;
        let invoices = stmt
            .query_map([], |row| {
                let id = row.get(0)?;
                Ok(Invoice {
                    id,
                    issue_date: row.get(1)?,
                    supplier_id: row.get(2)?,
                    client_id: row.get(3)?,
                    product_ids: product_ids.remove(&id).unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(invoices)
    }

    /// Record a new invoice dated today. Either every referenced record
    /// resolves and the invoice totals can be computed at `rate`, and the
    /// invoice is written with all of its products, or nothing is written.
    pub fn issue(
        &mut self,
        supplier_id: i64,
        client_id: i64,
        product_ids: &[i64],
        rate: TaxRate,
    ) -> StoreResult<Invoice> {
        self.issue_on(
            Local::now().date_naive(),
            supplier_id,
            client_id,
            product_ids,
            rate,
        )
    }

    fn issue_on(
        &mut self,
        issue_date: NaiveDate,
        supplier_id: i64,
        client_id: i64,
        product_ids: &[i64],
        rate: TaxRate,
    ) -> StoreResult<Invoice> {
        self.require_party(PartyKind::Supplier, supplier_id)?;
        self.require_party(PartyKind::Client, client_id)?;

        let wanted: BTreeSet<i64> = product_ids.iter().copied().collect();
        let products = self.products_by_id(&wanted)?;
        let found: BTreeSet<i64> = products.iter().map(|p| p.id).collect();
        let missing: Vec<i64> = wanted.difference(&found).copied().collect();
        if !missing.is_empty() {
            return Err(StoreError::MissingProducts { ids: missing });
        }
        billing::calculate(&products, rate)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO invoices (issue_date, supplier_id, client_id) \
             VALUES (?1, ?2, ?3)",
            params![issue_date, supplier_id, client_id],
        )?;
        let id = tx.last_insert_rowid();
        for product_id in wanted.iter() {
            tx.execute(
                "INSERT INTO invoice_products (invoice_id, product_id) \
                 VALUES (?1, ?2)",
                params![id, product_id],
            )?;
        }
        tx.commit()?;

        info!(id, supplier_id, client_id, products = wanted.len(), "issued invoice");
        Ok(Invoice {
            id,
            issue_date,
            supplier_id,
            client_id,
            product_ids: wanted.into_iter().collect(),
        })
    }

    fn require_party(&self, kind: PartyKind, id: i64) -> StoreResult<Party> {
        self.party(kind, id)?.ok_or(StoreError::NotFound {
            kind: kind.into(),
            id,
        })
    }

    /// Load an invoice together with the parties and products it points at.
    pub fn invoice_details(&self, id: i64) -> StoreResult<InvoiceDetails> {
        let invoice = self
            .invoices()?
            .into_iter()
            .find(|invoice| invoice.id == id)
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Invoice,
                id,
            })?;
        let supplier =
            self.require_party(PartyKind::Supplier, invoice.supplier_id)?;
        let client = self.require_party(PartyKind::Client, invoice.client_id)?;

        let wanted: BTreeSet<i64> = invoice.product_ids.iter().copied().collect();
        let products = self.products_by_id(&wanted)?;
        if products.len() != wanted.len() {
            let found: BTreeSet<i64> = products.iter().map(|p| p.id).collect();
            return Err(StoreError::MissingProducts {
                ids: wanted.difference(&found).copied().collect(),
            });
        }

        Ok(InvoiceDetails {
            invoice,
            supplier,
            client,
            products,
        })
    }

    /// Remove a record. Unknown ids leave every table unchanged and come back
    /// as `NotFound`.
    pub fn delete(&mut self, kind: EntityKind, id: i64) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        if kind == EntityKind::Invoice {
            tx.execute(
                "DELETE FROM invoice_products WHERE invoice_id = ?1",
                params![id],
            )?;
        }
        let removed = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id],
        )?;
        if removed == 0 {
            // dropping the transaction rolls it back
            return Err(StoreError::NotFound { kind, id });
        }
        tx.commit()?;
        info!(%kind, id, "deleted");
        Ok(())
    }

    #[cfg(test)]
    fn count(&self, table: &str) -> i64 {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get(0)
            })
            .unwrap()
    }
}

fn party_from_row(row: &Row) -> rusqlite::Result<Party> {
    Ok(Party {
        id: row.get(0)?,
        name: row.get(1)?,
        tax_id: row.get(2)?,
        address: row.get(3)?,
    })
}

/// Prices are kept as decimal text; they are parsed after the query so a bad
/// value can be reported against its product.
struct ProductRow {
    id: i64,
    name: String,
    quantity: u32,
    unit_price: String,
}

fn product_row(row: &Row) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        name: row.get(1)?,
        quantity: row.get(2)?,
        unit_price: row.get(3)?,
    })
}

impl ProductRow {
    fn into_product(self) -> StoreResult<Product> {
        let unit_price = Decimal::from_str(&self.unit_price).map_err(|_| {
            StoreError::Corrupt {
                kind: EntityKind::Product,
                id: self.id,
                column: "unit_price",
                value: self.unit_price.clone(),
            }
        })?;
        Ok(Product {
            id: self.id,
            name: self.name,
            quantity: self.quantity,
            unit_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use strum::VariantNames;

    const TABLES: [&str; 5] = [
        "suppliers",
        "clients",
        "products",
        "invoices",
        "invoice_products",
    ];

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
    }

    fn rate() -> TaxRate {
        TaxRate::default()
    }

    fn product(name: &str, quantity: u32, unit_price: Decimal) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            quantity,
            unit_price,
        }
    }

    /// A store with one supplier, one client and two products.
    fn seeded() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        store
            .add_party(
                PartyKind::Supplier,
                NewParty::new("Acme", "RO111", "Main St 1"),
            )
            .unwrap();
        store
            .add_party(
                PartyKind::Client,
                NewParty::new("Innotech", "RO222", "Some Place"),
            )
            .unwrap();
        store.add_product(product("Widget", 10, dec!(5.0))).unwrap();
        store.add_product(product("Gadget", 20, dec!(2.5))).unwrap();
        store
    }

    fn counts(store: &Store) -> Vec<i64> {
        TABLES.iter().map(|t| store.count(t)).collect()
    }

    #[test]
    fn menu_order() {
        assert_eq!(
            EntityKind::VARIANTS,
            &["supplier", "client", "product", "invoice"]
        );
        assert_eq!(EntityKind::from_repr(3), Some(EntityKind::Product));
        assert_eq!(EntityKind::from_repr(0), None);
    }

    #[test]
    fn add_then_list() {
        let mut store = seeded();
        let added = store
            .add_party(
                PartyKind::Supplier,
                NewParty::new("Acme", "RO111", "Elsewhere"),
            )
            .unwrap();

        let suppliers = store.parties(PartyKind::Supplier).unwrap();
        assert_eq!(suppliers.len(), 2);
        assert_eq!(suppliers.last(), Some(&added));
        assert!(suppliers[..1].iter().all(|s| s.id != added.id));

        let products = store.products().unwrap();
        assert_eq!(products[1].name, "Gadget");
        assert_eq!(products[1].unit_price, dec!(2.5));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut store = seeded();
        let first = store.add_product(product("Bolt", 1, dec!(0.1))).unwrap();
        store.delete(EntityKind::Product, first.id).unwrap();
        let second = store.add_product(product("Nut", 1, dec!(0.1))).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn suppliers_and_clients_are_separate() {
        let store = seeded();
        assert_eq!(store.parties(PartyKind::Client).unwrap()[0].name, "Innotech");
        assert_eq!(store.party(PartyKind::Supplier, 1).unwrap().unwrap().name, "Acme");
        assert_eq!(store.party(PartyKind::Client, 9).unwrap(), None);
    }

    #[test]
    fn issue_invoice() {
        let mut store = seeded();
        let invoice = store.issue_on(date(), 1, 1, &[2, 1, 2], rate()).unwrap();
        assert_eq!(invoice.product_ids, vec![1, 2]);
        assert_eq!(store.invoices().unwrap(), vec![invoice.clone()]);
        assert_eq!(store.count("invoice_products"), 2);

        let details = store.invoice_details(invoice.id).unwrap();
        assert_eq!(details.supplier.name, "Acme");
        assert_eq!(details.client.name, "Innotech");
        assert_eq!(details.invoice.issue_date, date());
        assert_eq!(details.products.len(), 2);
    }

    #[test]
    fn issue_with_unknown_supplier() {
        let mut store = seeded();
        let before = counts(&store);
        let error = store.issue_on(date(), 5, 1, &[1], rate()).unwrap_err();
        assert!(matches!(
            error,
            StoreError::NotFound {
                kind: EntityKind::Supplier,
                id: 5
            }
        ));
        assert_eq!(counts(&store), before);
    }

    #[test]
    fn issue_with_unknown_client() {
        let mut store = seeded();
        let error = store.issue_on(date(), 1, 2, &[1], rate()).unwrap_err();
        assert!(matches!(
            error,
            StoreError::NotFound {
                kind: EntityKind::Client,
                id: 2
            }
        ));
    }

    #[test]
    fn issue_with_missing_products() {
        let mut store = seeded();
        let before = counts(&store);
        let error = store.issue_on(date(), 1, 1, &[9, 1, 4, 9], rate()).unwrap_err();
        match error {
            StoreError::MissingProducts { ids } => assert_eq!(ids, vec![4, 9]),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(counts(&store), before);
        assert!(store.invoices().unwrap().is_empty());
    }

    #[test]
    fn issue_with_oversized_amounts() {
        let mut store = seeded();
        store
            .add_product(product("Big", 4_000_000_000, dec!(100000000000000000000)))
            .unwrap();
        let before = counts(&store);
        let error = store.issue_on(date(), 1, 1, &[1, 3], rate()).unwrap_err();
        assert!(matches!(error, StoreError::Billing { .. }));
        assert_eq!(error.to_string(), "Amounts for Big are too large to invoice");
        assert_eq!(counts(&store), before);
    }

    #[test]
    fn issue_without_products() {
        let mut store = seeded();
        let invoice = store.issue_on(date(), 1, 1, &[], rate()).unwrap();
        assert!(invoice.product_ids.is_empty());
        assert!(store.invoice_details(invoice.id).unwrap().products.is_empty());
    }

    #[test]
    fn delete_unknown_ids() {
        let mut store = seeded();
        store.issue_on(date(), 1, 1, &[1, 2], rate()).unwrap();
        let before = counts(&store);
        for kind in [
            EntityKind::Supplier,
            EntityKind::Client,
            EntityKind::Product,
            EntityKind::Invoice,
        ] {
            let error = store.delete(kind, 42).unwrap_err();
            assert!(matches!(error, StoreError::NotFound { id: 42, .. }));
            assert_eq!(counts(&store), before);
        }
    }

    #[test]
    fn delete_invoice_removes_links() {
        let mut store = seeded();
        let invoice = store.issue_on(date(), 1, 1, &[1, 2], rate()).unwrap();
        store.delete(EntityKind::Invoice, invoice.id).unwrap();
        assert_eq!(store.count("invoices"), 0);
        assert_eq!(store.count("invoice_products"), 0);
        assert_eq!(store.count("products"), 2);
    }

    #[test]
    fn delete_referenced_records_is_allowed() {
        let mut store = seeded();
        let invoice = store.issue_on(date(), 1, 1, &[1, 2], rate()).unwrap();

        store.delete(EntityKind::Product, 2).unwrap();
        assert_eq!(store.invoices().unwrap()[0].product_ids, vec![1, 2]);
        match store.invoice_details(invoice.id).unwrap_err() {
            StoreError::MissingProducts { ids } => assert_eq!(ids, vec![2]),
            other => panic!("unexpected error: {}", other),
        }

        store.delete(EntityKind::Supplier, 1).unwrap();
        assert!(matches!(
            store.invoice_details(invoice.id).unwrap_err(),
            StoreError::NotFound {
                kind: EntityKind::Supplier,
                id: 1
            }
        ));
        assert_eq!(store.count("invoices"), 1);
    }

    #[test]
    fn unreadable_price() {
        let store = seeded();
        store
            .conn
            .execute("UPDATE products SET unit_price = 'n/a' WHERE id = 2", [])
            .unwrap();
        assert!(matches!(
            store.products().unwrap_err(),
            StoreError::Corrupt { id: 2, .. }
        ));
    }

    #[test]
    fn reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facturare.db");

        let mut store = Store::open(&path).unwrap();
        store
            .add_party(PartyKind::Client, NewParty::new("Innotech", "RO222", "Some Place"))
            .unwrap();
        store.close().unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.parties(PartyKind::Client).unwrap().len(), 1);
    }
}
