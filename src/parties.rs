use std::fmt;

use strum_macros::{Display, EnumString};

/// Which side of an invoice a party sits on. Suppliers and clients share a
/// shape but live in separate tables.
#[derive(Display, EnumString, Debug, PartialEq, Eq, Clone, Copy)]
#[strum(serialize_all = "lowercase")]
pub enum PartyKind {
    Supplier,
    Client,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Party {
    pub id: i64,
    pub name: String,
    pub tax_id: String,
    pub address: String,
}

/// Fields of a party that has not been stored yet.
#[derive(Debug, PartialEq, Clone)]
pub struct NewParty {
    pub name: String,
    pub tax_id: String,
    pub address: String,
}

impl NewParty {
    pub fn new(name: &str, tax_id: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            tax_id: tax_id.to_string(),
            address: address.to_string(),
        }
    }

    pub fn stored_as(self, id: i64) -> Party {
        Party {
            id,
            name: self.name,
            tax_id: self.tax_id,
            address: self.address,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}), {}",
            self.id, self.name, self.tax_id, self.address
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(PartyKind::Supplier.to_string(), "supplier");
        assert_eq!("client".parse::<PartyKind>(), Ok(PartyKind::Client));
    }

    #[test]
    fn display() {
        let party = NewParty::new("Innotech", "RO123456", "Some Place, 4")
            .stored_as(2);
        assert_eq!(party.to_string(), "#2 Innotech (RO123456), Some Place, 4");
    }
}
