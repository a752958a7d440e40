use std::io;

use inquire::error::InquireError;
use thiserror::Error;

use crate::store::EntityKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database Error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    #[error("No {kind} found with id {id}")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("Products not found: {}", join_ids(.ids))]
    MissingProducts { ids: Vec<i64> },

    #[error("{source}")]
    Billing {
        #[from]
        source: BillingError,
    },

    #[error("Stored {column} '{value}' for {kind} {id} is not readable")]
    Corrupt {
        kind: EntityKind,
        id: i64,
        column: &'static str,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Amounts for {item} are too large to invoice")]
    Overflow { item: String },
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Expected {expected} comma separated values, found {found}")]
    FieldCount { expected: String, found: usize },

    #[error("The {field} must not be empty")]
    Empty { field: &'static str },

    #[error("'{value}' is not a valid {field}")]
    NotANumber { field: &'static str, value: String },

    #[error("The {field} must not be negative: {value}")]
    Negative { field: &'static str, value: String },

    #[error("{choice} is not one of the listed options")]
    UnknownOption { choice: u8 },

    #[error("Input Error: {source}")]
    Prompt {
        #[from]
        source: InquireError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO Error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("Error decoding configuration: {source}")]
    Format {
        #[from]
        source: serde_lexpr::Error,
    },

    #[error("Invalid tax rate '{value}': expected a non-negative fraction such as 0.19")]
    TaxRate { value: String },
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
