use std::str::FromStr;

use inquire::Text;
use rust_decimal::Decimal;

use crate::billing::NewProduct;
use crate::error::InputError;
use crate::parties::NewParty;

type InputResult<T> = Result<T, InputError>;

/// Supplier id, client id and the products to bill.
#[derive(Debug, PartialEq, Clone)]
pub struct IssueRequest {
    pub supplier_id: i64,
    pub client_id: i64,
    pub product_ids: Vec<i64>,
}

fn split(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).collect()
}

fn non_empty<'a>(field: &'static str, value: &'a str) -> InputResult<&'a str> {
    if value.is_empty() {
        Err(InputError::Empty { field })
    } else {
        Ok(value)
    }
}

fn number<T: FromStr>(field: &'static str, value: &str) -> InputResult<T> {
    if value.starts_with('-') {
        return Err(InputError::Negative {
            field,
            value: value.to_string(),
        });
    }
    value.parse().map_err(|_| InputError::NotANumber {
        field,
        value: value.to_string(),
    })
}

/// `name, tax id, address`. Everything after the second comma belongs to the
/// address.
pub fn party(raw: &str) -> InputResult<NewParty> {
    let fields: Vec<&str> = raw.splitn(3, ',').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(InputError::FieldCount {
            expected: "3".to_string(),
            found: fields.len(),
        });
    }
    Ok(NewParty::new(
        non_empty("name", fields[0])?,
        non_empty("tax id", fields[1])?,
        non_empty("address", fields[2])?,
    ))
}

/// `name, quantity, unit price`
pub fn product(raw: &str) -> InputResult<NewProduct> {
    let fields = split(raw);
    if fields.len() != 3 {
        return Err(InputError::FieldCount {
            expected: "3".to_string(),
            found: fields.len(),
        });
    }
    let unit_price: Decimal = number("unit price", fields[2])?;
    Ok(NewProduct {
        name: non_empty("name", fields[0])?.to_string(),
        quantity: number("quantity", fields[1])?,
        unit_price,
    })
}

/// `supplier id, client id, product id, ...`
pub fn issue_request(raw: &str) -> InputResult<IssueRequest> {
    let fields = split(raw);
    if fields.len() < 2 {
        return Err(InputError::FieldCount {
            expected: "at least 2".to_string(),
            found: fields.len(),
        });
    }
    // a single trailing comma is tolerated
    let mut product_fields = &fields[2..];
    if let Some((&"", rest)) = product_fields.split_last() {
        product_fields = rest;
    }
    let product_ids = product_fields
        .iter()
        .map(|f| non_empty("product id", f).and_then(|f| number("product id", f)))
        .collect::<InputResult<Vec<i64>>>()?;
    Ok(IssueRequest {
        supplier_id: number("supplier id", fields[0])?,
        client_id: number("client id", fields[1])?,
        product_ids,
    })
}

pub fn id(raw: &str) -> InputResult<i64> {
    number("id", raw.trim())
}

/// A menu choice between `0` and `max`.
pub fn choice(raw: &str, max: u8) -> InputResult<u8> {
    let choice: u8 = number("option", raw.trim())?;
    if choice > max {
        return Err(InputError::UnknownOption { choice });
    }
    Ok(choice)
}

/// Where menu choices and record lines are read from.
pub trait LineSource {
    fn read_line(&mut self, message: &str, help: Option<&str>) -> InputResult<String>;
}

/// Interactive prompts on the terminal.
pub struct Terminal;

impl LineSource for Terminal {
    fn read_line(&mut self, message: &str, help: Option<&str>) -> InputResult<String> {
        let mut text = Text::new(message);
        if let Some(help) = help {
            text = text.with_help_message(help);
        }
        Ok(text.prompt()?)
    }
}
