//! Reads an octal core listing.
//!
//! Each non-blank line holds a physical address and a word, both in
//! octal, separated by white space.  Anything after a `;` is a
//! comment.  This is a convenience for trying out programs; it is
//! not the format of any SDS boot medium.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use base::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingError {
    pub line: usize,
    pub message: String,
}

impl Display for ListingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl Error for ListingError {}

fn parse_octal(field: &str, line: usize, what: &str) -> Result<u32, ListingError> {
    u32::from_str_radix(field, 8).map_err(|e| ListingError {
        line,
        message: format!("{what} '{field}' is not an octal number: {e}"),
    })
}

type ListingEntry = (PhysicalAddress, Unsigned24Bit);

fn parse_line(text: &str, line: usize) -> Result<Option<ListingEntry>, ListingError> {
    let text = match text.split_once(';') {
        Some((before, _comment)) => before,
        None => text,
    };
    let mut fields = text.split_whitespace();
    let Some(address) = fields.next() else {
        return Ok(None);
    };
    let Some(value) = fields.next() else {
        return Err(ListingError {
            line,
            message: format!("address {address} has no word"),
        });
    };
    if let Some(extra) = fields.next() {
        return Err(ListingError {
            line,
            message: format!("unexpected '{extra}' after the word"),
        });
    }
    let address = PhysicalAddress::try_from(parse_octal(address, line, "address")?).map_err(|_| {
        ListingError {
            line,
            message: format!("address {address} is outside physical memory"),
        }
    })?;
    let value = Unsigned24Bit::try_from(parse_octal(value, line, "word")?).map_err(|_| {
        ListingError {
            line,
            message: format!("word {value} does not fit in 24 bits"),
        }
    })?;
    Ok(Some((address, value)))
}

/// Parse a whole listing.  Line numbers in errors start at 1.
pub fn parse_listing(text: &str) -> Result<Vec<ListingEntry>, ListingError> {
    text.lines()
        .enumerate()
        .filter_map(|(n, line)| parse_line(line, n + 1).transpose())
        .collect()
}

#[test]
fn test_parse_listing() {
    let text = "; a tiny program\n100 20000000\n\n101 00000000 ; HLT\n";
    let words = parse_listing(text).expect("listing should be valid");
    assert_eq!(
        words,
        vec![
            (PhysicalAddress::from_low_bits(0o100), u24!(0o20000000)),
            (PhysicalAddress::from_low_bits(0o101), u24!(0)),
        ]
    );
}

#[test]
fn test_bad_listings() {
    let err = parse_listing("100 1\n101\n").expect_err("missing word should be rejected");
    assert_eq!(err.line, 2);
    assert!(parse_listing("108 1\n").is_err());
    assert!(parse_listing("100 100000000\n").is_err());
    assert!(parse_listing("400000 1\n").is_err());
    assert!(parse_listing("100 1 2\n").is_err());
}
