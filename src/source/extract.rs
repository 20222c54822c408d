use lazy_static::lazy_static;
use regex::Regex;

use crate::decoder::DecodeError;

lazy_static! {
    // First `= {` in the file, captured greedily through the last `}`.
    static ref TABLE_ASSIGNMENT: Regex =
        Regex::new(r"(?s)=\s*(\{.*\})").expect("table assignment pattern is valid");
}

/// Locate the table literal assigned at the top of a saved-variables file,
/// e.g. the `{ ... }` in `AuctionDB = { ... }`.
///
/// The capture spans to the last closing brace in the text, so nested tables
/// are kept whole. Anything after that brace is ignored.
pub fn extract_table_literal(raw: &str) -> Result<&str, DecodeError> {
    TABLE_ASSIGNMENT
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or(DecodeError::NoAssignment)
}
