use std::num::IntErrorKind;
use std::str;

use thiserror::Error as ThisError;

use crate::operation::Operation;

/// A validated `<OP> <INDEX>` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    pub index: usize,
}

impl Request {
    pub fn in_range(&self) -> bool {
        self.index < self.operation.domain_size()
    }
}

#[derive(Debug, PartialEq)]
pub enum Input {
    /// The client sent an empty line. Nothing to answer.
    Empty,
    Request(Request),
}

#[derive(Debug, ThisError, PartialEq)]
pub enum ParseError {
    #[error("protocol error; line is not valid UTF-8")]
    InvalidUtf8,
    #[error("protocol error; expected a space after the operation name")]
    MissingSeparator,
    #[error("protocol error; unknown operation {0}")]
    UnknownOperation(String),
    #[error("protocol error; missing index")]
    MissingIndex,
    #[error("protocol error; invalid index {0}")]
    InvalidIndex(String),
    #[error("protocol error; index {0} is too large")]
    IndexOverflow(String),
}

/// Parses a line of the form `<name><one-or-more spaces><digits><zero-or-more spaces>`.
///
/// ```
/// use splitcalc::operation::Operation;
/// use splitcalc::request::{parse, Input, Request};
///
/// assert_eq!(
///     parse("AND     5"),
///     Ok(Input::Request(Request { operation: Operation::And, index: 5 }))
/// );
/// assert_eq!(parse(""), Ok(Input::Empty));
/// assert!(parse("OR 1 2").is_err());
/// ```
pub fn parse(line: &str) -> Result<Input, ParseError> {
    if line.is_empty() {
        return Ok(Input::Empty);
    }

    let (name, rest) = line.split_once(' ').ok_or(ParseError::MissingSeparator)?;

    let operation =
        Operation::lookup(name).ok_or_else(|| ParseError::UnknownOperation(name.to_string()))?;

    let digits = rest.trim_matches(' ');
    if digits.is_empty() {
        return Err(ParseError::MissingIndex);
    }

    // `usize::from_str` would also accept a leading `+`.
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidIndex(digits.to_string()));
    }

    let index = digits.parse::<usize>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => ParseError::IndexOverflow(digits.to_string()),
        _ => ParseError::InvalidIndex(digits.to_string()),
    })?;

    Ok(Input::Request(Request { operation, index }))
}

/// Parses a line as read off the wire. Bytes that are not UTF-8 make the line malformed like any
/// other unexpected character.
pub fn parse_bytes(line: &[u8]) -> Result<Input, ParseError> {
    let line = str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
    parse(line)
}
