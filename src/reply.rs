use std::fmt;

use itertools::Itertools;
use strum::IntoEnumIterator;

use crate::operation::{Operation, Value};

const INVALID_INPUT: &str = "You have an error in your input, try again!\n";
const OUT_OF_RANGE: &str = "Provided index is out of allowed range!\n";
const IN_PROGRESS: &str = "Computing, please wait...\n";
const INTERNAL_ERROR: &str = "Internal error occurred while computing, try again!\n";

/// Everything the server can say to a client.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// Banner sent once when the connection starts.
    Usage,
    InvalidInput,
    OutOfRange,
    InProgress,
    ShortCircuit(Value),
    Result(Value),
    InternalError,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Usage => write!(f, "{}", usage()),
            Reply::InvalidInput => f.write_str(INVALID_INPUT),
            Reply::OutOfRange => f.write_str(OUT_OF_RANGE),
            Reply::InProgress => f.write_str(IN_PROGRESS),
            Reply::ShortCircuit(value) => writeln!(f, "Short circuit: {}", value),
            Reply::Result(value) => writeln!(f, "Result: {}", value),
            Reply::InternalError => f.write_str(INTERNAL_ERROR),
        }
    }
}

impl From<Reply> for Vec<u8> {
    fn from(reply: Reply) -> Self {
        reply.to_string().into_bytes()
    }
}

fn usage() -> String {
    let operations = Operation::iter()
        .map(|op| format!("    {}\n        - {}\n", op, op.description()))
        .join("");

    // All operations share the same domain today; report the narrowest one if that changes.
    let last_index = Operation::iter()
        .map(|op| op.domain_size())
        .min()
        .unwrap_or(0)
        .saturating_sub(1);

    format!(
        "SYNOPSIS\n\
         \x20   Provide operation and index to retrieve predefined functions attributes.\n\
         \x20   Apply operation to functions result.\n\
         \n\
         OPERATIONS\n\
         {operations}\
         \n\
         INDEX RANGE\n\
         \x20   [0 - {last_index}]\n\
         \n\
         EXAMPLE\n\
         \x20   OR 0\n\
         \n\
         \n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_lists_every_operation() {
        let banner = Reply::Usage.to_string();

        assert!(banner.starts_with("SYNOPSIS\n"));
        assert!(banner.contains("    OR\n        - logical 'OR' of operands\n"));
        assert!(banner.contains("    AND\n        - logical 'AND' of operands\n"));
        assert!(banner.contains("    MUL\n        - multiply operands\n"));
        assert!(banner.contains("INDEX RANGE\n    [0 - 5]\n"));
        assert!(banner.ends_with("\n\n"));
    }

    #[test]
    fn outcomes() {
        assert_eq!(
            Reply::ShortCircuit(Value::Bool(true)).to_string(),
            "Short circuit: true\n"
        );
        assert_eq!(Reply::Result(Value::Int(6)).to_string(), "Result: 6\n");
        assert_eq!(Reply::Result(Value::Int(-42)).to_string(), "Result: -42\n");
    }

    #[test]
    fn fixed_messages_are_single_lines() {
        for reply in [
            Reply::InvalidInput,
            Reply::OutOfRange,
            Reply::InProgress,
            Reply::InternalError,
        ] {
            let text = reply.to_string();
            assert!(text.ends_with('\n'));
            assert_eq!(text.matches('\n').count(), 1, "{:?}", reply);
        }
    }

    #[test]
    fn into_bytes() {
        let bytes: Vec<u8> = Reply::Result(Value::Bool(false)).into();
        assert_eq!(bytes, b"Result: false\n".to_vec());
    }
}
