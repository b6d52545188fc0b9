use std::fmt;
use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error as ThisError;

use crate::functions;

/// The operations a client can ask for. Each one combines the results of a predefined pair of
/// functions, `f` and `g`, that run in separate worker processes.
///
/// Names are matched case-sensitively: `OR`, `AND` and `MUL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Operation {
    #[strum(serialize = "OR")]
    Or,
    #[strum(serialize = "AND")]
    And,
    #[strum(serialize = "MUL")]
    Mul,
}

/// Identifies the pair of predefined functions a worker process runs for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum NativeTag {
    Or,
    And,
    Int,
}

/// Which function of the pair to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Function {
    F,
    G,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Int,
}

/// An operand or a result of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum OperationError {
    #[error("operation {operation} expects {expected:?} operands, got {lhs:?} and {rhs:?}")]
    TypeMismatch {
        operation: Operation,
        expected: ValueType,
        lhs: Value,
        rhs: Value,
    },
}

impl Operation {
    /// Looks an operation up by its protocol name. Any text other than an exact match yields
    /// `None`.
    pub fn lookup(name: &str) -> Option<Operation> {
        Operation::from_str(name).ok()
    }

    pub fn description(&self) -> &'static str {
        match self {
            Operation::Or => "logical 'OR' of operands",
            Operation::And => "logical 'AND' of operands",
            Operation::Mul => "multiply operands",
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Operation::Or | Operation::And => ValueType::Bool,
            Operation::Mul => ValueType::Int,
        }
    }

    pub fn native_tag(&self) -> NativeTag {
        match self {
            Operation::Or => NativeTag::Or,
            Operation::And => NativeTag::And,
            Operation::Mul => NativeTag::Int,
        }
    }

    /// Inverse of [`Operation::native_tag`].
    pub fn for_native_tag(tag: NativeTag) -> Operation {
        match tag {
            NativeTag::Or => Operation::Or,
            NativeTag::And => Operation::And,
            NativeTag::Int => Operation::Mul,
        }
    }

    /// Number of valid indices for this operation's function pair.
    pub fn domain_size(&self) -> usize {
        functions::domain_size(self.native_tag())
    }

    /// The value that, observed from either operand, decides the result on its own.
    pub fn short_circuit_value(&self) -> Option<Value> {
        match self {
            Operation::Or => Some(Value::Bool(true)),
            Operation::And => Some(Value::Bool(false)),
            Operation::Mul => Some(Value::Int(0)),
        }
    }

    pub fn is_short_circuit(&self, value: &Value) -> bool {
        self.short_circuit_value().as_ref() == Some(value)
    }

    pub fn serialize(&self, value: &Value) -> String {
        value.to_string()
    }

    /// Decodes an operand written by a worker process. Only the exact textual form produced by
    /// [`Operation::serialize`] for this operation's value type is accepted.
    pub fn deserialize(&self, text: &str) -> Option<Value> {
        match self.value_type() {
            ValueType::Bool => match text {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            ValueType::Int => text.parse::<i64>().ok().map(Value::Int),
        }
    }

    pub fn combine(&self, lhs: Value, rhs: Value) -> Result<Value, OperationError> {
        match (self, lhs, rhs) {
            (Operation::Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a || b)),
            (Operation::And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a && b)),
            // Worker results are 64-bit; the product wraps like the workers' native arithmetic.
            (Operation::Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(b))),
            _ => Err(OperationError::TypeMismatch {
                operation: *self,
                expected: self.value_type(),
                lhs,
                rhs,
            }),
        }
    }
}
