//! Runtime error taxonomy

use crate::value::Value;
use reify_types::RegistryError;

/// Errors raised by runtime operations
///
/// Every variant is recoverable by the caller. Errors raised inside async
/// bodies reject the associated future instead of unwinding.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// Member lookup failed on a receiver
    #[error("NoSuchMethodError: '{member}' not found on {receiver}")]
    NoSuchMethod {
        /// Member name that was requested
        member: String,
        /// Type name of the receiver (`null` for null receivers)
        receiver: String,
    },

    /// Explicit `as` cast failed
    #[error("CastError: {actual} is not a subtype of {expected} in type cast")]
    Cast {
        /// Runtime type of the value
        actual: String,
        /// Target type of the cast
        expected: String,
    },

    /// Implicit checked-mode assertion failed
    #[error("TypeError: {actual} is not a subtype of {expected}")]
    Type {
        /// Runtime type of the value
        actual: String,
        /// Expected type
        expected: String,
    },

    /// Wrong arity or argument type, bad radix
    #[error("ArgumentError: {0}")]
    Argument(String),

    /// Operation not allowed on a fixed-length or unmodifiable value
    #[error("UnsupportedError: {0}")]
    Unsupported(String),

    /// Index or range out of bounds
    #[error("RangeError: {0}")]
    Range(String),

    /// Operation invalid in the current state
    #[error("StateError: {0}")]
    State(String),

    /// Malformed input to a parser
    #[error("FormatException: {0}")]
    Format(String),

    /// Integer division or modulo by zero
    #[error("IntegerDivisionByZeroException")]
    IntegerDivisionByZero,

    /// Failed checked-mode assertion
    #[error("AssertionError: {0}")]
    Assertion(String),

    /// A value thrown by compiled code
    #[error("Uncaught exception: {0}")]
    Thrown(Value),

    /// Type registration failed
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

impl RuntimeError {
    /// Shorthand for a no-such-method error
    pub fn no_such_method(member: impl Into<String>, receiver: impl Into<String>) -> Self {
        RuntimeError::NoSuchMethod {
            member: member.into(),
            receiver: receiver.into(),
        }
    }

    /// Name of the error class this error represents
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::NoSuchMethod { .. } => "NoSuchMethodError",
            RuntimeError::Cast { .. } => "CastError",
            RuntimeError::Type { .. } => "TypeError",
            RuntimeError::Argument(_) => "ArgumentError",
            RuntimeError::Unsupported(_) => "UnsupportedError",
            RuntimeError::Range(_) => "RangeError",
            RuntimeError::State(_) => "StateError",
            RuntimeError::Format(_) => "FormatException",
            RuntimeError::IntegerDivisionByZero => "IntegerDivisionByZeroException",
            RuntimeError::Assertion(_) => "AssertionError",
            RuntimeError::Thrown(_) => "Thrown",
            RuntimeError::Registry(_) => "RegistryError",
        }
    }

    /// The thrown value, if this error carries one
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            RuntimeError::Thrown(v) => Some(v),
            _ => None,
        }
    }

    /// Value handed to compiled error handlers (`catchError`, `onError`)
    ///
    /// Thrown values pass through unchanged; runtime errors become their
    /// message string.
    pub fn to_value(&self) -> Value {
        match self {
            RuntimeError::Thrown(v) => v.clone(),
            other => Value::string(other.to_string()),
        }
    }
}

/// Runtime operation result
pub type RtResult<T> = Result<T, RuntimeError>;

/// Range check used by every indexed access
pub(crate) fn check_index(index: i64, len: usize) -> RtResult<usize> {
    if index < 0 || index as usize >= len {
        return Err(RuntimeError::Range(format!(
            "Index out of range: index should be less than {}: {}",
            len, index
        )));
    }
    Ok(index as usize)
}

/// Largest length a string or list may reach
pub(crate) const MAX_LENGTH: usize = 1 << 28;

/// Largest bit width an int may reach by shifting
pub(crate) const MAX_INT_BITS: u64 = 1 << 24;

/// Validate a requested length; `None` means the computation overflowed
pub(crate) fn check_length(len: Option<i64>, what: &str) -> RtResult<usize> {
    match len {
        Some(len) if len < 0 => Err(RuntimeError::Range(format!("Invalid length: {}", len))),
        Some(len) if len as u64 <= MAX_LENGTH as u64 => Ok(len as usize),
        _ => Err(RuntimeError::Range(format!(
            "{} length exceeds the maximum of {}",
            what, MAX_LENGTH
        ))),
    }
}
