//! Value representation
//!
//! Every value the runtime handles is a `Value`. Primitives are stored
//! inline; containers, instances, functions and async handles are
//! reference-counted so that copies share identity the way references do in
//! compiled code.
//!
//! ```text
//! Null | Bool | Int (arbitrary precision) | Double | Str
//! List | Map | Set | Object | Function | Type | Future | Stream | Iterable
//! ```

use crate::async_support::{FutureRef, IterableRef, StreamRef};
use crate::class::ObjectRef;
use crate::collections::{ListRef, MapRef, SetRef};
use crate::function::FunctionRef;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use reify_types::TypeId;
use std::fmt;
use std::sync::Arc;

/// A runtime value
#[derive(Clone)]
pub enum Value {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Arbitrary precision integer
    Int(BigInt),
    /// IEEE 754 double
    Double(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Growable, fixed-length or unmodifiable list
    List(ListRef),
    /// Insertion-ordered map
    Map(MapRef),
    /// Insertion-ordered set
    Set(SetRef),
    /// Instance of a runtime class
    Object(ObjectRef),
    /// Closure, tear-off or method
    Function(FunctionRef),
    /// Reified type value
    Type(TypeId),
    /// Future-like handle
    Future(FutureRef),
    /// Single-subscription stream
    Stream(StreamRef),
    /// Lazy `sync*` iterable
    Iterable(IterableRef),
}

impl Value {
    /// Create an integer value
    pub fn int(i: i64) -> Self {
        Value::Int(BigInt::from(i))
    }

    /// Create a double value
    pub fn double(f: f64) -> Self {
        Value::Double(f)
    }

    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract an integer
    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Extract an integer that fits in an `i64`
    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(|i| i.to_i64())
    }

    /// Extract any number as an `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(i.to_f64().unwrap_or(f64::NAN)),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Extract a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value is an int or a double
    pub fn is_num(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Double(_))
    }

    /// Short name of the value's representation (used in diagnostics)
    pub fn variant_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Set(_) => "Set",
            Value::Object(_) => "Object",
            Value::Function(_) => "Function",
            Value::Type(_) => "Type",
            Value::Future(_) => "Future",
            Value::Stream(_) => "Stream",
            Value::Iterable(_) => "Iterable",
        }
    }

    /// `identical(a, b)`: value identity for primitives, reference identity
    /// for everything heap allocated
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => match (self.ref_address(), other.ref_address()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Address of the shared allocation behind a reference value
    pub(crate) fn ref_address(&self) -> Option<usize> {
        let addr = match self {
            Value::List(l) => Arc::as_ptr(l) as *const () as usize,
            Value::Map(m) => Arc::as_ptr(m) as *const () as usize,
            Value::Set(s) => Arc::as_ptr(s) as *const () as usize,
            Value::Object(o) => Arc::as_ptr(o) as *const () as usize,
            Value::Function(f) => Arc::as_ptr(f) as *const () as usize,
            Value::Future(f) => Arc::as_ptr(f) as *const () as usize,
            Value::Stream(s) => Arc::as_ptr(s) as *const () as usize,
            Value::Iterable(i) => Arc::as_ptr(i) as *const () as usize,
            _ => return None,
        };
        Some(addr)
    }

    /// Hash key with primitive-value / reference-identity semantics
    ///
    /// Integral doubles share the key of the equal int so `1` and `1.0`
    /// address the same map entry.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(i.clone()),
            Value::Double(d) => {
                if d.is_finite() && d.fract() == 0.0 {
                    if let Some(i) = BigInt::from_f64(*d) {
                        return ValueKey::Int(i);
                    }
                }
                ValueKey::Double(d.to_bits())
            }
            Value::Str(s) => ValueKey::Str(s.clone()),
            Value::Type(t) => ValueKey::Type(*t),
            other => ValueKey::Ref(other.ref_address().unwrap_or_default()),
        }
    }
}

/// Hashable identity of a value, used by maps and sets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    /// null
    Null,
    /// bool
    Bool(bool),
    /// int (and integral doubles)
    Int(BigInt),
    /// non-integral double bits
    Double(u64),
    /// string contents
    Str(Arc<str>),
    /// reified type
    Type(TypeId),
    /// reference identity
    Ref(usize),
}

/// Render a double the way compiled code prints it (`1.0`, `NaN`, `Infinity`)
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if d.fract() == 0.0 && d.abs() < 1e21 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::int(i)
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl PartialEq for Value {
    /// Structural equality on primitives, identity on references
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Int(a), Value::Double(b)) | (Value::Double(b), Value::Int(a)) => {
                a.to_f64().map_or(false, |a| a == *b)
            }
            _ => self.identical(other),
        }
    }
}

impl fmt::Display for Value {
    /// Plain rendering that never dispatches into user code
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", format_double(*d)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, item) in l.snapshot().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.entries().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Set(s) => {
                write!(f, "{{")?;
                for (i, item) in s.snapshot().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Value::Object(o) => write!(f, "Instance of '{}'", o.class().name()),
            Value::Function(func) => write!(f, "Closure: {}", func.name()),
            Value::Type(t) => write!(f, "Type({})", t.as_u32()),
            Value::Future(_) => write!(f, "Instance of 'Future'"),
            Value::Stream(_) => write!(f, "Instance of 'Stream'"),
            Value::Iterable(_) => write!(f, "Instance of 'Iterable'"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Double(d) => write!(f, "Double({})", d),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::List(l) => write!(f, "List(len={})", l.len()),
            Value::Map(m) => write!(f, "Map(len={})", m.len()),
            Value::Set(s) => write!(f, "Set(len={})", s.len()),
            Value::Object(o) => write!(f, "Object({})", o.class().name()),
            Value::Function(func) => write!(f, "Function({})", func.name()),
            Value::Type(t) => write!(f, "Type({})", t.as_u32()),
            Value::Future(_) => write!(f, "Future"),
            Value::Stream(_) => write!(f, "Stream"),
            Value::Iterable(_) => write!(f, "Iterable"),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}
