//! Function objects and call arguments

use crate::context::Runtime;
use crate::error::RtResult;
use crate::value::Value;
use reify_types::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Native body of a function or method
pub type NativeFn = Arc<dyn Fn(&Runtime, Invocation) -> RtResult<Value> + Send + Sync>;

/// Unique identity of a function object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u64);

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

impl FunctionId {
    fn next() -> Self {
        FunctionId(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where a function's runtime signature is registered
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignatureKey {
    /// Free function or closure
    Function(FunctionId),
    /// Method `name` declared on class `TypeId`
    Member(TypeId, String),
}

/// Arguments supplied at a dynamic call site
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Positional arguments
    pub positional: Vec<Value>,
    /// Named arguments
    pub named: BTreeMap<String, Value>,
}

impl Args {
    /// No arguments
    pub fn none() -> Self {
        Self::default()
    }

    /// Positional arguments only
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: BTreeMap::new(),
        }
    }

    /// Single positional argument
    pub fn one(value: Value) -> Self {
        Self::positional(vec![value])
    }

    /// Add a named argument
    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Args::positional(values)
    }
}

/// Arguments as seen by a function body, after binding
///
/// Optional parameters have already been filled with their defaults, so
/// `positional.len()` equals the number of declared positional parameters
/// whenever a signature is registered.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Receiver (`null` for free functions)
    pub this: Value,
    /// Positional arguments
    pub positional: Vec<Value>,
    /// Named arguments
    pub named: BTreeMap<String, Value>,
    /// Class whose member table supplied the running method
    pub holder: Option<crate::class::ClassRef>,
}

impl Invocation {
    /// Positional argument `index`, or null
    pub fn arg(&self, index: usize) -> Value {
        self.positional.get(index).cloned().unwrap_or_default()
    }

    /// Named argument `name`, or null
    pub fn named_arg(&self, name: &str) -> Value {
        self.named.get(name).cloned().unwrap_or_default()
    }

    /// Convert back to call-site arguments
    pub fn into_args(self) -> Args {
        Args {
            positional: self.positional,
            named: self.named,
        }
    }
}

/// A callable value
pub struct FunctionObject {
    id: FunctionId,
    name: String,
    ty: TypeId,
    sig_key: SignatureKey,
    bound_this: Value,
    body: NativeFn,
}

/// Shared function reference
pub type FunctionRef = Arc<FunctionObject>;

impl FunctionObject {
    /// Create a free function whose signature is keyed by its own identity
    pub fn new(name: impl Into<String>, ty: TypeId, body: NativeFn) -> Self {
        let id = FunctionId::next();
        Self {
            id,
            name: name.into(),
            ty,
            sig_key: SignatureKey::Function(id),
            bound_this: Value::Null,
            body,
        }
    }

    /// Create a method whose signature is keyed by its declaring class
    pub fn method(owner: TypeId, name: impl Into<String>, ty: TypeId, body: NativeFn) -> Self {
        let name = name.into();
        Self {
            id: FunctionId::next(),
            sig_key: SignatureKey::Member(owner, name.clone()),
            name,
            ty,
            bound_this: Value::Null,
            body,
        }
    }

    /// Tear off this function with a bound receiver
    pub fn bind(&self, this: Value) -> FunctionObject {
        Self {
            id: FunctionId::next(),
            name: self.name.clone(),
            ty: self.ty,
            sig_key: self.sig_key.clone(),
            bound_this: this,
            body: self.body.clone(),
        }
    }

    /// Identity of this function object
    pub fn id(&self) -> FunctionId {
        self.id
    }

    /// Name used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type (`Function` when untyped)
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Key of the runtime signature
    pub fn sig_key(&self) -> &SignatureKey {
        &self.sig_key
    }

    /// Receiver bound by a tear-off
    pub fn bound_this(&self) -> &Value {
        &self.bound_this
    }

    pub(crate) fn body(&self) -> &NativeFn {
        &self.body
    }
}

impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("sig_key", &self.sig_key)
            .finish()
    }
}

impl Runtime {
    /// Wrap a native closure as a function value with declared type `ty`
    pub fn fn_<F>(&self, name: &str, ty: TypeId, body: F) -> Value
    where
        F: Fn(&Runtime, Invocation) -> RtResult<Value> + Send + Sync + 'static,
    {
        Value::Function(Arc::new(FunctionObject::new(name, ty, Arc::new(body))))
    }

    /// Wrap a native closure as an untyped function value
    pub fn closure<F>(&self, name: &str, body: F) -> Value
    where
        F: Fn(&Runtime, Invocation) -> RtResult<Value> + Send + Sync + 'static,
    {
        self.fn_(name, TypeId::FUNCTION, body)
    }
}
