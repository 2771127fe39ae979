//! Extension dispatch for native values
//!
//! Native values (numbers, strings, collections, functions, futures) have no
//! class member table. Their members live in an [`ExtensionTable`] keyed by
//! receiver kind and member name. Each value maps to a chain of kinds, most
//! specific first, and resolution picks the first entry that provides the
//! requested access:
//!
//! ```text
//! List     -> Iterable -> Object
//! int      -> num      -> Object
//! String   -> Object
//! ```
//!
//! Members shared by several kinds are installed per [`Capability`].

mod future;
mod iterable;
mod list;
mod map;
mod num;
mod object;
mod set;
mod string;

pub use self::num::parse_int_str;

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::function::Args;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Extension method: `(runtime, receiver, args) -> result`
pub type ExtMethod = Arc<dyn Fn(&Runtime, &Value, Args) -> RtResult<Value> + Send + Sync>;

/// Extension getter: `(runtime, receiver) -> value`
pub type ExtGetter = Arc<dyn Fn(&Runtime, &Value) -> RtResult<Value> + Send + Sync>;

/// Extension setter: `(runtime, receiver, value)`
pub type ExtSetter = Arc<dyn Fn(&Runtime, &Value, Value) -> RtResult<()> + Send + Sync>;

/// Receiver kind of a native value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    /// `null`
    Null,
    /// `bool`
    Bool,
    /// `int`
    Int,
    /// `double`
    Double,
    /// `num` (shared by int and double)
    Num,
    /// `String`
    String,
    /// `List`
    List,
    /// `Map`
    Map,
    /// `Set`
    Set,
    /// `Iterable` (lists, sets and lazy iterables)
    Iterable,
    /// `Function`
    Function,
    /// `Future`
    Future,
    /// `Stream`
    Stream,
    /// `Type`
    Type,
    /// `Object` (every value)
    Object,
}

impl NativeKind {
    /// Lookup chain for a value, most specific first
    pub fn chain(value: &Value) -> &'static [NativeKind] {
        use NativeKind::*;
        match value {
            Value::Null => &[Null, Object],
            Value::Bool(_) => &[Bool, Object],
            Value::Int(_) => &[Int, Num, Object],
            Value::Double(_) => &[Double, Num, Object],
            Value::Str(_) => &[String, Object],
            Value::List(_) => &[List, Iterable, Object],
            Value::Map(_) => &[Map, Object],
            Value::Set(_) => &[Set, Iterable, Object],
            Value::Iterable(_) => &[Iterable, Object],
            Value::Function(_) => &[Function, Object],
            Value::Future(_) => &[Future, Object],
            Value::Stream(_) => &[Stream, Object],
            Value::Type(_) => &[Type, Object],
            Value::Object(_) => &[Object],
        }
    }
}

/// Group of kinds sharing a set of members
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Supports `[]`
    Indexable,
    /// Can be iterated
    Iterable,
    /// Has a length
    Sizable,
    /// Can be rendered as a string
    Stringable,
}

impl Capability {
    /// Kinds that have this capability
    pub fn kinds(self) -> &'static [NativeKind] {
        use NativeKind::*;
        match self {
            Capability::Indexable => &[List, Map, String],
            Capability::Iterable => &[Iterable],
            Capability::Sizable => &[List, Map, Set, String, Iterable],
            Capability::Stringable => &[Object],
        }
    }
}

/// Kind of member access being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Property read
    Get,
    /// Property write
    Set,
    /// Method call
    Invoke,
}

/// Implementations registered for one (kind, name)
#[derive(Clone, Default)]
pub struct ExtensionEntry {
    /// Getter implementation
    pub getter: Option<ExtGetter>,
    /// Setter implementation
    pub setter: Option<ExtSetter>,
    /// Method implementation
    pub method: Option<ExtMethod>,
}

/// A resolved extension member
#[derive(Clone)]
pub enum Resolved {
    /// Read through a getter
    Getter(ExtGetter),
    /// Write through a setter
    Setter(ExtSetter),
    /// Call a method (or tear it off on `Get`)
    Method(ExtMethod),
}

/// Extension members indexed by receiver kind
#[derive(Default)]
pub struct ExtensionTable {
    entries: FxHashMap<NativeKind, FxHashMap<String, ExtensionEntry>>,
}

impl ExtensionTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with every core member installed
    pub fn with_core() -> Self {
        let mut table = Self::new();
        object::install(&mut table);
        num::install(&mut table);
        string::install(&mut table);
        iterable::install(&mut table);
        list::install(&mut table);
        map::install(&mut table);
        set::install(&mut table);
        future::install(&mut table);
        table
    }

    fn entry(&mut self, kind: NativeKind, name: &str) -> &mut ExtensionEntry {
        self.entries
            .entry(kind)
            .or_default()
            .entry(name.to_string())
            .or_default()
    }

    /// Install a method
    pub fn method<F>(&mut self, kind: NativeKind, name: &str, f: F)
    where
        F: Fn(&Runtime, &Value, Args) -> RtResult<Value> + Send + Sync + 'static,
    {
        self.entry(kind, name).method = Some(Arc::new(f));
    }

    /// Install a getter
    pub fn getter<F>(&mut self, kind: NativeKind, name: &str, f: F)
    where
        F: Fn(&Runtime, &Value) -> RtResult<Value> + Send + Sync + 'static,
    {
        self.entry(kind, name).getter = Some(Arc::new(f));
    }

    /// Install a setter
    pub fn setter<F>(&mut self, kind: NativeKind, name: &str, f: F)
    where
        F: Fn(&Runtime, &Value, Value) -> RtResult<()> + Send + Sync + 'static,
    {
        self.entry(kind, name).setter = Some(Arc::new(f));
    }

    /// Install a method on every kind with `capability`
    pub fn capability_method<F>(&mut self, capability: Capability, name: &str, f: F)
    where
        F: Fn(&Runtime, &Value, Args) -> RtResult<Value> + Send + Sync + 'static,
    {
        let f: ExtMethod = Arc::new(f);
        for &kind in capability.kinds() {
            self.entry(kind, name).method = Some(f.clone());
        }
    }

    /// Install a getter on every kind with `capability`
    pub fn capability_getter<F>(&mut self, capability: Capability, name: &str, f: F)
    where
        F: Fn(&Runtime, &Value) -> RtResult<Value> + Send + Sync + 'static,
    {
        let f: ExtGetter = Arc::new(f);
        for &kind in capability.kinds() {
            self.entry(kind, name).getter = Some(f.clone());
        }
    }

    /// Find the member `name` for `receiver`
    pub fn resolve(&self, name: &str, receiver: &Value, access: Access) -> Option<Resolved> {
        NativeKind::chain(receiver).iter().find_map(|kind| {
            let entry = self.entries.get(kind)?.get(name)?;
            match access {
                Access::Get => entry
                    .getter
                    .clone()
                    .map(Resolved::Getter)
                    .or_else(|| entry.method.clone().map(Resolved::Method)),
                Access::Set => entry.setter.clone().map(Resolved::Setter),
                Access::Invoke => entry
                    .method
                    .clone()
                    .map(Resolved::Method)
                    .or_else(|| entry.getter.clone().map(Resolved::Getter)),
            }
        })
    }

    /// Whether any kind in the receiver's chain declares `name`
    pub fn has_member(&self, name: &str, receiver: &Value) -> bool {
        NativeKind::chain(receiver)
            .iter()
            .any(|kind| self.entries.get(kind).map_or(false, |m| m.contains_key(name)))
    }
}

impl Runtime {
    /// Resolve an extension member; the table lock is released before return
    pub fn resolve_extension(&self, name: &str, receiver: &Value, access: Access) -> RtResult<Resolved> {
        let resolved = self.extensions.read().resolve(name, receiver, access);
        resolved.ok_or_else(|| {
            let member = match access {
                Access::Set => format!("{}=", name),
                _ => name.to_string(),
            };
            RuntimeError::no_such_method(member, self.value_type_name(receiver))
        })
    }

    /// Register an additional extension method
    pub fn register_extension<F>(&self, kind: NativeKind, name: &str, f: F)
    where
        F: Fn(&Runtime, &Value, Args) -> RtResult<Value> + Send + Sync + 'static,
    {
        tracing::debug!(kind = ?kind, member = name, "registered extension method");
        self.extensions.write().method(kind, name, f);
    }

    /// Register an additional extension getter
    pub fn register_extension_getter<F>(&self, kind: NativeKind, name: &str, f: F)
    where
        F: Fn(&Runtime, &Value) -> RtResult<Value> + Send + Sync + 'static,
    {
        tracing::debug!(kind = ?kind, member = name, "registered extension getter");
        self.extensions.write().getter(kind, name, f);
    }
}

/// Positional argument `index`, or null
pub(crate) fn arg(args: &Args, index: usize) -> Value {
    args.positional.get(index).cloned().unwrap_or_default()
}

/// Positional argument `index` as an `i64`
pub(crate) fn int_arg(args: &Args, index: usize, member: &str) -> RtResult<i64> {
    match args.positional.get(index) {
        Some(Value::Int(i)) => num_traits::ToPrimitive::to_i64(i)
            .ok_or_else(|| RuntimeError::Range(format!("{}: {} is out of range", member, i))),
        Some(other) => Err(RuntimeError::Argument(format!(
            "{}: expected an int, got {}",
            member,
            other.variant_name()
        ))),
        None => Err(RuntimeError::Argument(format!("{}: missing argument {}", member, index))),
    }
}

/// Optional positional argument `index` as an `i64`
pub(crate) fn opt_int_arg(args: &Args, index: usize, member: &str) -> RtResult<Option<i64>> {
    match args.positional.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => int_arg(args, index, member).map(Some),
    }
}

/// Positional argument `index` as a string
pub(crate) fn str_arg(args: &Args, index: usize, member: &str) -> RtResult<Arc<str>> {
    match args.positional.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(RuntimeError::Argument(format!(
            "{}: expected a String, got {}",
            member,
            other.variant_name()
        ))),
        None => Err(RuntimeError::Argument(format!("{}: missing argument {}", member, index))),
    }
}

/// Error for a receiver that does not match the kind a member was installed on
pub(crate) fn wrong_receiver(member: &str, receiver: &Value) -> RuntimeError {
    RuntimeError::no_such_method(member, receiver.variant_name())
}
