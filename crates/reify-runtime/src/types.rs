//! Runtime type queries: `is`, `as`, implicit checks and reified function types

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::function::FunctionObject;
use crate::value::Value;
use once_cell::sync::OnceCell;
use reify_types::{FunctionType, TypeId};

impl Runtime {
    /// Reified runtime type of a value
    pub fn runtime_type(&self, value: &Value) -> TypeId {
        match value {
            Value::Null => TypeId::NULL,
            Value::Bool(_) => TypeId::BOOL,
            Value::Int(_) => TypeId::INT,
            Value::Double(_) => TypeId::DOUBLE,
            Value::Str(_) => TypeId::STRING,
            Value::List(list) => list.ty(),
            Value::Map(map) => map.ty(),
            Value::Set(set) => set.ty(),
            Value::Object(instance) => instance.class().type_id(),
            Value::Function(func) => self.function_runtime_type(func),
            Value::Type(_) => TypeId::TYPE,
            Value::Future(future) => future.ty(),
            Value::Stream(stream) => stream.ty(),
            Value::Iterable(iterable) => iterable.ty(),
        }
    }

    /// A function's type is its attached signature when there is one
    fn function_runtime_type(&self, func: &FunctionObject) -> TypeId {
        match self.signature_of(func) {
            Some(entry) => self.function_type(entry.function_type()),
            None => func.ty(),
        }
    }

    /// Human-readable type name
    pub fn type_name(&self, ty: TypeId) -> String {
        self.with_types(|types| types.display(ty))
    }

    /// Type name of a value's runtime type (`null` for null)
    pub fn value_type_name(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            other => self.type_name(self.runtime_type(other)),
        }
    }

    /// `sub <: sup`
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        self.with_types(|types| types.is_subtype(sub, sup))
    }

    /// `value is ty`; never fails
    pub fn is_(&self, value: &Value, ty: TypeId) -> bool {
        if ty == TypeId::DYNAMIC || ty == TypeId::OBJECT || ty == TypeId::VOID {
            return true;
        }
        let actual = self.runtime_type(value);
        self.is_subtype(actual, ty)
    }

    /// `value as ty`: explicit cast, always enforced
    pub fn as_(&self, value: Value, ty: TypeId) -> RtResult<Value> {
        if value.is_null() || self.is_(&value, ty) {
            return Ok(value);
        }
        Err(RuntimeError::Cast {
            actual: self.value_type_name(&value),
            expected: self.type_name(ty),
        })
    }

    /// Implicit check; enforced only in checked mode
    pub fn check(&self, value: Value, ty: TypeId) -> RtResult<Value> {
        if !self.checked_mode() || value.is_null() || self.is_(&value, ty) {
            return Ok(value);
        }
        Err(RuntimeError::Type {
            actual: self.value_type_name(&value),
            expected: self.type_name(ty),
        })
    }

    /// Intern a structural function type
    pub fn function_type(&self, ty: FunctionType) -> TypeId {
        self.with_types_mut(|types| types.function_type(ty))
    }

    /// `(required...) -> returns` (`dart.definiteFunctionType`)
    pub fn definite_function_type(&self, returns: TypeId, required: Vec<TypeId>) -> TypeId {
        self.function_type(FunctionType::new(returns, required))
    }

    /// Register a named alias for a function type (`dart.typedef`)
    pub fn typedef(&self, library: &str, name: &str, target: TypeId) -> RtResult<TypeId> {
        Ok(self.with_types_mut(|types| types.register_typedef(library, name, target))?)
    }

    /// Resolve a typedef by name
    pub fn resolve_typedef(&self, library: &str, name: &str) -> RtResult<TypeId> {
        Ok(self.with_types(|types| types.resolve_typedef(library, name))?)
    }
}

/// Function type built once on first use (`dart.constFn`)
///
/// A cell belongs to one runtime; sharing it between runtimes hands out a
/// type id that only the first runtime knows.
#[derive(Debug, Default)]
pub struct ConstFn {
    cell: OnceCell<TypeId>,
}

impl ConstFn {
    /// An empty cell
    pub const fn new() -> Self {
        Self { cell: OnceCell::new() }
    }

    /// The cached type, building it on first call
    pub fn get(&self, rt: &Runtime, build: impl FnOnce(&Runtime) -> TypeId) -> TypeId {
        *self.cell.get_or_init(|| build(rt))
    }
}
