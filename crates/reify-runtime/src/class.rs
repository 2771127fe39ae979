//! Runtime classes and instances
//!
//! A [`ClassDef`] is the member table of one registered class: fields,
//! getters, setters and methods, plus a link to the superclass. Member
//! lookup walks that chain, so overriding is simply "first match wins".
//! Mixin applications are ordinary `ClassDef`s inserted into the chain.

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::function::{FunctionObject, FunctionRef, Invocation, NativeFn};
use crate::value::Value;
use parking_lot::RwLock;
use reify_types::{ClassDescriptor, TypeId, CORE_LIBRARY};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Getter body: `(runtime, this) -> value`
pub type GetterFn = Arc<dyn Fn(&Runtime, &Value) -> RtResult<Value> + Send + Sync>;

/// Setter body: `(runtime, this, value)`
pub type SetterFn = Arc<dyn Fn(&Runtime, &Value, Value) -> RtResult<()> + Send + Sync>;

/// Declared instance field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type, checked on every dynamic store
    pub ty: TypeId,
}

/// Member table of a runtime class
pub struct ClassDef {
    pub(crate) type_id: TypeId,
    pub(crate) library: String,
    pub(crate) name: String,
    pub(crate) superclass: Option<ClassRef>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) getters: FxHashMap<String, GetterFn>,
    pub(crate) setters: FxHashMap<String, SetterFn>,
    pub(crate) methods: FxHashMap<String, FunctionRef>,
}

/// Shared class reference
pub type ClassRef = Arc<ClassDef>;

/// Result of a read lookup
#[derive(Clone)]
pub enum GetTarget {
    /// Plain field storage
    Field(FieldDef),
    /// User getter
    Getter(GetterFn),
    /// Method, read as a bound tear-off
    Method(FunctionRef),
}

/// Result of a write lookup
#[derive(Clone)]
pub enum SetTarget {
    /// Plain field storage
    Field(FieldDef),
    /// User setter
    Setter(SetterFn),
}

impl ClassDef {
    /// Registered type of this class
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaring library
    pub fn library(&self) -> &str {
        &self.library
    }

    /// Direct superclass (None for roots)
    pub fn superclass(&self) -> Option<&ClassRef> {
        self.superclass.as_ref()
    }

    /// Fields declared directly on this class
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// This class followed by its superclass chain
    pub fn ancestors(&self) -> impl Iterator<Item = &ClassDef> {
        std::iter::successors(Some(self), |c| c.superclass.as_deref())
    }

    /// Find a readable member
    pub fn lookup_get(&self, name: &str) -> Option<GetTarget> {
        self.ancestors().find_map(|class| {
            if let Some(field) = class.fields.iter().find(|f| f.name == name) {
                return Some(GetTarget::Field(field.clone()));
            }
            if let Some(getter) = class.getters.get(name) {
                return Some(GetTarget::Getter(getter.clone()));
            }
            class.methods.get(name).map(|m| GetTarget::Method(m.clone()))
        })
    }

    /// Find a writable member
    pub fn lookup_set(&self, name: &str) -> Option<SetTarget> {
        self.ancestors().find_map(|class| {
            if let Some(field) = class.fields.iter().find(|f| f.name == name) {
                return Some(SetTarget::Field(field.clone()));
            }
            class.setters.get(name).map(|s| SetTarget::Setter(s.clone()))
        })
    }

    /// Whether any class in the chain declares `name`
    pub fn has_member(&self, name: &str) -> bool {
        self.ancestors().any(|class| {
            class.methods.contains_key(name)
                || class.getters.contains_key(name)
                || class.setters.contains_key(name)
                || class.fields.iter().any(|f| f.name == name)
        })
    }
}

/// Find a method starting at `class`, returning the class that declares it
pub fn find_method(class: &ClassRef, name: &str) -> Option<(ClassRef, FunctionRef)> {
    let mut current = Some(class);
    while let Some(c) = current {
        if let Some(method) = c.methods.get(name) {
            return Some((c.clone(), method.clone()));
        }
        current = c.superclass.as_ref();
    }
    None
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("ClassDef")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|c| c.name.clone()))
            .field("fields", &self.fields)
            .field("methods", &methods)
            .finish()
    }
}

/// An instance of a runtime class
#[derive(Debug)]
pub struct Instance {
    class: ClassRef,
    fields: RwLock<FxHashMap<String, Value>>,
}

/// Shared instance reference
pub type ObjectRef = Arc<Instance>;

impl Instance {
    /// Allocate an instance with every field in the chain set to null
    pub fn new(class: &ClassRef) -> ObjectRef {
        let fields = class
            .ancestors()
            .flat_map(|c| c.fields.iter())
            .map(|f| (f.name.clone(), Value::Null))
            .collect();
        Arc::new(Instance {
            class: class.clone(),
            fields: RwLock::new(fields),
        })
    }

    /// Class of this instance
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Read a field without dispatch
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Write a declared field without type checks
    pub fn set_field(&self, name: &str, value: Value) -> RtResult<()> {
        let mut fields = self.fields.write();
        match fields.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeError::no_such_method(format!("{}=", name), self.class.name.clone())),
        }
    }
}

/// Builder for runtime classes
///
/// ```text
/// ClassBuilder::new("app", "Point")
///     .field("x", TypeId::INT)
///     .method("norm", |rt, inv| { ... })
///     .build(&rt)?
/// ```
pub struct ClassBuilder {
    library: String,
    name: String,
    type_args: Vec<TypeId>,
    superclass: Option<ClassRef>,
    interfaces: Vec<TypeId>,
    fields: Vec<FieldDef>,
    getters: FxHashMap<String, GetterFn>,
    setters: FxHashMap<String, SetterFn>,
    methods: Vec<(String, TypeId, NativeFn)>,
}

impl ClassBuilder {
    /// Start a class declared in `library`
    pub fn new(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
            type_args: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            getters: FxHashMap::default(),
            setters: FxHashMap::default(),
            methods: Vec::new(),
        }
    }

    /// Start a class in the core library
    pub fn core(name: impl Into<String>) -> Self {
        Self::new(CORE_LIBRARY, name)
    }

    /// Instantiate with type arguments
    pub fn type_args(mut self, args: Vec<TypeId>) -> Self {
        self.type_args = args;
        self
    }

    /// Set the superclass
    pub fn extends(mut self, superclass: &ClassRef) -> Self {
        self.superclass = Some(superclass.clone());
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: TypeId) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Declare a field
    pub fn field(mut self, name: impl Into<String>, ty: TypeId) -> Self {
        self.fields.push(FieldDef { name: name.into(), ty });
        self
    }

    /// Declare a getter
    pub fn getter<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Runtime, &Value) -> RtResult<Value> + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(body));
        self
    }

    /// Declare a setter
    pub fn setter<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Runtime, &Value, Value) -> RtResult<()> + Send + Sync + 'static,
    {
        self.setters.insert(name.into(), Arc::new(body));
        self
    }

    /// Declare an untyped method
    pub fn method<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Runtime, Invocation) -> RtResult<Value> + Send + Sync + 'static,
    {
        self.typed_method(name, TypeId::FUNCTION, body)
    }

    /// Declare a method with a function type
    pub fn typed_method<F>(mut self, name: impl Into<String>, ty: TypeId, body: F) -> Self
    where
        F: Fn(&Runtime, Invocation) -> RtResult<Value> + Send + Sync + 'static,
    {
        self.methods.push((name.into(), ty, Arc::new(body)));
        self
    }

    /// Register the class type and produce its member table
    pub fn build(self, rt: &Runtime) -> RtResult<ClassRef> {
        let mut descriptor = ClassDescriptor::generic(self.library.clone(), self.name.clone(), self.type_args);
        if let Some(superclass) = &self.superclass {
            descriptor = descriptor.extends(superclass.type_id);
        }
        for interface in self.interfaces {
            descriptor = descriptor.implements(interface);
        }
        let type_id = rt.register_class(descriptor)?;

        let methods = self
            .methods
            .into_iter()
            .map(|(name, ty, body)| {
                let method = FunctionObject::method(type_id, name.clone(), ty, body);
                (name, Arc::new(method))
            })
            .collect();

        Ok(Arc::new(ClassDef {
            type_id,
            library: self.library,
            name: self.name,
            superclass: self.superclass,
            fields: self.fields,
            getters: self.getters,
            setters: self.setters,
            methods,
        }))
    }
}

impl Runtime {
    /// Allocate an instance and initialize the given fields (type-checked)
    pub fn construct(&self, class: &ClassRef, init: Vec<(&str, Value)>) -> RtResult<Value> {
        let instance = Instance::new(class);
        for (name, value) in init {
            let ty = match class.lookup_set(name) {
                Some(SetTarget::Field(field)) => field.ty,
                _ => return Err(RuntimeError::no_such_method(format!("{}=", name), class.name.clone())),
            };
            instance.set_field(name, self.check(value, ty)?)?;
        }
        Ok(Value::Object(instance))
    }
}
