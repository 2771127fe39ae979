//! Core type definitions for the Reify type registry

use std::fmt;

/// Unique identifier for an interned type in the type context
///
/// Two structurally equal types always intern to the same `TypeId`, so
/// comparing ids is comparing type identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// The `dynamic` type (top type, unchecked)
    pub const DYNAMIC: TypeId = TypeId(0);
    /// The `void` type
    pub const VOID: TypeId = TypeId(1);
    /// The bottom type (subtype of everything)
    pub const BOTTOM: TypeId = TypeId(2);
    /// `Object`
    pub const OBJECT: TypeId = TypeId(3);
    /// `Null`
    pub const NULL: TypeId = TypeId(4);
    /// `num`
    pub const NUM: TypeId = TypeId(5);
    /// `int`
    pub const INT: TypeId = TypeId(6);
    /// `double`
    pub const DOUBLE: TypeId = TypeId(7);
    /// `bool`
    pub const BOOL: TypeId = TypeId(8);
    /// `String`
    pub const STRING: TypeId = TypeId(9);
    /// `Function` (supertype of every function type)
    pub const FUNCTION: TypeId = TypeId(10);
    /// `Type` (the type of reified type values)
    pub const TYPE: TypeId = TypeId(11);

    /// Get the raw index of this type
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether this is one of the top types (`dynamic`, `Object`, `void`)
    pub fn is_top(self) -> bool {
        matches!(self, TypeId::DYNAMIC | TypeId::OBJECT | TypeId::VOID)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Library that owns the built-in core classes
pub const CORE_LIBRARY: &str = "dart:core";

/// Library that owns the built-in asynchronous classes
pub const ASYNC_LIBRARY: &str = "dart:async";

/// Nominal class type, optionally instantiated with type arguments
///
/// The interning key is `(library, name, type_args)`: supertypes and
/// interfaces live in the context's hierarchy table so that looking a class
/// up never requires knowing its hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassType {
    /// Library scope the class was declared in
    pub library: String,
    /// Class name, unique within its library
    pub name: String,
    /// Type arguments for generic instances (empty for non-generic classes)
    pub type_args: Vec<TypeId>,
}

impl ClassType {
    /// Create a non-generic class type
    pub fn new(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
            type_args: Vec::new(),
        }
    }

    /// Create a generic instance of a class
    pub fn generic(library: impl Into<String>, name: impl Into<String>, type_args: Vec<TypeId>) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
            type_args,
        }
    }

    /// Whether two class types are instances of the same declaration
    pub fn same_declaration(&self, other: &ClassType) -> bool {
        self.library == other.library
            && self.name == other.name
            && self.type_args.len() == other.type_args.len()
    }
}

/// Named parameter in a function type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedParam {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeId,
}

/// Structural function type: `(required, [optional]) -> returns` or
/// `(required, {named}) -> returns`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    /// Required positional parameter types
    pub required: Vec<TypeId>,
    /// Optional positional parameter types
    pub optional: Vec<TypeId>,
    /// Named parameters, kept sorted by name
    pub named: Vec<NamedParam>,
    /// Return type
    pub returns: TypeId,
}

impl FunctionType {
    /// Function type with only required positional parameters
    pub fn new(returns: TypeId, required: Vec<TypeId>) -> Self {
        Self {
            required,
            optional: Vec::new(),
            named: Vec::new(),
            returns,
        }
    }

    /// Add optional positional parameters
    pub fn with_optional(mut self, optional: Vec<TypeId>) -> Self {
        self.optional = optional;
        self
    }

    /// Add named parameters
    pub fn with_named(mut self, named: Vec<NamedParam>) -> Self {
        self.named = named;
        self.named.sort();
        self
    }

    /// Number of positional parameters accepted (required + optional)
    pub fn positional_len(&self) -> usize {
        self.required.len() + self.optional.len()
    }

    /// Type of the positional parameter at `index`, if accepted
    pub fn positional(&self, index: usize) -> Option<TypeId> {
        if index < self.required.len() {
            Some(self.required[index])
        } else {
            self.optional.get(index - self.required.len()).copied()
        }
    }

    /// Look up a named parameter
    pub fn named_param(&self, name: &str) -> Option<TypeId> {
        self.named
            .binary_search_by(|p| p.name.as_str().cmp(name))
            .ok()
            .map(|i| self.named[i].ty)
    }
}

/// Broad classification of a type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// `dynamic`, `void` and bottom
    Special,
    /// A nominal class without type arguments
    Class,
    /// A structural function type
    Function,
    /// An instantiation of a generic class
    GenericInstance,
}

/// The core type representation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// `dynamic`
    Dynamic,
    /// `void`
    Void,
    /// Bottom type
    Bottom,
    /// Nominal class or generic class instance
    Class(ClassType),
    /// Structural function type
    Function(FunctionType),
}

impl Type {
    /// Classify this type
    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Dynamic | Type::Void | Type::Bottom => TypeKind::Special,
            Type::Class(c) if c.type_args.is_empty() => TypeKind::Class,
            Type::Class(_) => TypeKind::GenericInstance,
            Type::Function(_) => TypeKind::Function,
        }
    }

    /// Get the class type if this is a class
    pub fn as_class(&self) -> Option<&ClassType> {
        match self {
            Type::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Get the function type if this is a function
    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Check if this type is a function type
    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function(_))
    }
}
