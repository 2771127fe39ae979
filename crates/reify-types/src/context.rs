//! Type context for managing types and type interning

use crate::error::RegistryError;
use crate::subtyping::SubtypingContext;
use crate::ty::{ClassType, FunctionType, Type, TypeId, CORE_LIBRARY};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Supertype and interfaces of a registered class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassHierarchy {
    /// Direct supertype (None only for `Object`)
    pub supertype: Option<TypeId>,
    /// Directly implemented interfaces
    pub interfaces: Vec<TypeId>,
}

/// Everything needed to register a nominal class
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// The class identity (library, name, type arguments)
    pub class: ClassType,
    /// Direct supertype; defaults to `Object`
    pub supertype: Option<TypeId>,
    /// Implemented interfaces (and applied mixins)
    pub interfaces: Vec<TypeId>,
}

impl ClassDescriptor {
    /// Describe a non-generic class extending `Object`
    pub fn new(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class: ClassType::new(library, name),
            supertype: None,
            interfaces: Vec::new(),
        }
    }

    /// Describe a generic instance
    pub fn generic(library: impl Into<String>, name: impl Into<String>, type_args: Vec<TypeId>) -> Self {
        Self {
            class: ClassType::generic(library, name, type_args),
            supertype: None,
            interfaces: Vec::new(),
        }
    }

    /// Set the supertype
    pub fn extends(mut self, supertype: TypeId) -> Self {
        self.supertype = Some(supertype);
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: TypeId) -> Self {
        self.interfaces.push(interface);
        self
    }
}

/// Type context that manages all types in a program
///
/// This uses type interning to ensure that identical types have the same TypeId,
/// which enables efficient equality checking and gives generic instances with
/// equal type arguments a single identity.
#[derive(Debug, Clone)]
pub struct TypeContext {
    /// Storage for all types, indexed by TypeId
    types: Vec<Arc<Type>>,

    /// Reverse mapping from Type to TypeId for interning
    type_to_id: FxHashMap<Type, TypeId>,

    /// Registered classes and their hierarchy
    hierarchy: FxHashMap<TypeId, ClassHierarchy>,

    /// Typedefs: (library, name) -> aliased type
    typedefs: FxHashMap<(String, String), TypeId>,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    /// Create a new type context with the core types pre-registered
    pub fn new() -> Self {
        let mut ctx = TypeContext {
            types: Vec::new(),
            type_to_id: FxHashMap::default(),
            hierarchy: FxHashMap::default(),
            typedefs: FxHashMap::default(),
        };

        // Order must match the TypeId constants
        ctx.intern(Type::Dynamic);
        ctx.intern(Type::Void);
        ctx.intern(Type::Bottom);
        let object = ctx.intern(Type::Class(ClassType::new(CORE_LIBRARY, "Object")));
        ctx.hierarchy.insert(object, ClassHierarchy::default());

        let core = [
            ("Null", TypeId::OBJECT),
            ("num", TypeId::OBJECT),
            ("int", TypeId::NUM),
            ("double", TypeId::NUM),
            ("bool", TypeId::OBJECT),
            ("String", TypeId::OBJECT),
            ("Function", TypeId::OBJECT),
            ("Type", TypeId::OBJECT),
        ];
        for (name, supertype) in core {
            let id = ctx.intern(Type::Class(ClassType::new(CORE_LIBRARY, name)));
            ctx.hierarchy.insert(
                id,
                ClassHierarchy {
                    supertype: Some(supertype),
                    interfaces: Vec::new(),
                },
            );
        }
        debug_assert_eq!(ctx.lookup_class(CORE_LIBRARY, "Type", &[]), Some(TypeId::TYPE));

        ctx
    }

    /// Intern a type, returning its TypeId
    ///
    /// If the type already exists, returns the existing TypeId.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.type_to_id.get(&ty) {
            return id;
        }

        let id = TypeId(self.types.len() as u32);
        self.types.push(Arc::new(ty.clone()));
        self.type_to_id.insert(ty, id);
        id
    }

    /// Intern a structural function type
    pub fn function_type(&mut self, mut ty: FunctionType) -> TypeId {
        ty.named.sort();
        self.intern(Type::Function(ty))
    }

    /// Get a type by its TypeId
    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.0 as usize).map(|arc| arc.as_ref())
    }

    /// Look up a type's ID without interning
    pub fn lookup(&self, ty: &Type) -> Option<TypeId> {
        self.type_to_id.get(ty).copied()
    }

    /// Number of interned types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the context holds no types (never true after `new`)
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Register a nominal class
    ///
    /// Fails with `DuplicateType` when the same (library, name, type
    /// arguments) was registered before, and with `UndefinedType` when the
    /// supertype or an interface is not a registered class.
    pub fn register_class(&mut self, descriptor: ClassDescriptor) -> Result<TypeId, RegistryError> {
        let ClassDescriptor {
            class,
            supertype,
            interfaces,
        } = descriptor;

        let supertype = supertype.unwrap_or(TypeId::OBJECT);
        for &parent in std::iter::once(&supertype).chain(interfaces.iter()) {
            if !self.hierarchy.contains_key(&parent) {
                return Err(RegistryError::UndefinedType {
                    name: self.display(parent),
                });
            }
        }

        let (library, name) = (class.library.clone(), class.name.clone());
        let id = self.intern(Type::Class(class));
        if self.hierarchy.contains_key(&id) {
            return Err(RegistryError::DuplicateType { library, name });
        }

        self.hierarchy.insert(
            id,
            ClassHierarchy {
                supertype: Some(supertype),
                interfaces,
            },
        );
        tracing::debug!(library = %library, class = %name, id = id.0, "registered class");
        Ok(id)
    }

    /// Look up a registered class by identity
    pub fn lookup_class(&self, library: &str, name: &str, type_args: &[TypeId]) -> Option<TypeId> {
        let ty = Type::Class(ClassType::generic(library, name, type_args.to_vec()));
        self.lookup(&ty).filter(|id| self.hierarchy.contains_key(id))
    }

    /// Whether `id` is a registered class
    pub fn is_registered_class(&self, id: TypeId) -> bool {
        self.hierarchy.contains_key(&id)
    }

    /// Hierarchy of a registered class
    pub fn hierarchy(&self, id: TypeId) -> Option<&ClassHierarchy> {
        self.hierarchy.get(&id)
    }

    /// Direct supertype of a registered class
    pub fn supertype(&self, id: TypeId) -> Option<TypeId> {
        self.hierarchy.get(&id).and_then(|h| h.supertype)
    }

    /// Register a named alias for a type
    pub fn register_typedef(
        &mut self,
        library: impl Into<String>,
        name: impl Into<String>,
        target: TypeId,
    ) -> Result<TypeId, RegistryError> {
        let key = (library.into(), name.into());
        if self.typedefs.contains_key(&key) || self.lookup_class(&key.0, &key.1, &[]).is_some() {
            return Err(RegistryError::DuplicateType {
                library: key.0,
                name: key.1,
            });
        }
        tracing::debug!(library = %key.0, typedef = %key.1, "registered typedef");
        self.typedefs.insert(key, target);
        Ok(target)
    }

    /// Resolve a typedef, returning an error if not found
    pub fn resolve_typedef(&self, library: &str, name: &str) -> Result<TypeId, RegistryError> {
        self.typedefs
            .get(&(library.to_string(), name.to_string()))
            .copied()
            .ok_or_else(|| RegistryError::UndefinedType {
                name: format!("{}::{}", library, name),
            })
    }

    /// Check `sub <: sup`
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        SubtypingContext::new(self).is_subtype(sub, sup)
    }

    /// Human-readable rendering of a type, e.g. `List<int>` or `(int, [String]) => bool`
    pub fn display(&self, id: TypeId) -> String {
        let Some(ty) = self.get(id) else {
            return format!("<unknown {}>", id);
        };
        match ty {
            Type::Dynamic => "dynamic".to_string(),
            Type::Void => "void".to_string(),
            Type::Bottom => "bottom".to_string(),
            Type::Class(c) => {
                if c.type_args.is_empty() {
                    c.name.clone()
                } else {
                    let args: Vec<String> = c.type_args.iter().map(|&a| self.display(a)).collect();
                    format!("{}<{}>", c.name, args.join(", "))
                }
            }
            Type::Function(f) => {
                let mut params: Vec<String> = f.required.iter().map(|&p| self.display(p)).collect();
                if !f.optional.is_empty() {
                    let optional: Vec<String> = f.optional.iter().map(|&p| self.display(p)).collect();
                    params.push(format!("[{}]", optional.join(", ")));
                }
                if !f.named.is_empty() {
                    let named: Vec<String> = f
                        .named
                        .iter()
                        .map(|p| format!("{}: {}", p.name, self.display(p.ty)))
                        .collect();
                    params.push(format!("{{{}}}", named.join(", ")));
                }
                format!("({}) => {}", params.join(", "), self.display(f.returns))
            }
        }
    }
}
