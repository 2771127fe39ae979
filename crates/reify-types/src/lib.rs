//! Reify Type Registry
//!
//! Interned type descriptors, the nominal class hierarchy, structural
//! function types and the subtyping relation used by the Reify runtime to
//! answer `is` / `as` queries.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod subtyping;
pub mod ty;

pub use context::{ClassDescriptor, ClassHierarchy, TypeContext};
pub use error::RegistryError;
pub use subtyping::SubtypingContext;
pub use ty::{ClassType, FunctionType, NamedParam, Type, TypeId, TypeKind, ASYNC_LIBRARY, CORE_LIBRARY};
