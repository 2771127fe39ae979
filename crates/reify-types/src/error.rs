//! Type registry errors

use thiserror::Error;

/// Errors raised while registering or instantiating types
///
/// These happen at load time, when compiled modules declare their classes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    /// A class or typedef with the same name already exists in the library
    #[error("Duplicate type: {name} is already defined in {library}")]
    DuplicateType {
        /// Library scope
        library: String,
        /// Type name
        name: String,
    },

    /// Reference to a type the registry does not know
    #[error("Undefined type: {name}")]
    UndefinedType {
        /// Type name (or id) that was not found
        name: String,
    },

    /// Generic instantiated with the wrong number of type arguments
    #[error("Invalid type argument count for {name}: expected {expected}, got {actual}")]
    InvalidTypeArgCount {
        /// Generic name
        name: String,
        /// Expected count
        expected: usize,
        /// Actual count
        actual: usize,
    },

    /// A generic constructor re-entered its own instantiation
    #[error("Circular type reference detected: {cycle}")]
    CircularReference {
        /// Description of the cycle
        cycle: String,
    },
}
