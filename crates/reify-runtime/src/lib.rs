//! Reify Dynamic Runtime
//!
//! This crate provides the support library that compiled output calls into:
//! - Dynamic dispatch (`dload`, `dput`, `dsend`, `dcall`, `dindex`, `dsetindex`)
//! - Reified generics with an instantiation cache
//! - `is` / `as` / checked-mode type tests over the `reify-types` registry
//! - Extension members for native numbers, strings and collections
//! - Runtime signatures with call-time parameter defaults
//! - Mixin application
//! - `async`, `async*` and `sync*` desugaring over a microtask loop
//!
//! Everything hangs off an explicit [`Runtime`] value.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod async_support;
pub mod class;
pub mod collections;
pub mod context;
pub mod dynamic;
pub mod error;
pub mod extension;
pub mod function;
pub mod generic;
pub mod mixin;
pub mod options;
pub mod signature;
pub mod types;
pub mod value;

pub use async_support::{
    AsyncState, AsyncTask, Completer, Coroutine, FutureRef, FutureState, Resume, Step, StreamHandlers, StreamRef,
    Subscription,
};
pub use class::{ClassBuilder, ClassDef, ClassRef, Instance, ObjectRef};
pub use collections::{Growability, ListRef, MapRef, SetRef};
pub use context::{CoreGenerics, Runtime};
pub use error::{RtResult, RuntimeError};
pub use extension::{Access, NativeKind};
pub use function::{Args, FunctionObject, FunctionRef, Invocation};
pub use generic::{GenericDef, GenericRef};
pub use options::{OptionsError, RuntimeOptions};
pub use signature::{SignatureBuilder, SignatureEntry};
pub use types::ConstFn;
pub use value::Value;

pub use reify_types::{FunctionType, NamedParam, TypeId};
