//! The runtime context
//!
//! A [`Runtime`] owns every registry the call-site helpers consult: the
//! type registry, the signature registry, the extension dispatch table, the
//! core generic definitions, the mixin application cache and the microtask
//! queue. It is created explicitly and passed by reference; nothing in the
//! crate is global.

use crate::async_support::EventLoop;
use crate::class::ClassRef;
use crate::error::RtResult;
use crate::extension::ExtensionTable;
use crate::generic::{GenericDef, GenericRef};
use crate::options::RuntimeOptions;
use crate::signature::SignatureRegistry;
use parking_lot::{Mutex, RwLock};
use reify_types::{ClassDescriptor, TypeContext, TypeId, ASYNC_LIBRARY, CORE_LIBRARY};
use rustc_hash::FxHashMap;
use std::fmt;

/// Generic definitions of the core collection and async classes
pub struct CoreGenerics {
    /// `Iterable<E>`
    pub iterable: GenericRef<TypeId>,
    /// `List<E>` (implements `Iterable<E>`)
    pub list: GenericRef<TypeId>,
    /// `Set<E>` (implements `Iterable<E>`)
    pub set: GenericRef<TypeId>,
    /// `Map<K, V>`
    pub map: GenericRef<TypeId>,
    /// `Future<T>`
    pub future: GenericRef<TypeId>,
    /// `Stream<T>`
    pub stream: GenericRef<TypeId>,
}

impl CoreGenerics {
    fn new() -> Self {
        let iterable = GenericDef::new("Iterable", 1, |rt: &Runtime, args: &[TypeId]| {
            rt.register_class(ClassDescriptor::generic(CORE_LIBRARY, "Iterable", args.to_vec()))
        });
        let list = GenericDef::new("List", 1, |rt: &Runtime, args: &[TypeId]| {
            let iterable = rt.instantiate(&rt.core().iterable, args)?;
            rt.register_class(ClassDescriptor::generic(CORE_LIBRARY, "List", args.to_vec()).implements(iterable))
        });
        let set = GenericDef::new("Set", 1, |rt: &Runtime, args: &[TypeId]| {
            let iterable = rt.instantiate(&rt.core().iterable, args)?;
            rt.register_class(ClassDescriptor::generic(CORE_LIBRARY, "Set", args.to_vec()).implements(iterable))
        });
        let map = GenericDef::new("Map", 2, |rt: &Runtime, args: &[TypeId]| {
            rt.register_class(ClassDescriptor::generic(CORE_LIBRARY, "Map", args.to_vec()))
        });
        let future = GenericDef::new("Future", 1, |rt: &Runtime, args: &[TypeId]| {
            rt.register_class(ClassDescriptor::generic(ASYNC_LIBRARY, "Future", args.to_vec()))
        });
        let stream = GenericDef::new("Stream", 1, |rt: &Runtime, args: &[TypeId]| {
            rt.register_class(ClassDescriptor::generic(ASYNC_LIBRARY, "Stream", args.to_vec()))
        });

        CoreGenerics {
            iterable,
            list,
            set,
            map,
            future,
            stream,
        }
    }
}

/// Runtime state shared by every call-site helper
pub struct Runtime {
    options: RuntimeOptions,
    types: RwLock<TypeContext>,
    pub(crate) signatures: RwLock<SignatureRegistry>,
    pub(crate) extensions: RwLock<ExtensionTable>,
    core: CoreGenerics,
    pub(crate) mixin_apps: Mutex<FxHashMap<(TypeId, TypeId), ClassRef>>,
    pub(crate) event_loop: EventLoop,
}

impl Runtime {
    /// Create a runtime with default options (checked mode on)
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    /// Create a runtime with explicit options
    pub fn with_options(options: RuntimeOptions) -> Self {
        tracing::debug!(checked_mode = options.checked_mode, "creating runtime");
        Runtime {
            options,
            types: RwLock::new(TypeContext::new()),
            signatures: RwLock::new(SignatureRegistry::new()),
            extensions: RwLock::new(ExtensionTable::with_core()),
            core: CoreGenerics::new(),
            mixin_apps: Mutex::new(FxHashMap::default()),
            event_loop: EventLoop::new(),
        }
    }

    /// Options this runtime was created with
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Whether implicit type checks are enabled
    pub fn checked_mode(&self) -> bool {
        self.options.checked_mode
    }

    /// Core generic definitions
    pub fn core(&self) -> &CoreGenerics {
        &self.core
    }

    /// Run `f` with read access to the type registry
    pub fn with_types<R>(&self, f: impl FnOnce(&TypeContext) -> R) -> R {
        f(&self.types.read())
    }

    /// Run `f` with write access to the type registry
    pub(crate) fn with_types_mut<R>(&self, f: impl FnOnce(&mut TypeContext) -> R) -> R {
        f(&mut self.types.write())
    }

    /// Register a nominal class type
    pub fn register_class(&self, descriptor: ClassDescriptor) -> RtResult<TypeId> {
        Ok(self.with_types_mut(|types| types.register_class(descriptor))?)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.options)
            .field("types", &self.types.read().len())
            .field("pending_microtasks", &self.event_loop.pending())
            .finish()
    }
}
