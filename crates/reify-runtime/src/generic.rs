//! Generic instantiation cache
//!
//! A [`GenericDef`] wraps a constructor from a type-argument tuple to a
//! reified result (a runtime class, a type id, ...). Instantiating the same
//! definition with equal arguments always yields the cached result, so
//! `Box<int>` built twice is the same class object with the same type id.
//!
//! The empty tuple stands for the raw type and is normalised to
//! `[dynamic; arity]` before lookup.

use crate::context::Runtime;
use crate::error::RtResult;
use parking_lot::{Mutex, ReentrantMutex};
use reify_types::{RegistryError, TypeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;

/// Constructor run on a cache miss
pub type GenericCtor<T> = Box<dyn Fn(&Runtime, &[TypeId]) -> RtResult<T> + Send + Sync>;

/// A generic definition and its instantiation cache
pub struct GenericDef<T> {
    name: String,
    arity: usize,
    ctor: GenericCtor<T>,
    cache: Mutex<FxHashMap<Vec<TypeId>, T>>,
    in_flight: Mutex<FxHashSet<Vec<TypeId>>>,
    /// Serialises instantiation; re-entrant so constructors may instantiate
    /// the same definition with other arguments
    gate: ReentrantMutex<()>,
}

/// Shared generic definition
pub type GenericRef<T> = Arc<GenericDef<T>>;

impl<T: Clone> GenericDef<T> {
    /// Define a generic with `arity` type parameters
    pub fn new<F>(name: impl Into<String>, arity: usize, ctor: F) -> GenericRef<T>
    where
        F: Fn(&Runtime, &[TypeId]) -> RtResult<T> + Send + Sync + 'static,
    {
        Arc::new(GenericDef {
            name: name.into(),
            arity,
            ctor: Box::new(ctor),
            cache: Mutex::new(FxHashMap::default()),
            in_flight: Mutex::new(FxHashSet::default()),
            gate: ReentrantMutex::new(()),
        })
    }

    /// Generic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of type parameters
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of cached instantiations
    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Argument tuples instantiated so far
    pub fn specializations(&self) -> Vec<Vec<TypeId>> {
        let mut keys: Vec<Vec<TypeId>> = self.cache.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn normalize(&self, args: &[TypeId]) -> Result<Vec<TypeId>, RegistryError> {
        if args.is_empty() {
            return Ok(vec![TypeId::DYNAMIC; self.arity]);
        }
        if args.len() != self.arity {
            return Err(RegistryError::InvalidTypeArgCount {
                name: self.name.clone(),
                expected: self.arity,
                actual: args.len(),
            });
        }
        Ok(args.to_vec())
    }
}

impl<T> fmt::Debug for GenericDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericDef")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl Runtime {
    /// Define a generic (`dart.generic`)
    pub fn generic<T, F>(&self, name: &str, arity: usize, ctor: F) -> GenericRef<T>
    where
        T: Clone,
        F: Fn(&Runtime, &[TypeId]) -> RtResult<T> + Send + Sync + 'static,
    {
        GenericDef::new(name, arity, ctor)
    }

    /// Instantiate a generic with concrete type arguments
    ///
    /// The constructor runs at most once per normalised argument tuple.
    pub fn instantiate<T: Clone>(&self, def: &GenericDef<T>, args: &[TypeId]) -> RtResult<T> {
        let key = def.normalize(args)?;
        let _gate = def.gate.lock();

        if let Some(hit) = def.cache.lock().get(&key) {
            return Ok(hit.clone());
        }

        if !def.in_flight.lock().insert(key.clone()) {
            let names: Vec<String> = key.iter().map(|&a| self.type_name(a)).collect();
            return Err(RegistryError::CircularReference {
                cycle: format!("{}<{}>", def.name, names.join(", ")),
            }
            .into());
        }

        tracing::trace!(generic = %def.name, args = ?key, "instantiating generic");
        let result = (def.ctor)(self, &key);
        def.in_flight.lock().remove(&key);

        let value = result?;
        def.cache.lock().insert(key, value.clone());
        Ok(value)
    }
}
