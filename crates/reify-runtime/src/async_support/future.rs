//! Futures and completers
//!
//! A [`FutureObject`] settles exactly once. Listeners registered with
//! [`FutureObject::on_settle`] always run as microtasks, even when the
//! future is already settled, so `then` callbacks never run synchronously
//! with the code that registered them.

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::function::Args;
use crate::value::Value;
use parking_lot::Mutex;
use reify_types::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Listener invoked with the settled outcome
pub type SettleCallback = Box<dyn FnOnce(&Runtime, RtResult<Value>) + Send>;

/// Observable state of a future
#[derive(Debug, Clone)]
pub enum FutureState {
    /// Not settled yet
    Pending,
    /// Completed with a value
    Fulfilled(Value),
    /// Completed with an error
    Rejected(RuntimeError),
}

impl FutureState {
    fn outcome(&self) -> Option<RtResult<Value>> {
        match self {
            FutureState::Pending => None,
            FutureState::Fulfilled(v) => Some(Ok(v.clone())),
            FutureState::Rejected(e) => Some(Err(e.clone())),
        }
    }
}

impl From<RtResult<Value>> for FutureState {
    fn from(outcome: RtResult<Value>) -> Self {
        match outcome {
            Ok(v) => FutureState::Fulfilled(v),
            Err(e) => FutureState::Rejected(e),
        }
    }
}

struct FutureInner {
    state: FutureState,
    callbacks: Vec<SettleCallback>,
}

/// A value that becomes available later
pub struct FutureObject {
    ty: TypeId,
    value_ty: TypeId,
    inner: Mutex<FutureInner>,
}

/// Shared future reference
pub type FutureRef = Arc<FutureObject>;

impl FutureObject {
    pub(crate) fn pending(ty: TypeId, value_ty: TypeId) -> FutureRef {
        Self::with_state(ty, value_ty, FutureState::Pending)
    }

    fn with_state(ty: TypeId, value_ty: TypeId, state: FutureState) -> FutureRef {
        Arc::new(FutureObject {
            ty,
            value_ty,
            inner: Mutex::new(FutureInner {
                state,
                callbacks: Vec::new(),
            }),
        })
    }

    /// Reified `Future<T>` type
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// The `T` of `Future<T>`
    pub fn value_ty(&self) -> TypeId {
        self.value_ty
    }

    /// Current state
    pub fn state(&self) -> FutureState {
        self.inner.lock().state.clone()
    }

    /// Whether the future has settled
    pub fn is_settled(&self) -> bool {
        !matches!(self.inner.lock().state, FutureState::Pending)
    }

    /// Settled outcome, if any
    pub fn outcome(&self) -> Option<RtResult<Value>> {
        self.inner.lock().state.outcome()
    }

    /// Settle and schedule every listener
    pub(crate) fn settle(&self, rt: &Runtime, outcome: RtResult<Value>) -> RtResult<()> {
        let callbacks = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, FutureState::Pending) {
                return Err(RuntimeError::State("Future already completed".to_string()));
            }
            inner.state = FutureState::from(outcome.clone());
            std::mem::take(&mut inner.callbacks)
        };
        if let Err(error) = &outcome {
            if callbacks.is_empty() {
                tracing::debug!(%error, "future rejected with no listeners");
            }
        }
        for callback in callbacks {
            let outcome = outcome.clone();
            rt.schedule_microtask(move |rt| callback(rt, outcome));
        }
        Ok(())
    }

    /// Run `f` in a microtask once the future settles
    pub fn on_settle<F>(&self, rt: &Runtime, f: F)
    where
        F: FnOnce(&Runtime, RtResult<Value>) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        match inner.state.outcome() {
            None => inner.callbacks.push(Box::new(f)),
            Some(outcome) => {
                drop(inner);
                rt.schedule_microtask(move |rt| f(rt, outcome));
            }
        }
    }
}

impl fmt::Debug for FutureObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FutureObject")
            .field("ty", &self.ty)
            .field("state", &inner.state)
            .field("listeners", &inner.callbacks.len())
            .finish()
    }
}

/// Settle `target` with `outcome`, following the outcome when it is itself a future
pub(crate) fn resolve_into(rt: &Runtime, target: &FutureRef, outcome: RtResult<Value>) {
    match outcome {
        Ok(Value::Future(inner)) => {
            let target = target.clone();
            inner.on_settle(rt, move |rt, outcome| resolve_into(rt, &target, outcome));
        }
        outcome => {
            if let Err(error) = target.settle(rt, outcome) {
                tracing::warn!(%error, "dropped result for a settled future");
            }
        }
    }
}

/// Producer side of a future
pub struct Completer {
    future: FutureRef,
    completed: AtomicBool,
}

impl Completer {
    /// The future this completer settles
    pub fn future(&self) -> Value {
        Value::Future(self.future.clone())
    }

    /// The future as a reference
    pub fn future_ref(&self) -> &FutureRef {
        &self.future
    }

    /// Whether `complete` or `complete_error` has been called
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn claim(&self) -> RtResult<()> {
        if self.completed.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::State("Future already completed".to_string()));
        }
        Ok(())
    }

    /// Complete with a value; a future value is followed
    pub fn complete(&self, rt: &Runtime, value: Value) -> RtResult<()> {
        let value = match value {
            Value::Future(_) => value,
            other => rt.check(other, self.future.value_ty())?,
        };
        self.claim()?;
        resolve_into(rt, &self.future, Ok(value));
        Ok(())
    }

    /// Complete with an error
    pub fn complete_error(&self, rt: &Runtime, error: RuntimeError) -> RtResult<()> {
        self.claim()?;
        self.future.settle(rt, Err(error))
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("future", &self.future)
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl Runtime {
    /// Reified `Future<value_ty>`
    pub fn future_type(&self, value_ty: TypeId) -> RtResult<TypeId> {
        self.instantiate(&self.core().future, &[value_ty])
    }

    /// A completer for a `Future<value_ty>`
    pub fn completer(&self, value_ty: TypeId) -> RtResult<Completer> {
        Ok(Completer {
            future: FutureObject::pending(self.future_type(value_ty)?, value_ty),
            completed: AtomicBool::new(false),
        })
    }

    /// `Future.value`
    pub fn future_value(&self, value_ty: TypeId, value: Value) -> RtResult<Value> {
        let value = self.check(value, value_ty)?;
        let ty = self.future_type(value_ty)?;
        Ok(Value::Future(FutureObject::with_state(ty, value_ty, FutureState::Fulfilled(value))))
    }

    /// `Future.error`
    pub fn future_error(&self, value_ty: TypeId, error: RuntimeError) -> RtResult<Value> {
        let ty = self.future_type(value_ty)?;
        Ok(Value::Future(FutureObject::with_state(ty, value_ty, FutureState::Rejected(error))))
    }

    /// Treat any value as a future; non-futures complete immediately
    pub fn coerce_future(&self, value: Value) -> RtResult<FutureRef> {
        match value {
            Value::Future(future) => Ok(future),
            other => {
                let value_ty = self.runtime_type(&other);
                let ty = self.future_type(value_ty)?;
                Ok(FutureObject::with_state(ty, value_ty, FutureState::Fulfilled(other)))
            }
        }
    }

    /// `future.then(onValue, onError: onError)`
    ///
    /// Callbacks are function values invoked through `dcall`. A callback
    /// that returns a future is followed before the result settles.
    pub fn then(&self, future: &FutureRef, on_value: Value, on_error: Option<Value>) -> RtResult<Value> {
        let result = FutureObject::pending(self.future_type(TypeId::DYNAMIC)?, TypeId::DYNAMIC);
        let target = result.clone();
        future.on_settle(self, move |rt, outcome| {
            let next = match outcome {
                Ok(value) => rt.dcall(&on_value, Args::one(value)),
                Err(error) => match &on_error {
                    Some(handler) => rt.dcall(handler, Args::one(error.to_value())),
                    None => Err(error),
                },
            };
            resolve_into(rt, &target, next);
        });
        Ok(Value::Future(result))
    }

    /// `future.catchError(onError)`
    pub fn catch_error(&self, future: &FutureRef, on_error: Value) -> RtResult<Value> {
        let identity = self.closure("identity", |_, inv| Ok(inv.arg(0)));
        self.then(future, identity, Some(on_error))
    }
}
