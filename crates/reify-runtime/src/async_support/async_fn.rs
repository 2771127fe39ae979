//! `async` function driver
//!
//! The body runs synchronously up to its first `await`. Each await
//! suspends the driver on the awaited future; resumption happens in a
//! microtask after that future settles. Returning a future follows it.

use super::coroutine::{Coroutine, Resume, Step};
use super::future::{FutureObject, FutureRef};
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::value::Value;
use parking_lot::Mutex;
use reify_types::TypeId;
use std::sync::Arc;

/// Observable state of an async body
#[derive(Debug, Clone)]
pub enum AsyncState {
    /// Executing synchronously
    Running,
    /// Waiting for the contained value to settle
    SuspendedAwaiting(Value),
    /// Returned a value
    Completed(Value),
    /// Threw
    Failed(RuntimeError),
}

struct AsyncDriver {
    body: Mutex<Box<dyn Coroutine>>,
    state: Mutex<AsyncState>,
    future: FutureRef,
    return_ty: TypeId,
}

impl AsyncDriver {
    fn transition(&self, state: AsyncState) {
        tracing::trace!(state = ?state, "async transition");
        *self.state.lock() = state;
    }

    fn run(self: &Arc<Self>, rt: &Runtime, mut input: Resume) {
        loop {
            self.transition(AsyncState::Running);
            let step = self.body.lock().resume(rt, input);
            match step {
                Step::Await(value) => match rt.coerce_future(value.clone()) {
                    Ok(awaited) => {
                        self.transition(AsyncState::SuspendedAwaiting(value));
                        let driver = self.clone();
                        awaited.on_settle(rt, move |rt, outcome| driver.run(rt, Resume::from(outcome)));
                        return;
                    }
                    Err(error) => input = Resume::Error(error),
                },
                Step::Return(value) => return self.finish(rt, value),
                Step::Throw(error) => return self.fail(rt, error),
                Step::Yield(_) | Step::YieldStar(_) => {
                    input = Resume::Error(RuntimeError::State(
                        "yield is only valid in generator bodies".to_string(),
                    ));
                }
            }
        }
    }

    fn finish(self: &Arc<Self>, rt: &Runtime, value: Value) {
        if let Value::Future(inner) = value {
            let driver = self.clone();
            inner.on_settle(rt, move |rt, outcome| match outcome {
                Ok(value) => driver.finish(rt, value),
                Err(error) => driver.fail(rt, error),
            });
            return;
        }
        match rt.check(value, self.return_ty) {
            Ok(value) => {
                self.transition(AsyncState::Completed(value.clone()));
                self.settle(rt, Ok(value));
            }
            Err(error) => self.fail(rt, error),
        }
    }

    fn fail(&self, rt: &Runtime, error: RuntimeError) {
        self.transition(AsyncState::Failed(error.clone()));
        self.settle(rt, Err(error));
    }

    fn settle(&self, rt: &Runtime, outcome: RtResult<Value>) {
        if let Err(error) = self.future.settle(rt, outcome) {
            tracing::warn!(%error, "async body settled twice");
        }
    }
}

/// Handle on a running async body
#[derive(Clone)]
pub struct AsyncTask {
    driver: Arc<AsyncDriver>,
}

impl AsyncTask {
    /// Current state of the body
    pub fn state(&self) -> AsyncState {
        self.driver.state.lock().clone()
    }

    /// The result future as a value
    pub fn future(&self) -> Value {
        Value::Future(self.driver.future.clone())
    }

    /// The result future
    pub fn future_ref(&self) -> &FutureRef {
        &self.driver.future
    }
}

impl std::fmt::Debug for AsyncTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTask").field("state", &self.state()).finish()
    }
}

impl Runtime {
    /// Start an async body returning `Future<return_ty>`
    pub fn spawn_async<C>(&self, return_ty: TypeId, body: C) -> RtResult<AsyncTask>
    where
        C: Coroutine + 'static,
    {
        let future = FutureObject::pending(self.future_type(return_ty)?, return_ty);
        let driver = Arc::new(AsyncDriver {
            body: Mutex::new(Box::new(body)),
            state: Mutex::new(AsyncState::Running),
            future,
            return_ty,
        });
        driver.run(self, Resume::Start);
        Ok(AsyncTask { driver })
    }

    /// Start an async body and return its future (`dart.async`)
    pub fn async_<C>(&self, return_ty: TypeId, body: C) -> RtResult<Value>
    where
        C: Coroutine + 'static,
    {
        Ok(self.spawn_async(return_ty, body)?.future())
    }
}
