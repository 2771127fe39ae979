//! `async*` function driver
//!
//! The body starts when its stream is first listened to. After every
//! `yield` the driver pauses and resumes in a later microtask; if the
//! consumer cancelled in the meantime the body is resumed with
//! [`Resume::Cancel`] exactly once so it can run its cleanup. A `yield`
//! after that ends the body. `yield*` listens to the nested stream and
//! forwards its events; cancelling the outer subscription cancels the
//! nested one first.

use super::coroutine::{Coroutine, Resume, Step};
use super::stream::{StreamHandlers, Subscription};
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::value::Value;
use parking_lot::Mutex;
use reify_types::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
enum StarState {
    Running,
    Paused,
    Awaiting,
    Delegating(Arc<Subscription>),
    Done,
}

struct AsyncStarDriver {
    body: Mutex<Box<dyn Coroutine>>,
    state: Mutex<StarState>,
    subscription: Arc<Subscription>,
    elem_ty: TypeId,
    cancel_delivered: AtomicBool,
}

impl AsyncStarDriver {
    fn set_state(&self, state: StarState) {
        tracing::trace!(state = ?state, "async* transition");
        *self.state.lock() = state;
    }

    /// Input for the resumption after a yield or a finished `yield*`
    fn next_input(&self) -> Resume {
        if self.subscription.is_cancelled() && !self.cancel_delivered.swap(true, Ordering::AcqRel) {
            Resume::Cancel
        } else {
            Resume::Value(Value::Null)
        }
    }

    fn run(self: &Arc<Self>, rt: &Runtime, mut input: Resume) {
        loop {
            if matches!(*self.state.lock(), StarState::Done) {
                return;
            }
            self.set_state(StarState::Running);
            let step = self.body.lock().resume(rt, input);
            match step {
                Step::Yield(value) => {
                    if self.subscription.is_cancelled() {
                        match self.next_input() {
                            Resume::Cancel => {
                                input = Resume::Cancel;
                                continue;
                            }
                            _ => return self.finish(rt, None),
                        }
                    }
                    match rt.check(value, self.elem_ty) {
                        Ok(value) => self.subscription.add(rt, value),
                        Err(error) => {
                            input = Resume::Error(error);
                            continue;
                        }
                    }
                    self.set_state(StarState::Paused);
                    let driver = self.clone();
                    rt.schedule_microtask(move |rt| {
                        let input = driver.next_input();
                        driver.run(rt, input);
                    });
                    return;
                }
                Step::YieldStar(value) => {
                    if self.subscription.is_cancelled() {
                        match self.next_input() {
                            Resume::Cancel => {
                                input = Resume::Cancel;
                                continue;
                            }
                            _ => return self.finish(rt, None),
                        }
                    }
                    match self.delegate(rt, value) {
                        Ok(()) => return,
                        Err(error) => input = Resume::Error(error),
                    }
                }
                Step::Await(value) => match rt.coerce_future(value) {
                    Ok(awaited) => {
                        self.set_state(StarState::Awaiting);
                        let driver = self.clone();
                        awaited.on_settle(rt, move |rt, outcome| driver.run(rt, Resume::from(outcome)));
                        return;
                    }
                    Err(error) => input = Resume::Error(error),
                },
                Step::Return(_) => return self.finish(rt, None),
                Step::Throw(error) => return self.finish(rt, Some(error)),
            }
        }
    }

    /// Forward every event of a nested stream (or iterable) until it ends
    fn delegate(self: &Arc<Self>, rt: &Runtime, source: Value) -> RtResult<()> {
        let stream = match source {
            Value::Stream(_) => source,
            other => {
                let items = rt.iterate(&other)?.collect::<RtResult<Vec<_>>>()?;
                rt.stream_from_iterable(self.elem_ty, items)?
            }
        };

        let on_data = self.clone();
        let on_error = self.clone();
        let on_done = self.clone();
        let handlers = StreamHandlers::new(move |rt, item| match rt.check(item, on_data.elem_ty) {
            Ok(item) => on_data.subscription.add(rt, item),
            Err(error) => on_data.subscription.add_error(rt, error),
        })
        .on_error(move |rt, error| on_error.subscription.add_error(rt, error))
        .on_done(move |rt| {
            let input = on_done.next_input();
            on_done.run(rt, input);
        });

        let inner = rt.listen(&stream, handlers)?;
        self.set_state(StarState::Delegating(inner));
        Ok(())
    }

    fn on_cancel(self: &Arc<Self>, rt: &Runtime) {
        let inner = match &*self.state.lock() {
            StarState::Delegating(inner) => Some(inner.clone()),
            _ => None,
        };
        // other states observe the cancellation at their next resumption
        if let Some(inner) = inner {
            let driver = self.clone();
            inner.cancel(rt).on_settle(rt, move |rt, _| {
                let input = driver.next_input();
                driver.run(rt, input);
            });
        }
    }

    fn finish(&self, rt: &Runtime, error: Option<RuntimeError>) {
        self.set_state(StarState::Done);
        self.subscription.close(rt, error);
    }
}

impl Runtime {
    /// A `Stream<elem_ty>` produced by an `async*` body (`dart.asyncStar`)
    pub fn async_star<C>(&self, elem_ty: TypeId, body: C) -> RtResult<Value>
    where
        C: Coroutine + 'static,
    {
        self.new_stream(elem_ty, move |rt, subscription| {
            let driver = Arc::new(AsyncStarDriver {
                body: Mutex::new(Box::new(body)),
                state: Mutex::new(StarState::Paused),
                subscription: subscription.clone(),
                elem_ty,
                cancel_delivered: AtomicBool::new(false),
            });
            if subscription.is_cancelled() {
                driver.finish(rt, None);
                return;
            }
            let hook_target = Arc::downgrade(&driver);
            subscription.set_cancel_hook(Box::new(move |rt| {
                if let Some(driver) = hook_target.upgrade() {
                    driver.on_cancel(rt);
                }
            }));
            driver.run(rt, Resume::Start);
        })
    }
}
