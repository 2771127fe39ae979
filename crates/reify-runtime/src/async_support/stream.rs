//! Single-subscription streams
//!
//! A [`StreamObject`] holds the producer's `on_listen` hook until the first
//! `listen`. Listening creates a [`Subscription`] and runs the hook in a
//! microtask, so no element is delivered synchronously with `listen`.
//! Producers push through the subscription; consumers cancel through it.

use super::future::{FutureObject, FutureRef};
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::value::Value;
use parking_lot::Mutex;
use reify_types::TypeId;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Element listener
pub type DataHandler = Box<dyn FnMut(&Runtime, Value) + Send>;

/// Error listener
pub type ErrorHandler = Box<dyn FnMut(&Runtime, RuntimeError) + Send>;

/// Completion listener
pub type DoneHandler = Box<dyn FnOnce(&Runtime) + Send>;

/// Producer hook run when the stream is listened to
pub type OnListen = Box<dyn FnOnce(&Runtime, Arc<Subscription>) + Send>;

/// Producer hook run when the consumer cancels
pub(crate) type CancelHook = Box<dyn FnOnce(&Runtime) + Send>;

/// Listener callbacks for [`StreamObject::listen`]
pub struct StreamHandlers {
    on_data: Option<DataHandler>,
    on_error: Option<ErrorHandler>,
    on_done: Option<DoneHandler>,
}

impl StreamHandlers {
    /// Handlers with an element listener
    pub fn new<F>(on_data: F) -> Self
    where
        F: FnMut(&Runtime, Value) + Send + 'static,
    {
        Self {
            on_data: Some(Box::new(on_data)),
            on_error: None,
            on_done: None,
        }
    }

    /// Add an error listener
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Runtime, RuntimeError) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Add a completion listener
    pub fn on_done<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Runtime) + Send + 'static,
    {
        self.on_done = Some(Box::new(f));
        self
    }
}

/// An active listener on a stream
pub struct Subscription {
    handlers: Mutex<StreamHandlers>,
    cancelled: AtomicBool,
    closed: AtomicBool,
    cancel_hook: Mutex<Option<CancelHook>>,
    cancel_future: FutureRef,
}

impl Subscription {
    fn new(handlers: StreamHandlers, cancel_future: FutureRef) -> Arc<Self> {
        Arc::new(Subscription {
            handlers: Mutex::new(handlers),
            cancelled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            cancel_hook: Mutex::new(None),
            cancel_future,
        })
    }

    /// Whether the consumer cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether the producer finished
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn is_active(&self) -> bool {
        !self.is_cancelled() && !self.is_closed()
    }

    /// Stop delivery and ask the producer to clean up
    ///
    /// Idempotent. The returned future settles once the producer has
    /// finished its cleanup.
    pub fn cancel(&self, rt: &Runtime) -> FutureRef {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            tracing::debug!("subscription cancelled");
            self.clear_handlers();
            let hook = self.cancel_hook.lock().take();
            match hook {
                Some(hook) => hook(rt),
                None => self.settle_cancel(rt, None),
            }
        }
        self.cancel_future.clone()
    }

    pub(crate) fn set_cancel_hook(&self, hook: CancelHook) {
        *self.cancel_hook.lock() = Some(hook);
    }

    /// Deliver one element
    pub(crate) fn add(&self, rt: &Runtime, value: Value) {
        if !self.is_active() {
            return;
        }
        // the handler is taken out so no lock is held while it runs
        let handler = self.handlers.lock().on_data.take();
        if let Some(mut handler) = handler {
            handler(rt, value);
            if self.is_active() {
                self.handlers.lock().on_data.get_or_insert(handler);
            }
        }
    }

    /// Deliver one error
    pub(crate) fn add_error(&self, rt: &Runtime, error: RuntimeError) {
        if !self.is_active() {
            return;
        }
        let handler = self.handlers.lock().on_error.take();
        match handler {
            Some(mut handler) => {
                handler(rt, error);
                if self.is_active() {
                    self.handlers.lock().on_error.get_or_insert(handler);
                }
            }
            None => tracing::warn!(%error, "unhandled stream error"),
        }
    }

    /// Finish the stream, optionally with a final error
    ///
    /// Once cancelled, a final error settles the cancel future instead of
    /// reaching the consumer.
    pub(crate) fn close(&self, rt: &Runtime, error: Option<RuntimeError>) {
        if self.is_closed() {
            return;
        }
        let error = match error {
            Some(error) if !self.is_cancelled() => {
                self.add_error(rt, error);
                None
            }
            other => other,
        };
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let on_done = if self.is_cancelled() {
            None
        } else {
            self.handlers.lock().on_done.take()
        };
        self.clear_handlers();
        self.cancel_hook.lock().take();
        if let Some(on_done) = on_done {
            on_done(rt);
        }
        self.settle_cancel(rt, error);
    }

    fn clear_handlers(&self) {
        let mut handlers = self.handlers.lock();
        handlers.on_data = None;
        handlers.on_error = None;
        handlers.on_done = None;
    }

    fn settle_cancel(&self, rt: &Runtime, error: Option<RuntimeError>) {
        if !self.cancel_future.is_settled() {
            let outcome = error.map_or(Ok(Value::Null), Err);
            let _ = self.cancel_future.settle(rt, outcome);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A single-subscription stream
pub struct StreamObject {
    ty: TypeId,
    elem_ty: TypeId,
    on_listen: Mutex<Option<OnListen>>,
}

/// Shared stream reference
pub type StreamRef = Arc<StreamObject>;

impl StreamObject {
    /// Reified `Stream<T>` type
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// The `T` of `Stream<T>`
    pub fn elem_ty(&self) -> TypeId {
        self.elem_ty
    }

    /// Whether `listen` has been called
    pub fn is_listened(&self) -> bool {
        self.on_listen.lock().is_none()
    }

    /// Start listening; a second call fails with a `StateError`
    pub fn listen(&self, rt: &Runtime, handlers: StreamHandlers) -> RtResult<Arc<Subscription>> {
        let on_listen = self
            .on_listen
            .lock()
            .take()
            .ok_or_else(|| RuntimeError::State("Stream has already been listened to".to_string()))?;
        let cancel_future = FutureObject::pending(rt.future_type(TypeId::VOID)?, TypeId::VOID);
        let subscription = Subscription::new(handlers, cancel_future);
        let producer_side = subscription.clone();
        rt.schedule_microtask(move |rt| on_listen(rt, producer_side));
        Ok(subscription)
    }
}

impl fmt::Debug for StreamObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamObject")
            .field("ty", &self.ty)
            .field("listened", &self.is_listened())
            .finish()
    }
}

fn emit_items(rt: &Runtime, subscription: Arc<Subscription>, mut items: VecDeque<Value>) {
    if subscription.is_cancelled() {
        subscription.close(rt, None);
        return;
    }
    match items.pop_front() {
        Some(item) => {
            subscription.add(rt, item);
            rt.schedule_microtask(move |rt| emit_items(rt, subscription, items));
        }
        None => subscription.close(rt, None),
    }
}

impl Runtime {
    /// Reified `Stream<elem_ty>`
    pub fn stream_type(&self, elem_ty: TypeId) -> RtResult<TypeId> {
        self.instantiate(&self.core().stream, &[elem_ty])
    }

    /// A stream whose producer runs `on_listen` on first listen
    pub fn new_stream<F>(&self, elem_ty: TypeId, on_listen: F) -> RtResult<Value>
    where
        F: FnOnce(&Runtime, Arc<Subscription>) + Send + 'static,
    {
        Ok(Value::Stream(Arc::new(StreamObject {
            ty: self.stream_type(elem_ty)?,
            elem_ty,
            on_listen: Mutex::new(Some(Box::new(on_listen))),
        })))
    }

    /// A stream emitting `items`, one per microtask
    pub fn stream_from_iterable(&self, elem_ty: TypeId, items: Vec<Value>) -> RtResult<Value> {
        let items = items
            .into_iter()
            .map(|item| self.check(item, elem_ty))
            .collect::<RtResult<VecDeque<_>>>()?;
        self.new_stream(elem_ty, move |rt, subscription| emit_items(rt, subscription, items))
    }

    /// Listen to a stream value
    pub fn listen(&self, stream: &Value, handlers: StreamHandlers) -> RtResult<Arc<Subscription>> {
        match stream {
            Value::Stream(stream) => stream.listen(self, handlers),
            other => Err(RuntimeError::no_such_method("listen", self.value_type_name(other))),
        }
    }
}
