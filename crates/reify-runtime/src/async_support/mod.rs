//! Async support: microtasks, futures, streams and generator drivers
//!
//! Compiled `async`, `async*` and `sync*` bodies are [`Coroutine`]s. The
//! drivers in this module resume them in response to settled futures,
//! consumer demand or iteration.

mod async_fn;
mod async_star;
mod coroutine;
mod event_loop;
mod future;
mod stream;
mod sync_star;

pub use self::async_fn::{AsyncState, AsyncTask};
pub use self::coroutine::{Coroutine, Resume, Step};
pub use self::event_loop::{EventLoop, Microtask};
pub use self::future::{Completer, FutureObject, FutureRef, FutureState, SettleCallback};
pub use self::stream::{
    DataHandler, DoneHandler, ErrorHandler, OnListen, StreamHandlers, StreamObject, StreamRef, Subscription,
};
pub use self::sync_star::{CoroutineFactory, IterableRef, LazyIterable, SyncStarIter, ValueIter};
