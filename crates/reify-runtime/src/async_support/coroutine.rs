//! Resumable bodies for `async`, `async*` and `sync*` functions
//!
//! A compiled generator or async body is an explicit state machine. The
//! driver resumes it with a [`Resume`] input and the body answers with the
//! next [`Step`]. Any `FnMut(&Runtime, Resume) -> Step` closure is a
//! coroutine, which keeps hand-written state machines short:
//!
//! ```text
//! let mut state = 0;
//! move |rt, input| match (state, input) {
//!     (0, Resume::Start) => { state = 1; Step::Await(fetch(rt)) }
//!     (1, Resume::Value(v)) => Step::Return(v),
//!     (_, Resume::Error(e)) => Step::Throw(e),
//!     ...
//! }
//! ```

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::value::Value;

/// Input delivered when a body is resumed
#[derive(Debug, Clone)]
pub enum Resume {
    /// First resumption
    Start,
    /// Result of the awaited future, or acknowledgement of a yield
    Value(Value),
    /// The awaited future failed; throw at the suspension point
    Error(RuntimeError),
    /// The consumer cancelled; run cleanup and return
    Cancel,
}

impl From<RtResult<Value>> for Resume {
    fn from(outcome: RtResult<Value>) -> Self {
        match outcome {
            Ok(value) => Resume::Value(value),
            Err(error) => Resume::Error(error),
        }
    }
}

/// What a body does next
#[derive(Debug, Clone)]
pub enum Step {
    /// Suspend until the value (coerced to a future) settles
    Await(Value),
    /// Emit one element
    Yield(Value),
    /// Emit every element of a nested stream or iterable
    YieldStar(Value),
    /// Finish with a value
    Return(Value),
    /// Finish with an error
    Throw(RuntimeError),
}

impl From<RtResult<Value>> for Step {
    fn from(outcome: RtResult<Value>) -> Self {
        match outcome {
            Ok(value) => Step::Return(value),
            Err(error) => Step::Throw(error),
        }
    }
}

/// A resumable body
pub trait Coroutine: Send {
    /// Run until the next suspension point
    fn resume(&mut self, rt: &Runtime, input: Resume) -> Step;
}

impl<F> Coroutine for F
where
    F: FnMut(&Runtime, Resume) -> Step + Send,
{
    fn resume(&mut self, rt: &Runtime, input: Resume) -> Step {
        self(rt, input)
    }
}
