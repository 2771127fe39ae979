//! `sync*` generators and iteration over iterable values
//!
//! A [`LazyIterable`] holds a body factory; every iteration runs a fresh
//! body, so a generator iterable can be walked any number of times.
//! `yield*` pushes the nested iterable on a frame stack and flattens it.

use super::coroutine::{Coroutine, Resume, Step};
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::value::Value;
use reify_types::TypeId;
use std::fmt;
use std::sync::Arc;

/// Creates a fresh generator body per iteration
pub type CoroutineFactory = Arc<dyn Fn() -> Box<dyn Coroutine> + Send + Sync>;

/// An iterable produced by a `sync*` body
pub struct LazyIterable {
    ty: TypeId,
    elem_ty: TypeId,
    factory: CoroutineFactory,
}

/// Shared lazy iterable reference
pub type IterableRef = Arc<LazyIterable>;

impl LazyIterable {
    /// Reified `Iterable<E>` type
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Element type `E`
    pub fn elem_ty(&self) -> TypeId {
        self.elem_ty
    }

    /// Start a fresh iteration
    pub fn iter<'rt>(&self, rt: &'rt Runtime) -> SyncStarIter<'rt> {
        SyncStarIter {
            rt,
            elem_ty: self.elem_ty,
            frames: vec![Frame::body((self.factory)())],
        }
    }
}

impl fmt::Debug for LazyIterable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyIterable").field("ty", &self.ty).finish()
    }
}

enum Frame {
    Body { body: Box<dyn Coroutine>, input: Resume },
    Items(std::vec::IntoIter<Value>),
}

impl Frame {
    fn body(body: Box<dyn Coroutine>) -> Self {
        Frame::Body {
            body,
            input: Resume::Start,
        }
    }
}

enum Advance {
    Emit(Value),
    Exhausted,
    Stepped(Step),
}

/// Iterator over a running `sync*` body
pub struct SyncStarIter<'rt> {
    rt: &'rt Runtime,
    elem_ty: TypeId,
    frames: Vec<Frame>,
}

impl SyncStarIter<'_> {
    fn advance(&mut self) -> Option<Advance> {
        let rt = self.rt;
        Some(match self.frames.last_mut()? {
            Frame::Items(items) => match items.next() {
                Some(item) => Advance::Emit(item),
                None => Advance::Exhausted,
            },
            Frame::Body { body, input } => {
                let input = std::mem::replace(input, Resume::Value(Value::Null));
                Advance::Stepped(body.resume(rt, input))
            }
        })
    }

    /// Feed an error back into the innermost body
    fn throw_in(&mut self, error: RuntimeError) {
        if let Some(Frame::Body { input, .. }) = self.frames.last_mut() {
            *input = Resume::Error(error);
        }
    }

    fn fail(&mut self, error: RuntimeError) -> Option<RtResult<Value>> {
        self.frames.clear();
        Some(Err(error))
    }
}

impl Iterator for SyncStarIter<'_> {
    type Item = RtResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.advance()? {
                Advance::Emit(item) => return Some(Ok(item)),
                Advance::Exhausted => {
                    self.frames.pop();
                }
                Advance::Stepped(Step::Yield(value)) => {
                    return match self.rt.check(value, self.elem_ty) {
                        Ok(value) => Some(Ok(value)),
                        Err(error) => self.fail(error),
                    };
                }
                Advance::Stepped(Step::YieldStar(nested)) => match nested {
                    Value::Iterable(iterable) => self.frames.push(Frame::body((iterable.factory)())),
                    Value::List(list) => self.frames.push(Frame::Items(list.snapshot().into_iter())),
                    Value::Set(set) => self.frames.push(Frame::Items(set.snapshot().into_iter())),
                    other => {
                        let error = RuntimeError::no_such_method("iterator", self.rt.value_type_name(&other));
                        self.throw_in(error);
                    }
                },
                Advance::Stepped(Step::Await(_)) => {
                    self.throw_in(RuntimeError::State("await is not allowed in sync* bodies".to_string()));
                }
                Advance::Stepped(Step::Return(_)) => {
                    self.frames.pop();
                }
                Advance::Stepped(Step::Throw(error)) => return self.fail(error),
            }
        }
    }
}

/// Iterator over the elements of any iterable value
pub enum ValueIter<'rt> {
    /// Snapshot of an eager collection
    Items(std::vec::IntoIter<Value>),
    /// A running generator
    Lazy(SyncStarIter<'rt>),
}

impl Iterator for ValueIter<'_> {
    type Item = RtResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ValueIter::Items(items) => items.next().map(Ok),
            ValueIter::Lazy(iter) => iter.next(),
        }
    }
}

impl Runtime {
    /// An `Iterable<elem_ty>` produced by a `sync*` body (`dart.syncStar`)
    pub fn sync_star<F, C>(&self, elem_ty: TypeId, factory: F) -> RtResult<Value>
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Coroutine + 'static,
    {
        let ty = self.instantiate(&self.core().iterable, &[elem_ty])?;
        let factory: CoroutineFactory = Arc::new(move || Box::new(factory()) as Box<dyn Coroutine>);
        Ok(Value::Iterable(Arc::new(LazyIterable { ty, elem_ty, factory })))
    }

    /// Iterate a list, set or lazy iterable
    ///
    /// Lists and sets are snapshotted, so mutation during iteration does
    /// not affect the elements visited.
    pub fn iterate(&self, value: &Value) -> RtResult<ValueIter<'_>> {
        match value {
            Value::List(list) => Ok(ValueIter::Items(list.snapshot().into_iter())),
            Value::Set(set) => Ok(ValueIter::Items(set.snapshot().into_iter())),
            Value::Iterable(iterable) => Ok(ValueIter::Lazy(iterable.iter(self))),
            other => Err(RuntimeError::no_such_method("iterator", self.value_type_name(other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn range(limit: i64) -> impl Fn() -> Box<dyn FnMut(&Runtime, Resume) -> Step + Send> + Send + Sync {
        move || {
            let mut next = 0;
            Box::new(move |_: &Runtime, _: Resume| {
                if next < limit {
                    next += 1;
                    Step::Yield(Value::int(next))
                } else {
                    Step::Return(Value::Null)
                }
            })
        }
    }

    fn collect(rt: &Runtime, value: &Value) -> RtResult<Vec<Value>> {
        rt.iterate(value)?.collect()
    }

    #[test]
    fn test_each_iteration_restarts_body() {
        let rt = Runtime::new();
        let starts = Arc::new(AtomicUsize::new(0));
        let counter = starts.clone();
        let make = range(3);
        let iterable = rt
            .sync_star(TypeId::INT, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                make()
            })
            .unwrap();

        assert_eq!(collect(&rt, &iterable).unwrap(), vec![Value::int(1), Value::int(2), Value::int(3)]);
        assert_eq!(collect(&rt, &iterable).unwrap().len(), 3);
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(rt.type_name(rt.runtime_type(&iterable)), "Iterable<int>");
    }

    #[test]
    fn test_lazy_evaluation() {
        let rt = Runtime::new();
        let steps = Arc::new(AtomicUsize::new(0));
        let counter = steps.clone();
        let iterable = rt
            .sync_star(TypeId::INT, move || {
                let counter = counter.clone();
                move |_: &Runtime, _: Resume| {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    Step::Yield(Value::int(n as i64))
                }
            })
            .unwrap();
        let first: Vec<Value> = rt
            .iterate(&iterable)
            .unwrap()
            .take(2)
            .collect::<RtResult<_>>()
            .unwrap();
        assert_eq!(first, vec![Value::int(0), Value::int(1)]);
        assert_eq!(steps.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_yield_star_flattens() {
        let rt = Runtime::new();
        let inner = rt.sync_star(TypeId::INT, range(2)).unwrap();
        let list = rt.new_list(TypeId::INT, vec![Value::int(7)]).unwrap();
        let outer = rt
            .sync_star(TypeId::INT, move || {
                let inner = inner.clone();
                let list = list.clone();
                let mut stage = 0;
                move |_: &Runtime, _: Resume| {
                    stage += 1;
                    match stage {
                        1 => Step::YieldStar(inner.clone()),
                        2 => Step::YieldStar(list.clone()),
                        3 => Step::Yield(Value::int(0)),
                        _ => Step::Return(Value::Null),
                    }
                }
            })
            .unwrap();
        assert_eq!(
            collect(&rt, &outer).unwrap(),
            vec![Value::int(1), Value::int(2), Value::int(7), Value::int(0)]
        );
    }

    #[test]
    fn test_throw_ends_iteration() {
        let rt = Runtime::new();
        let iterable = rt
            .sync_star(TypeId::INT, || {
                let mut yielded = false;
                move |_: &Runtime, _: Resume| {
                    if yielded {
                        Step::Throw(RuntimeError::State("stop".into()))
                    } else {
                        yielded = true;
                        Step::Yield(Value::int(1))
                    }
                }
            })
            .unwrap();
        let mut iter = rt.iterate(&iterable).unwrap();
        assert_eq!(iter.next().unwrap().unwrap(), Value::int(1));
        assert!(matches!(iter.next(), Some(Err(RuntimeError::State(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_await_rejected() {
        let rt = Runtime::new();
        let iterable = rt
            .sync_star(TypeId::DYNAMIC, || {
                |_: &Runtime, input: Resume| match input {
                    Resume::Start => Step::Await(Value::Null),
                    Resume::Error(e) => Step::Throw(e),
                    _ => Step::Return(Value::Null),
                }
            })
            .unwrap();
        assert!(matches!(collect(&rt, &iterable), Err(RuntimeError::State(_))));
    }

    #[test]
    fn test_iterating_non_iterable() {
        let rt = Runtime::new();
        assert!(matches!(
            rt.iterate(&Value::int(1)).map(|_| ()),
            Err(RuntimeError::NoSuchMethod { .. })
        ));
    }

    #[test]
    fn test_extension_members_on_lazy_iterable() {
        let rt = Runtime::new();
        let iterable = rt.sync_star(TypeId::INT, range(4)).unwrap();
        assert_eq!(rt.dload(&iterable, "length").unwrap(), Value::int(4));
        assert_eq!(rt.dload(&iterable, "first").unwrap(), Value::int(1));
        assert_eq!(rt.to_dart_string(&iterable).unwrap(), "(1, 2, 3, 4)");
    }
}
