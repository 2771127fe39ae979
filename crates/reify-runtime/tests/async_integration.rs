//! Async Desugaring Integration Tests
//!
//! Tests validate:
//! - `async` bodies running synchronously up to their first await
//! - Futures chained across several async functions
//! - `async*` cancellation running cleanup before the cancel future settles
//! - `sync*` iterables consumed by `async*` delegation
//!
//! # Running Tests
//! ```bash
//! cargo test --test async_integration
//! ```

use parking_lot::Mutex;
use reify_runtime::{
    Args, FutureState, Resume, Runtime, RuntimeError, RuntimeOptions, Step, StreamHandlers, Subscription,
    TypeId, Value,
};
use std::sync::Arc;

type Trace = Arc<Mutex<String>>;

fn trace() -> Trace {
    Arc::new(Mutex::new(String::new()))
}

// ===== async =====

#[test]
fn test_side_effects_before_first_await_are_synchronous() {
    let rt = Runtime::new();
    let log = trace();

    let t = log.clone();
    let future = rt
        .async_(TypeId::INT, move |rt: &Runtime, input: Resume| match input {
            Resume::Start => {
                t.lock().push('A');
                Step::Await(rt.future_value(TypeId::INT, Value::int(1)).unwrap_or_default())
            }
            Resume::Value(v) => {
                t.lock().push('C');
                Step::Return(v)
            }
            Resume::Error(e) => Step::Throw(e),
            Resume::Cancel => Step::Return(Value::Null),
        })
        .unwrap();
    log.lock().push('B');

    assert_eq!(*log.lock(), "AB");
    rt.run_until_idle().unwrap();
    assert_eq!(*log.lock(), "ABC");
    let Value::Future(future) = future else {
        panic!("async_ must return a future");
    };
    assert_eq!(future.outcome().unwrap().unwrap(), Value::int(1));
}

#[test]
fn test_chained_async_functions() {
    let rt = Runtime::new();

    // double(x) async => await x * 2
    let double = |rt: &Runtime, x: Value| {
        rt.async_(TypeId::INT, move |rt: &Runtime, input: Resume| match input {
            Resume::Start => Step::Await(x.clone()),
            Resume::Value(v) => Step::from(rt.dsend(&v, "*", Args::one(Value::int(2)))),
            Resume::Error(e) => Step::Throw(e),
            Resume::Cancel => Step::Return(Value::Null),
        })
        .unwrap()
    };

    let once = double(&rt, Value::int(5));
    let twice = double(&rt, once);
    let Value::Future(result) = double(&rt, twice) else {
        panic!("async_ must return a future");
    };
    rt.run_until_idle().unwrap();
    assert!(matches!(result.state(), FutureState::Fulfilled(_)));
    assert_eq!(result.outcome().unwrap().unwrap(), Value::int(40));
}

#[test]
fn test_errors_propagate_through_then() {
    let rt = Runtime::new();
    let failing = rt
        .async_(TypeId::INT, |_: &Runtime, _: Resume| {
            Step::Throw(RuntimeError::Thrown(Value::string("boom")))
        })
        .unwrap();
    let never = rt.closure("never", |_, _| Ok(Value::string("value")));
    let chained = rt.dsend(&failing, "then", Args::one(never)).unwrap();
    let recover = rt.closure("recover", |rt, inv| {
        let message = rt.to_dart_string(&inv.arg(0))?;
        Ok(Value::string(format!("caught {}", message)))
    });
    let Value::Future(recovered) = rt.dsend(&chained, "catchError", Args::one(recover)).unwrap() else {
        panic!("catchError must return a future");
    };
    rt.run_until_idle().unwrap();
    assert_eq!(recovered.outcome().unwrap().unwrap(), Value::string("caught boom"));
}

#[test]
fn test_microtask_budget_stops_runaway_loops() {
    let rt = Runtime::with_options(RuntimeOptions::default().with_microtask_budget(16));
    fn spin(rt: &Runtime) {
        rt.schedule_microtask(spin);
    }
    spin(&rt);
    let err = rt.run_until_idle().unwrap_err();
    assert_eq!(err.kind(), "StateError");
    assert_eq!(rt.pending_microtasks(), 1);
}

// ===== async* =====

/// Yields one trace character per step and records `!` when cancelled
fn lettered(rt: &Runtime, log: Trace) -> Value {
    let letters = ['a', 'b', 'c', 'd'];
    let mut next = 0;
    rt.async_star(TypeId::STRING, move |_: &Runtime, input: Resume| match input {
        Resume::Cancel => {
            log.lock().push('!');
            Step::Return(Value::Null)
        }
        Resume::Error(e) => Step::Throw(e),
        _ if next < letters.len() => {
            let letter = letters[next];
            next += 1;
            log.lock().push(letter);
            Step::Yield(Value::string(letter.to_string()))
        }
        _ => Step::Return(Value::Null),
    })
    .unwrap()
}

#[test]
fn test_cancel_after_third_element_runs_cleanup_first() {
    let rt = Runtime::new();
    let log = trace();
    let stream = lettered(&rt, log.clone());

    let slot: Arc<Mutex<Option<Arc<Subscription>>>> = Arc::new(Mutex::new(None));
    let handle = slot.clone();
    let marker = log.clone();
    let subscription = rt
        .listen(
            &stream,
            StreamHandlers::new(move |rt, item| {
                if item == Value::string("c") {
                    let Some(subscription) = handle.lock().clone() else {
                        return;
                    };
                    let marker = marker.clone();
                    subscription
                        .cancel(rt)
                        .on_settle(rt, move |_, _| marker.lock().push('$'));
                }
            }),
        )
        .unwrap();
    *slot.lock() = Some(subscription.clone());

    rt.run_until_idle().unwrap();
    assert_eq!(*log.lock(), "abc!$");
    assert!(subscription.is_cancelled());
    assert!(subscription.is_closed());
}

#[test]
fn test_uncancelled_stream_runs_to_completion() {
    let rt = Runtime::new();
    let log = trace();
    let stream = lettered(&rt, log.clone());

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let marker = log.clone();
    rt.listen(
        &stream,
        StreamHandlers::new(move |_, item| sink.lock().push(item)).on_done(move |_| marker.lock().push('$')),
    )
    .unwrap();

    rt.run_until_idle().unwrap();
    assert_eq!(*log.lock(), "abcd$");
    assert_eq!(received.lock().len(), 4);
}

#[test]
fn test_second_listen_rejected() {
    let rt = Runtime::new();
    let stream = lettered(&rt, trace());
    rt.listen(&stream, StreamHandlers::new(|_, _| {})).unwrap();
    let err = rt.listen(&stream, StreamHandlers::new(|_, _| {})).unwrap_err();
    assert_eq!(err.kind(), "StateError");
}

/// Listen to `stream`, cancelling once `after` elements arrived; `$` marks the cancel future settling
fn cancel_after(rt: &Runtime, stream: &Value, after: usize, log: Trace) -> Arc<Subscription> {
    let slot: Arc<Mutex<Option<Arc<Subscription>>>> = Arc::new(Mutex::new(None));
    let handle = slot.clone();
    let mut seen = 0;
    let subscription = rt
        .listen(
            stream,
            StreamHandlers::new(move |rt, _| {
                seen += 1;
                if seen != after {
                    return;
                }
                let Some(subscription) = handle.lock().clone() else {
                    return;
                };
                let marker = log.clone();
                subscription
                    .cancel(rt)
                    .on_settle(rt, move |_, _| marker.lock().push('$'));
            }),
        )
        .unwrap();
    *slot.lock() = Some(subscription.clone());
    subscription
}

#[test]
fn test_cancel_during_delegation_cleans_up_inner_then_outer() {
    let rt = Runtime::new();
    let log = trace();

    let inner_log = log.clone();
    let mut produced = 0;
    let inner = rt
        .async_star(TypeId::STRING, move |_: &Runtime, input: Resume| match input {
            Resume::Cancel => {
                inner_log.lock().push('!');
                Step::Return(Value::Null)
            }
            Resume::Error(e) => Step::Throw(e),
            _ if produced < 10 => {
                produced += 1;
                inner_log.lock().push('i');
                Step::Yield(Value::string("i"))
            }
            _ => Step::Return(Value::Null),
        })
        .unwrap();

    let outer_log = log.clone();
    let mut delegated = false;
    let outer = rt
        .async_star(TypeId::STRING, move |_: &Runtime, input: Resume| match input {
            Resume::Cancel => {
                outer_log.lock().push('#');
                Step::Return(Value::Null)
            }
            Resume::Error(e) => Step::Throw(e),
            _ if !delegated => {
                delegated = true;
                Step::YieldStar(inner.clone())
            }
            _ => {
                outer_log.lock().push('?');
                Step::Return(Value::Null)
            }
        })
        .unwrap();

    let subscription = cancel_after(&rt, &outer, 2, log.clone());
    rt.run_until_idle().unwrap();
    assert_eq!(*log.lock(), "ii!#$");
    assert!(subscription.is_closed());
}

#[test]
fn test_repeated_cancel_runs_cleanup_once() {
    let rt = Runtime::new();
    let log = trace();
    let stream = lettered(&rt, log.clone());
    let subscription = cancel_after(&rt, &stream, 1, log.clone());
    rt.run_until_idle().unwrap();
    assert_eq!(*log.lock(), "a!$");

    let first = subscription.cancel(&rt);
    let second = subscription.cancel(&rt);
    assert!(Arc::ptr_eq(&first, &second));
    rt.run_until_idle().unwrap();
    assert_eq!(*log.lock(), "a!$");
    assert!(matches!(first.state(), FutureState::Fulfilled(_)));
}

// ===== sync* =====

#[test]
fn test_async_star_delegates_to_sync_star() {
    let rt = Runtime::new();
    let evens = rt
        .sync_star(TypeId::INT, || {
            let mut n = 0;
            move |_: &Runtime, _: Resume| {
                n += 2;
                if n <= 6 {
                    Step::Yield(Value::int(n))
                } else {
                    Step::Return(Value::Null)
                }
            }
        })
        .unwrap();
    assert_eq!(rt.to_dart_string(&evens).unwrap(), "(2, 4, 6)");

    let mut delegated = false;
    let stream = rt
        .async_star(TypeId::INT, move |_: &Runtime, _: Resume| {
            if delegated {
                Step::Return(Value::Null)
            } else {
                delegated = true;
                Step::YieldStar(evens.clone())
            }
        })
        .unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    rt.listen(&stream, StreamHandlers::new(move |_, item| sink.lock().push(item)))
        .unwrap();
    rt.run_until_idle().unwrap();
    assert_eq!(*received.lock(), vec![Value::int(2), Value::int(4), Value::int(6)]);
}
