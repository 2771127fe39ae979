//! Reified Generics Integration Tests
//!
//! Tests validate:
//! - Instantiation caching and identity of generic classes
//! - Covariant subtyping between instantiations
//! - `is` / `as` / implicit checks in checked and production modes
//! - Core collection generics
//!
//! # Running Tests
//! ```bash
//! cargo test --test generics_integration
//! ```

use reify_runtime::{
    Args, ClassBuilder, ClassRef, GenericRef, Runtime, RuntimeError, RuntimeOptions, TypeId, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn define_box(rt: &Runtime, built: Arc<AtomicUsize>) -> GenericRef<ClassRef> {
    rt.generic("Box", 1, move |rt, args| {
        built.fetch_add(1, Ordering::SeqCst);
        ClassBuilder::new("app", "Box")
            .type_args(args.to_vec())
            .field("value", args[0])
            .method("get", |rt, inv| rt.dload(&inv.this, "value"))
            .build(rt)
    })
}

// ===== Instantiation Cache =====

#[test]
fn test_instantiation_is_cached() {
    let rt = Runtime::new();
    let built = Arc::new(AtomicUsize::new(0));
    let boxed = define_box(&rt, built.clone());

    let a = rt.instantiate(&boxed, &[TypeId::INT]).unwrap();
    let b = rt.instantiate(&boxed, &[TypeId::INT]).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.type_id(), b.type_id());
    assert_eq!(built.load(Ordering::SeqCst), 1);

    let s = rt.instantiate(&boxed, &[TypeId::STRING]).unwrap();
    assert!(!Arc::ptr_eq(&a, &s));
    assert_ne!(a.type_id(), s.type_id());
    assert_eq!(built.load(Ordering::SeqCst), 2);
    assert_eq!(boxed.cached_len(), 2);
}

#[test]
fn test_raw_type_is_dynamic_instantiation() {
    let rt = Runtime::new();
    let boxed = define_box(&rt, Arc::new(AtomicUsize::new(0)));
    let raw = rt.instantiate(&boxed, &[]).unwrap();
    let dynamic = rt.instantiate(&boxed, &[TypeId::DYNAMIC]).unwrap();
    assert!(Arc::ptr_eq(&raw, &dynamic));
    assert_eq!(rt.type_name(raw.type_id()), "Box<dynamic>");
}

#[test]
fn test_wrong_arity_rejected() {
    let rt = Runtime::new();
    let boxed = define_box(&rt, Arc::new(AtomicUsize::new(0)));
    let err = rt.instantiate(&boxed, &[TypeId::INT, TypeId::INT]).unwrap_err();
    assert!(matches!(err, RuntimeError::Registry(_)));
}

// ===== Subtyping =====

#[test]
fn test_instantiations_are_covariant() {
    let rt = Runtime::new();
    let boxed = define_box(&rt, Arc::new(AtomicUsize::new(0)));
    let box_int = rt.instantiate(&boxed, &[TypeId::INT]).unwrap();
    let box_num = rt.instantiate(&boxed, &[TypeId::NUM]).unwrap();
    let box_string = rt.instantiate(&boxed, &[TypeId::STRING]).unwrap();
    let box_dynamic = rt.instantiate(&boxed, &[]).unwrap();

    assert!(rt.is_subtype(box_int.type_id(), box_num.type_id()));
    assert!(!rt.is_subtype(box_num.type_id(), box_int.type_id()));
    assert!(!rt.is_subtype(box_string.type_id(), box_num.type_id()));
    assert!(rt.is_subtype(box_string.type_id(), box_dynamic.type_id()));
}

#[test]
fn test_subclass_of_instantiation() {
    let rt = Runtime::new();
    let boxed = define_box(&rt, Arc::new(AtomicUsize::new(0)));
    let box_int = rt.instantiate(&boxed, &[TypeId::INT]).unwrap();
    let box_num = rt.instantiate(&boxed, &[TypeId::NUM]).unwrap();
    let counter = ClassBuilder::new("app", "Counter")
        .extends(&box_int)
        .method("increment", |rt, inv| {
            let current = rt.dload(&inv.this, "value")?;
            let next = rt.dsend(&current, "+", Args::one(Value::int(1)))?;
            rt.dput(&inv.this, "value", next)
        })
        .build(&rt)
        .unwrap();

    let c = rt.construct(&counter, vec![("value", Value::int(41))]).unwrap();
    assert_eq!(rt.dsend(&c, "increment", Args::none()).unwrap(), Value::int(42));
    assert_eq!(rt.dsend(&c, "get", Args::none()).unwrap(), Value::int(42));
    assert!(rt.is_(&c, box_int.type_id()));
    assert!(rt.is_(&c, box_num.type_id()));
    assert!(rt.dput(&c, "value", Value::string("nope")).is_err());
}

// ===== Type Tests =====

#[test]
fn test_is_and_as() {
    let rt = Runtime::new();
    let boxed = define_box(&rt, Arc::new(AtomicUsize::new(0)));
    let box_int = rt.instantiate(&boxed, &[TypeId::INT]).unwrap();
    let box_string = rt.instantiate(&boxed, &[TypeId::STRING]).unwrap();
    let b = rt.construct(&box_int, vec![("value", Value::int(1))]).unwrap();

    assert!(rt.is_(&b, box_int.type_id()));
    assert!(!rt.is_(&b, box_string.type_id()));
    assert!(rt.as_(b.clone(), box_int.type_id()).is_ok());

    let err = rt.as_(b, box_string.type_id()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "CastError: Box<int> is not a subtype of Box<String> in type cast"
    );

    assert!(rt.as_(Value::Null, box_string.type_id()).is_ok());
    assert!(!rt.is_(&Value::Null, box_string.type_id()));
    assert!(rt.is_(&Value::Null, TypeId::OBJECT));
}

#[test]
fn test_checked_mode_field_stores() {
    let rt = Runtime::new();
    let boxed = define_box(&rt, Arc::new(AtomicUsize::new(0)));
    let box_int = rt.instantiate(&boxed, &[TypeId::INT]).unwrap();

    let err = rt.construct(&box_int, vec![("value", Value::string("x"))]).unwrap_err();
    assert_eq!(err.kind(), "TypeError");
    assert!(rt.check(Value::double(1.5), TypeId::INT).is_err());
    assert!(rt.check(Value::Null, TypeId::INT).is_ok());
}

#[test]
fn test_production_mode_skips_implicit_checks() {
    let rt = Runtime::with_options(RuntimeOptions::production());
    let boxed = define_box(&rt, Arc::new(AtomicUsize::new(0)));
    let box_int = rt.instantiate(&boxed, &[TypeId::INT]).unwrap();
    let box_string = rt.instantiate(&boxed, &[TypeId::STRING]).unwrap();

    let b = rt.construct(&box_int, vec![("value", Value::string("x"))]).unwrap();
    assert_eq!(rt.dload(&b, "value").unwrap(), Value::string("x"));
    assert!(rt.check(Value::double(1.5), TypeId::INT).is_ok());
    assert!(rt.as_(b, box_string.type_id()).is_err());
}

// ===== Core Generics =====

#[test]
fn test_core_collection_types() {
    let rt = Runtime::new();
    let ints = rt.new_list(TypeId::INT, vec![Value::int(1), Value::int(2)]).unwrap();
    let list_int = rt.list_type(TypeId::INT).unwrap();
    let list_num = rt.list_type(TypeId::NUM).unwrap();
    let iterable_int = rt.instantiate(&rt.core().iterable, &[TypeId::INT]).unwrap();

    assert_eq!(rt.runtime_type(&ints), list_int);
    assert_eq!(rt.list_type(TypeId::INT).unwrap(), list_int);
    assert!(rt.is_(&ints, list_num));
    assert!(rt.is_(&ints, iterable_int));
    assert_eq!(rt.type_name(list_int), "List<int>");

    assert!(rt.dsend(&ints, "add", Args::one(Value::string("three"))).is_err());
    rt.dsend(&ints, "add", Args::one(Value::int(3))).unwrap();
    assert_eq!(rt.to_dart_string(&ints).unwrap(), "[1, 2, 3]");
}
