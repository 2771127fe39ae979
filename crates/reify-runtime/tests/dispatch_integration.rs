//! Dynamic Dispatch Integration Tests
//!
//! Tests validate:
//! - Member resolution on instances, inherited members and native values
//! - Null receiver semantics
//! - Runtime signatures, `Function.apply` and call-time defaults
//! - User-registered extension members
//!
//! # Running Tests
//! ```bash
//! cargo test --test dispatch_integration
//! ```

use reify_runtime::{
    Args, ClassBuilder, NativeKind, Runtime, RuntimeError, SignatureEntry, TypeId, Value,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

// ===== Instances =====

#[test]
fn test_inherited_members_and_overrides() {
    let rt = Runtime::new();
    let animal = ClassBuilder::new("zoo", "Animal")
        .field("name", TypeId::STRING)
        .method("speak", |_, _| Ok(Value::string("...")))
        .method("describe", |rt, inv| {
            let name = rt.dload(&inv.this, "name")?;
            let sound = rt.dsend(&inv.this, "speak", Args::none())?;
            Ok(Value::string(format!(
                "{} says {}",
                rt.to_dart_string(&name)?,
                rt.to_dart_string(&sound)?
            )))
        })
        .build(&rt)
        .unwrap();
    let dog = ClassBuilder::new("zoo", "Dog")
        .extends(&animal)
        .method("speak", |_, _| Ok(Value::string("woof")))
        .build(&rt)
        .unwrap();

    let rex = rt.construct(&dog, vec![("name", Value::string("Rex"))]).unwrap();
    assert_eq!(
        rt.dsend(&rex, "describe", Args::none()).unwrap(),
        Value::string("Rex says woof")
    );
    assert!(rt.is_(&rex, animal.type_id()));

    let generic = rt.construct(&animal, vec![("name", Value::string("It"))]).unwrap();
    assert!(!rt.is_(&generic, dog.type_id()));
}

#[test]
fn test_getters_and_setters() {
    let rt = Runtime::new();
    let temperature = ClassBuilder::new("app", "Temperature")
        .field("celsius", TypeId::NUM)
        .getter("fahrenheit", |rt, this| {
            let c = rt.dload(this, "celsius")?;
            let scaled = rt.dsend(&c, "*", Args::one(Value::double(1.8)))?;
            rt.dsend(&scaled, "+", Args::one(Value::int(32)))
        })
        .setter("fahrenheit", |rt, this, value| {
            let shifted = rt.dsend(&value, "-", Args::one(Value::int(32)))?;
            let c = rt.dsend(&shifted, "/", Args::one(Value::double(1.8)))?;
            rt.dput(this, "celsius", c)?;
            Ok(())
        })
        .build(&rt)
        .unwrap();

    let t = rt.construct(&temperature, vec![("celsius", Value::int(100))]).unwrap();
    assert_eq!(rt.dload(&t, "fahrenheit").unwrap(), Value::double(212.0));
    rt.dput(&t, "fahrenheit", Value::int(32)).unwrap();
    assert_eq!(rt.dload(&t, "celsius").unwrap(), Value::double(0.0));
}

#[test]
fn test_object_members_on_instances() {
    let rt = Runtime::new();
    let point = ClassBuilder::new("app", "Point").build(&rt).unwrap();
    let p = rt.construct(&point, vec![]).unwrap();

    assert_eq!(
        rt.dsend(&p, "toString", Args::none()).unwrap(),
        Value::string("Instance of 'Point'")
    );
    assert_eq!(rt.dload(&p, "runtimeType").unwrap(), Value::Type(point.type_id()));
    assert_eq!(rt.dsend(&p, "==", Args::one(p.clone())).unwrap(), Value::Bool(true));
    let err = rt.dsend(&p, "x", Args::none()).unwrap_err();
    assert_eq!(err.to_string(), "NoSuchMethodError: 'x' not found on Point");
}

// ===== Null =====

#[test]
fn test_null_receiver() {
    let rt = Runtime::new();
    assert_eq!(
        rt.dsend(&Value::Null, "toString", Args::none()).unwrap(),
        Value::string("null")
    );
    let err = rt.dsend(&Value::Null, "length", Args::none()).unwrap_err();
    assert!(matches!(err, RuntimeError::NoSuchMethod { ref receiver, .. } if receiver == "null"));
    assert!(err.to_string().contains("null"));
}

// ===== Native Values =====

#[test]
fn test_extension_dispatch_on_natives() {
    let rt = Runtime::new();
    let words = rt
        .new_list(TypeId::STRING, vec![Value::string("b"), Value::string("a")])
        .unwrap();
    let upper = rt.closure("upper", |rt, inv| rt.dsend(&inv.arg(0), "toUpperCase", Args::none()));
    let shouted = rt.dsend(&words, "map", Args::one(upper)).unwrap();
    assert_eq!(rt.to_dart_string(&shouted).unwrap(), "[B, A]");
    assert_eq!(rt.dload(&Value::string("héllo"), "length").unwrap(), Value::int(5));
    assert_eq!(
        rt.dsend(&Value::int(7), "compareTo", Args::one(Value::int(9))).unwrap(),
        Value::int(-1)
    );
}

#[test]
fn test_registered_extension_member() {
    let rt = Runtime::new();
    rt.register_extension(NativeKind::String, "shout", |rt, this, _| {
        let upper = rt.dsend(this, "toUpperCase", Args::none())?;
        rt.dsend(&upper, "+", Args::one(Value::string("!")))
    });
    assert_eq!(
        rt.dsend(&Value::string("hi"), "shout", Args::none()).unwrap(),
        Value::string("HI!")
    );
    assert!(rt.dsend(&Value::int(1), "shout", Args::none()).is_err());
}

// ===== Signatures =====

#[test]
fn test_apply_validates_against_signature() {
    let rt = Runtime::new();
    let repeat = rt.closure("repeat", |rt, inv| rt.dsend(&inv.arg(0), "*", Args::one(inv.arg(1))));
    rt.set_signature(
        &repeat,
        SignatureEntry::builder(TypeId::STRING)
            .required(TypeId::STRING)
            .optional(TypeId::INT, || Value::int(2))
            .build()
            .unwrap(),
    )
    .unwrap();

    assert_eq!(
        rt.apply(&repeat, vec![Value::string("ab")], BTreeMap::new()).unwrap(),
        Value::string("abab")
    );
    assert_eq!(
        rt.apply(&repeat, vec![Value::string("x"), Value::int(3)], BTreeMap::new())
            .unwrap(),
        Value::string("xxx")
    );

    let too_many = rt.apply(
        &repeat,
        vec![Value::string("x"), Value::int(1), Value::int(1)],
        BTreeMap::new(),
    );
    assert!(matches!(too_many, Err(RuntimeError::Argument(_))));
    let wrong_type = rt.apply(&repeat, vec![Value::int(1)], BTreeMap::new());
    assert!(matches!(wrong_type, Err(RuntimeError::Argument(_))));

    let mut named = BTreeMap::new();
    named.insert("times".to_string(), Value::int(1));
    let unknown_named = rt.apply(&repeat, vec![Value::string("x")], named);
    assert!(matches!(unknown_named, Err(RuntimeError::Argument(_))));

    let not_a_function = rt.apply(&Value::int(1), vec![], BTreeMap::new());
    assert!(matches!(not_a_function, Err(RuntimeError::NoSuchMethod { .. })));
}

#[test]
fn test_defaults_computed_at_call_time() {
    let rt = Runtime::new();
    let counter = Arc::new(AtomicI64::new(0));
    let next_id = counter.clone();
    let tag = rt.closure("tag", |_, inv| Ok(inv.named_arg("id")));
    rt.set_signature(
        &tag,
        SignatureEntry::builder(TypeId::INT)
            .named("id", TypeId::INT, move || Value::int(next_id.fetch_add(1, Ordering::SeqCst)))
            .build()
            .unwrap(),
    )
    .unwrap();

    assert_eq!(rt.dcall(&tag, Args::none()).unwrap(), Value::int(0));
    assert_eq!(rt.dcall(&tag, Args::none()).unwrap(), Value::int(1));
    assert_eq!(
        rt.dcall(&tag, Args::none().with_named("id", Value::int(40))).unwrap(),
        Value::int(40)
    );
    assert_eq!(rt.dcall(&tag, Args::none()).unwrap(), Value::int(2));
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn test_return_type_checked() {
    let rt = Runtime::new();
    let liar = rt.closure("liar", |_, _| Ok(Value::string("not an int")));
    rt.set_signature(&liar, SignatureEntry::builder(TypeId::INT).build().unwrap())
        .unwrap();
    let err = rt.dcall(&liar, Args::none()).unwrap_err();
    assert_eq!(err.kind(), "TypeError");
}

#[test]
fn test_signature_reflected_in_runtime_type() {
    let rt = Runtime::new();
    let f = rt.closure("f", |_, inv| Ok(inv.arg(0)));
    rt.set_signature(
        &f,
        SignatureEntry::builder(TypeId::INT).required(TypeId::INT).build().unwrap(),
    )
    .unwrap();

    let int_to_int = rt.definite_function_type(TypeId::INT, vec![TypeId::INT]);
    let string_to_int = rt.definite_function_type(TypeId::INT, vec![TypeId::STRING]);
    assert!(rt.is_(&f, int_to_int));
    assert!(!rt.is_(&f, string_to_int));
    assert!(rt.is_(&f, TypeId::FUNCTION));
}

#[test]
fn test_member_signature_applies_to_dsend() {
    let rt = Runtime::new();
    let scaler = ClassBuilder::new("app", "Scaler")
        .method("scale", |rt, inv| rt.dsend(&inv.arg(0), "*", Args::one(inv.named_arg("by"))))
        .build(&rt)
        .unwrap();
    rt.set_member_signature(
        &scaler,
        "scale",
        SignatureEntry::builder(TypeId::NUM)
            .required(TypeId::NUM)
            .named("by", TypeId::NUM, || Value::int(10))
            .build()
            .unwrap(),
    )
    .unwrap();

    let s = rt.construct(&scaler, vec![]).unwrap();
    assert_eq!(rt.dsend(&s, "scale", Args::one(Value::int(3))).unwrap(), Value::int(30));
    assert!(matches!(
        rt.dsend(&s, "scale", Args::none()),
        Err(RuntimeError::Argument(_))
    ));
}
