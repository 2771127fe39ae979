//! Dynamic call sites
//!
//! These helpers are what compiled code calls when the static type of a
//! receiver is `dynamic`. Instances resolve members through their class
//! chain; native values resolve through the extension table; anything
//! left unresolved fails with `NoSuchMethodError`.
//!
//! `null` answers only `==`, `hashCode`, `toString` and `runtimeType`.

use crate::class::{find_method, GetTarget, ObjectRef, SetTarget};
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::extension::{Access, ExtMethod, Resolved};
use crate::function::Args;
use crate::value::Value;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Members a null receiver answers
const NULL_MEMBERS: [&str; 4] = ["==", "hashCode", "toString", "runtimeType"];

fn null_error(member: &str) -> RuntimeError {
    RuntimeError::no_such_method(member, "null")
}

impl Runtime {
    /// Property read (`dart.dload`)
    pub fn dload(&self, receiver: &Value, name: &str) -> RtResult<Value> {
        match receiver {
            Value::Null if !NULL_MEMBERS.contains(&name) => return Err(null_error(name)),
            Value::Object(instance) => match instance.class().lookup_get(name) {
                Some(GetTarget::Field(field)) => return Ok(instance.field(&field.name).unwrap_or_default()),
                Some(GetTarget::Getter(getter)) => return getter(self, receiver),
                Some(GetTarget::Method(method)) => return Ok(Value::Function(Arc::new(method.bind(receiver.clone())))),
                None => {}
            },
            _ => {}
        }
        match self.resolve_extension(name, receiver, Access::Get)? {
            Resolved::Getter(getter) => getter(self, receiver),
            Resolved::Method(method) => Ok(self.extension_tear_off(receiver, name, method)),
            Resolved::Setter(_) => Err(RuntimeError::no_such_method(name, self.value_type_name(receiver))),
        }
    }

    /// Property write (`dart.dput`); returns the stored value
    pub fn dput(&self, receiver: &Value, name: &str, value: Value) -> RtResult<Value> {
        match receiver {
            Value::Null => return Err(null_error(&format!("{}=", name))),
            Value::Object(instance) => match instance.class().lookup_set(name) {
                Some(SetTarget::Field(field)) => {
                    let value = self.check(value, field.ty)?;
                    instance.set_field(&field.name, value.clone())?;
                    return Ok(value);
                }
                Some(SetTarget::Setter(setter)) => {
                    setter(self, receiver, value.clone())?;
                    return Ok(value);
                }
                None => {}
            },
            _ => {}
        }
        match self.resolve_extension(name, receiver, Access::Set)? {
            Resolved::Setter(setter) => {
                setter(self, receiver, value.clone())?;
                Ok(value)
            }
            _ => Err(RuntimeError::no_such_method(
                format!("{}=", name),
                self.value_type_name(receiver),
            )),
        }
    }

    /// Method call (`dart.dsend`)
    ///
    /// A field or getter whose value is callable is read and then called.
    pub fn dsend(&self, receiver: &Value, name: &str, args: Args) -> RtResult<Value> {
        match receiver {
            Value::Null if !NULL_MEMBERS.contains(&name) => return Err(null_error(name)),
            Value::Object(instance) => {
                if let Some(target) = instance.class().lookup_get(name) {
                    return self.send_to_instance(instance, receiver, name, target, args);
                }
            }
            _ => {}
        }
        match self.resolve_extension(name, receiver, Access::Invoke)? {
            Resolved::Method(method) => method(self, receiver, args),
            Resolved::Getter(getter) => {
                let callee = getter(self, receiver)?;
                self.dcall(&callee, args)
            }
            Resolved::Setter(_) => Err(RuntimeError::no_such_method(name, self.value_type_name(receiver))),
        }
    }

    fn send_to_instance(
        &self,
        instance: &ObjectRef,
        receiver: &Value,
        name: &str,
        target: GetTarget,
        args: Args,
    ) -> RtResult<Value> {
        match target {
            GetTarget::Method(_) => match find_method(instance.class(), name) {
                Some((holder, method)) => self.invoke_function(&method, receiver.clone(), args, Some(holder)),
                None => Err(RuntimeError::no_such_method(name, instance.class().name())),
            },
            GetTarget::Field(_) | GetTarget::Getter(_) => {
                let callee = self.dload(receiver, name)?;
                self.dcall(&callee, args)
            }
        }
    }

    /// Call a function value (`dart.dcall`)
    ///
    /// Instances are callable when their class declares `call`.
    pub fn dcall(&self, callee: &Value, args: Args) -> RtResult<Value> {
        match callee {
            Value::Function(func) => self.invoke_function(func, func.bound_this().clone(), args, None),
            Value::Object(instance) => match find_method(instance.class(), "call") {
                Some((holder, method)) => self.invoke_function(&method, callee.clone(), args, Some(holder)),
                None => Err(RuntimeError::no_such_method("call", self.value_type_name(callee))),
            },
            other => Err(RuntimeError::no_such_method("call", self.value_type_name(other))),
        }
    }

    /// Index read (`dart.dindex`)
    pub fn dindex(&self, receiver: &Value, index: Value) -> RtResult<Value> {
        self.dsend(receiver, "[]", Args::one(index))
    }

    /// Index write (`dart.dsetindex`); returns the stored value
    pub fn dsetindex(&self, receiver: &Value, index: Value, value: Value) -> RtResult<Value> {
        self.dsend(receiver, "[]=", Args::positional(vec![index, value.clone()]))?;
        Ok(value)
    }

    fn extension_tear_off(&self, receiver: &Value, name: &str, method: ExtMethod) -> Value {
        let this = receiver.clone();
        self.closure(name, move |rt, invocation| method(rt, &this, invocation.into_args()))
    }

    /// `a == b` with user `operator ==` on instances
    pub fn equals(&self, a: &Value, b: &Value) -> RtResult<bool> {
        match a {
            Value::Null => Ok(b.is_null()),
            Value::Object(instance) => match find_method(instance.class(), "==") {
                Some((holder, method)) if !b.is_null() => {
                    let result = self.invoke_function(&method, a.clone(), Args::one(b.clone()), Some(holder))?;
                    result.as_bool().ok_or_else(|| RuntimeError::Type {
                        actual: self.value_type_name(&result),
                        expected: "bool".to_string(),
                    })
                }
                _ => Ok(a.identical(b)),
            },
            _ => Ok(a == b),
        }
    }

    /// `hashCode`, consistent with [`Runtime::equals`] for native values
    pub fn hash_code(&self, value: &Value) -> RtResult<i64> {
        if let Value::Object(instance) = value {
            if let Some(GetTarget::Getter(getter)) = instance.class().lookup_get("hashCode") {
                let result = getter(self, value)?;
                return result.as_i64().ok_or_else(|| RuntimeError::Type {
                    actual: self.value_type_name(&result),
                    expected: "int".to_string(),
                });
            }
        }
        Ok(self.identity_hash(value))
    }

    /// `Object.hashCode` ignoring any user override
    pub(crate) fn identity_hash(&self, value: &Value) -> i64 {
        if value.is_null() {
            return 0;
        }
        let mut hasher = FxHasher::default();
        value.key().hash(&mut hasher);
        (hasher.finish() & 0x3fff_ffff) as i64
    }

    /// String conversion used by `toString` and interpolation (`dart.str`)
    pub fn to_dart_string(&self, value: &Value) -> RtResult<String> {
        let mut active = Vec::new();
        self.render(value, &mut active)
    }

    fn render(&self, value: &Value, active: &mut Vec<usize>) -> RtResult<String> {
        if let Some(address) = value.ref_address() {
            if active.contains(&address) {
                return Ok(match value {
                    Value::List(_) => "[...]",
                    Value::Map(_) | Value::Set(_) => "{...}",
                    _ => "...",
                }
                .to_string());
            }
            active.push(address);
            let rendered = self.render_reference(value, active);
            active.pop();
            return rendered;
        }
        Ok(match value {
            Value::Type(ty) => self.type_name(*ty),
            other => other.to_string(),
        })
    }

    fn render_reference(&self, value: &Value, active: &mut Vec<usize>) -> RtResult<String> {
        let join = |items: Vec<Value>, active: &mut Vec<usize>| -> RtResult<String> {
            let parts = items
                .iter()
                .map(|item| self.render(item, active))
                .collect::<RtResult<Vec<_>>>()?;
            Ok(parts.join(", "))
        };
        Ok(match value {
            Value::Object(instance) => match find_method(instance.class(), "toString") {
                Some((holder, method)) => {
                    let result = self.invoke_function(&method, value.clone(), Args::none(), Some(holder))?;
                    match result {
                        Value::Str(s) => s.to_string(),
                        other => {
                            return Err(RuntimeError::Type {
                                actual: self.value_type_name(&other),
                                expected: "String".to_string(),
                            })
                        }
                    }
                }
                None => format!("Instance of '{}'", instance.class().name()),
            },
            Value::List(list) => format!("[{}]", join(list.snapshot(), active)?),
            Value::Set(set) => format!("{{{}}}", join(set.snapshot(), active)?),
            Value::Map(map) => {
                let mut parts = Vec::with_capacity(map.len());
                for (key, entry) in map.entries() {
                    parts.push(format!("{}: {}", self.render(&key, active)?, self.render(&entry, active)?));
                }
                format!("{{{}}}", parts.join(", "))
            }
            Value::Iterable(_) => {
                let items = self.iterate(value)?.collect::<RtResult<Vec<_>>>()?;
                format!("({})", join(items, active)?)
            }
            Value::Function(_) => format!("Closure: {}", self.value_type_name(value)),
            other => format!("Instance of '{}'", self.value_type_name(other)),
        })
    }

    /// Checked-mode `assert` (`dart.assert`)
    pub fn assert_(&self, condition: &Value, message: Option<&str>) -> RtResult<()> {
        if !self.checked_mode() {
            return Ok(());
        }
        match condition {
            Value::Bool(true) => Ok(()),
            Value::Bool(false) => Err(RuntimeError::Assertion(
                message.unwrap_or("Assertion failed").to_string(),
            )),
            other => Err(RuntimeError::Type {
                actual: self.value_type_name(other),
                expected: "bool".to_string(),
            }),
        }
    }

    /// Null check (`dart.notNull`)
    pub fn not_null(&self, value: Value) -> RtResult<Value> {
        match value {
            Value::Null => Err(null_error("notNull")),
            other => Ok(other),
        }
    }

    /// `throw value` (`dart.throw`)
    pub fn throw_<T>(&self, value: Value) -> RtResult<T> {
        tracing::trace!(value = %value, "throw");
        Err(RuntimeError::Thrown(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::options::RuntimeOptions;
    use reify_types::TypeId;

    #[test]
    fn test_null_semantics() {
        let rt = Runtime::new();
        let null = Value::Null;
        assert_eq!(rt.dsend(&null, "toString", Args::none()).unwrap(), Value::string("null"));
        assert_eq!(rt.dload(&null, "hashCode").unwrap(), Value::int(0));
        assert_eq!(rt.dsend(&null, "==", Args::one(Value::Null)).unwrap(), Value::Bool(true));
        assert_eq!(rt.dsend(&null, "==", Args::one(Value::int(0))).unwrap(), Value::Bool(false));
        assert_eq!(rt.dload(&null, "runtimeType").unwrap(), Value::Type(TypeId::NULL));

        for err in [
            rt.dsend(&null, "foo", Args::none()).unwrap_err(),
            rt.dload(&null, "length").unwrap_err(),
            rt.dput(&null, "x", Value::int(1)).unwrap_err(),
            rt.dindex(&null, Value::int(0)).unwrap_err(),
            rt.dcall(&null, Args::none()).unwrap_err(),
        ] {
            assert!(matches!(err, RuntimeError::NoSuchMethod { ref receiver, .. } if receiver == "null"));
        }
    }

    #[test]
    fn test_fields_and_tear_offs() {
        let rt = Runtime::new();
        let class = ClassBuilder::new("app", "Counter")
            .field("count", TypeId::INT)
            .method("next", |rt, inv| {
                let count = rt.dload(&inv.this, "count")?;
                let next = rt.dsend(&count, "+", Args::one(Value::int(1)))?;
                rt.dput(&inv.this, "count", next)
            })
            .build(&rt)
            .unwrap();
        let counter = rt.construct(&class, vec![("count", Value::int(0))]).unwrap();

        assert_eq!(rt.dsend(&counter, "next", Args::none()).unwrap(), Value::int(1));
        let next = rt.dload(&counter, "next").unwrap();
        assert_eq!(rt.dcall(&next, Args::none()).unwrap(), Value::int(2));
        assert_eq!(rt.dload(&counter, "count").unwrap(), Value::int(2));

        let err = rt.dput(&counter, "count", Value::string("x")).unwrap_err();
        assert!(matches!(err, RuntimeError::Type { .. }));
        let err = rt.dput(&counter, "missing", Value::int(1)).unwrap_err();
        assert!(matches!(err, RuntimeError::NoSuchMethod { ref member, .. } if member == "missing="));
        let err = rt.dsend(&counter, "missing", Args::none()).unwrap_err();
        assert_eq!(err.kind(), "NoSuchMethodError");
    }

    #[test]
    fn test_production_mode_skips_field_checks() {
        let rt = Runtime::with_options(RuntimeOptions::production());
        let class = ClassBuilder::new("app", "Loose")
            .field("n", TypeId::INT)
            .build(&rt)
            .unwrap();
        let object = rt.construct(&class, vec![]).unwrap();
        assert_eq!(rt.dput(&object, "n", Value::string("s")).unwrap(), Value::string("s"));
    }

    #[test]
    fn test_callable_field_is_invoked() {
        let rt = Runtime::new();
        let class = ClassBuilder::new("app", "Holder")
            .field("callback", TypeId::DYNAMIC)
            .build(&rt)
            .unwrap();
        let callback = rt.closure("callback", |_, inv| Ok(inv.arg(0)));
        let holder = rt.construct(&class, vec![("callback", callback)]).unwrap();
        assert_eq!(
            rt.dsend(&holder, "callback", Args::one(Value::int(9))).unwrap(),
            Value::int(9)
        );
    }

    #[test]
    fn test_callable_instance() {
        let rt = Runtime::new();
        let class = ClassBuilder::new("app", "Adder")
            .method("call", |rt, inv| rt.dsend(&inv.arg(0), "+", Args::one(inv.arg(1))))
            .build(&rt)
            .unwrap();
        let adder = rt.construct(&class, vec![]).unwrap();
        let sum = rt.dcall(&adder, Args::positional(vec![Value::int(2), Value::int(3)])).unwrap();
        assert_eq!(sum, Value::int(5));
        let err = rt.dcall(&Value::int(1), Args::none()).unwrap_err();
        assert!(matches!(err, RuntimeError::NoSuchMethod { ref member, .. } if member == "call"));
    }

    #[test]
    fn test_extension_tear_off() {
        let rt = Runtime::new();
        let list = rt.new_list(TypeId::INT, vec![]).unwrap();
        let add = rt.dload(&list, "add").unwrap();
        rt.dcall(&add, Args::one(Value::int(4))).unwrap();
        assert_eq!(rt.to_dart_string(&list).unwrap(), "[4]");
    }

    #[test]
    fn test_user_equality_and_to_string() {
        let rt = Runtime::new();
        let class = ClassBuilder::new("app", "Id")
            .field("v", TypeId::INT)
            .method("==", |rt, inv| {
                let other = inv.arg(0);
                if !matches!(other, Value::Object(_)) {
                    return Ok(Value::Bool(false));
                }
                let a = rt.dload(&inv.this, "v")?;
                let b = rt.dload(&other, "v")?;
                Ok(Value::Bool(rt.equals(&a, &b)?))
            })
            .getter("hashCode", |rt, this| rt.dload(this, "v"))
            .method("toString", |rt, inv| {
                let v = rt.dload(&inv.this, "v")?;
                Ok(Value::string(format!("Id({})", rt.to_dart_string(&v)?)))
            })
            .build(&rt)
            .unwrap();
        let a = rt.construct(&class, vec![("v", Value::int(1))]).unwrap();
        let b = rt.construct(&class, vec![("v", Value::int(1))]).unwrap();
        assert!(rt.equals(&a, &b).unwrap());
        assert!(!rt.equals(&a, &Value::Null).unwrap());
        assert_eq!(rt.hash_code(&a).unwrap(), 1);
        assert_eq!(rt.to_dart_string(&a).unwrap(), "Id(1)");

        let list = rt.new_list(TypeId::DYNAMIC, vec![a, Value::Null]).unwrap();
        assert_eq!(rt.to_dart_string(&list).unwrap(), "[Id(1), null]");
    }

    #[test]
    fn test_default_instance_string_and_cycles() {
        let rt = Runtime::new();
        let class = ClassBuilder::new("app", "Plain").build(&rt).unwrap();
        let plain = rt.construct(&class, vec![]).unwrap();
        assert_eq!(rt.to_dart_string(&plain).unwrap(), "Instance of 'Plain'");

        let list = rt.new_list(TypeId::DYNAMIC, vec![]).unwrap();
        rt.dsend(&list, "add", Args::one(list.clone())).unwrap();
        assert_eq!(rt.to_dart_string(&list).unwrap(), "[[...]]");
        assert_eq!(rt.to_dart_string(&Value::Type(TypeId::INT)).unwrap(), "int");
    }

    #[test]
    fn test_hash_code_consistent_with_equals() {
        let rt = Runtime::new();
        assert_eq!(
            rt.hash_code(&Value::int(3)).unwrap(),
            rt.hash_code(&Value::double(3.0)).unwrap()
        );
        assert_eq!(
            rt.hash_code(&Value::string("ab")).unwrap(),
            rt.hash_code(&Value::string("ab")).unwrap()
        );
    }

    #[test]
    fn test_assert_not_null_throw() {
        let rt = Runtime::new();
        assert!(rt.assert_(&Value::Bool(true), None).is_ok());
        assert!(matches!(
            rt.assert_(&Value::Bool(false), Some("x > 0")),
            Err(RuntimeError::Assertion(ref m)) if m == "x > 0"
        ));
        let production = Runtime::with_options(RuntimeOptions::production());
        assert!(production.assert_(&Value::Bool(false), None).is_ok());

        assert_eq!(rt.not_null(Value::int(1)).unwrap(), Value::int(1));
        assert_eq!(rt.not_null(Value::Null).unwrap_err().kind(), "NoSuchMethodError");

        let err = rt.throw_::<()>(Value::string("oops")).unwrap_err();
        assert_eq!(err.thrown_value(), Some(&Value::string("oops")));
    }
}
