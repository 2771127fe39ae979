//! Members every value has, plus `bool` operators and `Function.call`

use super::{arg, wrong_receiver, ExtensionTable, NativeKind};
use crate::error::RuntimeError;
use crate::value::Value;

pub(super) fn install(table: &mut ExtensionTable) {
    table.method(NativeKind::Object, "toString", |rt, this, _| {
        Ok(Value::string(rt.to_dart_string(this)?))
    });
    table.method(NativeKind::Object, "==", |rt, this, args| {
        Ok(Value::Bool(rt.equals(this, &arg(&args, 0))?))
    });
    table.getter(NativeKind::Object, "hashCode", |rt, this| Ok(Value::int(rt.hash_code(this)?)));
    table.getter(NativeKind::Object, "runtimeType", |rt, this| {
        Ok(Value::Type(rt.runtime_type(this)))
    });

    let ops: [(&'static str, fn(bool, bool) -> bool); 3] = [
        ("&", |a, b| a && b),
        ("|", |a, b| a || b),
        ("^", |a, b| a != b),
    ];
    for (name, op) in ops {
        table.method(NativeKind::Bool, name, move |_, this, args| {
            match (this, arg(&args, 0)) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(op(*a, b))),
                (Value::Bool(_), other) => Err(RuntimeError::Argument(format!(
                    "bool {}: expected a bool, got {}",
                    name,
                    other.variant_name()
                ))),
                (receiver, _) => Err(wrong_receiver(name, receiver)),
            }
        });
    }

    table.method(NativeKind::Function, "call", |rt, this, args| rt.dcall(this, args));
}
