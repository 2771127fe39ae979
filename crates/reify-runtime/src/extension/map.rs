//! `Map` members

use super::{arg, wrong_receiver, ExtensionTable, NativeKind};
use crate::collections::MapRef;
use crate::error::{RtResult, RuntimeError};
use crate::function::Args;
use crate::value::Value;

fn receiver<'a>(this: &'a Value, member: &str) -> RtResult<&'a MapRef> {
    match this {
        Value::Map(map) => Ok(map),
        other => Err(wrong_receiver(member, other)),
    }
}

pub(super) fn install(table: &mut ExtensionTable) {
    table.method(NativeKind::Map, "[]", |_, this, args| {
        Ok(receiver(this, "[]")?.get(&arg(&args, 0)).unwrap_or_default())
    });
    table.method(NativeKind::Map, "[]=", |rt, this, args| {
        let map = receiver(this, "[]=")?;
        let key = rt.check(arg(&args, 0), map.key_ty())?;
        let value = rt.check(arg(&args, 1), map.value_ty())?;
        map.insert(key, value);
        Ok(Value::Null)
    });
    table.method(NativeKind::Map, "containsKey", |_, this, args| {
        Ok(Value::Bool(receiver(this, "containsKey")?.contains_key(&arg(&args, 0))))
    });
    table.method(NativeKind::Map, "containsValue", |rt, this, args| {
        let needle = arg(&args, 0);
        for (_, value) in receiver(this, "containsValue")?.entries() {
            if rt.equals(&value, &needle)? {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    });
    table.method(NativeKind::Map, "remove", |_, this, args| {
        Ok(receiver(this, "remove")?.remove(&arg(&args, 0)).unwrap_or_default())
    });
    table.method(NativeKind::Map, "clear", |_, this, _| {
        receiver(this, "clear")?.clear();
        Ok(Value::Null)
    });
    table.getter(NativeKind::Map, "keys", |rt, this| {
        let map = receiver(this, "keys")?;
        let keys = map.entries().into_iter().map(|(k, _)| k).collect();
        rt.new_list(map.key_ty(), keys)
    });
    table.getter(NativeKind::Map, "values", |rt, this| {
        let map = receiver(this, "values")?;
        let values = map.entries().into_iter().map(|(_, v)| v).collect();
        rt.new_list(map.value_ty(), values)
    });
    table.method(NativeKind::Map, "putIfAbsent", |rt, this, args| {
        let map = receiver(this, "putIfAbsent")?;
        let key = rt.check(arg(&args, 0), map.key_ty())?;
        if let Some(existing) = map.get(&key) {
            return Ok(existing);
        }
        // no lock is held while the callback runs
        let value = rt.check(rt.dcall(&arg(&args, 1), Args::none())?, map.value_ty())?;
        map.insert(key, value.clone());
        Ok(value)
    });
    table.method(NativeKind::Map, "addAll", |rt, this, args| {
        let map = receiver(this, "addAll")?;
        let Value::Map(other) = arg(&args, 0) else {
            return Err(RuntimeError::Argument("addAll: expected a Map".to_string()));
        };
        for (key, value) in other.entries() {
            map.insert(rt.check(key, map.key_ty())?, rt.check(value, map.value_ty())?);
        }
        Ok(Value::Null)
    });
    table.method(NativeKind::Map, "forEach", |rt, this, args| {
        let f = arg(&args, 0);
        for (key, value) in receiver(this, "forEach")?.entries() {
            rt.dcall(&f, Args::positional(vec![key, value]))?;
        }
        Ok(Value::Null)
    });
}
