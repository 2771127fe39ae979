//! Members shared by every iterable (lists, sets, lazy `sync*` iterables)
//! and the `Sizable` getters

use super::string::utf16_len;
use super::{arg, int_arg, wrong_receiver, Capability, ExtensionTable, NativeKind};
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::function::Args;
use crate::value::Value;
use reify_types::TypeId;

/// Element type of an iterable value
pub(super) fn element_type(value: &Value) -> TypeId {
    match value {
        Value::List(list) => list.elem(),
        Value::Set(set) => set.elem(),
        Value::Iterable(iterable) => iterable.elem_ty(),
        _ => TypeId::DYNAMIC,
    }
}

/// Every element of an iterable value
pub(super) fn elements(rt: &Runtime, value: &Value) -> RtResult<Vec<Value>> {
    rt.iterate(value)?.collect()
}

fn predicate(rt: &Runtime, f: &Value, item: Value) -> RtResult<bool> {
    let result = rt.dcall(f, Args::one(item))?;
    result.as_bool().ok_or_else(|| RuntimeError::Type {
        actual: rt.value_type_name(&result),
        expected: "bool".to_string(),
    })
}

fn length(rt: &Runtime, this: &Value) -> RtResult<usize> {
    Ok(match this {
        Value::List(list) => list.len(),
        Value::Map(map) => map.len(),
        Value::Set(set) => set.len(),
        Value::Str(s) => utf16_len(s),
        Value::Iterable(_) => rt.iterate(this)?.try_fold(0usize, |n, item| item.map(|_| n + 1))?,
        other => return Err(wrong_receiver("length", other)),
    })
}

fn no_element() -> RuntimeError {
    RuntimeError::State("No element".to_string())
}

pub(super) fn install(table: &mut ExtensionTable) {
    table.capability_getter(Capability::Sizable, "length", |rt, this| {
        Ok(Value::int(length(rt, this)? as i64))
    });
    table.capability_getter(Capability::Sizable, "isEmpty", |rt, this| {
        let empty = match this {
            Value::Iterable(_) => rt.iterate(this)?.next().transpose()?.is_none(),
            _ => length(rt, this)? == 0,
        };
        Ok(Value::Bool(empty))
    });
    table.capability_getter(Capability::Sizable, "isNotEmpty", |rt, this| {
        let empty = rt.dload(this, "isEmpty")?;
        Ok(Value::Bool(empty.as_bool() == Some(false)))
    });

    table.getter(NativeKind::Iterable, "first", |rt, this| {
        rt.iterate(this)?.next().transpose()?.ok_or_else(no_element)
    });
    table.getter(NativeKind::Iterable, "last", |rt, this| {
        elements(rt, this)?.pop().ok_or_else(no_element)
    });
    table.getter(NativeKind::Iterable, "single", |rt, this| {
        let mut iter = rt.iterate(this)?;
        let first = iter.next().transpose()?.ok_or_else(no_element)?;
        if iter.next().transpose()?.is_some() {
            return Err(RuntimeError::State("Too many elements".to_string()));
        }
        Ok(first)
    });
    table.method(NativeKind::Iterable, "contains", |rt, this, args| {
        let needle = arg(&args, 0);
        for item in rt.iterate(this)? {
            if rt.equals(&item?, &needle)? {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    });
    table.method(NativeKind::Iterable, "elementAt", |rt, this, args| {
        let index = int_arg(&args, 0, "elementAt")?;
        if index >= 0 {
            if let Some(item) = rt.iterate(this)?.nth(index as usize) {
                return item;
            }
        }
        Err(RuntimeError::Range(format!("Index out of range: {}", index)))
    });
    table.method(NativeKind::Iterable, "join", |rt, this, args| {
        let separator = match arg(&args, 0) {
            Value::Null => String::new(),
            Value::Str(s) => s.to_string(),
            other => {
                return Err(RuntimeError::Argument(format!(
                    "join: expected a String, got {}",
                    other.variant_name()
                )))
            }
        };
        let parts = elements(rt, this)?
            .iter()
            .map(|item| rt.to_dart_string(item))
            .collect::<RtResult<Vec<_>>>()?;
        Ok(Value::string(parts.join(&separator)))
    });
    table.method(NativeKind::Iterable, "toList", |rt, this, _| {
        rt.new_list(element_type(this), elements(rt, this)?)
    });
    table.method(NativeKind::Iterable, "toSet", |rt, this, _| {
        rt.new_set(element_type(this), elements(rt, this)?)
    });
    table.method(NativeKind::Iterable, "forEach", |rt, this, args| {
        let f = arg(&args, 0);
        for item in rt.iterate(this)? {
            rt.dcall(&f, Args::one(item?))?;
        }
        Ok(Value::Null)
    });
    table.method(NativeKind::Iterable, "map", |rt, this, args| {
        let f = arg(&args, 0);
        let mapped = rt
            .iterate(this)?
            .map(|item| rt.dcall(&f, Args::one(item?)))
            .collect::<RtResult<Vec<_>>>()?;
        rt.new_list(TypeId::DYNAMIC, mapped)
    });
    table.method(NativeKind::Iterable, "where", |rt, this, args| {
        let f = arg(&args, 0);
        let mut kept = Vec::new();
        for item in rt.iterate(this)? {
            let item = item?;
            if predicate(rt, &f, item.clone())? {
                kept.push(item);
            }
        }
        rt.new_list(element_type(this), kept)
    });
    table.method(NativeKind::Iterable, "any", |rt, this, args| {
        let f = arg(&args, 0);
        for item in rt.iterate(this)? {
            if predicate(rt, &f, item?)? {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    });
    table.method(NativeKind::Iterable, "every", |rt, this, args| {
        let f = arg(&args, 0);
        for item in rt.iterate(this)? {
            if !predicate(rt, &f, item?)? {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    });
    table.method(NativeKind::Iterable, "fold", |rt, this, args| {
        let f = arg(&args, 1);
        let mut acc = arg(&args, 0);
        for item in rt.iterate(this)? {
            acc = rt.dcall(&f, Args::positional(vec![acc, item?]))?;
        }
        Ok(acc)
    });
    table.method(NativeKind::Iterable, "skip", |rt, this, args| {
        let count = int_arg(&args, 0, "skip")?;
        if count < 0 {
            return Err(RuntimeError::Range(format!("skip: negative count {}", count)));
        }
        let items = rt.iterate(this)?.skip(count as usize).collect::<RtResult<Vec<_>>>()?;
        rt.new_list(element_type(this), items)
    });
    table.method(NativeKind::Iterable, "take", |rt, this, args| {
        let count = int_arg(&args, 0, "take")?;
        if count < 0 {
            return Err(RuntimeError::Range(format!("take: negative count {}", count)));
        }
        let items = rt.iterate(this)?.take(count as usize).collect::<RtResult<Vec<_>>>()?;
        rt.new_list(element_type(this), items)
    });
}
