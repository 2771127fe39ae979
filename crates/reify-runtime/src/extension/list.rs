//! `List` members

use super::iterable::elements;
use super::{arg, int_arg, opt_int_arg, wrong_receiver, ExtensionTable, NativeKind};
use crate::collections::{Growability, ListRef};
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::value::Value;

fn receiver<'a>(this: &'a Value, member: &str) -> RtResult<&'a ListRef> {
    match this {
        Value::List(list) => Ok(list),
        other => Err(wrong_receiver(member, other)),
    }
}

/// Check an incoming element against the list's element type
fn element(rt: &Runtime, list: &ListRef, value: Value) -> RtResult<Value> {
    rt.check(value, list.elem())
}

pub(super) fn install(table: &mut ExtensionTable) {
    table.method(NativeKind::List, "[]", |_, this, args| {
        receiver(this, "[]")?.get(int_arg(&args, 0, "[]")?)
    });
    table.method(NativeKind::List, "[]=", |rt, this, args| {
        let list = receiver(this, "[]=")?;
        let index = int_arg(&args, 0, "[]=")?;
        let value = element(rt, list, arg(&args, 1))?;
        list.set(index, value)?;
        Ok(Value::Null)
    });
    table.setter(NativeKind::List, "length", |_, this, value| {
        let list = receiver(this, "length=")?;
        let len = value.as_i64().ok_or_else(|| {
            RuntimeError::Argument(format!("length=: expected an int, got {}", value.variant_name()))
        })?;
        list.set_len(len)
    });
    table.method(NativeKind::List, "add", |rt, this, args| {
        let list = receiver(this, "add")?;
        list.push(element(rt, list, arg(&args, 0))?)?;
        Ok(Value::Null)
    });
    table.method(NativeKind::List, "addAll", |rt, this, args| {
        let list = receiver(this, "addAll")?;
        if list.growability() != Growability::Growable {
            return Err(RuntimeError::Unsupported("Cannot add to a non-growable list".to_string()));
        }
        for item in elements(rt, &arg(&args, 0))? {
            list.push(element(rt, list, item)?)?;
        }
        Ok(Value::Null)
    });
    table.method(NativeKind::List, "insert", |rt, this, args| {
        let list = receiver(this, "insert")?;
        let index = int_arg(&args, 0, "insert")?;
        list.insert(index, element(rt, list, arg(&args, 1))?)?;
        Ok(Value::Null)
    });
    table.method(NativeKind::List, "removeAt", |_, this, args| {
        receiver(this, "removeAt")?.remove_at(int_arg(&args, 0, "removeAt")?)
    });
    table.method(NativeKind::List, "removeLast", |_, this, _| receiver(this, "removeLast")?.pop());
    table.method(NativeKind::List, "remove", |rt, this, args| {
        let list = receiver(this, "remove")?;
        let needle = arg(&args, 0);
        let items = list.snapshot();
        for (index, item) in items.iter().enumerate() {
            if rt.equals(item, &needle)? {
                list.remove_at(index as i64)?;
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    });
    table.method(NativeKind::List, "clear", |_, this, _| {
        receiver(this, "clear")?.clear()?;
        Ok(Value::Null)
    });
    table.method(NativeKind::List, "indexOf", |rt, this, args| {
        let list = receiver(this, "indexOf")?;
        let needle = arg(&args, 0);
        for (index, item) in list.snapshot().iter().enumerate() {
            if rt.equals(item, &needle)? {
                return Ok(Value::int(index as i64));
            }
        }
        Ok(Value::int(-1))
    });
    table.method(NativeKind::List, "sublist", |rt, this, args| {
        let list = receiver(this, "sublist")?;
        let items = list.snapshot();
        let start = int_arg(&args, 0, "sublist")?;
        let end = opt_int_arg(&args, 1, "sublist")?.unwrap_or(items.len() as i64);
        if start < 0 || start > end || end as usize > items.len() {
            return Err(RuntimeError::Range(format!(
                "Invalid range {}..{} for length {}",
                start,
                end,
                items.len()
            )));
        }
        rt.new_list(list.elem(), items[start as usize..end as usize].to_vec())
    });
    table.getter(NativeKind::List, "reversed", |rt, this| {
        let list = receiver(this, "reversed")?;
        let mut items = list.snapshot();
        items.reverse();
        rt.new_list(list.elem(), items)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Args;
    use reify_types::TypeId;

    #[test]
    fn test_index_and_store() {
        let rt = Runtime::new();
        let list = rt.new_list(TypeId::INT, vec![Value::int(1), Value::int(2)]).unwrap();
        assert_eq!(rt.dindex(&list, Value::int(1)).unwrap(), Value::int(2));
        rt.dsetindex(&list, Value::int(0), Value::int(9)).unwrap();
        assert_eq!(rt.to_dart_string(&list).unwrap(), "[9, 2]");
        assert!(matches!(rt.dindex(&list, Value::int(5)), Err(RuntimeError::Range(_))));
        assert!(matches!(
            rt.dsetindex(&list, Value::int(0), Value::string("x")),
            Err(RuntimeError::Type { .. })
        ));
    }

    #[test]
    fn test_growth_members() {
        let rt = Runtime::new();
        let list = rt.new_list(TypeId::INT, vec![]).unwrap();
        rt.dsend(&list, "add", Args::one(Value::int(1))).unwrap();
        let more = rt.new_list(TypeId::INT, vec![Value::int(2), Value::int(3)]).unwrap();
        rt.dsend(&list, "addAll", Args::one(more)).unwrap();
        rt.dsend(&list, "insert", Args::positional(vec![Value::int(0), Value::int(0)]))
            .unwrap();
        assert_eq!(rt.to_dart_string(&list).unwrap(), "[0, 1, 2, 3]");

        assert_eq!(rt.dsend(&list, "removeLast", Args::none()).unwrap(), Value::int(3));
        assert_eq!(
            rt.dsend(&list, "remove", Args::one(Value::int(1))).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            rt.dsend(&list, "indexOf", Args::one(Value::int(2))).unwrap(),
            Value::int(1)
        );
        rt.dput(&list, "length", Value::int(3)).unwrap();
        assert_eq!(rt.to_dart_string(&list).unwrap(), "[0, 2, null]");
    }

    #[test]
    fn test_fixed_length_rejects_growth() {
        let rt = Runtime::new();
        let list = rt
            .new_list_with(TypeId::INT, vec![Value::int(1)], Growability::FixedLength)
            .unwrap();
        assert!(matches!(
            rt.dsend(&list, "add", Args::one(Value::int(2))),
            Err(RuntimeError::Unsupported(_))
        ));
        assert!(matches!(
            rt.dput(&list, "length", Value::int(0)),
            Err(RuntimeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_sublist_and_reversed() {
        let rt = Runtime::new();
        let list = rt
            .new_list(TypeId::INT, vec![Value::int(1), Value::int(2), Value::int(3)])
            .unwrap();
        let sub = rt.dsend(&list, "sublist", Args::one(Value::int(1))).unwrap();
        assert_eq!(rt.to_dart_string(&sub).unwrap(), "[2, 3]");
        let reversed = rt.dload(&list, "reversed").unwrap();
        assert_eq!(rt.to_dart_string(&reversed).unwrap(), "[3, 2, 1]");
        assert!(rt
            .dsend(&list, "sublist", Args::positional(vec![Value::int(2), Value::int(1)]))
            .is_err());
    }
}
