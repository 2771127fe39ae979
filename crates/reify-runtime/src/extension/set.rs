//! `Set` members

use super::{arg, wrong_receiver, ExtensionTable, NativeKind};
use crate::collections::SetRef;
use crate::error::RtResult;
use crate::value::Value;

fn receiver<'a>(this: &'a Value, member: &str) -> RtResult<&'a SetRef> {
    match this {
        Value::Set(set) => Ok(set),
        other => Err(wrong_receiver(member, other)),
    }
}

pub(super) fn install(table: &mut ExtensionTable) {
    table.method(NativeKind::Set, "add", |rt, this, args| {
        let set = receiver(this, "add")?;
        let value = rt.check(arg(&args, 0), set.elem())?;
        Ok(Value::Bool(set.add(value)))
    });
    table.method(NativeKind::Set, "remove", |_, this, args| {
        Ok(Value::Bool(receiver(this, "remove")?.remove(&arg(&args, 0))))
    });
    table.method(NativeKind::Set, "contains", |_, this, args| {
        Ok(Value::Bool(receiver(this, "contains")?.contains(&arg(&args, 0))))
    });
    table.method(NativeKind::Set, "clear", |_, this, _| {
        receiver(this, "clear")?.clear();
        Ok(Value::Null)
    });
}
