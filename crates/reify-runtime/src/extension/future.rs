//! `Future` members

use super::{arg, wrong_receiver, ExtensionTable, NativeKind};
use crate::async_support::FutureRef;
use crate::error::RtResult;
use crate::value::Value;

fn receiver<'a>(this: &'a Value, member: &str) -> RtResult<&'a FutureRef> {
    match this {
        Value::Future(future) => Ok(future),
        other => Err(wrong_receiver(member, other)),
    }
}

pub(super) fn install(table: &mut ExtensionTable) {
    table.method(NativeKind::Future, "then", |rt, this, args| {
        let future = receiver(this, "then")?;
        let on_error = args.named.get("onError").filter(|v| !v.is_null()).cloned();
        rt.then(future, arg(&args, 0), on_error)
    });
    table.method(NativeKind::Future, "catchError", |rt, this, args| {
        rt.catch_error(receiver(this, "catchError")?, arg(&args, 0))
    });
}
