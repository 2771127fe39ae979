//! `String` members; indices and lengths count UTF-16 code units
//!
//! Strings are stored as UTF-8, so a result that splits a surrogate pair
//! (`substring`, `[]`) replaces the unpaired half with U+FFFD.

use super::{int_arg, opt_int_arg, str_arg, wrong_receiver, ExtensionTable, NativeKind};
use crate::error::{check_index, check_length, RtResult, RuntimeError};
use crate::value::Value;
use reify_types::TypeId;
use std::sync::Arc;

fn receiver<'a>(this: &'a Value, member: &str) -> RtResult<&'a Arc<str>> {
    match this {
        Value::Str(s) => Ok(s),
        other => Err(wrong_receiver(member, other)),
    }
}

fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Lone surrogates become U+FFFD
fn from_units(units: &[u16]) -> Value {
    Value::string(String::from_utf16_lossy(units))
}

/// Validate `start..end` against a length, as `substring` does
fn check_range(start: i64, end: i64, len: usize) -> RtResult<(usize, usize)> {
    if start < 0 || start > end || end as usize > len {
        return Err(RuntimeError::Range(format!(
            "Invalid range {}..{} for length {}",
            start, end, len
        )));
    }
    Ok((start as usize, end as usize))
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

pub(super) fn install(table: &mut ExtensionTable) {
    table.method(NativeKind::String, "[]", |_, this, args| {
        let s = units(receiver(this, "[]")?);
        let index = check_index(int_arg(&args, 0, "[]")?, s.len())?;
        Ok(from_units(&s[index..index + 1]))
    });
    table.method(NativeKind::String, "codeUnitAt", |_, this, args| {
        let s = units(receiver(this, "codeUnitAt")?);
        let index = check_index(int_arg(&args, 0, "codeUnitAt")?, s.len())?;
        Ok(Value::int(i64::from(s[index])))
    });
    table.method(NativeKind::String, "+", |_, this, args| {
        let s = receiver(this, "+")?;
        let other = str_arg(&args, 0, "+")?;
        Ok(Value::string(format!("{}{}", s, other)))
    });
    table.method(NativeKind::String, "*", |_, this, args| {
        let s = receiver(this, "*")?;
        let times = int_arg(&args, 0, "*")?.max(0);
        let total = i64::try_from(s.len()).ok().and_then(|len| len.checked_mul(times));
        check_length(total, "String")?;
        Ok(Value::string(s.repeat(times as usize)))
    });
    table.method(NativeKind::String, "substring", |_, this, args| {
        let s = units(receiver(this, "substring")?);
        let start = int_arg(&args, 0, "substring")?;
        let end = opt_int_arg(&args, 1, "substring")?.unwrap_or(s.len() as i64);
        let (start, end) = check_range(start, end, s.len())?;
        Ok(from_units(&s[start..end]))
    });
    table.method(NativeKind::String, "indexOf", |_, this, args| {
        let s = units(receiver(this, "indexOf")?);
        let pattern = units(&str_arg(&args, 0, "indexOf")?);
        let start = opt_int_arg(&args, 1, "indexOf")?.unwrap_or(0);
        if start < 0 || start as usize > s.len() {
            return Err(RuntimeError::Range(format!("Invalid start {} for length {}", start, s.len())));
        }
        let found = find_units(&s, &pattern, start as usize);
        Ok(Value::int(found.map_or(-1, |i| i as i64)))
    });
    table.method(NativeKind::String, "contains", |_, this, args| {
        let s = receiver(this, "contains")?;
        Ok(Value::Bool(s.contains(&*str_arg(&args, 0, "contains")?)))
    });
    table.method(NativeKind::String, "startsWith", |_, this, args| {
        let s = receiver(this, "startsWith")?;
        Ok(Value::Bool(s.starts_with(&*str_arg(&args, 0, "startsWith")?)))
    });
    table.method(NativeKind::String, "endsWith", |_, this, args| {
        let s = receiver(this, "endsWith")?;
        Ok(Value::Bool(s.ends_with(&*str_arg(&args, 0, "endsWith")?)))
    });
    table.method(NativeKind::String, "toUpperCase", |_, this, _| {
        Ok(Value::string(receiver(this, "toUpperCase")?.to_uppercase()))
    });
    table.method(NativeKind::String, "toLowerCase", |_, this, _| {
        Ok(Value::string(receiver(this, "toLowerCase")?.to_lowercase()))
    });
    table.method(NativeKind::String, "trim", |_, this, _| {
        Ok(Value::string(receiver(this, "trim")?.trim()))
    });
    table.method(NativeKind::String, "replaceAll", |_, this, args| {
        let s = receiver(this, "replaceAll")?;
        let from = str_arg(&args, 0, "replaceAll")?;
        let to = str_arg(&args, 1, "replaceAll")?;
        Ok(Value::string(s.replace(&*from, &to)))
    });
    table.method(NativeKind::String, "compareTo", |_, this, args| {
        let s = receiver(this, "compareTo")?;
        let other = str_arg(&args, 0, "compareTo")?;
        let ordering = s.encode_utf16().cmp(other.encode_utf16());
        Ok(Value::int(ordering as i64))
    });
    table.method(NativeKind::String, "split", |rt, this, args| {
        let s = receiver(this, "split")?;
        let separator = str_arg(&args, 0, "split")?;
        let parts: Vec<Value> = if separator.is_empty() {
            units(s).chunks(1).map(from_units).collect()
        } else {
            s.split(&*separator).map(Value::string).collect()
        };
        rt.new_list(TypeId::STRING, parts)
    });
}

/// Length in UTF-16 code units
pub(super) fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Runtime;
    use crate::function::Args;

    #[test]
    fn test_utf16_indexing() {
        let rt = Runtime::new();
        let s = Value::string("a😀b");
        assert_eq!(rt.dload(&s, "length").unwrap(), Value::int(4));
        assert_eq!(rt.dindex(&s, Value::int(3)).unwrap(), Value::string("b"));
        assert_eq!(
            rt.dsend(&s, "codeUnitAt", Args::one(Value::int(1))).unwrap(),
            Value::int(0xD83D)
        );
        assert_eq!(
            rt.dsend(&s, "indexOf", Args::one(Value::string("b"))).unwrap(),
            Value::int(3)
        );
    }

    #[test]
    fn test_split_surrogate_pair_is_replaced() {
        let rt = Runtime::new();
        let s = Value::string("a😀b");
        assert_eq!(
            rt.dsend(&s, "substring", Args::positional(vec![Value::int(0), Value::int(2)])).unwrap(),
            Value::string("a\u{FFFD}")
        );
        assert_eq!(rt.dindex(&s, Value::int(2)).unwrap(), Value::string("\u{FFFD}"));
        assert_eq!(
            rt.dsend(&s, "substring", Args::positional(vec![Value::int(1), Value::int(3)])).unwrap(),
            Value::string("😀")
        );
    }

    #[test]
    fn test_substring_bounds() {
        let rt = Runtime::new();
        let s = Value::string("hello");
        assert_eq!(
            rt.dsend(&s, "substring", Args::positional(vec![Value::int(1), Value::int(3)])).unwrap(),
            Value::string("el")
        );
        assert_eq!(
            rt.dsend(&s, "substring", Args::one(Value::int(2))).unwrap(),
            Value::string("llo")
        );
        assert!(matches!(
            rt.dsend(&s, "substring", Args::positional(vec![Value::int(3), Value::int(9)])),
            Err(RuntimeError::Range(_))
        ));
    }

    #[test]
    fn test_operators_and_split() {
        let rt = Runtime::new();
        let s = Value::string("ab");
        assert_eq!(rt.dsend(&s, "+", Args::one(Value::string("c"))).unwrap(), Value::string("abc"));
        assert_eq!(rt.dsend(&s, "*", Args::one(Value::int(3))).unwrap(), Value::string("ababab"));
        assert!(rt.dsend(&s, "+", Args::one(Value::int(1))).is_err());
        assert_eq!(rt.dsend(&s, "*", Args::one(Value::int(-2))).unwrap(), Value::string(""));

        let parts = rt.dsend(&Value::string("a,b,c"), "split", Args::one(Value::string(","))).unwrap();
        assert_eq!(rt.to_dart_string(&parts).unwrap(), "[a, b, c]");
        assert_eq!(
            rt.dsend(&Value::string("a"), "compareTo", Args::one(Value::string("b"))).unwrap(),
            Value::int(-1)
        );
    }

    #[test]
    fn test_repeat_rejects_oversized_result() {
        let rt = Runtime::new();
        let s = Value::string("ab");
        let err = rt.dsend(&s, "*", Args::one(Value::int(i64::MAX))).unwrap_err();
        assert_eq!(err.kind(), "RangeError");
        let too_long = (crate::error::MAX_LENGTH / 2 + 1) as i64;
        assert!(matches!(
            rt.dsend(&s, "*", Args::one(Value::int(too_long))),
            Err(RuntimeError::Range(_))
        ));
    }
}
