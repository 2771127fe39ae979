//! `num`, `int` and `double` members
//!
//! Integers are arbitrary precision. Mixed int/double arithmetic produces a
//! double; `/` always produces a double. `%` is the Euclidean modulo (never
//! negative), `remainder` keeps the sign of the dividend, and `~/` truncates
//! toward zero.

use super::{arg, int_arg, wrong_receiver, ExtensionTable, NativeKind};
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError, MAX_INT_BITS};
use crate::value::Value;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};
use std::cmp::Ordering;

#[derive(Clone, Copy)]
enum NumRef<'a> {
    Int(&'a BigInt),
    Double(f64),
}

impl NumRef<'_> {
    fn to_f64(self) -> f64 {
        match self {
            NumRef::Int(i) => int_to_f64(i),
            NumRef::Double(d) => d,
        }
    }
}

fn int_to_f64(i: &BigInt) -> f64 {
    i.to_f64().unwrap_or(f64::NAN)
}

fn num_ref(value: &Value) -> Option<NumRef<'_>> {
    match value {
        Value::Int(i) => Some(NumRef::Int(i)),
        Value::Double(d) => Some(NumRef::Double(*d)),
        _ => None,
    }
}

fn operands<'a>(op: &str, this: &'a Value, other: &'a Value) -> RtResult<(NumRef<'a>, NumRef<'a>)> {
    let a = num_ref(this).ok_or_else(|| wrong_receiver(op, this))?;
    let b = num_ref(other).ok_or_else(|| {
        RuntimeError::Argument(format!("{} {}: expected a num, got {}", this.variant_name(), op, other.variant_name()))
    })?;
    Ok((a, b))
}

/// Convert a double to an int, failing on NaN and infinities
fn double_to_int(d: f64) -> RtResult<BigInt> {
    BigInt::from_f64(d.trunc()).ok_or_else(|| RuntimeError::Unsupported(format!("{} cannot be converted to int", d)))
}

fn arithmetic(op: &str, a: NumRef<'_>, b: NumRef<'_>) -> RtResult<Value> {
    match (a, b) {
        (NumRef::Int(x), NumRef::Int(y)) => int_arithmetic(op, x, y),
        (x, y) => double_arithmetic(op, x.to_f64(), y.to_f64()),
    }
}

fn int_arithmetic(op: &str, x: &BigInt, y: &BigInt) -> RtResult<Value> {
    let needs_divisor = matches!(op, "~/" | "%" | "remainder");
    if needs_divisor && y.is_zero() {
        return Err(RuntimeError::IntegerDivisionByZero);
    }
    let result = match op {
        "+" => x + y,
        "-" => x - y,
        "*" => x * y,
        "/" => return Ok(Value::Double(int_to_f64(x) / int_to_f64(y))),
        "~/" => x / y,
        "%" => {
            let r = x % y;
            if r.is_negative() {
                r + y.abs()
            } else {
                r
            }
        }
        "remainder" => x % y,
        _ => return Err(RuntimeError::no_such_method(op, "int")),
    };
    Ok(Value::Int(result))
}

fn double_arithmetic(op: &str, x: f64, y: f64) -> RtResult<Value> {
    let result = match op {
        "+" => x + y,
        "-" => x - y,
        "*" => x * y,
        "/" => x / y,
        "~/" => {
            if y == 0.0 {
                return Err(RuntimeError::IntegerDivisionByZero);
            }
            return Ok(Value::Int(double_to_int(x / y)?));
        }
        "%" => {
            let r = x % y;
            if r < 0.0 {
                r + y.abs()
            } else {
                r
            }
        }
        "remainder" => x % y,
        _ => return Err(RuntimeError::no_such_method(op, "double")),
    };
    Ok(Value::Double(result))
}

fn compare(a: NumRef<'_>, b: NumRef<'_>) -> Option<Ordering> {
    match (a, b) {
        (NumRef::Int(x), NumRef::Int(y)) => Some(x.cmp(y)),
        (x, y) => x.to_f64().partial_cmp(&y.to_f64()),
    }
}

/// Total order used by `compareTo`: NaN sorts after everything and equals itself
fn compare_to(a: NumRef<'_>, b: NumRef<'_>) -> i64 {
    match compare(a, b) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) => 1,
        None => match (a.to_f64().is_nan(), b.to_f64().is_nan()) {
            (true, true) => 0,
            (true, false) => 1,
            _ => -1,
        },
    }
}

fn bitwise(op: &str, this: &Value, other: &Value) -> RtResult<Value> {
    let (Value::Int(x), Value::Int(y)) = (this, other) else {
        return Err(RuntimeError::Argument(format!(
            "int {}: expected an int, got {}",
            op,
            other.variant_name()
        )));
    };
    let shift = || {
        y.to_usize()
            .ok_or_else(|| RuntimeError::Argument(format!("int {}: invalid shift amount {}", op, y)))
    };
    let result = match op {
        "&" => x & y,
        "|" => x | y,
        "^" => x ^ y,
        "<<" => {
            let amount = shift()?;
            if !x.is_zero() && x.bits().saturating_add(amount as u64) > MAX_INT_BITS {
                return Err(RuntimeError::Range(format!(
                    "int <<: result would exceed {} bits",
                    MAX_INT_BITS
                )));
            }
            x << amount
        }
        ">>" => x >> shift()?,
        _ => return Err(RuntimeError::no_such_method(op, "int")),
    };
    Ok(Value::Int(result))
}

/// Parse an integer literal (`int.parse`)
///
/// Without a radix a `0x` prefix selects hexadecimal. Surrounding whitespace
/// and a leading sign are accepted.
pub fn parse_int_str(source: &str, radix: Option<i64>) -> RtResult<BigInt> {
    let radix = match radix {
        None => None,
        Some(r) if (2..=36).contains(&r) => Some(r as u32),
        Some(r) => return Err(RuntimeError::Argument(format!("Radix {} not in range 2..36", r))),
    };

    let trimmed = source.trim();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (radix, digits) = match radix {
        Some(r) => (r, body),
        None => match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
            Some(hex) => (16, hex),
            None => (10, body),
        },
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(RuntimeError::Format(format!("Invalid radix-{} number: {}", radix, source)));
    }
    let value = BigInt::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| RuntimeError::Format(format!("Invalid radix-{} number: {}", radix, source)))?;
    Ok(if negative { -value } else { value })
}

impl Runtime {
    /// `int.parse(source, radix: radix)`
    pub fn parse_int(&self, source: &str, radix: Option<i64>) -> RtResult<Value> {
        parse_int_str(source, radix).map(Value::Int)
    }
}

/// Apply an int-to-int or double-to-int rounding
fn rounding(this: &Value, member: &str, f: fn(f64) -> f64) -> RtResult<Value> {
    match this {
        Value::Int(_) => Ok(this.clone()),
        Value::Double(d) => Ok(Value::Int(double_to_int(f(*d))?)),
        other => Err(wrong_receiver(member, other)),
    }
}

pub(super) fn install(table: &mut ExtensionTable) {
    for op in ["+", "-", "*", "/", "~/", "%", "remainder"] {
        table.method(NativeKind::Num, op, move |_, this, args| {
            let other = arg(&args, 0);
            let (a, b) = operands(op, this, &other)?;
            arithmetic(op, a, b)
        });
    }

    let comparisons: [(&'static str, fn(Ordering) -> bool); 4] = [
        ("<", |o| o == Ordering::Less),
        ("<=", |o| o != Ordering::Greater),
        (">", |o| o == Ordering::Greater),
        (">=", |o| o != Ordering::Less),
    ];
    for (op, test) in comparisons {
        table.method(NativeKind::Num, op, move |_, this, args| {
            let other = arg(&args, 0);
            let (a, b) = operands(op, this, &other)?;
            Ok(Value::Bool(compare(a, b).map_or(false, test)))
        });
    }
    table.method(NativeKind::Num, "compareTo", |_, this, args| {
        let other = arg(&args, 0);
        let (a, b) = operands("compareTo", this, &other)?;
        Ok(Value::int(compare_to(a, b)))
    });

    for op in ["&", "|", "^", "<<", ">>"] {
        table.method(NativeKind::Int, op, move |_, this, args| bitwise(op, this, &arg(&args, 0)));
    }
    table.method(NativeKind::Int, "~", |_, this, _| match this {
        Value::Int(x) => Ok(Value::Int(!x)),
        other => Err(wrong_receiver("~", other)),
    });

    table.method(NativeKind::Num, "unary-", |_, this, _| match this {
        Value::Int(x) => Ok(Value::Int(-x)),
        Value::Double(d) => Ok(Value::Double(-d)),
        other => Err(wrong_receiver("unary-", other)),
    });
    table.method(NativeKind::Num, "abs", |_, this, _| match this {
        Value::Int(x) => Ok(Value::Int(x.abs())),
        Value::Double(d) => Ok(Value::Double(d.abs())),
        other => Err(wrong_receiver("abs", other)),
    });
    table.method(NativeKind::Num, "toInt", |_, this, _| rounding(this, "toInt", f64::trunc));
    table.method(NativeKind::Num, "truncate", |_, this, _| rounding(this, "truncate", f64::trunc));
    table.method(NativeKind::Num, "floor", |_, this, _| rounding(this, "floor", f64::floor));
    table.method(NativeKind::Num, "ceil", |_, this, _| rounding(this, "ceil", f64::ceil));
    table.method(NativeKind::Num, "round", |_, this, _| rounding(this, "round", f64::round));
    table.method(NativeKind::Num, "toDouble", |_, this, _| {
        let n = num_ref(this).ok_or_else(|| wrong_receiver("toDouble", this))?;
        Ok(Value::Double(n.to_f64()))
    });

    table.getter(NativeKind::Num, "sign", |_, this| match this {
        Value::Int(x) => Ok(Value::Int(x.signum())),
        Value::Double(d) if *d == 0.0 || d.is_nan() => Ok(Value::Double(*d)),
        Value::Double(d) => Ok(Value::Double(d.signum())),
        other => Err(wrong_receiver("sign", other)),
    });
    table.getter(NativeKind::Num, "isNegative", |_, this| match this {
        Value::Int(x) => Ok(Value::Bool(x.is_negative())),
        Value::Double(d) => Ok(Value::Bool(d.is_sign_negative() && !d.is_nan())),
        other => Err(wrong_receiver("isNegative", other)),
    });
    table.getter(NativeKind::Num, "isNaN", |_, this| {
        Ok(Value::Bool(matches!(this, Value::Double(d) if d.is_nan())))
    });
    table.getter(NativeKind::Num, "isInfinite", |_, this| {
        Ok(Value::Bool(matches!(this, Value::Double(d) if d.is_infinite())))
    });
    table.getter(NativeKind::Num, "isFinite", |_, this| {
        Ok(Value::Bool(!matches!(this, Value::Double(d) if !d.is_finite())))
    });

    table.getter(NativeKind::Int, "isEven", |_, this| match this {
        Value::Int(x) => Ok(Value::Bool(x.is_even())),
        other => Err(wrong_receiver("isEven", other)),
    });
    table.getter(NativeKind::Int, "isOdd", |_, this| match this {
        Value::Int(x) => Ok(Value::Bool(x.is_odd())),
        other => Err(wrong_receiver("isOdd", other)),
    });
    table.method(NativeKind::Int, "toRadixString", |_, this, args| {
        let radix = int_arg(&args, 0, "toRadixString")?;
        if !(2..=36).contains(&radix) {
            return Err(RuntimeError::Argument(format!("Radix {} not in range 2..36", radix)));
        }
        match this {
            Value::Int(x) => Ok(Value::string(x.to_str_radix(radix as u32))),
            other => Err(wrong_receiver("toRadixString", other)),
        }
    });
}
