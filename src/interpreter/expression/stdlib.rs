//! Whitelisted helper functions and value methods
//!
//! This is the complete set of callables reachable from an expression. There
//! is no reflection: anything not matched here is an error.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::cmp::Ordering;
use std::fmt::Write as _;

use super::value::Val;
use super::{ExprError, Limits};

/* ===================== Helper Registry ===================== */

/// Global helper function identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    Len,
    Abs,
    Range,
    Str,
    Int,
    Float,
    Bool,
    Min,
    Max,
    Sum,
    Round,
    DateTime,
    Date,
    TimeDelta,
}

impl Helper {
    pub fn from_name(name: &str) -> Option<Self> {
        let helper = match name {
            "len" => Helper::Len,
            "abs" => Helper::Abs,
            "range" => Helper::Range,
            "str" => Helper::Str,
            "int" => Helper::Int,
            "float" => Helper::Float,
            "bool" => Helper::Bool,
            "min" => Helper::Min,
            "max" => Helper::Max,
            "sum" => Helper::Sum,
            "round" => Helper::Round,
            "datetime" => Helper::DateTime,
            "date" => Helper::Date,
            "timedelta" => Helper::TimeDelta,
            _ => return None,
        };
        Some(helper)
    }
}

pub fn is_helper(name: &str) -> bool {
    Helper::from_name(name).is_some()
}

/// Names that expose `name.method(...)` helpers
pub fn is_namespace(name: &str) -> bool {
    matches!(name, "datetime" | "date")
}

/* ===================== Dispatchers ===================== */

pub fn call_function(name: &str, args: Vec<Val>, limits: &Limits) -> Result<Val, ExprError> {
    let helper =
        Helper::from_name(name).ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;

    match helper {
        Helper::Len => {
            arity(name, &args, 1, 1)?;
            len(&args[0])
        }
        Helper::Abs => {
            arity(name, &args, 1, 1)?;
            abs(&args[0])
        }
        Helper::Range => range(&args, limits),
        Helper::Str => {
            arity(name, &args, 1, 1)?;
            Ok(Val::Str(args[0].to_string()))
        }
        Helper::Int => {
            arity(name, &args, 1, 1)?;
            to_int(&args[0])
        }
        Helper::Float => {
            arity(name, &args, 1, 1)?;
            to_float(&args[0])
        }
        Helper::Bool => {
            arity(name, &args, 1, 1)?;
            Ok(Val::Bool(args[0].is_truthy()))
        }
        Helper::Min => extremum(name, args, Ordering::Less),
        Helper::Max => extremum(name, args, Ordering::Greater),
        Helper::Sum => sum(&args),
        Helper::Round => round(&args),
        Helper::DateTime => {
            arity(name, &args, 3, 6)?;
            let parts = args
                .iter()
                .map(|a| int_arg(name, a))
                .collect::<Result<Vec<_>, _>>()?;
            let date = make_date(parts[0], parts[1], parts[2])?;
            let hour = parts.get(3).copied().unwrap_or(0);
            let minute = parts.get(4).copied().unwrap_or(0);
            let second = parts.get(5).copied().unwrap_or(0);
            let time = u32_parts(hour, minute, second)
                .and_then(|(h, m, s)| NaiveTime::from_hms_opt(h, m, s))
                .ok_or_else(|| {
                    ExprError::InvalidDate(format!("{}:{}:{}", hour, minute, second))
                })?;
            Ok(Val::DateTime(date.and_time(time)))
        }
        Helper::Date => {
            arity(name, &args, 3, 3)?;
            let y = int_arg(name, &args[0])?;
            let m = int_arg(name, &args[1])?;
            let d = int_arg(name, &args[2])?;
            make_date(y, m, d).map(Val::Date)
        }
        Helper::TimeDelta => {
            arity(name, &args, 0, 2)?;
            let days = args.first().cloned().unwrap_or(Val::Int(0));
            let seconds = args.get(1).cloned().unwrap_or(Val::Int(0));
            timedelta(&days, &seconds)
        }
    }
}

/// `datetime.*` and `date.*` helpers
pub fn call_namespace(namespace: &str, method: &str, args: Vec<Val>) -> Result<Val, ExprError> {
    let qualified = format!("{}.{}", namespace, method);

    match (namespace, method) {
        ("datetime", "strptime") => {
            arity(&qualified, &args, 2, 2)?;
            let text = str_arg(&qualified, &args[0])?;
            let format = str_arg(&qualified, &args[1])?;
            strptime(text, format).map(Val::DateTime)
        }
        ("datetime", "fromisoformat") => {
            arity(&qualified, &args, 1, 1)?;
            let text = str_arg(&qualified, &args[0])?;
            parse_iso_datetime(text).map(Val::DateTime)
        }
        ("datetime", "now") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::DateTime(Local::now().naive_local()))
        }
        ("date", "today") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::Date(Local::now().date_naive()))
        }
        ("date", "fromisoformat") => {
            arity(&qualified, &args, 1, 1)?;
            let text = str_arg(&qualified, &args[0])?;
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(Val::Date)
                .map_err(|e| ExprError::InvalidDate(format!("'{}': {}", text, e)))
        }
        _ => Err(ExprError::UnknownFunction(qualified)),
    }
}

/// Methods callable on values (`name.upper()`, `row.get('qty', 0)`)
pub fn call_method(
    receiver: Val,
    method: &str,
    args: Vec<Val>,
    limits: &Limits,
) -> Result<Val, ExprError> {
    let qualified = format!("{}.{}", receiver.type_name(), method);

    match (&receiver, method) {
        (Val::Str(s), "upper") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::Str(s.to_uppercase()))
        }
        (Val::Str(s), "lower") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::Str(s.to_lowercase()))
        }
        (Val::Str(s), "strip") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::Str(s.trim().to_string()))
        }
        (Val::Str(s), "startswith") => {
            arity(&qualified, &args, 1, 1)?;
            Ok(Val::Bool(s.starts_with(str_arg(&qualified, &args[0])?)))
        }
        (Val::Str(s), "endswith") => {
            arity(&qualified, &args, 1, 1)?;
            Ok(Val::Bool(s.ends_with(str_arg(&qualified, &args[0])?)))
        }
        (Val::Str(s), "split") => {
            arity(&qualified, &args, 0, 1)?;
            let parts: Vec<Val> = match args.first() {
                None | Some(Val::Null) => s.split_whitespace().map(|p| Val::Str(p.to_string())).collect(),
                Some(sep) => {
                    let sep = str_arg(&qualified, sep)?;
                    if sep.is_empty() {
                        return Err(ExprError::TypeMismatch("empty separator".to_string()));
                    }
                    s.split(sep).map(|p| Val::Str(p.to_string())).collect()
                }
            };
            limits.check_sequence(parts.len())?;
            Ok(Val::List(parts))
        }
        (Val::Str(s), "replace") => {
            arity(&qualified, &args, 2, 2)?;
            let from = str_arg(&qualified, &args[0])?;
            let to = str_arg(&qualified, &args[1])?;
            let replaced = s.replace(from, to);
            limits.check_sequence(replaced.len())?;
            Ok(Val::Str(replaced))
        }

        (Val::Obj(_), "get") => {
            arity(&qualified, &args, 1, 2)?;
            let key = str_arg(&qualified, &args[0])?;
            Ok(receiver
                .get_key(key)
                .cloned()
                .or_else(|| args.get(1).cloned())
                .unwrap_or(Val::Null))
        }
        (Val::Obj(entries), "keys") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::List(entries.iter().map(|(k, _)| Val::Str(k.clone())).collect()))
        }
        (Val::Obj(entries), "values") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::List(entries.iter().map(|(_, v)| v.clone()).collect()))
        }
        (Val::Obj(entries), "items") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::List(
                entries
                    .iter()
                    .map(|(k, v)| Val::List(vec![Val::Str(k.clone()), v.clone()]))
                    .collect(),
            ))
        }

        (Val::Date(d), "strftime") => {
            arity(&qualified, &args, 1, 1)?;
            strftime(&d.and_time(NaiveTime::MIN), str_arg(&qualified, &args[0])?)
        }
        (Val::DateTime(dt), "strftime") => {
            arity(&qualified, &args, 1, 1)?;
            strftime(dt, str_arg(&qualified, &args[0])?)
        }
        (Val::Date(d), "isoformat") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::Str(d.format("%Y-%m-%d").to_string()))
        }
        (Val::DateTime(dt), "isoformat") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::Str(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
        }
        (Val::DateTime(dt), "date") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::Date(dt.date()))
        }
        (Val::Duration(d), "total_seconds") => {
            arity(&qualified, &args, 0, 0)?;
            Ok(Val::Float(d.num_milliseconds() as f64 / 1000.0))
        }

        _ => Err(ExprError::NoSuchAttribute {
            type_name: receiver.type_name(),
            attribute: method.to_string(),
        }),
    }
}

/* ===================== Argument Helpers ===================== */

fn arity(name: &str, args: &[Val], min: usize, max: usize) -> Result<(), ExprError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(ExprError::Arity {
            function: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn int_arg(name: &str, value: &Val) -> Result<i64, ExprError> {
    match value {
        Val::Int(i) => Ok(*i),
        Val::Bool(b) => Ok(*b as i64),
        other => Err(ExprError::TypeMismatch(format!(
            "{}() expects an integer, got '{}'",
            name,
            other.type_name()
        ))),
    }
}

fn str_arg<'v>(name: &str, value: &'v Val) -> Result<&'v str, ExprError> {
    match value {
        Val::Str(s) => Ok(s),
        other => Err(ExprError::TypeMismatch(format!(
            "{}() expects a string, got '{}'",
            name,
            other.type_name()
        ))),
    }
}

fn u32_parts(a: i64, b: i64, c: i64) -> Option<(u32, u32, u32)> {
    Some((
        u32::try_from(a).ok()?,
        u32::try_from(b).ok()?,
        u32::try_from(c).ok()?,
    ))
}

fn make_date(year: i64, month: i64, day: i64) -> Result<NaiveDate, ExprError> {
    let y = i32::try_from(year).ok();
    let md = u32::try_from(month).ok().zip(u32::try_from(day).ok());
    y.zip(md)
        .and_then(|(y, (m, d))| NaiveDate::from_ymd_opt(y, m, d))
        .ok_or_else(|| ExprError::InvalidDate(format!("{}-{}-{}", year, month, day)))
}

/* ===================== Functions ===================== */

fn len(value: &Val) -> Result<Val, ExprError> {
    let n = match value {
        Val::Str(s) => s.chars().count(),
        Val::List(items) => items.len(),
        Val::Obj(entries) => entries.len(),
        other => {
            return Err(ExprError::TypeMismatch(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Val::Int(n as i64))
}

fn abs(value: &Val) -> Result<Val, ExprError> {
    match value {
        Val::Int(i) => i.checked_abs().map(Val::Int).ok_or(ExprError::Overflow),
        Val::Float(f) => Ok(Val::Float(f.abs())),
        Val::Duration(d) => Ok(Val::Duration(d.abs())),
        other => Err(ExprError::TypeMismatch(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

fn range(args: &[Val], limits: &Limits) -> Result<Val, ExprError> {
    arity("range", args, 1, 3)?;
    let ints = args
        .iter()
        .map(|a| int_arg("range", a))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => (0, 0, 1),
    };
    if step == 0 {
        return Err(ExprError::TypeMismatch("range() arg 3 must not be zero".to_string()));
    }

    let span = if step > 0 {
        (stop as i128 - start as i128).max(0)
    } else {
        (start as i128 - stop as i128).max(0)
    };
    let step_abs = (step as i128).abs();
    let count = (span + step_abs - 1) / step_abs;
    let count = usize::try_from(count).map_err(|_| ExprError::TooLarge(usize::MAX))?;
    limits.check_sequence(count)?;

    let values = (0..count as i64)
        .map(|i| Val::Int(start + i * step))
        .collect();
    Ok(Val::List(values))
}

fn to_int(value: &Val) -> Result<Val, ExprError> {
    match value {
        Val::Int(i) => Ok(Val::Int(*i)),
        Val::Bool(b) => Ok(Val::Int(*b as i64)),
        Val::Float(f) => {
            let truncated = f.trunc();
            if truncated.is_finite() && truncated.abs() < 9.2e18 {
                Ok(Val::Int(truncated as i64))
            } else {
                Err(ExprError::Overflow)
            }
        }
        Val::Str(s) => s.trim().parse::<i64>().map(Val::Int).map_err(|_| {
            ExprError::TypeMismatch(format!("invalid literal for int(): '{}'", s))
        }),
        other => Err(ExprError::TypeMismatch(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Val) -> Result<Val, ExprError> {
    match value {
        Val::Int(i) => Ok(Val::Float(*i as f64)),
        Val::Float(f) => Ok(Val::Float(*f)),
        Val::Bool(b) => Ok(Val::Float(if *b { 1.0 } else { 0.0 })),
        Val::Str(s) => s.trim().parse::<f64>().map(Val::Float).map_err(|_| {
            ExprError::TypeMismatch(format!("could not convert string to float: '{}'", s))
        }),
        other => Err(ExprError::TypeMismatch(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

/// `min`/`max` over one sequence argument or over the arguments themselves
fn extremum(name: &str, args: Vec<Val>, wanted: Ordering) -> Result<Val, ExprError> {
    let candidates = match args.len() {
        0 => {
            return Err(ExprError::Arity {
                function: name.to_string(),
                expected: "at least 1".to_string(),
                got: 0,
            })
        }
        1 => match args.into_iter().next() {
            Some(Val::List(items)) => items,
            Some(other) => {
                return Err(ExprError::TypeMismatch(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
            None => Vec::new(),
        },
        _ => args,
    };

    let mut iter = candidates.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| ExprError::TypeMismatch(format!("{}() arg is an empty sequence", name)))?;
    for candidate in iter {
        let ordering = candidate.compare(&best).ok_or_else(|| {
            ExprError::TypeMismatch(format!(
                "'{}' not supported between '{}' and '{}'",
                name,
                candidate.type_name(),
                best.type_name()
            ))
        })?;
        if ordering == wanted {
            best = candidate;
        }
    }
    Ok(best)
}

fn sum(args: &[Val]) -> Result<Val, ExprError> {
    arity("sum", args, 1, 2)?;
    let items = match &args[0] {
        Val::List(items) => items,
        other => {
            return Err(ExprError::TypeMismatch(format!(
                "'{}' object is not iterable",
                other.type_name()
            )))
        }
    };

    let mut total = args.get(1).cloned().unwrap_or(Val::Int(0));
    for item in items {
        total = match (total, item) {
            (Val::Int(a), Val::Int(b)) => Val::Int(a.checked_add(*b).ok_or(ExprError::Overflow)?),
            (Val::Int(a), Val::Float(b)) => Val::Float(a as f64 + b),
            (Val::Float(a), Val::Int(b)) => Val::Float(a + *b as f64),
            (Val::Float(a), Val::Float(b)) => Val::Float(a + b),
            (acc, other) => {
                return Err(ExprError::TypeMismatch(format!(
                    "unsupported operand types for +: '{}' and '{}'",
                    acc.type_name(),
                    other.type_name()
                )))
            }
        };
    }
    Ok(total)
}

/// Banker's rounding; `round(x)` gives an int, `round(x, n)` a float
fn round(args: &[Val]) -> Result<Val, ExprError> {
    arity("round", args, 1, 2)?;
    let digits = match args.get(1) {
        None | Some(Val::Null) => None,
        Some(v) => Some(int_arg("round", v)?),
    };

    match (&args[0], digits) {
        (Val::Int(i), _) => Ok(Val::Int(*i)),
        (Val::Float(f), None) => to_int(&Val::Float(f.round_ties_even())),
        (Val::Float(f), Some(n)) => {
            let n = i32::try_from(n.clamp(-308, 308)).unwrap_or(0);
            let factor = 10f64.powi(n);
            Ok(Val::Float((f * factor).round_ties_even() / factor))
        }
        (other, _) => Err(ExprError::TypeMismatch(format!(
            "type '{}' doesn't define __round__",
            other.type_name()
        ))),
    }
}

fn timedelta(days: &Val, seconds: &Val) -> Result<Val, ExprError> {
    let millis = |v: &Val, unit: f64| -> Result<i64, ExprError> {
        match v {
            Val::Int(i) => i.checked_mul(unit as i64).ok_or(ExprError::Overflow),
            Val::Float(f) => {
                let ms = (f * unit).round();
                if ms.is_finite() && ms.abs() < 9.2e18 {
                    Ok(ms as i64)
                } else {
                    Err(ExprError::Overflow)
                }
            }
            other => Err(ExprError::TypeMismatch(format!(
                "unsupported type for timedelta component: '{}'",
                other.type_name()
            ))),
        }
    };

    let total = millis(days, 86_400_000.0)?
        .checked_add(millis(seconds, 1000.0)?)
        .ok_or(ExprError::Overflow)?;
    TimeDelta::try_milliseconds(total)
        .map(Val::Duration)
        .ok_or(ExprError::Overflow)
}

/* ===================== Date Parsing & Formatting ===================== */

/// Formats without time fields yield midnight
fn strptime(text: &str, format: &str) -> Result<NaiveDateTime, ExprError> {
    NaiveDateTime::parse_from_str(text, format)
        .or_else(|_| NaiveDate::parse_from_str(text, format).map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|e| {
            ExprError::InvalidDate(format!("'{}' does not match format '{}': {}", text, format, e))
        })
}

fn parse_iso_datetime(text: &str) -> Result<NaiveDateTime, ExprError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| ExprError::InvalidDate(format!("invalid isoformat string: '{}'", text)))
}

fn strftime(value: &NaiveDateTime, format: &str) -> Result<Val, ExprError> {
    let mut out = String::new();
    write!(out, "{}", value.format(format))
        .map_err(|_| ExprError::InvalidDate(format!("invalid format string '{}'", format)))?;
    Ok(Val::Str(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Val>) -> Result<Val, ExprError> {
        call_function(name, args, &Limits::default())
    }

    #[test]
    fn test_len_and_abs() {
        assert!(matches!(call("len", vec![Val::Str("héllo".into())]), Ok(Val::Int(5))));
        assert!(matches!(call("abs", vec![Val::Int(-3)]), Ok(Val::Int(3))));
        assert!(matches!(call("len", vec![Val::Int(3)]), Err(ExprError::TypeMismatch(_))));
        assert!(matches!(call("len", vec![]), Err(ExprError::Arity { .. })));
    }

    #[test]
    fn test_range_forms() {
        let render = |args| call("range", args).map(|v| v.to_string());
        assert_eq!(render(vec![Val::Int(3)]).unwrap(), "[0, 1, 2]");
        assert_eq!(render(vec![Val::Int(2), Val::Int(5)]).unwrap(), "[2, 3, 4]");
        assert_eq!(render(vec![Val::Int(5), Val::Int(0), Val::Int(-2)]).unwrap(), "[5, 3, 1]");
        assert_eq!(render(vec![Val::Int(-1)]).unwrap(), "[]");
    }

    #[test]
    fn test_range_respects_limit() {
        let limits = Limits {
            max_sequence_len: 10,
            ..Limits::default()
        };
        assert_eq!(
            call_function("range", vec![Val::Int(11)], &limits).unwrap_err(),
            ExprError::TooLarge(11)
        );
    }

    #[test]
    fn test_round_is_bankers() {
        assert!(matches!(call("round", vec![Val::Float(2.5)]), Ok(Val::Int(2))));
        assert!(matches!(call("round", vec![Val::Float(3.5)]), Ok(Val::Int(4))));
        assert_eq!(
            call("round", vec![Val::Float(1.2345), Val::Int(2)]).unwrap().to_string(),
            "1.23"
        );
    }

    #[test]
    fn test_min_max_sum() {
        let nums = Val::List(vec![Val::Int(4), Val::Float(1.5), Val::Int(9)]);
        assert_eq!(call("min", vec![nums.clone()]).unwrap().to_string(), "1.5");
        assert_eq!(call("max", vec![Val::Int(2), Val::Int(7)]).unwrap().to_string(), "7");
        assert_eq!(call("sum", vec![nums]).unwrap().to_string(), "14.5");
        assert!(call("max", vec![Val::List(vec![])]).is_err());
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(call("int", vec![Val::Str(" 42 ".into())]), Ok(Val::Int(42))));
        assert!(matches!(call("int", vec![Val::Float(-2.9)]), Ok(Val::Int(-2))));
        assert_eq!(call("str", vec![Val::Bool(true)]).unwrap().to_string(), "True");
        assert_eq!(call("float", vec![Val::Int(6)]).unwrap().to_string(), "6.0");
        assert!(call("int", vec![Val::Str("abc".into())]).is_err());
    }

    #[test]
    fn test_date_helpers() {
        let dt = call_namespace(
            "datetime",
            "strptime",
            vec![Val::Str("2025-01-03".into()), Val::Str("%Y-%m-%d".into())],
        )
        .unwrap();
        assert_eq!(dt.to_string(), "2025-01-03 00:00:00");

        let iso = call_namespace("date", "fromisoformat", vec![Val::Str("2025-02-28".into())]).unwrap();
        assert_eq!(iso.to_string(), "2025-02-28");

        assert!(matches!(
            call("date", vec![Val::Int(2025), Val::Int(2), Val::Int(30)]),
            Err(ExprError::InvalidDate(_))
        ));
        assert!(matches!(
            call_namespace("os", "system", vec![]),
            Err(ExprError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_timedelta_rendering() {
        assert_eq!(call("timedelta", vec![Val::Int(7)]).unwrap().to_string(), "7 days, 0:00:00");
        assert_eq!(
            call("timedelta", vec![Val::Int(0), Val::Int(90)]).unwrap().to_string(),
            "0:01:30"
        );
    }

    #[test]
    fn test_string_and_mapping_methods() {
        let limits = Limits::default();
        let s = Val::Str("  Pending  ".into());
        assert_eq!(
            call_method(s, "strip", vec![], &limits).unwrap().to_string(),
            "Pending"
        );
        let csv = Val::Str("a,b,c".into());
        assert_eq!(
            call_method(csv, "split", vec![Val::Str(",".into())], &limits).unwrap().to_string(),
            "['a', 'b', 'c']"
        );

        let row = Val::Obj(vec![("qty".into(), Val::Int(4))]);
        assert_eq!(
            call_method(row.clone(), "get", vec![Val::Str("missing".into()), Val::Int(0)], &limits)
                .unwrap()
                .to_string(),
            "0"
        );
        assert_eq!(call_method(row, "keys", vec![], &limits).unwrap().to_string(), "['qty']");
    }

    #[test]
    fn test_strftime_and_bad_format() {
        let limits = Limits::default();
        let d = Val::Date(NaiveDate::from_ymd_opt(2025, 1, 8).unwrap());
        assert_eq!(
            call_method(d.clone(), "strftime", vec![Val::Str("%d/%m/%Y".into())], &limits)
                .unwrap()
                .to_string(),
            "08/01/2025"
        );
        assert!(call_method(d, "strftime", vec![Val::Str("%Q".into())], &limits).is_err());
    }

    #[test]
    fn test_unknown_method() {
        let err = call_method(Val::Int(1), "__class__", vec![], &Limits::default()).unwrap_err();
        assert!(matches!(err, ExprError::NoSuchAttribute { .. }));
    }
}
