//! Runtime values for expression evaluation
//!
//! Context data is JSON; expressions additionally need integers distinct from
//! floats, dates, datetimes, and durations. Values convert back to JSON when
//! they are stored or handed to a capability.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde_json::{Map, Number, Value as JsonValue};
use std::cmp::Ordering;
use std::fmt;

/// Runtime value type
#[derive(Debug, Clone)]
pub enum Val {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Val>),
    /// Insertion-ordered mapping
    Obj(Vec<(String, Val)>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
}

impl Val {
    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "None",
            Val::Bool(_) => "bool",
            Val::Int(_) => "int",
            Val::Float(_) => "float",
            Val::Str(_) => "str",
            Val::List(_) => "list",
            Val::Obj(_) => "dict",
            Val::Date(_) => "date",
            Val::DateTime(_) => "datetime",
            Val::Duration(_) => "timedelta",
        }
    }

    /// Check if value is truthy (for conditions and `and`/`or`)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Float(f) => *f != 0.0,
            Val::Str(s) => !s.is_empty(),
            Val::List(items) => !items.is_empty(),
            Val::Obj(entries) => !entries.is_empty(),
            Val::Date(_) | Val::DateTime(_) => true,
            Val::Duration(d) => !d.is_zero(),
        }
    }

    pub fn get_key(&self, key: &str) -> Option<&Val> {
        match self {
            Val::Obj(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Int(i) => Some(*i as f64),
            Val::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality with numeric coercion (`1 == 1.0`)
    pub fn loose_eq(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Int(_) | Val::Float(_), Val::Int(_) | Val::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::List(a), Val::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Val::Obj(a), Val::Obj(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        other.get_key(k).map(|w| v.loose_eq(w)).unwrap_or(false)
                    })
            }
            (Val::Date(a), Val::Date(b)) => a == b,
            (Val::DateTime(a), Val::DateTime(b)) => a == b,
            (Val::Duration(a), Val::Duration(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering for `<`, `>`, `min`, `max`; `None` when the types do not compare
    pub fn compare(&self, other: &Val) -> Option<Ordering> {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => Some(a.cmp(b)),
            (Val::Int(_) | Val::Float(_), Val::Int(_) | Val::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Val::Str(a), Val::Str(b)) => Some(a.cmp(b)),
            (Val::Bool(a), Val::Bool(b)) => Some(a.cmp(b)),
            (Val::Date(a), Val::Date(b)) => Some(a.cmp(b)),
            (Val::DateTime(a), Val::DateTime(b)) => Some(a.cmp(b)),
            (Val::Duration(a), Val::Duration(b)) => Some(a.cmp(b)),
            (Val::List(a), Val::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// Convert to JSON for storage in the context or as a capability argument
    pub fn into_json(self) -> JsonValue {
        match self {
            Val::Null => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(b),
            Val::Int(i) => JsonValue::Number(i.into()),
            Val::Float(f) => Number::from_f64(f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Val::Str(s) => JsonValue::String(s),
            Val::List(items) => JsonValue::Array(items.into_iter().map(Val::into_json).collect()),
            Val::Obj(entries) => {
                let map: Map<String, JsonValue> = entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect();
                JsonValue::Object(map)
            }
            Val::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Val::DateTime(dt) => JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Val::Duration(d) => JsonValue::String(format_duration(&d)),
        }
    }

    /// Quoted rendering used for elements inside containers
    pub fn repr(&self) -> String {
        match self {
            Val::Str(s) => quote(s),
            Val::Date(d) => format!("date({})", d.format("%Y, %-m, %-d")),
            Val::DateTime(dt) => format!("datetime({})", dt.format("%Y, %-m, %-d, %-H, %-M, %-S")),
            other => other.to_string(),
        }
    }
}

impl From<&JsonValue> for Val {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Val::Int(i),
                None => Val::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Val::Str(s.clone()),
            JsonValue::Array(items) => Val::List(items.iter().map(Val::from).collect()),
            JsonValue::Object(map) => Val::Obj(
                map.iter()
                    .map(|(k, v)| (k.clone(), Val::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Text rendering used when a value is interpolated into a string
impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "None"),
            Val::Bool(true) => write!(f, "True"),
            Val::Bool(false) => write!(f, "False"),
            Val::Int(i) => write!(f, "{}", i),
            Val::Float(x) => write!(f, "{}", format_float(*x)),
            Val::Str(s) => write!(f, "{}", s),
            Val::List(items) => {
                let parts: Vec<String> = items.iter().map(Val::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Val::Obj(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Val::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Val::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Val::Duration(d) => write!(f, "{}", format_duration(d)),
        }
    }
}

/// Integral floats keep a trailing `.0` so `6.0` never reads as an int
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        let text = if x > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

/// `N days, H:MM:SS`, or just `H:MM:SS` under a day
pub fn format_duration(d: &TimeDelta) -> String {
    let total = d.num_seconds();
    let days = total.div_euclid(86_400);
    let rest = total.rem_euclid(86_400);
    let clock = format!("{}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);

    match days {
        0 => clock,
        1 | -1 => format!("{} day, {}", days, clock),
        _ => format!("{} days, {}", days, clock),
    }
}

fn quote(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        format!("\"{}\"", s.replace('\\', "\\\\"))
    } else {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_matches_reference_rendering() {
        let order = Val::from(&json!({
            "order_id": "O001",
            "order_date": "2025-01-01",
            "status": "Pending"
        }));
        assert_eq!(
            order.to_string(),
            "{'order_id': 'O001', 'order_date': '2025-01-01', 'status': 'Pending'}"
        );
        assert_eq!(Val::from(&json!([1, "a", null, true])).to_string(), "[1, 'a', None, True]");
        assert_eq!(Val::Float(6.0).to_string(), "6.0");
        assert_eq!(Val::Float(2.5).to_string(), "2.5");
        assert_eq!(Val::Str("it's".to_string()).repr(), "\"it's\"");
    }

    #[test]
    fn test_duration_rendering() {
        assert_eq!(format_duration(&TimeDelta::days(7)), "7 days, 0:00:00");
        assert_eq!(format_duration(&TimeDelta::days(1)), "1 day, 0:00:00");
        assert_eq!(format_duration(&TimeDelta::seconds(3725)), "1:02:05");
    }

    #[test]
    fn test_json_conversion_keeps_integers() {
        let v = Val::from(&json!({"n": 3, "x": 1.5}));
        assert!(matches!(v.get_key("n"), Some(Val::Int(3))));
        assert_eq!(v.into_json(), json!({"n": 3, "x": 1.5}));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Val::Null.is_truthy());
        assert!(!Val::Int(0).is_truthy());
        assert!(!Val::Str(String::new()).is_truthy());
        assert!(!Val::List(vec![]).is_truthy());
        assert!(Val::Str("x".to_string()).is_truthy());
        assert!(Val::Float(0.1).is_truthy());
    }

    #[test]
    fn test_loose_equality_and_ordering() {
        assert!(Val::Int(1).loose_eq(&Val::Float(1.0)));
        assert!(!Val::Int(1).loose_eq(&Val::Str("1".to_string())));
        assert_eq!(Val::Int(2).compare(&Val::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Val::Str("a".into()).compare(&Val::Int(1)), None);
    }
}
