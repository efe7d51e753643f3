//! Tree-walking evaluator for expression ASTs
//!
//! Evaluation is pure: it reads through a [`ScopeView`] and never writes to
//! the Context. Helper functions and value methods are resolved in
//! [`super::stdlib`].

use chrono::TimeDelta;
use std::cmp::Ordering;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::stdlib;
use super::value::Val;
use super::{ExprError, Limits};
use crate::interpreter::context::ScopeView;

const SECONDS_PER_DAY: i64 = 86_400;

pub struct Evaluator<'a> {
    view: ScopeView<'a>,
    limits: &'a Limits,
}

impl<'a> Evaluator<'a> {
    pub fn new(view: ScopeView<'a>, limits: &'a Limits) -> Self {
        Self { view, limits }
    }

    pub fn limits(&self) -> &Limits {
        self.limits
    }

    pub fn eval(&self, expr: &Expr) -> Result<Val, ExprError> {
        match expr {
            Expr::LitNull => Ok(Val::Null),
            Expr::LitBool { v } => Ok(Val::Bool(*v)),
            Expr::LitInt { v } => Ok(Val::Int(*v)),
            Expr::LitFloat { v } => Ok(Val::Float(*v)),
            Expr::LitStr { v } => Ok(Val::Str(v.clone())),
            Expr::LitList { items } => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Val::List(values))
            }

            Expr::Ident { name } => self.eval_ident(name),

            Expr::Member { object, property } => {
                let base = self.eval(object)?;
                get_attribute(&base, property)
            }

            Expr::Index { object, index } => {
                let base = self.eval(object)?;
                let key = self.eval(index)?;
                get_index(&base, &key)
            }

            Expr::Call { callee, args } => self.eval_call(callee, args),

            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Val::Bool(!value.is_truthy())),
                    UnaryOp::Neg => negate(value),
                }
            }

            Expr::Binary { op, left, right } => match op {
                // and/or return one of their operands, like Python
                BinaryOp::And => {
                    let lhs = self.eval(left)?;
                    if lhs.is_truthy() {
                        self.eval(right)
                    } else {
                        Ok(lhs)
                    }
                }
                BinaryOp::Or => {
                    let lhs = self.eval(left)?;
                    if lhs.is_truthy() {
                        Ok(lhs)
                    } else {
                        self.eval(right)
                    }
                }
                _ => {
                    let lhs = self.eval(left)?;
                    let rhs = self.eval(right)?;
                    self.binary(*op, lhs, rhs)
                }
            },
        }
    }

    fn eval_ident(&self, name: &str) -> Result<Val, ExprError> {
        match self.view.lookup(name) {
            Some(value) => Ok(Val::from(value)),
            None if stdlib::is_helper(name) => Err(ExprError::TypeMismatch(format!(
                "'{}' is a function and must be called",
                name
            ))),
            None => Err(ExprError::UndefinedVariable(name.to_string())),
        }
    }

    fn eval_call(&self, callee: &Expr, args: &[Expr]) -> Result<Val, ExprError> {
        match callee {
            // Context bindings shadow helper names
            Expr::Ident { name } if !self.view.is_bound(name) => {
                let values = self.eval_args(args)?;
                stdlib::call_function(name, values, self.limits)
            }
            Expr::Member { object, property } => {
                if let Expr::Ident { name } = object.as_ref() {
                    if stdlib::is_namespace(name) && !self.view.is_bound(name) {
                        let values = self.eval_args(args)?;
                        return stdlib::call_namespace(name, property, values);
                    }
                }
                let receiver = self.eval(object)?;
                let values = self.eval_args(args)?;
                stdlib::call_method(receiver, property, values, self.limits)
            }
            other => {
                let value = self.eval(other)?;
                Err(ExprError::TypeMismatch(format!(
                    "'{}' object is not callable",
                    value.type_name()
                )))
            }
        }
    }

    fn eval_args(&self, args: &[Expr]) -> Result<Vec<Val>, ExprError> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn binary(&self, op: BinaryOp, lhs: Val, rhs: Val) -> Result<Val, ExprError> {
        match op {
            BinaryOp::Add => self.add(lhs, rhs),
            BinaryOp::Sub => subtract(lhs, rhs),
            BinaryOp::Mul => self.multiply(lhs, rhs),
            BinaryOp::Div => divide(lhs, rhs),
            BinaryOp::FloorDiv => floor_divide(lhs, rhs),
            BinaryOp::Mod => modulo(lhs, rhs),
            BinaryOp::Eq => Ok(Val::Bool(lhs.loose_eq(&rhs))),
            BinaryOp::Ne => Ok(Val::Bool(!lhs.loose_eq(&rhs))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = lhs.compare(&rhs).ok_or_else(|| {
                    unsupported(op, &lhs, &rhs)
                })?;
                let result = match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(Val::Bool(result))
            }
            BinaryOp::In => contains(&rhs, &lhs).map(Val::Bool),
            BinaryOp::NotIn => contains(&rhs, &lhs).map(|found| Val::Bool(!found)),
            // Only reached for already-evaluated operands
            BinaryOp::And => Ok(if lhs.is_truthy() { rhs } else { lhs }),
            BinaryOp::Or => Ok(if lhs.is_truthy() { lhs } else { rhs }),
        }
    }

    fn add(&self, lhs: Val, rhs: Val) -> Result<Val, ExprError> {
        match (lhs, rhs) {
            (Val::Int(a), Val::Int(b)) => a.checked_add(b).map(Val::Int).ok_or(ExprError::Overflow),
            (Val::Str(a), Val::Str(b)) => Ok(Val::Str(a + &b)),
            (Val::List(mut a), Val::List(b)) => {
                self.limits.check_sequence(a.len() + b.len())?;
                a.extend(b);
                Ok(Val::List(a))
            }
            (Val::Date(d), Val::Duration(delta)) | (Val::Duration(delta), Val::Date(d)) => d
                .checked_add_signed(TimeDelta::days(whole_days(&delta)))
                .map(Val::Date)
                .ok_or(ExprError::Overflow),
            (Val::DateTime(dt), Val::Duration(delta)) | (Val::Duration(delta), Val::DateTime(dt)) => dt
                .checked_add_signed(delta)
                .map(Val::DateTime)
                .ok_or(ExprError::Overflow),
            (Val::Duration(a), Val::Duration(b)) => {
                a.checked_add(&b).map(Val::Duration).ok_or(ExprError::Overflow)
            }
            (lhs, rhs) => numeric(BinaryOp::Add, &lhs, &rhs, |a, b| a + b),
        }
    }

    fn multiply(&self, lhs: Val, rhs: Val) -> Result<Val, ExprError> {
        match (lhs, rhs) {
            (Val::Int(a), Val::Int(b)) => a.checked_mul(b).map(Val::Int).ok_or(ExprError::Overflow),
            (Val::Str(s), Val::Int(n)) | (Val::Int(n), Val::Str(s)) => {
                let count = usize::try_from(n).unwrap_or(0);
                self.limits.check_sequence(s.len().saturating_mul(count))?;
                Ok(Val::Str(s.repeat(count)))
            }
            (Val::List(items), Val::Int(n)) | (Val::Int(n), Val::List(items)) => {
                let count = usize::try_from(n).unwrap_or(0);
                if items.is_empty() || count == 0 {
                    return Ok(Val::List(Vec::new()));
                }
                self.limits.check_sequence(items.len().saturating_mul(count))?;
                Ok(Val::List((0..count).flat_map(|_| items.iter().cloned()).collect()))
            }
            (Val::Duration(d), Val::Int(n)) | (Val::Int(n), Val::Duration(d)) => d
                .num_milliseconds()
                .checked_mul(n)
                .and_then(TimeDelta::try_milliseconds)
                .map(Val::Duration)
                .ok_or(ExprError::Overflow),
            (lhs, rhs) => numeric(BinaryOp::Mul, &lhs, &rhs, |a, b| a * b),
        }
    }
}

/* ===================== Operators ===================== */

fn unsupported(op: BinaryOp, lhs: &Val, rhs: &Val) -> ExprError {
    ExprError::TypeMismatch(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op.symbol(),
        lhs.type_name(),
        rhs.type_name()
    ))
}

/// Mixed int/float arithmetic promoted to float
fn numeric(op: BinaryOp, lhs: &Val, rhs: &Val, f: impl Fn(f64, f64) -> f64) -> Result<Val, ExprError> {
    match (lhs, rhs) {
        (Val::Int(_) | Val::Float(_), Val::Int(_) | Val::Float(_)) => {
            Ok(Val::Float(f(as_float(lhs), as_float(rhs))))
        }
        _ => Err(unsupported(op, lhs, rhs)),
    }
}

fn as_float(value: &Val) -> f64 {
    match value {
        Val::Int(i) => *i as f64,
        Val::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn negate(value: Val) -> Result<Val, ExprError> {
    match value {
        Val::Int(i) => i.checked_neg().map(Val::Int).ok_or(ExprError::Overflow),
        Val::Float(f) => Ok(Val::Float(-f)),
        Val::Duration(d) => Ok(Val::Duration(-d)),
        other => Err(ExprError::TypeMismatch(format!(
            "bad operand type for unary -: '{}'",
            other.type_name()
        ))),
    }
}

fn subtract(lhs: Val, rhs: Val) -> Result<Val, ExprError> {
    match (lhs, rhs) {
        (Val::Int(a), Val::Int(b)) => a.checked_sub(b).map(Val::Int).ok_or(ExprError::Overflow),
        (Val::Date(a), Val::Date(b)) => Ok(Val::Duration(a.signed_duration_since(b))),
        (Val::DateTime(a), Val::DateTime(b)) => Ok(Val::Duration(a.signed_duration_since(b))),
        (Val::Date(d), Val::Duration(delta)) => d
            .checked_sub_signed(TimeDelta::days(whole_days(&delta)))
            .map(Val::Date)
            .ok_or(ExprError::Overflow),
        (Val::DateTime(dt), Val::Duration(delta)) => dt
            .checked_sub_signed(delta)
            .map(Val::DateTime)
            .ok_or(ExprError::Overflow),
        (Val::Duration(a), Val::Duration(b)) => {
            a.checked_sub(&b).map(Val::Duration).ok_or(ExprError::Overflow)
        }
        (lhs, rhs) => numeric(BinaryOp::Sub, &lhs, &rhs, |a, b| a - b),
    }
}

fn divide(lhs: Val, rhs: Val) -> Result<Val, ExprError> {
    if matches!(rhs, Val::Int(0)) || matches!(rhs, Val::Float(f) if f == 0.0) {
        return Err(ExprError::DivisionByZero);
    }
    numeric(BinaryOp::Div, &lhs, &rhs, |a, b| a / b)
}

fn floor_divide(lhs: Val, rhs: Val) -> Result<Val, ExprError> {
    match (&lhs, &rhs) {
        (Val::Int(_), Val::Int(0)) => Err(ExprError::DivisionByZero),
        (Val::Int(a), Val::Int(b)) => {
            let quotient = a.checked_div(*b).ok_or(ExprError::Overflow)?;
            // Round toward negative infinity
            if a % b != 0 && ((*a < 0) != (*b < 0)) {
                Ok(Val::Int(quotient - 1))
            } else {
                Ok(Val::Int(quotient))
            }
        }
        _ => {
            if as_float(&rhs) == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            numeric(BinaryOp::FloorDiv, &lhs, &rhs, |a, b| (a / b).floor())
        }
    }
}

fn modulo(lhs: Val, rhs: Val) -> Result<Val, ExprError> {
    match (&lhs, &rhs) {
        (Val::Int(_), Val::Int(0)) => Err(ExprError::DivisionByZero),
        (Val::Int(a), Val::Int(b)) => {
            let remainder = a.checked_rem(*b).ok_or(ExprError::Overflow)?;
            // Result takes the sign of the divisor
            if remainder != 0 && ((remainder < 0) != (*b < 0)) {
                Ok(Val::Int(remainder + b))
            } else {
                Ok(Val::Int(remainder))
            }
        }
        _ => {
            if as_float(&rhs) == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            numeric(BinaryOp::Mod, &lhs, &rhs, |a, b| a - b * (a / b).floor())
        }
    }
}

fn contains(container: &Val, item: &Val) -> Result<bool, ExprError> {
    match (container, item) {
        (Val::List(items), _) => Ok(items.iter().any(|candidate| candidate.loose_eq(item))),
        (Val::Str(haystack), Val::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Val::Obj(_), Val::Str(key)) => Ok(container.get_key(key).is_some()),
        (Val::Obj(_), _) => Ok(false),
        _ => Err(ExprError::TypeMismatch(format!(
            "argument of type '{}' is not a container for '{}'",
            container.type_name(),
            item.type_name()
        ))),
    }
}

/// Whole days of a duration, floored like Python's `timedelta.days`
pub(crate) fn whole_days(delta: &TimeDelta) -> i64 {
    delta.num_seconds().div_euclid(SECONDS_PER_DAY)
}

/* ===================== Access ===================== */

fn get_attribute(base: &Val, attribute: &str) -> Result<Val, ExprError> {
    use chrono::{Datelike, Timelike};

    let value = match (base, attribute) {
        (Val::Obj(_), key) => {
            return base
                .get_key(key)
                .cloned()
                .ok_or_else(|| ExprError::MissingKey(key.to_string()))
        }
        (Val::Date(d), "year") => Val::Int(d.year() as i64),
        (Val::Date(d), "month") => Val::Int(d.month() as i64),
        (Val::Date(d), "day") => Val::Int(d.day() as i64),
        (Val::DateTime(dt), "year") => Val::Int(dt.year() as i64),
        (Val::DateTime(dt), "month") => Val::Int(dt.month() as i64),
        (Val::DateTime(dt), "day") => Val::Int(dt.day() as i64),
        (Val::DateTime(dt), "hour") => Val::Int(dt.hour() as i64),
        (Val::DateTime(dt), "minute") => Val::Int(dt.minute() as i64),
        (Val::DateTime(dt), "second") => Val::Int(dt.second() as i64),
        (Val::Duration(d), "days") => Val::Int(whole_days(d)),
        (Val::Duration(d), "seconds") => Val::Int(d.num_seconds().rem_euclid(SECONDS_PER_DAY)),
        _ => {
            return Err(ExprError::NoSuchAttribute {
                type_name: base.type_name(),
                attribute: attribute.to_string(),
            })
        }
    };
    Ok(value)
}

fn get_index(base: &Val, key: &Val) -> Result<Val, ExprError> {
    match (base, key) {
        (Val::List(items), Val::Int(i)) => {
            let idx = normalize_index(*i, items.len())?;
            Ok(items[idx].clone())
        }
        (Val::Str(s), Val::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = normalize_index(*i, chars.len())?;
            Ok(Val::Str(chars[idx].to_string()))
        }
        (Val::Obj(_), Val::Str(k)) => base
            .get_key(k)
            .cloned()
            .ok_or_else(|| ExprError::MissingKey(k.clone())),
        (Val::Obj(_), other) => Err(ExprError::MissingKey(other.to_string())),
        _ => Err(ExprError::TypeMismatch(format!(
            "'{}' value cannot be indexed by '{}'",
            base.type_name(),
            key.type_name()
        ))),
    }
}

/// Python-style index: negative values count from the end
fn normalize_index(index: i64, len: usize) -> Result<usize, ExprError> {
    let resolved = if index < 0 {
        (len as i64).checked_add(index)
    } else {
        Some(index)
    };
    match resolved {
        Some(i) if i >= 0 && (i as usize) < len => Ok(i as usize),
        _ => Err(ExprError::IndexOutOfRange { index, len }),
    }
}
