//! Expression Resolver
//!
//! A closed expression language used in three places: `{...}` placeholders in
//! step arguments, condition predicates, and loop sources. Expressions are
//! parsed with pest into [`ast::Expr`], evaluated by [`eval::Evaluator`]
//! against a [`ScopeView`](crate::interpreter::context::ScopeView), and may
//! only call the helpers listed in [`stdlib`].

pub mod ast;
pub mod eval;
pub mod parser;
pub mod stdlib;
pub mod template;
pub mod value;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use eval::Evaluator;
pub use parser::parse_expression;
pub use template::{
    evaluate, evaluate_condition, evaluate_sequence, find_spans, ResolutionIssue, Resolver, Scan,
    Span,
};
pub use value::Val;

/* ===================== Errors ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("name '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("key '{0}' not found")]
    MissingKey(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("'{type_name}' value has no attribute '{attribute}'")]
    NoSuchAttribute {
        type_name: &'static str,
        attribute: String,
    },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("type error: {0}")]
    TypeMismatch(String),

    #[error("{function}() takes {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("sequence of {0} elements exceeds the configured limit")]
    TooLarge(usize),

    #[error("expected a sequence, got {0}")]
    NotASequence(&'static str),

    #[error("expression of {0} bytes exceeds the configured limit")]
    TooLong(usize),
}

impl ExprError {
    /// Lookup failures render as `<Unresolved ...>`, everything else as
    /// `<Error resolving ...>`
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            ExprError::UndefinedVariable(_)
                | ExprError::MissingKey(_)
                | ExprError::IndexOutOfRange { .. }
        )
    }
}

/* ===================== Limits ===================== */

/// Resource bounds applied while evaluating untrusted expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_expression_len: usize,
    pub max_sequence_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_expression_len: 4096,
            max_sequence_len: 100_000,
        }
    }
}

impl Limits {
    pub(crate) fn check_sequence(&self, len: usize) -> Result<(), ExprError> {
        if len > self.max_sequence_len {
            return Err(ExprError::TooLarge(len));
        }
        Ok(())
    }

    pub(crate) fn check_expression(&self, source: &str) -> Result<(), ExprError> {
        if source.len() > self.max_expression_len {
            return Err(ExprError::TooLong(source.len()));
        }
        Ok(())
    }
}
