//! Placeholder interpolation and bare-expression entry points
//!
//! A placeholder is a `{...}` span inside a string. Spans nest by brace depth
//! and quoted strings inside a span are skipped, so `{row.get('}', 0)}` is one
//! span. A doubled `{{expr}}` is read as `{expr}`.
//!
//! Failures never propagate out of interpolation: the span is replaced with an
//! error token and the failure is recorded on the [`Resolver`].

use serde_json::{Map, Value as JsonValue};

use super::eval::Evaluator;
use super::parser::parse_expression;
use super::value::Val;
use super::{ExprError, Limits};
use crate::interpreter::context::ScopeView;

/* ===================== Span Scanning ===================== */

/// Byte range of one placeholder, braces included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Expression text between the braces, with one extra brace pair removed
    /// for the doubled form
    pub fn expression<'t>(&self, text: &'t str) -> &'t str {
        let inner = text[self.start + 1..self.end - 1].trim();
        match inner.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(unwrapped) => unwrapped.trim(),
            None => inner,
        }
    }
}

/// Result of scanning a string for placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub spans: Vec<Span>,
    /// Byte offset of a `{` that is never closed; the rest of the text is literal
    pub unterminated: Option<usize>,
}

pub fn find_spans(text: &str) -> Scan {
    let bytes = text.as_bytes();
    let mut scan = Scan::default();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }

        let start = i;
        let mut depth = 0usize;
        let mut j = i;
        let mut closed = None;

        while j < bytes.len() {
            match bytes[j] {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        closed = Some(j);
                        break;
                    }
                }
                quote @ (b'\'' | b'"') => {
                    j += 1;
                    while j < bytes.len() && bytes[j] != quote {
                        if bytes[j] == b'\\' {
                            j += 1;
                        }
                        j += 1;
                    }
                }
                _ => {}
            }
            j += 1;
        }

        match closed {
            Some(end) => {
                scan.spans.push(Span { start, end: end + 1 });
                i = end + 1;
            }
            None => {
                scan.unterminated = Some(start);
                break;
            }
        }
    }

    scan
}

/* ===================== Resolver ===================== */

/// A placeholder that could not be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionIssue {
    pub expression: String,
    pub error: ExprError,
}

impl ResolutionIssue {
    /// Inline token substituted for the failed placeholder
    pub fn token(&self) -> String {
        if self.error.is_lookup_failure() {
            format!("<Unresolved {{{}}}>", self.expression)
        } else {
            format!("<Error resolving {{{}}}>", self.expression)
        }
    }
}

/// Resolves step arguments against one scope, collecting failures as it goes
pub struct Resolver<'a> {
    evaluator: Evaluator<'a>,
    issues: Vec<ResolutionIssue>,
}

impl<'a> Resolver<'a> {
    pub fn new(view: ScopeView<'a>, limits: &'a Limits) -> Self {
        Self {
            evaluator: Evaluator::new(view, limits),
            issues: Vec::new(),
        }
    }

    /// Parse and evaluate a bare expression
    pub fn eval_source(&self, source: &str) -> Result<Val, ExprError> {
        self.evaluator.limits().check_expression(source)?;
        let expr = parse_expression(source)?;
        self.evaluator.eval(&expr)
    }

    /// Substitute every placeholder in `text` with its rendered value
    pub fn interpolate(&mut self, text: &str) -> String {
        let scan = find_spans(text);
        if scan.spans.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for span in &scan.spans {
            out.push_str(&text[cursor..span.start]);
            match self.resolve_span(text, span) {
                Ok(value) => out.push_str(&value.to_string()),
                Err(token) => out.push_str(&token),
            }
            cursor = span.end;
        }
        out.push_str(&text[cursor..]);
        out
    }

    /// A string that is exactly one placeholder keeps the value's type;
    /// anything else becomes interpolated text
    pub fn resolve_template(&mut self, text: &str) -> Val {
        let scan = find_spans(text);
        match scan.spans.as_slice() {
            [only] if only.start == 0 && only.end == text.len() => {
                match self.resolve_span(text, only) {
                    Ok(value) => value,
                    Err(token) => Val::Str(token),
                }
            }
            [] => Val::Str(text.to_string()),
            _ => Val::Str(self.interpolate(text)),
        }
    }

    /// Resolve a JSON argument value; mappings and sequences recursively
    pub fn resolve_value(&mut self, value: &JsonValue) -> JsonValue {
        match value {
            JsonValue::String(text) => {
                if find_spans(text).spans.is_empty() {
                    value.clone()
                } else {
                    self.resolve_template(text).into_json()
                }
            }
            JsonValue::Array(items) => {
                JsonValue::Array(items.iter().map(|v| self.resolve_value(v)).collect())
            }
            JsonValue::Object(map) => JsonValue::Object(self.resolve_arguments(map)),
            _ => value.clone(),
        }
    }

    pub fn resolve_arguments(&mut self, args: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        args.iter()
            .map(|(key, value)| (key.clone(), self.resolve_value(value)))
            .collect()
    }

    pub fn issues(&self) -> &[ResolutionIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ResolutionIssue> {
        self.issues
    }

    fn resolve_span(&mut self, text: &str, span: &Span) -> Result<Val, String> {
        let source = span.expression(text);
        self.eval_source(source).map_err(|error| {
            let issue = ResolutionIssue {
                expression: source.to_string(),
                error,
            };
            let token = issue.token();
            self.issues.push(issue);
            token
        })
    }
}

/* ===================== Bare Expressions ===================== */

/// Evaluate a condition or loop source
///
/// The source may be a bare expression, a single `{expr}` span, or text with
/// embedded placeholders. Embedded placeholders are interpolated first and
/// the resulting text is then evaluated; any placeholder failure fails the
/// whole evaluation.
pub fn evaluate(source: &str, view: ScopeView<'_>, limits: &Limits) -> Result<Val, ExprError> {
    let mut resolver = Resolver::new(view, limits);
    let trimmed = source.trim();
    let scan = find_spans(trimmed);

    match scan.spans.as_slice() {
        [] => resolver.eval_source(trimmed),
        [only] if only.start == 0 && only.end == trimmed.len() => {
            resolver.eval_source(only.expression(trimmed))
        }
        _ => {
            let text = resolver.interpolate(trimmed);
            if let Some(issue) = resolver.into_issues().into_iter().next() {
                return Err(issue.error);
            }
            Resolver::new(view, limits).eval_source(&text)
        }
    }
}

/// Condition predicates coerce their result to a boolean
pub fn evaluate_condition(source: &str, view: ScopeView<'_>, limits: &Limits) -> Result<bool, ExprError> {
    evaluate(source, view, limits).map(|value| value.is_truthy())
}

/// Loop sources must produce a list (`range(..)` included)
pub fn evaluate_sequence(source: &str, view: ScopeView<'_>, limits: &Limits) -> Result<Vec<Val>, ExprError> {
    match evaluate(source, view, limits)? {
        Val::List(items) => {
            limits.check_sequence(items.len())?;
            Ok(items)
        }
        other => Err(ExprError::NotASequence(other.type_name())),
    }
}
