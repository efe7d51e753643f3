//! Static plan check
//!
//! Walks the step tree without executing anything and reports what would go
//! wrong at run time: dispatch misses, malformed steps, unparseable
//! expressions, unterminated placeholders. Running it is optional; the interpreter never calls it.
//!
//! ```ignore
//! let plan = Plan::from_file("plan.yaml")?;
//! let registry = StepRegistry::build_session("scm");
//! for diagnostic in check_plan(&plan, &registry) {
//!     eprintln!("{}", diagnostic);
//! }
//! ```

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::interpreter::expression::{find_spans, parse_expression};
use crate::interpreter::plan::{LoopSource, Plan, Step};
use crate::registry::StepRegistry;

/* ===================== Diagnostics ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Will fail at run time
    Error,
    /// Runs, but probably not as intended
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Step location, indices joined with `.`
    pub path: String,
    pub step: String,
    pub severity: Severity,
    pub message: String,
    pub rule_id: &'static str,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{} at step {} ({}): {} [{}]",
            severity, self.path, self.step, self.message, self.rule_id
        )
    }
}

/* ===================== Check ===================== */

pub fn check_plan(plan: &Plan, registry: &StepRegistry) -> Vec<Diagnostic> {
    let mut checker = Checker {
        registry,
        diagnostics: Vec::new(),
    };
    checker.check_steps(&plan.steps, "");
    checker.diagnostics
}

struct Checker<'a> {
    registry: &'a StepRegistry,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Checker<'a> {
    fn check_steps(&mut self, steps: &[Step], prefix: &str) {
        for (index, step) in steps.iter().enumerate() {
            let path = if prefix.is_empty() {
                index.to_string()
            } else {
                format!("{}.{}", prefix, index)
            };
            let at = At {
                path: &path,
                step: step.name(),
            };

            match step {
                Step::Action(action) => {
                    match action.function.as_deref() {
                        None => self.push(&at, Severity::Error, "missing-function", "action step has no 'function'".to_string()),
                        Some(function) if !self.registry.contains(function) => self.push(
                            &at,
                            Severity::Error,
                            "unknown-function",
                            format!("function '{}' is not registered", function),
                        ),
                        Some(_) => {}
                    }
                    for (name, value) in &action.arguments {
                        self.check_value(&at, value, &format!("argument '{}'", name));
                    }
                }
                Step::Condition(condition) => {
                    self.check_source(&at, &condition.condition, "condition");
                    if condition.steps.is_empty() {
                        self.push(&at, Severity::Warning, "empty-body", "condition has no nested steps".to_string());
                    }
                    self.check_steps(&condition.steps, &path);
                }
                Step::Loop(looped) => {
                    match &looped.over {
                        LoopSource::Expression(source) => self.check_source(&at, source, "loop source"),
                        LoopSource::Items(items) => {
                            for item in items {
                                self.check_value(&at, item, "loop item");
                            }
                        }
                    }
                    if looped.steps.is_empty() {
                        self.push(&at, Severity::Warning, "empty-body", "loop has no nested steps".to_string());
                    }
                    self.check_steps(&looped.steps, &path);
                }
                Step::Malformed(malformed) => {
                    self.push(&at, Severity::Error, "malformed-step", malformed.problem.clone());
                }
            }
        }
    }

    /// Condition or loop source: a bare expression, or text with placeholders
    fn check_source(&mut self, at: &At<'_>, source: &str, what: &str) {
        let trimmed = source.trim();
        let scan = find_spans(trimmed);
        if scan.spans.is_empty() && scan.unterminated.is_none() {
            if let Err(err) = parse_expression(trimmed) {
                self.push(at, Severity::Error, "expression-syntax", format!("{} '{}': {}", what, trimmed, err));
            }
            return;
        }
        self.check_text(at, trimmed, what);
    }

    fn check_value(&mut self, at: &At<'_>, value: &JsonValue, what: &str) {
        match value {
            JsonValue::String(text) => self.check_text(at, text, what),
            JsonValue::Array(items) => {
                for item in items {
                    self.check_value(at, item, what);
                }
            }
            JsonValue::Object(map) => {
                for item in map.values() {
                    self.check_value(at, item, what);
                }
            }
            _ => {}
        }
    }

    /// Every placeholder in `text` must parse
    fn check_text(&mut self, at: &At<'_>, text: &str, what: &str) {
        let scan = find_spans(text);
        for span in &scan.spans {
            let expression = span.expression(text);
            if let Err(err) = parse_expression(expression) {
                self.push(
                    at,
                    Severity::Error,
                    "expression-syntax",
                    format!("{} placeholder '{{{}}}': {}", what, expression, err),
                );
            }
        }
        if let Some(offset) = scan.unterminated {
            self.push(
                at,
                Severity::Warning,
                "unterminated-placeholder",
                format!("{} has an unclosed '{{' at offset {}", what, offset),
            );
        }
    }

    fn push(&mut self, at: &At<'_>, severity: Severity, rule_id: &'static str, message: String) {
        self.diagnostics.push(Diagnostic {
            path: at.path.to_string(),
            step: at.step.to_string(),
            severity,
            message,
            rule_id,
        });
    }
}

struct At<'s> {
    path: &'s str,
    step: &'s str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Vec<Diagnostic> {
        let plan = Plan::from_yaml(source).unwrap();
        check_plan(&plan, &StepRegistry::build_session("scm"))
    }

    fn rules(diagnostics: &[Diagnostic]) -> Vec<&'static str> {
        diagnostics.iter().map(|d| d.rule_id).collect()
    }

    #[test]
    fn test_clean_plan() {
        let diagnostics = check(
            r#"
steps:
  - function: "customer_order.get_pending_orders"
    output_var: "pending_orders"
  - loop: { variable: "order", over: "{pending_orders}" }
    steps:
      - condition: "order['status'] == 'Pending'"
        steps:
          - function: "message.write_message"
            arguments:
              message: "Processing order {order['order_id']}"
"#,
        );
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_unknown_and_missing_functions() {
        let diagnostics = check(
            r#"
steps:
  - function: "foo.bar"
  - name: "No function"
  - loop: { variable: "x", over: [1] }
    steps:
      - function: "inventory.nope"
"#,
        );
        assert_eq!(rules(&diagnostics), vec!["unknown-function", "missing-function", "unknown-function"]);
        assert_eq!(diagnostics[1].step, "No function");
        assert_eq!(diagnostics[2].path, "2.0");
        assert!(diagnostics.iter().all(Diagnostic::is_error));
    }

    #[test]
    fn test_malformed_steps() {
        let diagnostics = check(
            r#"
steps:
  - name: "Walk"
    loop: { variable: "order", over: {pending_orders} }
    steps: []
  - function: "message.write_message"
    arguments: "hello"
"#,
        );
        assert_eq!(rules(&diagnostics), vec!["malformed-step", "malformed-step"]);
        assert_eq!(diagnostics[0].step, "Walk");
        assert!(diagnostics[1].message.contains("arguments must be a mapping"));
    }

    #[test]
    fn test_expression_syntax_errors() {
        let diagnostics = check(
            r#"
steps:
  - condition: "1 >"
    steps:
      - function: "message.write_message"
        arguments:
          message: "Total {1 +}"
  - loop: { variable: "x", over: "{range(}" }
    steps:
      - function: "message.write_message"
        arguments: { message: "ok" }
"#,
        );
        assert_eq!(
            rules(&diagnostics),
            vec!["expression-syntax", "expression-syntax", "expression-syntax"]
        );
        assert_eq!(diagnostics[1].path, "0.0");
    }

    #[test]
    fn test_warnings() {
        let diagnostics = check(
            r#"
steps:
  - condition: "True"
    steps: []
  - function: "message.write_message"
    arguments: { message: "open {brace" }
"#,
        );
        assert_eq!(rules(&diagnostics), vec!["empty-body", "unterminated-placeholder"]);
        assert!(diagnostics.iter().all(|d| !d.is_error()));
        assert_eq!(
            diagnostics[0].to_string(),
            "warning at step 0 (Unnamed Step): condition has no nested steps [empty-body]"
        );
    }
}
