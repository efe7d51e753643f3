//! Plan document model
//!
//! A plan is YAML with an informational `task` label and an ordered `steps`
//! list:
//!
//! ```yaml
//! task: "Review pending orders"
//! steps:
//!   - name: "Fetch pending orders"
//!     function: "customer_order.get_pending_orders"
//!     output_var: "pending_orders"
//!
//!   - loop:
//!       variable: "order"
//!       over: "{pending_orders}"
//!     steps:
//!       - name: "Report"
//!         function: "message.write_message"
//!         arguments:
//!           message: "Order {order['order_id']} is {order['status']}"
//!
//!   - condition: "len(pending_orders) > 5"
//!     steps: []
//! ```
//!
//! A step with a `loop` key is a loop, otherwise one with a `condition` key is
//! a condition, otherwise it is an action. Unknown keys are ignored.
//!
//! Only a document that is not YAML, or whose `steps` is not a list, fails to
//! load. A step with a broken shape (`over: {pending}` left unquoted, a
//! mapping as `condition`, scalar `arguments`) loads as [`Step::Malformed`]
//! and fails on its own when the plan runs.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_STEP_NAME: &str = "Unnamed Step";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to parse plan YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read plan value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read plan file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/* ===================== Plan ===================== */

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Plan {
    /// Free-text label; informational only
    #[serde(default, deserialize_with = "lenient_text")]
    pub task: Option<String>,

    #[serde(default, deserialize_with = "step_list")]
    pub steps: Vec<Step>,

    /// SHA-256 of the source text, when loaded from text
    #[serde(skip)]
    pub version_hash: Option<String>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            task: None,
            steps,
            version_hash: None,
        }
    }

    pub fn from_yaml(source: &str) -> Result<Self, PlanError> {
        let mut plan: Plan = serde_yaml::from_str(source)?;
        plan.version_hash = Some(hash_source(source));
        Ok(plan)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Build a plan from an already-parsed document
    pub fn from_value(value: JsonValue) -> Result<Self, PlanError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Total number of steps, nested ones included
    pub fn step_count(&self) -> usize {
        fn count(steps: &[Step]) -> usize {
            steps.iter().map(|s| 1 + count(s.nested())).sum()
        }
        count(&self.steps)
    }
}

fn hash_source(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(text(Option::<JsonValue>::deserialize(deserializer)?))
}

fn step_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Step>, D::Error> {
    Ok(Option::<Vec<Step>>::deserialize(deserializer)?.unwrap_or_default())
}

/* ===================== Steps ===================== */

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "JsonValue")]
pub enum Step {
    Action(ActionStep),
    Condition(ConditionStep),
    Loop(LoopStep),
    /// A step whose shape could not be read; never executed
    Malformed(MalformedStep),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionStep {
    pub name: String,
    /// Qualified capability name; a missing one is a dispatch miss at run time
    pub function: Option<String>,
    pub arguments: Map<String, JsonValue>,
    pub output_var: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionStep {
    pub name: String,
    pub condition: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopStep {
    pub name: String,
    pub variable: String,
    pub over: LoopSource,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MalformedStep {
    pub name: String,
    /// What the step was meant to be, from the keys it carries
    pub kind: StepKind,
    pub problem: String,
}

/// What a loop iterates: an expression, or a literal list whose elements may
/// themselves contain placeholders
#[derive(Debug, Clone, PartialEq)]
pub enum LoopSource {
    Expression(String),
    Items(Vec<JsonValue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Action,
    Condition,
    Loop,
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Step::Action(a) => &a.name,
            Step::Condition(c) => &c.name,
            Step::Loop(l) => &l.name,
            Step::Malformed(m) => &m.name,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Step::Action(_) => StepKind::Action,
            Step::Condition(_) => StepKind::Condition,
            Step::Loop(_) => StepKind::Loop,
            Step::Malformed(m) => m.kind,
        }
    }

    pub fn nested(&self) -> &[Step] {
        match self {
            Step::Action(_) | Step::Malformed(_) => &[],
            Step::Condition(c) => &c.steps,
            Step::Loop(l) => &l.steps,
        }
    }
}

/* ===================== Raw Document Shape ===================== */

impl From<JsonValue> for Step {
    fn from(value: JsonValue) -> Self {
        let mut raw = match value {
            JsonValue::Object(raw) => raw,
            other => {
                return Step::Malformed(MalformedStep {
                    name: DEFAULT_STEP_NAME.to_string(),
                    kind: StepKind::Action,
                    problem: format!("a step must be a mapping, got {}", other),
                })
            }
        };

        let name = text(raw.remove("name"))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STEP_NAME.to_string());
        let steps = take(&mut raw, "steps");

        let (kind, built) = if let Some(spec) = take(&mut raw, "loop") {
            (StepKind::Loop, loop_step(&name, spec, steps))
        } else if let Some(condition) = take(&mut raw, "condition") {
            (StepKind::Condition, condition_step(&name, condition, steps))
        } else {
            (StepKind::Action, action_step(&name, raw))
        };

        built.unwrap_or_else(|problem| Step::Malformed(MalformedStep { name, kind, problem }))
    }
}

fn loop_step(name: &str, spec: JsonValue, steps: Option<JsonValue>) -> Result<Step, String> {
    let mut spec = match spec {
        JsonValue::Object(spec) => spec,
        other => {
            return Err(format!(
                "'loop' must be a mapping with 'variable' and 'over', got {}",
                other
            ))
        }
    };

    let variable = match take(&mut spec, "variable") {
        Some(JsonValue::String(v)) if !v.trim().is_empty() => v.trim().to_string(),
        None => return Err("loop is missing 'variable'".to_string()),
        Some(other) => return Err(format!("loop 'variable' must be a name, got {}", other)),
    };

    let over = match take(&mut spec, "over") {
        Some(JsonValue::String(expr)) => LoopSource::Expression(expr),
        Some(JsonValue::Array(items)) => LoopSource::Items(items),
        None => return Err("loop is missing 'over'".to_string()),
        // `over: {pending}` without quotes reads as the mapping {pending: null}
        Some(JsonValue::Object(map)) if map.len() == 1 && map.values().all(JsonValue::is_null) => {
            let key = map.keys().next().map(String::as_str).unwrap_or_default();
            return Err(format!(
                "loop 'over' is a mapping; quote the placeholder as over: \"{{{}}}\"",
                key
            ));
        }
        Some(other) => {
            return Err(format!(
                "loop 'over' must be an expression or a list, got {}",
                other
            ))
        }
    };

    Ok(Step::Loop(LoopStep {
        name: name.to_string(),
        variable,
        over,
        steps: nested_steps(steps)?,
    }))
}

fn condition_step(name: &str, condition: JsonValue, steps: Option<JsonValue>) -> Result<Step, String> {
    let condition = match condition {
        JsonValue::String(expr) => expr,
        JsonValue::Bool(true) => "True".to_string(),
        JsonValue::Bool(false) => "False".to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => return Err(format!("condition must be an expression, got {}", other)),
    };

    Ok(Step::Condition(ConditionStep {
        name: name.to_string(),
        condition,
        steps: nested_steps(steps)?,
    }))
}

fn action_step(name: &str, mut raw: Map<String, JsonValue>) -> Result<Step, String> {
    let function = match take(&mut raw, "function") {
        None => None,
        Some(JsonValue::String(function)) => Some(function),
        Some(other) => return Err(format!("function must be a qualified name, got {}", other)),
    };

    let arguments = match take(&mut raw, "arguments") {
        None => Map::new(),
        Some(JsonValue::Object(map)) => map,
        Some(other) => return Err(format!("arguments must be a mapping, got {}", other)),
    };

    let output_var = match take(&mut raw, "output_var") {
        None => None,
        Some(JsonValue::String(var)) => Some(var).filter(|v| !v.is_empty()),
        Some(other) => return Err(format!("output_var must be a name, got {}", other)),
    };

    Ok(Step::Action(ActionStep {
        name: name.to_string(),
        function,
        arguments,
        output_var,
    }))
}

fn nested_steps(steps: Option<JsonValue>) -> Result<Vec<Step>, String> {
    match steps {
        None => Ok(Vec::new()),
        Some(JsonValue::Array(items)) => Ok(items.into_iter().map(Step::from).collect()),
        Some(other) => Err(format!("'steps' must be a list, got {}", other)),
    }
}

/// Present and not null
fn take(raw: &mut Map<String, JsonValue>, key: &str) -> Option<JsonValue> {
    raw.remove(key).filter(|value| !value.is_null())
}

/// Scalars as text; anything else is treated as absent
fn text(value: Option<JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) => Some(s),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
