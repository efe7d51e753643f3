//! Capability contract
//!
//! A capability is a named callable taking keyword arguments (a JSON object)
//! and returning a JSON value. Capabilities are grouped by namespace, and
//! groups are bundled into a module (`CORE`, `SCMAPI`, ...). Every capability
//! carries an explicit [`CapabilitySpec`] that describes its parameters and an
//! example step for the manifest.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Keyword arguments passed to a capability
pub type Arguments = Map<String, JsonValue>;

pub type CapabilityFn = Rc<dyn Fn(Arguments) -> Result<JsonValue>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("{function}() missing required argument '{name}'")]
    Missing { function: String, name: String },

    #[error("{function}() got an unexpected argument '{name}'")]
    Unexpected { function: String, name: String },

    #[error("{function}() argument '{name}' must be {expected}, got {got}")]
    WrongType {
        function: String,
        name: String,
        expected: ParamKind,
        got: String,
    },
}

/* ===================== Specs ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    List,
    Object,
    Any,
}

impl ParamKind {
    pub fn accepts(&self, value: &JsonValue) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::List => value.is_array(),
            ParamKind::Object => value.is_object(),
            ParamKind::Any => true,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::String => "a string",
            ParamKind::Integer => "an integer",
            ParamKind::Number => "a number",
            ParamKind::Boolean => "a boolean",
            ParamKind::List => "a list",
            ParamKind::Object => "a mapping",
            ParamKind::Any => "any value",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
}

/// Machine-readable description of one capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub method: String,
    pub summary: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// A runnable single-step plan fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<JsonValue>,
}

impl CapabilitySpec {
    pub fn new(method: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            summary: summary.into(),
            params: Vec::new(),
            example: None,
        }
    }

    pub fn required(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    pub fn example(mut self, step: JsonValue) -> Self {
        self.example = Some(step);
        self
    }

    /// Signature check applied before every call: required parameters are
    /// present, nothing undeclared is passed, and declared kinds match.
    /// `null` is accepted for optional parameters.
    pub fn check_arguments(&self, args: &Arguments) -> Result<(), ArgumentError> {
        for name in args.keys() {
            if !self.params.iter().any(|p| &p.name == name) {
                return Err(ArgumentError::Unexpected {
                    function: self.method.clone(),
                    name: name.clone(),
                });
            }
        }

        for param in &self.params {
            match args.get(&param.name) {
                None if param.required => {
                    return Err(ArgumentError::Missing {
                        function: self.method.clone(),
                        name: param.name.clone(),
                    })
                }
                Some(JsonValue::Null) if !param.required => {}
                Some(value) if !param.kind.accepts(value) => {
                    return Err(ArgumentError::WrongType {
                        function: self.method.clone(),
                        name: param.name.clone(),
                        expected: param.kind,
                        got: json_type_name(value).to_string(),
                    })
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(n) if n.is_i64() => "an integer",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a mapping",
    }
}

/* ===================== Capabilities ===================== */

#[derive(Clone)]
pub struct Capability {
    spec: CapabilitySpec,
    func: CapabilityFn,
}

impl Capability {
    pub fn new<F>(spec: CapabilitySpec, func: F) -> Self
    where
        F: Fn(Arguments) -> Result<JsonValue> + 'static,
    {
        Self {
            spec,
            func: Rc::new(func),
        }
    }

    pub fn method(&self) -> &str {
        &self.spec.method
    }

    pub fn spec(&self) -> &CapabilitySpec {
        &self.spec
    }

    /// Check the arguments against the spec, then invoke
    pub fn call(&self, args: Arguments) -> Result<JsonValue> {
        self.spec.check_arguments(&args)?;
        (self.func)(args)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("method", &self.spec.method)
            .finish_non_exhaustive()
    }
}

/// Capabilities sharing one namespace (`inventory`, `customer_order`, ...)
#[derive(Debug, Clone)]
pub struct CapabilityGroup {
    name: String,
    capabilities: Vec<Capability>,
}

impl CapabilityGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry namespace: the lower-cased group name
    pub fn namespace(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }
}

/// Top-level aggregate of groups (`CORE`, `SCMAPI`)
#[derive(Debug, Clone)]
pub struct CapabilityModule {
    name: String,
    groups: Vec<CapabilityGroup>,
}

impl CapabilityModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: CapabilityGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[CapabilityGroup] {
        &self.groups
    }
}

/* ===================== Argument Helpers ===================== */

// Callables run after `check_arguments`, so these only fail when a callable
// reads a parameter its spec does not declare.

pub fn required_str<'a>(args: &'a Arguments, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| anyhow::anyhow!("argument '{}' must be a string", name))
}

pub fn optional_str<'a>(args: &'a Arguments, name: &str) -> Option<&'a str> {
    args.get(name).and_then(JsonValue::as_str)
}

pub fn required_i64(args: &Arguments, name: &str) -> Result<i64> {
    args.get(name)
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| anyhow::anyhow!("argument '{}' must be an integer", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: JsonValue) -> Arguments {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("arguments must be an object"),
        }
    }

    fn spec() -> CapabilitySpec {
        CapabilitySpec::new("adjust_stock", "Adjust stock")
            .required("product_id", ParamKind::String)
            .required("delta", ParamKind::Integer)
            .optional("reason", ParamKind::String)
    }

    #[test]
    fn test_check_arguments_accepts_valid_call() {
        assert!(spec()
            .check_arguments(&args(json!({"product_id": "P001", "delta": -2})))
            .is_ok());
        assert!(spec()
            .check_arguments(&args(json!({"product_id": "P001", "delta": 1, "reason": null})))
            .is_ok());
    }

    #[test]
    fn test_check_arguments_errors() {
        assert_eq!(
            spec().check_arguments(&args(json!({"delta": 1}))),
            Err(ArgumentError::Missing {
                function: "adjust_stock".to_string(),
                name: "product_id".to_string()
            })
        );
        assert!(matches!(
            spec().check_arguments(&args(json!({"product_id": "P001", "delta": 1, "qty": 3}))),
            Err(ArgumentError::Unexpected { .. })
        ));
        let err = spec()
            .check_arguments(&args(json!({"product_id": "P001", "delta": "three"})))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "adjust_stock() argument 'delta' must be an integer, got a string"
        );
    }

    #[test]
    fn test_call_checks_before_invoking() {
        let capability = Capability::new(spec(), |args| {
            Ok(json!({"delta": required_i64(&args, "delta")?}))
        });
        assert_eq!(
            capability
                .call(args(json!({"product_id": "P001", "delta": 4})))
                .unwrap(),
            json!({"delta": 4})
        );
        assert!(capability.call(Arguments::new()).is_err());
    }

    #[test]
    fn test_group_namespace_is_lowercase() {
        let group = CapabilityGroup::new("Customer_Order");
        assert_eq!(group.namespace(), "customer_order");
    }
}
