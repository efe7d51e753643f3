//! Variable storage for a single plan execution
//!
//! The [`Context`] is the one writable store: every Action output lands here,
//! no matter how deeply the step is nested. Loop variables never touch it.
//! They live in a [`Scope`] chain that only exists while a loop body runs, and
//! expressions read through a [`ScopeView`] that merges the two.

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    #[error("variable '{0}' is not defined")]
    MissingVariable(String),
}

/* ===================== Context ===================== */

/// Flat, insertion-ordered name -> value store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: Map<String, JsonValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Result<&JsonValue, ContextError> {
        self.vars
            .get(name)
            .ok_or_else(|| ContextError::MissingVariable(name.to_string()))
    }

    /// Bind or overwrite a variable. There is no removal.
    pub fn set(&mut self, name: impl Into<String>, value: JsonValue) {
        self.vars.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.vars.iter()
    }

    /// Read-only view that resolves `scope` bindings first, then this context
    pub fn with_overlay<'a>(&'a self, scope: &'a Scope<'a>) -> ScopeView<'a> {
        ScopeView {
            context: self,
            scope,
        }
    }

    /// View with no loop bindings
    pub fn view(&self) -> ScopeView<'_> {
        ScopeView {
            context: self,
            scope: &ROOT_SCOPE,
        }
    }

    /// Context as a JSON object (for printing and assertions)
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.vars.clone())
    }

    pub fn into_inner(self) -> Map<String, JsonValue> {
        self.vars
    }
}

impl From<Map<String, JsonValue>> for Context {
    fn from(vars: Map<String, JsonValue>) -> Self {
        Self { vars }
    }
}

/* ===================== Scope ===================== */

static ROOT_SCOPE: Scope<'static> = Scope {
    parent: None,
    bindings: Vec::new(),
};

/// Loop-local overlay: a parent link plus the bindings introduced at this level
///
/// Scopes are immutable once built. Entering a loop iteration creates a child
/// with [`Scope::extend`]; leaving the iteration simply drops it, so nothing a
/// loop binds survives the loop.
#[derive(Debug)]
pub struct Scope<'p> {
    parent: Option<&'p Scope<'p>>,
    bindings: Vec<(String, JsonValue)>,
}

impl Scope<'static> {
    pub fn root() -> Self {
        Scope {
            parent: None,
            bindings: Vec::new(),
        }
    }
}

impl<'p> Scope<'p> {
    /// Child scope binding `name` to `value` on top of this one
    pub fn extend<'s>(&'s self, name: impl Into<String>, value: JsonValue) -> Scope<'s> {
        Scope {
            parent: Some(self),
            bindings: vec![(name.into(), value)],
        }
    }

    /// Innermost binding for `name`, if any level of the chain has one
    pub fn lookup(&self, name: &str) -> Option<&JsonValue> {
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some((_, value)) = scope.bindings.iter().rev().find(|(n, _)| n == name) {
                return Some(value);
            }
            current = scope.parent;
        }
        None
    }

    /// Number of nested levels above the root
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent;
        while let Some(scope) = current {
            depth += 1;
            current = scope.parent;
        }
        depth
    }
}

/* ===================== ScopeView ===================== */

/// Effective scope for resolving expressions: overlay first, then the context
#[derive(Debug, Clone, Copy)]
pub struct ScopeView<'a> {
    context: &'a Context,
    scope: &'a Scope<'a>,
}

impl<'a> ScopeView<'a> {
    pub fn lookup(&self, name: &str) -> Option<&'a JsonValue> {
        self.scope.lookup(name).or_else(|| self.context.vars.get(name))
    }

    pub fn get(&self, name: &str) -> Result<&'a JsonValue, ContextError> {
        self.lookup(name)
            .ok_or_else(|| ContextError::MissingVariable(name.to_string()))
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}
