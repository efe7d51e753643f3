pub mod context;
pub mod executor;
pub mod expression;
pub mod plan;
pub mod validator;

pub use context::{Context, ContextError, Scope, ScopeView};
pub use executor::{FailureKind, Interpreter, Outcome, RunReport, RunSummary, StepEvent};
pub use expression::{ExprError, Limits, Val};
pub use plan::{
    ActionStep, ConditionStep, LoopSource, LoopStep, MalformedStep, Plan, PlanError, Step, StepKind,
};
pub use validator::{check_plan, Diagnostic, Severity};
