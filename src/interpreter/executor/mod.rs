//! Step Interpreter
//!
//! Walks a plan depth-first, one step at a time. Each node is one of:
//!
//! - **Action**: resolve arguments, dispatch by qualified name, store the result
//! - **Condition**: evaluate the predicate, run the nested steps if it holds
//! - **Loop**: evaluate the source, run the nested steps once per element with
//!   the loop variable bound in a read-only overlay
//!
//! Nothing is fatal. Every failure is isolated to the step that produced it,
//! logged, and recorded in the [`RunReport`]; the walk always reaches the end
//! of the plan.

pub mod report;

#[cfg(test)]
mod tests;

pub use report::{FailureKind, Outcome, RunReport, RunSummary, StepEvent};

use serde_json::Value as JsonValue;
use tracing::{debug, error, info, info_span, warn};

use crate::interpreter::context::{Context, Scope};
use crate::interpreter::expression::{
    evaluate_condition, evaluate_sequence, Limits, ResolutionIssue, Resolver, Val,
};
use crate::interpreter::plan::{
    ActionStep, ConditionStep, LoopSource, LoopStep, MalformedStep, Plan, PlanError, Step,
    StepKind,
};
use crate::registry::StepRegistry;

/// One interpreter per plan execution: a fresh Context plus a session registry
pub struct Interpreter {
    context: Context,
    registry: StepRegistry,
    limits: Limits,
}

impl Interpreter {
    pub fn new(registry: StepRegistry) -> Self {
        Self {
            context: Context::new(),
            registry,
            limits: Limits::default(),
        }
    }

    /// Interpreter over a session built for `app_id` from the built-in catalog
    pub fn for_app(app_id: &str) -> Self {
        Self::new(StepRegistry::build_session(app_id))
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Start from pre-seeded bindings instead of an empty Context
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    /// Parse a YAML plan and run it. Only an unreadable document is an error.
    pub fn execute_task(&mut self, source: &str) -> Result<RunReport, PlanError> {
        let plan = Plan::from_yaml(source)?;
        Ok(self.execute_plan(&plan))
    }

    /// Walk the whole plan
    pub fn execute_plan(&mut self, plan: &Plan) -> RunReport {
        let mut report = RunReport::new(plan.task.clone(), plan.version_hash.clone());

        let span = info_span!("run", run_id = %report.run_id);
        let _guard = span.enter();

        info!(
            task = plan.task.as_deref().unwrap_or(""),
            steps = plan.step_count(),
            "Executing plan"
        );

        let mut run = Run {
            context: &mut self.context,
            registry: &self.registry,
            limits: &self.limits,
            report: &mut report,
        };
        run.run_steps(&plan.steps, &Scope::root(), "");

        let summary = report.summary();
        info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Plan finished"
        );
        report
    }
}

/* ===================== Step Walk ===================== */

/// Borrowed state for one walk of the step tree
struct Run<'r> {
    context: &'r mut Context,
    registry: &'r StepRegistry,
    limits: &'r Limits,
    report: &'r mut RunReport,
}

impl<'r> Run<'r> {
    fn run_steps(&mut self, steps: &[Step], scope: &Scope<'_>, prefix: &str) {
        for (index, step) in steps.iter().enumerate() {
            let path = if prefix.is_empty() {
                index.to_string()
            } else {
                format!("{}.{}", prefix, index)
            };

            match step {
                Step::Action(action) => self.dispatch_action(action, scope, &path),
                Step::Condition(condition) => self.gate_condition(condition, scope, &path),
                Step::Loop(looped) => self.drive_loop(looped, scope, &path),
                Step::Malformed(step) => self.reject_malformed(step, &path),
            }
        }
    }

    fn dispatch_action(&mut self, action: &ActionStep, scope: &Scope<'_>, path: &str) {
        let mut resolver = Resolver::new(self.context.with_overlay(scope), self.limits);
        let arguments = resolver.resolve_arguments(&action.arguments);
        let issues = resolver.into_issues();
        self.record_issues(path, &action.name, StepKind::Action, issues);

        let Some(function) = action.function.as_deref() else {
            error!(step = %action.name, "Action step has no function");
            self.fail(
                path,
                &action.name,
                StepKind::Action,
                FailureKind::DispatchMiss,
                "step has no function".to_string(),
            );
            return;
        };

        let Some(entry) = self.registry.lookup(function) else {
            error!(step = %action.name, function = %function, "Function not found in registry");
            self.fail(
                path,
                &action.name,
                StepKind::Action,
                FailureKind::DispatchMiss,
                format!("function '{}' is not registered", function),
            );
            return;
        };

        info!(step = %action.name, function = %function, "Executing step");
        match entry.call(arguments) {
            Ok(result) => {
                if let Some(output_var) = &action.output_var {
                    debug!(output_var = %output_var, "Storing step result");
                    self.context.set(output_var.clone(), result);
                }
                self.report.record(
                    path,
                    &action.name,
                    StepKind::Action,
                    Outcome::Completed {
                        output_var: action.output_var.clone(),
                    },
                );
            }
            Err(err) => {
                error!(step = %action.name, function = %function, error = %format!("{:#}", err), "Step failed");
                self.fail(
                    path,
                    &action.name,
                    StepKind::Action,
                    FailureKind::Capability,
                    format!("{:#}", err),
                );
            }
        }
    }

    fn gate_condition(&mut self, step: &ConditionStep, scope: &Scope<'_>, path: &str) {
        let view = self.context.with_overlay(scope);
        match evaluate_condition(&step.condition, view, self.limits) {
            Ok(true) => {
                debug!(step = %step.name, condition = %step.condition, "Condition holds");
                self.report.record(
                    path,
                    &step.name,
                    StepKind::Condition,
                    Outcome::Completed { output_var: None },
                );
                self.run_steps(&step.steps, scope, path);
            }
            Ok(false) => {
                info!(step = %step.name, condition = %step.condition, "Condition false; skipping nested steps");
                self.report.record(
                    path,
                    &step.name,
                    StepKind::Condition,
                    Outcome::Skipped {
                        reason: "condition is false".to_string(),
                    },
                );
            }
            Err(err) => {
                warn!(step = %step.name, condition = %step.condition, error = %err, "Condition failed to evaluate; treating as false");
                self.fail(
                    path,
                    &step.name,
                    StepKind::Condition,
                    FailureKind::Condition,
                    format!("{}: {}", step.condition, err),
                );
            }
        }
    }

    fn drive_loop(&mut self, step: &LoopStep, scope: &Scope<'_>, path: &str) {
        let items = match self.loop_items(step, scope, path) {
            Ok(items) => items,
            Err(message) => {
                warn!(step = %step.name, variable = %step.variable, error = %message, "Loop source invalid; skipping loop");
                self.fail(path, &step.name, StepKind::Loop, FailureKind::LoopSource, message);
                return;
            }
        };

        if items.is_empty() {
            info!(step = %step.name, variable = %step.variable, "Loop source is empty");
            self.report.record(
                path,
                &step.name,
                StepKind::Loop,
                Outcome::Skipped {
                    reason: "loop source is empty".to_string(),
                },
            );
            return;
        }

        info!(step = %step.name, variable = %step.variable, iterations = items.len(), "Starting loop");
        self.report.record(
            path,
            &step.name,
            StepKind::Loop,
            Outcome::Completed { output_var: None },
        );

        for (index, item) in items.into_iter().enumerate() {
            debug!(variable = %step.variable, iteration = index, "Loop iteration");
            let child = scope.extend(step.variable.clone(), item);
            let iteration = format!("{}[{}]", path, index);
            self.run_steps(&step.steps, &child, &iteration);
        }
    }

    /// Elements to iterate, as JSON values for binding
    fn loop_items(
        &mut self,
        step: &LoopStep,
        scope: &Scope<'_>,
        path: &str,
    ) -> Result<Vec<JsonValue>, String> {
        let view = self.context.with_overlay(scope);
        match &step.over {
            LoopSource::Expression(source) => evaluate_sequence(source, view, self.limits)
                .map(|values| values.into_iter().map(Val::into_json).collect())
                .map_err(|err| format!("{}: {}", source, err)),
            LoopSource::Items(items) => {
                self.limits
                    .check_sequence(items.len())
                    .map_err(|err| err.to_string())?;
                let mut resolver = Resolver::new(view, self.limits);
                let resolved: Vec<JsonValue> =
                    items.iter().map(|item| resolver.resolve_value(item)).collect();
                let issues = resolver.into_issues();
                self.record_issues(path, &step.name, StepKind::Loop, issues);
                Ok(resolved)
            }
        }
    }

    /// A step that could not be read fails as the kind it was meant to be
    fn reject_malformed(&mut self, step: &MalformedStep, path: &str) {
        let failure = match step.kind {
            StepKind::Action => FailureKind::Capability,
            StepKind::Condition => FailureKind::Condition,
            StepKind::Loop => FailureKind::LoopSource,
        };
        error!(step = %step.name, problem = %step.problem, "Malformed step; skipping");
        self.fail(path, &step.name, step.kind, failure, step.problem.clone());
    }

    fn record_issues(
        &mut self,
        path: &str,
        name: &str,
        kind: StepKind,
        issues: Vec<ResolutionIssue>,
    ) {
        for issue in issues {
            warn!(step = %name, expression = %issue.expression, error = %issue.error, "Placeholder could not be resolved");
            self.report.record(
                path,
                name,
                kind,
                Outcome::Failed {
                    kind: FailureKind::Resolution,
                    message: format!("{{{}}}: {}", issue.expression, issue.error),
                },
            );
        }
    }

    fn fail(&mut self, path: &str, name: &str, kind: StepKind, failure: FailureKind, message: String) {
        self.report.record(
            path,
            name,
            kind,
            Outcome::Failed {
                kind: failure,
                message,
            },
        );
    }
}
