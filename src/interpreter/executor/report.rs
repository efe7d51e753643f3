//! Post-run report
//!
//! Execution never aborts, so the report is how a caller finds out what
//! actually happened: one event per visited step, in visiting order.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::interpreter::plan::StepKind;

/// Failure categories; none of them stops the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A placeholder in the step's arguments could not be resolved
    Resolution,
    /// Loop source failed to evaluate or is not a sequence
    LoopSource,
    /// Condition failed to evaluate; treated as false
    Condition,
    /// No capability registered under the requested name
    DispatchMiss,
    /// The capability returned an error
    Capability,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Resolution => "resolution",
            FailureKind::LoopSource => "loop source",
            FailureKind::Condition => "condition",
            FailureKind::DispatchMiss => "dispatch miss",
            FailureKind::Capability => "capability",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Completed {
        #[serde(skip_serializing_if = "Option::is_none")]
        output_var: Option<String>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

/// One visited step
///
/// `path` locates the step in the tree: indices joined with `.`, with loop
/// iterations written as `[i]`. `1[2].0` is the first step of the third
/// iteration of the loop at top-level index 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    pub path: String,
    pub name: String,
    pub kind: StepKind,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl StepEvent {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self.outcome {
            Outcome::Failed { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} completed, {} skipped, {} failed",
            self.completed, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_hash: Option<String>,
    pub events: Vec<StepEvent>,
}

impl RunReport {
    pub fn new(task: Option<String>, plan_hash: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task,
            plan_hash,
            events: Vec::new(),
        }
    }

    pub(crate) fn record(
        &mut self,
        path: &str,
        name: &str,
        kind: StepKind,
        outcome: Outcome,
    ) {
        self.events.push(StepEvent {
            path: path.to_string(),
            name: name.to_string(),
            kind,
            outcome,
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepEvent> {
        self.events.iter().filter(|e| e.is_failure())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// First event recorded at `path`
    pub fn event(&self, path: &str) -> Option<&StepEvent> {
        self.events.iter().find(|e| e.path == path)
    }

    pub fn summary(&self) -> RunSummary {
        self.events
            .iter()
            .fold(RunSummary::default(), |mut summary, event| {
                match event.outcome {
                    Outcome::Completed { .. } => summary.completed += 1,
                    Outcome::Skipped { .. } => summary.skipped += 1,
                    Outcome::Failed { .. } => summary.failed += 1,
                }
                summary
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_counts_outcomes() {
        let mut report = RunReport::new(Some("demo".to_string()), None);
        report.record("0", "a", StepKind::Action, Outcome::Completed { output_var: None });
        report.record(
            "1",
            "b",
            StepKind::Condition,
            Outcome::Skipped { reason: "condition is false".to_string() },
        );
        report.record(
            "2",
            "c",
            StepKind::Action,
            Outcome::Failed { kind: FailureKind::DispatchMiss, message: "foo.bar".to_string() },
        );

        assert_eq!(
            report.summary(),
            RunSummary { completed: 1, skipped: 1, failed: 1 }
        );
        assert_eq!(report.summary().to_string(), "1 completed, 1 skipped, 1 failed");
        assert!(!report.is_clean());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.event("2").and_then(StepEvent::failure_kind), Some(FailureKind::DispatchMiss));
    }

    #[test]
    fn test_event_serializes_flat() {
        let mut report = RunReport::new(None, None);
        report.record(
            "1[0].0",
            "Write",
            StepKind::Action,
            Outcome::Completed { output_var: Some("r".to_string()) },
        );
        let value = serde_json::to_value(&report.events[0]).unwrap();
        assert_eq!(
            value,
            json!({
                "path": "1[0].0",
                "name": "Write",
                "kind": "action",
                "outcome": "completed",
                "output_var": "r"
            })
        );
    }
}
