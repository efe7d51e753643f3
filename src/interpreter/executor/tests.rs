use super::*;
use crate::capabilities::Catalog;
use crate::registry::{Capability, CapabilitySpec, Origin, ParamKind};
use serde_json::json;

/// Core-only session plus `test.echo` and `test.fail`
fn registry() -> StepRegistry {
    let mut registry = StepRegistry::build_session_with("none", &Catalog::new());
    registry.register(
        "test",
        "echo",
        Capability::new(
            CapabilitySpec::new("echo", "Return the value").required("value", ParamKind::Any),
            |args| Ok(args.get("value").cloned().unwrap_or(JsonValue::Null)),
        ),
        Origin::Domain,
    );
    registry.register(
        "test",
        "fail",
        Capability::new(CapabilitySpec::new("fail", "Always fails"), |_| {
            Err(anyhow::anyhow!("boom"))
        }),
        Origin::Domain,
    );
    registry
}

fn run(source: &str) -> (Context, RunReport) {
    let mut interpreter = Interpreter::new(registry());
    let report = interpreter.execute_task(source).unwrap();
    (interpreter.into_context(), report)
}

#[test]
fn test_single_action_binds_output() {
    let (ctx, report) = run(r#"
steps:
  - name: "Say hi"
    function: "message.write_message"
    arguments:
      message: "hi"
    output_var: "r"
"#);
    assert_eq!(ctx.to_json(), json!({"r": {"status": "success", "message": "hi"}}));
    assert!(report.is_clean());
    assert_eq!(
        report.event("0").map(|e| &e.outcome),
        Some(&Outcome::Completed { output_var: Some("r".to_string()) })
    );
}

#[test]
fn test_action_write_is_the_only_change() {
    let mut interpreter = Interpreter::new(registry());
    interpreter.context_mut().set("keep", json!({"a": 1}));
    interpreter.context_mut().set("out", json!("stale"));
    let before = interpreter.context().clone();

    interpreter
        .execute_task(
            r#"
steps:
  - function: "test.echo"
    arguments: { value: "{keep['a']}" }
    output_var: "out"
"#,
        )
        .unwrap();

    let after = interpreter.context();
    assert_eq!(after.get("out"), Ok(&json!(1)));
    assert_eq!(after.len(), before.len());
    for (name, value) in before.iter().filter(|(name, _)| name.as_str() != "out") {
        assert_eq!(after.get(name), Ok(value));
    }
}

#[test]
fn test_loop_over_literal_sequence() {
    let (ctx, report) = run(r#"
steps:
  - loop:
      variable: "item"
      over: [1, 2, 3]
    steps:
      - function: "test.echo"
        arguments: { value: "{item}" }
        output_var: "last"
"#);
    assert_eq!(ctx.get("last"), Ok(&json!(3)));
    assert!(!ctx.contains("item"));
    assert!(report.event("0[2].0").is_some());
}

#[test]
fn test_loop_over_empty_sequence() {
    let (ctx, report) = run(r#"
steps:
  - loop:
      variable: "item"
      over: "{[]}"
    steps:
      - function: "test.echo"
        arguments: { value: "{item}" }
        output_var: "last"
"#);
    assert!(ctx.is_empty());
    assert!(matches!(
        report.event("0").map(|e| &e.outcome),
        Some(Outcome::Skipped { .. })
    ));
    assert_eq!(report.events.len(), 1);
}

#[test]
fn test_false_condition_skips_nested_steps() {
    let (ctx, report) = run(r#"
steps:
  - condition: "1 > 2"
    steps:
      - function: "test.echo"
        arguments: { value: 1 }
        output_var: "ran"
"#);
    assert!(ctx.is_empty());
    assert_eq!(report.summary(), RunSummary { completed: 0, skipped: 1, failed: 0 });
}

#[test]
fn test_true_condition_runs_nested_steps() {
    let mut interpreter = Interpreter::new(registry());
    interpreter.context_mut().set("orders", json!(["O001", "O003"]));
    interpreter
        .execute_task(
            r#"
steps:
  - condition: "{len(orders) == 2}"
    steps:
      - function: "test.echo"
        arguments: { value: "{orders[-1]}" }
        output_var: "newest"
"#,
        )
        .unwrap();
    assert_eq!(interpreter.context().get("newest"), Ok(&json!("O003")));
}

#[test]
fn test_placeholder_arithmetic_on_context() {
    let mut interpreter = Interpreter::new(registry());
    interpreter.context_mut().set("x", json!([1, 2, 3]));
    interpreter
        .execute_task(
            r#"
steps:
  - function: "test.echo"
    arguments: { value: "{len(x) * 2}" }
    output_var: "typed"
  - function: "test.echo"
    arguments: { value: "Count: {len(x) * 2}" }
    output_var: "text"
"#,
        )
        .unwrap();
    assert_eq!(interpreter.context().get("typed"), Ok(&json!(6)));
    assert_eq!(interpreter.context().get("text"), Ok(&json!("Count: 6")));
}

#[test]
fn test_unregistered_function_is_isolated() {
    let (ctx, report) = run(r#"
steps:
  - name: "Missing"
    function: "foo.bar"
    output_var: "never"
  - function: "test.echo"
    arguments: { value: "after" }
    output_var: "next"
"#);
    assert!(!ctx.contains("never"));
    assert_eq!(ctx.get("next"), Ok(&json!("after")));
    assert_eq!(
        report.event("0").and_then(StepEvent::failure_kind),
        Some(FailureKind::DispatchMiss)
    );
}

#[test]
fn test_action_without_function_is_a_miss() {
    let (ctx, report) = run(r#"
steps:
  - name: "Nothing to call"
    output_var: "never"
"#);
    assert!(ctx.is_empty());
    assert_eq!(
        report.event("0").and_then(StepEvent::failure_kind),
        Some(FailureKind::DispatchMiss)
    );
}

#[test]
fn test_capability_error_is_isolated() {
    let (ctx, report) = run(r#"
steps:
  - function: "test.fail"
    output_var: "broken"
  - function: "message.write_message"
    arguments: { wrong: "argument" }
    output_var: "also_broken"
  - function: "test.echo"
    arguments: { value: true }
    output_var: "fine"
"#);
    assert_eq!(ctx.to_json(), json!({"fine": true}));
    let kinds: Vec<_> = report.failures().filter_map(StepEvent::failure_kind).collect();
    assert_eq!(kinds, vec![FailureKind::Capability, FailureKind::Capability]);
}

#[test]
fn test_nested_loops() {
    let (ctx, report) = run(r#"
steps:
  - loop: { variable: "a", over: [1, 2] }
    steps:
      - loop: { variable: "b", over: [10, 20] }
        steps:
          - function: "test.echo"
            arguments: { value: ["{a}", "{b}"] }
            output_var: "pair"
"#);
    assert_eq!(ctx.get("pair"), Ok(&json!([2, 20])));
    assert!(!ctx.contains("a"));
    assert!(!ctx.contains("b"));
    assert!(report.event("0[1].0[1].0").is_some());
    assert_eq!(report.summary().completed, 1 + 2 + 4);
}

#[test]
fn test_loop_writes_land_in_shared_context() {
    let mut interpreter = Interpreter::new(registry());
    interpreter.context_mut().set("item", json!("outer"));
    interpreter
        .execute_task(
            r#"
steps:
  - loop: { variable: "item", over: ["a", "b"] }
    steps:
      - function: "test.echo"
        arguments: { value: "seen {item}" }
        output_var: "seen"
  - function: "test.echo"
    arguments: { value: "{item}" }
    output_var: "after"
"#,
        )
        .unwrap();
    let ctx = interpreter.context();
    assert_eq!(ctx.get("seen"), Ok(&json!("seen b")));
    assert_eq!(ctx.get("item"), Ok(&json!("outer")));
    assert_eq!(ctx.get("after"), Ok(&json!("outer")));
}

#[test]
fn test_bad_loop_source_skips_loop() {
    let (ctx, report) = run(r#"
steps:
  - loop: { variable: "x", over: "{missing}" }
    steps:
      - function: "test.echo"
        arguments: { value: 1 }
        output_var: "inside"
  - loop: { variable: "x", over: "'text'" }
    steps:
      - function: "test.echo"
        arguments: { value: 1 }
        output_var: "inside"
  - function: "test.echo"
    arguments: { value: 2 }
    output_var: "after"
"#);
    assert_eq!(ctx.to_json(), json!({"after": 2}));
    assert_eq!(
        report.event("0").and_then(StepEvent::failure_kind),
        Some(FailureKind::LoopSource)
    );
    assert_eq!(
        report.event("1").and_then(StepEvent::failure_kind),
        Some(FailureKind::LoopSource)
    );
}

#[test]
fn test_broken_condition_counts_as_false() {
    let (ctx, report) = run(r#"
steps:
  - condition: "undefined_name > 3"
    steps:
      - function: "test.echo"
        arguments: { value: 1 }
        output_var: "inside"
"#);
    assert!(ctx.is_empty());
    assert_eq!(
        report.event("0").and_then(StepEvent::failure_kind),
        Some(FailureKind::Condition)
    );
}

#[test]
fn test_unresolved_placeholder_is_reported_and_step_still_runs() {
    let (ctx, report) = run(r#"
steps:
  - function: "test.echo"
    arguments: { value: "Hi {nobody}" }
    output_var: "greeting"
"#);
    assert_eq!(ctx.get("greeting"), Ok(&json!("Hi <Unresolved {nobody}>")));
    let events: Vec<&StepEvent> = report.events.iter().filter(|e| e.path == "0").collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].failure_kind(), Some(FailureKind::Resolution));
    assert!(!events[1].is_failure());
}

#[test]
fn test_range_loop_source_respects_limits() {
    let limits = Limits {
        max_sequence_len: 3,
        ..Limits::default()
    };
    let mut interpreter = Interpreter::new(registry()).with_limits(limits);
    let report = interpreter
        .execute_task(
            r#"
steps:
  - loop: { variable: "i", over: "range(2)" }
    steps:
      - function: "test.echo"
        arguments: { value: "{i}" }
        output_var: "small"
  - loop: { variable: "i", over: "range(10)" }
    steps:
      - function: "test.echo"
        arguments: { value: "{i}" }
        output_var: "big"
"#,
        )
        .unwrap();
    assert_eq!(interpreter.context().get("small"), Ok(&json!(1)));
    assert!(!interpreter.context().contains("big"));
    assert_eq!(
        report.event("1").and_then(StepEvent::failure_kind),
        Some(FailureKind::LoopSource)
    );
}

#[test]
fn test_unparseable_document_is_an_error() {
    let mut interpreter = Interpreter::new(registry());
    assert!(interpreter.execute_task("steps: [").is_err());
}

#[test]
fn test_malformed_steps_fail_alone() {
    let (ctx, report) = run(r#"
steps:
  - function: "test.echo"
    arguments: { value: "a" }
    output_var: "a"
  - loop: { variable: "x", over: 5 }
    steps:
      - function: "test.echo"
        arguments: { value: 1 }
        output_var: "inside"
  - loop: { over: [1] }
  - condition: { status: "Pending" }
    steps:
      - function: "test.echo"
        arguments: { value: 1 }
        output_var: "inside"
  - function: "test.echo"
    arguments: "not a mapping"
    output_var: "broken"
  - function: "test.echo"
    arguments: { value: "b" }
    output_var: "b"
"#);
    assert_eq!(ctx.to_json(), json!({"a": "a", "b": "b"}));
    let kinds: Vec<_> = report.failures().filter_map(StepEvent::failure_kind).collect();
    assert_eq!(
        kinds,
        vec![
            FailureKind::LoopSource,
            FailureKind::LoopSource,
            FailureKind::Condition,
            FailureKind::Capability
        ]
    );
    assert_eq!(report.summary(), RunSummary { completed: 2, skipped: 0, failed: 4 });
}

#[test]
fn test_unquoted_loop_placeholder_skips_only_that_loop() {
    let mut interpreter = Interpreter::new(registry());
    interpreter.context_mut().set("pending", json!([1, 2]));
    let report = interpreter
        .execute_task(
            r#"
steps:
  - function: "test.echo"
    arguments: { value: "before" }
    output_var: "before"
  - loop:
      variable: "order"
      over: {pending}
    steps:
      - function: "test.echo"
        arguments: { value: "{order}" }
        output_var: "inside"
  - function: "test.echo"
    arguments: { value: "after" }
    output_var: "after"
"#,
        )
        .unwrap();
    let ctx = interpreter.context();
    assert_eq!(ctx.get("before"), Ok(&json!("before")));
    assert_eq!(ctx.get("after"), Ok(&json!("after")));
    assert!(!ctx.contains("inside"));

    let event = report.event("1").unwrap();
    assert_eq!(event.failure_kind(), Some(FailureKind::LoopSource));
    assert_eq!(event.kind, StepKind::Loop);
}

#[test]
fn test_empty_list_repetition_finishes() {
    let (ctx, report) = run(r#"
steps:
  - function: "test.echo"
    arguments: { value: "{[] * 3000000000}" }
    output_var: "empty"
  - function: "test.echo"
    arguments: { value: "{[0] * 3000000000}" }
    output_var: "huge"
"#);
    assert_eq!(ctx.get("empty"), Ok(&json!([])));
    assert_eq!(
        report.event("1").and_then(StepEvent::failure_kind),
        Some(FailureKind::Resolution)
    );
}

#[test]
fn test_report_carries_task_and_hash() {
    let (_, report) = run("task: \"Demo\"\nsteps: []\n");
    assert_eq!(report.task.as_deref(), Some("Demo"));
    assert_eq!(report.plan_hash.as_ref().map(String::len), Some(64));
    assert!(report.events.is_empty());
}
