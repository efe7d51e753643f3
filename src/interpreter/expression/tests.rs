//! Placeholder resolution tests

use super::*;
use crate::interpreter::context::{Context, Scope};
use serde_json::{json, Map, Value as JsonValue};

fn scm_context() -> Context {
    let mut ctx = Context::new();
    ctx.set(
        "pending_orders",
        json!([
            {"order_id": "O001", "order_date": "2025-01-01", "status": "Pending"},
            {"order_id": "O003", "order_date": "2025-01-03", "status": "Pending"}
        ]),
    );
    ctx.set("today_date", json!("2025-01-08"));
    ctx.set("x", json!([1, 2, 3]));
    ctx
}

fn interpolate(ctx: &Context, text: &str) -> (String, Vec<ResolutionIssue>) {
    let limits = Limits::default();
    let mut resolver = Resolver::new(ctx.view(), &limits);
    let out = resolver.interpolate(text);
    (out, resolver.into_issues())
}

/* ===================== Interpolation ===================== */

#[test]
fn test_len_expression_renders_as_text() {
    let (out, issues) = interpolate(&scm_context(), "{len(x) * 2}");
    assert_eq!(out, "6");
    assert!(issues.is_empty());
}

#[test]
fn test_text_without_placeholders_is_unchanged() {
    let ctx = scm_context();
    for text in ["", "plain text", "closing } only", "O001 is Pending"] {
        let (out, issues) = interpolate(&ctx, text);
        assert_eq!(out, text);
        assert!(issues.is_empty());
    }
}

#[test]
fn test_prior_output_renders_like_reference() {
    let (out, _) = interpolate(
        &scm_context(),
        "The first pending order is {pending_orders[0]}.",
    );
    assert_eq!(
        out,
        "The first pending order is {'order_id': 'O001', 'order_date': '2025-01-01', 'status': 'Pending'}."
    );
}

#[test]
fn test_multiple_placeholders() {
    let (out, _) = interpolate(
        &scm_context(),
        "{len(pending_orders)} orders, first {pending_orders[0]['order_id']}, doubled {len(pending_orders) * 2}",
    );
    assert_eq!(out, "2 orders, first O001, doubled 4");
}

#[test]
fn test_doubled_braces_are_accepted() {
    let (out, _) = interpolate(&scm_context(), "Order {{pending_orders[1].order_id}}");
    assert_eq!(out, "Order O003");
}

#[test]
fn test_braces_inside_quoted_strings() {
    let mut ctx = Context::new();
    ctx.set("row", json!({"}": "brace"}));
    let (out, issues) = interpolate(&ctx, "value={row.get('}', 'none')}");
    assert_eq!(out, "value=brace");
    assert!(issues.is_empty());
}

#[test]
fn test_error_tokens_and_continuation() {
    let (out, issues) = interpolate(
        &scm_context(),
        "a={missing} b={1 / 0} c={len(x)}",
    );
    assert_eq!(out, "a=<Unresolved {missing}> b=<Error resolving {1 / 0}> c=3");
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].error, ExprError::UndefinedVariable("missing".to_string()));
    assert_eq!(issues[1].error, ExprError::DivisionByZero);
}

#[test]
fn test_missing_key_is_unresolved() {
    let (out, _) = interpolate(&scm_context(), "{pending_orders[0]['customer']}");
    assert_eq!(out, "<Unresolved {pending_orders[0]['customer']}>");
}

#[test]
fn test_syntax_error_token() {
    let (out, issues) = interpolate(&scm_context(), "{import os}");
    assert_eq!(out, "<Error resolving {import os}>");
    assert!(matches!(issues[0].error, ExprError::Syntax(_)));
}

#[test]
fn test_unterminated_brace_is_literal() {
    let (out, issues) = interpolate(&scm_context(), "{len(x)} and {oops");
    assert_eq!(out, "3 and {oops");
    assert!(issues.is_empty());
    assert_eq!(find_spans("{len(x)} and {oops").unterminated, Some(13));
}

#[test]
fn test_expression_length_limit() {
    let ctx = scm_context();
    let limits = Limits {
        max_expression_len: 8,
        ..Limits::default()
    };
    let mut resolver = Resolver::new(ctx.view(), &limits);
    assert_eq!(resolver.interpolate("{len(x) + len(x)}"), "<Error resolving {len(x) + len(x)}>");
    assert_eq!(resolver.issues()[0].error, ExprError::TooLong(15));
}

/* ===================== Typed Resolution ===================== */

#[test]
fn test_single_placeholder_keeps_type() {
    let ctx = scm_context();
    let limits = Limits::default();
    let mut resolver = Resolver::new(ctx.view(), &limits);

    assert_eq!(
        resolver.resolve_value(&json!("{pending_orders[0]}")),
        json!({"order_id": "O001", "order_date": "2025-01-01", "status": "Pending"})
    );
    assert_eq!(resolver.resolve_value(&json!("{len(x)}")), json!(3));
    assert_eq!(resolver.resolve_value(&json!("n={len(x)}")), json!("n=3"));
    assert_eq!(resolver.resolve_value(&json!(42)), json!(42));
    assert_eq!(resolver.resolve_value(&json!(null)), json!(null));
}

#[test]
fn test_nested_arguments_resolve_recursively() {
    let ctx = scm_context();
    let limits = Limits::default();
    let mut resolver = Resolver::new(ctx.view(), &limits);

    let mut args = Map::new();
    args.insert("ids".to_string(), json!(["{pending_orders[0].order_id}", "fixed"]));
    args.insert("meta".to_string(), json!({"count": "{len(pending_orders)}", "flag": true}));

    let resolved = resolver.resolve_arguments(&args);
    assert_eq!(
        JsonValue::Object(resolved),
        json!({"ids": ["O001", "fixed"], "meta": {"count": 2, "flag": true}})
    );
    assert!(resolver.issues().is_empty());
}

#[test]
fn test_dates_convert_to_iso_strings() {
    let ctx = scm_context();
    let limits = Limits::default();
    let mut resolver = Resolver::new(ctx.view(), &limits);
    assert_eq!(
        resolver.resolve_value(&json!("{date.fromisoformat(today_date) + timedelta(2)}")),
        json!("2025-01-10")
    );
}

/* ===================== Conditions & Loop Sources ===================== */

#[test]
fn test_condition_forms() {
    let ctx = scm_context();
    let limits = Limits::default();

    assert!(!evaluate_condition("1 > 2", ctx.view(), &limits).unwrap());
    assert!(evaluate_condition("{len(pending_orders) > 0}", ctx.view(), &limits).unwrap());
    assert!(evaluate_condition("pending_orders", ctx.view(), &limits).unwrap());
    assert!(evaluate_condition(
        "'{pending_orders[0].status}' == 'Pending'",
        ctx.view(),
        &limits
    )
    .unwrap());
    assert!(evaluate_condition("undefined_flag", ctx.view(), &limits).is_err());
}

#[test]
fn test_sequence_sources() {
    let ctx = scm_context();
    let limits = Limits::default();

    let orders = evaluate_sequence("{pending_orders}", ctx.view(), &limits).unwrap();
    assert_eq!(orders.len(), 2);

    let numbers = evaluate_sequence("range(len(x))", ctx.view(), &limits).unwrap();
    assert_eq!(Val::List(numbers).to_string(), "[0, 1, 2]");

    assert_eq!(
        evaluate_sequence("today_date", ctx.view(), &limits).unwrap_err(),
        ExprError::NotASequence("str")
    );
    assert!(evaluate_sequence("{missing}", ctx.view(), &limits).is_err());
}

#[test]
fn test_loop_variable_visible_through_overlay() {
    let ctx = scm_context();
    let limits = Limits::default();
    let root = Scope::root();
    let scope = root.extend("order", json!({"order_id": "O003", "order_date": "2025-01-03"}));

    let mut resolver = Resolver::new(ctx.with_overlay(&scope), &limits);
    let days = resolver.resolve_value(&json!(
        "{abs((datetime.strptime(today_date, '%Y-%m-%d') - datetime.strptime(order['order_date'], '%Y-%m-%d')).days)}"
    ));
    assert_eq!(days, json!(5));

    let mut outside = Resolver::new(ctx.view(), &limits);
    assert_eq!(outside.interpolate("{order}"), "<Unresolved {order}>");
}
