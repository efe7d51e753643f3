//! PEST-based parser for the expression language
//!
//! Produces the AST in [`super::ast`]. Operators are left-associative; a
//! comparison takes at most one operator (`a < b < c` is rejected).

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::ExprError;

#[derive(Parser)]
#[grammar = "interpreter/expression/expression.pest"]
struct ExpressionParser;

impl From<pest::error::Error<Rule>> for ExprError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let column = match err.line_col {
            pest::error::LineColLocation::Pos((_, col)) => col,
            pest::error::LineColLocation::Span((_, col), _) => col,
        };
        ExprError::Syntax(format!("{} at column {}", err.variant.message(), column))
    }
}

/* ===================== Public API ===================== */

/// Parse a bare expression (no surrounding braces)
pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    let mut pairs = ExpressionParser::parse(Rule::expression, source)?;
    let expression = next_pair(&mut pairs)?;
    let mut inner = expression.into_inner();
    build_expr(next_pair(&mut inner)?)
}

/* ===================== AST Builder ===================== */

fn build_expr(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    match pair.as_rule() {
        Rule::expr => {
            let mut inner = pair.into_inner();
            build_expr(next_pair(&mut inner)?)
        }
        Rule::or_expr | Rule::and_expr | Rule::comparison | Rule::sum | Rule::term => {
            build_binary_chain(pair)
        }
        Rule::not_expr => build_prefix(pair, Rule::not_op, UnaryOp::Not),
        Rule::unary => build_prefix(pair, Rule::neg, UnaryOp::Neg),
        Rule::postfix => build_postfix(pair),
        Rule::list => {
            let items = pair
                .into_inner()
                .map(build_expr)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::LitList { items })
        }
        Rule::ident => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
        }),
        Rule::int => {
            let text = pair.as_str();
            text.parse::<i64>()
                .map(|v| Expr::LitInt { v })
                .map_err(|_| ExprError::Syntax(format!("integer literal out of range: {}", text)))
        }
        Rule::float => {
            let text = pair.as_str();
            text.parse::<f64>()
                .map(|v| Expr::LitFloat { v })
                .map_err(|_| ExprError::Syntax(format!("invalid float literal: {}", text)))
        }
        Rule::string => {
            let raw = pair
                .into_inner()
                .next()
                .map(|inner| inner.as_str())
                .unwrap_or("");
            Ok(Expr::LitStr { v: unescape(raw) })
        }
        Rule::boolean => Ok(Expr::LitBool {
            v: pair.as_str().eq_ignore_ascii_case("true"),
        }),
        Rule::null => Ok(Expr::LitNull),
        rule => Err(ExprError::Syntax(format!("unexpected {:?}", rule))),
    }
}

/// `operand (op operand)*`, folded to the left
fn build_binary_chain(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let mut left = build_expr(next_pair(&mut inner)?)?;

    while let Some(op_pair) = inner.next() {
        let op = binary_op(&op_pair)?;
        let right = build_expr(next_pair(&mut inner)?)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    Ok(left)
}

/// `prefix operand` or a plain operand
fn build_prefix(pair: Pair<Rule>, prefix: Rule, op: UnaryOp) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let first = next_pair(&mut inner)?;

    if first.as_rule() == prefix {
        let operand = build_expr(next_pair(&mut inner)?)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    } else {
        build_expr(first)
    }
}

fn build_postfix(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let mut expr = build_expr(next_pair(&mut inner)?)?;

    for suffix in inner {
        expr = match suffix.as_rule() {
            Rule::member => {
                let mut parts = suffix.into_inner();
                Expr::Member {
                    object: Box::new(expr),
                    property: next_pair(&mut parts)?.as_str().to_string(),
                }
            }
            Rule::index => {
                let mut parts = suffix.into_inner();
                Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(build_expr(next_pair(&mut parts)?)?),
                }
            }
            Rule::call_args => {
                let args = suffix
                    .into_inner()
                    .map(build_expr)
                    .collect::<Result<Vec<_>, _>>()?;
                Expr::Call {
                    callee: Box::new(expr),
                    args,
                }
            }
            rule => return Err(ExprError::Syntax(format!("unexpected {:?}", rule))),
        };
    }

    Ok(expr)
}

fn binary_op(pair: &Pair<Rule>) -> Result<BinaryOp, ExprError> {
    let op = match pair.as_rule() {
        Rule::or_op => BinaryOp::Or,
        Rule::and_op => BinaryOp::And,
        Rule::eq => BinaryOp::Eq,
        Rule::ne => BinaryOp::Ne,
        Rule::lt => BinaryOp::Lt,
        Rule::le => BinaryOp::Le,
        Rule::gt => BinaryOp::Gt,
        Rule::ge => BinaryOp::Ge,
        Rule::in_op => BinaryOp::In,
        Rule::not_in => BinaryOp::NotIn,
        Rule::add => BinaryOp::Add,
        Rule::sub => BinaryOp::Sub,
        Rule::mul => BinaryOp::Mul,
        Rule::div => BinaryOp::Div,
        Rule::floor_div => BinaryOp::FloorDiv,
        Rule::modulo => BinaryOp::Mod,
        rule => return Err(ExprError::Syntax(format!("unexpected operator {:?}", rule))),
    };
    Ok(op)
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>) -> Result<Pair<'i, Rule>, ExprError> {
    pairs
        .next()
        .ok_or_else(|| ExprError::Syntax("incomplete expression".to_string()))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(quoted @ ('\\' | '\'' | '"')) => out.push(quoted),
            // Unknown escapes are kept verbatim
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}
