//! Expression, condition, and template evaluation
//!
//! The mini-language is deliberately small:
//!
//! - `$vars.a.b` / `$input.a.b` walk a dotted path (missing segments give null)
//! - `$len(expr)` is the length of a string or array, `0` otherwise
//! - `$map(expr, 'prop')` collects `prop` from every object of an array
//! - anything not starting with `$` is a literal string
//!
//! Conditions are either `left OP right` with one relational operator, or a
//! single expression tested for truthiness. Templates substitute
//! `{{vars.path}}` and `{{input.path}}`.
//!
//! Evaluation never fails: unknown paths resolve to null and a `$` string
//! that does not parse is treated as a literal.

use std::cmp::Ordering;
use std::sync::LazyLock;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use regex::{Captures, Regex};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use super::context::ExecutionContext;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "interpreter/expressions.pest"]
struct ExpressionParser;

/// Prefix marking a string as an expression.
pub const EXPRESSION_SENTINEL: char = '$';

static TEMPLATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(vars|input)((?:\.[A-Za-z0-9_\-]+)*)\s*\}\}")
        .expect("template pattern is valid")
});

/* ===================== Error Types ===================== */

#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("invalid expression: {0}")]
    Syntax(String),

    #[error("unexpected expression rule: {0:?}")]
    Build(Rule),
}

impl From<pest::error::Error<Rule>> for ExpressionError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ExpressionError::Syntax(err.to_string())
    }
}

/* ===================== AST ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    Vars,
    Input,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path { root: Root, segments: Vec<String> },
    Len(Box<Expr>),
    Map { source: Box<Expr>, property: String },
    Literal(String),
}

impl Expr {
    /// Parse a `$` expression, failing on syntax errors.
    ///
    /// Strings without the sentinel are literals and always succeed.
    pub fn try_parse(source: &str) -> Result<Expr, ExpressionError> {
        if !source.trim_start().starts_with(EXPRESSION_SENTINEL) {
            return Ok(Expr::Literal(source.to_string()));
        }

        let mut pairs = ExpressionParser::parse(Rule::expression, source.trim())?;
        let expr = pairs
            .next()
            .and_then(|expression| expression.into_inner().next())
            .ok_or(ExpressionError::Build(Rule::expression))?;
        build_expr(expr)
    }

    /// Parse leniently: anything that fails to parse is a literal.
    pub fn parse(source: &str) -> Expr {
        Self::try_parse(source).unwrap_or_else(|err| {
            tracing::warn!(source = %source, error = %err, "treating unparseable expression as literal");
            Expr::Literal(source.to_string())
        })
    }

    pub fn evaluate(&self, ctx: &ExecutionContext) -> JsonValue {
        match self {
            Expr::Literal(text) => JsonValue::String(text.clone()),

            Expr::Path { root, segments } => resolve_path(*root, segments, ctx),

            Expr::Len(inner) => {
                let len = match inner.evaluate(ctx) {
                    JsonValue::String(s) => s.chars().count(),
                    JsonValue::Array(items) => items.len(),
                    _ => 0,
                };
                JsonValue::from(len)
            }

            Expr::Map { source, property } => match source.evaluate(ctx) {
                JsonValue::Array(items) => JsonValue::Array(
                    items
                        .iter()
                        .filter_map(|item| item.as_object()?.get(property).cloned())
                        .collect(),
                ),
                _ => JsonValue::Array(Vec::new()),
            },
        }
    }
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, ExpressionError> {
    match pair.as_rule() {
        Rule::path => {
            let mut inner = pair.into_inner();
            let root = match inner.next().map(|p| p.as_str()) {
                Some("vars") => Root::Vars,
                Some("input") => Root::Input,
                _ => return Err(ExpressionError::Build(Rule::root)),
            };
            let segments = inner.map(|segment| segment.as_str().to_string()).collect();
            Ok(Expr::Path { root, segments })
        }
        Rule::len_call => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or(ExpressionError::Build(Rule::len_call))?;
            Ok(Expr::Len(Box::new(build_expr(inner)?)))
        }
        Rule::map_call => {
            let mut inner = pair.into_inner();
            let source = inner.next().ok_or(ExpressionError::Build(Rule::map_call))?;
            let property = inner
                .next()
                .and_then(|p| p.into_inner().next())
                .ok_or(ExpressionError::Build(Rule::property))?;
            Ok(Expr::Map {
                source: Box::new(build_expr(source)?),
                property: property.as_str().to_string(),
            })
        }
        other => Err(ExpressionError::Build(other)),
    }
}

/* ===================== Path Resolution ===================== */

fn resolve_path(root: Root, segments: &[String], ctx: &ExecutionContext) -> JsonValue {
    match root {
        Root::Vars => {
            let Some((name, rest)) = segments.split_first() else {
                return JsonValue::Object(ctx.vars.snapshot());
            };
            match ctx.vars.get(name) {
                Some(value) => walk(value, rest),
                None => JsonValue::Null,
            }
        }
        Root::Input => {
            let Some((name, rest)) = segments.split_first() else {
                return JsonValue::Object(ctx.input().clone());
            };
            match lookup_key(ctx.input(), name) {
                Some(value) => walk(value, rest),
                None => JsonValue::Null,
            }
        }
    }
}

/// Exact key first, then a case-insensitive match.
fn lookup_key<'a>(map: &'a Map<String, JsonValue>, key: &str) -> Option<&'a JsonValue> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn walk(value: &JsonValue, segments: &[String]) -> JsonValue {
    let mut current = value;
    for segment in segments {
        let next = match current {
            JsonValue::Object(map) => lookup_key(map, segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return JsonValue::Null,
        }
    }
    current.clone()
}

/// Evaluate a string as an expression (or literal).
pub fn evaluate(source: &str, ctx: &ExecutionContext) -> JsonValue {
    Expr::parse(source).evaluate(ctx)
}

/* ===================== Conditions ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    fn symbol(&self) -> &'static str {
        match self {
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            RelOp::Eq => ordering == Ordering::Equal,
            RelOp::Ne => ordering != Ordering::Equal,
            RelOp::Lt => ordering == Ordering::Less,
            RelOp::Le => ordering != Ordering::Greater,
            RelOp::Gt => ordering == Ordering::Greater,
            RelOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare { left: Expr, op: RelOp, right: Expr },
    Truthy(Expr),
}

impl Condition {
    pub fn parse(source: &str) -> Condition {
        match find_operator(source) {
            Some((pos, op)) => Condition::Compare {
                left: parse_operand(&source[..pos]),
                op,
                right: parse_operand(&source[pos + op.symbol().len()..]),
            },
            None => Condition::Truthy(Expr::parse(source.trim())),
        }
    }

    pub fn evaluate(&self, ctx: &ExecutionContext) -> bool {
        match self {
            Condition::Truthy(expr) => is_truthy(&expr.evaluate(ctx)),
            Condition::Compare { left, op, right } => {
                let left = left.evaluate(ctx);
                let right = right.evaluate(ctx);
                let ordering = match (as_number(&left), as_number(&right)) {
                    (Some(l), Some(r)) => match l.partial_cmp(&r) {
                        Some(ordering) => ordering,
                        // NaN compares false for everything but !=
                        None => return *op == RelOp::Ne,
                    },
                    _ => stringify(&left).cmp(&stringify(&right)),
                };
                op.holds(ordering)
            }
        }
    }
}

/// Evaluate a condition string to a boolean.
pub fn evaluate_condition(source: &str, ctx: &ExecutionContext) -> bool {
    Condition::parse(source).evaluate(ctx)
}

/// First relational operator outside parentheses and quotes.
fn find_operator(source: &str) -> Option<(usize, RelOp)> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                let next = bytes.get(i + 1).copied();
                let op = match (b, next) {
                    (b'=', Some(b'=')) => Some(RelOp::Eq),
                    (b'!', Some(b'=')) => Some(RelOp::Ne),
                    (b'<', Some(b'=')) => Some(RelOp::Le),
                    (b'>', Some(b'=')) => Some(RelOp::Ge),
                    (b'<', _) => Some(RelOp::Lt),
                    (b'>', _) => Some(RelOp::Gt),
                    _ => None,
                };
                if let Some(op) = op {
                    return Some((i, op));
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Condition operand: quoted literals lose their quotes.
fn parse_operand(text: &str) -> Expr {
    let text = text.trim();
    for q in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(q) && text.ends_with(q) {
            return Expr::Literal(text[1..text.len() - 1].to_string());
        }
    }
    Expr::parse(text)
}

fn as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

/// Truthiness of an evaluated value.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Display form of a value: strings raw, null empty, anything else as JSON.
pub fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/* ===================== Templates ===================== */

/// Replace every `{{vars.path}}` / `{{input.path}}` with its resolved value.
///
/// Anything else in braces is left as written.
pub fn render_template(template: &str, ctx: &ExecutionContext) -> String {
    TEMPLATE_PATTERN
        .replace_all(template, |caps: &Captures| {
            let root = if &caps[1] == "vars" { Root::Vars } else { Root::Input };
            let segments: Vec<String> = caps[2]
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            stringify(&resolve_path(root, &segments, ctx))
        })
        .into_owned()
}

#[cfg(test)]
#[path = "expression_tests.rs"]
mod tests;
