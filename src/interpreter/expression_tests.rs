//! Expression tests - paths, functions, conditions and templates

use maplit::btreemap;
use serde_json::{json, Map, Value as JsonValue};

use super::*;
use crate::interpreter::context::{ExecutionContext, VarStore};

/// Context with the given variables and input.
fn ctx(vars: JsonValue, input: JsonValue) -> ExecutionContext {
    let vars = vars.as_object().cloned().unwrap_or_default();
    let input = input.as_object().cloned().unwrap_or_default();
    ExecutionContext::new(input).with_vars(VarStore::from_map(&vars))
}

/* ===================== Parsing ===================== */

#[test]
fn test_parse_literal() {
    assert_eq!(Expr::parse("hello"), Expr::Literal("hello".to_string()));
    assert_eq!(Expr::parse("42"), Expr::Literal("42".to_string()));
}

#[test]
fn test_parse_path() {
    assert_eq!(
        Expr::parse("$vars.user.name"),
        Expr::Path {
            root: Root::Vars,
            segments: vec!["user".to_string(), "name".to_string()],
        }
    );
    assert_eq!(
        Expr::parse("$input"),
        Expr::Path {
            root: Root::Input,
            segments: vec![],
        }
    );
}

#[test]
fn test_parse_nested_functions() {
    let expr = Expr::try_parse("$len( $map($vars.items, 'id') )").expect("Should parse");
    assert_eq!(
        expr,
        Expr::Len(Box::new(Expr::Map {
            source: Box::new(Expr::Path {
                root: Root::Vars,
                segments: vec!["items".to_string()],
            }),
            property: "id".to_string(),
        }))
    );
}

#[test]
fn test_unparseable_sentinel_string_is_literal() {
    assert!(Expr::try_parse("$5.00").is_err());
    assert_eq!(Expr::parse("$5.00"), Expr::Literal("$5.00".to_string()));
    assert_eq!(Expr::parse("$variables"), Expr::Literal("$variables".to_string()));
}

/* ===================== Evaluation ===================== */

#[test]
fn test_evaluate_input_path() {
    let c = ctx(json!({}), json!({ "foo": "bar", "user": { "Name": "Ada" } }));

    assert_eq!(evaluate("$input.foo", &c), json!("bar"));
    assert_eq!(evaluate("$input.user.Name", &c), json!("Ada"));
    assert_eq!(evaluate("$input.user.name", &c), json!("Ada"));
    assert_eq!(evaluate("$input.user.missing.deeper", &c), JsonValue::Null);
}

#[test]
fn test_evaluate_vars_path_case_insensitive_and_indexed() {
    let c = ctx(json!({ "Items": [{ "id": 1 }, { "id": 2 }] }), json!({}));

    assert_eq!(evaluate("$vars.items.1.id", &c), json!(2));
    assert_eq!(evaluate("$vars.ITEMS.0", &c), json!({ "id": 1 }));
    assert_eq!(evaluate("$vars.items.9", &c), JsonValue::Null);
    assert_eq!(evaluate("$vars.nope", &c), JsonValue::Null);
}

#[test]
fn test_evaluate_len() {
    let c = ctx(json!({ "items": [1, 2, 3], "name": "héllo", "obj": { "a": 1 } }), json!({}));

    assert_eq!(evaluate("$len($vars.items)", &c), json!(3));
    assert_eq!(evaluate("$len($vars.name)", &c), json!(5));
    assert_eq!(evaluate("$len($vars.obj)", &c), json!(0));
    assert_eq!(evaluate("$len($vars.missing)", &c), json!(0));
}

#[test]
fn test_evaluate_map_skips_objects_without_property() {
    let c = ctx(
        json!({ "people": [{ "name": "a" }, { "age": 3 }, "str", { "name": "b" }] }),
        json!({}),
    );

    assert_eq!(evaluate("$map($vars.people, 'name')", &c), json!(["a", "b"]));
    assert_eq!(evaluate("$map($vars.people, \"age\")", &c), json!([3]));
    assert_eq!(evaluate("$map($vars.missing, 'name')", &c), json!([]));
}

#[test]
fn test_evaluate_literal() {
    let c = ctx(json!({}), json!({}));
    assert_eq!(evaluate("plain words", &c), json!("plain words"));
}

/* ===================== Conditions ===================== */

#[test]
fn test_condition_len_greater_than_zero() {
    let c = ctx(json!({ "items": [1, 2, 3] }), json!({}));
    assert!(evaluate_condition("$len($vars.items) > 0", &c));
    assert!(!evaluate_condition("$len($vars.items) > 3", &c));
    assert!(evaluate_condition("$len($vars.items) >= 3", &c));
}

#[test]
fn test_condition_numeric_vs_lexical() {
    let c = ctx(json!({ "n": "10", "s": "apple" }), json!({}));

    // numeric: 10 > 9
    assert!(evaluate_condition("$vars.n > 9", &c));
    // lexical: "apple" < "banana"
    assert!(evaluate_condition("$vars.s < banana", &c));
    assert!(evaluate_condition("$vars.s == apple", &c));
    assert!(evaluate_condition("$vars.s != 'pear'", &c));
    assert!(evaluate_condition("$vars.n == 10.0", &c));
}

#[test]
fn test_condition_all_operators() {
    let c = ctx(json!({ "x": 5 }), json!({}));
    let cases = btreemap! {
        "$vars.x == 5" => true,
        "$vars.x != 5" => false,
        "$vars.x < 6" => true,
        "$vars.x <= 5" => true,
        "$vars.x > 5" => false,
        "$vars.x >= 6" => false,
    };
    for (condition, expected) in cases {
        assert_eq!(evaluate_condition(condition, &c), expected, "{}", condition);
    }
}

#[test]
fn test_condition_truthiness() {
    let c = ctx(
        json!({ "t": true, "f": false, "blank": "  ", "word": "x", "zero": 0, "empty": [] }),
        json!({}),
    );

    assert!(evaluate_condition("$vars.t", &c));
    assert!(!evaluate_condition("$vars.f", &c));
    assert!(!evaluate_condition("$vars.blank", &c));
    assert!(evaluate_condition("$vars.word", &c));
    assert!(!evaluate_condition("$vars.missing", &c));
    assert!(evaluate_condition("$vars.zero", &c));
    assert!(evaluate_condition("$vars.empty", &c));
}

#[test]
fn test_condition_operator_inside_quotes_is_ignored() {
    let c = ctx(json!({ "op": "a>b" }), json!({}));
    assert!(evaluate_condition("$vars.op == 'a>b'", &c));
}

/* ===================== Templates ===================== */

#[test]
fn test_render_template() {
    let c = ctx(
        json!({ "name": "Ada", "count": 3, "tags": ["x"] }),
        json!({ "city": "London" }),
    );

    assert_eq!(
        render_template("Hi {{vars.name}} from {{ input.city }}: {{vars.count}} {{vars.tags}}", &c),
        "Hi Ada from London: 3 [\"x\"]"
    );
}

#[test]
fn test_render_template_missing_and_unmatched() {
    let c = ctx(json!({}), json!({}));

    assert_eq!(render_template("[{{vars.missing}}]", &c), "[]");
    assert_eq!(render_template("{{other.value}} {{vars}} {{ }}", &c), "{{other.value}} {} {{ }}");
}

#[test]
fn test_stringify() {
    assert_eq!(stringify(&JsonValue::Null), "");
    assert_eq!(stringify(&json!("s")), "s");
    assert_eq!(stringify(&json!(1.5)), "1.5");
    assert_eq!(stringify(&JsonValue::Object(Map::new())), "{}");
}
