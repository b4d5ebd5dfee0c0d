//! The expression evaluator: typed operand dispatch, identifier resolution,
//! collections, and error surfacing.

use casebook::{
    BinaryOp, Context, Environment, ErrorKind, Expr, ExprLoc, SourceLoc, UnaryOp, Value, ValueData,
};
use pretty_assertions::assert_eq;

fn atom(value: Value) -> ExprLoc {
    ExprLoc::from_value(value)
}

fn binary(op: BinaryOp, left: Value, right: Value) -> ExprLoc {
    ExprLoc::new(
        SourceLoc::UNKNOWN,
        Expr::Binary {
            op,
            left: Box::new(atom(left)),
            right: Box::new(atom(right)),
        },
    )
}

fn unary(op: UnaryOp, operand: Value) -> ExprLoc {
    ExprLoc::new(
        SourceLoc::UNKNOWN,
        Expr::Unary {
            op,
            operand: Box::new(atom(operand)),
        },
    )
}

fn env() -> Environment {
    Environment::new(Context::default())
}

fn eval(expr: &ExprLoc) -> casebook::RunResult<Value> {
    expr.resolve(&env(), true)
}

// =============================================================================
// 1. binary operators over matched types
// =============================================================================

/// Well-typed operators agree with the native operation on the unwrapped
/// values.
#[test]
fn number_arithmetic_matches_native() {
    let cases = [
        (BinaryOp::Add, 7.0),
        (BinaryOp::Sub, 3.0),
        (BinaryOp::Mul, 10.0),
        (BinaryOp::Div, 2.5),
    ];
    for (op, expected) in cases {
        let got = eval(&binary(op, Value::from(5.0), Value::from(2.0))).unwrap();
        assert_eq!(got, Value::from(expected), "operator {op}");
    }
}

#[test]
fn number_comparisons_match_native() {
    let cases = [
        (BinaryOp::Lt, true),
        (BinaryOp::LtE, true),
        (BinaryOp::Gt, false),
        (BinaryOp::GtE, false),
        (BinaryOp::Eq, false),
        (BinaryOp::NotEq, true),
    ];
    for (op, expected) in cases {
        let got = eval(&binary(op, Value::from(2.0), Value::from(5.0))).unwrap();
        assert_eq!(got, Value::from(expected), "operator {op}");
    }
}

/// `+` concatenates strings; ordering is lexicographic.
#[test]
fn string_operators() {
    let got = eval(&binary(BinaryOp::Add, Value::from("case"), Value::from("book"))).unwrap();
    assert_eq!(got, Value::from("casebook"));

    let got = eval(&binary(BinaryOp::Lt, Value::from("abc"), Value::from("abd"))).unwrap();
    assert_eq!(got, Value::from(true));

    let got = eval(&binary(BinaryOp::Eq, Value::from("x"), Value::from("x"))).unwrap();
    assert_eq!(got, Value::from(true));
}

#[test]
fn bool_logic_operators() {
    let got = eval(&binary(BinaryOp::And, Value::from(true), Value::from(false))).unwrap();
    assert_eq!(got, Value::from(false));
    let got = eval(&binary(BinaryOp::Or, Value::from(true), Value::from(false))).unwrap();
    assert_eq!(got, Value::from(true));
    let got = eval(&binary(BinaryOp::NotEq, Value::from(true), Value::from(false))).unwrap();
    assert_eq!(got, Value::from(true));
}

/// Integral doubles compare exactly.
#[test]
fn integral_equality_is_exact() {
    let got = eval(&binary(BinaryOp::Eq, Value::from(3.0), Value::from(3.0))).unwrap();
    assert_eq!(got, Value::from(true));
}

// =============================================================================
// 2. operand errors
// =============================================================================

/// Mixed operand kinds report a mismatch naming both kinds and the operator.
#[test]
fn mixed_kinds_are_a_mismatch() {
    let err = eval(&binary(BinaryOp::Add, Value::from(1.0), Value::from("abc"))).unwrap_err();
    assert_eq!(err.kind, ErrorKind::OperandMismatch);
    assert!(err.message.contains("number"));
    assert!(err.message.contains("string"));
    assert!(err.message.contains('+'));
}

/// Matched kinds with no handler for the operator are unsupported.
#[test]
fn unhandled_matched_kinds_are_unsupported() {
    let err = eval(&binary(BinaryOp::Sub, Value::from("a"), Value::from("b"))).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedOperands);

    let err = eval(&binary(BinaryOp::Add, Value::from(true), Value::from(false))).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedOperands);

    let lists = binary(
        BinaryOp::Add,
        Value::list(SourceLoc::UNKNOWN, vec![]),
        Value::list(SourceLoc::UNKNOWN, vec![]),
    );
    let err = eval(&lists).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedOperands);
}

#[test]
fn division_by_zero_is_an_arithmetic_error() {
    let err = eval(&binary(BinaryOp::Div, Value::from(1.0), Value::from(0.0))).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArithmeticError);
}

// =============================================================================
// 3. unary operators
// =============================================================================

#[test]
fn neg_requires_number() {
    let got = eval(&unary(UnaryOp::Neg, Value::from(4.0))).unwrap();
    assert_eq!(got, Value::from(-4.0));
    let err = eval(&unary(UnaryOp::Neg, Value::from("x"))).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

#[test]
fn not_requires_bool() {
    let got = eval(&unary(UnaryOp::Not, Value::from(false))).unwrap();
    assert_eq!(got, Value::from(true));
    let err = eval(&unary(UnaryOp::Not, Value::from(1.0))).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

// =============================================================================
// 4. the `in` operator
// =============================================================================

#[test]
fn in_list_tests_membership() {
    let list = Value::list(
        SourceLoc::UNKNOWN,
        vec![Value::from("a"), Value::from("b"), Value::from("c")],
    );
    let got = eval(&binary(BinaryOp::In, Value::from("b"), list.clone())).unwrap();
    assert_eq!(got, Value::from(true));
    let got = eval(&binary(BinaryOp::In, Value::from("d"), list)).unwrap();
    assert_eq!(got, Value::from(false));
}

/// Membership in a mapping tests key presence.
#[test]
fn in_mapping_tests_keys() {
    let mut entries = indexmap::IndexMap::new();
    entries.insert("title".to_owned(), Value::from("Noir"));
    let mapping = Value::mapping(SourceLoc::UNKNOWN, entries);
    let got = eval(&binary(BinaryOp::In, Value::from("title"), mapping.clone())).unwrap();
    assert_eq!(got, Value::from(true));
    let got = eval(&binary(BinaryOp::In, Value::from("Noir"), mapping)).unwrap();
    assert_eq!(got, Value::from(false));
}

#[test]
fn in_rejects_non_collection_right_operand() {
    let err = eval(&binary(BinaryOp::In, Value::from("a"), Value::from(3.0))).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

// =============================================================================
// 5. identifiers
// =============================================================================

/// Identifier atoms resolve through the environment; unresolved passthrough
/// preserves the raw identifier value.
#[test]
fn identifier_resolution_modes() {
    let mut env = env();
    env.declare(SourceLoc::UNKNOWN, "x", "", Value::from(9.0), false).unwrap();
    let expr = atom(Value::identifier(SourceLoc::UNKNOWN, "x"));

    let resolved = expr.resolve(&env, true).unwrap();
    assert_eq!(resolved, Value::from(9.0));

    let passthrough = expr.resolve(&env, false).unwrap();
    assert!(matches!(passthrough.data(), ValueData::Identifier(name) if name == "x"));
}

#[test]
fn unknown_identifier_is_undeclared() {
    let expr = atom(Value::identifier(SourceLoc::UNKNOWN, "ghost"));
    let err = expr.resolve(&env(), true).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Undeclared);
}

/// Dotted identifiers traverse properties; missing segments surface as
/// PropertyMissing.
#[test]
fn dotted_identifier_traverses_properties() {
    let mut env = env();
    let mut entries = indexmap::IndexMap::new();
    entries.insert("title".to_owned(), Value::from("Noir"));
    env.declare(
        SourceLoc::UNKNOWN,
        "info",
        "",
        Value::mapping(SourceLoc::UNKNOWN, entries),
        false,
    )
    .unwrap();

    let got = atom(Value::identifier(SourceLoc::UNKNOWN, "info.title"))
        .resolve(&env, true)
        .unwrap();
    assert_eq!(got, Value::from("Noir"));

    let err = atom(Value::identifier(SourceLoc::UNKNOWN, "info.missing"))
        .resolve(&env, true)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PropertyMissing);
}

// =============================================================================
// 6. collections & compound identity
// =============================================================================

#[test]
fn list_literal_resolves_items_in_order() {
    let mut env = env();
    env.declare(SourceLoc::UNKNOWN, "x", "", Value::from(2.0), false).unwrap();
    let expr = ExprLoc::new(
        SourceLoc::UNKNOWN,
        Expr::ListLiteral(vec![
            atom(Value::from(1.0)),
            atom(Value::identifier(SourceLoc::UNKNOWN, "x")),
        ]),
    );
    let got = expr.resolve(&env, true).unwrap();
    assert_eq!(
        got,
        Value::list(SourceLoc::UNKNOWN, vec![Value::from(1.0), Value::from(2.0)])
    );
}

#[test]
fn mapping_literal_resolves_values() {
    let expr = ExprLoc::new(
        SourceLoc::UNKNOWN,
        Expr::MappingLiteral(vec![("k".to_owned(), atom(Value::from(1.0)))]),
    );
    let got = eval(&expr).unwrap();
    let entries = got.expect_mapping().unwrap();
    assert_eq!(entries["k"], Value::from(1.0));
}

/// A single-atom expression reports its value; compound expressions do not.
#[test]
fn atomic_expression_identity() {
    let atomic = atom(Value::from(1.0));
    assert!(atomic.atom_value().is_some());
    assert_eq!(atomic.as_debug_str(), "1");

    let compound = binary(BinaryOp::Add, Value::from(1.0), Value::from(2.0));
    assert!(compound.atom_value().is_none());
    assert_eq!(compound.as_debug_str(), "CompoundExpression");
}
