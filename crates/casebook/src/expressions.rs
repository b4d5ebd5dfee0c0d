//! Expression trees and the typed operand dispatch that resolves them.

use crate::{
    environment::Environment,
    error::{CbError, ErrorKind, RunResult},
    sloc::SourceLoc,
    value::{Value, ValueData},
};

/// Unary expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum UnaryOp {
    /// Numeric negation.
    #[strum(serialize = "neg")]
    Neg,
    /// Boolean complement.
    #[strum(serialize = "not")]
    Not,
}

/// Binary expression operators. The `Display` form is the source spelling,
/// used when an operand error names the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    LtE,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    GtE,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "in")]
    In,
}

/// An expression subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal or identifier atom, stored as an already-built value.
    /// Synthetic call sites inject plain values through this variant too.
    Atom(Value),
    Unary {
        op: UnaryOp,
        operand: Box<ExprLoc>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ExprLoc>,
        right: Box<ExprLoc>,
    },
    /// List literal; items resolve in order.
    ListLiteral(Vec<ExprLoc>),
    /// Mapping literal; keys are literal strings, values resolve in order.
    MappingLiteral(Vec<(String, ExprLoc)>),
}

/// An expression with its source location.
#[derive(Debug, Clone)]
pub struct ExprLoc {
    pub sloc: SourceLoc,
    pub expr: Expr,
}

impl PartialEq for ExprLoc {
    /// Structural equality; the source location is ignored, like value
    /// equality.
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl ExprLoc {
    pub fn new(sloc: SourceLoc, expr: Expr) -> Self {
        Self { sloc, expr }
    }

    /// Wraps an already-built value as an atomic expression. Used by the
    /// runtime when it synthesizes call sites (e.g. the `_entry` argument).
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self {
            sloc: value.sloc(),
            expr: Expr::Atom(value),
        }
    }

    /// The underlying value when this expression is a single atom.
    ///
    /// Callers that need an unevaluated operand (the function-call protocol
    /// forwarding an `Identifier`) use this to bypass resolution.
    #[must_use]
    pub fn atom_value(&self) -> Option<&Value> {
        match &self.expr {
            Expr::Atom(value) => Some(value),
            _ => None,
        }
    }

    /// Compact debug form: atoms print their value, anything else reports
    /// itself as compound.
    #[must_use]
    pub fn as_debug_str(&self) -> String {
        match self.atom_value() {
            Some(value) => value.as_nice_string(false),
            None => "CompoundExpression".to_owned(),
        }
    }

    /// Resolves the expression to a value.
    ///
    /// With `resolve_identifiers` disabled, identifier atoms pass through
    /// unresolved; this is how parameters declared as wanting a raw
    /// identifier (the first argument of `set` / `declareVar`) receive the
    /// name instead of its value.
    pub fn resolve(&self, env: &Environment, resolve_identifiers: bool) -> RunResult<Value> {
        match &self.expr {
            Expr::Atom(value) => {
                if let ValueData::Identifier(name) = value.data() {
                    if resolve_identifiers {
                        return match env.get(self.sloc, name, None)? {
                            Some(resolved) => Ok(resolved),
                            None => Err(CbError::new(
                                ErrorKind::Undeclared,
                                format!("identifier '{name}' has not been declared in this or any parent scope"),
                                self.sloc,
                            )),
                        };
                    }
                }
                Ok(value.clone())
            }
            Expr::Unary { op, operand } => {
                let operand = operand.resolve(env, resolve_identifiers)?;
                match op {
                    UnaryOp::Neg => Ok(Value::number(self.sloc, -operand.expect_number()?)),
                    UnaryOp::Not => Ok(Value::bool(self.sloc, !operand.expect_bool()?)),
                }
            }
            Expr::Binary { op, left, right } => {
                let left = left.resolve(env, resolve_identifiers)?;
                let right = right.resolve(env, resolve_identifiers)?;
                self.operate_binary(*op, &left, &right)
            }
            Expr::ListLiteral(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(item.resolve(env, resolve_identifiers)?);
                }
                Ok(Value::list(self.sloc, resolved))
            }
            Expr::MappingLiteral(entries) => {
                let mut resolved = indexmap::IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    resolved.insert(key.clone(), item.resolve(env, resolve_identifiers)?);
                }
                Ok(Value::mapping(self.sloc, resolved))
            }
        }
    }

    /// Dispatches a binary operator over two resolved operands.
    ///
    /// Both operands must have the same value kind (`in` excepted); a kind
    /// mismatch is `OperandMismatch`, a matched kind the operator does not
    /// handle is `UnsupportedOperands`.
    fn operate_binary(&self, op: BinaryOp, left: &Value, right: &Value) -> RunResult<Value> {
        if op == BinaryOp::In {
            return self.operate_in_collection(left, right);
        }
        if std::mem::discriminant(left.data()) != std::mem::discriminant(right.data()) {
            return Err(self.operand_error(ErrorKind::OperandMismatch, op, left, right));
        }
        let result = match (left.data(), right.data()) {
            (ValueData::Number(a), ValueData::Number(b)) => self.operate_numbers(op, *a, *b)?,
            (ValueData::Str(a), ValueData::Str(b)) => self.operate_strings(op, a, b),
            (ValueData::Bool(a), ValueData::Bool(b)) => self.operate_bools(op, *a, *b),
            _ => None,
        };
        result.ok_or_else(|| self.operand_error(ErrorKind::UnsupportedOperands, op, left, right))
    }

    fn operate_numbers(&self, op: BinaryOp, a: f64, b: f64) -> RunResult<Option<Value>> {
        let value = match op {
            BinaryOp::Add => Value::number(self.sloc, a + b),
            BinaryOp::Sub => Value::number(self.sloc, a - b),
            BinaryOp::Mul => Value::number(self.sloc, a * b),
            BinaryOp::Div => {
                if b == 0.0 {
                    return Err(CbError::new(ErrorKind::ArithmeticError, "division by zero", self.sloc));
                }
                Value::number(self.sloc, a / b)
            }
            BinaryOp::Lt => Value::bool(self.sloc, a < b),
            BinaryOp::LtE => Value::bool(self.sloc, a <= b),
            BinaryOp::Gt => Value::bool(self.sloc, a > b),
            BinaryOp::GtE => Value::bool(self.sloc, a >= b),
            BinaryOp::Eq => Value::bool(self.sloc, a == b),
            BinaryOp::NotEq => Value::bool(self.sloc, a != b),
            BinaryOp::And | BinaryOp::Or | BinaryOp::In => return Ok(None),
        };
        Ok(Some(value))
    }

    fn operate_strings(&self, op: BinaryOp, a: &str, b: &str) -> Option<Value> {
        let value = match op {
            BinaryOp::Add => Value::str(self.sloc, format!("{a}{b}")),
            BinaryOp::Lt => Value::bool(self.sloc, a < b),
            BinaryOp::LtE => Value::bool(self.sloc, a <= b),
            BinaryOp::Gt => Value::bool(self.sloc, a > b),
            BinaryOp::GtE => Value::bool(self.sloc, a >= b),
            BinaryOp::Eq => Value::bool(self.sloc, a == b),
            BinaryOp::NotEq => Value::bool(self.sloc, a != b),
            _ => return None,
        };
        Some(value)
    }

    fn operate_bools(&self, op: BinaryOp, a: bool, b: bool) -> Option<Value> {
        let value = match op {
            BinaryOp::And => Value::bool(self.sloc, a && b),
            BinaryOp::Or => Value::bool(self.sloc, a || b),
            BinaryOp::Eq => Value::bool(self.sloc, a == b),
            BinaryOp::NotEq => Value::bool(self.sloc, a != b),
            _ => return None,
        };
        Some(value)
    }

    /// `needle in collection` membership. The right operand must be a list
    /// (element membership) or a mapping (key membership).
    fn operate_in_collection(&self, left: &Value, right: &Value) -> RunResult<Value> {
        match right.data() {
            ValueData::List(items) => Ok(Value::bool(self.sloc, items.iter().any(|item| item == left))),
            ValueData::Mapping(entries) => {
                let contained = match left.data() {
                    ValueData::Str(key) => entries.contains_key(key.as_str()),
                    _ => false,
                };
                Ok(Value::bool(self.sloc, contained))
            }
            _ => Err(CbError::type_error(
                format!(
                    "the right operand of 'in' must be a list or mapping, found {} ({})",
                    right.kind_name(),
                    right.as_nice_string(false)
                ),
                self.sloc,
            )),
        }
    }

    fn operand_error(&self, kind: ErrorKind, op: BinaryOp, left: &Value, right: &Value) -> CbError {
        let detail = format!(
            "'{}:{}' *{op}* '{}:{}'",
            left.kind_name(),
            left.as_nice_string(false),
            right.kind_name(),
            right.as_nice_string(false)
        );
        let message = match kind {
            ErrorKind::OperandMismatch => format!("mismatched operation operands: {detail}"),
            _ => format!("unsupported operation operands: {detail}"),
        };
        CbError::new(kind, message, self.sloc)
    }
}
