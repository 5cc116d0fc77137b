use std::collections::BTreeMap;

use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::variable::value::Value;

/// Unary expression operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Numeric negation.
    Neg,
    /// Boolean negation.
    Not,
}

/// Binary expression operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// Numeric addition.
    Add,
    /// Numeric subtraction.
    Sub,
    /// Numeric multiplication.
    Mul,
    /// Numeric division.
    Div,
    /// Numeric remainder.
    Mod,
    /// Equality (same-typed operands, including strings).
    Eq,
    /// Inequality (same-typed operands, including strings).
    Ne,
    /// Numeric less-than.
    Lt,
    /// Numeric less-or-equal.
    Le,
    /// Numeric greater-than.
    Gt,
    /// Numeric greater-or-equal.
    Ge,
    /// Boolean conjunction.
    And,
    /// Boolean disjunction.
    Or,
}

/// A trigger expression tree.
///
/// Expressions are small and evaluated fresh on demand; the only external
/// state they read is the owning [`VariableBank`]'s named input slots.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarExpr {
    /// Literal operand.
    Lit(Value),
    /// Named input slot, written by external logic.
    Input(String),
    /// Unary operation.
    Unary {
        /// Operation applied to `expr`.
        op: UnaryOp,
        /// Operand expression.
        expr: Box<VarExpr>,
    },
    /// Binary operation.
    Binary {
        /// Operation applied to `left` and `right`.
        op: BinaryOp,
        /// Left operand.
        left: Box<VarExpr>,
        /// Right operand.
        right: Box<VarExpr>,
    },
    /// Linear range remap of a real operand.
    Map {
        /// Operand expression (numeric).
        expr: Box<VarExpr>,
        /// Input range start.
        in_start: f64,
        /// Input range end.
        in_end: f64,
        /// Output range start.
        out_start: f64,
        /// Output range end.
        out_end: f64,
    },
}

impl VarExpr {
    /// Evaluate against a bank of named input slots.
    pub fn eval(&self, bank: &VariableBank) -> CadenzaResult<Value> {
        match self {
            Self::Lit(v) => Ok(v.clone()),
            Self::Input(name) => bank
                .get(name)
                .cloned()
                .ok_or_else(|| CadenzaError::expression(format!("unknown input slot '{name}'"))),
            Self::Unary { op, expr } => {
                let v = expr.eval(bank)?;
                match op {
                    UnaryOp::Neg => match v {
                        Value::Int(i) => Ok(Value::Int(-i)),
                        Value::Real(r) => Ok(Value::Real(-r)),
                        other => Err(CadenzaError::expression(format!(
                            "cannot negate {}",
                            other.type_name()
                        ))),
                    },
                    UnaryOp::Not => Ok(Value::Bool(!v.as_bool()?)),
                }
            }
            Self::Binary { op, left, right } => {
                let a = left.eval(bank)?;
                let b = right.eval(bank)?;
                eval_binary(*op, a, b)
            }
            Self::Map {
                expr,
                in_start,
                in_end,
                out_start,
                out_end,
            } => {
                let x = expr.eval(bank)?.as_real()?;
                let span = in_end - in_start;
                if span == 0.0 {
                    return Err(CadenzaError::expression("map input range must be non-empty"));
                }
                let t = (x - in_start) / span;
                Ok(Value::Real(out_start + (out_end - out_start) * t))
            }
        }
    }
}

fn eval_binary(op: BinaryOp, a: Value, b: Value) -> CadenzaResult<Value> {
    use BinaryOp::*;
    match op {
        Add | Sub | Mul | Div | Mod => {
            // Int op Int stays Int; anything else promotes to Real.
            if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
                let (x, y) = (*x, *y);
                if matches!(op, Div | Mod) && y == 0 {
                    return Err(CadenzaError::expression("integer division by zero"));
                }
                return Ok(Value::Int(match op {
                    Add => x.wrapping_add(y),
                    Sub => x.wrapping_sub(y),
                    Mul => x.wrapping_mul(y),
                    Div => x / y,
                    Mod => x % y,
                    _ => unreachable!(),
                }));
            }
            let (x, y) = (a.as_real()?, b.as_real()?);
            Ok(Value::Real(match op {
                Add => x + y,
                Sub => x - y,
                Mul => x * y,
                Div => x / y,
                Mod => x % y,
                _ => unreachable!(),
            }))
        }
        Eq | Ne => {
            let eq = match (&a, &b) {
                (Value::Bool(x), Value::Bool(y)) => x == y,
                (Value::Str(x), Value::Str(y)) => x == y,
                _ if a.is_numeric() && b.is_numeric() => a.as_real()? == b.as_real()?,
                _ => {
                    return Err(CadenzaError::expression(format!(
                        "cannot compare {} with {}",
                        a.type_name(),
                        b.type_name()
                    )));
                }
            };
            Ok(Value::Bool(if op == Eq { eq } else { !eq }))
        }
        Lt | Le | Gt | Ge => {
            let (x, y) = (a.as_real()?, b.as_real()?);
            Ok(Value::Bool(match op {
                Lt => x < y,
                Le => x <= y,
                Gt => x > y,
                Ge => x >= y,
                _ => unreachable!(),
            }))
        }
        And => Ok(Value::Bool(a.as_bool()? && b.as_bool()?)),
        Or => Ok(Value::Bool(a.as_bool()? || b.as_bool()?)),
    }
}

/// Named input slots read by trigger expressions.
///
/// Slots are written by external logic or controllers between ticks; the
/// sequencing subsystem only ever reads them.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct VariableBank {
    slots: BTreeMap<String, Value>,
}

impl VariableBank {
    /// Empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write (or create) a named slot.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.slots.insert(name.into(), value.into());
    }

    /// Read a named slot.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }
}

/// A named trigger variable: an expression evaluated against the bank.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Variable {
    /// Variable identifier (stable within a scene).
    pub id: String,
    /// Expression producing this variable's value.
    pub expr: VarExpr,
}

impl Variable {
    /// Pull-based boolean query used by transition triggers.
    ///
    /// Returns `false` when the expression's output is not of boolean type
    /// or when an input slot is missing; trigger evaluation never aborts the
    /// tick loop on a misconfigured variable.
    pub fn get_bool(&self, bank: &VariableBank) -> bool {
        match self.expr.eval(bank) {
            Ok(Value::Bool(b)) => b,
            Ok(_) | Err(_) => false,
        }
    }

    /// Evaluate the underlying expression, surfacing typing errors.
    pub fn eval(&self, bank: &VariableBank) -> CadenzaResult<Value> {
        self.expr.eval(bank)
    }
}
