use crate::env::Assignment;
use crate::error::{PtgError, PtgResult};
use serde::{Deserialize, Serialize};

/// A tree over constants, symbols and arithmetic/comparison operators.
/// Total and side-effect free: evaluating the same expression against the
/// same assignment always yields the same result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Expr {
    Const(i64),
    Symbol(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    /// Evaluate to a single integer under `assignment`.
    pub fn eval(&self, assignment: &Assignment) -> PtgResult<i64> {
        use Expr::*;
        Ok(match self {
            Const(v) => *v,
            Symbol(name) => assignment
                .get(name)
                .ok_or_else(|| PtgError::UndefinedSymbol(name.clone()))?,
            Neg(a) => -a.eval(assignment)?,
            Add(a, b) => a.eval(assignment)?.wrapping_add(b.eval(assignment)?),
            Sub(a, b) => a.eval(assignment)?.wrapping_sub(b.eval(assignment)?),
            Mul(a, b) => a.eval(assignment)?.wrapping_mul(b.eval(assignment)?),
            Div(a, b) => {
                let (a, b) = (a.eval(assignment)?, b.eval(assignment)?);
                if b == 0 {
                    return Err(PtgError::InvalidProgram("division by zero".into()));
                }
                a / b
            }
            Mod(a, b) => {
                let (a, b) = (a.eval(assignment)?, b.eval(assignment)?);
                if b == 0 {
                    return Err(PtgError::InvalidProgram("modulo by zero".into()));
                }
                a.rem_euclid(b)
            }
            Eq(a, b) => (a.eval(assignment)? == b.eval(assignment)?) as i64,
            Ne(a, b) => (a.eval(assignment)? != b.eval(assignment)?) as i64,
            Lt(a, b) => (a.eval(assignment)? < b.eval(assignment)?) as i64,
            Le(a, b) => (a.eval(assignment)? <= b.eval(assignment)?) as i64,
            Gt(a, b) => (a.eval(assignment)? > b.eval(assignment)?) as i64,
            Ge(a, b) => (a.eval(assignment)? >= b.eval(assignment)?) as i64,
            And(a, b) => ((a.eval(assignment)? != 0) && (b.eval(assignment)? != 0)) as i64,
            Or(a, b) => ((a.eval(assignment)? != 0) || (b.eval(assignment)? != 0)) as i64,
        })
    }

    /// Truthiness under `assignment` — non-zero is true.
    pub fn truthy(&self, assignment: &Assignment) -> PtgResult<bool> {
        Ok(self.eval(assignment)? != 0)
    }
}

/// Evaluate a declared `[lower, upper]` bound pair to a concrete inclusive
/// range. Empty (`min > max`) ranges are valid results — the caller (the
/// enumerator, Component E) treats them as "no instances at this level".
pub fn range(lower: &Expr, upper: &Expr, assignment: &Assignment) -> PtgResult<(i64, i64)> {
    Ok((lower.eval(assignment)?, upper.eval(assignment)?))
}
