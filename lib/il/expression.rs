use crate::il::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An IL Expression.
///
/// Expressions form the building blocks of operations, and always evaluate
/// to a signed 64-bit value.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Expression {
    Scalar(Scalar),
    Constant(i64),
    Add(Box<Expression>, Box<Expression>),
    Sub(Box<Expression>, Box<Expression>),
    Mul(Box<Expression>, Box<Expression>),
    Divs(Box<Expression>, Box<Expression>),
    Cmpeq(Box<Expression>, Box<Expression>),
    Cmpneq(Box<Expression>, Box<Expression>),
    Cmplts(Box<Expression>, Box<Expression>),
}

macro_rules! expression_binop {
    ($p: path, $n: ident) => {
        pub fn $n(lhs: Expression, rhs: Expression) -> Expression {
            $p(Box::new(lhs), Box::new(rhs))
        }
    };
}

impl Expression {
    pub fn scalar(scalar: Scalar) -> Expression {
        Expression::Scalar(scalar)
    }

    pub fn constant(value: i64) -> Expression {
        Expression::Constant(value)
    }

    expression_binop!(Expression::Add, add);
    expression_binop!(Expression::Sub, sub);
    expression_binop!(Expression::Mul, mul);
    expression_binop!(Expression::Divs, divs);
    expression_binop!(Expression::Cmpeq, cmpeq);
    expression_binop!(Expression::Cmpneq, cmpneq);
    expression_binop!(Expression::Cmplts, cmplts);

    /// The logical negation of a condition, `condition == 0`.
    pub fn not(condition: Expression) -> Expression {
        Expression::cmpeq(condition, Expression::constant(0))
    }

    /// If this expression is `Expression::Scalar`, return the `Scalar`
    pub fn get_scalar(&self) -> Option<&Scalar> {
        match self {
            Expression::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// If this expression is `Expression::Constant`, return the value
    pub fn get_constant(&self) -> Option<i64> {
        match self {
            Expression::Constant(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns true if this is a comparison expression.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Expression::Cmpeq(..) | Expression::Cmpneq(..) | Expression::Cmplts(..)
        )
    }

    /// If this expression has the form `condition == 0` over a comparison,
    /// return the negated comparison.
    pub fn negated(&self) -> Option<&Expression> {
        match self {
            Expression::Cmpeq(lhs, rhs) if lhs.is_comparison() && rhs.get_constant() == Some(0) => {
                Some(lhs)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Scalar(s) => s.fmt(f),
            Expression::Constant(c) => write!(f, "{}", c),
            Expression::Add(lhs, rhs) => write!(f, "({} + {})", lhs, rhs),
            Expression::Sub(lhs, rhs) => write!(f, "({} - {})", lhs, rhs),
            Expression::Mul(lhs, rhs) => write!(f, "({} * {})", lhs, rhs),
            Expression::Divs(lhs, rhs) => write!(f, "({} /s {})", lhs, rhs),
            Expression::Cmpeq(lhs, rhs) => write!(f, "({} == {})", lhs, rhs),
            Expression::Cmpneq(lhs, rhs) => write!(f, "({} != {})", lhs, rhs),
            Expression::Cmplts(lhs, rhs) => write!(f, "({} <s {})", lhs, rhs),
        }
    }
}

#[test]
fn negation() {
    let condition = Expression::cmplts(expr_scalar("x"), expr_const(10));
    let negated = Expression::not(condition.clone());

    assert_eq!(negated.negated(), Some(&condition));
    assert_eq!(condition.negated(), None);
    // `x == 0` is not a negation, x is not a comparison
    assert_eq!(Expression::not(expr_scalar("x")).negated(), None);
}
