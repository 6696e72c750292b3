//! The host intermediate language read by the analyses.
//!
//! # An Introduction
//!
//! The IL is a small, expression-based representation of methods, shaped like
//! the graph-based IR of an optimizing compiler after lowering: integer
//! values live in named `Scalar`s, objects and arrays are reached through
//! reference scalars, and control flow is a directed graph of basic blocks.
//!
//! The analyses never construct the IL themselves. They walk it through the
//! accessors on `Program`, `Function`, `ControlFlowGraph`, `Block`, `Edge` and
//! `Instruction`, and translate memory operations to symbolic locations through
//! `analysis::ai::MemoryAccess`.
//!
//! ## `Expression`
//!
//! The terminals are `Scalar` and `Constant` (a signed 64-bit value).
//!
//! * Arithmetic: `Add`, `Sub`, `Mul`, `Divs`.
//! * Comparison: `Cmpeq`, `Cmpneq`, `Cmplts`.
//!
//! Comparison expressions evaluate to `1` for true and `0` for false.
//!
//! ## `Operation`
//!
//! * `Assign`: Assigns an `Expression` to a `Scalar`.
//! * `LoadField` / `StoreField`: Read or write a named field of the object
//! referenced by a `Scalar`.
//! * `LoadStatic` / `StoreStatic`: Read or write a static location.
//! * `LoadIndexed` / `StoreIndexed`: Read or write an array element.
//! * `NewArray`, `ArrayLength`: Allocate an array, read its length.
//! * `BoundsCheck`: Guard an array access; removable when the index is
//! provably in range.
//! * `Invoke`: Call another method by name, optionally keeping the result.
//! * `Return`: Leave the method, optionally with a value.
//! * `Nop`: Does nothing.
//!
//! ## `Edge`
//!
//! Conditional control flow is expressed by guarding edges with conditions,
//! never by branch operations. A two-way branch on `c` is lifted as two edges,
//! one guarded by `c` and one guarded by `c == 0`.
//!
//! ## `Function` and `Program`
//!
//! A `Function` names a `ControlFlowGraph` and its formal parameters. A
//! `Program` holds every `Function`, resolves call targets by name, and
//! builds the call graph.

use crate::graph;

mod block;
mod control_flow_graph;
mod edge;
mod expression;
mod function;
mod instruction;
mod location;
mod operation;
mod program;
mod scalar;

pub use self::block::*;
pub use self::control_flow_graph::*;
pub use self::edge::*;
pub use self::expression::*;
pub use self::function::*;
pub use self::instruction::*;
pub use self::location::*;
pub use self::operation::*;
pub use self::program::*;
pub use self::scalar::*;

/// A convenience function to create a new constant expression.
pub fn expr_const(value: i64) -> Expression {
    Expression::constant(value)
}

/// A convenience function to create a new scalar.
///
/// This is the preferred way to create a `Scalar`.
pub fn scalar<S>(name: S) -> Scalar
where
    S: Into<String>,
{
    Scalar::new(name)
}

/// A convenience function to create a new scalar expression.
pub fn expr_scalar<S>(name: S) -> Expression
where
    S: Into<String>,
{
    Expression::scalar(Scalar::new(name))
}
