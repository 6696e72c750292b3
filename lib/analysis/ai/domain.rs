//! Abstractions/traits for an Abstract Domain

use std::fmt::Debug;

/// A lattice of abstract facts.
///
/// Every domain the fixed point engine iterates over implements this trait.
/// Implementations must keep `join` an upper bound of both operands and
/// `meet` a lower bound, with `bottom() <= x <= top()` for every `x`.
pub trait AbstractDomain: Clone + Debug + PartialEq {
    /// The least element. For states, this means "unreachable".
    fn bottom() -> Self;

    /// The greatest element, "nothing is known."
    fn top() -> Self;

    fn is_bottom(&self) -> bool;

    fn is_top(&self) -> bool;

    /// The partial order of the lattice.
    fn leq(&self, other: &Self) -> bool;

    /// Least upper bound.
    fn join(&self, other: &Self) -> Self;

    /// Greatest lower bound.
    fn meet(&self, other: &Self) -> Self;

    /// Widening. `self` is the previous value, `other` the new one. The
    /// result is an upper bound of both, and any chain of widenings
    /// stabilizes in finitely many steps.
    ///
    /// Domains of finite height may rely on the default, which joins.
    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }
}
