//! An implementation of an interval domain over signed 64-bit integers.
//!
//! Bounds may be infinite. Arithmetic saturates at the infinite bounds, and
//! any finite endpoint computation which overflows 64 bits gives up and
//! returns `Interval::Top`.

use crate::analysis::ai::domain::AbstractDomain;
use serde::{Deserialize, Serialize};
use std::cmp::{self, Ordering};
use std::fmt;

/// An interval bound, either a constant or infinite
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum IntervalValue {
    NegInfinity,
    Constant(i64),
    PosInfinity,
}

impl IntervalValue {
    fn neg(self) -> Option<IntervalValue> {
        Some(match self {
            IntervalValue::NegInfinity => IntervalValue::PosInfinity,
            IntervalValue::Constant(c) => IntervalValue::Constant(c.checked_neg()?),
            IntervalValue::PosInfinity => IntervalValue::NegInfinity,
        })
    }

    fn add(self, other: IntervalValue) -> Option<IntervalValue> {
        use self::IntervalValue::*;
        match (self, other) {
            (NegInfinity, PosInfinity) | (PosInfinity, NegInfinity) => None,
            (NegInfinity, _) | (_, NegInfinity) => Some(NegInfinity),
            (PosInfinity, _) | (_, PosInfinity) => Some(PosInfinity),
            (Constant(l), Constant(r)) => l.checked_add(r).map(Constant),
        }
    }

    fn signum(self) -> i64 {
        match self {
            IntervalValue::NegInfinity => -1,
            IntervalValue::Constant(c) => c.signum(),
            IntervalValue::PosInfinity => 1,
        }
    }

    fn mul(self, other: IntervalValue) -> Option<IntervalValue> {
        use self::IntervalValue::*;
        match (self, other) {
            (Constant(l), Constant(r)) => l.checked_mul(r).map(Constant),
            // 0 * inf is 0, the infinite bound never denotes an actual value
            (Constant(0), _) | (_, Constant(0)) => Some(Constant(0)),
            (l, r) => Some(if l.signum() * r.signum() > 0 {
                PosInfinity
            } else {
                NegInfinity
            }),
        }
    }

    fn divs(self, other: IntervalValue) -> Option<IntervalValue> {
        match (self, other) {
            (IntervalValue::Constant(l), IntervalValue::Constant(r)) => {
                l.checked_div(r).map(IntervalValue::Constant)
            }
            _ => None,
        }
    }
}

impl fmt::Display for IntervalValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            IntervalValue::NegInfinity => write!(f, "-∞"),
            IntervalValue::Constant(c) => write!(f, "{}", c),
            IntervalValue::PosInfinity => write!(f, "+∞"),
        }
    }
}

/// An interval lattice
///
/// `Interval::Interval(lower, upper)` always satisfies `lower <= upper`, has
/// a finite bound on at least one side, and is built through `Interval::new`.
#[derive(Clone, Copy, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Interval {
    Top,
    Interval(IntervalValue, IntervalValue),
    Bottom,
}

impl Interval {
    /// Create an `Interval` from its bounds, normalizing empty intervals to
    /// `Interval::Bottom` and unbounded ones to `Interval::Top`.
    pub fn new(lower: IntervalValue, upper: IntervalValue) -> Interval {
        if lower > upper
            || lower == IntervalValue::PosInfinity
            || upper == IntervalValue::NegInfinity
        {
            Interval::Bottom
        } else if lower == IntervalValue::NegInfinity && upper == IntervalValue::PosInfinity {
            Interval::Top
        } else {
            Interval::Interval(lower, upper)
        }
    }

    /// Create an `Interval` holding exactly `value`
    pub fn constant(value: i64) -> Interval {
        Interval::Interval(IntervalValue::Constant(value), IntervalValue::Constant(value))
    }

    /// Create the finite interval `[lower, upper]`
    pub fn range(lower: i64, upper: i64) -> Interval {
        Interval::new(IntervalValue::Constant(lower), IntervalValue::Constant(upper))
    }

    /// `[value, +∞)`
    pub fn at_least(value: i64) -> Interval {
        Interval::new(IntervalValue::Constant(value), IntervalValue::PosInfinity)
    }

    /// `(-∞, value]`
    pub fn at_most(value: i64) -> Interval {
        Interval::new(IntervalValue::NegInfinity, IntervalValue::Constant(value))
    }

    /// The interval of a comparison result which may be either true or false.
    pub fn boolean() -> Interval {
        Interval::range(0, 1)
    }

    /// The bounds of this interval, or `None` for `Interval::Bottom`.
    pub fn bounds(&self) -> Option<(IntervalValue, IntervalValue)> {
        match *self {
            Interval::Top => Some((IntervalValue::NegInfinity, IntervalValue::PosInfinity)),
            Interval::Interval(lower, upper) => Some((lower, upper)),
            Interval::Bottom => None,
        }
    }

    pub fn lower(&self) -> Option<IntervalValue> {
        self.bounds().map(|(lower, _)| lower)
    }

    pub fn upper(&self) -> Option<IntervalValue> {
        self.bounds().map(|(_, upper)| upper)
    }

    /// If this interval holds exactly one value, return it.
    pub fn get_constant(&self) -> Option<i64> {
        match *self {
            Interval::Interval(IntervalValue::Constant(l), IntervalValue::Constant(u)) if l == u => {
                Some(l)
            }
            _ => None,
        }
    }

    /// Returns true if `value` lies in this interval.
    pub fn contains(&self, value: i64) -> bool {
        match self.bounds() {
            Some((lower, upper)) => {
                lower <= IntervalValue::Constant(value) && IntervalValue::Constant(value) <= upper
            }
            None => false,
        }
    }

    fn binop<F>(lhs: &Interval, rhs: &Interval, op: F) -> Interval
    where
        F: Fn(
            (IntervalValue, IntervalValue),
            (IntervalValue, IntervalValue),
        ) -> Option<(IntervalValue, IntervalValue)>,
    {
        match (lhs.bounds(), rhs.bounds()) {
            (Some(l), Some(r)) => match op(l, r) {
                Some((lower, upper)) => Interval::new(lower, upper),
                None => Interval::Top,
            },
            _ => Interval::Bottom,
        }
    }

    fn corners<F>(
        (llower, lupper): (IntervalValue, IntervalValue),
        (rlower, rupper): (IntervalValue, IntervalValue),
        op: F,
    ) -> Option<(IntervalValue, IntervalValue)>
    where
        F: Fn(IntervalValue, IntervalValue) -> Option<IntervalValue>,
    {
        let corners = [
            op(llower, rlower)?,
            op(llower, rupper)?,
            op(lupper, rlower)?,
            op(lupper, rupper)?,
        ];
        let lower = corners.iter().min().cloned()?;
        let upper = corners.iter().max().cloned()?;
        Some((lower, upper))
    }

    pub fn add(&self, rhs: &Interval) -> Interval {
        Interval::binop(self, rhs, |(ll, lu), (rl, ru)| {
            Some((ll.add(rl)?, lu.add(ru)?))
        })
    }

    pub fn sub(&self, rhs: &Interval) -> Interval {
        Interval::binop(self, rhs, |(ll, lu), (rl, ru)| {
            Some((ll.add(ru.neg()?)?, lu.add(rl.neg()?)?))
        })
    }

    pub fn mul(&self, rhs: &Interval) -> Interval {
        Interval::binop(self, rhs, |l, r| Interval::corners(l, r, IntervalValue::mul))
    }

    /// Signed, truncating division. A divisor which may be zero gives `Top`.
    pub fn divs(&self, rhs: &Interval) -> Interval {
        if rhs.contains(0) {
            return if self.is_bottom() || rhs.is_bottom() {
                Interval::Bottom
            } else {
                Interval::Top
            };
        }
        Interval::binop(self, rhs, |l, r| Interval::corners(l, r, IntervalValue::divs))
    }

    /// `1` if `self < rhs` always holds, `0` if it never holds.
    pub fn cmplts(&self, rhs: &Interval) -> Interval {
        match (self.bounds(), rhs.bounds()) {
            (Some((llower, lupper)), Some((rlower, rupper))) => {
                if lupper < rlower {
                    Interval::constant(1)
                } else if llower >= rupper {
                    Interval::constant(0)
                } else {
                    Interval::boolean()
                }
            }
            _ => Interval::Bottom,
        }
    }

    pub fn cmpeq(&self, rhs: &Interval) -> Interval {
        if self.is_bottom() || rhs.is_bottom() {
            return Interval::Bottom;
        }
        match (self.get_constant(), rhs.get_constant()) {
            (Some(l), Some(r)) if l == r => Interval::constant(1),
            _ => {
                if self.meet(rhs).is_bottom() {
                    Interval::constant(0)
                } else {
                    Interval::boolean()
                }
            }
        }
    }

    pub fn cmpneq(&self, rhs: &Interval) -> Interval {
        let eq = self.cmpeq(rhs);
        match eq.get_constant() {
            Some(c) => Interval::constant(1 - c),
            None => eq,
        }
    }
}

impl AbstractDomain for Interval {
    fn bottom() -> Interval {
        Interval::Bottom
    }

    fn top() -> Interval {
        Interval::Top
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Interval::Bottom)
    }

    fn is_top(&self) -> bool {
        matches!(self, Interval::Top)
    }

    fn leq(&self, other: &Interval) -> bool {
        match (self.bounds(), other.bounds()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some((llower, lupper)), Some((rlower, rupper))) => {
                rlower <= llower && lupper <= rupper
            }
        }
    }

    /// The convex hull of both intervals.
    fn join(&self, other: &Interval) -> Interval {
        match (self.bounds(), other.bounds()) {
            (None, _) => *other,
            (_, None) => *self,
            (Some((llower, lupper)), Some((rlower, rupper))) => {
                Interval::new(cmp::min(llower, rlower), cmp::max(lupper, rupper))
            }
        }
    }

    fn meet(&self, other: &Interval) -> Interval {
        match (self.bounds(), other.bounds()) {
            (Some((llower, lupper)), Some((rlower, rupper))) => {
                Interval::new(cmp::max(llower, rlower), cmp::min(lupper, rupper))
            }
            _ => Interval::Bottom,
        }
    }

    /// Any bound which moved since the previous iteration jumps to infinity.
    fn widen(&self, other: &Interval) -> Interval {
        match (self.bounds(), other.bounds()) {
            (None, _) => *other,
            (_, None) => *self,
            (Some((llower, lupper)), Some((rlower, rupper))) => Interval::new(
                if rlower < llower {
                    IntervalValue::NegInfinity
                } else {
                    llower
                },
                if rupper > lupper {
                    IntervalValue::PosInfinity
                } else {
                    lupper
                },
            ),
        }
    }
}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Interval) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else if self.leq(other) {
            Some(Ordering::Less)
        } else if other.leq(self) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Interval::Top => write!(f, "⊤"),
            Interval::Bottom => write!(f, "⊥"),
            Interval::Interval(lower, upper) => write!(f, "[{},{}]", lower, upper),
        }
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
