//! The locations a computation may store to.

use crate::analysis::ai::access_path::AccessPath;
use crate::analysis::ai::domain::AbstractDomain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A three-point lattice over stored locations: nothing, a single
/// `AccessPath`, or anything.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum LocationEffect {
    Empty,
    Single(AccessPath),
    Any,
}

impl LocationEffect {
    /// The effect of a store through `path`.
    pub fn store(path: AccessPath) -> LocationEffect {
        LocationEffect::Single(path)
    }

    /// Join two effects.
    pub fn combine_effects(&self, other: &LocationEffect) -> LocationEffect {
        match (self, other) {
            (LocationEffect::Empty, effect) | (effect, LocationEffect::Empty) => effect.clone(),
            (LocationEffect::Single(lhs), LocationEffect::Single(rhs)) if lhs == rhs => {
                LocationEffect::Single(lhs.clone())
            }
            _ => LocationEffect::Any,
        }
    }

    /// Returns true if a computation with this effect may change the value
    /// read through `path`.
    ///
    /// Local variables are never touched, a callee cannot reach its caller's
    /// locals.
    pub fn may_touch(&self, path: &AccessPath) -> bool {
        match self {
            LocationEffect::Empty => false,
            LocationEffect::Single(location) => location.may_affect(path),
            LocationEffect::Any => !path.is_local_variable(),
        }
    }
}

impl Default for LocationEffect {
    fn default() -> LocationEffect {
        LocationEffect::Empty
    }
}

impl AbstractDomain for LocationEffect {
    fn bottom() -> LocationEffect {
        LocationEffect::Empty
    }

    fn top() -> LocationEffect {
        LocationEffect::Any
    }

    fn is_bottom(&self) -> bool {
        matches!(self, LocationEffect::Empty)
    }

    fn is_top(&self) -> bool {
        matches!(self, LocationEffect::Any)
    }

    fn leq(&self, other: &LocationEffect) -> bool {
        match (self, other) {
            (LocationEffect::Empty, _) | (_, LocationEffect::Any) => true,
            (LocationEffect::Single(lhs), LocationEffect::Single(rhs)) => lhs == rhs,
            _ => false,
        }
    }

    fn join(&self, other: &LocationEffect) -> LocationEffect {
        self.combine_effects(other)
    }

    fn meet(&self, other: &LocationEffect) -> LocationEffect {
        match (self, other) {
            (LocationEffect::Any, effect) | (effect, LocationEffect::Any) => effect.clone(),
            (LocationEffect::Single(lhs), LocationEffect::Single(rhs)) if lhs == rhs => {
                LocationEffect::Single(lhs.clone())
            }
            _ => LocationEffect::Empty,
        }
    }
}

impl fmt::Display for LocationEffect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LocationEffect::Empty => write!(f, "empty"),
            LocationEffect::Single(path) => write!(f, "{{{}}}", path),
            LocationEffect::Any => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ai::access_path::IndexKey;

    #[test]
    fn combine_effects() {
        let xf = AccessPath::local("x").append_field("f");
        let yg = AccessPath::local("y").append_field("g");

        let single = LocationEffect::store(xf.clone());
        assert_eq!(LocationEffect::Empty.combine_effects(&single), single);
        assert_eq!(single.combine_effects(&single), single);
        assert_eq!(
            single.combine_effects(&LocationEffect::store(yg)),
            LocationEffect::Any
        );
        assert_eq!(
            LocationEffect::Any.combine_effects(&LocationEffect::Empty),
            LocationEffect::Any
        );
    }

    #[test]
    fn lattice_order() {
        let single = LocationEffect::store(AccessPath::static_location("s"));
        assert!(LocationEffect::Empty.leq(&single));
        assert!(single.leq(&LocationEffect::Any));
        assert!(!LocationEffect::Any.leq(&single));
        assert_eq!(single.meet(&LocationEffect::Any), single);
    }

    #[test]
    fn may_touch() {
        let store = LocationEffect::store(
            AccessPath::local("a").append_array_access(IndexKey::Unknown),
        );
        assert!(store.may_touch(&AccessPath::local("b").append_array_access(IndexKey::Constant(2))));
        assert!(!store.may_touch(&AccessPath::static_location("s")));
        assert!(!LocationEffect::Any.may_touch(&AccessPath::local("i")));
        assert!(LocationEffect::Any.may_touch(&AccessPath::static_location("s")));
        assert!(!LocationEffect::Empty.may_touch(&AccessPath::static_location("s")));
    }
}
