//! A memory model for abstract interpretation
//!
//! `AbstractMemory` maps `AccessPath` to `Interval`. Paths missing from the
//! map are unknown, `Interval::Top`, so the map only ever holds facts, and
//! dropping an entry is always sound.

use crate::analysis::ai::access_path::{AccessPath, Base};
use crate::analysis::ai::domain::AbstractDomain;
use crate::analysis::ai::interval::Interval;
use std::collections::BTreeMap;
use std::fmt;

/// A finite map from `AccessPath` to `Interval`, or the unreachable memory.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AbstractMemory {
    // When set, the map is empty and this memory is bottom.
    bottom: bool,
    store: BTreeMap<AccessPath, Interval>,
}

impl AbstractMemory {
    /// A memory where nothing is known.
    pub fn new() -> AbstractMemory {
        AbstractMemory::default()
    }

    /// Read the value at `path`. Unknown paths are `Interval::Top`.
    pub fn read_store(&self, path: &AccessPath) -> Interval {
        if self.bottom {
            return Interval::Bottom;
        }
        self.store.get(path).cloned().unwrap_or(Interval::Top)
    }

    /// Replace the value at `path`.
    ///
    /// Storing `Interval::Bottom` makes the whole memory unreachable.
    pub fn write_store_strong(&mut self, path: AccessPath, value: Interval) {
        if self.bottom {
            return;
        }
        match value {
            Interval::Bottom => self.set_to_bottom(),
            Interval::Top => {
                self.store.remove(&path);
            }
            value => {
                self.store.insert(path, value);
            }
        }
    }

    /// Join `value` into the value at `path`, and forget every other path
    /// which shares a prefix with `path`.
    pub fn write_store_weak(&mut self, path: AccessPath, value: Interval) {
        if self.bottom {
            return;
        }
        self.store
            .retain(|key, _| *key == path || !key.shares_prefix(&path));
        let joined = self.read_store(&path).join(&value);
        self.write_store_strong(path, joined);
    }

    /// Forget every path, other than `path` itself, a store through `path`
    /// may affect.
    pub fn invalidate_aliases(&mut self, path: &AccessPath) {
        self.store
            .retain(|key, _| key == path || !path.may_affect(key));
    }

    /// Forget every path reached through the local variable `path`. The value
    /// of the variable itself is kept.
    pub fn kill_rooted(&mut self, path: &AccessPath) {
        self.store
            .retain(|key, _| key.is_root() || key.base() != path.base());
    }

    /// Forget every path the predicate rejects.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&AccessPath, &Interval) -> bool,
    {
        self.store.retain(|key, value| f(key, value));
    }

    /// Keep at most `max_paths` entries. Entries with the longest paths are
    /// dropped first.
    pub fn prune(&mut self, max_paths: usize) {
        if self.store.len() <= max_paths {
            return;
        }
        let mut keys: Vec<AccessPath> = self.store.keys().cloned().collect();
        keys.sort_by(|lhs, rhs| {
            lhs.elements()
                .len()
                .cmp(&rhs.elements().len())
                .then_with(|| lhs.cmp(rhs))
        });
        for key in keys.into_iter().skip(max_paths) {
            self.store.remove(&key);
        }
    }

    /// Forget everything.
    pub fn set_to_top(&mut self) {
        self.bottom = false;
        self.store.clear();
    }

    /// Make this memory unreachable.
    pub fn set_to_bottom(&mut self) {
        self.bottom = true;
        self.store.clear();
    }

    /// A copy of this memory holding only the paths the predicate accepts.
    pub fn project<F>(&self, f: F) -> AbstractMemory
    where
        F: Fn(&AccessPath) -> bool,
    {
        AbstractMemory {
            bottom: self.bottom,
            store: self
                .store
                .iter()
                .filter(|(key, _)| f(key))
                .map(|(key, value)| (key.clone(), *value))
                .collect(),
        }
    }

    /// A copy of this memory with the formal parameter slots moved onto the
    /// given locals. Other paths on `Base::Parameter` are dropped.
    pub fn rename_parameters(&self, parameters: &[String]) -> AbstractMemory {
        let mut renamed = AbstractMemory {
            bottom: self.bottom,
            store: BTreeMap::new(),
        };
        for (key, value) in &self.store {
            match key.base() {
                Base::Parameter(position) => {
                    if let Some(name) = parameters.get(*position) {
                        renamed
                            .store
                            .insert(key.rebase(Base::Local(name.clone())), *value);
                    }
                }
                _ => {
                    renamed.store.insert(key.clone(), *value);
                }
            }
        }
        renamed
    }

    /// The value a method returned.
    pub fn return_value(&self) -> Interval {
        self.read_store(&AccessPath::return_slot())
    }

    pub fn set_return_value(&mut self, value: Interval) {
        self.write_store_strong(AccessPath::return_slot(), value);
    }

    /// Iterate over the known facts of this memory.
    pub fn iter(&self) -> impl Iterator<Item = (&AccessPath, &Interval)> {
        self.store.iter()
    }

    /// The number of paths with a known value.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Join with `other` in place.
    pub fn join_with(&mut self, other: &AbstractMemory) {
        *self = self.join(other);
    }
}

impl AbstractDomain for AbstractMemory {
    fn bottom() -> AbstractMemory {
        AbstractMemory {
            bottom: true,
            store: BTreeMap::new(),
        }
    }

    fn top() -> AbstractMemory {
        AbstractMemory::new()
    }

    fn is_bottom(&self) -> bool {
        self.bottom
    }

    fn is_top(&self) -> bool {
        !self.bottom && self.store.is_empty()
    }

    fn leq(&self, other: &AbstractMemory) -> bool {
        if self.bottom {
            return true;
        }
        if other.bottom {
            return false;
        }
        other
            .store
            .iter()
            .all(|(key, value)| self.read_store(key).leq(value))
    }

    /// Pointwise join. A path known on one side only is unknown in the result.
    fn join(&self, other: &AbstractMemory) -> AbstractMemory {
        if self.bottom {
            return other.clone();
        }
        if other.bottom {
            return self.clone();
        }
        let mut joined = AbstractMemory::new();
        for (key, value) in &self.store {
            if let Some(other_value) = other.store.get(key) {
                joined.write_store_strong(key.clone(), value.join(other_value));
            }
        }
        joined
    }

    fn meet(&self, other: &AbstractMemory) -> AbstractMemory {
        if self.bottom || other.bottom {
            return AbstractMemory::bottom();
        }
        let mut met = self.clone();
        for (key, value) in &other.store {
            let value = met.read_store(key).meet(value);
            met.write_store_strong(key.clone(), value);
        }
        met
    }

    fn widen(&self, other: &AbstractMemory) -> AbstractMemory {
        if self.bottom {
            return other.clone();
        }
        if other.bottom {
            return self.clone();
        }
        let mut widened = AbstractMemory::new();
        for (key, value) in &self.store {
            if let Some(other_value) = other.store.get(key) {
                widened.write_store_strong(key.clone(), value.widen(other_value));
            }
        }
        widened
    }
}

impl fmt::Display for AbstractMemory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.bottom {
            return write!(f, "⊥");
        }
        write!(f, "{{")?;
        for (i, (key, value)) in self.store.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ai::access_path::IndexKey;
    use proptest::prelude::*;

    fn arr(index: IndexKey) -> AccessPath {
        AccessPath::local("arr").append_array_access(index)
    }

    #[test]
    fn read_unknown_is_top() {
        let memory = AbstractMemory::new();
        assert_eq!(memory.read_store(&AccessPath::local("x")), Interval::Top);
        assert_eq!(
            AbstractMemory::bottom().read_store(&AccessPath::local("x")),
            Interval::Bottom
        );
    }

    #[test]
    fn strong_update() {
        let xf = AccessPath::local("x").append_field("f");
        let mut memory = AbstractMemory::new();
        memory.write_store_strong(xf.clone(), Interval::range(1, 9));
        memory.write_store_strong(xf.clone(), Interval::constant(3));
        assert_eq!(memory.read_store(&xf), Interval::constant(3));

        memory.write_store_strong(xf.clone(), Interval::Top);
        assert!(memory.is_top());

        memory.write_store_strong(xf, Interval::Bottom);
        assert!(memory.is_bottom());
    }

    #[test]
    fn weak_update_invalidates_shared_prefixes() {
        let mut memory = AbstractMemory::new();
        memory.write_store_strong(arr(IndexKey::Constant(0)), Interval::constant(5));
        memory.write_store_strong(arr(IndexKey::Constant(1)), Interval::constant(7));
        memory.write_store_strong(AccessPath::local("i"), Interval::range(0, 1));

        memory.write_store_weak(arr(IndexKey::Unknown), Interval::constant(9));

        assert_eq!(memory.read_store(&arr(IndexKey::Constant(0))), Interval::Top);
        assert_eq!(memory.read_store(&arr(IndexKey::Constant(1))), Interval::Top);
        assert_eq!(memory.read_store(&arr(IndexKey::Unknown)), Interval::Top);
        assert_eq!(
            memory.read_store(&AccessPath::local("i")),
            Interval::range(0, 1)
        );
    }

    #[test]
    fn weak_update_joins_the_path() {
        let x = AccessPath::static_location("x");
        let mut memory = AbstractMemory::new();
        memory.write_store_strong(x.clone(), Interval::constant(1));
        memory.write_store_weak(x.clone(), Interval::constant(4));
        assert_eq!(memory.read_store(&x), Interval::range(1, 4));
    }

    #[test]
    fn invalidate_aliases() {
        let mut memory = AbstractMemory::new();
        memory.write_store_strong(arr(IndexKey::Constant(0)), Interval::constant(5));
        memory.write_store_strong(
            AccessPath::local("arr").append_field("length"),
            Interval::constant(10),
        );
        memory.invalidate_aliases(&arr(IndexKey::Unknown));
        assert_eq!(memory.len(), 1);
        assert_eq!(
            memory.read_store(&AccessPath::local("arr").append_field("length")),
            Interval::constant(10)
        );
    }

    #[test]
    fn join_drops_one_sided_paths() {
        let x = AccessPath::local("x");
        let y = AccessPath::local("y");
        let mut lhs = AbstractMemory::new();
        lhs.write_store_strong(x.clone(), Interval::constant(1));
        lhs.write_store_strong(y.clone(), Interval::constant(1));
        let mut rhs = AbstractMemory::new();
        rhs.write_store_strong(x.clone(), Interval::constant(20));

        let joined = lhs.join(&rhs);
        assert_eq!(joined.read_store(&x), Interval::range(1, 20));
        assert_eq!(joined.read_store(&y), Interval::Top);
        assert!(lhs.leq(&joined));
        assert!(rhs.leq(&joined));
        assert_eq!(AbstractMemory::bottom().join(&rhs), rhs);
    }

    #[test]
    fn copies_are_independent() {
        let x = AccessPath::local("x");
        let mut memory = AbstractMemory::new();
        memory.write_store_strong(x.clone(), Interval::constant(1));
        let snapshot = memory.clone();
        memory.set_to_top();
        assert_eq!(snapshot.read_store(&x), Interval::constant(1));
        assert!(memory.is_top());
    }

    #[test]
    fn rename_parameters() {
        let mut memory = AbstractMemory::new();
        memory.write_store_strong(AccessPath::parameter(0), Interval::range(0, 2));
        memory.write_store_strong(AccessPath::parameter(1), Interval::constant(4));
        memory.write_store_strong(AccessPath::static_location("s"), Interval::constant(3));

        let renamed = memory.rename_parameters(&["n".to_string()]);
        assert_eq!(renamed.read_store(&AccessPath::local("n")), Interval::range(0, 2));
        assert_eq!(
            renamed.read_store(&AccessPath::static_location("s")),
            Interval::constant(3)
        );
        assert_eq!(renamed.len(), 2);
    }

    #[test]
    fn prune_keeps_short_paths() {
        let mut memory = AbstractMemory::new();
        memory.write_store_strong(AccessPath::local("x"), Interval::constant(1));
        memory.write_store_strong(
            AccessPath::local("x").append_field("f"),
            Interval::constant(2),
        );
        memory.prune(1);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.read_store(&AccessPath::local("x")), Interval::constant(1));
    }

    fn memory() -> impl Strategy<Value = AbstractMemory> {
        let entry = (0usize..4, -20i64..20, 0i64..10);
        prop_oneof![
            1 => Just(AbstractMemory::bottom()),
            6 => proptest::collection::vec(entry, 0..4).prop_map(|entries| {
                let mut memory = AbstractMemory::new();
                for (variable, lower, width) in entries {
                    memory.write_store_strong(
                        AccessPath::local(format!("v{}", variable)),
                        Interval::range(lower, lower + width),
                    );
                }
                memory
            }),
        ]
    }

    proptest! {
        #[test]
        fn join_is_an_upper_bound(a in memory(), b in memory()) {
            let joined = a.join(&b);
            prop_assert!(a.leq(&joined));
            prop_assert!(b.leq(&joined));
            prop_assert_eq!(joined.clone(), b.join(&a));
        }

        #[test]
        fn meet_is_a_lower_bound(a in memory(), b in memory()) {
            let met = a.meet(&b);
            prop_assert!(met.leq(&a));
            prop_assert!(met.leq(&b));
        }

        #[test]
        fn widen_is_an_upper_bound(a in memory(), b in memory()) {
            let widened = a.widen(&b);
            prop_assert!(a.leq(&widened));
            prop_assert!(b.leq(&widened));
        }
    }
}
