//! Counters of the optimizations an analysis makes possible.

use crate::analysis::ai::interpreter::{eval, index_key};
use crate::analysis::ai::{
    AbstractDomain, AbstractMemory, AccessPath, IntervalValue, MemoryAccess, LENGTH_FIELD,
};
use crate::analysis::fixed_point::FixedPointResult;
use crate::il;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// An optimization a code transformer may apply.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum OptimizationKind {
    BoundsCheckEliminated,
    ConstantStampTightened,
    ConstantPropagated,
    BranchFoldedTrue,
    BranchFoldedFalse,
    InvokeReplacedWithConstant,
}

impl OptimizationKind {
    pub const ALL: [OptimizationKind; 6] = [
        OptimizationKind::BoundsCheckEliminated,
        OptimizationKind::ConstantStampTightened,
        OptimizationKind::ConstantPropagated,
        OptimizationKind::BranchFoldedTrue,
        OptimizationKind::BranchFoldedFalse,
        OptimizationKind::InvokeReplacedWithConstant,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OptimizationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            OptimizationKind::BoundsCheckEliminated => "bounds-check-eliminated",
            OptimizationKind::ConstantStampTightened => "constant-stamp-tightened",
            OptimizationKind::ConstantPropagated => "constant-propagated",
            OptimizationKind::BranchFoldedTrue => "branch-folded-true",
            OptimizationKind::BranchFoldedFalse => "branch-folded-false",
            OptimizationKind::InvokeReplacedWithConstant => "invoke-replaced-with-constant",
        };
        write!(f, "{}", name)
    }
}

/// An optimization found at a location. Branch folds are located at the
/// end of the branching block, one past its last instruction.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Opportunity {
    location: il::ProgramPoint,
    kind: OptimizationKind,
}

impl Opportunity {
    pub fn new(location: il::ProgramPoint, kind: OptimizationKind) -> Opportunity {
        Opportunity { location, kind }
    }

    pub fn location(&self) -> il::ProgramPoint {
        self.location
    }

    pub fn kind(&self) -> OptimizationKind {
        self.kind
    }
}

/// Find the optimizations the converged states of `function` allow.
pub fn optimization_opportunities(
    function: &il::Function,
    result: &FixedPointResult<AbstractMemory>,
) -> Result<Vec<Opportunity>, Error> {
    let mut opportunities = Vec::new();

    for (&point, state) in result.states() {
        if state.is_bottom() {
            continue;
        }
        let instruction = function.instruction(point)?;
        let kind = match instruction.operation() {
            il::Operation::BoundsCheck { array, index } => {
                let index = eval(state, index);
                let length =
                    state.read_store(&AccessPath::from(array).append_field(LENGTH_FIELD));
                match (index.bounds(), length.lower()) {
                    (Some((lower, upper)), Some(length))
                        if lower >= IntervalValue::Constant(0) && upper < length =>
                    {
                        Some(OptimizationKind::BoundsCheckEliminated)
                    }
                    _ => None,
                }
            }
            il::Operation::Assign { src, .. } => {
                if src.get_constant().is_none() && eval(state, src).get_constant().is_some() {
                    Some(OptimizationKind::ConstantPropagated)
                } else {
                    None
                }
            }
            operation @ il::Operation::LoadField { .. }
            | operation @ il::Operation::LoadStatic { .. }
            | operation @ il::Operation::LoadIndexed { .. }
            | operation @ il::Operation::ArrayLength { .. } => {
                let value = match operation.access_path(|index| index_key(state, index)) {
                    Some(path) => state.read_store(&path),
                    None => continue,
                };
                if value.get_constant().is_some() {
                    Some(OptimizationKind::ConstantPropagated)
                } else if !value.is_top() && !value.is_bottom() {
                    Some(OptimizationKind::ConstantStampTightened)
                } else {
                    None
                }
            }
            il::Operation::Invoke { dst: Some(dst), .. } => {
                let next = il::ProgramPoint::new(point.block(), point.instruction() + 1);
                let after = result
                    .state(next)
                    .or_else(|| result.exit(point.block()));
                match after {
                    Some(after)
                        if after
                            .read_store(&AccessPath::from(dst))
                            .get_constant()
                            .is_some() =>
                    {
                        Some(OptimizationKind::InvokeReplacedWithConstant)
                    }
                    _ => None,
                }
            }
            _ => None,
        };
        if let Some(kind) = kind {
            opportunities.push(Opportunity::new(point, kind));
        }
    }

    let control_flow_graph = function.control_flow_graph();
    for edge in control_flow_graph.edges() {
        let condition = match edge.condition() {
            Some(condition) if condition.negated().is_none() => condition,
            _ => continue,
        };
        let exit = match result.exit(edge.head()) {
            Some(exit) if !exit.is_bottom() => exit,
            _ => continue,
        };
        let kind = match eval(exit, condition).get_constant() {
            Some(0) => OptimizationKind::BranchFoldedFalse,
            Some(_) => OptimizationKind::BranchFoldedTrue,
            None => continue,
        };
        let block = control_flow_graph.block(edge.head())?;
        opportunities.push(Opportunity::new(
            il::ProgramPoint::new(edge.head(), block.instructions().len()),
            kind,
        ));
    }

    Ok(opportunities)
}

#[derive(Debug, Default)]
struct MethodCounters {
    counters: [AtomicUsize; 6],
}

/// Per-method optimization counters, safe to update from many threads.
#[derive(Debug, Default)]
pub struct Statistics {
    methods: Mutex<BTreeMap<String, Arc<MethodCounters>>>,
}

impl Statistics {
    pub fn new() -> Statistics {
        Statistics::default()
    }

    fn methods(&self) -> MutexGuard<BTreeMap<String, Arc<MethodCounters>>> {
        match self.methods.lock() {
            Ok(methods) => methods,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn counters(&self, method: &str) -> Arc<MethodCounters> {
        self.methods()
            .entry(method.to_string())
            .or_insert_with(Default::default)
            .clone()
    }

    pub fn add(&self, method: &str, kind: OptimizationKind, count: usize) {
        self.counters(method).counters[kind.index()].fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment(&self, method: &str, kind: OptimizationKind) {
        self.add(method, kind, 1);
    }

    /// Count every opportunity found in `method`.
    pub fn record(&self, method: &str, opportunities: &[Opportunity]) {
        let counters = self.counters(method);
        for opportunity in opportunities {
            counters.counters[opportunity.kind().index()].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// The count of `kind` in one method.
    pub fn count(&self, method: &str, kind: OptimizationKind) -> usize {
        self.methods()
            .get(method)
            .map(|counters| counters.counters[kind.index()].load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// The count of `kind` over every method.
    pub fn total(&self, kind: OptimizationKind) -> usize {
        self.methods()
            .values()
            .map(|counters| counters.counters[kind.index()].load(Ordering::Relaxed))
            .sum()
    }

    /// A point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let methods = self
            .methods()
            .iter()
            .map(|(method, counters)| {
                let counts = OptimizationKind::ALL
                    .iter()
                    .map(|&kind| (kind, counters.counters[kind.index()].load(Ordering::Relaxed)))
                    .filter(|&(_, count)| count > 0)
                    .collect();
                (method.clone(), counts)
            })
            .collect();
        StatisticsSnapshot { methods }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }
}

/// Counters copied out of `Statistics`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    methods: BTreeMap<String, BTreeMap<OptimizationKind, usize>>,
}

impl StatisticsSnapshot {
    pub fn methods(&self) -> &BTreeMap<String, BTreeMap<OptimizationKind, usize>> {
        &self.methods
    }

    pub fn count(&self, method: &str, kind: OptimizationKind) -> usize {
        self.methods
            .get(method)
            .and_then(|counts| counts.get(&kind))
            .cloned()
            .unwrap_or(0)
    }

    pub fn total(&self, kind: OptimizationKind) -> usize {
        self.methods
            .values()
            .filter_map(|counts| counts.get(&kind))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn totals_merge_methods() {
        let statistics = Statistics::new();
        statistics.increment("a", OptimizationKind::ConstantPropagated);
        statistics.add("b", OptimizationKind::ConstantPropagated, 2);
        statistics.record(
            "b",
            &[Opportunity::new(
                il::ProgramPoint::new(0, 0),
                OptimizationKind::BranchFoldedTrue,
            )],
        );

        assert_eq!(statistics.count("a", OptimizationKind::ConstantPropagated), 1);
        assert_eq!(statistics.total(OptimizationKind::ConstantPropagated), 3);
        assert_eq!(statistics.total(OptimizationKind::BranchFoldedTrue), 1);
        assert_eq!(statistics.count("c", OptimizationKind::BranchFoldedTrue), 0);
    }

    #[test]
    fn concurrent_updates() {
        let statistics = Statistics::new();
        (0..1000).into_par_iter().for_each(|i| {
            let method = if i % 2 == 0 { "even" } else { "odd" };
            statistics.increment(method, OptimizationKind::BoundsCheckEliminated);
        });
        assert_eq!(statistics.count("even", OptimizationKind::BoundsCheckEliminated), 500);
        assert_eq!(statistics.total(OptimizationKind::BoundsCheckEliminated), 1000);
    }

    #[test]
    fn snapshot_to_json() {
        let statistics = Statistics::new();
        statistics.add("m", OptimizationKind::InvokeReplacedWithConstant, 4);

        let snapshot = statistics.snapshot();
        assert_eq!(snapshot.count("m", OptimizationKind::InvokeReplacedWithConstant), 4);
        assert_eq!(snapshot.total(OptimizationKind::BoundsCheckEliminated), 0);

        let json = statistics.to_json().unwrap();
        let parsed: StatisticsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
        assert!(json.contains("InvokeReplacedWithConstant"));
    }
}
