//! Procedure summaries.
//!
//! A `Summary` records that a method entered in a state below its
//! precondition returns in a state below its postcondition, having stored
//! only to locations in its effect. Summaries are keyed by callee and
//! precondition in a `SummaryCache` shared by every analysis of a program, so
//! a callee is analyzed once for all call sites whose argument states its
//! precondition covers.

use crate::analysis::ai::{
    AbstractDomain, AbstractMemory, AccessPath, Interval, IntervalValue, LocationEffect,
};
use crate::analysis::options::AnalysisOptions;
use crate::il;
use log::trace;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// A call instruction, named by its caller and location.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CallSite {
    caller: String,
    location: il::ProgramPoint,
    target: String,
}

impl CallSite {
    pub fn new<S: Into<String>, T: Into<String>>(
        caller: S,
        location: il::ProgramPoint,
        target: T,
    ) -> CallSite {
        CallSite {
            caller: caller.into(),
            location,
            target: target.into(),
        }
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    pub fn location(&self) -> il::ProgramPoint {
        self.location
    }

    /// The name of the invoked method.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{} -> {}", self.caller, self.location, self.target)
    }
}

/// A precondition/postcondition pair for one method.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    callee: String,
    precondition: AbstractMemory,
    postcondition: AbstractMemory,
    effect: LocationEffect,
    complete: bool,
}

impl Summary {
    /// A summary which assumes nothing and promises nothing: any return value,
    /// and stores to any location.
    pub fn conservative<S: Into<String>>(callee: S) -> Summary {
        Summary {
            callee: callee.into(),
            precondition: AbstractMemory::top(),
            postcondition: AbstractMemory::top(),
            effect: LocationEffect::Any,
            complete: true,
        }
    }

    /// An incomplete summary for `callee` under `precondition`.
    pub fn new<S: Into<String>>(callee: S, precondition: AbstractMemory) -> Summary {
        Summary {
            callee: callee.into(),
            precondition,
            postcondition: AbstractMemory::top(),
            effect: LocationEffect::Any,
            complete: false,
        }
    }

    pub fn callee(&self) -> &str {
        &self.callee
    }

    /// The state of formal parameters and statics this summary holds for.
    /// Parameters are named by `AccessPath::parameter`.
    pub fn precondition(&self) -> &AbstractMemory {
        &self.precondition
    }

    /// The return slot and statics on return from the callee.
    pub fn postcondition(&self) -> &AbstractMemory {
        &self.postcondition
    }

    pub fn effect(&self) -> &LocationEffect {
        &self.effect
    }

    /// Returns true once the postcondition is known.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Set the postcondition from the join of the callee's states at its
    /// return instructions, and the effect from everything the callee stored to.
    pub fn finalize_summary(&mut self, exit_state: &AbstractMemory, effect: LocationEffect) {
        self.postcondition =
            exit_state.project(|path| path.is_return_slot() || path.is_static());
        self.effect = effect;
        self.complete = true;
    }

    /// The caller's state after the call, given its state before the call.
    ///
    /// Caller facts about locations the callee may store to are joined with
    /// the postcondition, every other fact survives. A callee which never
    /// returns leaves the caller unreachable.
    pub fn apply_summary(&self, caller: &AbstractMemory) -> AbstractMemory {
        if caller.is_bottom() || self.postcondition.is_bottom() {
            return AbstractMemory::bottom();
        }
        let mut state = caller.clone();
        let touched: Vec<AccessPath> = caller
            .iter()
            .filter(|(path, _)| self.effect.may_touch(path))
            .map(|(path, _)| path.clone())
            .collect();
        for path in touched {
            let value = state
                .read_store(&path)
                .join(&self.postcondition.read_store(&path));
            state.write_store_strong(path, value);
        }
        state
    }

    /// The value the callee returns.
    pub fn return_value(&self) -> Interval {
        self.postcondition.return_value()
    }

    /// Returns true if this summary may stand in for `other`: both are for the
    /// same callee, this one is complete, and `other`'s precondition is below
    /// this one's.
    pub fn subsumes_summary(&self, other: &Summary) -> bool {
        self.complete
            && self.callee == other.callee
            && other.precondition.leq(&self.precondition)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} effect {}",
            self.callee, self.precondition, self.postcondition, self.effect
        )
    }
}

/// Builds summaries at call sites.
pub struct SummaryFactory<'o> {
    options: &'o AnalysisOptions,
}

impl<'o> SummaryFactory<'o> {
    pub fn new(options: &'o AnalysisOptions) -> SummaryFactory<'o> {
        SummaryFactory { options }
    }

    /// Create the incomplete summary for a call.
    ///
    /// The precondition holds each argument's value on its parameter slot, and
    /// the caller's facts about statics.
    pub fn create_summary(
        &self,
        call_site: &CallSite,
        caller_precondition: &AbstractMemory,
        argument_states: &[Interval],
    ) -> Summary {
        let mut precondition = caller_precondition.project(|path| path.is_static());
        for (position, argument) in argument_states.iter().enumerate() {
            precondition.write_store_strong(AccessPath::parameter(position), *argument);
        }
        trace!("{}: precondition {}", call_site, precondition);
        Summary::new(call_site.target(), precondition)
    }

    /// When enabled, and the first argument is bounded above by
    /// `early_summary_bound`, give the call the conservative summary without
    /// analyzing the callee.
    pub fn try_create_early_summary(&self, summary: &Summary) -> Option<Summary> {
        if !self.options.early_summaries() {
            return None;
        }
        let first = summary
            .precondition()
            .read_store(&AccessPath::parameter(0));
        match first.upper() {
            Some(upper) if upper < IntervalValue::Constant(self.options.early_summary_bound()) => {
                Some(Summary::conservative(summary.callee()))
            }
            _ => None,
        }
    }
}

type Bucket = Arc<Mutex<Vec<Arc<Summary>>>>;

/// Complete summaries, shared between analyses, bucketed by callee.
#[derive(Debug, Default)]
pub struct SummaryCache {
    buckets: RwLock<FxHashMap<String, Bucket>>,
}

fn lock(bucket: &Bucket) -> MutexGuard<Vec<Arc<Summary>>> {
    match bucket.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl SummaryCache {
    pub fn new() -> SummaryCache {
        SummaryCache::default()
    }

    fn bucket(&self, callee: &str) -> Option<Bucket> {
        let buckets = match self.buckets.read() {
            Ok(buckets) => buckets,
            Err(poisoned) => poisoned.into_inner(),
        };
        buckets.get(callee).cloned()
    }

    /// Find a summary which subsumes `pending`.
    pub fn find(&self, pending: &Summary) -> Option<Arc<Summary>> {
        let bucket = self.bucket(pending.callee())?;
        let summaries = lock(&bucket);
        summaries
            .iter()
            .find(|summary| summary.subsumes_summary(pending))
            .cloned()
    }

    /// Insert a complete summary. If a summary with the same precondition is
    /// already cached, it is kept and returned instead.
    pub fn insert(&self, summary: Arc<Summary>) -> Arc<Summary> {
        let bucket = match self.bucket(summary.callee()) {
            Some(bucket) => bucket,
            None => {
                let mut buckets = match self.buckets.write() {
                    Ok(buckets) => buckets,
                    Err(poisoned) => poisoned.into_inner(),
                };
                buckets
                    .entry(summary.callee().to_string())
                    .or_insert_with(Bucket::default)
                    .clone()
            }
        };
        let mut summaries = lock(&bucket);
        if let Some(existing) = summaries
            .iter()
            .find(|existing| existing.precondition() == summary.precondition())
        {
            return existing.clone();
        }
        summaries.push(summary.clone());
        summary
    }

    /// The number of summaries cached for `callee`.
    pub fn len(&self, callee: &str) -> usize {
        self.bucket(callee)
            .map(|bucket| lock(&bucket).len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        let buckets = match self.buckets.read() {
            Ok(buckets) => buckets,
            Err(poisoned) => poisoned.into_inner(),
        };
        buckets.values().all(|bucket| lock(bucket).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::options::AnalysisOptionsBuilder;

    fn call_site() -> CallSite {
        CallSite::new("caller", il::ProgramPoint::new(0, 1), "callee")
    }

    fn finalized(arguments: &[Interval], returns: Interval) -> Summary {
        let options = AnalysisOptions::default();
        let factory = SummaryFactory::new(&options);
        let mut summary = factory.create_summary(&call_site(), &AbstractMemory::new(), arguments);
        let mut exit = AbstractMemory::new();
        exit.set_return_value(returns);
        exit.write_store_strong(AccessPath::local("tmp"), Interval::constant(1));
        summary.finalize_summary(&exit, LocationEffect::Empty);
        summary
    }

    #[test]
    fn create_and_finalize() {
        let mut statics = AbstractMemory::new();
        statics.write_store_strong(AccessPath::static_location("s"), Interval::constant(3));
        statics.write_store_strong(AccessPath::local("x"), Interval::constant(4));

        let options = AnalysisOptions::default();
        let summary = SummaryFactory::new(&options).create_summary(
            &call_site(),
            &statics,
            &[Interval::range(0, 2)],
        );
        assert!(!summary.is_complete());
        assert_eq!(summary.callee(), "callee");
        assert_eq!(
            summary.precondition().read_store(&AccessPath::parameter(0)),
            Interval::range(0, 2)
        );
        assert_eq!(
            summary.precondition().read_store(&AccessPath::static_location("s")),
            Interval::constant(3)
        );
        assert_eq!(
            summary.precondition().read_store(&AccessPath::local("x")),
            Interval::Top
        );

        let summary = finalized(&[Interval::range(0, 2)], Interval::constant(7));
        assert!(summary.is_complete());
        assert_eq!(summary.return_value(), Interval::constant(7));
        // locals of the callee are not part of the postcondition
        assert_eq!(summary.postcondition().len(), 1);
    }

    #[test]
    fn subsumption() {
        let wide = finalized(&[Interval::range(0, 2)], Interval::Top);
        let narrow = finalized(&[Interval::range(0, 1)], Interval::Top);
        assert!(wide.subsumes_summary(&narrow));
        assert!(!narrow.subsumes_summary(&wide));

        let pending = Summary::new("callee", narrow.precondition().clone());
        assert!(!pending.subsumes_summary(&narrow));
        assert!(!Summary::conservative("other").subsumes_summary(&narrow));
    }

    #[test]
    fn apply_summary() {
        let s = AccessPath::static_location("s");
        let t = AccessPath::static_location("t");
        let x = AccessPath::local("x");
        let mut caller = AbstractMemory::new();
        caller.write_store_strong(s.clone(), Interval::constant(1));
        caller.write_store_strong(t.clone(), Interval::constant(2));
        caller.write_store_strong(x.clone(), Interval::constant(3));

        let mut summary = Summary::new("callee", AbstractMemory::new());
        let mut exit = AbstractMemory::new();
        exit.write_store_strong(s.clone(), Interval::constant(5));
        exit.set_return_value(Interval::constant(0));
        summary.finalize_summary(&exit, LocationEffect::store(s.clone()));

        let after = summary.apply_summary(&caller);
        assert_eq!(after.read_store(&s), Interval::range(1, 5));
        assert_eq!(after.read_store(&t), Interval::constant(2));
        assert_eq!(after.read_store(&x), Interval::constant(3));
        assert_eq!(after.return_value(), Interval::Top);

        let after = Summary::conservative("callee").apply_summary(&caller);
        assert_eq!(after.read_store(&s), Interval::Top);
        assert_eq!(after.read_store(&x), Interval::constant(3));

        let mut diverges = Summary::new("callee", AbstractMemory::new());
        diverges.finalize_summary(&AbstractMemory::bottom(), LocationEffect::Empty);
        assert!(diverges.apply_summary(&caller).is_bottom());
    }

    #[test]
    fn early_summary() {
        let pending = |upper: i64| {
            let mut precondition = AbstractMemory::new();
            precondition.write_store_strong(AccessPath::parameter(0), Interval::range(0, upper));
            Summary::new("callee", precondition)
        };

        let disabled = AnalysisOptions::default();
        assert!(SummaryFactory::new(&disabled)
            .try_create_early_summary(&pending(1))
            .is_none());

        let enabled = AnalysisOptionsBuilder::new().early_summaries(true).build();
        let factory = SummaryFactory::new(&enabled);
        let early = factory.try_create_early_summary(&pending(1)).unwrap();
        assert_eq!(early.return_value(), Interval::Top);
        assert_eq!(early.effect(), &LocationEffect::Any);
        assert!(factory.try_create_early_summary(&pending(2)).is_none());
        assert!(factory
            .try_create_early_summary(&Summary::new("callee", AbstractMemory::new()))
            .is_none());
    }

    #[test]
    fn cache_reuses_and_keeps_first() {
        let cache = SummaryCache::new();
        assert!(cache.is_empty());

        let wide = Arc::new(finalized(&[Interval::range(0, 2)], Interval::constant(1)));
        let pending = Summary::new(
            "callee",
            finalized(&[Interval::range(0, 1)], Interval::Top)
                .precondition()
                .clone(),
        );
        assert!(cache.find(&pending).is_none());

        cache.insert(wide.clone());
        assert_eq!(cache.find(&pending), Some(wide.clone()));

        let duplicate = Arc::new(finalized(&[Interval::range(0, 2)], Interval::constant(2)));
        assert_eq!(cache.insert(duplicate), wide);
        assert_eq!(cache.len("callee"), 1);
        assert_eq!(cache.len("other"), 0);
    }

    #[test]
    fn concurrent_inserts() {
        use rayon::prelude::*;

        let cache = SummaryCache::new();
        (0..32i64).into_par_iter().for_each(|upper| {
            let summary = finalized(&[Interval::range(0, upper % 4)], Interval::Top);
            cache.insert(Arc::new(summary));
        });
        assert_eq!(cache.len("callee"), 4);
    }
}
