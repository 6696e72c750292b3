//! Inter-procedural orchestration of the fixed point engine.
//!
//! An `Analyzer` analyzes the methods of an `il::Program`. Calls are resolved
//! through a shared `SummaryCache`. On a miss, the callee is analyzed under the
//! precondition of the call, which may in turn analyze its own callees. The
//! chain of methods being analyzed is an explicit `CallStack`, so re-entering a
//! method on the stack, or growing the stack past `max_call_depth`, stops with
//! a conservative summary instead of looping.
//!
//! Failures never escape a method. Every procedure analysis ends in an
//! `AnalysisOutcome`, and every outcome but `InSkipList` comes with a summary
//! sound to apply at call sites.

use crate::analysis::ai::{
    AbstractDomain, AbstractMemory, CallResolver, Interpreter, Interval,
};
use crate::analysis::fixed_point::{fixed_point_forward, FixedPointResult};
use crate::analysis::options::{AnalysisOptions, Cancellation};
use crate::analysis::statistics::{optimization_opportunities, Statistics};
use crate::analysis::summary::{CallSite, Summary, SummaryCache, SummaryFactory};
use crate::il;
use crate::Error;
use log::{debug, trace, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How the analysis of a procedure ended, least severe first.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum AnalysisOutcome {
    /// The fixed point was reached and every call was summarized.
    Ok,
    /// The method is not part of the program.
    UnknownMethod,
    /// The method is filtered by the skip list. No summary is produced.
    InSkipList,
    /// The method was already being analyzed further up the call stack.
    MutualRecursionCycle,
    /// The call depth, or an iteration budget, was exhausted.
    RecursionLimitOverflow,
    /// The analysis returned an error, or was cancelled.
    AnalysisFailed,
}

impl AnalysisOutcome {
    pub fn is_ok(&self) -> bool {
        *self == AnalysisOutcome::Ok
    }

    /// Returns true if a caller analyzed with this callee outcome is tainted
    /// by it.
    pub fn propagates(&self) -> bool {
        matches!(
            self,
            AnalysisOutcome::MutualRecursionCycle | AnalysisOutcome::RecursionLimitOverflow
        )
    }
}

impl fmt::Display for AnalysisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let outcome = match self {
            AnalysisOutcome::Ok => "ok",
            AnalysisOutcome::UnknownMethod => "unknown method",
            AnalysisOutcome::InSkipList => "in skip list",
            AnalysisOutcome::MutualRecursionCycle => "mutual recursion cycle",
            AnalysisOutcome::RecursionLimitOverflow => "recursion limit overflow",
            AnalysisOutcome::AnalysisFailed => "analysis failed",
        };
        write!(f, "{}", outcome)
    }
}

/// An outcome, and the summary produced alongside it.
#[derive(Clone, Debug)]
pub struct AnalysisResult {
    outcome: AnalysisOutcome,
    summary: Option<Arc<Summary>>,
}

impl AnalysisResult {
    pub fn new(outcome: AnalysisOutcome, summary: Option<Arc<Summary>>) -> AnalysisResult {
        AnalysisResult { outcome, summary }
    }

    fn conservative(outcome: AnalysisOutcome, name: &str) -> AnalysisResult {
        AnalysisResult::new(outcome, Some(Arc::new(Summary::conservative(name))))
    }

    pub fn outcome(&self) -> AnalysisOutcome {
        self.outcome
    }

    pub fn summary(&self) -> Option<&Arc<Summary>> {
        self.summary.as_ref()
    }
}

/// The result of analyzing one method, as handed to consumers.
#[derive(Clone, Debug)]
pub struct MethodAnalysis {
    name: String,
    result: AnalysisResult,
    states: Option<FixedPointResult<AbstractMemory>>,
}

impl MethodAnalysis {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn result(&self) -> &AnalysisResult {
        &self.result
    }

    pub fn outcome(&self) -> AnalysisOutcome {
        self.result.outcome()
    }

    /// The converged states, absent when the analysis short-circuited.
    pub fn states(&self) -> Option<&FixedPointResult<AbstractMemory>> {
        self.states.as_ref()
    }
}

/// The methods currently being analyzed, outermost first.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CallStack {
    frames: Vec<String>,
}

impl CallStack {
    pub fn new() -> CallStack {
        CallStack::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame == name)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// This stack with `name` pushed on top.
    pub fn push(&self, name: &str) -> CallStack {
        let mut frames = self.frames.clone();
        frames.push(name.to_string());
        CallStack { frames }
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }
}

/// Analyzes the methods of a program, sharing summaries between analyses.
///
/// An `Analyzer` is `Sync`. Methods may be analyzed from many threads at
/// once, and `analyze_program_parallel` does so with rayon.
pub struct Analyzer<'p> {
    program: &'p il::Program,
    options: AnalysisOptions,
    cache: SummaryCache,
    statistics: Statistics,
    cancellation: Cancellation,
    runs: Mutex<FxHashMap<String, usize>>,
    total_runs: AtomicUsize,
    total_iterations: AtomicUsize,
}

impl<'p> Analyzer<'p> {
    pub fn new(program: &'p il::Program, options: AnalysisOptions) -> Analyzer<'p> {
        Analyzer {
            program,
            options,
            cache: SummaryCache::new(),
            statistics: Statistics::new(),
            cancellation: Cancellation::new(),
            runs: Mutex::new(FxHashMap::default()),
            total_runs: AtomicUsize::new(0),
            total_iterations: AtomicUsize::new(0),
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn summary_cache(&self) -> &SummaryCache {
        &self.cache
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// A handle which cancels every analysis of this `Analyzer`.
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// The number of times the fixed point engine has run over `name`.
    pub fn fixpoint_runs(&self, name: &str) -> usize {
        let runs = match self.runs.lock() {
            Ok(runs) => runs,
            Err(poisoned) => poisoned.into_inner(),
        };
        runs.get(name).cloned().unwrap_or(0)
    }

    pub fn total_fixpoint_runs(&self) -> usize {
        self.total_runs.load(Ordering::Relaxed)
    }

    /// Block visits over every fixed point run so far.
    pub fn total_iterations(&self) -> usize {
        self.total_iterations.load(Ordering::Relaxed)
    }

    /// Analyze `name` alone. Calls use a cached summary when one applies,
    /// and the conservative summary otherwise.
    pub fn analyze_intraprocedural(&self, name: &str) -> MethodAnalysis {
        self.analyze_root(name, false)
    }

    /// Analyze `name`, summarizing its callees on demand.
    pub fn analyze_interprocedural(&self, name: &str) -> MethodAnalysis {
        self.analyze_root(name, true)
    }

    /// Analyze every method of the program, callees before callers where the
    /// call graph allows.
    pub fn analyze_program(&self) -> Result<Vec<MethodAnalysis>, Error> {
        let call_graph = self.program.call_graph()?;
        Ok(call_graph
            .bottom_up_order()?
            .into_iter()
            .map(|name| self.analyze_interprocedural(name))
            .collect())
    }

    /// Analyze every method of the program on the rayon thread pool. Results
    /// are ordered by method name.
    pub fn analyze_program_parallel(&self) -> Vec<MethodAnalysis> {
        self.program
            .functions()
            .par_iter()
            .map(|function| self.analyze_interprocedural(function.name()))
            .collect()
    }

    fn analyze_root(&self, name: &str, interprocedural: bool) -> MethodAnalysis {
        let (result, states) =
            self.analyze_procedure(name, AbstractMemory::new(), &CallStack::new(), interprocedural);

        if let (Some(states), Some(function)) = (states.as_ref(), self.program.function(name)) {
            match optimization_opportunities(function, states) {
                Ok(opportunities) => self.statistics.record(name, &opportunities),
                Err(error) => warn!("{}: could not collect statistics: {}", name, error),
            }
        }
        debug!("{}: {}", name, result.outcome());

        MethodAnalysis {
            name: name.to_string(),
            result,
            states,
        }
    }

    fn analyze_procedure(
        &self,
        name: &str,
        precondition: AbstractMemory,
        stack: &CallStack,
        interprocedural: bool,
    ) -> (AnalysisResult, Option<FixedPointResult<AbstractMemory>>) {
        if self.options.is_skipped(name) {
            return (AnalysisResult::new(AnalysisOutcome::InSkipList, None), None);
        }
        let function = match self.program.function(name) {
            Some(function) => function,
            None => {
                return (
                    AnalysisResult::conservative(AnalysisOutcome::UnknownMethod, name),
                    None,
                )
            }
        };
        if stack.contains(name) {
            debug!("{}: re-entered from {:?}", name, stack.frames());
            return (
                AnalysisResult::conservative(AnalysisOutcome::MutualRecursionCycle, name),
                None,
            );
        }
        if stack.depth() >= self.options.max_call_depth()
            || self.total_iterations() >= self.options.max_total_iterations()
        {
            debug!("{}: recursion limit reached at depth {}", name, stack.depth());
            return (
                AnalysisResult::conservative(AnalysisOutcome::RecursionLimitOverflow, name),
                None,
            );
        }

        match self.run_fixed_point(function, precondition, stack, interprocedural) {
            Ok((summary, states, outcome)) => {
                let summary = Arc::new(summary);
                if outcome.is_ok() {
                    self.cache.insert(summary.clone());
                }
                (AnalysisResult::new(outcome, Some(summary)), Some(states))
            }
            Err(error) => {
                warn!("{}: analysis failed: {}", name, error);
                (
                    AnalysisResult::conservative(AnalysisOutcome::AnalysisFailed, name),
                    None,
                )
            }
        }
    }

    fn run_fixed_point(
        &self,
        function: &il::Function,
        precondition: AbstractMemory,
        stack: &CallStack,
        interprocedural: bool,
    ) -> Result<(Summary, FixedPointResult<AbstractMemory>, AnalysisOutcome), Error> {
        let name = function.name();
        {
            let mut runs = match self.runs.lock() {
                Ok(runs) => runs,
                Err(poisoned) => poisoned.into_inner(),
            };
            *runs.entry(name.to_string()).or_insert(0) += 1;
        }
        self.total_runs.fetch_add(1, Ordering::Relaxed);

        let parameters: Vec<String> = function
            .parameters()
            .iter()
            .map(|parameter| parameter.name().to_string())
            .collect();
        let entry_state = precondition.rename_parameters(&parameters);

        let resolver = Resolver {
            analyzer: self,
            factory: SummaryFactory::new(&self.options),
            stack: stack.push(name),
            interprocedural,
            outcome: Cell::new(AnalysisOutcome::Ok),
        };
        let interpreter = Interpreter::new(function, &resolver, self.options.max_tracked_paths());
        let result = fixed_point_forward(
            &interpreter,
            function,
            entry_state,
            &self.options,
            &self.cancellation,
        )?;
        self.total_iterations
            .fetch_add(result.iterations(), Ordering::Relaxed);

        let mut exit = AbstractMemory::bottom();
        for block in function.control_flow_graph().blocks() {
            if !block.is_return() {
                continue;
            }
            if let Some(state) = result.exit(block.index()) {
                exit.join_with(state);
            }
        }

        let mut summary = Summary::new(name, precondition);
        summary.finalize_summary(&exit, interpreter.effect());

        let mut outcome = resolver.outcome.get();
        if !result.stable() {
            outcome = outcome.max(AnalysisOutcome::RecursionLimitOverflow);
        }
        trace!(
            "{}: {} iterations, summary {}",
            name,
            result.iterations(),
            summary
        );
        Ok((summary, result, outcome))
    }
}

/// Resolves the calls of one procedure analysis.
struct Resolver<'a, 'p> {
    analyzer: &'a Analyzer<'p>,
    factory: SummaryFactory<'a>,
    stack: CallStack,
    interprocedural: bool,
    // The most severe outcome propagated from a callee
    outcome: Cell<AnalysisOutcome>,
}

impl<'a, 'p> CallResolver for Resolver<'a, 'p> {
    fn resolve_call(
        &self,
        call_site: &CallSite,
        state: &AbstractMemory,
        arguments: &[Interval],
    ) -> Result<Arc<Summary>, Error> {
        let pending = self.factory.create_summary(call_site, state, arguments);

        if let Some(summary) = self.analyzer.cache.find(&pending) {
            trace!("{}: reusing summary {}", call_site, summary);
            return Ok(summary);
        }
        if let Some(summary) = self.factory.try_create_early_summary(&pending) {
            trace!("{}: early summary", call_site);
            return Ok(Arc::new(summary));
        }
        if !self.interprocedural {
            return Ok(Arc::new(Summary::conservative(call_site.target())));
        }

        let (result, _) = self.analyzer.analyze_procedure(
            call_site.target(),
            pending.precondition().clone(),
            &self.stack,
            true,
        );
        if result.outcome().propagates() {
            self.outcome.set(self.outcome.get().max(result.outcome()));
        }
        Ok(match result.summary() {
            Some(summary) => summary.clone(),
            None => Arc::new(Summary::conservative(call_site.target())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_severity() {
        assert!(AnalysisOutcome::Ok < AnalysisOutcome::UnknownMethod);
        assert!(AnalysisOutcome::MutualRecursionCycle < AnalysisOutcome::RecursionLimitOverflow);
        assert_eq!(
            AnalysisOutcome::Ok.max(AnalysisOutcome::AnalysisFailed),
            AnalysisOutcome::AnalysisFailed
        );
        assert!(AnalysisOutcome::MutualRecursionCycle.propagates());
        assert!(!AnalysisOutcome::UnknownMethod.propagates());
        assert!(!AnalysisOutcome::InSkipList.propagates());
    }

    #[test]
    fn call_stack() {
        let stack = CallStack::new().push("main").push("f");
        assert_eq!(stack.depth(), 2);
        assert!(stack.contains("main"));
        assert!(!stack.contains("g"));
        assert_eq!(stack.frames(), &["main".to_string(), "f".to_string()]);
        assert_eq!(CallStack::new().depth(), 0);
    }
}
