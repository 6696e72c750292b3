//! Options which bound and tune an analysis.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::default;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The order the fixed point engine visits blocks in.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Traversal {
    /// Always visit the pending block earliest in reverse post order. Inner
    /// loops stabilize before their results flow past the loop.
    WeakTopological,
    /// Visit blocks in the order they became pending.
    Fifo,
}

impl default::Default for Traversal {
    fn default() -> Traversal {
        Traversal::WeakTopological
    }
}

/// Options that change the precision and cost of an analysis.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct AnalysisOptions {
    max_iterations: usize,
    max_total_iterations: usize,
    max_call_depth: usize,
    widening_delay: usize,
    traversal: Traversal,
    skip_list: BTreeSet<String>,
    early_summaries: bool,
    early_summary_bound: i64,
    max_tracked_paths: usize,
    #[serde(skip)]
    deadline: Option<Instant>,
}

impl AnalysisOptions {
    /// Create a new set of `AnalysisOptions` with the default settings.
    pub fn new() -> AnalysisOptions {
        AnalysisOptions::default()
    }

    /// Load options from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<AnalysisOptions, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// The most blocks one fixed point computation may visit before it gives
    /// up and forces its unstable blocks to top.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// The most blocks all fixed point computations of one `Analyzer` may
    /// visit. Once reached, new procedure analyses overflow.
    pub fn max_total_iterations(&self) -> usize {
        self.max_total_iterations
    }

    /// The deepest chain of nested procedure analyses.
    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// How many times a loop header is visited before its state is widened.
    pub fn widening_delay(&self) -> usize {
        self.widening_delay
    }

    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    /// Methods which are never analyzed.
    pub fn skip_list(&self) -> &BTreeSet<String> {
        &self.skip_list
    }

    pub fn is_skipped(&self, method: &str) -> bool {
        self.skip_list.contains(method)
    }

    /// Whether calls whose first argument is below `early_summary_bound` may
    /// be given a summary without analyzing the callee.
    pub fn early_summaries(&self) -> bool {
        self.early_summaries
    }

    pub fn early_summary_bound(&self) -> i64 {
        self.early_summary_bound
    }

    /// The most access paths an abstract memory keeps facts for.
    pub fn max_tracked_paths(&self) -> usize {
        self.max_tracked_paths
    }

    /// The time after which running analyses are cancelled.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }
}

impl default::Default for AnalysisOptions {
    fn default() -> AnalysisOptions {
        AnalysisOptions {
            max_iterations: 1000,
            max_total_iterations: 100_000,
            max_call_depth: 8,
            widening_delay: 2,
            traversal: Traversal::WeakTopological,
            skip_list: BTreeSet::new(),
            early_summaries: false,
            early_summary_bound: 2,
            max_tracked_paths: 512,
            deadline: None,
        }
    }
}

/// Create your options with the builder pattern.
///
/// For more details on the options, see `AnalysisOptions`
pub struct AnalysisOptionsBuilder {
    options: AnalysisOptions,
}

impl AnalysisOptionsBuilder {
    /// Create a new builder for analysis options.
    pub fn new() -> AnalysisOptionsBuilder {
        AnalysisOptionsBuilder {
            options: AnalysisOptions::default(),
        }
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> AnalysisOptionsBuilder {
        self.options.max_iterations = max_iterations;
        self
    }

    pub fn max_total_iterations(mut self, max_total_iterations: usize) -> AnalysisOptionsBuilder {
        self.options.max_total_iterations = max_total_iterations;
        self
    }

    pub fn max_call_depth(mut self, max_call_depth: usize) -> AnalysisOptionsBuilder {
        self.options.max_call_depth = max_call_depth;
        self
    }

    pub fn widening_delay(mut self, widening_delay: usize) -> AnalysisOptionsBuilder {
        self.options.widening_delay = widening_delay;
        self
    }

    pub fn traversal(mut self, traversal: Traversal) -> AnalysisOptionsBuilder {
        self.options.traversal = traversal;
        self
    }

    /// Add a method to the skip list.
    pub fn skip<S: Into<String>>(mut self, method: S) -> AnalysisOptionsBuilder {
        self.options.skip_list.insert(method.into());
        self
    }

    /// Enable early summaries. By default this is false.
    pub fn early_summaries(mut self, early_summaries: bool) -> AnalysisOptionsBuilder {
        self.options.early_summaries = early_summaries;
        self
    }

    pub fn early_summary_bound(mut self, early_summary_bound: i64) -> AnalysisOptionsBuilder {
        self.options.early_summary_bound = early_summary_bound;
        self
    }

    pub fn max_tracked_paths(mut self, max_tracked_paths: usize) -> AnalysisOptionsBuilder {
        self.options.max_tracked_paths = max_tracked_paths;
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> AnalysisOptionsBuilder {
        self.options.deadline = Some(deadline);
        self
    }

    /// Set the deadline `timeout` from now.
    pub fn timeout(self, timeout: Duration) -> AnalysisOptionsBuilder {
        self.deadline(Instant::now() + timeout)
    }

    pub fn build(self) -> AnalysisOptions {
        self.options
    }
}

impl default::Default for AnalysisOptionsBuilder {
    fn default() -> AnalysisOptionsBuilder {
        AnalysisOptionsBuilder::new()
    }
}

/// A token for cooperatively cancelling analyses from another thread.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation::default()
    }

    /// Request cancellation of every analysis watching this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Error::Cancelled` if cancellation was requested, or the
    /// deadline has passed.
    pub fn check(&self, deadline: Option<Instant>) -> Result<(), Error> {
        if self.is_cancelled() || deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
