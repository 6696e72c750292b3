//! Abstract interpretation of IL programs.
//!
//! `ai` holds the abstract domains and the interpreter. `fixed_point` runs an
//! analysis over one function. The summaries of `summary` and the `Analyzer`
//! tie fixed point runs together across calls.

pub mod ai;
mod analyzer;
pub mod fixed_point;
mod options;
mod statistics;
mod summary;

pub use self::analyzer::{
    AnalysisOutcome, AnalysisResult, Analyzer, CallStack, MethodAnalysis,
};
pub use self::fixed_point::{fixed_point_forward, FixedPointAnalysis, FixedPointResult};
pub use self::options::{AnalysisOptions, AnalysisOptionsBuilder, Cancellation, Traversal};
pub use self::statistics::{
    optimization_opportunities, Opportunity, OptimizationKind, Statistics, StatisticsSnapshot,
};
pub use self::summary::{CallSite, Summary, SummaryCache, SummaryFactory};
