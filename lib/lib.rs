//! Absint: inter-procedural abstract interpretation over a control-flow-graph IL.
//!
//! Absint computes sound, conservative approximations of the integer values
//! and memory effects of a `Program`, in order to drive optimizations such as
//! bounds-check elimination, constant folding and branch pruning.
//!
//! # Layout
//!
//! * `il` - The host representation the engine reads: expressions, operations,
//! blocks, control-flow graphs, functions and programs.
//! * `graph` - A generic directed graph, with the depth-first orders and loop
//! headers the fixed point engine needs.
//! * `analysis::ai` - The abstract domains: intervals, access paths, abstract
//! memory, location effects, and the interpreter which gives IL operations
//! their abstract semantics.
//! * `analysis` - The fixed point engine, procedure summaries, and the
//! `Analyzer` which drives intra- and inter-procedural analysis.
//!
//! # Example
//!
//! ```
//! use absint::analysis::{Analyzer, AnalysisOptions};
//! use absint::il;
//!
//! # fn example() -> Result<(), absint::Error> {
//! let mut cfg = il::ControlFlowGraph::new();
//! let entry = {
//!     let block = cfg.new_block()?;
//!     block.assign(il::scalar("x"), il::expr_const(7));
//!     block.ret(Some(il::expr_scalar("x")));
//!     block.index()
//! };
//! cfg.set_entry(entry)?;
//!
//! let mut program = il::Program::new();
//! program.add_function(il::Function::new("seven", Vec::new(), cfg));
//!
//! let analyzer = Analyzer::new(&program, AnalysisOptions::default());
//! let analysis = analyzer.analyze_interprocedural("seven");
//! let summary = analysis.result().summary().unwrap();
//! assert_eq!(summary.return_value().get_constant(), Some(7));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod analysis;
mod error;
pub mod graph;
pub mod il;

#[cfg(test)]
mod tests;

pub use error::Error;
