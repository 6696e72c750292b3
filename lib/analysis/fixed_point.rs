//! A forward, block-level fixed point engine over abstract domains.
//!
//! The engine keeps one entry state per block. A pending block is popped
//! from the worklist, its instructions are applied in order to produce its
//! exit state, and that state flows along each out edge into the entry state
//! of the edge's tail. A tail whose entry state grows is pending again.
//!
//! Loop headers, the targets of retreating edges of a depth-first search,
//! widen instead of join once they have been visited `widening_delay` times.
//! After the ascending phase stabilizes, one descending pass recomputes every
//! entry from its predecessors and meets it with the ascending result,
//! recovering bounds lost to widening, and records the state before every
//! instruction.
//!
//! When `max_iterations` blocks have been visited without stabilizing, the
//! pending blocks and every block reachable from them are forced to top, and
//! the result is marked unstable. It is still sound, but only just.

use crate::analysis::ai::domain::AbstractDomain;
use crate::analysis::options::{AnalysisOptions, Cancellation, Traversal};
use crate::il;
use crate::Error;
use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A trait which implements a forward, flow-sensitive analysis to a
/// fixed point.
pub trait FixedPointAnalysis<State: AbstractDomain> {
    /// Given the state before an instruction, compute the state after it.
    fn trans(
        &self,
        location: il::ProgramPoint,
        instruction: &il::Instruction,
        state: State,
    ) -> Result<State, Error>;

    /// Given the exit state of an edge's head, compute the state flowing to
    /// its tail.
    fn trans_edge(&self, edge: &il::Edge, state: State) -> Result<State, Error>;
}

/// The states computed by a fixed point analysis.
#[derive(Clone, Debug)]
pub struct FixedPointResult<State> {
    entries: BTreeMap<usize, State>,
    states: BTreeMap<il::ProgramPoint, State>,
    exits: BTreeMap<usize, State>,
    iterations: usize,
    stable: bool,
}

impl<State> FixedPointResult<State> {
    /// The state on entry to a block. Blocks never reached have none.
    pub fn entry(&self, block: usize) -> Option<&State> {
        self.entries.get(&block)
    }

    /// The state immediately before the instruction at `point`.
    pub fn state(&self, point: il::ProgramPoint) -> Option<&State> {
        self.states.get(&point)
    }

    /// The state after the last instruction of a block.
    pub fn exit(&self, block: usize) -> Option<&State> {
        self.exits.get(&block)
    }

    pub fn entries(&self) -> &BTreeMap<usize, State> {
        &self.entries
    }

    pub fn states(&self) -> &BTreeMap<il::ProgramPoint, State> {
        &self.states
    }

    pub fn exits(&self) -> &BTreeMap<usize, State> {
        &self.exits
    }

    /// The number of block visits the ascending phase took.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// False if the iteration budget ran out before a fixed point was reached.
    pub fn stable(&self) -> bool {
        self.stable
    }
}

/// Pending blocks.
enum Worklist {
    // Ordered by (reverse post order rank, block index)
    Priority(BTreeSet<(usize, usize)>),
    Fifo(VecDeque<usize>, FxHashSet<usize>),
}

impl Worklist {
    fn new(traversal: Traversal) -> Worklist {
        match traversal {
            Traversal::WeakTopological => Worklist::Priority(BTreeSet::new()),
            Traversal::Fifo => Worklist::Fifo(VecDeque::new(), FxHashSet::default()),
        }
    }

    fn push(&mut self, block: usize, rank: usize) {
        match self {
            Worklist::Priority(set) => {
                set.insert((rank, block));
            }
            Worklist::Fifo(queue, queued) => {
                if queued.insert(block) {
                    queue.push_back(block);
                }
            }
        }
    }

    fn pop(&mut self) -> Option<usize> {
        match self {
            Worklist::Priority(set) => {
                let first = *set.iter().next()?;
                set.remove(&first);
                Some(first.1)
            }
            Worklist::Fifo(queue, queued) => {
                let block = queue.pop_front()?;
                queued.remove(&block);
                Some(block)
            }
        }
    }

    fn blocks(&self) -> Vec<usize> {
        match self {
            Worklist::Priority(set) => set.iter().map(|&(_, block)| block).collect(),
            Worklist::Fifo(queue, _) => queue.iter().cloned().collect(),
        }
    }
}

fn block_exit<Analysis, State>(
    analysis: &Analysis,
    block: &il::Block,
    mut state: State,
    mut record: Option<&mut BTreeMap<il::ProgramPoint, State>>,
) -> Result<State, Error>
where
    Analysis: FixedPointAnalysis<State>,
    State: AbstractDomain,
{
    for instruction in block.instructions() {
        let location = il::ProgramPoint::new(block.index(), instruction.index());
        if let Some(states) = record.as_mut() {
            states.insert(location, state.clone());
        }
        state = analysis.trans(location, instruction, state)?;
    }
    Ok(state)
}

/// Run `analysis` over `function` to a fixed point, starting from
/// `entry_state` at the entry block.
pub fn fixed_point_forward<Analysis, State>(
    analysis: &Analysis,
    function: &il::Function,
    entry_state: State,
    options: &AnalysisOptions,
    cancellation: &Cancellation,
) -> Result<FixedPointResult<State>, Error>
where
    Analysis: FixedPointAnalysis<State>,
    State: AbstractDomain,
{
    let control_flow_graph = function.control_flow_graph();
    let entry = control_flow_graph
        .entry()
        .ok_or_else(|| Error::Analysis(format!("{} has no entry block", function.name())))?;

    let order = control_flow_graph
        .graph()
        .compute_reverse_post_order(entry)?;
    let rank: FxHashMap<usize, usize> = order
        .iter()
        .enumerate()
        .map(|(rank, &block)| (block, rank))
        .collect();
    let rank_of = |block: usize| rank.get(&block).cloned().unwrap_or(usize::MAX);
    let loop_headers = control_flow_graph.loop_headers()?;

    let mut entries: BTreeMap<usize, State> = BTreeMap::new();
    let mut exits: BTreeMap<usize, State> = BTreeMap::new();
    let mut visits: FxHashMap<usize, usize> = FxHashMap::default();
    let mut worklist = Worklist::new(options.traversal());
    let mut iterations = 0;
    let mut stable = true;

    entries.insert(entry, entry_state.clone());
    worklist.push(entry, 0);

    while let Some(index) = worklist.pop() {
        cancellation.check(options.deadline())?;

        if iterations >= options.max_iterations() {
            worklist.push(index, rank_of(index));
            stable = false;
            break;
        }
        iterations += 1;
        *visits.entry(index).or_insert(0) += 1;

        let block = control_flow_graph.block(index)?;
        let state = block_exit(analysis, block, entries[&index].clone(), None)?;
        trace!(
            "{}: visited block 0x{:X}, iteration {}",
            function.name(),
            index,
            iterations
        );

        for edge in control_flow_graph.edges_out(index)? {
            let tail = edge.tail();
            let out = analysis.trans_edge(edge, state.clone())?;
            if out.is_bottom() {
                continue;
            }
            let updated = match entries.get(&tail) {
                None => Some(out),
                Some(old) => {
                    let widen = loop_headers.contains(&tail)
                        && visits.get(&tail).cloned().unwrap_or(0) >= options.widening_delay();
                    let new = if widen { old.widen(&out) } else { old.join(&out) };
                    if new.leq(old) {
                        None
                    } else {
                        Some(new)
                    }
                }
            };
            if let Some(new) = updated {
                entries.insert(tail, new);
                worklist.push(tail, rank_of(tail));
            }
        }

        exits.insert(index, state);
    }

    if !stable {
        let mut unstable: FxHashSet<usize> = FxHashSet::default();
        for index in worklist.blocks() {
            unstable.extend(control_flow_graph.graph().reachable_vertices(index)?);
        }
        debug!(
            "{}: iteration budget exhausted, forcing {} blocks to top",
            function.name(),
            unstable.len()
        );
        for index in unstable {
            entries.insert(index, State::top());
        }
    }

    // Descending pass, which also records per-instruction states.
    let mut states = BTreeMap::new();
    for &index in &order {
        let ascending = match entries.get(&index) {
            Some(state) => state.clone(),
            None => continue,
        };
        let state = if stable {
            cancellation.check(options.deadline())?;
            let mut incoming = if index == entry {
                Some(entry_state.clone())
            } else {
                None
            };
            for edge in control_flow_graph.edges_in(index)? {
                if let Some(exit) = exits.get(&edge.head()) {
                    let out = analysis.trans_edge(edge, exit.clone())?;
                    incoming = Some(match incoming {
                        Some(incoming) => incoming.join(&out),
                        None => out,
                    });
                }
            }
            match incoming {
                Some(incoming) => ascending.meet(&incoming),
                None => ascending,
            }
        } else {
            ascending
        };

        let block = control_flow_graph.block(index)?;
        let exit = block_exit(analysis, block, state.clone(), Some(&mut states))?;
        entries.insert(index, state);
        exits.insert(index, exit);
    }

    Ok(FixedPointResult {
        entries,
        states,
        exits,
        iterations,
        stable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ai::interval::Interval;
    use crate::analysis::options::AnalysisOptionsBuilder;
    use crate::il::*;

    /// Tracks the value of the scalar `i` alone.
    struct Counter;

    impl Counter {
        fn eval(expression: &Expression, i: Interval) -> Interval {
            match expression {
                Expression::Scalar(_) => i,
                Expression::Constant(c) => Interval::constant(*c),
                Expression::Add(lhs, rhs) => Counter::eval(lhs, i).add(&Counter::eval(rhs, i)),
                Expression::Cmplts(lhs, rhs) => {
                    Counter::eval(lhs, i).cmplts(&Counter::eval(rhs, i))
                }
                _ => Interval::Top,
            }
        }
    }

    impl FixedPointAnalysis<Interval> for Counter {
        fn trans(
            &self,
            _: ProgramPoint,
            instruction: &Instruction,
            state: Interval,
        ) -> Result<Interval, Error> {
            Ok(match instruction.operation() {
                Operation::Assign { src, .. } if !state.is_bottom() => Counter::eval(src, state),
                _ => state,
            })
        }

        fn trans_edge(&self, edge: &Edge, state: Interval) -> Result<Interval, Error> {
            Ok(match edge.condition() {
                Some(Expression::Cmplts(_, rhs)) => match rhs.get_constant() {
                    Some(c) => state.meet(&Interval::at_most(c - 1)),
                    None => state,
                },
                Some(condition) => match condition.negated() {
                    Some(Expression::Cmplts(_, rhs)) => match rhs.get_constant() {
                        Some(c) => state.meet(&Interval::at_least(c)),
                        None => state,
                    },
                    _ => state,
                },
                None => state,
            })
        }
    }

    /// i = 0; while i < bound { i = i + 1 }
    fn counting_loop(bound: i64) -> (Function, usize, usize) {
        let mut cfg = ControlFlowGraph::new();
        let head = {
            let block = cfg.new_block().unwrap();
            block.assign(scalar("i"), expr_const(0));
            block.index()
        };
        let header = cfg.new_block().unwrap().index();
        let body = {
            let block = cfg.new_block().unwrap();
            block.assign(
                scalar("i"),
                Expression::add(expr_scalar("i"), expr_const(1)),
            );
            block.index()
        };
        let exit = {
            let block = cfg.new_block().unwrap();
            block.ret(None);
            block.index()
        };
        cfg.set_entry(head).unwrap();
        cfg.unconditional_edge(head, header).unwrap();
        cfg.conditional_branch(
            header,
            Expression::cmplts(expr_scalar("i"), expr_const(bound)),
            body,
            exit,
        )
        .unwrap();
        cfg.unconditional_edge(body, header).unwrap();
        (Function::new("loop", Vec::new(), cfg), body, exit)
    }

    #[test]
    fn loop_converges_with_widening() {
        let (function, body, exit) = counting_loop(5);
        for traversal in [Traversal::WeakTopological, Traversal::Fifo] {
            let options = AnalysisOptionsBuilder::new()
                .widening_delay(1)
                .traversal(traversal)
                .build();
            let result = fixed_point_forward(
                &Counter,
                &function,
                Interval::Top,
                &options,
                &Cancellation::new(),
            )
            .unwrap();

            assert!(result.stable());
            assert_eq!(result.entry(body), Some(&Interval::range(0, 4)));
            assert_eq!(result.entry(exit), Some(&Interval::constant(5)));
            assert_eq!(
                result.state(ProgramPoint::new(exit, 0)),
                Some(&Interval::constant(5))
            );
        }
    }

    #[test]
    fn unbounded_loop_terminates() {
        let (function, body, _) = counting_loop(i64::MAX);
        let result = fixed_point_forward(
            &Counter,
            &function,
            Interval::Top,
            &AnalysisOptions::default(),
            &Cancellation::new(),
        )
        .unwrap();
        assert!(result.stable());
        assert_eq!(result.entry(body), Some(&Interval::range(0, i64::MAX - 1)));
    }

    /// A loop entered at both `a` and `b`, so neither dominates the other.
    #[test]
    fn irreducible_loop_is_widened() {
        let mut cfg = ControlFlowGraph::new();
        let head = {
            let block = cfg.new_block().unwrap();
            block.assign(scalar("i"), expr_const(0));
            block.index()
        };
        let a = {
            let block = cfg.new_block().unwrap();
            block.assign(scalar("i"), Expression::add(expr_scalar("i"), expr_const(1)));
            block.index()
        };
        let b = {
            let block = cfg.new_block().unwrap();
            block.assign(scalar("i"), Expression::add(expr_scalar("i"), expr_const(1)));
            block.index()
        };
        let exit = {
            let block = cfg.new_block().unwrap();
            block.ret(None);
            block.index()
        };
        cfg.set_entry(head).unwrap();
        cfg.conditional_branch(head, expr_scalar("c"), a, b).unwrap();
        cfg.unconditional_edge(a, b).unwrap();
        cfg.conditional_branch(b, expr_scalar("d"), a, exit).unwrap();
        let function = Function::new("irreducible", Vec::new(), cfg);

        assert_eq!(
            function.control_flow_graph().loop_headers().unwrap(),
            vec![a].into_iter().collect()
        );

        let result = fixed_point_forward(
            &Counter,
            &function,
            Interval::Top,
            &AnalysisOptions::default(),
            &Cancellation::new(),
        )
        .unwrap();
        assert!(result.stable());
        assert!(result.iterations() < 20);
        assert_eq!(result.entry(a), Some(&Interval::at_least(0)));
        assert_eq!(result.entry(exit), Some(&Interval::at_least(1)));
    }

    #[test]
    fn budget_exhaustion_forces_top() {
        let (function, body, exit) = counting_loop(100);
        let options = AnalysisOptionsBuilder::new()
            .max_iterations(3)
            .widening_delay(1000)
            .build();
        let result = fixed_point_forward(
            &Counter,
            &function,
            Interval::Top,
            &options,
            &Cancellation::new(),
        )
        .unwrap();
        assert!(!result.stable());
        assert_eq!(result.iterations(), 3);
        assert_eq!(result.entry(body), Some(&Interval::Top));
        assert_eq!(result.entry(exit), Some(&Interval::Top));
    }

    #[test]
    fn cancelled() {
        let (function, _, _) = counting_loop(5);
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let result = fixed_point_forward(
            &Counter,
            &function,
            Interval::Top,
            &AnalysisOptions::default(),
            &cancellation,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
