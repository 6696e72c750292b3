//! An interpreter over the abstract memory domain.
//!
//! `Interpreter` implements `FixedPointAnalysis` for `AbstractMemory`. Scalars
//! are local variable paths, so one map holds locals, fields, array elements
//! and statics. Calls are delegated to a `CallResolver`, which hands back the
//! summary to apply.

use crate::analysis::ai::access_path::{AccessPath, IndexKey, MemoryAccess, LENGTH_FIELD};
use crate::analysis::ai::domain::AbstractDomain;
use crate::analysis::ai::effect::LocationEffect;
use crate::analysis::ai::interval::{Interval, IntervalValue};
use crate::analysis::ai::memory::AbstractMemory;
use crate::analysis::fixed_point::FixedPointAnalysis;
use crate::analysis::summary::{CallSite, Summary};
use crate::il;
use crate::Error;
use std::cell::RefCell;
use std::sync::Arc;

/// Supplies the summary for a call.
pub trait CallResolver {
    /// Resolve the call at `call_site`, made in `state` with the given
    /// argument values.
    fn resolve_call(
        &self,
        call_site: &CallSite,
        state: &AbstractMemory,
        arguments: &[Interval],
    ) -> Result<Arc<Summary>, Error>;
}

/// Evaluate an expression in the given state.
pub fn eval(state: &AbstractMemory, expression: &il::Expression) -> Interval {
    match expression {
        il::Expression::Scalar(scalar) => state.read_store(&AccessPath::from(scalar)),
        il::Expression::Constant(value) => {
            if state.is_bottom() {
                Interval::Bottom
            } else {
                Interval::constant(*value)
            }
        }
        il::Expression::Add(lhs, rhs) => eval(state, lhs).add(&eval(state, rhs)),
        il::Expression::Sub(lhs, rhs) => eval(state, lhs).sub(&eval(state, rhs)),
        il::Expression::Mul(lhs, rhs) => eval(state, lhs).mul(&eval(state, rhs)),
        il::Expression::Divs(lhs, rhs) => eval(state, lhs).divs(&eval(state, rhs)),
        il::Expression::Cmpeq(lhs, rhs) => eval(state, lhs).cmpeq(&eval(state, rhs)),
        il::Expression::Cmpneq(lhs, rhs) => eval(state, lhs).cmpneq(&eval(state, rhs)),
        il::Expression::Cmplts(lhs, rhs) => eval(state, lhs).cmplts(&eval(state, rhs)),
    }
}

/// The `IndexKey` of an index expression: its value when that is a single
/// constant, otherwise unknown.
pub fn index_key(state: &AbstractMemory, index: &il::Expression) -> IndexKey {
    match eval(state, index).get_constant() {
        Some(value) => IndexKey::Constant(value),
        None => IndexKey::Unknown,
    }
}

/// Values strictly below `upper`.
fn below(upper: IntervalValue) -> Interval {
    Interval::new(IntervalValue::NegInfinity, upper).sub(&Interval::constant(1))
}

/// Values strictly above `lower`.
fn above(lower: IntervalValue) -> Interval {
    Interval::new(lower, IntervalValue::PosInfinity).add(&Interval::constant(1))
}

/// Assign to a local variable. Anything reached through the variable's old
/// value is forgotten.
fn assign(state: &mut AbstractMemory, dst: &il::Scalar, value: Interval) {
    let path = AccessPath::from(dst);
    state.kill_rooted(&path);
    state.write_store_strong(path, value);
}

/// Store through a path. Paths with an unknown index name no single location,
/// so for those only the aliases are forgotten.
fn store(state: &mut AbstractMemory, path: AccessPath, value: Interval) {
    state.invalidate_aliases(&path);
    if !path.has_unknown_index() {
        state.write_store_strong(path, value);
    }
}

/// Meet the value of `expression` with `bound`. Scalars are narrowed in
/// place, and any expression with no value inside `bound` leaves the state
/// unreachable.
fn refine(state: &mut AbstractMemory, expression: &il::Expression, bound: Interval) {
    let value = eval(state, expression).meet(&bound);
    if value.is_bottom() {
        state.set_to_bottom();
    } else if let Some(scalar) = expression.get_scalar() {
        state.write_store_strong(AccessPath::from(scalar), value);
    }
}

/// Remove the single value `excluded` from `expression`, where that trims
/// an endpoint.
fn exclude(state: &mut AbstractMemory, expression: &il::Expression, excluded: Interval) {
    let excluded = match excluded.get_constant() {
        Some(excluded) => IntervalValue::Constant(excluded),
        None => return,
    };
    let value = eval(state, expression);
    if value.get_constant().is_some() && value.lower() == Some(excluded) {
        state.set_to_bottom();
    } else if value.lower() == Some(excluded) {
        refine(state, expression, above(excluded));
    } else if value.upper() == Some(excluded) {
        refine(state, expression, below(excluded));
    }
}

/// Narrow `state` to the executions where `condition` evaluates to `truth`.
pub fn assume(mut state: AbstractMemory, condition: &il::Expression, truth: bool) -> AbstractMemory {
    if state.is_bottom() {
        return state;
    }
    if let Some(negated) = condition.negated() {
        return assume(state, negated, !truth);
    }

    let value = eval(&state, condition);
    let feasible = if truth {
        !value.is_bottom() && value.get_constant() != Some(0)
    } else {
        value.contains(0)
    };
    if !feasible {
        state.set_to_bottom();
        return state;
    }

    match condition {
        il::Expression::Cmplts(lhs, rhs) => {
            let (lhs_value, rhs_value) = (eval(&state, lhs), eval(&state, rhs));
            match (lhs_value.bounds(), rhs_value.bounds()) {
                (Some((lhs_lower, lhs_upper)), Some((rhs_lower, rhs_upper))) => {
                    if truth {
                        refine(&mut state, lhs, below(rhs_upper));
                        refine(&mut state, rhs, above(lhs_lower));
                    } else {
                        refine(&mut state, lhs, Interval::new(rhs_lower, IntervalValue::PosInfinity));
                        refine(&mut state, rhs, Interval::new(IntervalValue::NegInfinity, lhs_upper));
                    }
                }
                _ => state.set_to_bottom(),
            }
        }
        il::Expression::Cmpeq(lhs, rhs) | il::Expression::Cmpneq(lhs, rhs) => {
            let equal = truth == matches!(condition, il::Expression::Cmpeq(..));
            let (lhs_value, rhs_value) = (eval(&state, lhs), eval(&state, rhs));
            if equal {
                refine(&mut state, lhs, rhs_value);
                refine(&mut state, rhs, lhs_value);
            } else {
                exclude(&mut state, lhs, rhs_value);
                exclude(&mut state, rhs, lhs_value);
            }
        }
        il::Expression::Scalar(_) => {
            if truth {
                exclude(&mut state, condition, Interval::constant(0));
            } else {
                refine(&mut state, condition, Interval::constant(0));
            }
        }
        _ => {}
    }
    state
}

/// The abstract semantics of the IL over `AbstractMemory`.
///
/// The interpreter also accumulates the `LocationEffect` of every store it
/// evaluates, and of every call it applies a summary for.
pub struct Interpreter<'i, R: CallResolver> {
    function: &'i il::Function,
    resolver: &'i R,
    max_tracked_paths: usize,
    effect: RefCell<LocationEffect>,
}

impl<'i, R: CallResolver> Interpreter<'i, R> {
    pub fn new(
        function: &'i il::Function,
        resolver: &'i R,
        max_tracked_paths: usize,
    ) -> Interpreter<'i, R> {
        Interpreter {
            function,
            resolver,
            max_tracked_paths,
            effect: RefCell::new(LocationEffect::Empty),
        }
    }

    pub fn function(&self) -> &il::Function {
        self.function
    }

    /// Everything the analyzed function may have stored to so far.
    pub fn effect(&self) -> LocationEffect {
        self.effect.borrow().clone()
    }

    fn record_effect(&self, effect: &LocationEffect) {
        let combined = self.effect.borrow().combine_effects(effect);
        *self.effect.borrow_mut() = combined;
    }

    fn access_path(
        &self,
        operation: &il::Operation,
        state: &AbstractMemory,
    ) -> Result<AccessPath, Error> {
        operation
            .access_path(|index| index_key(state, index))
            .ok_or_else(|| Error::Analysis(format!("{} does not access memory", operation)))
    }
}

impl<'i, R: CallResolver> FixedPointAnalysis<AbstractMemory> for Interpreter<'i, R> {
    fn trans(
        &self,
        location: il::ProgramPoint,
        instruction: &il::Instruction,
        mut state: AbstractMemory,
    ) -> Result<AbstractMemory, Error> {
        if state.is_bottom() {
            return Ok(state);
        }

        match instruction.operation() {
            il::Operation::Assign { dst, src } => {
                let value = eval(&state, src);
                assign(&mut state, dst, value);
            }
            il::Operation::LoadField { dst, .. }
            | il::Operation::LoadStatic { dst, .. }
            | il::Operation::LoadIndexed { dst, .. }
            | il::Operation::ArrayLength { dst, .. } => {
                let path = self.access_path(instruction.operation(), &state)?;
                let value = state.read_store(&path);
                assign(&mut state, dst, value);
            }
            il::Operation::StoreField { src, .. }
            | il::Operation::StoreStatic { src, .. }
            | il::Operation::StoreIndexed { src, .. } => {
                let path = self.access_path(instruction.operation(), &state)?;
                let value = eval(&state, src);
                self.record_effect(&LocationEffect::store(path.clone()));
                store(&mut state, path, value);
            }
            il::Operation::NewArray { dst, length } => {
                let length = eval(&state, length).meet(&Interval::at_least(0));
                assign(&mut state, dst, Interval::Top);
                state.write_store_strong(AccessPath::from(dst).append_field(LENGTH_FIELD), length);
            }
            il::Operation::BoundsCheck { array, index } => {
                let length = state.read_store(&AccessPath::from(array).append_field(LENGTH_FIELD));
                match length.upper() {
                    Some(upper) => {
                        refine(&mut state, index, Interval::at_least(0).meet(&below(upper)))
                    }
                    None => state.set_to_bottom(),
                }
            }
            il::Operation::Invoke {
                dst,
                target,
                arguments,
            } => {
                let arguments: Vec<Interval> = arguments
                    .iter()
                    .map(|argument| eval(&state, argument))
                    .collect();
                let call_site = CallSite::new(self.function.name(), location, target.as_str());
                let summary = self.resolver.resolve_call(&call_site, &state, &arguments)?;
                self.record_effect(summary.effect());
                state = summary.apply_summary(&state);
                if let Some(dst) = dst {
                    assign(&mut state, dst, summary.return_value());
                }
            }
            il::Operation::Return { src: Some(src) } => {
                let value = eval(&state, src);
                state.set_return_value(value);
            }
            il::Operation::Return { src: None } | il::Operation::Nop => {}
        }

        state.prune(self.max_tracked_paths);
        Ok(state)
    }

    fn trans_edge(&self, edge: &il::Edge, state: AbstractMemory) -> Result<AbstractMemory, Error> {
        Ok(match edge.condition() {
            Some(condition) => assume(state, condition, true),
            None => state,
        })
    }
}
