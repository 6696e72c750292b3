//! A `Function` names a `ControlFlowGraph` and its formal parameters.

use crate::il::*;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A method of the host program.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Function {
    name: String,
    parameters: Vec<Scalar>,
    control_flow_graph: ControlFlowGraph,
}

impl Function {
    /// Create a new `Function`
    ///
    /// # Parameters
    /// * `name` - The name the `Function` is invoked by.
    /// * `parameters` - The formal parameters, in call order.
    /// * `control_flow_graph` - The body. Must have an entry set.
    pub fn new<S: Into<String>>(
        name: S,
        parameters: Vec<Scalar>,
        control_flow_graph: ControlFlowGraph,
    ) -> Function {
        Function {
            name: name.into(),
            parameters,
            control_flow_graph,
        }
    }

    /// Get the name of this `Function`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the formal parameters of this `Function`.
    pub fn parameters(&self) -> &[Scalar] {
        &self.parameters
    }

    /// Get the `ControlFlowGraph` of this `Function`.
    pub fn control_flow_graph(&self) -> &ControlFlowGraph {
        &self.control_flow_graph
    }

    /// Get a `Block` from this `Function`
    pub fn block(&self, index: usize) -> Result<&Block, Error> {
        self.control_flow_graph.block(index)
    }

    /// Get the `Instruction` at a `ProgramPoint` of this `Function`
    pub fn instruction(&self, point: ProgramPoint) -> Result<&Instruction, Error> {
        self.block(point.block())?
            .instruction(point.instruction())
            .ok_or(Error::ProgramPointNotFound(
                point.block(),
                point.instruction(),
            ))
    }

    /// Get the name of every method this `Function` invokes.
    pub fn callees(&self) -> Vec<&str> {
        let mut callees: Vec<&str> = Vec::new();
        for block in self.control_flow_graph.blocks() {
            for instruction in block.instructions() {
                if let Operation::Invoke { ref target, .. } = *instruction.operation() {
                    if !callees.contains(&target.as_str()) {
                        callees.push(target);
                    }
                }
            }
        }
        callees
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "method {}({})",
            self.name,
            self.parameters
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<String>>()
                .join(", ")
        )?;
        write!(f, "{}", self.control_flow_graph)
    }
}
