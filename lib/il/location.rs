//! A universal means of naming a position within a `Function`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The point immediately before an `Instruction` executes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ProgramPoint {
    block: usize,
    instruction: usize,
}

impl ProgramPoint {
    pub fn new(block: usize, instruction: usize) -> ProgramPoint {
        ProgramPoint { block, instruction }
    }

    /// The index of the `Block` holding this point.
    pub fn block(&self) -> usize {
        self.block
    }

    /// The index of the `Instruction` within its `Block`.
    pub fn instruction(&self) -> usize {
        self.instruction
    }
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:X}:{:02X}", self.block, self.instruction)
    }
}
