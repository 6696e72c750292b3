//! A `Block` is a linear sequence of `Instruction`.
//!
//! A `Block` has an index, unique within its `ControlFlowGraph`. Instructions
//! are appended through the emitter methods below, which assign each
//! `Instruction` its position in the block as index.

use crate::graph;
use crate::il::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A basic block.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Block {
    /// The index of the block.
    index: usize,
    /// The instructions for this block.
    instructions: Vec<Instruction>,
}

impl Block {
    pub(crate) fn new(index: usize) -> Block {
        Block {
            index,
            instructions: Vec::new(),
        }
    }

    fn push(&mut self, operation: Operation) -> &mut Instruction {
        let index = self.instructions.len();
        self.instructions.push(Instruction::new(index, operation));
        &mut self.instructions[index]
    }

    /// Returns the index of this block
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns this block's instructions
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns an instruction by index
    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Returns true if this block ends in a `Return`
    pub fn is_return(&self) -> bool {
        self.instructions
            .last()
            .map(|instruction| instruction.operation().is_return())
            .unwrap_or(false)
    }

    /// Adds an assign operation to the end of this block.
    pub fn assign(&mut self, dst: Scalar, src: Expression) -> &mut Instruction {
        self.push(Operation::Assign { dst, src })
    }

    /// Adds a field load to the end of this block.
    pub fn load_field<S: Into<String>>(
        &mut self,
        dst: Scalar,
        object: Scalar,
        field: S,
    ) -> &mut Instruction {
        self.push(Operation::LoadField {
            dst,
            object,
            field: field.into(),
        })
    }

    /// Adds a field store to the end of this block.
    pub fn store_field<S: Into<String>>(
        &mut self,
        object: Scalar,
        field: S,
        src: Expression,
    ) -> &mut Instruction {
        self.push(Operation::StoreField {
            object,
            field: field.into(),
            src,
        })
    }

    /// Adds a static load to the end of this block.
    pub fn load_static<S: Into<String>>(&mut self, dst: Scalar, name: S) -> &mut Instruction {
        self.push(Operation::LoadStatic {
            dst,
            name: name.into(),
        })
    }

    /// Adds a static store to the end of this block.
    pub fn store_static<S: Into<String>>(&mut self, name: S, src: Expression) -> &mut Instruction {
        self.push(Operation::StoreStatic {
            name: name.into(),
            src,
        })
    }

    /// Adds an array element load to the end of this block.
    pub fn load_indexed(
        &mut self,
        dst: Scalar,
        array: Scalar,
        index: Expression,
    ) -> &mut Instruction {
        self.push(Operation::LoadIndexed { dst, array, index })
    }

    /// Adds an array element store to the end of this block.
    pub fn store_indexed(
        &mut self,
        array: Scalar,
        index: Expression,
        src: Expression,
    ) -> &mut Instruction {
        self.push(Operation::StoreIndexed { array, index, src })
    }

    /// Adds an array allocation to the end of this block.
    pub fn new_array(&mut self, dst: Scalar, length: Expression) -> &mut Instruction {
        self.push(Operation::NewArray { dst, length })
    }

    /// Adds an array length read to the end of this block.
    pub fn array_length(&mut self, dst: Scalar, array: Scalar) -> &mut Instruction {
        self.push(Operation::ArrayLength { dst, array })
    }

    /// Adds a bounds check to the end of this block.
    pub fn bounds_check(&mut self, array: Scalar, index: Expression) -> &mut Instruction {
        self.push(Operation::BoundsCheck { array, index })
    }

    /// Adds a call to the end of this block.
    pub fn invoke<S: Into<String>>(
        &mut self,
        dst: Option<Scalar>,
        target: S,
        arguments: Vec<Expression>,
    ) -> &mut Instruction {
        self.push(Operation::Invoke {
            dst,
            target: target.into(),
            arguments,
        })
    }

    /// Adds a return to the end of this block.
    pub fn ret(&mut self, src: Option<Expression>) -> &mut Instruction {
        self.push(Operation::Return { src })
    }

    /// Adds a nop to the end of this block.
    pub fn nop(&mut self) -> &mut Instruction {
        self.push(Operation::Nop)
    }
}

impl graph::Vertex for Block {
    fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "[ Block: 0x{:X} ]", self.index)?;
        for instruction in self.instructions() {
            writeln!(f, "{}", instruction)?;
        }
        Ok(())
    }
}
