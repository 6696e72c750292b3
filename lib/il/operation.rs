use crate::il::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An IL Operation updates some state.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Operation {
    /// Assign the value given in expression to the variable indicated.
    Assign { dst: Scalar, src: Expression },
    /// Load the field `field` of the object referenced by `object`.
    LoadField {
        dst: Scalar,
        object: Scalar,
        field: String,
    },
    /// Store `src` in the field `field` of the object referenced by `object`.
    StoreField {
        object: Scalar,
        field: String,
        src: Expression,
    },
    /// Load a static location.
    LoadStatic { dst: Scalar, name: String },
    /// Store `src` in a static location.
    StoreStatic { name: String, src: Expression },
    /// Load the element at `index` of the array referenced by `array`.
    LoadIndexed {
        dst: Scalar,
        array: Scalar,
        index: Expression,
    },
    /// Store `src` at `index` of the array referenced by `array`.
    StoreIndexed {
        array: Scalar,
        index: Expression,
        src: Expression,
    },
    /// Allocate a new array of `length` elements, and place its reference in `dst`.
    NewArray { dst: Scalar, length: Expression },
    /// Place the length of the array referenced by `array` in `dst`.
    ArrayLength { dst: Scalar, array: Scalar },
    /// Trap unless `0 <= index < length(array)`.
    BoundsCheck { array: Scalar, index: Expression },
    /// Call the method named `target`.
    Invoke {
        dst: Option<Scalar>,
        target: String,
        arguments: Vec<Expression>,
    },
    /// Return from the method.
    Return { src: Option<Expression> },
    /// No operation.
    Nop,
}

impl Operation {
    pub fn is_return(&self) -> bool {
        matches!(self, Operation::Return { .. })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Assign { dst, src } => write!(f, "{} = {}", dst, src),
            Operation::LoadField { dst, object, field } => {
                write!(f, "{} = {}.{}", dst, object, field)
            }
            Operation::StoreField { object, field, src } => {
                write!(f, "{}.{} = {}", object, field, src)
            }
            Operation::LoadStatic { dst, name } => write!(f, "{} = static {}", dst, name),
            Operation::StoreStatic { name, src } => write!(f, "static {} = {}", name, src),
            Operation::LoadIndexed { dst, array, index } => {
                write!(f, "{} = {}[{}]", dst, array, index)
            }
            Operation::StoreIndexed { array, index, src } => {
                write!(f, "{}[{}] = {}", array, index, src)
            }
            Operation::NewArray { dst, length } => write!(f, "{} = new [{}]", dst, length),
            Operation::ArrayLength { dst, array } => write!(f, "{} = len {}", dst, array),
            Operation::BoundsCheck { array, index } => {
                write!(f, "check {}[{}]", array, index)
            }
            Operation::Invoke {
                dst,
                target,
                arguments,
            } => {
                if let Some(dst) = dst {
                    write!(f, "{} = ", dst)?;
                }
                write!(
                    f,
                    "{}({})",
                    target,
                    arguments
                        .iter()
                        .map(|argument| argument.to_string())
                        .collect::<Vec<String>>()
                        .join(", ")
                )
            }
            Operation::Return { src: Some(src) } => write!(f, "return {}", src),
            Operation::Return { src: None } => write!(f, "return"),
            Operation::Nop => write!(f, "nop"),
        }
    }
}
