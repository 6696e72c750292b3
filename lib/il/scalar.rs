use crate::il::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An IL variable.
///
/// Scalars hold either integer values or references to objects and arrays.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Scalar {
    name: String,
}

impl Scalar {
    pub fn new<S>(name: S) -> Scalar
    where
        S: Into<String>,
    {
        Scalar { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<Scalar> for Expression {
    fn from(scalar: Scalar) -> Expression {
        Expression::Scalar(scalar)
    }
}
