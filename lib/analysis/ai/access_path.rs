//! Symbolic names for memory locations.
//!
//! An `AccessPath` is a base, a local variable, static location, formal
//! parameter slot or the return slot, followed by field and array element
//! selectors. Paths name locations, they never refer to physical memory, and
//! they are immutable: extending a path creates a new one.

use crate::il;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The field an array's length is tracked under.
pub const LENGTH_FIELD: &str = "length";

/// The root of an `AccessPath`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Base {
    /// A local variable of the method under analysis.
    Local(String),
    /// A static location, visible to every method.
    Static(String),
    /// The formal parameter at this position. Used by summary preconditions.
    Parameter(usize),
    /// The value a method returns.
    Return,
}

/// The abstract index of an array element.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum IndexKey {
    Constant(i64),
    Unknown,
}

/// A selector applied to the value of an `AccessPath`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Element {
    Field(String),
    ArrayAccess(IndexKey),
}

impl Element {
    fn has_unknown_index(&self) -> bool {
        matches!(self, Element::ArrayAccess(IndexKey::Unknown))
    }

    /// Whether two selectors may select the same location, given both are
    /// applied to the same object.
    fn may_overlap(&self, other: &Element) -> bool {
        match (self, other) {
            (Element::Field(lhs), Element::Field(rhs)) => lhs == rhs,
            (Element::ArrayAccess(IndexKey::Constant(lhs)), Element::ArrayAccess(IndexKey::Constant(rhs))) => {
                lhs == rhs
            }
            (Element::ArrayAccess(_), Element::ArrayAccess(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Element::Field(name) => write!(f, ".{}", name),
            Element::ArrayAccess(IndexKey::Constant(index)) => write!(f, "[{}]", index),
            Element::ArrayAccess(IndexKey::Unknown) => write!(f, "[?]"),
        }
    }
}

/// A symbolic memory location.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AccessPath {
    base: Base,
    elements: Vec<Element>,
}

impl AccessPath {
    pub fn new(base: Base) -> AccessPath {
        AccessPath {
            base,
            elements: Vec::new(),
        }
    }

    /// The path of a local variable.
    pub fn local<S: Into<String>>(name: S) -> AccessPath {
        AccessPath::new(Base::Local(name.into()))
    }

    /// The path of a static location.
    pub fn static_location<S: Into<String>>(name: S) -> AccessPath {
        AccessPath::new(Base::Static(name.into()))
    }

    /// The path of the formal parameter at `position`.
    pub fn parameter(position: usize) -> AccessPath {
        AccessPath::new(Base::Parameter(position))
    }

    /// The return slot.
    pub fn return_slot() -> AccessPath {
        AccessPath::new(Base::Return)
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Returns true if this path has no selectors.
    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns true if this path names a local variable, and nothing reachable
    /// from it.
    pub fn is_local_variable(&self) -> bool {
        self.is_root() && matches!(self.base, Base::Local(_))
    }

    pub fn is_static(&self) -> bool {
        matches!(self.base, Base::Static(_))
    }

    pub fn is_return_slot(&self) -> bool {
        self.is_root() && self.base == Base::Return
    }

    /// Returns true if any array selector of this path has an unknown index.
    pub fn has_unknown_index(&self) -> bool {
        self.elements.iter().any(|element| element.has_unknown_index())
    }

    /// The path `self.name`.
    pub fn append_field<S: Into<String>>(&self, name: S) -> AccessPath {
        self.append(Element::Field(name.into()))
    }

    /// The path `self[index_key]`.
    pub fn append_array_access(&self, index_key: IndexKey) -> AccessPath {
        self.append(Element::ArrayAccess(index_key))
    }

    fn append(&self, element: Element) -> AccessPath {
        let mut elements = Vec::with_capacity(self.elements.len() + 1);
        elements.extend_from_slice(&self.elements);
        elements.push(element);
        AccessPath {
            base: self.base.clone(),
            elements,
        }
    }

    /// This path with its base replaced.
    pub fn rebase(&self, base: Base) -> AccessPath {
        AccessPath {
            base,
            elements: self.elements.clone(),
        }
    }

    /// Returns true if both paths have the same base, and agree on every
    /// element up to, but not including, the last element of the shorter path.
    pub fn shares_prefix(&self, other: &AccessPath) -> bool {
        if self.base != other.base {
            return false;
        }
        let length = self.elements.len().min(other.elements.len());
        self.elements[..length.saturating_sub(1)] == other.elements[..length.saturating_sub(1)]
    }

    /// Returns true if a store through `self` may change the value read
    /// through `other`.
    ///
    /// Two distinct prefixes, whether on different local or parameter bases
    /// or on one base through different selectors, may reference the same
    /// object, so such paths alias when their last selectors may select the
    /// same location. Selectors applied to one prefix only collide through an
    /// unknown index. Static bases never alias anything but themselves.
    pub fn may_alias(&self, other: &AccessPath) -> bool {
        if self == other {
            return true;
        }
        if self.base != other.base && (self.is_static() || other.is_static()) {
            return false;
        }
        let (last, other_last) = match (self.elements.last(), other.elements.last()) {
            (Some(last), Some(other_last)) => (last, other_last),
            _ => return false,
        };
        if !last.may_overlap(other_last) {
            return false;
        }
        if self.base != other.base {
            return true;
        }
        if self.elements.len() != other.elements.len() {
            return false;
        }
        if self.shares_prefix(other) {
            return last.has_unknown_index() || other_last.has_unknown_index();
        }
        true
    }

    /// Returns true if a store through `self` may change the value read
    /// through `other`, either directly, or by replacing a reference `other`
    /// is reached through.
    pub fn may_affect(&self, other: &AccessPath) -> bool {
        self.may_alias(other)
            || (1..other.elements.len()).any(|length| {
                let prefix = AccessPath {
                    base: other.base.clone(),
                    elements: other.elements[..length].to_vec(),
                };
                self.may_alias(&prefix)
            })
    }
}

impl From<&il::Scalar> for AccessPath {
    fn from(scalar: &il::Scalar) -> AccessPath {
        AccessPath::local(scalar.name())
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.base {
            Base::Local(name) => write!(f, "{}", name)?,
            Base::Static(name) => write!(f, "static:{}", name)?,
            Base::Parameter(position) => write!(f, "param{}", position)?,
            Base::Return => write!(f, "<return>")?,
        }
        for element in &self.elements {
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}

/// Translates a memory operation to the `AccessPath` it reads or writes.
///
/// This is the seam between the host representation and the memory domain.
/// `index_key` abstracts an index expression to an `IndexKey`, and is only
/// called for indexed operations.
pub trait MemoryAccess {
    fn access_path<F>(&self, index_key: F) -> Option<AccessPath>
    where
        F: FnMut(&il::Expression) -> IndexKey;
}

impl MemoryAccess for il::Operation {
    fn access_path<F>(&self, mut index_key: F) -> Option<AccessPath>
    where
        F: FnMut(&il::Expression) -> IndexKey,
    {
        match self {
            il::Operation::LoadField { object, field, .. }
            | il::Operation::StoreField { object, field, .. } => {
                Some(AccessPath::from(object).append_field(field.as_str()))
            }
            il::Operation::LoadStatic { name, .. } | il::Operation::StoreStatic { name, .. } => {
                Some(AccessPath::static_location(name.as_str()))
            }
            il::Operation::LoadIndexed { array, index, .. }
            | il::Operation::StoreIndexed { array, index, .. } => {
                Some(AccessPath::from(array).append_array_access(index_key(index)))
            }
            il::Operation::ArrayLength { array, .. } => {
                Some(AccessPath::from(array).append_field(LENGTH_FIELD))
            }
            il::Operation::Assign { .. }
            | il::Operation::NewArray { .. }
            | il::Operation::BoundsCheck { .. }
            | il::Operation::Invoke { .. }
            | il::Operation::Return { .. }
            | il::Operation::Nop => None,
        }
    }
}
