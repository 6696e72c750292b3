//! Abstract Interpretation Analyses
//!
//! This module implements the abstract domains and the abstract semantics of
//! the IL.
//!
//! * The `domain` module implements the lattice trait every abstract domain
//! implements.
//! * The `interval` module is the numeric domain, intervals over signed 64-bit
//! integers.
//! * The `access_path` module names memory locations symbolically, and holds
//! the `MemoryAccess` seam which maps IL operations to those names.
//! * The `memory` module maps access paths to intervals.
//! * The `effect` module tracks which locations a computation may store to.
//! * The `interpreter` module gives every IL operation and edge its transfer
//! function over the memory domain.

pub mod access_path;
pub mod domain;
pub mod effect;
pub mod interpreter;
pub mod interval;
pub mod memory;

pub use self::access_path::{AccessPath, Base, Element, IndexKey, MemoryAccess, LENGTH_FIELD};
pub use self::domain::AbstractDomain;
pub use self::effect::LocationEffect;
pub use self::interpreter::{eval, CallResolver, Interpreter};
pub use self::interval::{Interval, IntervalValue};
pub use self::memory::AbstractMemory;
