//! A `Program` holds every `Function` of the host, keyed by name.

use crate::graph::{self, Graph, NullEdge};
use crate::il::*;
use crate::Error;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A representation of a program by `il::Function`
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Program {
    functions: BTreeMap<String, Function>,
}

impl Program {
    /// Creates a new, empty `Program`.
    pub fn new() -> Program {
        Program {
            functions: BTreeMap::new(),
        }
    }

    /// Add a `Function` to this `Program`, replacing any `Function` with the same name.
    pub fn add_function(&mut self, function: Function) {
        self.functions.insert(function.name().to_string(), function);
    }

    /// Resolve a method by name. `None` means the callee is unknown to the host.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Get every `Function` in this `Program`, ordered by name.
    pub fn functions(&self) -> Vec<&Function> {
        self.functions.values().collect()
    }

    /// Build the call graph of this `Program`. Calls to unknown methods have no edge.
    pub fn call_graph(&self) -> Result<CallGraph, Error> {
        let names: Vec<String> = self.functions.keys().cloned().collect();
        let mut graph = Graph::new();
        for index in 0..names.len() {
            graph.insert_vertex(CallGraphNode { index })?;
        }
        for (head, name) in names.iter().enumerate() {
            for callee in self.functions[name].callees() {
                if let Ok(tail) = names.binary_search_by(|n| n.as_str().cmp(callee)) {
                    graph.insert_edge(NullEdge::new(head, tail))?;
                }
            }
        }
        Ok(CallGraph { names, graph })
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for function in self.functions.values() {
            writeln!(f, "{}", function)?;
        }
        Ok(())
    }
}

/// A vertex in the `CallGraph`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct CallGraphNode {
    index: usize,
}

impl graph::Vertex for CallGraphNode {
    fn index(&self) -> usize {
        self.index
    }
}

/// Caller to callee edges between the methods of a `Program`.
#[derive(Clone, Debug)]
pub struct CallGraph {
    names: Vec<String>,
    graph: Graph<CallGraphNode, NullEdge>,
}

impl CallGraph {
    /// The underlying graph. Vertex indices follow `CallGraph::name`.
    pub fn graph(&self) -> &Graph<CallGraphNode, NullEdge> {
        &self.graph
    }

    /// The method name of a vertex index.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|name| name.as_str())
    }

    /// The names of the methods called by `name`.
    pub fn callees(&self, name: &str) -> Result<Vec<&str>, Error> {
        let index = self
            .index(name)
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;
        Ok(self
            .graph
            .successor_indices(index)?
            .into_iter()
            .map(|index| self.names[index].as_str())
            .collect())
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    /// Every method, callees before their callers where the call graph allows
    /// it. Members of a cycle come out in depth-first post order.
    pub fn bottom_up_order(&self) -> Result<Vec<&str>, Error> {
        let mut visited: FxHashSet<usize> = FxHashSet::default();
        let mut order = Vec::new();
        for root in 0..self.names.len() {
            if visited.contains(&root) {
                continue;
            }
            for index in self.graph.compute_post_order(root)? {
                if visited.insert(index) {
                    order.push(self.names[index].as_str());
                }
            }
        }
        Ok(order)
    }
}
