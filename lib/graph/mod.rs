//! Implements a directed graph.
//!
//! The graph backs both the intra-procedural `ControlFlowGraph` and the
//! program-wide call graph.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{btree_set, BTreeMap, BTreeSet};

use crate::Error;

pub trait Vertex: Clone + Sync {
    // The index of this vertex.
    fn index(&self) -> usize;
}

pub trait Edge: Clone + Sync {
    /// The index of the head vertex.
    fn head(&self) -> usize;
    /// The index of the tail vertex.
    fn tail(&self) -> usize;
}

/// An empty edge for creating structures when data is not required
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NullEdge {
    head: usize,
    tail: usize,
}

impl NullEdge {
    pub fn new(head: usize, tail: usize) -> NullEdge {
        NullEdge { head, tail }
    }
}

impl Edge for NullEdge {
    fn head(&self) -> usize {
        self.head
    }
    fn tail(&self) -> usize {
        self.tail
    }
}

/// A directed graph.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize, Default)]
pub struct Graph<V: Vertex, E: Edge> {
    vertices: BTreeMap<usize, V>,
    edges: BTreeMap<(usize, usize), E>,
    successors: BTreeMap<usize, BTreeSet<usize>>,
    predecessors: BTreeMap<usize, BTreeSet<usize>>,
}

impl<V, E> Graph<V, E>
where
    V: Vertex,
    E: Edge,
{
    pub fn new() -> Graph<V, E> {
        Graph {
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
            successors: BTreeMap::new(),
            predecessors: BTreeMap::new(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if the vertex with the given index exists in this graph
    pub fn has_vertex(&self, index: usize) -> bool {
        self.vertices.contains_key(&index)
    }

    /// Returns true if the edge with the given head and tail index exists in this graph
    pub fn has_edge(&self, head: usize, tail: usize) -> bool {
        self.edges.contains_key(&(head, tail))
    }

    /// Inserts a vertex into the graph.
    /// # Errors
    /// Error if the vertex already exists by index.
    pub fn insert_vertex(&mut self, v: V) -> Result<(), Error> {
        if self.vertices.contains_key(&v.index()) {
            return Err("duplicate vertex index".into());
        }
        self.successors.insert(v.index(), BTreeSet::new());
        self.predecessors.insert(v.index(), BTreeSet::new());
        self.vertices.insert(v.index(), v);
        Ok(())
    }

    /// Inserts an edge into the graph.
    /// # Errors
    /// Error if the edge already exists by indices, or either vertex is missing.
    pub fn insert_edge(&mut self, edge: E) -> Result<(), Error> {
        let (head, tail) = (edge.head(), edge.tail());
        if self.edges.contains_key(&(head, tail)) {
            return Err("duplicate edge".into());
        }
        if !self.vertices.contains_key(&head) {
            return Err(Error::GraphVertexNotFound(head));
        }
        if !self.vertices.contains_key(&tail) {
            return Err(Error::GraphVertexNotFound(tail));
        }

        self.edges.insert((head, tail), edge);
        if let Some(successors) = self.successors.get_mut(&head) {
            successors.insert(tail);
        }
        if let Some(predecessors) = self.predecessors.get_mut(&tail) {
            predecessors.insert(head);
        }

        Ok(())
    }

    /// Returns the indices of all immediate successors of a vertex from the graph.
    pub fn successor_indices(&self, index: usize) -> Result<Vec<usize>, Error> {
        self.successors
            .get(&index)
            .map(|successors| successors.iter().cloned().collect())
            .ok_or(Error::GraphVertexNotFound(index))
    }

    /// Returns the indices of all immediate predecessors of a vertex from the graph.
    pub fn predecessor_indices(&self, index: usize) -> Result<Vec<usize>, Error> {
        self.predecessors
            .get(&index)
            .map(|predecessors| predecessors.iter().cloned().collect())
            .ok_or(Error::GraphVertexNotFound(index))
    }

    /// Returns all vertices in the graph.
    pub fn vertices(&self) -> Vec<&V> {
        self.vertices.values().collect()
    }

    /// Fetches a vertex from the graph by index.
    pub fn vertex(&self, index: usize) -> Result<&V, Error> {
        self.vertices
            .get(&index)
            .ok_or(Error::GraphVertexNotFound(index))
    }

    // Fetches a mutable instance of a vertex.
    pub fn vertex_mut(&mut self, index: usize) -> Result<&mut V, Error> {
        self.vertices
            .get_mut(&index)
            .ok_or(Error::GraphVertexNotFound(index))
    }

    pub fn edge(&self, head: usize, tail: usize) -> Result<&E, Error> {
        self.edges
            .get(&(head, tail))
            .ok_or(Error::GraphEdgeNotFound(head, tail))
    }

    /// Get a reference to every `Edge` in the `Graph`.
    pub fn edges(&self) -> Vec<&E> {
        self.edges.values().collect()
    }

    /// Return all edges out for a vertex
    pub fn edges_out(&self, index: usize) -> Result<Vec<&E>, Error> {
        self.successors
            .get(&index)
            .map(|succs| {
                succs
                    .iter()
                    .filter_map(|succ| self.edges.get(&(index, *succ)))
                    .collect()
            })
            .ok_or(Error::GraphVertexNotFound(index))
    }

    /// Return all edges in for a vertex
    pub fn edges_in(&self, index: usize) -> Result<Vec<&E>, Error> {
        self.predecessors
            .get(&index)
            .map(|preds| {
                preds
                    .iter()
                    .filter_map(|pred| self.edges.get(&(*pred, index)))
                    .collect()
            })
            .ok_or(Error::GraphVertexNotFound(index))
    }

    /// Computes the set of vertices reachable from the given index.
    pub fn reachable_vertices(&self, index: usize) -> Result<FxHashSet<usize>, Error> {
        if !self.has_vertex(index) {
            return Err(Error::GraphVertexNotFound(index));
        }

        let mut reachable_vertices: FxHashSet<usize> = FxHashSet::default();
        let mut queue: Vec<usize> = vec![index];

        reachable_vertices.insert(index);

        while let Some(vertex) = queue.pop() {
            for &succ in &self.successors[&vertex] {
                if reachable_vertices.insert(succ) {
                    queue.push(succ)
                }
            }
        }

        Ok(reachable_vertices)
    }

    /// Depth-first search from `root`, without recursion.
    ///
    /// Returns the post order of every vertex reachable from `root`, and the
    /// retreating edges: edges whose tail is still on the search stack when
    /// the edge is followed. Successors are visited in index order.
    fn depth_first_search(
        &self,
        root: usize,
    ) -> Result<(Vec<usize>, FxHashSet<(usize, usize)>), Error> {
        if !self.has_vertex(root) {
            return Err(Error::GraphVertexNotFound(root));
        }

        let mut visited: FxHashSet<usize> = FxHashSet::default();
        let mut on_stack: FxHashSet<usize> = FxHashSet::default();
        let mut order: Vec<usize> = Vec::new();
        let mut retreating: FxHashSet<(usize, usize)> = FxHashSet::default();
        let mut stack: Vec<(usize, btree_set::Iter<usize>)> = Vec::new();

        visited.insert(root);
        on_stack.insert(root);
        stack.push((root, self.successors[&root].iter()));

        while let Some((vertex, successors)) = stack.last_mut() {
            let vertex = *vertex;
            match successors.next() {
                Some(&successor) => {
                    if on_stack.contains(&successor) {
                        retreating.insert((vertex, successor));
                    } else if visited.insert(successor) {
                        on_stack.insert(successor);
                        stack.push((successor, self.successors[&successor].iter()));
                    }
                }
                None => {
                    stack.pop();
                    on_stack.remove(&vertex);
                    order.push(vertex);
                }
            }
        }

        Ok((order, retreating))
    }

    /// Compute the post order of all vertices reachable from `root`
    pub fn compute_post_order(&self, root: usize) -> Result<Vec<usize>, Error> {
        Ok(self.depth_first_search(root)?.0)
    }

    /// Compute the reverse post order of all vertices reachable from `root`.
    ///
    /// In reverse post order every vertex comes before its successors, back
    /// edges excepted, so loop headers precede their bodies.
    pub fn compute_reverse_post_order(&self, root: usize) -> Result<Vec<usize>, Error> {
        let mut order = self.compute_post_order(root)?;
        order.reverse();
        Ok(order)
    }

    /// Computes the retreating edges of a depth-first search from `root`.
    ///
    /// Every cycle reachable from `root` holds at least one retreating edge,
    /// whether or not the cycle has a single entry. In a reducible graph
    /// these are exactly the back edges.
    pub fn compute_retreating_edges(
        &self,
        root: usize,
    ) -> Result<FxHashSet<(usize, usize)>, Error> {
        Ok(self.depth_first_search(root)?.1)
    }

    /// Computes the loop headers reachable from `root`, the tails of all
    /// retreating edges.
    pub fn compute_loop_headers(&self, root: usize) -> Result<BTreeSet<usize>, Error> {
        Ok(self
            .compute_retreating_edges(root)?
            .into_iter()
            .map(|(_, header)| header)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Vertex for usize {
        fn index(&self) -> usize {
            *self
        }
    }

    impl Edge for (usize, usize) {
        fn head(&self) -> usize {
            self.0
        }

        fn tail(&self) -> usize {
            self.1
        }
    }

    /**
     *           +--> 3 +-+
     *          /          \
     *         | +--> 4 +--+
     *         |/          |
     *         +           v
     * 1 +---> 2 <-------+ 5
     *         +
     *         |
     *         v
     *         6
     */
    fn create_test_graph() -> Graph<usize, (usize, usize)> {
        let mut graph = Graph::new();

        for vertex in 1..=6 {
            graph.insert_vertex(vertex).unwrap();
        }

        graph.insert_edge((1, 2)).unwrap();
        graph.insert_edge((2, 3)).unwrap();
        graph.insert_edge((2, 4)).unwrap();
        graph.insert_edge((2, 6)).unwrap();
        graph.insert_edge((3, 5)).unwrap();
        graph.insert_edge((4, 5)).unwrap();
        graph.insert_edge((5, 2)).unwrap();

        graph
    }

    #[test]
    fn test_successors_and_predecessors() {
        let graph = create_test_graph();

        assert_eq!(graph.successor_indices(2).unwrap(), vec![3, 4, 6]);
        assert_eq!(graph.predecessor_indices(2).unwrap(), vec![1, 5]);
        assert!(graph.successor_indices(7).is_err());
    }

    #[test]
    fn test_duplicate_edge_is_rejected() {
        let mut graph = create_test_graph();
        assert!(graph.insert_edge((1, 2)).is_err());
        assert!(graph.insert_edge((1, 9)).is_err());
    }

    #[test]
    fn test_post_order() {
        let graph = create_test_graph();

        assert_eq!(graph.compute_post_order(1).unwrap(), vec![5, 3, 4, 6, 2, 1]);
        assert_eq!(
            graph.compute_reverse_post_order(1).unwrap(),
            vec![1, 2, 6, 4, 3, 5]
        );
    }

    #[test]
    fn test_loop_headers() {
        let graph = create_test_graph();

        let retreating = graph.compute_retreating_edges(1).unwrap();
        assert_eq!(retreating, vec![(5, 2)].into_iter().collect());
        assert_eq!(
            graph.compute_loop_headers(1).unwrap(),
            vec![2].into_iter().collect()
        );
    }

    /**
     * 1 +--> 2 <--> 3 +--> 4
     * +             ^
     * +-------------+
     */
    #[test]
    fn test_irreducible_loop_headers() {
        let mut graph: Graph<usize, (usize, usize)> = Graph::new();
        for vertex in 1..=4 {
            graph.insert_vertex(vertex).unwrap();
        }
        graph.insert_edge((1, 2)).unwrap();
        graph.insert_edge((1, 3)).unwrap();
        graph.insert_edge((2, 3)).unwrap();
        graph.insert_edge((3, 2)).unwrap();
        graph.insert_edge((3, 4)).unwrap();

        assert_eq!(
            graph.compute_retreating_edges(1).unwrap(),
            vec![(3, 2)].into_iter().collect()
        );
        assert_eq!(
            graph.compute_loop_headers(1).unwrap(),
            vec![2].into_iter().collect()
        );
    }

    #[test]
    fn test_deep_chain() {
        let mut graph: Graph<usize, (usize, usize)> = Graph::new();
        for vertex in 0..100_000 {
            graph.insert_vertex(vertex).unwrap();
            if vertex > 0 {
                graph.insert_edge((vertex - 1, vertex)).unwrap();
            }
        }

        let order = graph.compute_reverse_post_order(0).unwrap();
        assert_eq!(order, (0..100_000).collect::<Vec<usize>>());
        assert!(graph.compute_loop_headers(0).unwrap().is_empty());
    }

    #[test]
    fn test_reachable_vertices() {
        let mut graph = create_test_graph();
        graph.insert_vertex(7).unwrap();
        graph.insert_edge((7, 1)).unwrap();

        let reachable = graph.reachable_vertices(2).unwrap();
        assert_eq!(reachable, vec![2, 3, 4, 5, 6].into_iter().collect());
    }
}
