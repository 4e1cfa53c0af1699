//! Call graph storage.
//!
//! The graph is resolver-agnostic - it just stores nodes and typed edges.
//! The builder populates it; the slicer and renderers consume it.
//!
//! Uses petgraph: nodes live in an integer-indexed arena and both adjacency
//! directions come for free, with a `FunctionId -> NodeIndex` side map for
//! identity lookups. Edges keep insertion order, and parallel edges between
//! the same pair are collapsed to the first-seen one.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{EdgeKind, FunctionId};

/// A function in the graph. Created when first reached by the traversal and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub id: FunctionId,
    /// First source line of the declaration; zero for external nodes.
    pub line: u32,
    /// Last source line, when known.
    pub end_line: Option<u32>,
    pub is_instrumented: bool,
    /// Marks synthetic nodes for unresolved third-party imports.
    pub is_external: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
}

impl FunctionNode {
    pub fn new(id: FunctionId, line: u32) -> Self {
        Self {
            id,
            line,
            end_line: None,
            is_instrumented: false,
            is_external: false,
            description: None,
            signature: None,
        }
    }

    /// A leaf node for an unresolved import: `<external>::specifier` file
    /// component, first line zero.
    pub fn external(file: impl Into<Arc<str>>, qualified: impl Into<Arc<str>>) -> Self {
        Self {
            id: FunctionId::new(file, qualified),
            line: 0,
            end_line: None,
            is_instrumented: false,
            is_external: true,
            description: None,
            signature: None,
        }
    }
}

/// A resolved call: kind plus the source line of the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub kind: EdgeKind,
    pub call_line: u32,
}

impl CallEdge {
    pub fn new(kind: EdgeKind, call_line: u32) -> Self {
        Self { kind, call_line }
    }
}

/// The call graph: functions as nodes, resolved calls as edges.
#[derive(Debug, Default)]
pub struct CallGraph {
    graph: DiGraph<FunctionNode, CallEdge>,
    index: HashMap<FunctionId, NodeIndex>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its index. Idempotent: the first write wins and
    /// later adds of the same id return the existing index.
    pub fn add_node(&mut self, node: FunctionNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    /// Add an edge between existing nodes. Parallel edges are suppressed:
    /// the first-seen kind and line stick. Self-edges are dropped.
    pub fn add_edge(&mut self, caller: NodeIndex, callee: NodeIndex, edge: CallEdge) {
        if caller == callee {
            return;
        }
        if self.graph.find_edge(caller, callee).is_none() {
            self.graph.add_edge(caller, callee, edge);
        }
    }

    pub fn get_index(&self, id: &FunctionId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&FunctionNode> {
        self.graph.node_weight(idx)
    }

    pub fn contains(&self, id: &FunctionId) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FunctionNode> {
        self.graph.node_weights()
    }

    /// Edges in insertion order as (caller, callee, edge) triples.
    pub fn edges(&self) -> impl Iterator<Item = (&FunctionNode, &FunctionNode, &CallEdge)> {
        self.graph.edge_references().map(move |e| {
            let from = self.graph.node_weight(e.source()).expect("edge source");
            let to = self.graph.node_weight(e.target()).expect("edge target");
            (from, to, e.weight())
        })
    }

    /// Outgoing neighbors of a node.
    pub fn callees(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
    }

    /// Incoming neighbors of a node.
    pub fn callers(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Merge another graph into this one: node union (first write wins),
    /// edges appended with the same pair deduplication.
    pub fn merge(&mut self, other: CallGraph) {
        for node in other.graph.node_weights() {
            self.add_node(node.clone());
        }
        for edge in other.graph.edge_references() {
            let from = other.graph.node_weight(edge.source()).expect("edge source");
            let to = other.graph.node_weight(edge.target()).expect("edge target");
            let from_idx = self.index[&from.id];
            let to_idx = self.index[&to.id];
            self.add_edge(from_idx, to_idx, *edge.weight());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(file: &str, name: &str) -> FunctionNode {
        FunctionNode::new(FunctionId::new(file, name), 1)
    }

    #[test]
    fn add_node_idempotent() {
        let mut graph = CallGraph::new();
        let a1 = graph.add_node(node("a.ts", "main"));
        let a2 = graph.add_node(node("a.ts", "main"));
        assert_eq!(a1, a2);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn parallel_edges_collapse_to_first() {
        let mut graph = CallGraph::new();
        let a = graph.add_node(node("a.ts", "main"));
        let b = graph.add_node(node("a.ts", "helper"));
        graph.add_edge(a, b, CallEdge::new(EdgeKind::Direct, 3));
        graph.add_edge(a, b, CallEdge::new(EdgeKind::StaticMethod, 9));
        assert_eq!(graph.edge_count(), 1);
        let (_, _, edge) = graph.edges().next().unwrap();
        assert_eq!(edge.kind, EdgeKind::Direct);
        assert_eq!(edge.call_line, 3);
    }

    #[test]
    fn self_edges_dropped() {
        let mut graph = CallGraph::new();
        let a = graph.add_node(node("a.ts", "recurse"));
        graph.add_edge(a, a, CallEdge::new(EdgeKind::Direct, 2));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn merge_unions_nodes_and_dedups_edges() {
        let mut left = CallGraph::new();
        let a = left.add_node(node("a.ts", "main"));
        let b = left.add_node(node("b.ts", "helper"));
        left.add_edge(a, b, CallEdge::new(EdgeKind::Direct, 3));

        let mut right = CallGraph::new();
        let a2 = right.add_node(node("a.ts", "main"));
        let b2 = right.add_node(node("b.ts", "helper"));
        let c2 = right.add_node(node("c.ts", "transform"));
        right.add_edge(a2, b2, CallEdge::new(EdgeKind::Direct, 3));
        right.add_edge(b2, c2, CallEdge::new(EdgeKind::Direct, 7));

        left.merge(right);
        assert_eq!(left.node_count(), 3);
        assert_eq!(left.edge_count(), 2);
    }
}
