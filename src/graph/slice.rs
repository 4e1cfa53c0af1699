//! Slicing: the induced subgraph connecting sources to targets.
//!
//! Two breadth-first walks - forward from the sources, backward from the
//! targets - and the kept set is their intersection. Pure graph surgery:
//! no parsing, no resolution, a brand-new graph out.

use std::collections::{HashSet, VecDeque};

use petgraph::graph::NodeIndex;

use crate::types::FunctionId;

use super::callgraph::CallGraph;

/// Induce the subgraph over nodes that are forward-reachable from some
/// source and backward-reachable from some target. Ids absent from the
/// graph are ignored; an empty intersection yields an empty graph.
pub fn slice(graph: &CallGraph, sources: &[FunctionId], targets: &[FunctionId]) -> CallGraph {
    let source_starts: Vec<NodeIndex> = sources
        .iter()
        .filter_map(|id| graph.get_index(id))
        .collect();
    let target_starts: Vec<NodeIndex> = targets
        .iter()
        .filter_map(|id| graph.get_index(id))
        .collect();

    let forward = reach(graph, &source_starts, Reach::Forward);
    let backward = reach(graph, &target_starts, Reach::Backward);

    let kept: HashSet<NodeIndex> = forward.intersection(&backward).copied().collect();

    let mut sliced = CallGraph::new();
    for idx in graph.node_indices() {
        if kept.contains(&idx) {
            if let Some(node) = graph.node(idx) {
                sliced.add_node(node.clone());
            }
        }
    }
    for (from, to, edge) in graph.edges() {
        let (Some(from_idx), Some(to_idx)) = (graph.get_index(&from.id), graph.get_index(&to.id))
        else {
            continue;
        };
        if kept.contains(&from_idx) && kept.contains(&to_idx) {
            let new_from = sliced.get_index(&from.id).expect("kept node");
            let new_to = sliced.get_index(&to.id).expect("kept node");
            sliced.add_edge(new_from, new_to, *edge);
        }
    }
    sliced
}

enum Reach {
    Forward,
    Backward,
}

fn reach(graph: &CallGraph, starts: &[NodeIndex], direction: Reach) -> HashSet<NodeIndex> {
    let mut seen: HashSet<NodeIndex> = starts.iter().copied().collect();
    let mut queue: VecDeque<NodeIndex> = starts.iter().copied().collect();
    while let Some(idx) = queue.pop_front() {
        let neighbors: Vec<NodeIndex> = match direction {
            Reach::Forward => graph.callees(idx).collect(),
            Reach::Backward => graph.callers(idx).collect(),
        };
        for next in neighbors {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}
