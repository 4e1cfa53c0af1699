//! Backedge detection, longest-path layering, dummy insertion.
//!
//! The DFS prefers graph sources as roots so user-chosen entry points end
//! up at the top of the drawing; edges closing onto the gray stack are
//! marked backedges, and the rest forms the DAG everything downstream
//! works on.

use super::collapse::{WorkEdge, WorkNode};

/// A node in the layered view: a work node or an inserted dummy.
#[derive(Debug, Clone)]
pub(super) struct LNode {
    pub id: String,
    pub file: String,
    pub layer: usize,
    /// Index into the work-node list, `None` for dummies.
    pub work: Option<usize>,
}

/// One original edge's path through the layered view.
#[derive(Debug, Clone)]
pub(super) struct Chain {
    /// Index into the work-edge list.
    pub edge: usize,
    /// L-node indices from source to target, through any dummies. Backedges
    /// keep the bare `[source, target]` pair.
    pub nodes: Vec<usize>,
}

#[derive(Debug)]
pub(super) struct LayeredGraph {
    pub nodes: Vec<LNode>,
    pub chains: Vec<Chain>,
    pub layer_count: usize,
}

/// Iterative DFS marking edges into gray (on-stack) nodes as backedges.
/// Roots: source-marked nodes first, then everything else in index order.
pub(super) fn mark_backedges(nodes: &[WorkNode], edges: &mut [WorkEdge]) {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut out: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (edge_index, edge) in edges.iter().enumerate() {
        out[edge.from].push(edge_index);
    }

    let mut color = vec![Color::White; nodes.len()];
    let mut roots: Vec<usize> = (0..nodes.len()).filter(|&n| nodes[n].is_source).collect();
    roots.extend((0..nodes.len()).filter(|&n| !nodes[n].is_source));

    for root in roots {
        if color[root] != Color::White {
            continue;
        }
        // stack of (node, next out-edge position)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        color[root] = Color::Gray;
        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            if cursor < out[node].len() {
                frame.1 += 1;
                let edge_index = out[node][cursor];
                let next = edges[edge_index].to;
                match color[next] {
                    Color::Gray => edges[edge_index].is_backedge = true,
                    Color::White => {
                        color[next] = Color::Gray;
                        stack.push((next, 0));
                    }
                    Color::Black => {}
                }
            } else {
                color[node] = Color::Black;
                stack.pop();
            }
        }
    }
}

/// Kahn longest-path layering over the non-backedges: every node sits one
/// past its deepest predecessor, roots at layer zero.
pub(super) fn assign_layers(nodes: &[WorkNode], edges: &[WorkEdge]) -> Vec<usize> {
    let mut indegree = vec![0usize; nodes.len()];
    let mut out: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for edge in edges.iter().filter(|e| !e.is_backedge) {
        indegree[edge.to] += 1;
        out[edge.from].push(edge.to);
    }

    let mut layer = vec![0usize; nodes.len()];
    let mut queue: std::collections::VecDeque<usize> = (0..nodes.len())
        .filter(|&n| indegree[n] == 0)
        .collect();

    while let Some(node) = queue.pop_front() {
        for &next in &out[node] {
            layer[next] = layer[next].max(layer[node] + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    layer
}

/// Replace every multi-layer non-backedge with a chain through one dummy per
/// intermediate layer. Dummies inherit the file of the edge's source so the
/// cluster bands stay coherent.
pub(super) fn insert_dummies(
    nodes: &[WorkNode],
    edges: &[WorkEdge],
    layer_of: &[usize],
) -> LayeredGraph {
    let mut lnodes: Vec<LNode> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| LNode {
            id: node.id.clone(),
            file: node.file.clone(),
            layer: layer_of[index],
            work: Some(index),
        })
        .collect();

    let mut chains = Vec::with_capacity(edges.len());
    for (edge_index, edge) in edges.iter().enumerate() {
        if edge.is_backedge {
            chains.push(Chain {
                edge: edge_index,
                nodes: vec![edge.from, edge.to],
            });
            continue;
        }
        let (from_layer, to_layer) = (layer_of[edge.from], layer_of[edge.to]);
        let mut path = vec![edge.from];
        for intermediate in (from_layer + 1)..to_layer {
            lnodes.push(LNode {
                id: format!("__dummy:{edge_index}:{intermediate}"),
                file: nodes[edge.from].file.clone(),
                layer: intermediate,
                work: None,
            });
            path.push(lnodes.len() - 1);
        }
        path.push(edge.to);
        chains.push(Chain {
            edge: edge_index,
            nodes: path,
        });
    }

    let layer_count = lnodes.iter().map(|n| n.layer + 1).max().unwrap_or(0);
    LayeredGraph {
        nodes: lnodes,
        chains,
        layer_count,
    }
}
