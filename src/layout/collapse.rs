//! Collapse preprocessing: fold every node of a collapsed file into one
//! synthetic proxy and remap the edges.
//!
//! Self-loops that appear on a collapsed file (any edge whose endpoints both
//! fold into the same proxy) are dropped, and remapped duplicates with the
//! same endpoints and kind collapse to one edge.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use crate::render::GraphPayload;
use crate::types::EdgeKind;

use super::COLLAPSED_PREFIX;

/// A node surviving collapse preprocessing.
#[derive(Debug, Clone)]
pub(super) struct WorkNode {
    pub id: String,
    pub label: String,
    pub file: String,
    pub is_proxy: bool,
    pub folded: usize,
    pub is_source: bool,
}

/// An edge over work-node indices.
#[derive(Debug, Clone)]
pub(super) struct WorkEdge {
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
    pub is_backedge: bool,
}

pub(super) fn collapse(
    payload: &GraphPayload,
    collapsed: &BTreeSet<String>,
) -> (Vec<WorkNode>, Vec<WorkEdge>) {
    let mut nodes: Vec<WorkNode> = Vec::new();
    let mut by_original_id: HashMap<&str, usize> = HashMap::new();
    let mut proxy_of_file: HashMap<&str, usize> = HashMap::new();

    for node in &payload.nodes {
        if collapsed.contains(&node.file_path) {
            let index = *proxy_of_file.entry(node.file_path.as_str()).or_insert_with(|| {
                nodes.push(WorkNode {
                    id: format!("{COLLAPSED_PREFIX}{}", node.file_path),
                    label: String::new(), // filled below, once the count is known
                    file: node.file_path.clone(),
                    is_proxy: true,
                    folded: 0,
                    is_source: false,
                });
                nodes.len() - 1
            });
            nodes[index].folded += 1;
            nodes[index].is_source |= node.is_source;
            by_original_id.insert(node.id.as_str(), index);
        } else {
            nodes.push(WorkNode {
                id: node.id.clone(),
                label: node.qualified_name.clone(),
                file: node.file_path.clone(),
                is_proxy: false,
                folded: 0,
                is_source: node.is_source,
            });
            by_original_id.insert(node.id.as_str(), nodes.len() - 1);
        }
    }

    for node in &mut nodes {
        if node.is_proxy {
            let stem = Path::new(&node.file)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| node.file.clone());
            node.label = format!("{stem} ({})", node.folded);
        }
    }

    let mut seen: HashSet<(usize, usize, EdgeKind)> = HashSet::new();
    let mut edges: Vec<WorkEdge> = Vec::new();
    for edge in &payload.edges {
        let (Some(&from), Some(&to)) = (
            by_original_id.get(edge.from.as_str()),
            by_original_id.get(edge.to.as_str()),
        ) else {
            continue;
        };
        if from == to {
            continue; // folded self-loop
        }
        if seen.insert((from, to, edge.kind)) {
            edges.push(WorkEdge {
                from,
                to,
                kind: edge.kind,
                is_backedge: false,
            });
        }
    }

    (nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{PayloadEdge, PayloadNode};

    fn node(id: &str, file: &str, name: &str) -> PayloadNode {
        PayloadNode {
            id: id.to_string(),
            file_path: file.to_string(),
            qualified_name: name.to_string(),
            line: 1,
            is_instrumented: false,
            is_source: false,
            is_target: false,
            description: None,
            signature: None,
            source_snippet: None,
            is_external: None,
        }
    }

    fn edge(from: &str, to: &str, kind: EdgeKind) -> PayloadEdge {
        PayloadEdge {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            call_line: 1,
        }
    }

    #[test]
    fn folds_nodes_and_remaps_edges() {
        let payload = GraphPayload {
            nodes: vec![
                node("a::main", "a.ts", "main"),
                node("b::x", "b.ts", "x"),
                node("b::y", "b.ts", "y"),
                node("c::z", "c.ts", "z"),
            ],
            edges: vec![
                edge("a::main", "b::x", EdgeKind::Direct),
                edge("b::x", "b::y", EdgeKind::Direct), // becomes a folded self-loop
                edge("b::y", "c::z", EdgeKind::Direct),
            ],
            ..Default::default()
        };
        let collapsed = BTreeSet::from(["b.ts".to_string()]);
        let (nodes, edges) = collapse(&payload, &collapsed);

        assert_eq!(nodes.len(), 3);
        let proxy = nodes.iter().find(|n| n.is_proxy).unwrap();
        assert_eq!(proxy.id, "__collapsed:b.ts");
        assert_eq!(proxy.folded, 2);
        assert_eq!(proxy.label, "b.ts (2)");

        // a -> proxy, proxy -> c; the in-file edge vanished
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn duplicate_remapped_edges_dropped() {
        let payload = GraphPayload {
            nodes: vec![
                node("a::main", "a.ts", "main"),
                node("b::x", "b.ts", "x"),
                node("b::y", "b.ts", "y"),
            ],
            edges: vec![
                edge("a::main", "b::x", EdgeKind::Direct),
                edge("a::main", "b::y", EdgeKind::Direct),
            ],
            ..Default::default()
        };
        let collapsed = BTreeSet::from(["b.ts".to_string()]);
        let (_, edges) = collapse(&payload, &collapsed);
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn no_collapse_is_identity_shaped() {
        let payload = GraphPayload {
            nodes: vec![node("a::main", "a.ts", "main"), node("b::x", "b.ts", "x")],
            edges: vec![edge("a::main", "b::x", EdgeKind::Direct)],
            ..Default::default()
        };
        let (nodes, edges) = collapse(&payload, &BTreeSet::new());
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| !n.is_proxy));
        assert_eq!(edges.len(), 1);
    }
}
