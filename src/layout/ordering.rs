//! Within-layer ordering and cluster-order derivation.
//!
//! Four barycenter sweeps, alternating down and up, with a cluster-aware
//! sort key: (file cluster barycenter, file path, node barycenter). Leading
//! with the cluster barycenter keeps each file's nodes contiguous in a
//! layer while still reducing crossings between files.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::layering::LayeredGraph;

const SWEEPS: usize = 4;

/// Order every layer. Returns, per layer, the L-node indices in cross-axis
/// order.
pub(super) fn order_layers(
    layered: &LayeredGraph,
    previous_order: Option<&[String]>,
) -> Vec<Vec<usize>> {
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); layered.layer_count];
    for (index, node) in layered.nodes.iter().enumerate() {
        layers[node.layer].push(index);
    }

    // initial order: previous file position when given, file path otherwise
    let previous_position: HashMap<&str, usize> = previous_order
        .unwrap_or(&[])
        .iter()
        .enumerate()
        .map(|(position, file)| (file.as_str(), position))
        .collect();
    for layer in &mut layers {
        layer.sort_by(|&a, &b| {
            let node_a = &layered.nodes[a];
            let node_b = &layered.nodes[b];
            file_key(&node_a.file, &previous_position)
                .cmp(&file_key(&node_b.file, &previous_position))
                .then_with(|| node_a.id.cmp(&node_b.id))
        });
    }

    // adjacency between consecutive layers, from the unit segments of every
    // non-backedge chain
    let mut down: Vec<Vec<usize>> = vec![Vec::new(); layered.nodes.len()]; // predecessors
    let mut up: Vec<Vec<usize>> = vec![Vec::new(); layered.nodes.len()]; // successors
    for chain in &layered.chains {
        for pair in chain.nodes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if layered.nodes[b].layer == layered.nodes[a].layer + 1 {
                down[b].push(a);
                up[a].push(b);
            }
        }
    }

    for sweep in 0..SWEEPS {
        if sweep % 2 == 0 {
            for layer_index in 1..layers.len() {
                reorder(
                    &mut layers,
                    layer_index,
                    layer_index - 1,
                    &down,
                    layered,
                );
            }
        } else {
            for layer_index in (0..layers.len().saturating_sub(1)).rev() {
                reorder(&mut layers, layer_index, layer_index + 1, &up, layered);
            }
        }
    }

    layers
}

/// Reorder one layer against a fixed neighbor layer.
fn reorder(
    layers: &mut [Vec<usize>],
    target: usize,
    fixed: usize,
    neighbors: &[Vec<usize>],
    layered: &LayeredGraph,
) {
    let fixed_position: HashMap<usize, usize> = layers[fixed]
        .iter()
        .enumerate()
        .map(|(position, &node)| (node, position))
        .collect();

    // individual barycenters; nodes without neighbors keep their position
    let barycenters: HashMap<usize, f64> = layers[target]
        .iter()
        .enumerate()
        .map(|(position, &node)| {
            let adjacent = &neighbors[node];
            let value = if adjacent.is_empty() {
                position as f64
            } else {
                let sum: f64 = adjacent
                    .iter()
                    .filter_map(|n| fixed_position.get(n))
                    .map(|&p| p as f64)
                    .sum();
                let count = adjacent
                    .iter()
                    .filter(|n| fixed_position.contains_key(n))
                    .count();
                if count == 0 {
                    position as f64
                } else {
                    sum / count as f64
                }
            };
            (node, value)
        })
        .collect();

    // cluster barycenter: mean of the file's node barycenters in this layer
    let mut cluster_sum: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for &node in &layers[target] {
        let entry = cluster_sum
            .entry(layered.nodes[node].file.as_str())
            .or_insert((0.0, 0));
        entry.0 += barycenters[&node];
        entry.1 += 1;
    }
    let cluster_barycenter: HashMap<&str, f64> = cluster_sum
        .into_iter()
        .map(|(file, (sum, count))| (file, sum / count as f64))
        .collect();

    layers[target].sort_by(|&a, &b| {
        let file_a = layered.nodes[a].file.as_str();
        let file_b = layered.nodes[b].file.as_str();
        compare_f64(cluster_barycenter[file_a], cluster_barycenter[file_b])
            .then_with(|| file_a.cmp(file_b))
            .then_with(|| compare_f64(barycenters[&a], barycenters[&b]))
    });
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn file_key<'f>(
    file: &'f str,
    previous_position: &HashMap<&str, usize>,
) -> (usize, &'f str) {
    match previous_position.get(file) {
        Some(&position) => (position, ""),
        None => (usize::MAX, file),
    }
}

/// Derive the cluster order: first appearance while scanning layers in
/// order. With a previous ordering, retained files keep their relative
/// order and new files slot in right after their nearest retained
/// predecessor in the natural scan.
pub(super) fn derive_file_order(
    layered: &LayeredGraph,
    ordered: &[Vec<usize>],
    previous_order: Option<&[String]>,
) -> Vec<String> {
    let mut natural: Vec<String> = Vec::new();
    for layer in ordered {
        for &node in layer {
            let file = &layered.nodes[node].file;
            if !natural.contains(file) {
                natural.push(file.clone());
            }
        }
    }

    let Some(previous) = previous_order else {
        return natural;
    };

    let mut result: Vec<String> = previous
        .iter()
        .filter(|file| natural.contains(*file))
        .cloned()
        .collect();

    for (natural_index, file) in natural.iter().enumerate() {
        if result.contains(file) {
            continue;
        }
        // nearest preceding natural neighbor that survived
        let anchor = natural[..natural_index]
            .iter()
            .rev()
            .find_map(|candidate| result.iter().position(|r| r == candidate));
        match anchor {
            Some(position) => result.insert(position + 1, file.clone()),
            None => result.insert(0, file.clone()),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::collapse::{WorkEdge, WorkNode};
    use super::super::layering::{assign_layers, insert_dummies, mark_backedges};
    use crate::types::EdgeKind;

    fn work_node(id: &str, file: &str) -> WorkNode {
        WorkNode {
            id: id.to_string(),
            label: id.to_string(),
            file: file.to_string(),
            is_proxy: false,
            folded: 0,
            is_source: false,
        }
    }

    fn layered_from(nodes: Vec<WorkNode>, pairs: &[(usize, usize)]) -> LayeredGraph {
        let mut edges: Vec<WorkEdge> = pairs
            .iter()
            .map(|&(from, to)| WorkEdge {
                from,
                to,
                kind: EdgeKind::Direct,
                is_backedge: false,
            })
            .collect();
        mark_backedges(&nodes, &mut edges);
        let layers = assign_layers(&nodes, &edges);
        insert_dummies(&nodes, &edges, &layers)
    }

    #[test]
    fn same_file_nodes_stay_contiguous() {
        // layer 1 holds two b.ts nodes and one c.ts node; interleaving
        // would split the b.ts cluster
        let nodes = vec![
            work_node("a1", "a.ts"),
            work_node("b1", "b.ts"),
            work_node("c1", "c.ts"),
            work_node("b2", "b.ts"),
        ];
        let layered = layered_from(nodes, &[(0, 1), (0, 2), (0, 3)]);
        let ordered = order_layers(&layered, None);

        let files: Vec<&str> = ordered[1]
            .iter()
            .map(|&n| layered.nodes[n].file.as_str())
            .collect();
        assert_eq!(files, vec!["b.ts", "b.ts", "c.ts"]);
    }

    #[test]
    fn previous_order_drives_initial_placement() {
        let nodes = vec![
            work_node("a1", "a.ts"),
            work_node("b1", "b.ts"),
            work_node("c1", "c.ts"),
        ];
        let layered = layered_from(nodes, &[(0, 1), (0, 2)]);
        let previous = vec!["c.ts".to_string(), "b.ts".to_string(), "a.ts".to_string()];
        let ordered = order_layers(&layered, Some(&previous));
        let order = derive_file_order(&layered, &ordered, Some(&previous));

        let b_pos = order.iter().position(|f| f == "b.ts").unwrap();
        let c_pos = order.iter().position(|f| f == "c.ts").unwrap();
        assert!(c_pos < b_pos, "previous order must be retained: {order:?}");
    }

    #[test]
    fn new_files_insert_near_natural_position() {
        let nodes = vec![
            work_node("a1", "a.ts"),
            work_node("b1", "b.ts"),
            work_node("c1", "c.ts"),
        ];
        let layered = layered_from(nodes, &[(0, 1), (1, 2)]);
        let ordered = order_layers(&layered, None);
        // previous knew a and c; b is new and naturally sits between them
        let previous = vec!["a.ts".to_string(), "c.ts".to_string()];
        let order = derive_file_order(&layered, &ordered, Some(&previous));
        assert_eq!(order, vec!["a.ts", "b.ts", "c.ts"]);
    }

    #[test]
    fn ordering_is_deterministic() {
        let nodes = vec![
            work_node("a1", "a.ts"),
            work_node("b1", "b.ts"),
            work_node("b2", "b.ts"),
            work_node("c1", "c.ts"),
        ];
        let layered = layered_from(nodes, &[(0, 1), (0, 2), (0, 3), (1, 3)]);
        let first = order_layers(&layered, None);
        let second = order_layers(&layered, None);
        assert_eq!(first, second);
    }
}
