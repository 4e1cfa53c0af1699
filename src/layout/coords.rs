//! Coordinate assignment and cluster rectangles.
//!
//! Two abstract axes: "flow" advances with layers, "cross" is perpendicular.
//! Top-to-bottom maps flow to y; left-to-right maps flow to x. All placement
//! happens in flow/cross space and only `rect`/`point` translate to screen
//! coordinates.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::collapse::WorkNode;
use super::layering::LayeredGraph;
use super::{Direction, LayoutCluster, LayoutNode, Point};

pub(super) const NODE_HEIGHT: f64 = 36.0;
const CHAR_WIDTH: f64 = 7.2;
const NODE_PADDING_X: f64 = 16.0;
const NODE_GAP: f64 = 24.0;
pub(super) const LAYER_GAP: f64 = 56.0;
const CLUSTER_GAP: f64 = 48.0;
const CLUSTER_PADDING: f64 = 16.0;
const CLUSTER_HEADER: f64 = 30.0;
const MARGIN: f64 = 32.0;
/// Flow extent of a dummy; keeps empty layers from collapsing to a line.
const DUMMY_FLOW: f64 = 8.0;

/// Placement in flow/cross space. Positions are centers.
pub(super) struct Placed {
    pub flow: Vec<f64>,
    pub cross: Vec<f64>,
    pub flow_size: Vec<f64>,
    pub cross_size: Vec<f64>,
    pub total_flow: f64,
    pub total_cross: f64,
    pub direction: Direction,
}

impl Placed {
    /// Screen-space top-left rectangle of an L-node.
    pub fn rect(&self, index: usize) -> (f64, f64, f64, f64) {
        let (flow, cross) = (self.flow[index], self.cross[index]);
        let (flow_size, cross_size) = (self.flow_size[index], self.cross_size[index]);
        match self.direction {
            Direction::TopToBottom => (
                cross - cross_size / 2.0,
                flow - flow_size / 2.0,
                cross_size,
                flow_size,
            ),
            Direction::LeftToRight => (
                flow - flow_size / 2.0,
                cross - cross_size / 2.0,
                flow_size,
                cross_size,
            ),
        }
    }

    /// Map a flow/cross pair to screen space.
    pub fn point(&self, flow: f64, cross: f64) -> Point {
        match self.direction {
            Direction::TopToBottom => Point::new(cross, flow),
            Direction::LeftToRight => Point::new(flow, cross),
        }
    }
}

fn label_extent(label: &str) -> f64 {
    label.chars().count() as f64 * CHAR_WIDTH + 2.0 * NODE_PADDING_X
}

/// Step 7: place every L-node.
pub(super) fn assign_coordinates(
    layered: &LayeredGraph,
    ordered: &[Vec<usize>],
    file_order: &[String],
    work_nodes: &[WorkNode],
    direction: Direction,
) -> Placed {
    let count = layered.nodes.len();
    let mut flow_size = vec![0.0; count];
    let mut cross_size = vec![0.0; count];

    for (index, node) in layered.nodes.iter().enumerate() {
        match node.work {
            Some(work_index) => {
                let box_extent = label_extent(&work_nodes[work_index].label);
                match direction {
                    Direction::TopToBottom => {
                        cross_size[index] = box_extent;
                        flow_size[index] = NODE_HEIGHT;
                    }
                    Direction::LeftToRight => {
                        flow_size[index] = box_extent;
                        cross_size[index] = NODE_HEIGHT;
                    }
                }
            }
            None => {
                flow_size[index] = DUMMY_FLOW;
                cross_size[index] = 0.0;
            }
        }
    }

    // flow: layers at cumulative positions, nodes centered in their band
    let mut flow = vec![0.0; count];
    let mut cursor = MARGIN;
    for layer in ordered {
        let extent = layer
            .iter()
            .map(|&n| flow_size[n])
            .fold(0.0f64, f64::max)
            .max(NODE_HEIGHT);
        for &node in layer {
            flow[node] = cursor + extent / 2.0;
        }
        cursor += extent + LAYER_GAP;
    }
    let total_flow = if ordered.is_empty() {
        2.0 * MARGIN
    } else {
        cursor - LAYER_GAP + MARGIN
    };

    // cross: per-file bands sized to the widest layer-group of that file
    let mut band_extent: BTreeMap<&str, f64> = BTreeMap::new();
    for layer in ordered {
        let mut group_extent: BTreeMap<&str, f64> = BTreeMap::new();
        let mut group_count: BTreeMap<&str, usize> = BTreeMap::new();
        for &node in layer {
            let file = layered.nodes[node].file.as_str();
            *group_extent.entry(file).or_default() += cross_size[node];
            *group_count.entry(file).or_default() += 1;
        }
        for (file, extent) in group_extent {
            let gaps = (group_count[file].saturating_sub(1)) as f64 * NODE_GAP;
            let total = extent + gaps;
            let entry = band_extent.entry(file).or_default();
            if total > *entry {
                *entry = total;
            }
        }
    }
    // left-to-right layouts stack cluster bands vertically; reserve header
    // room on the cross axis
    let header_reserve = match direction {
        Direction::TopToBottom => 0.0,
        Direction::LeftToRight => CLUSTER_HEADER,
    };

    let mut band_start: HashMap<&str, f64> = HashMap::new();
    let mut band_cursor = MARGIN;
    for file in file_order {
        let extent = band_extent.get(file.as_str()).copied().unwrap_or(0.0) + header_reserve;
        band_start.insert(file.as_str(), band_cursor);
        band_cursor += extent + CLUSTER_GAP;
    }
    let total_cross = if file_order.is_empty() {
        2.0 * MARGIN
    } else {
        band_cursor - CLUSTER_GAP + MARGIN
    };

    // within each layer, a file's nodes sit contiguously, centered in the
    // file's band
    let mut cross = vec![0.0; count];
    for layer in ordered {
        let mut grouped: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for &node in layer {
            grouped
                .entry(layered.nodes[node].file.as_str())
                .or_default()
                .push(node);
        }
        for (file, nodes) in grouped {
            let group_extent: f64 = nodes.iter().map(|&n| cross_size[n]).sum::<f64>()
                + (nodes.len().saturating_sub(1)) as f64 * NODE_GAP;
            let band = band_extent.get(file).copied().unwrap_or(0.0) + header_reserve;
            let start = band_start.get(file).copied().unwrap_or(MARGIN);
            let mut offset = start + header_reserve + (band - header_reserve - group_extent) / 2.0;
            for &node in &nodes {
                cross[node] = offset + cross_size[node] / 2.0;
                offset += cross_size[node] + NODE_GAP;
            }
        }
    }

    Placed {
        flow,
        cross,
        flow_size,
        cross_size,
        total_flow,
        total_cross,
        direction,
    }
}

/// Step 9: emit positioned nodes and padded cluster rectangles.
pub(super) fn finalize(
    layered: &LayeredGraph,
    work_nodes: &[WorkNode],
    placed: &Placed,
    owners: &BTreeMap<String, Vec<String>>,
    collapsed: &BTreeSet<String>,
) -> (Vec<LayoutNode>, Vec<LayoutCluster>, f64, f64) {
    let mut nodes = Vec::new();
    let mut bounds: BTreeMap<&str, (f64, f64, f64, f64)> = BTreeMap::new();

    for (index, lnode) in layered.nodes.iter().enumerate() {
        let Some(work_index) = lnode.work else {
            continue;
        };
        let work = &work_nodes[work_index];
        let (x, y, width, height) = placed.rect(index);
        nodes.push(LayoutNode {
            id: work.id.clone(),
            label: work.label.clone(),
            file: work.file.clone(),
            x,
            y,
            width,
            height,
            is_collapsed_proxy: work.is_proxy,
            folded_count: work.folded,
        });

        if !work.is_proxy && !collapsed.contains(&work.file) {
            let entry = bounds
                .entry(work.file.as_str())
                .or_insert((f64::MAX, f64::MAX, f64::MIN, f64::MIN));
            entry.0 = entry.0.min(x);
            entry.1 = entry.1.min(y);
            entry.2 = entry.2.max(x + width);
            entry.3 = entry.3.max(y + height);
        }
    }

    let clusters = bounds
        .into_iter()
        .map(|(file, (min_x, min_y, max_x, max_y))| LayoutCluster {
            file: file.to_string(),
            x: min_x - CLUSTER_PADDING,
            y: min_y - CLUSTER_PADDING - CLUSTER_HEADER,
            width: (max_x - min_x) + 2.0 * CLUSTER_PADDING,
            height: (max_y - min_y) + 2.0 * CLUSTER_PADDING + CLUSTER_HEADER,
            owners: owners.get(file).cloned().unwrap_or_default(),
        })
        .collect();

    let (width, height) = match placed.direction {
        Direction::TopToBottom => (placed.total_cross, placed.total_flow),
        Direction::LeftToRight => (placed.total_flow, placed.total_cross),
    };

    (nodes, clusters, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::collapse::{WorkEdge, WorkNode};
    use super::super::layering::{assign_layers, insert_dummies, mark_backedges};
    use super::super::ordering::order_layers;
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

    fn pipeline(
        nodes: Vec<WorkNode>,
        pairs: &[(usize, usize)],
        direction: Direction,
    ) -> (LayeredGraph, Vec<Vec<usize>>, Vec<String>, Placed) {
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
        let layer_of = assign_layers(&nodes, &edges);
        let layered = insert_dummies(&nodes, &edges, &layer_of);
        let ordered = order_layers(&layered, None);
        let file_order =
            super::super::ordering::derive_file_order(&layered, &ordered, None);
        let placed = assign_coordinates(&layered, &ordered, &file_order, &nodes, direction);
        (layered, ordered, file_order, placed)
    }

    #[test]
    fn layers_advance_along_flow() {
        let nodes = vec![
            work_node("a::f", "a.ts"),
            work_node("b::g", "b.ts"),
            work_node("c::h", "c.ts"),
        ];
        let (layered, _, _, placed) =
            pipeline(nodes, &[(0, 1), (1, 2)], Direction::TopToBottom);

        let flow_of = |id: &str| {
            let index = layered.nodes.iter().position(|n| n.id == id).unwrap();
            placed.flow[index]
        };
        assert!(flow_of("a::f") < flow_of("b::g"));
        assert!(flow_of("b::g") < flow_of("c::h"));
    }

    #[test]
    fn file_bands_do_not_overlap() {
        let nodes = vec![
            work_node("a::f", "a.ts"),
            work_node("b::g", "b.ts"),
            work_node("b::h", "b.ts"),
        ];
        let (layered, _, _, placed) =
            pipeline(nodes, &[(0, 1), (0, 2)], Direction::TopToBottom);

        let span = |id: &str| {
            let index = layered.nodes.iter().position(|n| n.id == id).unwrap();
            let center = placed.cross[index];
            let half = placed.cross_size[index] / 2.0;
            (center - half, center + half)
        };
        let (_, a_end) = span("a::f");
        let (b_start, _) = span("b::g");
        // a.ts band precedes b.ts band with a gap
        assert!(a_end <= b_start || span("b::g").1 <= span("a::f").0);
    }

    #[test]
    fn direction_swaps_axes() {
        let nodes = vec![work_node("a::f", "a.ts"), work_node("b::g", "b.ts")];
        let (layered, _, _, tb) =
            pipeline(nodes.clone(), &[(0, 1)], Direction::TopToBottom);
        let (_, _, _, lr) = pipeline(nodes, &[(0, 1)], Direction::LeftToRight);

        let a_index = layered.nodes.iter().position(|n| n.id == "a::f").unwrap();
        let b_index = layered.nodes.iter().position(|n| n.id == "b::g").unwrap();
        // flow is y in TB: the callee sits below its caller
        assert!(tb.rect(b_index).1 > tb.rect(a_index).1);
        // flow is x in LR: the callee sits to the right
        assert!(lr.rect(b_index).0 > lr.rect(a_index).0);
        // node boxes keep the fixed extent on the screen-y axis either way
        assert_eq!(tb.rect(b_index).3, NODE_HEIGHT);
        assert_eq!(lr.rect(b_index).3, NODE_HEIGHT);
    }

    #[test]
    fn clusters_pad_header_side() {
        let nodes = vec![work_node("a::f", "a.ts"), work_node("b::g", "b.ts")];
        let mut edges: Vec<WorkEdge> = vec![WorkEdge {
            from: 0,
            to: 1,
            kind: EdgeKind::Direct,
            is_backedge: false,
        }];
        mark_backedges(&nodes, &mut edges);
        let layer_of = assign_layers(&nodes, &edges);
        let layered = insert_dummies(&nodes, &edges, &layer_of);
        let ordered = order_layers(&layered, None);
        let file_order = super::super::ordering::derive_file_order(&layered, &ordered, None);
        let placed =
            assign_coordinates(&layered, &ordered, &file_order, &nodes, Direction::TopToBottom);

        let owners = BTreeMap::from([(
            "a.ts".to_string(),
            vec!["team-core".to_string()],
        )]);
        let (layout_nodes, clusters, width, height) =
            finalize(&layered, &nodes, &placed, &owners, &BTreeSet::new());

        assert_eq!(layout_nodes.len(), 2);
        assert_eq!(clusters.len(), 2);
        let a_cluster = clusters.iter().find(|c| c.file == "a.ts").unwrap();
        let a_node = layout_nodes.iter().find(|n| n.file == "a.ts").unwrap();
        // header padding exceeds the plain padding
        assert!(a_node.y - a_cluster.y > a_cluster.y + a_cluster.height - (a_node.y + a_node.height));
        assert_eq!(a_cluster.owners, vec!["team-core".to_string()]);
        assert!(width > 0.0 && height > 0.0);
    }
}
