//! Layered layout engine: graph in, planar geometry out.
//!
//! No external graph library - the classic Sugiyama pipeline is implemented
//! directly, with two non-standard policies this tool needs:
//! - cluster-aware ordering: the within-layer sort key leads with the file's
//!   cluster barycenter, so nodes of one file stay contiguous;
//! - cluster-order retention: a previous file ordering is honored across
//!   interactive collapse/expand mutations, keeping the drawing stable.
//!
//! The engine is pure. Identical inputs (including the previous ordering)
//! produce identical outputs, and it never touches the filesystem.
//!
//! ```text
//! collapse -> backedges -> layers -> dummies -> ordering -> coords -> routes
//! ```

mod collapse;
mod coords;
mod layering;
mod ordering;
mod routing;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::render::GraphPayload;
use crate::types::EdgeKind;

/// Which way layers progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    TopToBottom,
    LeftToRight,
}

/// Id prefix of the synthetic node standing in for a collapsed file.
pub const COLLAPSED_PREFIX: &str = "__collapsed:";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A positioned node. `x`/`y` are the top-left corner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub id: String,
    pub label: String,
    pub file: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// True for the `__collapsed:` stand-ins.
    pub is_collapsed_proxy: bool,
    /// How many nodes the proxy folded in (zero otherwise).
    pub folded_count: usize,
}

/// A padded rectangle around one file's nodes, with its owner chips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutCluster {
    pub file: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub owners: Vec<String>,
}

/// A routed edge: orthogonal waypoints from source boundary to target
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub points: Vec<Point>,
    pub is_backedge: bool,
}

/// The complete geometric description of one drawing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub nodes: Vec<LayoutNode>,
    pub clusters: Vec<LayoutCluster>,
    pub edges: Vec<LayoutEdge>,
    /// Cross-axis cluster order, to be passed back on the next layout.
    pub file_order: Vec<String>,
    pub width: f64,
    pub height: f64,
}

/// Inputs beyond the graph itself.
#[derive(Debug, Clone, Default)]
pub struct LayoutOptions {
    pub direction: Direction,
    /// Files whose nodes fold into one synthetic proxy.
    pub collapsed: BTreeSet<String>,
    /// File ordering from a previous layout, for stability.
    pub previous_order: Option<Vec<String>>,
    /// Repository-relative path to owner short names.
    pub owners: BTreeMap<String, Vec<String>>,
}

/// Lay out a graph payload.
pub fn layout(payload: &GraphPayload, options: &LayoutOptions) -> LayoutResult {
    // 1. collapse preprocessing
    let (work_nodes, mut work_edges) = collapse::collapse(payload, &options.collapsed);

    // 2-3. backedge detection + longest-path layering
    layering::mark_backedges(&work_nodes, &mut work_edges);
    let layers_of = layering::assign_layers(&work_nodes, &work_edges);

    // 4. dummy chains for multi-layer edges
    let layered = layering::insert_dummies(&work_nodes, &work_edges, &layers_of);

    // 5. within-layer ordering (barycenter sweeps, cluster-aware)
    let ordered = ordering::order_layers(&layered, options.previous_order.as_deref());

    // 6. cluster order derivation
    let file_order = ordering::derive_file_order(
        &layered,
        &ordered,
        options.previous_order.as_deref(),
    );

    // 7. coordinates
    let placed =
        coords::assign_coordinates(&layered, &ordered, &file_order, &work_nodes, options.direction);

    // 8. routing
    let edges = routing::route_edges(&layered, &work_nodes, &work_edges, &placed, options.direction);

    // 9. cluster rectangles
    let (nodes, clusters, width, height) =
        coords::finalize(&layered, &work_nodes, &placed, &options.owners, &options.collapsed);

    LayoutResult {
        nodes,
        clusters,
        edges,
        file_order,
        width,
        height,
    }
}
