//! Graphviz rendering: a `digraph callpath` with one cluster per source
//! file.
//!
//! Node fills encode roles (source, target, instrumented, plain); edge
//! style encodes the resolution kind. External leaves sit outside any
//! cluster. Output is deterministic: files and nodes are emitted in sorted
//! order.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::payload::GraphPayload;

const FILL_SOURCE: &str = "#b7e1cd";
const FILL_TARGET: &str = "#f4c7c3";
const FILL_INSTRUMENTED: &str = "#fce8b2";
const FILL_DEFAULT: &str = "#e8eaed";
const TINT_STATIC: &str = "#4a7aa5";

/// Render the payload as Graphviz text.
pub fn to_dot(payload: &GraphPayload) -> String {
    let mut out = String::new();
    out.push_str("digraph callpath {\n");
    out.push_str("  rankdir=TB;\n");
    out.push_str("  node [shape=box, style=\"rounded,filled\", fontname=\"Helvetica\"];\n");
    out.push_str("  edge [fontname=\"Helvetica\", fontsize=10];\n");

    // group nodes by file, externals apart, both in sorted order
    let mut clusters: BTreeMap<&str, Vec<&super::payload::PayloadNode>> = BTreeMap::new();
    let mut externals: Vec<&super::payload::PayloadNode> = Vec::new();
    for node in &payload.nodes {
        if node.is_external == Some(true) {
            externals.push(node);
        } else {
            clusters.entry(&node.file_path).or_default().push(node);
        }
    }

    for (cluster_index, (file, mut nodes)) in clusters.into_iter().enumerate() {
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let _ = writeln!(out, "  subgraph cluster_{cluster_index} {{");
        let _ = writeln!(out, "    label=\"{}\";", escape(file));
        out.push_str("    style=rounded;\n    color=\"#9aa0a6\";\n");
        for node in nodes {
            let fill = if node.is_source {
                FILL_SOURCE
            } else if node.is_target {
                FILL_TARGET
            } else if node.is_instrumented {
                FILL_INSTRUMENTED
            } else {
                FILL_DEFAULT
            };
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\\n:{}\", fillcolor=\"{}\"];",
                escape(&node.id),
                escape(&node.qualified_name),
                node.line,
                fill
            );
        }
        out.push_str("  }\n");
    }

    externals.sort_by(|a, b| a.id.cmp(&b.id));
    for node in externals {
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\\n{}\", fillcolor=\"{}\", style=\"dashed,filled\"];",
            escape(&node.id),
            escape(&node.qualified_name),
            escape(&node.file_path),
            FILL_DEFAULT
        );
    }

    for edge in &payload.edges {
        let attrs = edge_attributes(edge.kind);
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\"{};",
            escape(&edge.from),
            escape(&edge.to),
            attrs
        );
    }

    out.push_str("}\n");
    out
}

fn edge_attributes(kind: crate::types::EdgeKind) -> String {
    use crate::types::EdgeKind::*;
    match kind {
        Direct => String::new(),
        StaticMethod => format!(" [color=\"{TINT_STATIC}\"]"),
        DiDefault => " [style=dashed, label=\"DI\"]".to_string(),
        InstrumentWrapper => " [style=dotted]".to_string(),
        InstanceMethod => format!(" [color=\"{TINT_STATIC}\", arrowhead=vee]"),
        ReExport => " [style=dotted, label=\"re-export\"]".to_string(),
        External => " [style=dashed, color=\"#9aa0a6\"]".to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::payload::{PayloadEdge, PayloadNode};
    use crate::types::EdgeKind;

    fn node(id: &str, file: &str, name: &str) -> PayloadNode {
        PayloadNode {
            id: id.to_string(),
            file_path: file.to_string(),
            qualified_name: name.to_string(),
            line: 3,
            is_instrumented: false,
            is_source: false,
            is_target: false,
            description: None,
            signature: None,
            source_snippet: None,
            is_external: None,
        }
    }

    #[test]
    fn clusters_per_file_and_styled_edges() {
        let mut main = node("a.ts::main", "a.ts", "main");
        main.is_source = true;
        let mut helper = node("b.ts::helper", "b.ts", "helper");
        helper.is_target = true;
        let payload = GraphPayload {
            nodes: vec![main, helper],
            edges: vec![PayloadEdge {
                from: "a.ts::main".into(),
                to: "b.ts::helper".into(),
                kind: EdgeKind::DiDefault,
                call_line: 4,
            }],
            ..Default::default()
        };

        let dot = to_dot(&payload);
        assert!(dot.starts_with("digraph callpath {"));
        assert!(dot.contains("subgraph cluster_0"));
        assert!(dot.contains("subgraph cluster_1"));
        assert!(dot.contains("label=\"a.ts\""));
        assert!(dot.contains("main\\n:3"));
        assert!(dot.contains("label=\"DI\""));
        assert!(dot.contains(FILL_SOURCE));
        assert!(dot.contains(FILL_TARGET));
    }

    #[test]
    fn external_nodes_sit_outside_clusters() {
        let mut ext = node("<external>::pkg::streamText", "<external>::pkg", "streamText");
        ext.is_external = Some(true);
        let payload = GraphPayload {
            nodes: vec![ext],
            edges: vec![],
            ..Default::default()
        };
        let dot = to_dot(&payload);
        assert!(!dot.contains("subgraph"));
        assert!(dot.contains("streamText"));
    }

    #[test]
    fn output_is_deterministic() {
        let payload = GraphPayload {
            nodes: vec![
                node("b.ts::x", "b.ts", "x"),
                node("a.ts::y", "a.ts", "y"),
            ],
            edges: vec![],
            ..Default::default()
        };
        assert_eq!(to_dot(&payload), to_dot(&payload));
        // sorted by file: a.ts cluster first
        let dot = to_dot(&payload);
        let a_pos = dot.find("label=\"a.ts\"").unwrap();
        let b_pos = dot.find("label=\"b.ts\"").unwrap();
        assert!(a_pos < b_pos);
    }
}
