//! The JSON interchange payload consumed by downstream renderers and the
//! interactive visualization.
//!
//! File paths are rewritten repository-relative here; everything upstream
//! works in absolute paths. Node ids are `relativePath::qualifiedName`,
//! which is stable across runs and readable in DOM inspectors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::graph::CallGraph;
use crate::types::{EdgeKind, FunctionId};

/// How many snippet lines a node may carry before truncation.
const MAX_SNIPPET_LINES: usize = 80;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PayloadNode {
    pub id: String,
    pub file_path: String,
    pub qualified_name: String,
    pub line: u32,
    pub is_instrumented: bool,
    pub is_source: bool,
    pub is_target: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_external: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PayloadEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub call_line: u32,
}

/// The complete interchange document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GraphPayload {
    pub nodes: Vec<PayloadNode>,
    pub edges: Vec<PayloadEdge>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub codeowners: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub repo_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub editor: Option<String>,
}

/// Extras attached to the payload for the interactive viewer.
#[derive(Debug, Clone, Default)]
pub struct PayloadOptions {
    pub codeowners: Option<BTreeMap<String, Vec<String>>>,
    pub repo_root: Option<String>,
    pub editor: Option<String>,
    /// Inline up to [`MAX_SNIPPET_LINES`] of each function's source.
    pub with_snippets: bool,
}

impl GraphPayload {
    /// Shape a graph for rendering: relative paths, role flags, optional
    /// snippets.
    pub fn from_graph(
        graph: &CallGraph,
        sources: &[FunctionId],
        targets: &[FunctionId],
        root: &Path,
        options: &PayloadOptions,
    ) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| {
                let rel = relative_path(&node.id.file, root);
                let source_snippet = if options.with_snippets && !node.is_external {
                    snippet(&node.id.file, node.line, node.end_line)
                } else {
                    None
                };
                PayloadNode {
                    id: payload_id(&node.id, root),
                    file_path: rel,
                    qualified_name: node.id.qualified.to_string(),
                    line: node.line,
                    is_instrumented: node.is_instrumented,
                    is_source: sources.contains(&node.id),
                    is_target: targets.contains(&node.id),
                    description: node.description.clone(),
                    signature: node.signature.clone(),
                    source_snippet,
                    is_external: node.is_external.then_some(true),
                }
            })
            .collect();

        let edges = graph
            .edges()
            .map(|(from, to, edge)| PayloadEdge {
                from: payload_id(&from.id, root),
                to: payload_id(&to.id, root),
                kind: edge.kind,
                call_line: edge.call_line,
            })
            .collect();

        Self {
            nodes,
            edges,
            codeowners: options.codeowners.clone(),
            repo_root: options.repo_root.clone(),
            editor: options.editor.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Render-facing node id: `relativePath::qualifiedName`.
pub fn payload_id(id: &FunctionId, root: &Path) -> String {
    format!("{}::{}", relative_path(&id.file, root), id.qualified)
}

fn relative_path(file: &str, root: &Path) -> String {
    Path::new(file)
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| file.to_string())
}

fn snippet(file: &str, line: u32, end_line: Option<u32>) -> Option<String> {
    if line == 0 {
        return None;
    }
    let content = std::fs::read_to_string(file).ok()?;
    let start = line as usize - 1;
    let end = end_line.map(|l| l as usize).unwrap_or(start + 1);
    let taken: Vec<&str> = content
        .lines()
        .skip(start)
        .take(end.saturating_sub(start).clamp(1, MAX_SNIPPET_LINES))
        .collect();
    if taken.is_empty() {
        None
    } else {
        Some(taken.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CallEdge, FunctionNode};

    fn sample_graph() -> CallGraph {
        let mut graph = CallGraph::new();
        let main = graph.add_node(FunctionNode::new(
            FunctionId::new("/repo/src/a.ts", "main"),
            3,
        ));
        let helper = graph.add_node(FunctionNode::new(
            FunctionId::new("/repo/src/b.ts", "helper"),
            2,
        ));
        let ext = graph.add_node(FunctionNode::external("<external>::pkg", "streamText"));
        graph.add_edge(main, helper, CallEdge::new(EdgeKind::Direct, 4));
        graph.add_edge(main, ext, CallEdge::new(EdgeKind::External, 5));
        graph
    }

    #[test]
    fn paths_become_repo_relative() {
        let graph = sample_graph();
        let sources = [FunctionId::new("/repo/src/a.ts", "main")];
        let targets = [FunctionId::new("/repo/src/b.ts", "helper")];
        let payload = GraphPayload::from_graph(
            &graph,
            &sources,
            &targets,
            Path::new("/repo"),
            &PayloadOptions::default(),
        );

        let main = payload.nodes.iter().find(|n| n.qualified_name == "main").unwrap();
        assert_eq!(main.file_path, "src/a.ts");
        assert_eq!(main.id, "src/a.ts::main");
        assert!(main.is_source);
        assert!(!main.is_target);

        let helper = payload
            .nodes
            .iter()
            .find(|n| n.qualified_name == "helper")
            .unwrap();
        assert!(helper.is_target);
    }

    #[test]
    fn external_nodes_keep_their_prefix() {
        let graph = sample_graph();
        let payload = GraphPayload::from_graph(
            &graph,
            &[],
            &[],
            Path::new("/repo"),
            &PayloadOptions::default(),
        );
        let ext = payload
            .nodes
            .iter()
            .find(|n| n.is_external == Some(true))
            .unwrap();
        assert_eq!(ext.file_path, "<external>::pkg");
        assert_eq!(ext.line, 0);
    }

    #[test]
    fn json_round_trip() {
        let graph = sample_graph();
        let payload = GraphPayload::from_graph(
            &graph,
            &[],
            &[],
            Path::new("/repo"),
            &PayloadOptions {
                editor: Some("vscode".into()),
                repo_root: Some("/repo".into()),
                ..Default::default()
            },
        );
        let json = payload.to_json().unwrap();
        assert!(json.contains("\"qualifiedName\""));
        assert!(json.contains("\"callLine\""));
        let back: GraphPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
