//! Bounded forward traversal: sources in, merged call graph out.
//!
//! Each source runs an independent breadth-first walk. Files are parsed
//! lazily through the resolver's cache the first time a traversal touches
//! them; a file that fails to parse simply contributes nothing. The bounds
//! are hard: the node count never exceeds `max_nodes`, and nothing past
//! `max_depth` hops from a source is expanded.

use std::collections::{HashSet, VecDeque};

use petgraph::graph::NodeIndex;

use crate::error::{Fault, Result};
use crate::resolve::SymbolResolver;
use crate::types::FunctionId;

use super::callgraph::{CallEdge, CallGraph};

/// Traversal bounds. Both must be at least one.
#[derive(Debug, Clone, Copy)]
pub struct BuildBounds {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for BuildBounds {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_nodes: 400,
        }
    }
}

/// Drives the per-source traversals and merges their graphs.
pub struct GraphBuilder<'r> {
    resolver: &'r mut SymbolResolver,
    bounds: BuildBounds,
}

impl<'r> GraphBuilder<'r> {
    pub fn new(resolver: &'r mut SymbolResolver, bounds: BuildBounds) -> Self {
        Self { resolver, bounds }
    }

    /// Build the merged forward graph for a set of sources.
    ///
    /// Empty sources and degenerate bounds are configuration faults. File
    /// and resolution faults never surface here - they only reach the
    /// diagnostics channel.
    pub fn build(&mut self, sources: &[FunctionId]) -> Result<CallGraph> {
        if sources.is_empty() {
            return Err(Fault::config("no source functions selected"));
        }
        if self.bounds.max_depth == 0 || self.bounds.max_nodes == 0 {
            return Err(Fault::config(format!(
                "bounds must be positive (depth {}, nodes {})",
                self.bounds.max_depth, self.bounds.max_nodes
            )));
        }

        let mut merged = CallGraph::new();
        for source in sources {
            let graph = self.traverse(source);
            // node union (first write wins) under the global cap; edges keep
            // the pair deduplication and never dangle
            for node in graph.nodes() {
                if merged.node_count() >= self.bounds.max_nodes && !merged.contains(&node.id) {
                    continue;
                }
                merged.add_node(node.clone());
            }
            for (from, to, edge) in graph.edges() {
                let (Some(from_idx), Some(to_idx)) =
                    (merged.get_index(&from.id), merged.get_index(&to.id))
                else {
                    continue;
                };
                merged.add_edge(from_idx, to_idx, *edge);
            }
        }
        Ok(merged)
    }

    /// One bounded BFS from one source.
    fn traverse(&mut self, source: &FunctionId) -> CallGraph {
        let mut graph = CallGraph::new();

        // normalize `Obj.prop` starts through the file's object bindings
        let Some(file) = self.resolver.parsed(&source.file) else {
            return graph;
        };
        let qualified = match file.object_bindings.get(source.qualified.as_ref()) {
            Some(bound) => bound.clone(),
            None => source.qualified.to_string(),
        };
        let Some(function) = file.function(&qualified) else {
            return graph;
        };

        let start_node = self.resolver.function_node(&file, function);
        let start_id = start_node.id.clone();
        let start_idx = graph.add_node(start_node);

        let mut visited: HashSet<FunctionId> = HashSet::from([start_id.clone()]);
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(start_idx, 0)]);

        while let Some((idx, depth)) = queue.pop_front() {
            if depth == self.bounds.max_depth {
                continue; // terminal ring: no further expansion
            }
            if graph.node_count() >= self.bounds.max_nodes {
                break;
            }

            let id = match graph.node(idx) {
                Some(node) => node.id.clone(),
                None => continue,
            };
            let Some(file) = self.resolver.parsed(&id.file) else {
                continue;
            };
            let Some(caller) = file.function(&id.qualified).cloned() else {
                continue;
            };

            for site in &caller.calls {
                let Some(resolution) = self.resolver.resolve_call(site, &file, &caller) else {
                    continue;
                };
                let callee_id = resolution.id().clone();
                let is_external = resolution.node.is_external;

                // the node budget is hard: a new callee past the cap is
                // dropped, though edges to already-present nodes still land
                if !graph.contains(&callee_id) && graph.node_count() >= self.bounds.max_nodes {
                    continue;
                }
                let callee_idx = graph.add_node(resolution.node);
                graph.add_edge(idx, callee_idx, CallEdge::new(resolution.kind, site.line()));

                // externals are leaves; everything else expands once
                if !is_external && visited.insert(callee_id) {
                    queue.push_back((callee_idx, depth + 1));
                }
            }
        }

        graph
    }
}
