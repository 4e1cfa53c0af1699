//! callpath - static call-path extraction for typed-JavaScript codebases
//!
//! Recovers the call graph of a multi-file TypeScript project from syntax
//! alone (no type checker, no runtime) and slices out the subgraph that
//! connects chosen source functions to chosen target functions.
//!
//! # Architecture
//!
//! ```text
//! Selectors → Graph Builder → (per file: Parser → Symbol Resolver → Module Resolver)
//!                 ↓
//!               slice → payload → Graphviz | JSON | Layout Engine
//!                 ↓                              ↓
//!            tree-sitter                 layered geometry
//!            + petgraph                  (pure, deterministic)
//! ```
//!
//! Resolution is deliberately syntactic: imports, re-export chains, class
//! statics and instance methods, object-literal façades, DI parameter
//! defaults, and constructor field plumbing are followed; fully dynamic
//! dispatch is not. Calls the strategies cannot place are dropped (or, when
//! requested, leafed as `<external>::` nodes) and reported on the verbose
//! diagnostics channel.

pub mod config;
pub mod error;
pub mod graph;
pub mod layout;
pub mod parsing;
pub mod render;
pub mod resolve;
pub mod selector;
pub mod types;

// Re-export the core surface
pub use config::{CompilerSettings, ResolverOptions};
pub use error::{Diagnostics, Fault};
pub use graph::{slice, BuildBounds, CallEdge, CallGraph, FunctionNode, GraphBuilder};
pub use layout::{layout, Direction, LayoutOptions, LayoutResult};
pub use render::{to_dot, GraphPayload, PayloadOptions};
pub use resolve::{Resolution, SymbolResolver};
pub use types::{CallSite, EdgeKind, FunctionId, ParsedFile, ParsedFunction};
