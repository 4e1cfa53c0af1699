//! Graph construction and surgery: storage, bounded traversal, slicing.

mod builder;
mod callgraph;
mod slice;

pub use builder::{BuildBounds, GraphBuilder};
pub use callgraph::{CallEdge, CallGraph, FunctionNode};
pub use slice::slice;
