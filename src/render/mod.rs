//! Output shaping: the JSON interchange payload and Graphviz text.

pub mod dot;
pub mod payload;

pub use dot::to_dot;
pub use payload::{GraphPayload, PayloadEdge, PayloadNode, PayloadOptions};
