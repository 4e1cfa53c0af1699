//! Cross-file resolution: module specifiers to paths, call sites to targets.

mod modules;
mod symbols;

pub use modules::{ModuleResolver, ResolvedModule};
pub use symbols::{Resolution, SymbolResolver};
