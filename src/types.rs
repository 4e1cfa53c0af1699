//! Core data model for callpath.
//!
//! Everything downstream of the parser speaks these types: the parser
//! produces one [`ParsedFile`] per source file, the resolver consumes call
//! sites against it, and the graph layer keys everything by [`FunctionId`].
//! Key design decisions:
//! - `Arc<str>` for interned paths and qualified names (files are referenced
//!   from many nodes; cloning an id must stay cheap)
//! - closed sums for call sites and edge kinds, matched exhaustively
//! - frozen after parse: a `ParsedFile` is never mutated once cached

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Serde helpers for `Arc<str>` fields.
pub(crate) mod arc_str_serde {
    use super::*;

    pub fn serialize<S>(arc: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(arc.as_ref())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.into())
    }
}

/// Qualified name of the synthetic top-level scope of a file.
pub const MODULE_SCOPE: &str = "<module>";

/// `exportedNames` key for a file's default export.
pub const DEFAULT_EXPORT: &str = "default";

/// `ImportInfo::imported` sentinel for namespace imports.
pub const NAMESPACE_IMPORT: &str = "*";

/// File-path prefix of synthetic nodes for unresolved third-party imports.
pub const EXTERNAL_PREFIX: &str = "<external>::";

/// Total identity of a function-like entity: (absolute file path, qualified
/// name). Qualified names follow the conventions of the parser: `foo`,
/// `Class.member`, `Obj.prop`, `<module>`, or - for external nodes - the
/// imported name under an `<external>::specifier` file component.
///
/// Comparable and hashable so graphs can be keyed by it; never key anything
/// by a tree-sitter node, those are local to one parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId {
    #[serde(with = "arc_str_serde")]
    pub file: Arc<str>,
    #[serde(with = "arc_str_serde")]
    pub qualified: Arc<str>,
}

impl FunctionId {
    pub fn new(file: impl Into<Arc<str>>, qualified: impl Into<Arc<str>>) -> Self {
        Self {
            file: file.into(),
            qualified: qualified.into(),
        }
    }

    /// Whether this id denotes a synthetic external node.
    pub fn is_external(&self) -> bool {
        self.file.starts_with(EXTERNAL_PREFIX)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.file, self.qualified)
    }
}

/// A syntactic invocation inside a function body. Exclusive variants: a call
/// to a bare identifier, or a call through a one-level property access.
/// Deeper chains (`a.b.c()`) are not call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSite {
    /// `callee(...)`
    Named { callee: Arc<str>, line: u32 },
    /// `object.property(...)`. Inside a method, `this.property(...)` is
    /// recorded with the enclosing class name as the object token, which is
    /// what makes instance calls resolvable without a type checker.
    Member {
        object: Arc<str>,
        property: Arc<str>,
        line: u32,
    },
}

impl CallSite {
    pub fn line(&self) -> u32 {
        match self {
            CallSite::Named { line, .. } | CallSite::Member { line, .. } => *line,
        }
    }
}

/// One imported binding. `imported` is a concrete exported name, the
/// [`DEFAULT_EXPORT`] sentinel, or [`NAMESPACE_IMPORT`] for `* as ns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    pub local: String,
    pub imported: String,
    pub specifier: String,
    pub is_namespace: bool,
}

/// `export { a as b } from 'mod'` - `exported` is the outward name, `imported`
/// the name looked up in `specifier`. `export * from 'mod'` is recorded with
/// both names set to [`NAMESPACE_IMPORT`] and is not resolved through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReExportInfo {
    pub exported: String,
    pub imported: String,
    pub specifier: String,
}

/// Where a DI default mapping points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiTarget {
    /// `f(p = { k: localFn })`
    Local(String),
    /// `f(p = { k: obj.member })`
    Member { object: String, member: String },
}

/// Extracted from `f(p = { k: v, … })`: parameter name, property key, and the
/// value reference. Shorthand `{ k }` yields a `Local` target named `k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiDefaultMapping {
    pub param: String,
    pub prop: String,
    pub target: DiTarget,
}

/// Right-hand side of a recognized constructor field assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// `this.f = param.prop`
    ParamProp { param: String, prop: String },
    /// `this.f = ident`
    Local(String),
}

/// `this.field = …` inside a constructor body. All other right-hand-side
/// shapes are ignored by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAssignment {
    pub field: String,
    pub source: FieldSource,
}

/// One function-like entity parsed from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFunction {
    /// Qualified name, unique within the file.
    pub qualified: Arc<str>,
    /// First source line of the declaration (1-indexed).
    pub start_line: u32,
    /// Last source line of the declaration.
    pub end_line: u32,
    /// Set by the instrumentation unwrapper.
    pub is_instrumented: bool,
    /// Call sites in file order.
    pub calls: Vec<CallSite>,
    /// DI mappings derived from object-literal parameter defaults.
    pub di_defaults: Vec<DiDefaultMapping>,
    /// Present only on constructors.
    pub field_assignments: Option<Vec<FieldAssignment>>,
    /// Free-text lead of an attached doc comment, tags stripped.
    pub description: Option<String>,
    /// Verbatim parameter list plus optional `: ReturnType`. Constructors
    /// carry none.
    pub signature: Option<String>,
}

impl ParsedFunction {
    pub fn new(qualified: impl Into<Arc<str>>, start_line: u32, end_line: u32) -> Self {
        Self {
            qualified: qualified.into(),
            start_line,
            end_line,
            is_instrumented: false,
            calls: Vec::new(),
            di_defaults: Vec::new(),
            field_assignments: None,
            description: None,
            signature: None,
        }
    }
}

/// The parser's complete model of one source file.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    /// Absolute path of the file.
    pub path: Arc<str>,
    /// Every function-like entity; qualified names are unique here.
    pub functions: Vec<ParsedFunction>,
    pub imports: Vec<ImportInfo>,
    pub re_exports: Vec<ReExportInfo>,
    /// exported name → local name. Default exports use [`DEFAULT_EXPORT`].
    pub exported_names: std::collections::HashMap<String, String>,
    /// `Obj.prop` → qualified name of the function the property references.
    pub object_bindings: std::collections::HashMap<String, String>,
    /// variable → class name, from `x = new ClassName(…)`.
    pub instance_bindings: std::collections::HashMap<String, String>,
}

impl ParsedFile {
    /// Look up a function by qualified name.
    pub fn function(&self, qualified: &str) -> Option<&ParsedFunction> {
        self.functions
            .iter()
            .find(|f| f.qualified.as_ref() == qualified)
    }
}

/// How the resolver reached a callee. Closed set; renderers style edges by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    Direct,
    StaticMethod,
    DiDefault,
    InstrumentWrapper,
    InstanceMethod,
    ReExport,
    External,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Direct => "direct",
            EdgeKind::StaticMethod => "static-method",
            EdgeKind::DiDefault => "di-default",
            EdgeKind::InstrumentWrapper => "instrument-wrapper",
            EdgeKind::InstanceMethod => "instance-method",
            EdgeKind::ReExport => "re-export",
            EdgeKind::External => "external",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_id_display_and_external() {
        let id = FunctionId::new("/repo/src/a.ts", "Worker.process");
        assert_eq!(id.to_string(), "/repo/src/a.ts::Worker.process");
        assert!(!id.is_external());

        let ext = FunctionId::new(format!("{EXTERNAL_PREFIX}some-pkg"), "streamText");
        assert!(ext.is_external());
    }

    #[test]
    fn edge_kind_round_trips_kebab_case() {
        let json = serde_json::to_string(&EdgeKind::DiDefault).unwrap();
        assert_eq!(json, "\"di-default\"");
        let back: EdgeKind = serde_json::from_str("\"instrument-wrapper\"").unwrap();
        assert_eq!(back, EdgeKind::InstrumentWrapper);
        assert_eq!(EdgeKind::ReExport.as_str(), "re-export");
    }

    #[test]
    fn parsed_file_lookup() {
        let mut file = ParsedFile {
            path: "/repo/a.ts".into(),
            ..Default::default()
        };
        file.functions.push(ParsedFunction::new("main", 1, 4));
        assert!(file.function("main").is_some());
        assert!(file.function("missing").is_none());
    }
}
