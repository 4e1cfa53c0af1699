//! Resolver configuration: repository root, compiler settings, toggles.
//!
//! The resolver does not discover configuration on its own - it consumes a
//! [`ResolverOptions`] the caller assembled. The loader here exists for the
//! CLI: it reads the target project's `tsconfig.json` (JSONC: comments and
//! trailing commas are legal there), follows `extends` one hop at a time
//! with a visited set, and falls back to sensible defaults when nothing is
//! found.

use crate::error::Diagnostics;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Module-resolution settings distilled from a tsconfig.
///
/// Only the pieces module resolution needs survive: the base directory for
/// non-relative specifiers and the `paths` alias table. Everything else in a
/// tsconfig is irrelevant to a syntactic analysis.
#[derive(Debug, Clone, Default)]
pub struct CompilerSettings {
    /// Absolute base directory for non-relative resolution, when configured.
    pub base_url: Option<PathBuf>,
    /// Alias patterns in declaration order: (pattern, substitutions).
    /// Patterns may hold one `*`; substitutions are relative to `base_url`
    /// (or the tsconfig directory when no baseUrl is set).
    pub paths: Vec<(String, Vec<String>)>,
}

/// Raw tsconfig as deserialized from (comment-stripped) JSON.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawTsConfig {
    extends: Option<String>,
    compiler_options: Option<RawCompilerOptions>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    base_url: Option<String>,
    paths: Option<serde_json::Map<String, serde_json::Value>>,
}

impl CompilerSettings {
    /// Load settings for a project.
    ///
    /// `explicit` wins when given; otherwise `<root>/tsconfig.json` is used
    /// when present; otherwise defaults. A broken tsconfig is a recoverable
    /// file fault: defaults are returned and a diagnostic is emitted.
    pub fn load(root: &Path, explicit: Option<&Path>, diagnostics: &Diagnostics) -> Self {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = root.join("tsconfig.json");
                if !candidate.exists() {
                    return Self::default();
                }
                candidate
            }
        };

        let mut visited = HashSet::new();
        match Self::load_chain(&path, &mut visited, diagnostics) {
            Some(settings) => settings,
            None => {
                diagnostics.file_fault(&path.display().to_string(), "unreadable tsconfig");
                Self::default()
            }
        }
    }

    /// Read one tsconfig, merging an `extends` base underneath it.
    fn load_chain(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        diagnostics: &Diagnostics,
    ) -> Option<Self> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !visited.insert(canonical) {
            // extends cycle; treat the repeated file as contributing nothing
            return Some(Self::default());
        }

        let content = std::fs::read_to_string(path).ok()?;
        let raw: RawTsConfig = match serde_json::from_str(&strip_jsonc(&content)) {
            Ok(raw) => raw,
            Err(err) => {
                diagnostics.file_fault(&path.display().to_string(), &err.to_string());
                return Some(Self::default());
            }
        };

        let dir = path.parent().unwrap_or(Path::new("."));

        let mut settings = match raw.extends {
            Some(ref base) => {
                let base_path = resolve_extends(dir, base);
                Self::load_chain(&base_path, visited, diagnostics).unwrap_or_default()
            }
            None => Self::default(),
        };

        if let Some(options) = raw.compiler_options {
            if let Some(base_url) = options.base_url {
                settings.base_url = Some(dir.join(base_url));
            }
            if let Some(paths) = options.paths {
                // Child paths replace the base's entirely, as tsc does.
                settings.paths = paths
                    .into_iter()
                    .map(|(pattern, value)| {
                        let subs = match value {
                            serde_json::Value::Array(items) => items
                                .into_iter()
                                .filter_map(|v| v.as_str().map(str::to_string))
                                .collect(),
                            _ => Vec::new(),
                        };
                        (pattern, subs)
                    })
                    .collect();
            }
        }

        // paths without a baseUrl resolve against the tsconfig directory
        if settings.base_url.is_none() && !settings.paths.is_empty() {
            settings.base_url = Some(dir.to_path_buf());
        }

        Some(settings)
    }
}

/// `extends` accepts a relative path with or without the `.json` suffix.
/// Package-style extends (`@tsconfig/node18`) are not probed - they live in
/// node_modules, which the resolver never follows.
fn resolve_extends(dir: &Path, base: &str) -> PathBuf {
    let mut path = dir.join(base);
    if path.extension().is_none() {
        path.set_extension("json");
    }
    path
}

/// Strip `//` and `/* */` comments plus trailing commas, preserving string
/// literals and their escapes. Comment bytes are blanked to spaces so
/// serde_json error offsets stay meaningful; the trailing-comma pass runs
/// second so a comment between a comma and its closing brace doesn't hide
/// the brace.
pub(crate) fn strip_jsonc(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut stripped = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' {
            stripped.push(b);
            i += 1;
            while i < bytes.len() {
                stripped.push(bytes[i]);
                if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    stripped.push(bytes[i + 1]);
                    i += 2;
                    continue;
                }
                if bytes[i] == b'"' {
                    i += 1;
                    break;
                }
                i += 1;
            }
        } else if b == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            while i < bytes.len() && bytes[i] != b'\n' {
                stripped.push(b' ');
                i += 1;
            }
        } else if b == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
            while i < bytes.len() {
                if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                    stripped.push(b' ');
                    stripped.push(b' ');
                    i += 2;
                    break;
                }
                stripped.push(if bytes[i] == b'\n' { b'\n' } else { b' ' });
                i += 1;
            }
        } else {
            stripped.push(b);
            i += 1;
        }
    }

    // second pass: blank commas whose next significant byte closes a container
    let mut out = stripped.clone();
    let mut i = 0;
    let mut in_string = false;
    while i < out.len() {
        let b = out[i];
        if in_string {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b',' {
            let mut j = i + 1;
            while j < out.len() && (out[j] as char).is_whitespace() {
                j += 1;
            }
            if j < out.len() && (out[j] == b'}' || out[j] == b']') {
                out[i] = b' ';
            }
        }
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

/// Everything the resolver consumes. Assembled by the caller, owned for the
/// duration of one graph build.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Absolute repository root; module resolution refuses to leave it.
    pub root: PathBuf,
    /// Compiler settings (base directory, path aliases).
    pub settings: CompilerSettings,
    /// Synthesize `<external>::` leaf nodes for unresolved bare imports.
    pub include_external: bool,
    /// Verbose diagnostic sink.
    pub diagnostics: Diagnostics,
}

impl ResolverOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings: CompilerSettings::default(),
            include_external: false,
            diagnostics: Diagnostics::disabled(),
        }
    }

    pub fn with_settings(mut self, settings: CompilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_external(mut self, include_external: bool) -> Self {
        self.include_external = include_external;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_and_block_comments() {
        let jsonc = r#"{
            // line comment
            "a": 1, /* block
                       comment */
            "b": "a // not a comment /* still not */"
        }"#;
        let value: serde_json::Value = serde_json::from_str(&strip_jsonc(jsonc)).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], "a // not a comment /* still not */");
    }

    #[test]
    fn strips_trailing_commas() {
        let jsonc = r#"{ "a": [1, 2, 3,], "b": { "c": 1, }, }"#;
        let value: serde_json::Value = serde_json::from_str(&strip_jsonc(jsonc)).unwrap();
        assert_eq!(value["a"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn trailing_comma_hidden_behind_comment() {
        let jsonc = "{ \"a\": 1, // tail\n }";
        let value: serde_json::Value = serde_json::from_str(&strip_jsonc(jsonc)).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn load_from_temp_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tsconfig.base.json"),
            r#"{ "compilerOptions": { "baseUrl": "." } }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{
                // project config
                "extends": "./tsconfig.base",
                "compilerOptions": {
                    "paths": { "@app/*": ["src/*"], },
                },
            }"#,
        )
        .unwrap();

        let settings = CompilerSettings::load(dir.path(), None, &Diagnostics::disabled());
        assert!(settings.base_url.is_some());
        assert_eq!(settings.paths.len(), 1);
        assert_eq!(settings.paths[0].0, "@app/*");
        assert_eq!(settings.paths[0].1, vec!["src/*".to_string()]);
    }

    #[test]
    fn missing_tsconfig_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CompilerSettings::load(dir.path(), None, &Diagnostics::disabled());
        assert!(settings.base_url.is_none());
        assert!(settings.paths.is_empty());
    }
}
