//! Module resolution: map a specifier from an importing file to an absolute
//! path inside the project, or reject it.
//!
//! Order of attack mirrors the compiler's behavior closely enough for a
//! syntactic tool: configured aliases and baseUrl first, then plain relative
//! probing over the usual extensions and `index.*` files. Anything that
//! escapes the repository root or lands in a package-manager install
//! directory is rejected - unless a symlink carries it back inside the tree,
//! which is how monorepo workspace links show up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ResolverOptions;
use crate::types::EXTERNAL_PREFIX;

/// Extensions probed, in priority order, for extensionless specifiers.
const PROBE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Directory names that classify a resolved file as an external install.
const INSTALL_DIRS: &[&str] = &["node_modules", ".pnpm", ".yarn"];

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedModule {
    /// A concrete project file, canonicalized and absolute.
    Project(Arc<str>),
    /// A synthetic `<external>::specifier` descriptor. Never parsed, never
    /// expanded.
    External(Arc<str>),
}

/// Resolves module specifiers under one project's settings.
#[derive(Debug)]
pub struct ModuleResolver {
    root: PathBuf,
    base_url: Option<PathBuf>,
    /// (pattern, substitutions) in declaration order. One `*` per pattern.
    paths: Vec<(String, Vec<String>)>,
    include_external: bool,
}

impl ModuleResolver {
    pub fn new(options: &ResolverOptions) -> Self {
        Self {
            root: options
                .root
                .canonicalize()
                .unwrap_or_else(|_| options.root.clone()),
            base_url: options.settings.base_url.clone(),
            paths: options.settings.paths.clone(),
            include_external: options.include_external,
        }
    }

    /// Resolve `specifier` as imported from `importer` (an absolute path).
    ///
    /// A candidate that resolves but fails the containment check is treated
    /// as unresolved, so a bare specifier landing in an install directory
    /// can still upgrade to an external descriptor.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Option<ResolvedModule> {
        // 1. project configuration: path aliases, then baseUrl
        if let Some(found) = self.resolve_aliased(specifier) {
            if let Some(admitted) = self.admit(found) {
                return Some(admitted);
            }
        }
        if !is_relative(specifier) && !Path::new(specifier).is_absolute() {
            if let Some(ref base) = self.base_url {
                if let Some(found) = probe(&base.join(specifier)) {
                    if let Some(admitted) = self.admit(found) {
                        return Some(admitted);
                    }
                }
            }
        }

        // 2. relative (and absolute) specifiers probe the filesystem directly
        if is_relative(specifier) {
            let dir = importer.parent().unwrap_or(Path::new("."));
            if let Some(found) = probe(&dir.join(specifier)) {
                if let Some(admitted) = self.admit(found) {
                    return Some(admitted);
                }
            }
        } else if Path::new(specifier).is_absolute() {
            if let Some(found) = probe(Path::new(specifier)) {
                if let Some(admitted) = self.admit(found) {
                    return Some(admitted);
                }
            }
        }

        // 3. unresolved: optionally upgrade bare package names to externals
        if self.include_external && !is_relative(specifier) && !Path::new(specifier).is_absolute() {
            return Some(ResolvedModule::External(
                format!("{EXTERNAL_PREFIX}{specifier}").into(),
            ));
        }
        None
    }

    /// Try each configured alias pattern in order.
    fn resolve_aliased(&self, specifier: &str) -> Option<PathBuf> {
        let base = self.base_url.as_ref()?;
        for (pattern, substitutions) in &self.paths {
            let Some(captured) = match_alias(pattern, specifier) else {
                continue;
            };
            for substitution in substitutions {
                let target = match captured {
                    Some(ref tail) => substitution.replacen('*', tail, 1),
                    None => substitution.clone(),
                };
                if let Some(found) = probe(&base.join(target)) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Containment check: a resolved file must live inside the project tree
    /// and outside any install directory. Symlinks are followed first, which
    /// is what admits monorepo workspace links.
    fn admit(&self, path: PathBuf) -> Option<ResolvedModule> {
        let canonical = path.canonicalize().ok()?;
        if !canonical.starts_with(&self.root) {
            return None;
        }
        let inside_install = canonical.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|name| INSTALL_DIRS.contains(&name))
        });
        if inside_install {
            return None;
        }
        Some(ResolvedModule::Project(
            canonical.to_string_lossy().into_owned().into(),
        ))
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".."
}

/// Match a tsconfig alias pattern against a specifier.
///
/// Returns `None` on mismatch; `Some(None)` for an exact (starless) match;
/// `Some(Some(tail))` with the text the `*` captured.
fn match_alias(pattern: &str, specifier: &str) -> Option<Option<String>> {
    match pattern.split_once('*') {
        None => (pattern == specifier).then_some(None),
        Some((prefix, suffix)) => {
            if specifier.len() >= prefix.len() + suffix.len()
                && specifier.starts_with(prefix)
                && specifier.ends_with(suffix)
            {
                let tail = &specifier[prefix.len()..specifier.len() - suffix.len()];
                Some(Some(tail.to_string()))
            } else {
                None
            }
        }
    }
}

/// Probe a path: as-is if it's a file, then with each extension, then as a
/// directory holding an `index.*`.
fn probe(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(candidate.to_path_buf());
    }
    for ext in PROBE_EXTENSIONS {
        let with_ext = PathBuf::from(format!("{}.{ext}", candidate.display()));
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }
    if candidate.is_dir() {
        for ext in PROBE_EXTENSIONS {
            let index = candidate.join(format!("index.{ext}"));
            if index.is_file() {
                return Some(index);
            }
        }
    }
    None
}
