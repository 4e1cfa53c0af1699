//! Selector syntax: how users name source and target functions.
//!
//! Three forms, resolved against the repository root:
//! - `path/to/file` - every function in the file;
//! - `path/to/file::name` - one function;
//! - `path/to/file::a|b|C.method` - several, pipe-separated.
//!
//! Qualified names that land on an object-literal façade binding are
//! normalized to the function the binding references, so `Obj.prop`
//! selectors behave like the call sites that use them.

use std::path::{Path, PathBuf};

use crate::error::{Fault, Result};
use crate::resolve::SymbolResolver;
use crate::types::FunctionId;

/// One parsed selector, not yet expanded against the file's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Absolute, canonicalized file path.
    pub path: PathBuf,
    /// Qualified names; empty means every function in the file.
    pub names: Vec<String>,
}

/// Parse one selector string. The file must exist under the repository root.
pub fn parse_selector(input: &str, root: &Path) -> Result<Selector> {
    let (raw_path, names) = match input.split_once("::") {
        Some((path, names)) => (
            path,
            names
                .split('|')
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        None => (input, Vec::new()),
    };

    let joined = if Path::new(raw_path).is_absolute() {
        PathBuf::from(raw_path)
    } else {
        root.join(raw_path)
    };
    let path = joined.canonicalize().map_err(|err| Fault::SelectedFileUnreadable {
        path: joined.clone(),
        message: err.to_string(),
    })?;

    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    if !path.starts_with(&canonical_root) {
        return Err(Fault::SelectorOutsideRoot { path });
    }

    Ok(Selector { path, names })
}

/// Expand a selector into function ids, parsing the file through the
/// resolver's cache. A file that fails to parse is a fatal selection error -
/// unlike files met during traversal, the user asked for this one by name.
pub fn expand(selector: &Selector, resolver: &mut SymbolResolver) -> Result<Vec<FunctionId>> {
    let path_str = selector.path.display().to_string();
    let file = resolver.parsed(&path_str).ok_or_else(|| Fault::SelectedFileUnreadable {
        path: selector.path.clone(),
        message: "file did not parse".to_string(),
    })?;

    let ids = if selector.names.is_empty() {
        file.functions
            .iter()
            .map(|f| FunctionId::new(file.path.clone(), f.qualified.clone()))
            .collect()
    } else {
        selector
            .names
            .iter()
            .map(|name| {
                // façade selectors normalize to the bound function
                let qualified = file
                    .object_bindings
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| name.clone());
                FunctionId::new(file.path.clone(), qualified)
            })
            .collect()
    };
    Ok(ids)
}

/// Parse and expand a batch of selector strings.
pub fn expand_all(
    inputs: &[String],
    root: &Path,
    resolver: &mut SymbolResolver,
) -> Result<Vec<FunctionId>> {
    let mut ids = Vec::new();
    for input in inputs {
        let selector = parse_selector(input, root)?;
        ids.extend(expand(&selector, resolver)?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverOptions;

    fn project() -> (tempfile::TempDir, SymbolResolver) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/lib.ts"),
            r#"
export function alpha() { beta(); }
export function beta() {}
export class Svc {
  run() {}
}
const Facade = Object.freeze({ alpha });
"#,
        )
        .unwrap();
        let resolver = SymbolResolver::new(ResolverOptions::new(dir.path()));
        (dir, resolver)
    }

    #[test]
    fn bare_path_selects_every_function() {
        let (dir, mut resolver) = project();
        let ids = expand_all(
            &["src/lib.ts".to_string()],
            dir.path(),
            &mut resolver,
        )
        .unwrap();
        let names: Vec<&str> = ids.iter().map(|id| id.qualified.as_ref()).collect();
        assert!(names.contains(&"alpha"));
        assert!(names.contains(&"beta"));
        assert!(names.contains(&"Svc.run"));
    }

    #[test]
    fn pipe_separated_names() {
        let (dir, mut resolver) = project();
        let ids = expand_all(
            &["src/lib.ts::alpha|Svc.run".to_string()],
            dir.path(),
            &mut resolver,
        )
        .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].qualified.as_ref(), "alpha");
        assert_eq!(ids[1].qualified.as_ref(), "Svc.run");
    }

    #[test]
    fn facade_selector_normalizes() {
        let (dir, mut resolver) = project();
        let ids = expand_all(
            &["src/lib.ts::Facade.alpha".to_string()],
            dir.path(),
            &mut resolver,
        )
        .unwrap();
        assert_eq!(ids[0].qualified.as_ref(), "alpha");
    }

    #[test]
    fn missing_file_is_fatal() {
        let (dir, mut resolver) = project();
        let err = expand_all(
            &["src/ghost.ts::x".to_string()],
            dir.path(),
            &mut resolver,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost.ts"));
    }

    #[test]
    fn escaping_the_root_is_rejected() {
        let (dir, _resolver) = project();
        let outside = tempfile::NamedTempFile::new().unwrap();
        let err = parse_selector(&outside.path().display().to_string(), dir.path()).unwrap_err();
        assert!(matches!(err, Fault::SelectorOutsideRoot { .. }));
    }
}
