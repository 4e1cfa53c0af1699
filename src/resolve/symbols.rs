//! Symbol resolution: one call site in, one concrete target out.
//!
//! Strategies run in a fixed order and the first hit wins. Named calls try
//! local functions, then imports, then DI defaults; member calls walk a
//! longer cascade ending in constructor-field indirection and object-literal
//! bindings. Export lookups chain through re-exports with a visited set so
//! pathological `a -> b -> a` chains terminate.
//!
//! The resolver owns the lazy parse cache: each file is parsed at most once
//! per build, on first request, and shared as `Arc<ParsedFile>` afterwards.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::config::ResolverOptions;
use crate::graph::FunctionNode;
use crate::parsing::FileParser;
use crate::types::{
    CallSite, DiDefaultMapping, DiTarget, EdgeKind, FieldSource, FunctionId, ImportInfo,
    ParsedFile, ParsedFunction, NAMESPACE_IMPORT,
};

use super::modules::{ModuleResolver, ResolvedModule};

/// A successful resolution: the target node plus how we got there.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub node: FunctionNode,
    pub kind: EdgeKind,
}

impl Resolution {
    pub fn id(&self) -> &FunctionId {
        &self.node.id
    }

    fn relabel(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Where an export lookup landed.
struct ExportHit {
    file: Arc<ParsedFile>,
    qualified: Arc<str>,
    via_reexport: bool,
}

/// Resolves call sites against parsed files, caching parses by absolute path
/// for the lifetime of one graph build.
pub struct SymbolResolver {
    options: ResolverOptions,
    modules: ModuleResolver,
    parser: FileParser,
    cache: HashMap<Arc<str>, Option<Arc<ParsedFile>>>,
}

impl SymbolResolver {
    pub fn new(options: ResolverOptions) -> Self {
        let modules = ModuleResolver::new(&options);
        Self {
            options,
            modules,
            parser: FileParser::new(),
            cache: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Parse a file through the cache. `None` (also cached) marks a file
    /// fault: the file is treated as absent for the rest of the build.
    pub fn parsed(&mut self, path: &str) -> Option<Arc<ParsedFile>> {
        if let Some(entry) = self.cache.get(path) {
            return entry.clone();
        }
        let parsed = self
            .parser
            .parse_path(path, &self.options.diagnostics)
            .map(Arc::new);
        self.cache.insert(Arc::from(path), parsed.clone());
        parsed
    }

    /// Resolve one call site from `caller` in `file`. `None` is a recoverable
    /// resolution fault; a diagnostic names the site when verbose.
    pub fn resolve_call(
        &mut self,
        site: &CallSite,
        file: &ParsedFile,
        caller: &ParsedFunction,
    ) -> Option<Resolution> {
        let resolution = match site {
            CallSite::Named { callee, .. } => self.resolve_named(callee, file, caller),
            CallSite::Member {
                object, property, ..
            } => self.resolve_member(object, property, file, caller),
        };

        if resolution.is_none() && self.options.diagnostics.is_enabled() {
            let caller_name = format!("{}::{}", file.path, caller.qualified);
            let (token, specifier) = match site {
                CallSite::Named { callee, .. } => (
                    callee.to_string(),
                    find_import(file, callee).map(|i| i.specifier.clone()),
                ),
                CallSite::Member {
                    object, property, ..
                } => (
                    format!("{object}.{property}"),
                    find_import(file, object).map(|i| i.specifier.clone()),
                ),
            };
            self.options
                .diagnostics
                .resolution_fault(&caller_name, &token, specifier.as_deref());
        }
        resolution
    }

    // === named calls ===

    fn resolve_named(
        &mut self,
        callee: &str,
        file: &ParsedFile,
        caller: &ParsedFunction,
    ) -> Option<Resolution> {
        // 1. same-file function
        if let Some(function) = file.function(callee) {
            return Some(self.project_resolution(file, function, EdgeKind::Direct));
        }

        // 2. import
        if let Some(import) = find_import(file, callee) {
            let import = import.clone();
            if let Some(resolution) = self.follow_named_import(&import, file) {
                return Some(resolution);
            }
        }

        // 3. DI default: a mapping for this name whose local reference is a
        // *different* identifier (the inequality guard stops the trivial
        // recursion of `deps = { helper }` resolving `helper`).
        for mapping in &caller.di_defaults {
            if mapping.prop != callee {
                continue;
            }
            if let DiTarget::Local(ref local) = mapping.target {
                if local != callee {
                    return self
                        .resolve_named(local, file, caller)
                        .map(|r| r.relabel(EdgeKind::DiDefault));
                }
            }
        }

        None
    }

    /// Follow a non-namespace import to the exported function it names.
    fn follow_named_import(
        &mut self,
        import: &ImportInfo,
        importer: &ParsedFile,
    ) -> Option<Resolution> {
        match self.resolve_module(&import.specifier, importer)? {
            ResolvedModule::Project(path) => {
                let dest = self.parsed(&path)?;
                let hit = self.find_export(dest, &import.imported, &mut HashSet::new())?;
                let function = hit.file.function(&hit.qualified)?.clone();
                let base = self.project_resolution(&hit.file, &function, EdgeKind::Direct);
                Some(if hit.via_reexport {
                    base.relabel(EdgeKind::ReExport)
                } else {
                    base
                })
            }
            ResolvedModule::External(ext_file) => Some(external_resolution(
                ext_file,
                import.imported.clone(),
            )),
        }
    }

    // === member calls ===

    fn resolve_member(
        &mut self,
        object: &str,
        property: &str,
        file: &ParsedFile,
        caller: &ParsedFunction,
    ) -> Option<Resolution> {
        // 1. DI default on (param, prop)
        if let Some(mapping) = caller
            .di_defaults
            .iter()
            .find(|m| m.param == object && m.prop == property)
        {
            let mapping = mapping.clone();
            if let Some(resolution) = self.resolve_di_target(&mapping, file, caller) {
                return Some(resolution.relabel(EdgeKind::DiDefault));
            }
        }

        // 2. namespace import: `ns.member()`
        if let Some(import) = file
            .imports
            .iter()
            .find(|i| i.is_namespace && i.local == object)
        {
            let import = import.clone();
            match self.resolve_module(&import.specifier, file) {
                Some(ResolvedModule::Project(path)) => {
                    if let Some(dest) = self.parsed(&path) {
                        if let Some(hit) = self.find_export(dest, property, &mut HashSet::new()) {
                            if let Some(function) = hit.file.function(&hit.qualified) {
                                let function = function.clone();
                                let base =
                                    self.project_resolution(&hit.file, &function, EdgeKind::Direct);
                                return Some(if hit.via_reexport {
                                    base.relabel(EdgeKind::ReExport)
                                } else {
                                    base
                                });
                            }
                        }
                    }
                }
                Some(ResolvedModule::External(ext_file)) => {
                    return Some(external_resolution(ext_file, property.to_string()));
                }
                None => {}
            }
        }

        // 3. imported identifier: class static or module-object member
        if let Some(import) = find_import(file, object) {
            let import = import.clone();
            match self.resolve_module(&import.specifier, file) {
                Some(ResolvedModule::Project(path)) => {
                    if let Some(dest) = self.parsed(&path) {
                        if let Some(resolution) =
                            self.class_member_resolution(dest.clone(), &import.imported, property)
                        {
                            return Some(resolution);
                        }
                        if let Some(hit) = self.find_export(dest, property, &mut HashSet::new()) {
                            if let Some(function) = hit.file.function(&hit.qualified) {
                                let function = function.clone();
                                let base =
                                    self.project_resolution(&hit.file, &function, EdgeKind::Direct);
                                return Some(if hit.via_reexport {
                                    base.relabel(EdgeKind::ReExport)
                                } else {
                                    base
                                });
                            }
                        }
                    }
                }
                Some(ResolvedModule::External(ext_file)) => {
                    return Some(external_resolution(
                        ext_file,
                        format!("{object}.{property}"),
                    ));
                }
                None => {}
            }
        }

        // 4. instance binding: `x = new ClassName()` earlier in the file
        if let Some(class_name) = file.instance_bindings.get(object) {
            let class_name = class_name.clone();
            if let Some(resolution) = self.resolve_class_method(&class_name, property, file) {
                return Some(resolution.relabel(EdgeKind::InstanceMethod));
            }
        }

        // 5. local class (or façade function emitted under `Obj.prop`)
        let qualified = format!("{object}.{property}");
        if let Some(function) = file.function(&qualified) {
            return Some(self.project_resolution(file, function, EdgeKind::StaticMethod));
        }

        // 6. constructor field indirection: `this._f()` where `_f` was
        // plumbed in through a DI constructor
        if enclosing_class(caller) == Some(object) {
            if let Some(resolution) = self.resolve_constructor_field(object, property, file) {
                return Some(resolution.relabel(EdgeKind::DiDefault));
            }
        }

        // 7. object-literal binding to a different function
        if let Some(bound) = file.object_bindings.get(&qualified) {
            if bound != &qualified {
                if let Some(function) = file.function(bound) {
                    return Some(self.project_resolution(file, function, EdgeKind::StaticMethod));
                }
            }
        }

        None
    }

    /// Resolve `ClassName.property` through imports or the same file. Used by
    /// the instance-binding strategy with the bound class name.
    fn resolve_class_method(
        &mut self,
        class_name: &str,
        property: &str,
        file: &ParsedFile,
    ) -> Option<Resolution> {
        if let Some(import) = find_import(file, class_name) {
            let import = import.clone();
            if let Some(ResolvedModule::Project(path)) =
                self.resolve_module(&import.specifier, file)
            {
                if let Some(dest) = self.parsed(&path) {
                    if let Some(resolution) =
                        self.class_member_resolution(dest, &import.imported, property)
                    {
                        return Some(resolution);
                    }
                }
            }
            return None;
        }
        let qualified = format!("{class_name}.{property}");
        let function = file.function(&qualified)?;
        Some(self.project_resolution(file, function, EdgeKind::StaticMethod))
    }

    /// Strategy 6: look for a constructor field assignment feeding this
    /// property, then resolve through the constructor's DI default or the
    /// recorded local reference.
    fn resolve_constructor_field(
        &mut self,
        class_name: &str,
        property: &str,
        file: &ParsedFile,
    ) -> Option<Resolution> {
        let constructor = file.function(&format!("{class_name}.constructor"))?;
        let assignments = constructor.field_assignments.as_ref()?;
        let assignment = assignments.iter().find(|a| a.field == property)?;

        match &assignment.source {
            FieldSource::ParamProp { param, prop } => {
                let mapping = constructor
                    .di_defaults
                    .iter()
                    .find(|m| &m.param == param && &m.prop == prop)?
                    .clone();
                let constructor = constructor.clone();
                self.resolve_di_target(&mapping, file, &constructor)
            }
            FieldSource::Local(local) => {
                let constructor = constructor.clone();
                self.resolve_named(local, file, &constructor)
            }
        }
    }

    /// Resolve the value a DI default mapping points at.
    fn resolve_di_target(
        &mut self,
        mapping: &DiDefaultMapping,
        file: &ParsedFile,
        caller: &ParsedFunction,
    ) -> Option<Resolution> {
        match &mapping.target {
            DiTarget::Local(local) => self.resolve_named(local, file, caller),
            DiTarget::Member { object, member } => {
                // the referenced object goes through an import: class method
                // first, then a plain export of the member's name
                if let Some(import) = find_import(file, object) {
                    let import = import.clone();
                    match self.resolve_module(&import.specifier, file) {
                        Some(ResolvedModule::Project(path)) => {
                            let dest = self.parsed(&path)?;
                            if let Some(resolution) =
                                self.class_member_resolution(dest.clone(), &import.imported, member)
                            {
                                return Some(resolution);
                            }
                            let hit = self.find_export(dest, member, &mut HashSet::new())?;
                            let function = hit.file.function(&hit.qualified)?.clone();
                            return Some(self.project_resolution(
                                &hit.file,
                                &function,
                                EdgeKind::Direct,
                            ));
                        }
                        Some(ResolvedModule::External(ext_file)) => {
                            return Some(external_resolution(
                                ext_file,
                                format!("{object}.{member}"),
                            ));
                        }
                        None => return None,
                    }
                }
                // same-file class or façade
                let qualified = format!("{object}.{member}");
                let function = file.function(&qualified)?;
                Some(self.project_resolution(file, function, EdgeKind::StaticMethod))
            }
        }
    }

    // === export lookups ===

    /// Find an export by name, chaining re-exports with a visited set.
    fn find_export(
        &mut self,
        file: Arc<ParsedFile>,
        name: &str,
        visited: &mut HashSet<(Arc<str>, String)>,
    ) -> Option<ExportHit> {
        if !visited.insert((file.path.clone(), name.to_string())) {
            return None;
        }

        // re-export chain first: `export { a as b } from './mod'`
        if let Some(re_export) = file
            .re_exports
            .iter()
            .find(|r| r.exported == name && r.exported != NAMESPACE_IMPORT)
        {
            let re_export = re_export.clone();
            if let Some(ResolvedModule::Project(path)) =
                self.resolve_module(&re_export.specifier, &file)
            {
                if let Some(next) = self.parsed(&path) {
                    if let Some(hit) = self.find_export(next, &re_export.imported, visited) {
                        return Some(ExportHit {
                            via_reexport: true,
                            ..hit
                        });
                    }
                }
            }
            return None;
        }

        let local = file.exported_names.get(name)?;
        let function = file.function(local)?;
        Some(ExportHit {
            qualified: function.qualified.clone(),
            via_reexport: false,
            file,
        })
    }

    /// Find `exportedClass.member` in a destination file, following
    /// re-exports of the class name and falling back to object-literal
    /// bindings when the "class" is really a façade.
    fn class_member_resolution(
        &mut self,
        file: Arc<ParsedFile>,
        class_export_name: &str,
        member: &str,
    ) -> Option<Resolution> {
        let (dest, local) =
            self.follow_class_reexports(file, class_export_name, &mut HashSet::new())?;

        let qualified = format!("{local}.{member}");
        if let Some(function) = dest.function(&qualified) {
            let function = function.clone();
            return Some(self.project_resolution(&dest, &function, EdgeKind::StaticMethod));
        }
        if let Some(bound) = dest.object_bindings.get(&qualified) {
            if let Some(function) = dest.function(bound) {
                let function = function.clone();
                return Some(self.project_resolution(&dest, &function, EdgeKind::StaticMethod));
            }
        }
        None
    }

    /// Resolve the local name an exported class (or façade) has in the file
    /// that actually declares it.
    fn follow_class_reexports(
        &mut self,
        file: Arc<ParsedFile>,
        name: &str,
        visited: &mut HashSet<(Arc<str>, String)>,
    ) -> Option<(Arc<ParsedFile>, String)> {
        if !visited.insert((file.path.clone(), name.to_string())) {
            return None;
        }
        if let Some(re_export) = file
            .re_exports
            .iter()
            .find(|r| r.exported == name && r.exported != NAMESPACE_IMPORT)
        {
            let re_export = re_export.clone();
            if let Some(ResolvedModule::Project(path)) =
                self.resolve_module(&re_export.specifier, &file)
            {
                let next = self.parsed(&path)?;
                return self.follow_class_reexports(next, &re_export.imported, visited);
            }
            return None;
        }
        let local = file.exported_names.get(name)?.clone();
        Some((file, local))
    }

    // === construction helpers ===

    fn resolve_module(&mut self, specifier: &str, importer: &ParsedFile) -> Option<ResolvedModule> {
        self.modules
            .resolve(specifier, Path::new(importer.path.as_ref()))
    }

    /// The graph node for a parsed project function.
    pub fn function_node(&self, file: &ParsedFile, function: &ParsedFunction) -> FunctionNode {
        FunctionNode {
            id: FunctionId::new(file.path.clone(), function.qualified.clone()),
            line: function.start_line,
            end_line: Some(function.end_line),
            is_instrumented: function.is_instrumented,
            is_external: false,
            description: function.description.clone(),
            signature: function.signature.clone(),
        }
    }

    /// Build a resolution for a project function. A direct edge landing on an
    /// instrumented function is relabeled as an instrument-wrapper edge.
    fn project_resolution(
        &self,
        file: &ParsedFile,
        function: &ParsedFunction,
        kind: EdgeKind,
    ) -> Resolution {
        let node = self.function_node(file, function);
        let kind = if kind == EdgeKind::Direct && function.is_instrumented {
            EdgeKind::InstrumentWrapper
        } else {
            kind
        };
        Resolution { node, kind }
    }
}

fn external_resolution(ext_file: Arc<str>, qualified: String) -> Resolution {
    Resolution {
        node: FunctionNode::external(ext_file, qualified),
        kind: EdgeKind::External,
    }
}

fn find_import<'f>(file: &'f ParsedFile, local: &str) -> Option<&'f ImportInfo> {
    file.imports
        .iter()
        .find(|i| !i.is_namespace && i.local == local)
}

/// The class a method belongs to, from its qualified name.
fn enclosing_class(function: &ParsedFunction) -> Option<&str> {
    let qualified = function.qualified.as_ref();
    if qualified == crate::types::MODULE_SCOPE {
        return None;
    }
    qualified.split_once('.').map(|(class, _)| class)
}
