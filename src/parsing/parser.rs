//! Tree-sitter based file parser: one TypeScript/TSX source file in, one
//! [`ParsedFile`] out.
//!
//! The parser makes a single pass over the top-level scope, recording every
//! function-like declaration it understands: named functions, arrow/function
//! initializers, class members and function-valued class fields, and the
//! members of object-literal façades. Call sites are collected per function
//! body with one deliberate exception to the scope rule: arrow and function
//! expressions passed as *arguments* to a call are treated as continuations
//! of the enclosing body, so callbacks inside `.map`, `.forEach`, schedulers
//! and the like still contribute edges to their caller.
//!
//! A parse error or unreadable file is a recoverable fault: callers get
//! `None` and treat the file as absent.

use once_cell::sync::Lazy;
use tree_sitter::{Language, Node, Parser as TsParser};

use crate::error::Diagnostics;
use crate::types::{
    CallSite, DiDefaultMapping, DiTarget, FieldAssignment, FieldSource, ImportInfo, ParsedFile,
    ParsedFunction, ReExportInfo, DEFAULT_EXPORT, MODULE_SCOPE, NAMESPACE_IMPORT,
};

use super::doc::doc_description;

/// Sentinel identifier of the wrapper-style instrumentation helper.
const INSTRUMENT_FN: &str = "instrumentFn";
/// Sentinel identifier of the in-place class instrumentation marker.
const INSTRUMENT_IN_PLACE: &str = "instrumentOwnMethodsInPlace";

static TS_LANGUAGE: Lazy<Language> =
    Lazy::new(|| tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into());
static TSX_LANGUAGE: Lazy<Language> = Lazy::new(|| tree_sitter_typescript::LANGUAGE_TSX.into());

/// File parser. Owns one tree-sitter parser instance; not thread-safe, which
/// matches the single-writer cache discipline of the resolver.
pub struct FileParser {
    parser: TsParser,
}

impl FileParser {
    pub fn new() -> Self {
        Self {
            parser: TsParser::new(),
        }
    }

    /// Read and parse a file. `None` means the file is to be treated as
    /// absent; a diagnostic explains why.
    pub fn parse_path(&mut self, path: &str, diagnostics: &Diagnostics) -> Option<ParsedFile> {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(err) => {
                diagnostics.file_fault(path, &err.to_string());
                return None;
            }
        };
        self.parse_source(path, &source, diagnostics)
    }

    /// Parse source text already in memory.
    pub fn parse_source(
        &mut self,
        path: &str,
        source: &str,
        diagnostics: &Diagnostics,
    ) -> Option<ParsedFile> {
        let language: &Language = if path.ends_with(".tsx") || path.ends_with(".jsx") {
            &TSX_LANGUAGE
        } else {
            &TS_LANGUAGE
        };
        if self.parser.set_language(language).is_err() {
            diagnostics.file_fault(path, "grammar unavailable");
            return None;
        }

        let tree = match self.parser.parse(source, None) {
            Some(t) => t,
            None => {
                diagnostics.file_fault(path, "parse failed");
                return None;
            }
        };

        let mut walk = FileWalk {
            source,
            file: ParsedFile {
                path: path.into(),
                ..Default::default()
            },
            module_calls: Vec::new(),
            instrumented_classes: Vec::new(),
        };
        walk.program(tree.root_node());
        Some(walk.finish(source))
    }
}

impl Default for FileParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Export context of a top-level statement.
#[derive(Clone, Copy, PartialEq)]
enum Exported {
    No,
    Named,
    Default,
}

/// One walk over one file. Accumulates into `file` and applies the in-place
/// instrumentation markers at the end.
struct FileWalk<'s> {
    source: &'s str,
    file: ParsedFile,
    module_calls: Vec<CallSite>,
    instrumented_classes: Vec<String>,
}

impl<'s> FileWalk<'s> {
    fn text(&self, node: Node) -> &'s str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn line(node: Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    fn end_line(node: Node) -> u32 {
        node.end_position().row as u32 + 1
    }

    /// Qualified names are unique within a file; first declaration wins.
    fn push_function(&mut self, function: ParsedFunction) {
        if self.file.function(&function.qualified).is_none() {
            self.file.functions.push(function);
        }
    }

    fn program(&mut self, root: Node) {
        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            self.statement(statement, Exported::No);
        }
    }

    fn statement(&mut self, node: Node, exported: Exported) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                self.function_declaration(node, exported);
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.class_declaration(node, exported);
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                for declarator in node.named_children(&mut cursor) {
                    if declarator.kind() == "variable_declarator" {
                        self.declarator(node, declarator, exported);
                    }
                }
            }
            "import_statement" => self.import_statement(node),
            "export_statement" => self.export_statement(node),
            "expression_statement" => self.top_level_expression(node),
            _ => {}
        }
    }

    // === declarations ===

    fn function_declaration(&mut self, node: Node, exported: Exported) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let mut function = ParsedFunction::new(name.clone(), Self::line(node), Self::end_line(node));
        function.signature = self.signature_of(node);
        function.description = self.doc_of(node);
        if let Some(params) = node.child_by_field_name("parameters") {
            function.di_defaults = self.di_defaults(params);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, None, &mut function.calls);
        }
        self.push_function(function);
        self.record_export(&name, exported);
    }

    /// `const x = …` and friends. The initializer decides what `x` becomes:
    /// a function, an instrumented function, a façade, or an instance
    /// binding.
    fn declarator(&mut self, declaration: Node, declarator: Node, exported: Exported) {
        let Some(name_node) = declarator.child_by_field_name("name") else {
            return;
        };
        if name_node.kind() != "identifier" {
            return; // destructuring declarations are not function bindings
        }
        let name = self.text(name_node).to_string();
        let Some(value) = declarator.child_by_field_name("value") else {
            return;
        };

        self.bind_value(&name, value, declaration, exported);
    }

    /// Shared between declarators and `x = …` assignment statements.
    fn bind_value(&mut self, name: &str, value: Node, anchor: Node, exported: Exported) {
        let value = unwrap_expression(value);
        match value.kind() {
            "arrow_function" | "function_expression" | "generator_function" => {
                let mut function =
                    ParsedFunction::new(name.to_string(), Self::line(anchor), Self::end_line(anchor));
                function.signature = self.signature_of(value);
                function.description = self.doc_of(anchor);
                if let Some(params) = self.parameters_of(value) {
                    function.di_defaults = self.di_defaults(params);
                }
                self.collect_body_calls(value, None, &mut function.calls);
                self.push_function(function);
                self.record_export(name, exported);
            }
            "call_expression" => {
                if let Some(inner) = self.instrument_wrapped(value) {
                    let mut function = ParsedFunction::new(
                        name.to_string(),
                        Self::line(anchor),
                        Self::end_line(anchor),
                    );
                    function.is_instrumented = true;
                    function.signature = self.signature_of(inner);
                    function.description = self.doc_of(anchor);
                    if let Some(params) = self.parameters_of(inner) {
                        function.di_defaults = self.di_defaults(params);
                    }
                    self.collect_body_calls(inner, None, &mut function.calls);
                    self.push_function(function);
                    self.record_export(name, exported);
                } else if let Some(object) = self.facade_object(value) {
                    // Object.freeze({ … })
                    self.facade(name, object);
                    self.record_export(name, exported);
                }
            }
            "object" => {
                self.facade(name, value);
                self.record_export(name, exported);
            }
            "new_expression" => {
                if let Some(ctor) = value.child_by_field_name("constructor") {
                    if ctor.kind() == "identifier" {
                        self.file
                            .instance_bindings
                            .insert(name.to_string(), self.text(ctor).to_string());
                    }
                }
            }
            _ => {}
        }
    }

    /// Object-literal façade: emit property bindings and inline functions.
    fn facade(&mut self, obj_name: &str, object: Node) {
        let mut cursor = object.walk();
        for entry in object.named_children(&mut cursor) {
            match entry.kind() {
                "pair" => {
                    let Some(key) = entry.child_by_field_name("key") else {
                        continue;
                    };
                    if key.kind() == "computed_property_name" {
                        continue;
                    }
                    let prop = self.text(key).trim_matches(['"', '\'']).to_string();
                    let qualified = format!("{obj_name}.{prop}");
                    let Some(value) = entry.child_by_field_name("value") else {
                        continue;
                    };
                    match value.kind() {
                        "identifier" => {
                            self.file
                                .object_bindings
                                .insert(qualified, self.text(value).to_string());
                        }
                        "arrow_function" | "function_expression" | "generator_function" => {
                            let mut function = ParsedFunction::new(
                                qualified.clone(),
                                Self::line(entry),
                                Self::end_line(entry),
                            );
                            function.signature = self.signature_of(value);
                            function.description = self.doc_of(entry);
                            if let Some(params) = self.parameters_of(value) {
                                function.di_defaults = self.di_defaults(params);
                            }
                            self.collect_body_calls(value, None, &mut function.calls);
                            self.push_function(function);
                            self.file.object_bindings.insert(qualified.clone(), qualified);
                        }
                        _ => {}
                    }
                }
                "shorthand_property_identifier" => {
                    let prop = self.text(entry).to_string();
                    self.file
                        .object_bindings
                        .insert(format!("{obj_name}.{prop}"), prop);
                }
                "method_definition" => {
                    let Some(name_node) = entry.child_by_field_name("name") else {
                        continue;
                    };
                    let prop = self.text(name_node).to_string();
                    let qualified = format!("{obj_name}.{prop}");
                    let mut function = ParsedFunction::new(
                        qualified.clone(),
                        Self::line(entry),
                        Self::end_line(entry),
                    );
                    function.signature = self.signature_of(entry);
                    function.description = self.doc_of(entry);
                    if let Some(params) = entry.child_by_field_name("parameters") {
                        function.di_defaults = self.di_defaults(params);
                    }
                    if let Some(body) = entry.child_by_field_name("body") {
                        self.collect_calls(body, None, &mut function.calls);
                    }
                    self.push_function(function);
                    self.file.object_bindings.insert(qualified.clone(), qualified);
                }
                // spread entries and comments carry no bindings
                _ => {}
            }
        }
    }

    fn class_declaration(&mut self, node: Node, exported: Exported) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let class_name = self.text(name_node).to_string();
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };

        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_definition" => self.class_method(&class_name, member),
                "public_field_definition" => self.class_field(&class_name, member),
                _ => {}
            }
        }
        self.record_export(&class_name, exported);
    }

    fn class_method(&mut self, class_name: &str, member: Node) {
        let Some(name_node) = member.child_by_field_name("name") else {
            return;
        };
        let raw_name = self.text(name_node);
        let is_constructor = raw_name == "constructor";

        // accessors keep their keyword in the qualified name: `get value`
        let mut accessor_prefix = "";
        let mut cursor = member.walk();
        for child in member.children(&mut cursor) {
            match child.kind() {
                "get" => accessor_prefix = "get ",
                "set" => accessor_prefix = "set ",
                _ => {}
            }
        }

        let qualified = format!("{class_name}.{accessor_prefix}{raw_name}");
        let mut function =
            ParsedFunction::new(qualified, Self::line(member), Self::end_line(member));
        function.description = self.doc_of(member);
        if !is_constructor {
            function.signature = self.signature_of(member);
        }
        if let Some(params) = member.child_by_field_name("parameters") {
            function.di_defaults = self.di_defaults(params);
        }
        if let Some(body) = member.child_by_field_name("body") {
            self.collect_calls(body, Some(class_name), &mut function.calls);
            if is_constructor {
                function.field_assignments = Some(self.field_assignments(body));
            }
        }
        self.push_function(function);
    }

    /// `field = (…) => { … }` class properties become `Class.field`.
    fn class_field(&mut self, class_name: &str, member: Node) {
        let Some(name_node) = member.child_by_field_name("name") else {
            return;
        };
        let Some(value) = member.child_by_field_name("value") else {
            return;
        };
        if !matches!(
            value.kind(),
            "arrow_function" | "function_expression" | "generator_function"
        ) {
            return;
        }
        let qualified = format!("{class_name}.{}", self.text(name_node));
        let mut function =
            ParsedFunction::new(qualified, Self::line(member), Self::end_line(member));
        function.signature = self.signature_of(value);
        function.description = self.doc_of(member);
        if let Some(params) = self.parameters_of(value) {
            function.di_defaults = self.di_defaults(params);
        }
        self.collect_body_calls(value, Some(class_name), &mut function.calls);
        self.push_function(function);
    }

    // === imports and exports ===

    fn import_statement(&mut self, node: Node) {
        let Some(specifier) = self.string_source(node) else {
            return;
        };

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }
            let mut clause_cursor = child.walk();
            for part in child.named_children(&mut clause_cursor) {
                match part.kind() {
                    "identifier" => {
                        // default import
                        self.file.imports.push(ImportInfo {
                            local: self.text(part).to_string(),
                            imported: DEFAULT_EXPORT.to_string(),
                            specifier: specifier.clone(),
                            is_namespace: false,
                        });
                    }
                    "namespace_import" => {
                        let mut ns_cursor = part.walk();
                        for ns_child in part.named_children(&mut ns_cursor) {
                            if ns_child.kind() == "identifier" {
                                self.file.imports.push(ImportInfo {
                                    local: self.text(ns_child).to_string(),
                                    imported: NAMESPACE_IMPORT.to_string(),
                                    specifier: specifier.clone(),
                                    is_namespace: true,
                                });
                            }
                        }
                    }
                    "named_imports" => {
                        let mut named_cursor = part.walk();
                        for spec in part.named_children(&mut named_cursor) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let name = spec
                                .child_by_field_name("name")
                                .map(|n| self.text(n).to_string());
                            let alias = spec
                                .child_by_field_name("alias")
                                .map(|n| self.text(n).to_string());
                            if let Some(name) = name {
                                self.file.imports.push(ImportInfo {
                                    local: alias.unwrap_or_else(|| name.clone()),
                                    imported: name,
                                    specifier: specifier.clone(),
                                    is_namespace: false,
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn export_statement(&mut self, node: Node) {
        let has_default = {
            let mut found = false;
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "default" {
                    found = true;
                }
            }
            found
        };

        // export (default)? <declaration>
        if let Some(declaration) = node.child_by_field_name("declaration") {
            let exported = if has_default {
                Exported::Default
            } else {
                Exported::Named
            };
            self.statement(declaration, exported);
            return;
        }

        // export default <expression>
        if let Some(value) = node.child_by_field_name("value") {
            self.default_export_value(value, node);
            return;
        }

        let source = self.string_source(node);

        // export * from 'mod'
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "*" {
                if let Some(ref specifier) = source {
                    self.file.re_exports.push(ReExportInfo {
                        exported: NAMESPACE_IMPORT.to_string(),
                        imported: NAMESPACE_IMPORT.to_string(),
                        specifier: specifier.clone(),
                    });
                }
                return;
            }
        }

        // export { a, b as c } [from 'mod']
        let mut clause_cursor = node.walk();
        for child in node.named_children(&mut clause_cursor) {
            if child.kind() != "export_clause" {
                continue;
            }
            let mut spec_cursor = child.walk();
            for spec in child.named_children(&mut spec_cursor) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let Some(name_node) = spec.child_by_field_name("name") else {
                    continue;
                };
                let name = self.text(name_node).to_string();
                let exported = spec
                    .child_by_field_name("alias")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_else(|| name.clone());

                match source {
                    Some(ref specifier) => {
                        self.file.re_exports.push(ReExportInfo {
                            exported: exported.clone(),
                            imported: name,
                            specifier: specifier.clone(),
                        });
                        self.file.exported_names.insert(exported.clone(), exported);
                    }
                    None => {
                        self.file.exported_names.insert(exported, name);
                    }
                }
            }
        }
    }

    /// `export default <expr>`: identifier, façade object, function, or an
    /// instrumentation wrapper. Anonymous values live under the local name
    /// `default`.
    fn default_export_value(&mut self, value: Node, anchor: Node) {
        let value = unwrap_expression(value);
        match value.kind() {
            "identifier" => {
                self.file
                    .exported_names
                    .insert(DEFAULT_EXPORT.to_string(), self.text(value).to_string());
            }
            "object" => {
                self.facade(DEFAULT_EXPORT, value);
                self.file
                    .exported_names
                    .insert(DEFAULT_EXPORT.to_string(), DEFAULT_EXPORT.to_string());
            }
            "arrow_function" | "function_expression" | "generator_function" => {
                self.bind_value(DEFAULT_EXPORT, value, anchor, Exported::No);
                self.file
                    .exported_names
                    .insert(DEFAULT_EXPORT.to_string(), DEFAULT_EXPORT.to_string());
            }
            "call_expression" => {
                if self.instrument_wrapped(value).is_some() {
                    self.bind_value(DEFAULT_EXPORT, value, anchor, Exported::No);
                    self.file
                        .exported_names
                        .insert(DEFAULT_EXPORT.to_string(), DEFAULT_EXPORT.to_string());
                } else if let Some(object) = self.facade_object(value) {
                    self.facade(DEFAULT_EXPORT, object);
                    self.file
                        .exported_names
                        .insert(DEFAULT_EXPORT.to_string(), DEFAULT_EXPORT.to_string());
                }
            }
            _ => {}
        }
    }

    fn record_export(&mut self, local: &str, exported: Exported) {
        match exported {
            Exported::No => {}
            Exported::Named => {
                self.file
                    .exported_names
                    .insert(local.to_string(), local.to_string());
            }
            Exported::Default => {
                self.file
                    .exported_names
                    .insert(local.to_string(), local.to_string());
                self.file
                    .exported_names
                    .insert(DEFAULT_EXPORT.to_string(), local.to_string());
            }
        }
    }

    /// The `source` field of an import/export statement, unquoted.
    fn string_source(&self, node: Node) -> Option<String> {
        let source = node.child_by_field_name("source")?;
        Some(self.text(source).trim_matches(['"', '\'', '`']).to_string())
    }

    // === top-level expressions ===

    fn top_level_expression(&mut self, statement: Node) {
        // `x = {…}` / `x = new K()` assignments at the top level bind names
        let mut cursor = statement.walk();
        for child in statement.named_children(&mut cursor) {
            if child.kind() == "assignment_expression" {
                if let (Some(left), Some(right)) = (
                    child.child_by_field_name("left"),
                    child.child_by_field_name("right"),
                ) {
                    if left.kind() == "identifier" {
                        let name = self.text(left).to_string();
                        self.bind_value(&name, right, statement, Exported::No);
                    }
                }
            }
        }

        // instrumentOwnMethodsInPlace(ClassName) marks a whole class
        if let Some(class_name) = self.in_place_marker(statement) {
            self.instrumented_classes.push(class_name);
        }

        // every call under this statement belongs to the module scope
        let mut calls = Vec::new();
        self.collect_calls(statement, None, &mut calls);
        self.module_calls.extend(calls);
    }

    fn in_place_marker(&self, statement: Node) -> Option<String> {
        let mut cursor = statement.walk();
        for child in statement.named_children(&mut cursor) {
            if child.kind() != "call_expression" {
                continue;
            }
            let callee = child.child_by_field_name("function")?;
            if callee.kind() == "identifier" && self.text(callee) == INSTRUMENT_IN_PLACE {
                let args = child.child_by_field_name("arguments")?;
                let mut args_cursor = args.walk();
                for arg in args.named_children(&mut args_cursor) {
                    if arg.kind() == "identifier" {
                        return Some(self.text(arg).to_string());
                    }
                }
            }
        }
        None
    }

    // === call-site extraction ===

    /// Collect calls inside a function-like node's body.
    fn collect_body_calls(
        &self,
        function: Node,
        enclosing_class: Option<&str>,
        out: &mut Vec<CallSite>,
    ) {
        if let Some(body) = function.child_by_field_name("body") {
            self.collect_calls(body, enclosing_class, out);
        }
    }

    /// The body walker. Refuses to descend into nested function or class
    /// declarations (new scopes), but follows arrow/function expressions
    /// passed as call arguments - the continuation rule.
    fn collect_calls(&self, node: Node, enclosing_class: Option<&str>, out: &mut Vec<CallSite>) {
        match node.kind() {
            "call_expression" => {
                if let Some(callee) = node.child_by_field_name("function") {
                    self.record_call(node, callee, enclosing_class, out);
                    // chained calls hide in the callee subtree: `foo().bar()`
                    self.collect_calls(callee, enclosing_class, out);
                }
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.collect_argument_calls(args, enclosing_class, out);
                }
            }
            "new_expression" => {
                if let Some(ctor) = node.child_by_field_name("constructor") {
                    if ctor.kind() == "identifier" {
                        out.push(CallSite::Member {
                            object: self.text(ctor).into(),
                            property: "constructor".into(),
                            line: Self::line(node),
                        });
                    }
                }
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.collect_argument_calls(args, enclosing_class, out);
                }
            }
            // new scopes: call sites inside belong to the nested entity
            "function_declaration"
            | "generator_function_declaration"
            | "function_expression"
            | "generator_function"
            | "arrow_function"
            | "class_declaration"
            | "abstract_class_declaration"
            | "method_definition" => {}
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.collect_calls(child, enclosing_class, out);
                }
            }
        }
    }

    /// Arguments of a call: inline function arguments are continuations of
    /// the enclosing scope, everything else is walked normally.
    fn collect_argument_calls(
        &self,
        args: Node,
        enclosing_class: Option<&str>,
        out: &mut Vec<CallSite>,
    ) {
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            match arg.kind() {
                "arrow_function" | "function_expression" | "generator_function" => {
                    self.collect_body_calls(arg, enclosing_class, out);
                }
                _ => self.collect_calls(arg, enclosing_class, out),
            }
        }
    }

    fn record_call(
        &self,
        call: Node,
        callee: Node,
        enclosing_class: Option<&str>,
        out: &mut Vec<CallSite>,
    ) {
        match callee.kind() {
            "identifier" => out.push(CallSite::Named {
                callee: self.text(callee).into(),
                line: Self::line(call),
            }),
            "member_expression" => {
                let (Some(object), Some(property)) = (
                    callee.child_by_field_name("object"),
                    callee.child_by_field_name("property"),
                ) else {
                    return;
                };
                let property_name = self.text(property);
                match object.kind() {
                    "identifier" => out.push(CallSite::Member {
                        object: self.text(object).into(),
                        property: property_name.into(),
                        line: Self::line(call),
                    }),
                    "this" => {
                        if let Some(class_name) = enclosing_class {
                            out.push(CallSite::Member {
                                object: class_name.into(),
                                property: property_name.into(),
                                line: Self::line(call),
                            });
                        }
                    }
                    // deeper chains (`a.b.c()`) are not call sites
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // === DI defaults and constructor fields ===

    /// `f(p = { k: v, … })` parameter defaults.
    fn di_defaults(&self, params: Node) -> Vec<DiDefaultMapping> {
        let mut mappings = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let (pattern, value) = match param.kind() {
                "required_parameter" | "optional_parameter" => (
                    param.child_by_field_name("pattern"),
                    param.child_by_field_name("value"),
                ),
                // plain-JS default shape, for robustness across grammar output
                "assignment_pattern" => (
                    param.child_by_field_name("left"),
                    param.child_by_field_name("right"),
                ),
                _ => (None, None),
            };
            let (Some(pattern), Some(value)) = (pattern, value) else {
                continue;
            };
            if pattern.kind() != "identifier" || value.kind() != "object" {
                continue;
            }
            let param_name = self.text(pattern).to_string();

            let mut entry_cursor = value.walk();
            for entry in value.named_children(&mut entry_cursor) {
                match entry.kind() {
                    "pair" => {
                        let (Some(key), Some(prop_value)) = (
                            entry.child_by_field_name("key"),
                            entry.child_by_field_name("value"),
                        ) else {
                            continue;
                        };
                        if key.kind() == "computed_property_name" {
                            continue;
                        }
                        let prop = self.text(key).trim_matches(['"', '\'']).to_string();
                        match prop_value.kind() {
                            "identifier" => mappings.push(DiDefaultMapping {
                                param: param_name.clone(),
                                prop,
                                target: DiTarget::Local(self.text(prop_value).to_string()),
                            }),
                            "member_expression" => {
                                let (Some(object), Some(member)) = (
                                    prop_value.child_by_field_name("object"),
                                    prop_value.child_by_field_name("property"),
                                ) else {
                                    continue;
                                };
                                if object.kind() == "identifier" {
                                    mappings.push(DiDefaultMapping {
                                        param: param_name.clone(),
                                        prop,
                                        target: DiTarget::Member {
                                            object: self.text(object).to_string(),
                                            member: self.text(member).to_string(),
                                        },
                                    });
                                }
                            }
                            _ => {}
                        }
                    }
                    "shorthand_property_identifier" => {
                        let prop = self.text(entry).to_string();
                        mappings.push(DiDefaultMapping {
                            param: param_name.clone(),
                            prop: prop.clone(),
                            target: DiTarget::Local(prop),
                        });
                    }
                    _ => {}
                }
            }
        }
        mappings
    }

    /// `this.field = …` statements inside a constructor body.
    fn field_assignments(&self, body: Node) -> Vec<FieldAssignment> {
        let mut assignments = Vec::new();
        self.walk_field_assignments(body, &mut assignments);
        assignments
    }

    fn walk_field_assignments(&self, node: Node, out: &mut Vec<FieldAssignment>) {
        if node.kind() == "assignment_expression" {
            if let Some(assignment) = self.field_assignment(node) {
                out.push(assignment);
            }
        }
        // nested functions are new scopes; their assignments don't count
        if matches!(
            node.kind(),
            "arrow_function" | "function_expression" | "function_declaration" | "class_declaration"
        ) {
            return;
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk_field_assignments(child, out);
        }
    }

    fn field_assignment(&self, assignment: Node) -> Option<FieldAssignment> {
        let left = assignment.child_by_field_name("left")?;
        if left.kind() != "member_expression" {
            return None;
        }
        let object = left.child_by_field_name("object")?;
        if object.kind() != "this" {
            return None;
        }
        let field = self.text(left.child_by_field_name("property")?).to_string();

        let right = assignment.child_by_field_name("right")?;
        match right.kind() {
            "identifier" => Some(FieldAssignment {
                field,
                source: FieldSource::Local(self.text(right).to_string()),
            }),
            "member_expression" => {
                let param = right.child_by_field_name("object")?;
                if param.kind() != "identifier" {
                    return None;
                }
                let prop = right.child_by_field_name("property")?;
                Some(FieldAssignment {
                    field,
                    source: FieldSource::ParamProp {
                        param: self.text(param).to_string(),
                        prop: self.text(prop).to_string(),
                    },
                })
            }
            _ => None,
        }
    }

    // === signatures and docs ===

    /// Verbatim parameter list plus optional `: ReturnType`.
    fn signature_of(&self, function: Node) -> Option<String> {
        let params = match function.child_by_field_name("parameters") {
            Some(p) => self.text(p).to_string(),
            // single-identifier arrow parameter: `x => …`
            None => {
                let single = function.child_by_field_name("parameter")?;
                format!("({})", self.text(single))
            }
        };
        let return_type = function
            .child_by_field_name("return_type")
            .map(|n| self.text(n))
            .unwrap_or("");
        Some(format!("{params}{return_type}"))
    }

    /// Doc comment directly above the node (or its export wrapper).
    fn doc_of(&self, node: Node) -> Option<String> {
        let anchor = match node.parent() {
            Some(parent) if parent.kind() == "export_statement" => parent,
            _ => node,
        };
        let prev = anchor.prev_sibling()?;
        if prev.kind() != "comment" {
            return None;
        }
        // only comments hugging the declaration count as attached
        if anchor.start_position().row.saturating_sub(prev.end_position().row) > 1 {
            return None;
        }
        doc_description(self.text(prev))
    }

    // === structural helpers ===

    fn parameters_of<'t>(&self, function: Node<'t>) -> Option<Node<'t>> {
        function.child_by_field_name("parameters")
    }

    /// `instrumentFn(…, fnExpr)` or `instrumentFn(fnExpr)`: the wrapped
    /// function expression, when the callee is the sentinel identifier.
    fn instrument_wrapped<'t>(&self, call: Node<'t>) -> Option<Node<'t>> {
        let callee = call.child_by_field_name("function")?;
        if callee.kind() != "identifier" || self.text(callee) != INSTRUMENT_FN {
            return None;
        }
        let args = call.child_by_field_name("arguments")?;
        let mut cursor = args.walk();
        let mut wrapped = None;
        for arg in args.named_children(&mut cursor) {
            let inner = unwrap_expression(arg);
            if matches!(
                inner.kind(),
                "arrow_function" | "function_expression" | "generator_function"
            ) {
                wrapped = Some(inner);
            }
        }
        wrapped
    }

    /// `Object.freeze({ … })`: the object literal argument.
    fn facade_object<'t>(&self, call: Node<'t>) -> Option<Node<'t>> {
        let callee = call.child_by_field_name("function")?;
        if callee.kind() != "member_expression" || self.text(callee) != "Object.freeze" {
            return None;
        }
        let args = call.child_by_field_name("arguments")?;
        let mut cursor = args.walk();
        let first = args.named_children(&mut cursor).next()?;
        let inner = unwrap_expression(first);
        if inner.kind() == "object" {
            Some(inner)
        } else {
            None
        }
    }

    fn finish(mut self, source: &str) -> ParsedFile {
        for class_name in &self.instrumented_classes {
            let prefix = format!("{class_name}.");
            for function in &mut self.file.functions {
                if function.qualified.starts_with(&prefix) {
                    function.is_instrumented = true;
                }
            }
        }

        if !self.module_calls.is_empty() {
            let total_lines = source.lines().count().max(1) as u32;
            let mut module = ParsedFunction::new(MODULE_SCOPE, 1, total_lines);
            module.calls = std::mem::take(&mut self.module_calls);
            self.push_function(module);
        }

        self.file
    }
}

/// Peel `as const`, `satisfies T`, parentheses, and non-null assertions off
/// an expression.
fn unwrap_expression(node: Node) -> Node {
    let mut current = node;
    loop {
        match current.kind() {
            "as_expression" | "satisfies_expression" | "non_null_expression" => {
                match current.named_child(0) {
                    Some(inner) => current = inner,
                    None => return current,
                }
            }
            "parenthesized_expression" => match current.named_child(0) {
                Some(inner) => current = inner,
                None => return current,
            },
            _ => return current,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = FileParser::new();
        parser
            .parse_source("/repo/test.ts", source, &Diagnostics::disabled())
            .expect("parse")
    }

    #[test]
    fn named_function_with_calls() {
        let file = parse(
            r#"
export function main(input: string): void {
  helper(input);
  other.run(input);
}

function helper(x: string) {
  return x;
}
"#,
        );
        let main = file.function("main").unwrap();
        assert_eq!(
            main.calls,
            vec![
                CallSite::Named {
                    callee: "helper".into(),
                    line: 3
                },
                CallSite::Member {
                    object: "other".into(),
                    property: "run".into(),
                    line: 4
                },
            ]
        );
        assert_eq!(main.signature.as_deref(), Some("(input: string): void"));
        assert_eq!(file.exported_names.get("main").map(String::as_str), Some("main"));
        assert!(file.function("helper").is_some());
    }

    #[test]
    fn arrow_initializer_and_callback_continuation() {
        let file = parse(
            r#"
const process = (items: string[]) => {
  items.map(item => transform(item));
  schedule(() => { flush(); });
};
"#,
        );
        let process = file.function("process").unwrap();
        let names: Vec<_> = process
            .calls
            .iter()
            .filter_map(|c| match c {
                CallSite::Named { callee, .. } => Some(callee.as_ref()),
                _ => None,
            })
            .collect();
        // callbacks are continuations of the enclosing body
        assert!(names.contains(&"transform"));
        assert!(names.contains(&"schedule"));
        assert!(names.contains(&"flush"));
    }

    #[test]
    fn nested_function_is_a_new_scope() {
        let file = parse(
            r#"
function outer() {
  function inner() {
    hidden();
  }
  visible();
}
"#,
        );
        let outer = file.function("outer").unwrap();
        let names: Vec<_> = outer
            .calls
            .iter()
            .filter_map(|c| match c {
                CallSite::Named { callee, .. } => Some(callee.as_ref()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["visible"]);
        // ...but the nested declaration itself is not lifted to file scope
        assert!(file.function("inner").is_none());
    }

    #[test]
    fn class_members_and_this_substitution() {
        let file = parse(
            r#"
class Agent {
  constructor(deps = { streamText }) {
    this._streamText = deps.streamText;
  }

  run() {
    return this._streamText("hello");
  }

  static create(): Agent {
    return new Agent();
  }

  get status() {
    return this.describe();
  }
}
"#,
        );
        let ctor = file.function("Agent.constructor").unwrap();
        assert!(ctor.signature.is_none());
        assert_eq!(
            ctor.di_defaults,
            vec![DiDefaultMapping {
                param: "deps".into(),
                prop: "streamText".into(),
                target: DiTarget::Local("streamText".into()),
            }]
        );
        assert_eq!(
            ctor.field_assignments.as_deref(),
            Some(
                &[FieldAssignment {
                    field: "_streamText".into(),
                    source: FieldSource::ParamProp {
                        param: "deps".into(),
                        prop: "streamText".into(),
                    },
                }][..]
            )
        );

        let run = file.function("Agent.run").unwrap();
        assert_eq!(
            run.calls,
            vec![CallSite::Member {
                object: "Agent".into(),
                property: "_streamText".into(),
                line: 8,
            }]
        );

        let create = file.function("Agent.create").unwrap();
        assert_eq!(
            create.calls,
            vec![CallSite::Member {
                object: "Agent".into(),
                property: "constructor".into(),
                line: 12,
            }]
        );

        assert!(file.function("Agent.get status").is_some());
    }

    #[test]
    fn facade_bindings() {
        let file = parse(
            r#"
function loadById(id: string) {
  return id;
}

const FKLoader = Object.freeze({
  loadById,
  loadMany: loadById,
  inline: (x) => loadById(x),
  shorthandMethod() { return loadById("m"); },
});
"#,
        );
        assert_eq!(
            file.object_bindings.get("FKLoader.loadById").map(String::as_str),
            Some("loadById")
        );
        assert_eq!(
            file.object_bindings.get("FKLoader.loadMany").map(String::as_str),
            Some("loadById")
        );
        assert_eq!(
            file.object_bindings.get("FKLoader.inline").map(String::as_str),
            Some("FKLoader.inline")
        );
        assert!(file.function("FKLoader.inline").is_some());
        assert!(file.function("FKLoader.shorthandMethod").is_some());
    }

    #[test]
    fn default_export_of_frozen_object() {
        let file = parse(
            r#"
function loadById(id: string) { return id; }
export default Object.freeze({ loadById });
"#,
        );
        assert_eq!(
            file.exported_names.get(DEFAULT_EXPORT).map(String::as_str),
            Some(DEFAULT_EXPORT)
        );
        assert_eq!(
            file.object_bindings
                .get("default.loadById")
                .map(String::as_str),
            Some("loadById")
        );
    }

    #[test]
    fn imports_and_reexports() {
        let file = parse(
            r#"
import helper, { transform, Worker as W } from './c';
import * as extNs from 'another-ext-pkg';
export { transform as retransform } from './c';
export { helper as h };
export * from './d';
"#,
        );
        assert_eq!(file.imports.len(), 4);
        assert_eq!(file.imports[0].local, "helper");
        assert_eq!(file.imports[0].imported, DEFAULT_EXPORT);
        assert_eq!(file.imports[1].local, "transform");
        assert_eq!(file.imports[2].local, "W");
        assert_eq!(file.imports[2].imported, "Worker");
        assert!(file.imports[3].is_namespace);

        assert_eq!(file.re_exports.len(), 2);
        assert_eq!(file.re_exports[0].exported, "retransform");
        assert_eq!(file.re_exports[0].imported, "transform");
        assert_eq!(
            file.exported_names.get("retransform").map(String::as_str),
            Some("retransform")
        );
        assert_eq!(file.re_exports[1].exported, NAMESPACE_IMPORT);
        assert_eq!(file.exported_names.get("h").map(String::as_str), Some("helper"));
    }

    #[test]
    fn instrumentation_wrapper_and_in_place() {
        let file = parse(
            r#"
const tracked = instrumentFn("tracked", (x: number) => {
  return helper(x);
});

class Service {
  run() { return 1; }
  stop() { return 2; }
}

instrumentOwnMethodsInPlace(Service);
"#,
        );
        let tracked = file.function("tracked").unwrap();
        assert!(tracked.is_instrumented);
        assert_eq!(tracked.calls.len(), 1);

        assert!(file.function("Service.run").unwrap().is_instrumented);
        assert!(file.function("Service.stop").unwrap().is_instrumented);
    }

    #[test]
    fn module_scope_iff_top_level_calls() {
        let with_calls = parse(
            r#"
function setup() {}
setup();
"#,
        );
        let module = with_calls.function(MODULE_SCOPE).unwrap();
        assert_eq!(module.start_line, 1);
        assert_eq!(module.calls.len(), 1);

        let without_calls = parse(
            r#"
function setup() {}
const x = 1;
"#,
        );
        assert!(without_calls.function(MODULE_SCOPE).is_none());
    }

    #[test]
    fn instance_binding_from_new() {
        let file = parse(
            r#"
import { Worker } from './c';
const w = new Worker();
function main() {
  w.process("x");
}
"#,
        );
        assert_eq!(
            file.instance_bindings.get("w").map(String::as_str),
            Some("Worker")
        );
        let main = file.function("main").unwrap();
        assert_eq!(
            main.calls,
            vec![CallSite::Member {
                object: "w".into(),
                property: "process".into(),
                line: 5,
            }]
        );
    }

    #[test]
    fn deep_chains_are_not_call_sites() {
        let file = parse(
            r#"
function main() {
  a.b.c();
  plain();
}
"#,
        );
        let main = file.function("main").unwrap();
        assert_eq!(
            main.calls,
            vec![CallSite::Named {
                callee: "plain".into(),
                line: 4
            }]
        );
    }

    #[test]
    fn chained_call_records_inner_call() {
        let file = parse(
            r#"
function main() {
  makeThing().use();
}
"#,
        );
        let main = file.function("main").unwrap();
        assert_eq!(
            main.calls,
            vec![CallSite::Named {
                callee: "makeThing".into(),
                line: 3
            }]
        );
    }

    #[test]
    fn doc_description_attaches() {
        let file = parse(
            r#"
/**
 * Streams text from the model.
 * @param prompt the prompt
 */
export function streamText(prompt: string) {
  return prompt;
}
"#,
        );
        let f = file.function("streamText").unwrap();
        assert_eq!(f.description.as_deref(), Some("Streams text from the model."));
    }

    #[test]
    fn parser_is_deterministic() {
        let source = r#"
export function main() { helper(); }
function helper() { other.run(); }
const Obj = { main };
"#;
        let a = parse(source);
        let b = parse(source);
        assert_eq!(a.functions, b.functions);
        assert_eq!(a.object_bindings, b.object_bindings);
        assert_eq!(a.exported_names, b.exported_names);
    }

    #[test]
    fn class_field_function_and_spread_ignored() {
        let file = parse(
            r#"
class Handler {
  onEvent = (e: Event) => { dispatch(e); };
}

const mixed = { ...spread, [computed]: x, ok() {} };
"#,
        );
        let on_event = file.function("Handler.onEvent").unwrap();
        assert_eq!(on_event.calls.len(), 1);
        assert!(file.function("mixed.ok").is_some());
        assert_eq!(file.object_bindings.len(), 1);
    }
}
