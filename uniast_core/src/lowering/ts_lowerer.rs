//! Declaration scanner + `Lowerer` impl for the ECMAScript-family
//! front-end. Mirrors `go_lowerer`'s regex-scan shape but for
//! `function`/`class`/`interface`/`const` declarations; the
//! `oxc_semantic` symbol table (built by `bridge::ts_bridge`) still
//! supplies the actual `Uses`/`Defs` classification.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::bridge::{CheckedFile, SemanticTables};
use crate::lowering::functions::{lower_function, FunctionLoweringOptions, FunctionSite};
use crate::lowering::types_lowering::{lower_type, FieldSite, InterfaceMethodSite, TypeBody, TypeSite};
use crate::lowering::vars::{lower_var_group, VarLoweringOptions, VarSite};
use crate::lowering::{LoweredFile, Lowerer};

static FUNC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^export\s+(?:async\s+)?function\s+(?P<name>\w+)\s*\((?P<params>[^)]*)\)[^{]*\{").unwrap());
static METHOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:public\s+|private\s+|async\s+)*(?P<name>\w+)\s*\((?P<params>[^)]*)\)\s*(?::[^{]+)?\{").unwrap());
static CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^export\s+class\s+(?P<name>\w+)\s*\{").unwrap());
static INTERFACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^export\s+interface\s+(?P<name>\w+)\s*\{").unwrap());
static CONST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^export\s+const\s+(?P<name>\w+)(?:\s*:\s*(?P<type>[\w<>\[\]]+))?\s*=\s*(?P<init>[^;\n]+);?").unwrap());
static FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?P<name>\w+)\s*:\s*(?P<type>[\w<>\[\]]+)\s*;?").unwrap());

pub struct TsLowerer {
    pub module: String,
}

fn find_matching_brace(source: &str, open_brace_offset: usize) -> usize {
    let bytes = source.as_bytes();
    let mut depth = 0i32;
    let mut i = open_brace_offset;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

impl Lowerer for TsLowerer {
    fn lower_file(
        &self,
        file: &CheckedFile,
        module: &str,
        pkg_path: &str,
        semantics: &SemanticTables,
        collect_comments: bool,
    ) -> LoweredFile {
        let source = &file.content;
        let mut out = LoweredFile::default();

        for caps in FUNC_RE.captures_iter(source) {
            let whole = caps.get(0).unwrap();
            let body_start = whole.end() - 1;
            let body_end = find_matching_brace(source, body_start);
            let name = caps.name("name").unwrap().as_str();
            let params_text = caps.name("params").map(|m| m.as_str()).unwrap_or("");

            let site = FunctionSite {
                name,
                receiver_type: None,
                receiver_is_pointer: false,
                param_types: extract_type_annotations(params_text),
                result_types: Vec::new(),
                signature_start: whole.start(),
                signature_end: body_start,
                body_start,
                body_end,
                decl_start: whole.start(),
                decl_end: body_end,
            };
            let options = FunctionLoweringOptions { collect_comments };
            if let Some(func) = crate::lowering::lower_with_recovery(&file.relative_path, 0, || {
                lower_function(&site, &file.relative_path, source, module, pkg_path, semantics, &options)
            }) {
                out.functions.push(func);
            }
        }

        for caps in CLASS_RE.captures_iter(source) {
            let whole = caps.get(0).unwrap();
            let body_start = whole.end() - 1;
            let body_end = find_matching_brace(source, body_start);
            let name = caps.name("name").unwrap().as_str();
            let body_text = &source[body_start + 1..body_end.saturating_sub(1).max(body_start + 1)];

            for method_caps in METHOD_RE.captures_iter(body_text) {
                let mname = method_caps.name("name").unwrap().as_str();
                if mname == "constructor" {
                    continue;
                }
                let method_whole = method_caps.get(0).unwrap();
                let abs_start = body_start + 1 + method_whole.start();
                let abs_body_start = body_start + 1 + (method_whole.end() - 1);
                let abs_body_end = find_matching_brace(source, abs_body_start);
                let site = FunctionSite {
                    name: mname,
                    receiver_type: Some(name),
                    receiver_is_pointer: false,
                    param_types: extract_type_annotations(method_caps.name("params").map(|m| m.as_str()).unwrap_or("")),
                    result_types: Vec::new(),
                    signature_start: abs_start,
                    signature_end: abs_body_start,
                    body_start: abs_body_start,
                    body_end: abs_body_end,
                    decl_start: abs_start,
                    decl_end: abs_body_end,
                };
                let options = FunctionLoweringOptions { collect_comments };
                if let Some(func) = crate::lowering::lower_with_recovery(&file.relative_path, 0, || {
                    lower_function(&site, &file.relative_path, source, module, pkg_path, semantics, &options)
                }) {
                    out.functions.push(func);
                }
            }

            let site = TypeSite {
                name,
                body: TypeBody::Struct {
                    fields: FIELD_RE
                        .captures_iter(body_text)
                        .map(|c| FieldSite {
                            name: c.name("name").unwrap().as_str(),
                            type_name: c.name("type").unwrap().as_str(),
                            is_embedded: false,
                            anonymous_fields: None,
                        })
                        .collect(),
                },
                decl_start: whole.start(),
                decl_end: body_end,
            };
            if let Some(output) = crate::lowering::lower_with_recovery(&file.relative_path, 0, || {
                lower_type(&site, &file.relative_path, source, module, pkg_path, collect_comments)
            }) {
                out.types.push(output.type_decl);
            }
        }

        for caps in INTERFACE_RE.captures_iter(source) {
            let whole = caps.get(0).unwrap();
            let body_start = whole.end() - 1;
            let body_end = find_matching_brace(source, body_start);
            let name = caps.name("name").unwrap().as_str();
            let body_text = &source[body_start + 1..body_end.saturating_sub(1).max(body_start + 1)];

            let methods: Vec<InterfaceMethodSite> = body_text
                .lines()
                .filter_map(|line| {
                    let trimmed = line.trim().trim_end_matches(';');
                    let mname = trimmed.split('(').next()?.trim();
                    if mname.is_empty() || !trimmed.contains('(') {
                        return None;
                    }
                    let start = body_start + 1 + body_text.find(line)?;
                    Some(InterfaceMethodSite {
                        name: mname,
                        signature_start: start,
                        signature_end: start + trimmed.len(),
                    })
                })
                .collect();

            let site = TypeSite {
                name,
                body: TypeBody::Interface { methods, embeds: Vec::new() },
                decl_start: whole.start(),
                decl_end: body_end,
            };
            if let Some(output) = crate::lowering::lower_with_recovery(&file.relative_path, 0, || {
                lower_type(&site, &file.relative_path, source, module, pkg_path, collect_comments)
            }) {
                out.types.push(output.type_decl);
                out.functions.extend(output.synthesized_methods);
            }
        }

        let const_sites: Vec<VarSite> = CONST_RE
            .captures_iter(source)
            .map(|c| {
                let whole = c.get(0).unwrap();
                VarSite {
                    name: c.name("name").unwrap().as_str(),
                    is_const: true,
                    declared_type: c.name("type").map(|m| m.as_str()),
                    initializer: c.name("init").map(|m| m.as_str().trim()),
                    decl_start: whole.start(),
                    decl_end: whole.end(),
                }
            })
            .collect();
        if !const_sites.is_empty() {
            let options = VarLoweringOptions { collect_comments, auto_numbering_keyword: "__none__" };
            out.vars
                .extend(lower_var_group(&const_sites, &file.relative_path, source, module, pkg_path, semantics, &options));
        }

        out
    }
}

fn extract_type_annotations(params: &str) -> Vec<&str> {
    static TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*(?P<type>[\w<>\[\]]+)").unwrap());
    TYPE_RE
        .captures_iter(params)
        .filter_map(|c| c.name("type").map(|m| m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowers_exported_function_and_class_method() {
        let source = "export function greet(name: string): string {\n  return name;\n}\n\nexport class Greeter {\n  hello(): void {\n    console.log('hi');\n  }\n}\n";
        let file = CheckedFile {
            relative_path: "pkg/index.ts".to_string(),
            content: source.to_string(),
            is_test: false,
        };
        let lowerer = TsLowerer { module: "m".to_string() };
        let semantics = SemanticTables::default();
        let lowered = lowerer.lower_file(&file, "m", "pkg", &semantics, false);
        assert!(lowered.functions.iter().any(|f| f.identity.name == "greet"));
        assert!(lowered.functions.iter().any(|f| f.identity.name == "Greeter.hello"));
        assert!(lowered.types.iter().any(|t| t.identity.name == "Greeter"));
    }
}
