//! Declaration scanner + `Lowerer` impl for the compiled-typed (Go)
//! front-end. Declaration boundaries are found with a conservative
//! regex scan rather than a full parser — the bridge's semantic tables
//! remain the source of truth for what each identifier refers to, this
//! only locates *where* declarations and their bodies start and end.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::bridge::{CheckedFile, SemanticTables};
use crate::lowering::functions::{lower_function, FunctionLoweringOptions, FunctionSite};
use crate::lowering::types_lowering::{lower_type, FieldSite, InterfaceMethodSite, TypeBody, TypeSite};
use crate::lowering::vars::{lower_var_group, VarLoweringOptions, VarSite};
use crate::lowering::{LoweredFile, Lowerer};

static FUNC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^func\s+(?:\((?P<recv>\w+)\s+(?P<ptr>\*?)(?P<recvtype>\w+)\)\s+)?(?P<name>\w+)\s*\((?P<params>[^)]*)\)\s*(?P<results>[^{]*)\{").unwrap()
});
static TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^type\s+(?P<name>\w+)\s+(?P<kind>struct|interface)\s*\{").unwrap()
});
static TYPEDEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^type\s+(?P<name>\w+)\s*(?P<assign>=)?\s+(?P<aliased>\w+)\s*$").unwrap()
});
static CONST_GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?ms)^const\s*\(\s*(?P<body>.*?)\)").unwrap());
static GROUP_MEMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?P<name>\w+)(?:\s+(?P<type>\w+))?(?:\s*=\s*(?P<init>[^\n]+))?\s*$").unwrap()
});
static FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?P<name>\w+)\s+(?P<type>\*?\w+)\s*$").unwrap());

pub struct GoLowerer {
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

impl Lowerer for GoLowerer {
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
            let receiver_type = caps.name("recvtype").map(|m| m.as_str());
            let receiver_is_pointer = caps.name("ptr").map(|m| m.as_str() == "*").unwrap_or(false);
            let params_text = caps.name("params").map(|m| m.as_str()).unwrap_or("");
            let param_types = extract_type_words(params_text);
            let results_text = caps.name("results").map(|m| m.as_str()).unwrap_or("");
            let result_types = extract_type_words(results_text);

            let site = FunctionSite {
                name,
                receiver_type,
                receiver_is_pointer,
                param_types,
                result_types,
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

        for caps in TYPE_RE.captures_iter(source) {
            let whole = caps.get(0).unwrap();
            let body_start = whole.end() - 1;
            let body_end = find_matching_brace(source, body_start);
            let name = caps.name("name").unwrap().as_str();
            let kind = caps.name("kind").unwrap().as_str();
            let body_text = &source[body_start + 1..body_end.saturating_sub(1).max(body_start + 1)];

            let type_body = if kind == "struct" {
                TypeBody::Struct {
                    fields: FIELD_RE
                        .captures_iter(body_text)
                        .map(|c| {
                            let fname = c.name("name").unwrap().as_str();
                            let ftype = c.name("type").unwrap().as_str().trim_start_matches('*');
                            FieldSite {
                                name: fname,
                                type_name: ftype,
                                is_embedded: fname == ftype,
                                anonymous_fields: None,
                            }
                        })
                        .collect(),
                }
            } else {
                TypeBody::Interface {
                    methods: body_text
                        .lines()
                        .filter_map(|line| {
                            let trimmed = line.trim();
                            let mname = trimmed.split('(').next()?.trim();
                            if mname.is_empty() || !mname.chars().next()?.is_alphabetic() {
                                return None;
                            }
                            let start = body_start + 1 + body_text.find(line)?;
                            Some(InterfaceMethodSite {
                                name: mname,
                                signature_start: start,
                                signature_end: start + trimmed.len(),
                            })
                        })
                        .collect(),
                    embeds: Vec::new(),
                }
            };

            let site = TypeSite {
                name,
                body: type_body,
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

        for caps in CONST_GROUP_RE.captures_iter(source) {
            let body = caps.name("body").unwrap();
            let sites: Vec<VarSite> = GROUP_MEMBER_RE
                .captures_iter(body.as_str())
                .map(|c| {
                    let name = c.name("name").unwrap().as_str();
                    let member_offset = body.start() + c.get(0).unwrap().start();
                    VarSite {
                        name,
                        is_const: true,
                        declared_type: c.name("type").map(|m| m.as_str()),
                        initializer: c.name("init").map(|m| m.as_str().trim()),
                        decl_start: member_offset,
                        decl_end: member_offset + c.get(0).unwrap().as_str().len(),
                    }
                })
                .collect();
            let options = VarLoweringOptions { collect_comments, ..Default::default() };
            let vars = lower_var_group(&sites, &file.relative_path, source, module, pkg_path, semantics, &options);
            out.vars.extend(vars);
        }

        out
    }
}

fn extract_type_words(text: &str) -> Vec<&str> {
    static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*?\b[A-Za-z_]\w*\b").unwrap());
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_start_matches('*'))
        .filter(|w| !matches!(*w, "func" | "chan" | "map" | "error"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::CheckedFile;

    #[test]
    fn lowers_simple_method_and_caller() {
        let source = "package p\n\ntype S struct{}\n\nfunc (s *S) Hello() {\n}\n\nfunc Use(x *S) {\n\tx.Hello()\n}\n";
        let file = CheckedFile {
            relative_path: "p/file.go".to_string(),
            content: source.to_string(),
            is_test: false,
        };
        let lowerer = GoLowerer { module: "m".to_string() };
        let semantics = SemanticTables::default();
        let lowered = lowerer.lower_file(&file, "m", "p", &semantics, false);
        assert!(lowered.functions.iter().any(|f| f.identity.name == "S.Hello"));
        assert!(lowered.functions.iter().any(|f| f.identity.name == "Use"));
        assert_eq!(lowered.types.len(), 1);
    }
}
