//! Function lowering: builds `Receiver`/`Params`/`Results` from a
//! declaration's signature text and the four dependency lists from its
//! body, per §4.4.

use crate::bridge::SemanticTables;
use crate::identity::Identity;
use crate::lowering::common::{classify_and_insert, file_line, scan_body_tokens};
use crate::lowering::content::slice_content;
use crate::model::{DependencySet, Function, Param, Receiver};

/// A function/method declaration as found by the declaration scanner:
/// enough raw text spans to lower without a full AST.
pub struct FunctionSite<'a> {
    pub name: &'a str,
    pub receiver_type: Option<&'a str>,
    pub receiver_is_pointer: bool,
    pub param_types: Vec<&'a str>,
    pub result_types: Vec<&'a str>,
    pub signature_start: usize,
    pub signature_end: usize,
    pub body_start: usize,
    pub body_end: usize,
    pub decl_start: usize,
    pub decl_end: usize,
}

pub struct FunctionLoweringOptions {
    pub collect_comments: bool,
}

pub fn lower_function(
    site: &FunctionSite,
    relative_path: &str,
    source: &str,
    module: &str,
    pkg_path: &str,
    semantics: &SemanticTables,
    options: &FunctionLoweringOptions,
) -> Function {
    let is_method = site.receiver_type.is_some();
    let name = if let Some(recv_type) = site.receiver_type {
        format!("{recv_type}.{}", site.name)
    } else {
        site.name.to_string()
    };
    let identity = Identity::new(module, pkg_path, name);

    let receiver = site.receiver_type.map(|recv_type| Receiver {
        type_identity: Identity::new(module, pkg_path, recv_type),
        is_pointer: site.receiver_is_pointer,
    });

    let params = site
        .param_types
        .iter()
        .enumerate()
        .map(|(i, ty)| Param {
            identity: Identity::new(module, pkg_path, *ty),
            position: i,
        })
        .collect();
    let results = site
        .result_types
        .iter()
        .enumerate()
        .map(|(i, ty)| Param {
            identity: Identity::new(module, pkg_path, *ty),
            position: i,
        })
        .collect();

    let mut function_calls = DependencySet::new();
    let mut method_calls = DependencySet::new();
    let mut types = DependencySet::new();
    let mut global_vars = DependencySet::new();

    let body = &source[site.body_start.min(source.len())..site.body_end.min(source.len())];
    for token in scan_body_tokens(body, site.body_start) {
        classify_and_insert(
            &token,
            relative_path,
            source,
            semantics,
            module,
            &mut function_calls,
            &mut method_calls,
            &mut types,
            &mut global_vars,
        );
    }

    let exported = site.name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
    let signature = source[site.signature_start.min(source.len())..site.signature_end.min(source.len())].to_string();
    let content = slice_content(source, site.decl_start, site.decl_end, options.collect_comments);

    Function {
        identity,
        file_line: file_line(relative_path, source, site.decl_start, site.decl_end),
        exported,
        is_method,
        is_interface_method: false,
        receiver,
        params,
        results,
        function_calls,
        method_calls,
        types,
        global_vars,
        signature,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ResolvedSymbol, SymbolKind};
    use std::collections::HashMap;

    #[test]
    fn lowers_method_dependency_scenario() {
        let source = "package p\ntype S struct{}\nfunc (s *S) Hello() {}\nfunc Use(x *S) { x.Hello() }\n";
        let use_start = source.find("func Use").unwrap();
        let body_start = source[use_start..].find('{').unwrap() + use_start;
        let body_end = source.len() - 1;

        let site = FunctionSite {
            name: "Use",
            receiver_type: None,
            receiver_is_pointer: false,
            param_types: vec!["S"],
            result_types: vec![],
            signature_start: use_start,
            signature_end: body_start,
            body_start,
            body_end,
            decl_start: use_start,
            decl_end: source.len(),
        };

        let mut semantics = SemanticTables::default();
        let sel_offset = source.find("x.Hello").unwrap();
        semantics.selections.insert(
            format!("p/file.go:{sel_offset}:sel"),
            crate::bridge::Selection {
                kind: crate::bridge::SelectionKind::MethodVal,
                receiver_type: Identity::new("m", "p", "S"),
                object_name: "x".to_string(),
            },
        );

        let func = lower_function(
            &site,
            "p/file.go",
            source,
            "m",
            "p",
            &semantics,
            &FunctionLoweringOptions { collect_comments: false },
        );
        assert_eq!(func.identity.name, "Use");
        assert!(func.method_calls.iter().any(|d| d.identity.name == "S.Hello"));
    }
}
