//! Type lowering: struct/interface/typedef handling, anonymous inline
//! struct splicing, and interface method synthesis, per §4.4.

use crate::identity::Identity;
use crate::lowering::common::file_line;
use crate::lowering::content::{slice_content, with_type_keyword_prefix};
use crate::model::{DependencySet, FileLine, Function, Param, Receiver, TypeDecl, TypeKind};

#[derive(Debug, Clone)]
pub struct FieldSite<'a> {
    pub name: &'a str,
    pub type_name: &'a str,
    pub is_embedded: bool,
    /// Present when the field's type is an anonymous inline struct
    /// literal (`A struct{ B int }`); the sub-fields are lowered as a
    /// synthetic type and then discarded, per §4.4.
    pub anonymous_fields: Option<Vec<FieldSite<'a>>>,
}

#[derive(Debug, Clone)]
pub struct InterfaceMethodSite<'a> {
    pub name: &'a str,
    pub signature_start: usize,
    pub signature_end: usize,
}

pub enum TypeBody<'a> {
    Struct { fields: Vec<FieldSite<'a>> },
    Interface { methods: Vec<InterfaceMethodSite<'a>>, embeds: Vec<&'a str> },
    Typedef { aliased: &'a str, is_alias_form: bool },
}

pub struct TypeSite<'a> {
    pub name: &'a str,
    pub body: TypeBody<'a>,
    pub decl_start: usize,
    pub decl_end: usize,
}

pub struct TypeLoweringOutput {
    pub type_decl: TypeDecl,
    /// Synthesized `FUNC` declarations for interface methods
    /// (`Interface.Method`), registered both in `type_decl.methods` and
    /// returned here so the caller can insert them into the package's
    /// function map.
    pub synthesized_methods: Vec<Function>,
}

pub fn lower_type(
    site: &TypeSite,
    relative_path: &str,
    source: &str,
    module: &str,
    pkg_path: &str,
    collect_comments: bool,
) -> TypeLoweringOutput {
    let identity = Identity::new(module, pkg_path, site.name);
    let exported = site.name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
    let file_line_entry = file_line(relative_path, source, site.decl_start, site.decl_end);
    let raw_content = slice_content(source, site.decl_start, site.decl_end, collect_comments);
    let content = with_type_keyword_prefix(&raw_content);

    let mut sub_struct = DependencySet::new();
    let mut inline_struct = DependencySet::new();
    let mut methods = std::collections::BTreeMap::new();
    let mut synthesized_methods = Vec::new();

    let type_kind = match &site.body {
        TypeBody::Struct { fields } => {
            lower_struct_fields(fields, module, pkg_path, &file_line_entry, &mut sub_struct, &mut inline_struct);
            TypeKind::Struct
        }
        TypeBody::Interface { methods: iface_methods, embeds } => {
            for embed in embeds {
                inline_struct.insert_or_ignore(Identity::new(module, pkg_path, *embed), file_line_entry.clone());
            }
            for m in iface_methods {
                let method_identity = Identity::new(module, pkg_path, format!("{}.{}", site.name, m.name));
                let signature = source[m.signature_start.min(source.len())..m.signature_end.min(source.len())].to_string();
                let method_file_line = file_line(relative_path, source, m.signature_start, m.signature_end);
                methods.insert(m.name.to_string(), method_identity.clone());
                synthesized_methods.push(Function {
                    identity: method_identity,
                    file_line: method_file_line,
                    exported: m.name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false),
                    is_method: true,
                    is_interface_method: true,
                    receiver: Some(Receiver {
                        type_identity: identity.clone(),
                        is_pointer: false,
                    }),
                    params: Vec::new(),
                    results: Vec::new(),
                    function_calls: DependencySet::new(),
                    method_calls: DependencySet::new(),
                    types: DependencySet::new(),
                    global_vars: DependencySet::new(),
                    signature: signature.clone(),
                    content: signature,
                });
            }
            TypeKind::Interface
        }
        TypeBody::Typedef { aliased, .. } => {
            sub_struct.insert_or_ignore(Identity::new(module, pkg_path, *aliased), file_line_entry.clone());
            TypeKind::Typedef
        }
    };

    TypeLoweringOutput {
        type_decl: TypeDecl {
            identity,
            file_line: file_line_entry,
            exported,
            type_kind,
            content,
            sub_struct,
            inline_struct,
            methods,
            implements: Vec::new(),
        },
        synthesized_methods,
    }
}

/// Recursively lowers struct fields. An anonymous inline struct field is
/// lowered as a synthetic `_fieldName` type purely to collect its own
/// member dependencies, which are spliced into the parent's
/// `SubStruct`; the synthetic type itself is never emitted.
fn lower_struct_fields(
    fields: &[FieldSite],
    module: &str,
    pkg_path: &str,
    site_line: &FileLine,
    sub_struct: &mut DependencySet,
    inline_struct: &mut DependencySet,
) {
    for field in fields {
        if let Some(anon_fields) = &field.anonymous_fields {
            // Splice the synthetic type's own sub-struct dependencies
            // into the parent; named members of the anonymous struct
            // (e.g. `B int`) are never emitted as named types.
            lower_struct_fields(anon_fields, module, pkg_path, site_line, sub_struct, inline_struct);
            continue;
        }
        let target = if field.is_embedded { &mut *inline_struct } else { &mut *sub_struct };
        if !is_primitive_type(field.type_name) {
            target.insert_or_ignore(Identity::new(module, pkg_path, field.type_name), site_line.clone());
        }
    }
}

fn is_primitive_type(name: &str) -> bool {
    matches!(
        name,
        "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32" | "uint64"
            | "float32" | "float64" | "bool" | "string" | "byte" | "rune" | "error" | "any"
            | "number" | "boolean" | "void" | "unknown"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_inline_struct_is_not_emitted_as_named_type() {
        let source = "type Outer struct { A struct{ B int }; C int }\n";
        let site = TypeSite {
            name: "Outer",
            body: TypeBody::Struct {
                fields: vec![
                    FieldSite {
                        name: "A",
                        type_name: "_A",
                        is_embedded: false,
                        anonymous_fields: Some(vec![FieldSite {
                            name: "B",
                            type_name: "int",
                            is_embedded: false,
                            anonymous_fields: None,
                        }]),
                    },
                    FieldSite {
                        name: "C",
                        type_name: "int",
                        is_embedded: false,
                        anonymous_fields: None,
                    },
                ],
            },
            decl_start: 0,
            decl_end: source.len(),
        };
        let output = lower_type(&site, "p/file.go", source, "m", "p", false);
        assert!(output.type_decl.sub_struct.is_empty());
    }

    #[test]
    fn interface_methods_are_synthesized_with_receiver() {
        let source = "type Greeter interface { Hello() }\n";
        let hello_start = source.find("Hello").unwrap();
        let hello_end = source.find(')').unwrap() + 1;
        let site = TypeSite {
            name: "Greeter",
            body: TypeBody::Interface {
                methods: vec![InterfaceMethodSite {
                    name: "Hello",
                    signature_start: hello_start,
                    signature_end: hello_end,
                }],
                embeds: vec![],
            },
            decl_start: 0,
            decl_end: source.len(),
        };
        let output = lower_type(&site, "p/file.go", source, "m", "p", false);
        assert_eq!(output.synthesized_methods.len(), 1);
        assert!(output.type_decl.methods.contains_key("Hello"));
        assert!(output.synthesized_methods[0].is_interface_method);
    }
}
