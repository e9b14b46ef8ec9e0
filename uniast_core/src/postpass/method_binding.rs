//! Sweep (a): for every `FUNC` with a non-empty receiver type identity,
//! register it into the owning type's `Methods` map.

use crate::model::Repository;

pub fn bind_methods(repository: &mut Repository) {
    // Collect (type mod, type pkg, local method name, function identity)
    // first to avoid mutably borrowing two maps in the same module at
    // once while walking functions.
    let mut bindings: Vec<(String, String, String, crate::identity::Identity)> = Vec::new();

    for module in repository.modules.values() {
        for package in module.packages.values() {
            for function in package.functions.values() {
                let Some(receiver) = &function.receiver else { continue };
                let local_name = function
                    .identity
                    .name
                    .rsplit('.')
                    .next()
                    .unwrap_or(&function.identity.name)
                    .to_string();
                bindings.push((
                    receiver.type_identity.mod_path.clone(),
                    receiver.type_identity.pkg_path.clone(),
                    local_name,
                    function.identity.clone(),
                ));
            }
        }
    }

    for (mod_path, pkg_path, local_name, func_identity) in bindings {
        if let Some(module) = repository.modules.get_mut(&mod_path) {
            if let Some(package) = module.packages.get_mut(&pkg_path) {
                let type_name = func_identity
                    .name
                    .rsplit_once('.')
                    .map(|(t, _)| t.to_string());
                if let Some(type_name) = type_name {
                    if let Some(type_decl) = package.types.get_mut(&type_name) {
                        type_decl.methods.insert(local_name, func_identity);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::model::*;

    fn file_line() -> FileLine {
        FileLine::new("p/f.go", 1, 0, 1)
    }

    #[test]
    fn binds_method_to_owning_type() {
        let mut repo = Repository::new("id", "/repo");
        let module = repo.module_mut("m");
        let mut package = Package { pkg_path: "p".to_string(), ..Default::default() };
        package.types.insert(
            "S".to_string(),
            TypeDecl {
                identity: Identity::new("m", "p", "S"),
                file_line: file_line(),
                exported: true,
                type_kind: TypeKind::Struct,
                content: String::new(),
                sub_struct: DependencySet::new(),
                inline_struct: DependencySet::new(),
                methods: Default::default(),
                implements: Vec::new(),
            },
        );
        package.functions.insert(
            "S.Hello".to_string(),
            Function {
                identity: Identity::new("m", "p", "S.Hello"),
                file_line: file_line(),
                exported: true,
                is_method: true,
                is_interface_method: false,
                receiver: Some(Receiver { type_identity: Identity::new("m", "p", "S"), is_pointer: true }),
                params: Vec::new(),
                results: Vec::new(),
                function_calls: DependencySet::new(),
                method_calls: DependencySet::new(),
                types: DependencySet::new(),
                global_vars: DependencySet::new(),
                signature: String::new(),
                content: String::new(),
            },
        );
        module.packages.insert("p".to_string(), package);

        bind_methods(&mut repo);

        let bound = &repo.modules["m"].packages["p"].types["S"].methods;
        assert_eq!(bound.get("Hello"), Some(&Identity::new("m", "p", "S.Hello")));
    }
}
