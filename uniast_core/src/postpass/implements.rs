//! Sweep (b): interface→implementer edges via structural subtyping,
//! deduplicated regardless of whether the value form, the pointer form,
//! or both satisfied the interface (§9 open question, invariant §8.4).

use crate::postpass::{SubtypingChecker, TypeHandleIndex};
use crate::model::Repository;

pub fn compute_implementers<C: SubtypingChecker>(
    repository: &mut Repository,
    handles: &TypeHandleIndex,
    checker: &C,
) {
    for (type_handle, type_identity) in &handles.types {
        for (interface_handle, interface_identity) in &handles.interfaces {
            if !checker.satisfies(type_handle, interface_handle) {
                continue;
            }
            if let Some(module) = repository.modules.get_mut(&type_identity.mod_path) {
                if let Some(package) = module.packages.get_mut(&type_identity.pkg_path) {
                    if let Some(type_decl) = package.types.get_mut(&type_identity.name) {
                        if !type_decl.implements.contains(interface_identity) {
                            type_decl.implements.push(interface_identity.clone());
                        }
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

    struct AlwaysSatisfies;
    impl SubtypingChecker for AlwaysSatisfies {
        fn satisfies(&self, _type_handle: &str, _interface_handle: &str) -> bool {
            true
        }
    }

    fn sample_type(name: &str) -> TypeDecl {
        TypeDecl {
            identity: Identity::new("m", "p", name),
            file_line: FileLine::new("p/f.go", 1, 0, 1),
            exported: true,
            type_kind: TypeKind::Struct,
            content: String::new(),
            sub_struct: DependencySet::new(),
            inline_struct: DependencySet::new(),
            methods: Default::default(),
            implements: Vec::new(),
        }
    }

    #[test]
    fn dedups_implements_even_when_value_and_pointer_both_match() {
        let mut repo = Repository::new("id", "/repo");
        let module = repo.module_mut("m");
        let mut package = Package { pkg_path: "p".to_string(), ..Default::default() };
        package.types.insert("S".to_string(), sample_type("S"));
        module.packages.insert("p".to_string(), package);

        let mut handles = TypeHandleIndex::default();
        handles.types.insert("S_value".to_string(), Identity::new("m", "p", "S"));
        handles.types.insert("S_pointer".to_string(), Identity::new("m", "p", "S"));
        handles
            .interfaces
            .insert("Greeter".to_string(), Identity::new("m", "p", "Greeter"));

        compute_implementers(&mut repo, &handles, &AlwaysSatisfies);

        let implements = &repo.modules["m"].packages["p"].types["S"].implements;
        assert_eq!(implements.len(), 1);
    }
}
