//! External-reference follower (§4.6): on a non-zero depth budget,
//! loads a dependency's package on demand and lowers just the
//! referenced declaration, so the emitted UniAST stays self-contained
//! up to the configured depth.

use crate::bridge::{BridgeOptions, TypeCheckerBridge};
use crate::errors::IndexError;
use crate::identity::Identity;
use crate::lowering::{merge_into_package, Lowerer};
use crate::model::{Module, Package, Repository};

pub struct FollowRequest<'a> {
    pub target: &'a Identity,
    pub remaining_depth: u32,
}

/// Follows one external identity into `repository`, lowering only the
/// named declaration (and, recursively, its own references within the
/// decremented depth). Depth 0 short-circuits: the identity is recorded
/// without content by leaving it absent from `repository` so the
/// post-pass synthesizes an `UNKNOWN` placeholder node for it.
pub fn follow_external_reference<B: TypeCheckerBridge, L: Lowerer>(
    repository: &mut Repository,
    bridge: &mut B,
    lowerer: &L,
    request: FollowRequest,
    options: &BridgeOptions,
) -> Result<(), IndexError> {
    if request.remaining_depth == 0 {
        return Ok(());
    }

    let target = request.target;
    repository
        .modules
        .entry(target.mod_path.clone())
        .or_insert_with(|| Module {
            name: target.mod_path.clone(),
            ..Default::default()
        });

    let loaded = bridge.load_package(&target.pkg_path, options).map_err(|e| {
        tracing::warn!(identity = %target, error = %e, "external reference follow failed");
        IndexError::ExternalRefFollowFailed(target.clone())
    })?;

    let short_name = target.name.split('.').next().unwrap_or(&target.name);
    let mut matched = false;
    for file in &loaded.files {
        let lowered = lowerer.lower_file(file, &target.mod_path, &target.pkg_path, &loaded.semantics, options.collect_comments);
        let wants = lowered
            .functions
            .iter()
            .any(|f| f.identity.name == target.name)
            || lowered.types.iter().any(|t| t.identity.name == short_name)
            || lowered.vars.iter().any(|v| v.identity.name == short_name);
        if !wants {
            continue;
        }
        matched = true;
        let module = repository.module_mut(&target.mod_path);
        let package = module
            .packages
            .entry(target.pkg_path.clone())
            .or_insert_with(|| Package {
                pkg_path: target.pkg_path.clone(),
                ..Default::default()
            });
        merge_into_package(package, lowered);
        break;
    }

    if !matched {
        tracing::warn!(identity = %target, "external package loaded but declaration not found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeOptions, LoadedPackage, SemanticTables};
    use std::sync::Arc;

    struct PanicBridge;
    impl TypeCheckerBridge for PanicBridge {
        fn load_package(&mut self, _pkg_path: &str, _options: &BridgeOptions) -> Result<Arc<LoadedPackage>, IndexError> {
            panic!("depth-0 follow must never call the bridge");
        }
    }

    struct NoopLowerer;
    impl Lowerer for NoopLowerer {
        fn lower_file(
            &self,
            _file: &crate::bridge::CheckedFile,
            _module: &str,
            _pkg_path: &str,
            _semantics: &SemanticTables,
            _collect_comments: bool,
        ) -> crate::lowering::LoweredFile {
            crate::lowering::LoweredFile::default()
        }
    }

    #[test]
    fn depth_zero_short_circuits_without_loading() {
        let mut repo = Repository::new("id", "/repo");
        let mut bridge = PanicBridge;
        let lowerer = NoopLowerer;
        let target = Identity::new("ext.com/lib@v1", "ext.com/lib", "Config");
        let result = follow_external_reference(
            &mut repo,
            &mut bridge,
            &lowerer,
            FollowRequest { target: &target, remaining_depth: 0 },
            &BridgeOptions::default(),
        );
        assert!(result.is_ok());
        assert!(repo.modules.is_empty());
    }
}
