//! Lowering engine (§4.4): walks declarations in source order per file
//! and produces UniAST nodes, under a per-declaration panic-recovery
//! boundary.

pub mod common;
pub mod content;
pub mod functions;
pub mod go_lowerer;
pub mod ts_lowerer;
pub mod types_lowering;
pub mod vars;

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::bridge::{CheckedFile, SemanticTables};
use crate::model::{Function, Package, TypeDecl, Variable};

/// One front-end's lowerer: the Go and TS/JS adapters each implement
/// this by scanning a file's declarations with the syntax appropriate
/// to that language, then delegating the actual node construction to
/// the shared helpers in `lowering::functions`/`types_lowering`/`vars`.
pub trait Lowerer {
    fn lower_file(
        &self,
        file: &CheckedFile,
        module: &str,
        pkg_path: &str,
        semantics: &SemanticTables,
        collect_comments: bool,
    ) -> LoweredFile;
}

#[derive(Debug, Default)]
pub struct LoweredFile {
    pub functions: Vec<Function>,
    pub types: Vec<TypeDecl>,
    pub vars: Vec<Variable>,
}

/// Runs `lower_one` under a recovery boundary: a panic is caught,
/// logged with file:line, and the declaration is dropped so the caller
/// continues with the next one (§4.4 "Failure semantics", error
/// taxonomy's `LowerPanic`).
pub fn lower_with_recovery<T>(
    relative_path: &str,
    line: usize,
    lower_one: impl FnOnce() -> T,
) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(lower_one)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(file = relative_path, line, kind = %message, "lowering panicked, dropping declaration");
            None
        }
    }
}

/// Folds one package's files into the package's name-keyed maps,
/// merging synthesized interface methods into `functions` alongside
/// their declared counterparts.
pub fn merge_into_package(package: &mut Package, lowered: LoweredFile) {
    for function in lowered.functions {
        package.functions.insert(function.identity.name.clone(), function);
    }
    for type_decl in lowered.types {
        package.types.insert(type_decl.identity.name.clone(), type_decl);
    }
    for var in lowered.vars {
        package.vars.insert(var.identity.name.clone(), var);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_boundary_catches_panics() {
        let result: Option<i32> = lower_with_recovery("f.go", 3, || panic!("boom"));
        assert!(result.is_none());
    }

    #[test]
    fn recovery_boundary_passes_through_success() {
        let result = lower_with_recovery("f.go", 3, || 42);
        assert_eq!(result, Some(42));
    }
}
