//! Typed error taxonomy for the extraction pipeline, plus the severity
//! classification the propagation policy keys off of.

use std::fmt;

use crate::identity::Identity;

/// Every named failure mode in the pipeline, from discovery through the
/// work distributor. Most variants are absorbed locally (logged, the
/// affected unit is skipped) rather than aborting the run.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("no module owns package path {0:?}")]
    ModuleNotFound(String),

    #[error("type checker could not load package {pkg_path:?}: {underlying}")]
    PackageLoadFailed {
        pkg_path: String,
        underlying: String,
    },

    /// Sentinel used internally by the import classifier and lowering
    /// engine to short-circuit classification of a standard-library
    /// import. Never surfaced to a caller.
    #[error("system import (internal sentinel)")]
    SystemImport,

    #[error("panic while lowering {file}:{line} ({kind})")]
    LowerPanic {
        file: String,
        line: usize,
        kind: String,
    },

    #[error("alias chain for {0:?} exceeded the hop bound")]
    ResolverCircular(String),

    #[error("failed to follow external reference {0}")]
    ExternalRefFollowFailed(Identity),

    #[error("worker {pid} crashed while processing batch {batch}")]
    WorkerCrash { pid: u32, batch: usize },

    #[error("worker pool went silent for the watchdog window")]
    WorkerTimeout,

    #[error("no package produced usable output")]
    ProcessingIncomplete,
}

/// Whether an error aborts the whole run (`Fatal`) or is absorbed and
/// logged while the run continues (`Recoverable`). Mirrors the
/// propagation policy in the error handling design: most failures here
/// are per-package or per-declaration and therefore recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Recoverable,
}

impl IndexError {
    pub fn severity(&self) -> Severity {
        match self {
            IndexError::SystemImport => Severity::Recoverable,
            IndexError::ModuleNotFound(_) => Severity::Recoverable,
            IndexError::PackageLoadFailed { .. } => Severity::Recoverable,
            IndexError::LowerPanic { .. } => Severity::Recoverable,
            IndexError::ResolverCircular(_) => Severity::Recoverable,
            IndexError::ExternalRefFollowFailed(_) => Severity::Recoverable,
            IndexError::WorkerCrash { .. } => Severity::Recoverable,
            IndexError::WorkerTimeout => Severity::Fatal,
            IndexError::ProcessingIncomplete => Severity::Fatal,
        }
    }
}

/// Top-level classification of a finished run, distinguishing a clean
/// success from one that produced output despite recoverable errors
/// from one that produced nothing at all.
#[derive(Debug)]
pub enum RunOutcome {
    Clean,
    SucceededWithErrors(Vec<IndexError>),
    HardFailure(Vec<IndexError>),
}

impl RunOutcome {
    /// Exit code per the CLI contract: 0 for any success, 1 for hard
    /// failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Clean | RunOutcome::SucceededWithErrors(_) => 0,
            RunOutcome::HardFailure(_) => 1,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Clean => write!(f, "completed with no errors"),
            RunOutcome::SucceededWithErrors(errs) => {
                write!(f, "completed with {} recoverable error(s)", errs.len())
            }
            RunOutcome::HardFailure(errs) => {
                write!(f, "failed: {} error(s), no output produced", errs.len())
            }
        }
    }
}
