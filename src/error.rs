//! Typed errors for the scanner, resolver, and evaluator.
//!
//! `CycleBreak` from the design notes has no variant here: it is handled
//! entirely inside the type resolver by returning the in-progress
//! descriptor, and never escapes to a caller (spec §7, item 4).

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced across the package locator, scanner, resolver, and
/// evaluator. Every operation a caller explicitly performs returns one of
/// these; internal control-flow errors (cycle breaking) never appear here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("could not resolve import path `{import_path}`: {reason}")]
    LocatorNotFound {
        import_path: String,
        reason: String,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("symbol `{name}` not found in package `{pkg_path}`")]
    SymbolNotFound { pkg_path: String, name: String },

    #[error("evaluation error: {message}")]
    Evaluation { message: String },

    #[error("step budget of {limit} steps exceeded")]
    StepBudgetExceeded { limit: u64 },

    #[error("call stack depth of {limit} exceeded")]
    DepthExceeded { limit: usize },

    #[error("panic: {message}")]
    Panic { message: String },

    #[error("identity cache at {path} was corrupt and has been reset: {message}")]
    CacheCorruption { path: PathBuf, message: String },

    #[error("package `{dir}` mixes package clauses `{first}` and `{second}`")]
    MixedPackage {
        dir: PathBuf,
        first: String,
        second: String,
    },
}

pub type ScanResult<T> = Result<T, ScanError>;
