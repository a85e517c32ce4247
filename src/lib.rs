//! goscope: static analysis for Go built on a real Go grammar
//! (`tree-sitter-go`) instead of regexes. Packages are scanned lazily and
//! cached by import path; type references resolve to shared declarations
//! rather than copies, so identity checks (`Arc::ptr_eq`) hold across a
//! whole analysis run; and a symbolic evaluator walks function bodies
//! exploring every branch, so "is this function reachable" stays sound
//! even though no concrete input values are ever known.
//!
//! The component pipeline, cheapest to most expensive:
//!
//! - [`fs`] / [`module`] / [`locator`]: resolve a Go import path to a
//!   directory, honoring `go.mod`'s `replace`/`require` directives.
//! - [`scanner`] / [`cache`]: parse one package's declarations once and
//!   cache the result.
//! - [`resolver`]: turn a field's type reference into the `TypeInfo` it
//!   names, scanning on demand.
//! - [`walker`]: build an import graph across a whole module without
//!   paying for full declaration scans.
//! - [`object`] / [`intrinsics`] / [`policy`] / [`finalize`] / [`eval`]:
//!   the symbolic evaluator and its supporting registries.
//! - [`symcache`] / [`config`]: the on-disk identity cache and
//!   `.goscope/config.toml` configuration layer.

pub mod cache;
pub mod config;
pub mod error;
pub mod eval;
pub mod finalize;
pub mod fs;
pub mod intrinsics;
pub mod locator;
pub mod module;
pub mod object;
pub mod policy;
pub mod resolver;
pub mod scanner;
pub mod symcache;
pub mod types;
pub mod walker;

pub use error::{ScanError, ScanResult};
