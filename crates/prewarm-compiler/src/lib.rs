#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Warm-image compiler back end.
//!
//! Turns a portable module description into a native PE image whose method
//! bodies are pre-compiled and whose cross-module references are
//! loader-resolved fixup cells:
//! - `graph` - node ids, dependency lists, and the mark phase
//! - `policy` - pluggable placement/devirtualization/layout seams
//! - `scan` - per-instruction requirement classification
//! - `nodes` - the closed node set and its object encodings
//! - `factory` - per-session node creation and canonicalization
//! - `compact` - two-pass entry-point table serialization
//! - `compilation` - the staged `CompilationBuilder` pipeline
//! - `writer` - section layout, relocation, and PE emission

pub mod compact;
pub mod compilation;
pub mod factory;
pub mod graph;
pub mod nodes;
pub mod policy;
pub mod scan;
pub mod writer;

#[cfg(test)]
mod scan_tests;
#[cfg(test)]
pub mod test_utils;
#[cfg(test)]
mod writer_tests;

use prewarm_core::{Arch, Token};
use thiserror::Error;

/// Why a method body cannot be processed by the scanner.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScanFailure {
    #[error("token {0} does not resolve in this module")]
    UnresolvedToken(Token),
    #[error("type {0} is runtime-determined and cannot be pre-compiled")]
    RuntimeDeterminedShape(Token),
    #[error("string #{0} is not present in the module")]
    MissingString(u32),
    #[error("method requires a generic dictionary with {entries} entries")]
    DictionaryRequired { entries: u32 },
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("method `{method}` cannot be compiled: {reason}")]
    MethodFailed { method: String, reason: ScanFailure },
    #[error("no delay-load thunk encoder for target architecture `{0}`")]
    UnsupportedTarget(Arch),
    #[error("root method `{0}` not found in module")]
    UnknownRoot(String),
    #[error(transparent)]
    Format(#[from] prewarm_image::FormatError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CompileError>;

pub use compilation::{Compilation, CompilationBuilder, OptimizationMode, ScanResults};
pub use factory::NodeFactory;
pub use graph::NodeId;
pub use policy::{
    DefaultDevirtualizer, Devirtualizer, DictionaryLayoutProvider, EmptyDictionaryLayout,
    LazyVtableSlots, MethodPlacement, Policies, SingleModulePlacement, VtableSlotProvider,
};
