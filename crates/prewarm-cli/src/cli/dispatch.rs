//! Dispatch logic: extract params from ArgMatches and convert to command args.
//!
//! The `*Params` structs mirror what each command consumes; `from_matches()`
//! pulls the relevant fields and the `Into<*Args>` impls bridge to the
//! command handlers.

use std::path::PathBuf;

use clap::ArgMatches;
use prewarm_compiler::OptimizationMode;
use prewarm_core::Arch;

use crate::commands::compile::CompileArgs;
use crate::commands::dump::DumpArgs;
use crate::commands::scan::ScanArgs;

pub struct CompileParams {
    pub module: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub roots: Vec<String>,
    pub all_roots: bool,
    pub target: Arch,
    pub optimization: OptimizationMode,
}

impl CompileParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            module: m.get_one::<PathBuf>("module").cloned(),
            output: m.get_one::<PathBuf>("output").cloned(),
            roots: collect_roots(m),
            all_roots: m.get_flag("all_roots"),
            target: parse_target(m),
            optimization: parse_opt(m),
        }
    }
}

impl From<CompileParams> for CompileArgs {
    fn from(p: CompileParams) -> Self {
        Self {
            module: p.module,
            output: p.output,
            roots: p.roots,
            all_roots: p.all_roots,
            target: p.target,
            optimization: p.optimization,
        }
    }
}

pub struct ScanParams {
    pub module: Option<PathBuf>,
    pub roots: Vec<String>,
    pub all_roots: bool,
    pub target: Arch,
}

impl ScanParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            module: m.get_one::<PathBuf>("module").cloned(),
            roots: collect_roots(m),
            all_roots: m.get_flag("all_roots"),
            target: parse_target(m),
        }
    }
}

impl From<ScanParams> for ScanArgs {
    fn from(p: ScanParams) -> Self {
        Self {
            module: p.module,
            roots: p.roots,
            all_roots: p.all_roots,
            target: p.target,
        }
    }
}

pub struct DumpParams {
    pub image: Option<PathBuf>,
}

impl DumpParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            image: m.get_one::<PathBuf>("image").cloned(),
        }
    }
}

impl From<DumpParams> for DumpArgs {
    fn from(p: DumpParams) -> Self {
        Self { image: p.image }
    }
}

fn collect_roots(m: &ArgMatches) -> Vec<String> {
    m.get_many::<String>("root")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn parse_target(m: &ArgMatches) -> Arch {
    match m.get_one::<String>("target").map(|s| s.as_str()) {
        Some("arm64") => Arch::Arm64,
        _ => Arch::X64,
    }
}

fn parse_opt(m: &ArgMatches) -> OptimizationMode {
    match m.get_one::<String>("opt").map(|s| s.as_str()) {
        Some("size") => OptimizationMode::PreferSize,
        Some("speed") => OptimizationMode::PreferSpeed,
        _ => OptimizationMode::Blended,
    }
}
