//! Tests for CLI dispatch logic.
//!
//! These tests verify:
//! 1. Params extraction: correct fields are extracted from ArgMatches
//! 2. Defaults: target/opt fall back to x64/blended when omitted
//! 3. Validation: bad enum values are rejected by clap, not by us

use std::path::PathBuf;

use prewarm_compiler::OptimizationMode;
use prewarm_core::Arch;

use super::*;
use crate::cli::commands::{compile_command, dump_command, scan_command};

#[test]
fn compile_extracts_all_fields() {
    let cmd = compile_command();
    let result = cmd.try_get_matches_from([
        "compile",
        "app.json",
        "-o",
        "app.pwi",
        "--root",
        "Main",
        "--root",
        "Start",
        "--target",
        "arm64",
        "--opt",
        "size",
    ]);
    assert!(result.is_ok(), "compile should parse: {:?}", result.err());

    let m = result.unwrap();
    let params = CompileParams::from_matches(&m);

    assert_eq!(params.module, Some(PathBuf::from("app.json")));
    assert_eq!(params.output, Some(PathBuf::from("app.pwi")));
    assert_eq!(params.roots, vec!["Main".to_string(), "Start".to_string()]);
    assert!(!params.all_roots);
    assert_eq!(params.target, Arch::Arm64);
    assert_eq!(params.optimization, OptimizationMode::PreferSize);
}

#[test]
fn compile_defaults_when_flags_omitted() {
    let cmd = compile_command();
    let result = cmd.try_get_matches_from(["compile", "app.json"]);
    assert!(result.is_ok(), "compile should parse: {:?}", result.err());

    let m = result.unwrap();
    let params = CompileParams::from_matches(&m);

    assert_eq!(params.module, Some(PathBuf::from("app.json")));
    assert_eq!(params.output, None);
    assert!(params.roots.is_empty());
    assert!(!params.all_roots);
    assert_eq!(params.target, Arch::X64);
    assert_eq!(params.optimization, OptimizationMode::Blended);
}

#[test]
fn compile_accepts_all_roots_flag() {
    let cmd = compile_command();
    let result = cmd.try_get_matches_from(["compile", "app.json", "--all-roots"]);
    assert!(result.is_ok());

    let m = result.unwrap();
    let params = CompileParams::from_matches(&m);
    assert!(params.all_roots);
}

#[test]
fn compile_rejects_unknown_target() {
    let cmd = compile_command();
    let result = cmd.try_get_matches_from(["compile", "app.json", "--target", "riscv"]);
    assert!(result.is_err(), "riscv is not a supported target");
}

#[test]
fn compile_rejects_unknown_opt_mode() {
    let cmd = compile_command();
    let result = cmd.try_get_matches_from(["compile", "app.json", "--opt", "fast"]);
    assert!(result.is_err(), "fast is not an optimization mode");
}

#[test]
fn compile_accepts_stdin_marker() {
    let cmd = compile_command();
    let result = cmd.try_get_matches_from(["compile", "-", "-o", "out.pwi"]);
    assert!(result.is_ok(), "- should parse as module: {:?}", result.err());

    let m = result.unwrap();
    let params = CompileParams::from_matches(&m);
    assert_eq!(params.module, Some(PathBuf::from("-")));
    assert_eq!(params.output, Some(PathBuf::from("out.pwi")));
}

#[test]
fn scan_extracts_all_fields() {
    let cmd = scan_command();
    let result = cmd.try_get_matches_from([
        "scan",
        "app.json",
        "--root",
        "Main",
        "--target",
        "arm64",
    ]);
    assert!(result.is_ok(), "scan should parse: {:?}", result.err());

    let m = result.unwrap();
    let params = ScanParams::from_matches(&m);

    assert_eq!(params.module, Some(PathBuf::from("app.json")));
    assert_eq!(params.roots, vec!["Main".to_string()]);
    assert!(!params.all_roots);
    assert_eq!(params.target, Arch::Arm64);
}

#[test]
fn scan_accepts_all_roots() {
    let cmd = scan_command();
    let result = cmd.try_get_matches_from(["scan", "app.json", "--all-roots"]);
    assert!(result.is_ok());

    let m = result.unwrap();
    let params = ScanParams::from_matches(&m);
    assert!(params.all_roots);
    assert_eq!(params.target, Arch::X64);
}

#[test]
fn dump_extracts_image_path() {
    let cmd = dump_command();
    let result = cmd.try_get_matches_from(["dump", "app.pwi"]);
    assert!(result.is_ok(), "dump should parse: {:?}", result.err());

    let m = result.unwrap();
    let params = DumpParams::from_matches(&m);
    assert_eq!(params.image, Some(PathBuf::from("app.pwi")));
}

#[test]
fn dump_rejects_compile_flags() {
    let cmd = dump_command();
    let result = cmd.try_get_matches_from(["dump", "app.pwi", "--root", "Main"]);
    assert!(result.is_err(), "dump has no --root flag");
}

#[test]
fn compile_params_convert_to_args() {
    let cmd = compile_command();
    let m = cmd
        .try_get_matches_from(["compile", "app.json", "--root", "Main", "--opt", "speed"])
        .unwrap();
    let args: crate::commands::compile::CompileArgs = CompileParams::from_matches(&m).into();

    assert_eq!(args.module, Some(PathBuf::from("app.json")));
    assert_eq!(args.roots, vec!["Main".to_string()]);
    assert_eq!(args.optimization, OptimizationMode::PreferSpeed);
}

#[test]
fn scan_params_convert_to_args() {
    let cmd = scan_command();
    let m = cmd
        .try_get_matches_from(["scan", "app.json", "--all-roots"])
        .unwrap();
    let args: crate::commands::scan::ScanArgs = ScanParams::from_matches(&m).into();

    assert_eq!(args.module, Some(PathBuf::from("app.json")));
    assert!(args.all_roots);
    assert_eq!(args.target, Arch::X64);
}
