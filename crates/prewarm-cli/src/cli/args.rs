//! Shared argument builders for CLI commands.
//!
//! Each function returns a `clap::Arg` that can be composed into commands,
//! so compile and scan stay flag-compatible.

use std::path::PathBuf;

use clap::{Arg, ArgAction, value_parser};

/// Module description file (positional).
pub fn module_path_arg() -> Arg {
    Arg::new("module")
        .value_name("MODULE")
        .value_parser(value_parser!(PathBuf))
        .help("Module description file (use \"-\" for stdin)")
}

/// Image file to inspect (positional).
pub fn image_path_arg() -> Arg {
    Arg::new("image")
        .value_name("IMAGE")
        .value_parser(value_parser!(PathBuf))
        .help("Warm image file")
}

/// Write the image to a file (-o/--output).
pub fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Output image path (default: module name with .pwi)")
}

/// Named root method (--root, repeatable).
pub fn root_arg() -> Arg {
    Arg::new("root")
        .long("root")
        .value_name("NAME")
        .action(ArgAction::Append)
        .help("Compile starting from this method (repeatable)")
}

/// Root every defined method (--all-roots).
pub fn all_roots_arg() -> Arg {
    Arg::new("all_roots")
        .long("all-roots")
        .action(ArgAction::SetTrue)
        .help("Compile every method the module defines (default when no --root)")
}

/// Target architecture (--target).
pub fn target_arg() -> Arg {
    Arg::new("target")
        .long("target")
        .value_name("ARCH")
        .default_value("x64")
        .value_parser(["x64", "arm64"])
        .help("Target architecture")
}

/// Code-quality preference (--opt).
pub fn opt_arg() -> Arg {
    Arg::new("opt")
        .long("opt")
        .value_name("MODE")
        .default_value("blended")
        .value_parser(["blended", "size", "speed"])
        .help("Code-quality preference")
}
