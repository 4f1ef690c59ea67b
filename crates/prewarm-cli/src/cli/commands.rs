//! Command builders for the CLI.

use clap::Command;

use super::args::*;

/// Build the complete CLI with all subcommands.
pub fn build_cli() -> Command {
    Command::new("prewarm")
        .about("Ahead-of-time compiler for loader-patched warm images")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(compile_command())
        .subcommand(scan_command())
        .subcommand(dump_command())
}

/// Compile a module into a warm image.
pub fn compile_command() -> Command {
    Command::new("compile")
        .about("Compile a module into a warm image")
        .override_usage(
            "\
  prewarm compile <MODULE>
  prewarm compile <MODULE> --root <NAME> [-o <FILE>]",
        )
        .after_help(
            r#"EXAMPLES:
  prewarm compile app.json                 # every method, writes app.pwi
  prewarm compile app.json --root Main     # only what Main reaches
  prewarm compile app.json -o warm/app.pwi
  prewarm compile - < app.json             # module from stdin"#,
        )
        .arg(module_path_arg())
        .arg(output_arg())
        .arg(root_arg())
        .arg(all_roots_arg())
        .arg(target_arg())
        .arg(opt_arg())
}

/// Report scan outcomes without writing an image.
pub fn scan_command() -> Command {
    Command::new("scan")
        .about("Report which methods would compile, without writing an image")
        .override_usage(
            "\
  prewarm scan <MODULE>
  prewarm scan <MODULE> --root <NAME>",
        )
        .after_help(
            r#"EXAMPLES:
  prewarm scan app.json                # one line per method
  prewarm scan app.json --root Main    # only what Main reaches"#,
        )
        .arg(module_path_arg())
        .arg(root_arg())
        .arg(all_roots_arg())
        .arg(target_arg())
}

/// Show the contents of a warm image.
pub fn dump_command() -> Command {
    Command::new("dump")
        .about("Show the contents of a warm image")
        .override_usage("  prewarm dump <IMAGE>")
        .after_help(
            r#"EXAMPLES:
  prewarm dump app.pwi"#,
        )
        .arg(image_path_arg())
}
