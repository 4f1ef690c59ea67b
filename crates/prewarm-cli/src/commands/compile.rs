use std::path::PathBuf;

use prewarm_compiler::OptimizationMode;
use prewarm_core::Arch;

use super::module_loader::{default_output, load_module};
use super::run_common::{builder_for, method_names};

pub struct CompileArgs {
    pub module: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub roots: Vec<String>,
    pub all_roots: bool,
    pub target: Arch,
    pub optimization: OptimizationMode,
}

pub fn run(args: CompileArgs) {
    let module = match load_module(args.module.as_deref()) {
        Ok(module) => module,
        Err(msg) => {
            eprintln!("error: {}", msg);
            std::process::exit(1);
        }
    };

    // The builder takes the module by value; keep what the reports need.
    let names = method_names(&module);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(args.module.as_deref(), &module));

    let builder = builder_for(
        module,
        &args.roots,
        args.all_roots,
        args.target,
        args.optimization,
    );
    let compilation = match builder.compile() {
        Ok(compilation) => compilation,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    for (method, reason) in &compilation.scan_results.excluded {
        eprintln!("warning: skipped {}: {}", names[method.index()], reason);
    }

    if let Err(e) = compilation.write_image(&output) {
        eprintln!("error: failed to write '{}': {}", output.display(), e);
        std::process::exit(1);
    }

    let compiled = compilation.scan_results.compiled.len();
    if compilation.is_partial {
        let skipped = compilation.scan_results.excluded.len();
        println!(
            "wrote {} ({} methods, {} skipped)",
            output.display(),
            compiled,
            skipped
        );
    } else {
        println!("wrote {} ({} methods)", output.display(), compiled);
    }
}
