use std::path::PathBuf;

use prewarm_compiler::OptimizationMode;
use prewarm_core::{Arch, MethodId, ModuleView};

use super::module_loader::load_module;
use super::run_common::{builder_for, method_names};

pub struct ScanArgs {
    pub module: Option<PathBuf>,
    pub roots: Vec<String>,
    pub all_roots: bool,
    pub target: Arch,
}

/// Dry run: compile in memory, report per-method outcomes, write nothing.
pub fn run(args: ScanArgs) {
    let module = match load_module(args.module.as_deref()) {
        Ok(module) => module,
        Err(msg) => {
            eprintln!("error: {}", msg);
            std::process::exit(1);
        }
    };

    let names = method_names(&module);
    let method_count = module.method_count();

    let builder = builder_for(
        module,
        &args.roots,
        args.all_roots,
        args.target,
        OptimizationMode::Blended,
    );
    let compilation = match builder.compile() {
        Ok(compilation) => compilation,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let results = &compilation.scan_results;
    for index in 0..method_count {
        let id = MethodId::from_index(index as usize);
        let name = &names[id.index()];
        if results.compiled.contains(&id) {
            println!("ok    {}", name);
        } else if let Some((_, reason)) = results.excluded.iter().find(|(m, _)| *m == id) {
            println!("skip  {}: {}", name, reason);
        } else {
            println!("--    {}", name);
        }
    }
}
