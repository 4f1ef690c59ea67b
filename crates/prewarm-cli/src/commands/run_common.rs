//! Shared logic for compile and scan commands.

use prewarm_compiler::{CompilationBuilder, OptimizationMode};
use prewarm_core::{Arch, MethodId, Module, ModuleView};

/// Configure a builder from shared command-line options. With no explicit
/// roots every method is a root, so a bare `prewarm compile app.json` does
/// the whole module.
pub fn builder_for(
    module: Module,
    roots: &[String],
    all_roots: bool,
    target: Arch,
    optimization: OptimizationMode,
) -> CompilationBuilder {
    let mut builder = CompilationBuilder::new(module, target)
        .with_roots(roots.iter().cloned())
        .with_optimization(optimization);
    if all_roots || roots.is_empty() {
        builder = builder.with_all_roots();
    }
    builder
}

/// Method names in row order, captured before the module moves into a builder.
pub fn method_names(module: &Module) -> Vec<String> {
    (0..module.method_count())
        .map(|index| module.method_name(MethodId::from_index(index as usize)).to_owned())
        .collect()
}
