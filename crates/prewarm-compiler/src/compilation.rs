//! The staged compilation pipeline.
//!
//! [`CompilationBuilder`] collects the module, target, roots, and policy
//! overrides; [`CompilationBuilder::compile`] then runs two mark phases
//! over fresh factories. The first is conservative: method bodies that
//! fail to scan are recorded and their edges dropped. The second starts
//! over with the failed set excluded, so every call to a dropped method
//! degrades to a loader-resolved import; a scan failure in this phase is
//! a hard error. The marked graph is then frozen and serialized.
//!
//! A body's scan outcome depends only on the body itself, never on which
//! other methods are excluded, so one conservative phase finds the whole
//! failed set and no fixpoint iteration is needed.

use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexSet;
use prewarm_core::{Arch, MethodId, ModuleView};

use crate::factory::NodeFactory;
use crate::graph::{DependencyList, MarkSource, NodeId, mark_reachable};
use crate::nodes::NodeData;
use crate::nodes::thunk::thunk_encoder_for;
use crate::policy::{
    Devirtualizer, DictionaryLayoutProvider, MethodPlacement, Policies, VtableSlotProvider,
};
use crate::writer::{emit_image, write_guarded};
use crate::{CompileError, ScanFailure};

/// Code-quality preference recorded with a compilation. The current x64
/// encoder emits the same code under all three; the mode travels with
/// the output so tooling can tell the images apart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptimizationMode {
    #[default]
    Blended,
    PreferSize,
    PreferSpeed,
}

/// Which methods made it into the image, and which were dropped.
#[derive(Debug)]
pub struct ScanResults {
    /// Methods whose bodies compiled, in discovery order.
    pub compiled: Vec<MethodId>,
    /// Methods left to the loader, with the reason each was dropped.
    pub excluded: Vec<(MethodId, ScanFailure)>,
}

/// A finished image plus everything recorded while producing it.
#[derive(Debug)]
pub struct Compilation {
    /// True when at least one reachable method was dropped; the image
    /// header carries the matching flag.
    pub is_partial: bool,
    pub scan_results: ScanResults,
    pub optimization: OptimizationMode,
    pub image_bytes: Vec<u8>,
}

impl Compilation {
    /// Write the image to `path`; a failed write removes the file.
    pub fn write_image(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        write_guarded(path.as_ref(), |file| file.write_all(&self.image_bytes))?;
        Ok(())
    }
}

pub struct CompilationBuilder {
    module: Rc<dyn ModuleView>,
    target: Arch,
    policies: Policies,
    optimization: OptimizationMode,
    roots: Vec<String>,
    all_roots: bool,
}

impl CompilationBuilder {
    pub fn new(module: impl ModuleView + 'static, target: Arch) -> CompilationBuilder {
        CompilationBuilder {
            module: Rc::new(module),
            target,
            policies: Policies::default(),
            optimization: OptimizationMode::default(),
            roots: Vec::new(),
            all_roots: false,
        }
    }

    /// Root the compilation at a named method.
    pub fn with_root(mut self, name: impl Into<String>) -> CompilationBuilder {
        self.roots.push(name.into());
        self
    }

    pub fn with_roots<I, S>(mut self, names: I) -> CompilationBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots.extend(names.into_iter().map(Into::into));
        self
    }

    /// Root every method the module defines.
    pub fn with_all_roots(mut self) -> CompilationBuilder {
        self.all_roots = true;
        self
    }

    pub fn with_placement(
        mut self,
        placement: impl MethodPlacement + 'static,
    ) -> CompilationBuilder {
        self.policies.placement = Rc::new(placement);
        self
    }

    pub fn with_devirtualizer(
        mut self,
        devirtualizer: impl Devirtualizer + 'static,
    ) -> CompilationBuilder {
        self.policies.devirtualizer = Rc::new(devirtualizer);
        self
    }

    pub fn with_vtable_slots(
        mut self,
        slots: impl VtableSlotProvider + 'static,
    ) -> CompilationBuilder {
        self.policies.vtable_slots = Rc::new(slots);
        self
    }

    pub fn with_dictionary_layout(
        mut self,
        layout: impl DictionaryLayoutProvider + 'static,
    ) -> CompilationBuilder {
        self.policies.dictionary_layout = Rc::new(layout);
        self
    }

    pub fn with_optimization(mut self, mode: OptimizationMode) -> CompilationBuilder {
        self.optimization = mode;
        self
    }

    pub fn compile(self) -> crate::Result<Compilation> {
        let Some(encoder) = thunk_encoder_for(self.target) else {
            return Err(CompileError::UnsupportedTarget(self.target));
        };
        let root_methods = self.resolve_roots()?;

        // Conservative phase: find every reachable body that cannot scan.
        let mut factory = NodeFactory::new(
            Rc::clone(&self.module),
            self.policies.clone(),
            encoder,
            IndexSet::new(),
        );
        let roots = session_roots(&mut factory, &root_methods);
        let mut session = SessionGraph {
            factory: &mut factory,
            mode: ExpandMode::Conservative,
            failures: Vec::new(),
        };
        mark_reachable(&mut session, &roots)?;
        let excluded_list = session.failures;
        let excluded: IndexSet<MethodId> = excluded_list.iter().map(|&(m, _)| m).collect();

        // Final phase: fresh graph, dropped methods excluded. Failed roots
        // are not re-rooted; calls to them import their entry points.
        let live_roots: Vec<MethodId> = root_methods
            .iter()
            .copied()
            .filter(|m| !excluded.contains(m))
            .collect();
        let mut factory = NodeFactory::new(
            Rc::clone(&self.module),
            self.policies.clone(),
            encoder,
            excluded,
        );
        let roots = session_roots(&mut factory, &live_roots);
        let mut session = SessionGraph {
            factory: &mut factory,
            mode: ExpandMode::Fatal,
            failures: Vec::new(),
        };
        mark_reachable(&mut session, &roots)?;

        factory.freeze_import_cells();
        let image_bytes = emit_image(&factory)?;

        let compiled = factory
            .method_nodes()
            .filter(|&(node, _, _)| factory.is_marked(node))
            .map(|(_, method, _)| method)
            .collect();
        Ok(Compilation {
            is_partial: factory.is_partial(),
            scan_results: ScanResults {
                compiled,
                excluded: excluded_list,
            },
            optimization: self.optimization,
            image_bytes,
        })
    }

    fn resolve_roots(&self) -> crate::Result<Vec<MethodId>> {
        let mut methods: IndexSet<MethodId> = IndexSet::new();
        for name in &self.roots {
            let Some(method) = self.module.find_method(name) else {
                return Err(CompileError::UnknownRoot(name.clone()));
            };
            methods.insert(method);
        }
        if self.all_roots {
            for index in 0..self.module.method_count() {
                methods.insert(MethodId::from_index(index as usize));
            }
        }
        Ok(methods.into_iter().collect())
    }
}

/// Every session is rooted at the header and the module handle; named
/// method roots come after.
fn session_roots(factory: &mut NodeFactory, methods: &[MethodId]) -> Vec<(NodeId, &'static str)> {
    let mut roots = vec![
        (factory.header_node(), "image header"),
        (factory.module_cell(), "module handle"),
    ];
    for &method in methods {
        roots.push((factory.method_entrypoint(method), "entry point"));
    }
    roots
}

enum ExpandMode {
    /// Record method scan failures and drop their edges.
    Conservative,
    /// Scan failures abort the compilation.
    Fatal,
}

/// [`MarkSource`] over one factory session.
struct SessionGraph<'a> {
    factory: &'a mut NodeFactory,
    mode: ExpandMode,
    failures: Vec<(MethodId, ScanFailure)>,
}

impl MarkSource for SessionGraph<'_> {
    type Error = CompileError;

    fn try_mark(&mut self, node: NodeId) -> bool {
        self.factory.try_mark(node)
    }

    fn expand(&mut self, node: NodeId, deps: &mut DependencyList) -> Result<(), CompileError> {
        match self.factory.node_dependencies(node) {
            Ok(list) => {
                for dep in list.iter() {
                    deps.push(dep.target, dep.reason);
                }
                Ok(())
            }
            Err(failure) => {
                let NodeData::MethodCode(data) = &self.factory.node(node).data else {
                    unreachable!("only method code can fail to expand");
                };
                let method = data.method;
                match self.mode {
                    ExpandMode::Conservative => {
                        self.failures.push((method, failure));
                        Ok(())
                    }
                    ExpandMode::Fatal => Err(CompileError::MethodFailed {
                        method: self.factory.module().method_name(method).to_owned(),
                        reason: failure,
                    }),
                }
            }
        }
    }
}
