//! Per-session node factory.
//!
//! One factory owns every node of one compilation session: the singleton
//! tables, the four standard import sections, and whatever method code,
//! cells, signatures, and thunks the mark phase discovers. Creation is
//! canonicalizing: asking twice for the same method or the same import
//! yields the same node, which is what lets distinct call sites share
//! one cell.
//!
//! Section cell order is provisional until [`NodeFactory::freeze_import_cells`]
//! drops unmarked cells and assigns final indices; nothing may create an
//! import after that.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use prewarm_core::{MethodId, ModuleView, Token};
use prewarm_image::fixups::HelperId;
use prewarm_image::header::SectionType;

use crate::ScanFailure;
use crate::graph::{DependencyList, NodeId};
use crate::nodes::imports::{ImportCellData, ImportSection, SectionId, StandardSection};
use crate::nodes::method::MethodCodeData;
use crate::nodes::signature::SignatureDesc;
use crate::nodes::thunk::{ThunkData, ThunkEncoder};
use crate::nodes::{ImageSection, Node, NodeData};
use crate::policy::Policies;
use crate::scan::{Need, Scanner};

pub struct NodeFactory {
    module: Rc<dyn ModuleView>,
    policies: Policies,
    thunk_encoder: &'static dyn ThunkEncoder,
    excluded: IndexSet<MethodId>,
    nodes: Vec<Node>,
    sections: Vec<ImportSection>,
    method_cache: IndexMap<(MethodId, Token), NodeId>,
    import_cache: IndexMap<SignatureDesc, NodeId>,
    header: NodeId,
    compiler_ident: NodeId,
    import_sections_table: NodeId,
    runtime_functions: NodeId,
    method_entry_points: NodeId,
    available_types: NodeId,
    instance_entry_points: NodeId,
    gc_info: NodeId,
    module_cell: NodeId,
    frozen: bool,
}

impl NodeFactory {
    pub fn new(
        module: Rc<dyn ModuleView>,
        policies: Policies,
        thunk_encoder: &'static dyn ThunkEncoder,
        excluded: IndexSet<MethodId>,
    ) -> NodeFactory {
        let placeholder = NodeId::from_index(0);
        let mut factory = NodeFactory {
            module,
            policies,
            thunk_encoder,
            excluded,
            nodes: Vec::new(),
            sections: Vec::new(),
            method_cache: IndexMap::new(),
            import_cache: IndexMap::new(),
            header: placeholder,
            compiler_ident: placeholder,
            import_sections_table: placeholder,
            runtime_functions: placeholder,
            method_entry_points: placeholder,
            available_types: placeholder,
            instance_entry_points: placeholder,
            gc_info: placeholder,
            module_cell: placeholder,
            frozen: false,
        };
        // Singletons first: read-only layout follows node order, so this
        // keeps the directory records ascending by address.
        factory.header = factory.add_node(NodeData::Header, ImageSection::ReadOnly);
        factory.compiler_ident = factory.add_node(NodeData::CompilerIdent, ImageSection::ReadOnly);
        factory.import_sections_table =
            factory.add_node(NodeData::ImportSectionsTable, ImageSection::ReadOnly);
        factory.runtime_functions =
            factory.add_node(NodeData::RuntimeFunctions, ImageSection::ReadOnly);
        factory.method_entry_points =
            factory.add_node(NodeData::MethodEntryPoints, ImageSection::ReadOnly);
        factory.available_types =
            factory.add_node(NodeData::AvailableTypes, ImageSection::ReadOnly);
        factory.instance_entry_points =
            factory.add_node(NodeData::InstanceEntryPoints, ImageSection::ReadOnly);
        factory.gc_info = factory.add_node(NodeData::GcInfo, ImageSection::ReadOnly);
        for (index, section) in StandardSection::ALL.into_iter().enumerate() {
            let id = SectionId(index as u8);
            let cells_node = factory.add_node(NodeData::ImportCells(id), ImageSection::Data);
            let signatures_node =
                factory.add_node(NodeData::ImportSignatures(id), ImageSection::ReadOnly);
            factory.sections.push(ImportSection {
                section,
                cells: Vec::new(),
                cells_node,
                signatures_node,
            });
        }
        factory.module_cell = factory.helper_cell(HelperId::Module);
        factory
    }

    fn add_node(&mut self, data: NodeData, section: ImageSection) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            data,
            section,
            marked: false,
        });
        id
    }

    /// The canonical code node of a defined method.
    pub fn method_entrypoint(&mut self, method: MethodId) -> NodeId {
        let token = self.module.method_token(method);
        if let Some(&node) = self.method_cache.get(&(method, token)) {
            return node;
        }
        let node = self.add_node(
            NodeData::MethodCode(MethodCodeData { method, token }),
            ImageSection::Text,
        );
        self.method_cache.insert((method, token), node);
        node
    }

    /// The canonical cell for `desc`, created in `section` on first use.
    /// Cells in thunked sections get a delay-load thunk wired to the
    /// module and resolver cells.
    pub fn ensure_import(&mut self, section: StandardSection, desc: SignatureDesc) -> NodeId {
        if let Some(&cell) = self.import_cache.get(&desc) {
            return cell;
        }
        debug_assert!(!self.frozen, "imports cannot be created after freeze");
        let section_id = SectionId(section.index() as u8);
        let signature = self.add_node(NodeData::Signature(desc), ImageSection::ReadOnly);
        let cell = self.add_node(
            NodeData::ImportCell(ImportCellData {
                section: section_id,
                signature,
                thunk: None,
                cell_index: None,
            }),
            ImageSection::Data,
        );
        self.sections[section_id.index()].cells.push(cell);
        self.import_cache.insert(desc, cell);
        if section.has_thunks() {
            let delay_helper = match section {
                StandardSection::Method => HelperId::DelayLoadMethodCall,
                _ => HelperId::DelayLoadHelper,
            };
            let delay_cell = self.helper_cell(delay_helper);
            let thunk = self.add_node(
                NodeData::Thunk(ThunkData {
                    cell,
                    section_index: section_id.0,
                    module_cell: self.module_cell,
                    delay_cell,
                }),
                ImageSection::Text,
            );
            let NodeData::ImportCell(data) = &mut self.nodes[cell.index()].data else {
                unreachable!();
            };
            data.thunk = Some(thunk);
        }
        cell
    }

    /// Eager cell resolving a well-known runtime helper.
    pub fn helper_cell(&mut self, helper: HelperId) -> NodeId {
        self.ensure_import(StandardSection::Eager, SignatureDesc::Helper { id: helper })
    }

    /// Dependencies of one node, freshly computed. Method nodes classify
    /// their bodies here, creating the imports and callee nodes they
    /// reference; a classification failure discards every partial edge.
    pub fn node_dependencies(&mut self, id: NodeId) -> Result<DependencyList, ScanFailure> {
        let method = match &self.nodes[id.index()].data {
            NodeData::MethodCode(data) => Some(data.method),
            _ => None,
        };
        let mut deps = DependencyList::new();
        if let Some(method) = method {
            let needs = self.scanner().method_needs(method)?;
            for need in needs {
                match need {
                    Need::LocalCall(callee) => {
                        deps.push(self.method_entrypoint(callee), "direct call");
                    }
                    Need::Import { section, desc } => {
                        deps.push(self.ensure_import(section, desc), "import cell");
                    }
                }
            }
            return Ok(deps);
        }
        match &self.nodes[id.index()].data {
            NodeData::Header => {
                for (_, node) in self.directory_nodes() {
                    deps.push(node, "directory section");
                }
            }
            NodeData::ImportSectionsTable => {
                for section in &self.sections {
                    deps.push(section.cells_node, "cell array");
                    deps.push(section.signatures_node, "signature array");
                }
            }
            NodeData::RuntimeFunctions => deps.push(self.gc_info, "gc info"),
            NodeData::ImportCell(cell) => {
                deps.push(cell.signature, "fixup signature");
                if let Some(thunk) = cell.thunk {
                    deps.push(thunk, "delay-load thunk");
                }
            }
            NodeData::Thunk(thunk) => {
                deps.push(thunk.cell, "patched cell");
                deps.push(thunk.module_cell, "module handle");
                deps.push(thunk.delay_cell, "delay-load resolver");
            }
            _ => {}
        }
        Ok(deps)
    }

    /// Set the node's marked flag; `false` when it was already set.
    pub fn try_mark(&mut self, id: NodeId) -> bool {
        let node = &mut self.nodes[id.index()];
        if node.marked {
            false
        } else {
            node.marked = true;
            true
        }
    }

    pub fn is_marked(&self, id: NodeId) -> bool {
        self.nodes[id.index()].marked
    }

    /// Reduce every section to its marked cells, in creation order, and
    /// assign their final indices. Import creation ends here.
    pub fn freeze_import_cells(&mut self) {
        debug_assert!(!self.frozen);
        self.frozen = true;
        for section_index in 0..self.sections.len() {
            let cells: Vec<NodeId> = self.sections[section_index]
                .cells
                .iter()
                .copied()
                .filter(|&cell| self.nodes[cell.index()].marked)
                .collect();
            for (index, &cell) in cells.iter().enumerate() {
                let NodeData::ImportCell(data) = &mut self.nodes[cell.index()].data else {
                    unreachable!("section cell lists hold only cells");
                };
                data.cell_index = Some(index as u32);
            }
            self.sections[section_index].cells = cells;
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::from_index)
    }

    pub fn module(&self) -> &dyn ModuleView {
        self.module.as_ref()
    }

    pub fn scanner(&self) -> Scanner<'_> {
        Scanner {
            module: self.module.as_ref(),
            policies: &self.policies,
            excluded: &self.excluded,
        }
    }

    /// Code node of a method that already has one. Lookup-only: encode
    /// paths must never create nodes.
    pub fn method_node(&self, method: MethodId) -> NodeId {
        let token = self.module.method_token(method);
        match self.method_cache.get(&(method, token)) {
            Some(&node) => node,
            None => panic!("method `{}` has no code node", self.module.method_name(method)),
        }
    }

    /// Cell of an import that already has one. Lookup-only.
    pub fn import_node(&self, desc: &SignatureDesc) -> NodeId {
        match self.import_cache.get(desc) {
            Some(&cell) => cell,
            None => panic!("no cell for import {}", desc.describe()),
        }
    }

    /// Every method node ever created, with its identity.
    pub fn method_nodes(&self) -> impl Iterator<Item = (NodeId, MethodId, Token)> + '_ {
        self.method_cache
            .iter()
            .map(|(&(method, token), &node)| (node, method, token))
    }

    pub fn import_section(&self, id: SectionId) -> &ImportSection {
        &self.sections[id.index()]
    }

    pub fn import_sections(&self) -> &[ImportSection] {
        &self.sections
    }

    pub fn cell_signature(&self, cell: NodeId) -> NodeId {
        self.cell_data(cell).signature
    }

    pub fn cell_thunk(&self, cell: NodeId) -> Option<NodeId> {
        self.cell_data(cell).thunk
    }

    /// Section and frozen index of a cell.
    pub fn cell_slot(&self, cell: NodeId) -> (SectionId, u32) {
        let data = self.cell_data(cell);
        let Some(index) = data.cell_index else {
            panic!("cell {cell} read before freeze");
        };
        (data.section, index)
    }

    /// True for cells the loader resolves on first use; only these may
    /// appear in method fixup blobs.
    pub fn is_delayed_cell(&self, id: NodeId) -> bool {
        match &self.nodes[id.index()].data {
            NodeData::ImportCell(data) => {
                self.sections[data.section.index()].section.is_delayed()
            }
            _ => false,
        }
    }

    fn cell_data(&self, cell: NodeId) -> &ImportCellData {
        match &self.nodes[cell.index()].data {
            NodeData::ImportCell(data) => data,
            _ => panic!("{cell} is not an import cell"),
        }
    }

    pub fn header_node(&self) -> NodeId {
        self.header
    }

    pub fn gc_info_node(&self) -> NodeId {
        self.gc_info
    }

    pub fn module_cell(&self) -> NodeId {
        self.module_cell
    }

    /// The directory sections the header describes, in record order.
    pub fn directory_nodes(&self) -> [(SectionType, NodeId); 6] {
        [
            (SectionType::CompilerIdentifier, self.compiler_ident),
            (SectionType::ImportSections, self.import_sections_table),
            (SectionType::RuntimeFunctions, self.runtime_functions),
            (SectionType::MethodDefEntryPoints, self.method_entry_points),
            (SectionType::AvailableTypes, self.available_types),
            (
                SectionType::InstanceMethodEntryPoints,
                self.instance_entry_points,
            ),
        ]
    }

    pub fn is_partial(&self) -> bool {
        !self.excluded.is_empty()
    }

    pub fn excluded(&self) -> &IndexSet<MethodId> {
        &self.excluded
    }

    pub fn thunk_encoder(&self) -> &'static dyn ThunkEncoder {
        self.thunk_encoder
    }

    /// Diagnostic name of a node; among marked nodes names are unique.
    pub fn symbol_name(&self, id: NodeId) -> String {
        match &self.nodes[id.index()].data {
            NodeData::Header => "__header".to_string(),
            NodeData::CompilerIdent => "__compiler_identifier".to_string(),
            NodeData::ImportSectionsTable => "__import_sections".to_string(),
            NodeData::RuntimeFunctions => "__runtime_functions".to_string(),
            NodeData::GcInfo => "__gc_info".to_string(),
            NodeData::MethodEntryPoints => "__method_entry_points".to_string(),
            NodeData::InstanceEntryPoints => "__instance_entry_points".to_string(),
            NodeData::AvailableTypes => "__available_types".to_string(),
            NodeData::MethodCode(data) => self.module.method_name(data.method).to_string(),
            NodeData::ImportCell(data) => format!("__imp_{}", self.desc_of(data.signature)),
            NodeData::Signature(desc) => format!("__sig_{}", desc.describe()),
            NodeData::Thunk(data) => {
                format!("__thunk_{}", self.desc_of(self.cell_data(data.cell).signature))
            }
            NodeData::ImportCells(section) => {
                format!("__{}_cells", self.sections[section.index()].section.name())
            }
            NodeData::ImportSignatures(section) => {
                format!("__{}_signatures", self.sections[section.index()].section.name())
            }
        }
    }

    fn desc_of(&self, signature: NodeId) -> String {
        match &self.nodes[signature.index()].data {
            NodeData::Signature(desc) => desc.describe(),
            _ => panic!("{signature} is not a signature node"),
        }
    }
}
