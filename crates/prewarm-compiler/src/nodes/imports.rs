//! Import sections and their cells.
//!
//! A cell is one pointer-sized zero slot the loader patches. Cells are
//! created freely during marking; their offsets exist only after the
//! factory freezes each section's cell order over the marked subset.

use prewarm_image::fixups::{IMPORT_FLAG_EAGER, IMPORT_FLAG_PCODE, ImportSectionKind};

use crate::graph::NodeId;
use crate::nodes::object_data::{ObjectData, ObjectDataBuilder, RelocKind};
use crate::nodes::{EncodeContext, EncodeMode};

/// The four sections every factory creates, in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StandardSection {
    Eager,
    Method,
    Helper,
    String,
}

impl StandardSection {
    pub const ALL: [StandardSection; 4] = [
        StandardSection::Eager,
        StandardSection::Method,
        StandardSection::Helper,
        StandardSection::String,
    ];

    pub fn index(self) -> usize {
        match self {
            StandardSection::Eager => 0,
            StandardSection::Method => 1,
            StandardSection::Helper => 2,
            StandardSection::String => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StandardSection::Eager => "EagerImports",
            StandardSection::Method => "MethodImports",
            StandardSection::Helper => "HelperImports",
            StandardSection::String => "StringImports",
        }
    }

    pub fn kind(self) -> ImportSectionKind {
        match self {
            StandardSection::Method => ImportSectionKind::StubDispatch,
            StandardSection::String => ImportSectionKind::StringHandle,
            _ => ImportSectionKind::Unknown,
        }
    }

    pub fn flags(self) -> u16 {
        match self {
            StandardSection::Eager => IMPORT_FLAG_EAGER,
            StandardSection::Method | StandardSection::Helper => IMPORT_FLAG_PCODE,
            StandardSection::String => 0,
        }
    }

    /// Delayed sections resolve cells on first use rather than at load.
    pub fn is_delayed(self) -> bool {
        self.flags() & IMPORT_FLAG_EAGER == 0
    }

    /// Delayed method and helper cells own delay-load thunks; string cells
    /// are data and get resolved through fixup blobs instead.
    pub fn has_thunks(self) -> bool {
        matches!(self, StandardSection::Method | StandardSection::Helper)
    }
}

/// Index of an import section within the factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SectionId(pub(crate) u8);

impl SectionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One import section: identity plus the cell nodes it owns.
pub struct ImportSection {
    pub section: StandardSection,
    /// Cell nodes in creation order; reduced to the marked subset when the
    /// factory freezes.
    pub cells: Vec<NodeId>,
    /// Array node holding the cell slots (`.data`).
    pub cells_node: NodeId,
    /// Array node holding one signature address per cell (`.rdata`).
    pub signatures_node: NodeId,
}

impl ImportSection {
    pub fn entry_size(&self) -> u8 {
        8
    }

    pub fn byte_size(&self) -> u32 {
        self.cells.len() as u32 * self.entry_size() as u32
    }
}

/// Per-cell node payload.
pub struct ImportCellData {
    pub section: SectionId,
    pub signature: NodeId,
    /// Delay-load thunk seeded into the cell, for sections that have them.
    pub thunk: Option<NodeId>,
    /// Index within the frozen cell order; `None` until freeze.
    pub cell_index: Option<u32>,
}

/// The cell array of one section: pointer-sized slots, thunk-seeded where
/// the section has thunks, zero otherwise. Defines one symbol per cell.
pub fn encode_cells(cx: &EncodeContext<'_>, section: SectionId, mode: EncodeMode) -> ObjectData {
    let info = cx.factory.import_section(section);
    let mut builder = ObjectDataBuilder::new(mode, 8);
    for &cell in &info.cells {
        builder.define_symbol(cell);
        match cx.factory.cell_thunk(cell) {
            Some(thunk) => builder.emit_reloc(RelocKind::Dir64, thunk, 0),
            None => builder.skip(8),
        }
    }
    builder.build()
}

/// The parallel signature-address array of one section.
pub fn encode_signature_addresses(
    cx: &EncodeContext<'_>,
    section: SectionId,
    mode: EncodeMode,
) -> ObjectData {
    let info = cx.factory.import_section(section);
    let mut builder = ObjectDataBuilder::new(mode, 4);
    for &cell in &info.cells {
        builder.emit_reloc(RelocKind::Addr32Nb, cx.factory.cell_signature(cell), 0);
    }
    builder.build()
}

/// The serialized import sections table: one 20-byte record per section,
/// in creation order.
pub fn encode_sections_table(cx: &EncodeContext<'_>, mode: EncodeMode) -> ObjectData {
    let mut builder = ObjectDataBuilder::new(mode, 4);
    for info in cx.factory.import_sections() {
        builder.emit_reloc(RelocKind::Addr32Nb, info.cells_node, 0);
        builder.write_u32(info.byte_size());
        builder.write_u16(info.section.flags());
        builder.push(info.section.kind() as u8);
        builder.push(info.entry_size());
        builder.emit_reloc(RelocKind::Addr32Nb, info.signatures_node, 0);
        builder.write_u32(0); // auxiliary data, unused
    }
    builder.build()
}
