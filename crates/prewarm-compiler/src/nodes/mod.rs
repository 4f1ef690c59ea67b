//! Node payloads and their encodings.
//!
//! Every image artifact is one node in the factory's graph: method code,
//! import cells and their signatures, thunks, and the singleton tables.
//! A node encodes to an [`ObjectData`]; the writer lays those out into
//! image sections and patches their relocations. Import cells are the
//! one exception: they have no standalone encoding and live inside their
//! section's cell array.

pub mod imports;
pub mod method;
pub mod object_data;
pub mod signature;
pub mod tables;
pub mod thunk;

#[cfg(test)]
mod object_data_tests;
#[cfg(test)]
mod signature_tests;
#[cfg(test)]
mod thunk_tests;

use prewarm_image::FormatError;

use crate::factory::NodeFactory;
use crate::graph::NodeId;
use crate::nodes::imports::{ImportCellData, SectionId};
use crate::nodes::method::MethodCodeData;
use crate::nodes::object_data::{ObjectData, ObjectDataBuilder};
use crate::nodes::signature::SignatureDesc;
use crate::nodes::tables::TableSet;
use crate::nodes::thunk::ThunkData;

/// Which image section a node is laid out in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageSection {
    Text,
    ReadOnly,
    Data,
}

/// What a node is. Singleton tables carry no payload; their content
/// comes from the [`TableSet`] at encode time.
pub enum NodeData {
    Header,
    CompilerIdent,
    ImportSectionsTable,
    RuntimeFunctions,
    GcInfo,
    MethodEntryPoints,
    InstanceEntryPoints,
    AvailableTypes,
    MethodCode(MethodCodeData),
    ImportCell(ImportCellData),
    Signature(SignatureDesc),
    Thunk(ThunkData),
    ImportCells(SectionId),
    ImportSignatures(SectionId),
}

pub struct Node {
    pub data: NodeData,
    pub section: ImageSection,
    pub marked: bool,
}

/// Whether an encode keeps bytes or only relocation structure.
///
/// `RelocsOnly` exists for the fixup pre-pass: it must see exactly the
/// relocations a full encode would emit without paying for the bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeMode {
    Full,
    RelocsOnly,
}

/// Read-only state every encode runs against.
pub struct EncodeContext<'a> {
    pub factory: &'a NodeFactory,
    pub tables: &'a TableSet,
}

/// Encode one marked node. `None` is an import cell: it is addressed
/// through its section's cell array and has no object of its own.
pub fn encode_object(
    cx: &EncodeContext<'_>,
    id: NodeId,
    mode: EncodeMode,
) -> crate::Result<Option<ObjectData>> {
    let node = cx.factory.node(id);
    assert!(
        node.marked,
        "encoding unmarked {id} ({})",
        cx.factory.symbol_name(id)
    );
    let data = match &node.data {
        NodeData::Header => Some(tables::encode_header(cx, mode)?),
        NodeData::CompilerIdent => Some(tables::encode_compiler_identifier(mode)),
        NodeData::ImportSectionsTable => Some(imports::encode_sections_table(cx, mode)),
        NodeData::RuntimeFunctions => Some(tables::encode_runtime_functions(cx, mode)),
        NodeData::GcInfo => Some(tables::encode_gc_info(cx, mode)),
        NodeData::MethodEntryPoints => {
            Some(tables::encode_entry_points(&cx.tables.method_entries, mode)?)
        }
        NodeData::InstanceEntryPoints => {
            Some(tables::encode_entry_points(&cx.tables.instance_entries, mode)?)
        }
        NodeData::AvailableTypes => Some(tables::encode_available_types(cx, mode)?),
        NodeData::MethodCode(data) => Some(method::encode_method_code(cx, data, mode)),
        NodeData::ImportCell(_) => None,
        NodeData::Signature(desc) => Some(encode_signature(desc, mode)?),
        NodeData::Thunk(data) => Some(cx.factory.thunk_encoder().encode(data, mode)),
        NodeData::ImportCells(section) => Some(imports::encode_cells(cx, *section, mode)),
        NodeData::ImportSignatures(section) => {
            Some(imports::encode_signature_addresses(cx, *section, mode))
        }
    };
    Ok(data)
}

fn encode_signature(desc: &SignatureDesc, mode: EncodeMode) -> Result<ObjectData, FormatError> {
    let bytes = desc.encode()?;
    let mut builder = ObjectDataBuilder::new(mode, 1);
    builder.extend(&bytes);
    Ok(builder.build())
}
