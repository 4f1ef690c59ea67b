//! Table nodes and the data the writer feeds them.
//!
//! Method code encodes before any table exists; the writer then fills a
//! [`TableSet`] from those encodings and only afterwards encodes the
//! table nodes themselves. The header directory encodes last of all,
//! re-encoding each section it describes to learn its size.

use indexmap::IndexSet;
use prewarm_image::compressed;
use prewarm_image::header::{FLAG_PARTIAL, MAGIC, VERSION_MAJOR, VERSION_MINOR};

use crate::compact::EntryPointTable;
use crate::graph::NodeId;
use crate::nodes::object_data::{ObjectData, ObjectDataBuilder, RelocKind};
use crate::nodes::{EncodeContext, EncodeMode, encode_object};

/// Identifier string published in the image.
pub fn compiler_identifier() -> String {
    format!("prewarm {}", env!("CARGO_PKG_VERSION"))
}

/// One runtime-functions row before layout: bounds stay node-relative
/// until the writer patches them into addresses.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeFunctionRow {
    pub code: NodeId,
    pub code_len: u32,
    pub gc_offset: u32,
}

/// Deduplicating GC info storage; identical blobs collapse to one offset.
#[derive(Default)]
pub struct GcInfoTable {
    blobs: IndexSet<Vec<u8>>,
    offsets: Vec<u32>,
    total: u32,
}

impl GcInfoTable {
    /// Byte offset of `blob` within the encoded table, interning it on
    /// first sight.
    pub fn intern(&mut self, blob: Vec<u8>) -> u32 {
        let len = blob.len() as u32;
        let (index, inserted) = self.blobs.insert_full(blob);
        if inserted {
            self.offsets.push(self.total);
            self.total += len;
        }
        self.offsets[index]
    }

    pub fn byte_len(&self) -> u32 {
        self.total
    }

    fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total as usize);
        for blob in &self.blobs {
            out.extend_from_slice(blob);
        }
        out
    }
}

/// Everything the writer derives from the method pass. Starts empty so
/// method code can encode before any table is populated.
#[derive(Default)]
pub struct TableSet {
    pub runtime_functions: Vec<RuntimeFunctionRow>,
    pub gc_info: GcInfoTable,
    pub method_entries: EntryPointTable,
    pub instance_entries: EntryPointTable,
    pub available_types: Vec<u32>,
}

pub fn encode_compiler_identifier(mode: EncodeMode) -> ObjectData {
    let mut builder = ObjectDataBuilder::new(mode, 1);
    builder.extend(compiler_identifier().as_bytes());
    builder.build()
}

pub fn encode_runtime_functions(cx: &EncodeContext<'_>, mode: EncodeMode) -> ObjectData {
    let gc_info = cx.factory.gc_info_node();
    let mut builder = ObjectDataBuilder::new(mode, 4);
    for row in &cx.tables.runtime_functions {
        builder.emit_reloc(RelocKind::Addr32Nb, row.code, 0);
        builder.emit_reloc(RelocKind::Addr32Nb, row.code, i64::from(row.code_len));
        builder.emit_reloc(RelocKind::Addr32Nb, gc_info, i64::from(row.gc_offset));
    }
    builder.build()
}

pub fn encode_gc_info(cx: &EncodeContext<'_>, mode: EncodeMode) -> ObjectData {
    let mut builder = ObjectDataBuilder::new(mode, 4);
    builder.extend(&cx.tables.gc_info.bytes());
    builder.build()
}

pub fn encode_available_types(
    cx: &EncodeContext<'_>,
    mode: EncodeMode,
) -> prewarm_image::Result<ObjectData> {
    let mut payload = Vec::new();
    compressed::encode_unsigned(cx.tables.available_types.len() as u32, &mut payload)?;
    for &rid in &cx.tables.available_types {
        compressed::encode_unsigned(rid, &mut payload)?;
    }
    let mut builder = ObjectDataBuilder::new(mode, 1);
    builder.extend(&payload);
    Ok(builder.build())
}

pub fn encode_entry_points(
    table: &EntryPointTable,
    mode: EncodeMode,
) -> prewarm_image::Result<ObjectData> {
    let mut builder = ObjectDataBuilder::new(mode, 1);
    builder.extend(&table.to_bytes()?);
    Ok(builder.build())
}

/// The header directory: preamble plus one record per section, emitted
/// in creation order, which layout keeps ascending by address.
pub fn encode_header(cx: &EncodeContext<'_>, mode: EncodeMode) -> crate::Result<ObjectData> {
    let mut builder = ObjectDataBuilder::new(mode, 4);
    builder.write_u32(MAGIC);
    builder.write_u16(VERSION_MAJOR);
    builder.write_u16(VERSION_MINOR);
    let flags = if cx.factory.is_partial() { FLAG_PARTIAL } else { 0 };
    builder.write_u32(flags);
    let directory = cx.factory.directory_nodes();
    builder.write_u32(directory.len() as u32);
    for (section, node) in directory {
        let Some(encoded) = encode_object(cx, node, EncodeMode::Full)? else {
            unreachable!("directory sections encode standalone");
        };
        builder.write_u32(section as u32);
        builder.emit_reloc(RelocKind::Addr32Nb, node, 0);
        builder.write_u32(encoded.len() as u32);
    }
    Ok(builder.build())
}
