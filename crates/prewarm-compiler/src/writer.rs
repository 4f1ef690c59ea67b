//! Image emission: encode passes, section layout, relocation, PE shell.
//!
//! Emission runs in three passes over a frozen factory. Method code
//! encodes first, against empty tables; the runtime-function rows, GC
//! info, entry points, and fixup blobs are derived from those encodings;
//! then every other node encodes against the finished tables, the
//! header directory last since it measures the sections it describes.
//!
//! Layout is deterministic: nodes go to `.text`, `.rdata`, and `.data`
//! in creation order, and empty sections are dropped from the file.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use prewarm_image::image::NATIVE_HEADER_DIRECTORY_SLOT;

use crate::compact::encode_fixup_blob;
use crate::factory::NodeFactory;
use crate::graph::NodeId;
use crate::nodes::method::gc_info_blob;
use crate::nodes::object_data::{ObjectData, RelocKind};
use crate::nodes::tables::{RuntimeFunctionRow, TableSet};
use crate::nodes::{EncodeContext, EncodeMode, ImageSection, NodeData, encode_object};

pub const IMAGE_BASE: u64 = 0x1_8000_0000;

const FIRST_SECTION_RVA: u32 = 0x1000;
const SECTION_ALIGN: u32 = 0x1000;
const FILE_ALIGN: u32 = 0x200;
const SIZE_OF_HEADERS: u32 = 0x200;

const MACHINE_X64: u16 = 0x8664;
const PE32_PLUS_MAGIC: u16 = 0x020B;
// DLL | executable image | large address aware.
const PE_CHARACTERISTICS: u16 = 0x2022;
// High-entropy ASLR, dynamic base, NX compatible.
const DLL_CHARACTERISTICS: u16 = 0x0160;
const SUBSYSTEM_WINDOWS_CUI: u16 = 3;
const DATA_DIRECTORY_COUNT: u32 = 16;
const OPTIONAL_HEADER_SIZE: u16 = 112 + DATA_DIRECTORY_COUNT as u16 * 8;

const TEXT_FLAGS: u32 = 0x6000_0020;
const RDATA_FLAGS: u32 = 0x4000_0040;
const DATA_FLAGS: u32 = 0xC000_0040;

/// Serialize the whole image of a marked, frozen factory.
pub fn emit_image(factory: &NodeFactory) -> crate::Result<Vec<u8>> {
    #[cfg(debug_assertions)]
    check_duplicate_symbols(factory);

    // Pass 1: method code, with no tables to consult yet. The full
    // encode provides the bytes; the relocs-only encode feeds the fixup
    // derivation below and must agree with it on targets.
    let empty = TableSet::default();
    let cx = EncodeContext {
        factory,
        tables: &empty,
    };
    let mut method_full: IndexMap<NodeId, ObjectData> = IndexMap::new();
    let mut method_relocs: IndexMap<NodeId, ObjectData> = IndexMap::new();
    for (node, _, _) in factory.method_nodes() {
        if !factory.is_marked(node) {
            continue;
        }
        let Some(full) = encode_object(&cx, node, EncodeMode::Full)? else {
            unreachable!("method code always encodes");
        };
        let Some(bare) = encode_object(&cx, node, EncodeMode::RelocsOnly)? else {
            unreachable!("method code always encodes");
        };
        method_full.insert(node, full);
        method_relocs.insert(node, bare);
    }

    // Pass 2: derive the tables from the method encodings.
    let mut tables = TableSet::default();
    for (node, method, token) in factory.method_nodes() {
        if !factory.is_marked(node) {
            continue;
        }
        let code_len = method_full[&node].len() as u32;
        let gc_offset = tables
            .gc_info
            .intern(gc_info_blob(factory.module().method_row(method))?);
        let rf_index = tables.runtime_functions.len() as u32;
        tables.runtime_functions.push(RuntimeFunctionRow {
            code: node,
            code_len,
            gc_offset,
        });
        let fixups = fixups_of(factory, &method_relocs[&node]);
        let table = if factory.module().method_is_instance(method) {
            &mut tables.instance_entries
        } else {
            &mut tables.method_entries
        };
        table.set_entry(token.rid(), rf_index, fixups);
    }
    tables.available_types = factory.module().defined_type_rids();

    // Pass 3: everything else against the finished tables, header last.
    let cx = EncodeContext {
        factory,
        tables: &tables,
    };
    let mut encoded: Vec<Option<ObjectData>> = factory.node_ids().map(|_| None).collect();
    for (node, data) in method_full {
        encoded[node.index()] = Some(data);
    }
    let header = factory.header_node();
    for id in factory.node_ids() {
        if id == header || !factory.is_marked(id) || encoded[id.index()].is_some() {
            continue;
        }
        encoded[id.index()] = encode_object(&cx, id, EncodeMode::Full)?;
    }
    encoded[header.index()] = encode_object(&cx, header, EncodeMode::Full)?;

    let layout = lay_out(factory, &encoded);
    Ok(assemble(factory, &encoded, &layout))
}

/// Delayed cells a method's code references, as sorted section/cell
/// slots, nibble-encoded. `None` when it touches no delayed cell.
fn fixups_of(factory: &NodeFactory, relocs: &ObjectData) -> Option<Vec<u8>> {
    let mut slots: Vec<(u32, u32)> = relocs
        .relocs
        .iter()
        .filter(|reloc| factory.is_delayed_cell(reloc.target))
        .map(|reloc| {
            let (section, index) = factory.cell_slot(reloc.target);
            (section.index() as u32, index)
        })
        .collect();
    slots.sort_unstable();
    slots.dedup();
    if slots.is_empty() {
        None
    } else {
        Some(encode_fixup_blob(&slots))
    }
}

#[cfg(debug_assertions)]
fn check_duplicate_symbols(factory: &NodeFactory) {
    let mut seen: IndexMap<String, NodeId> = IndexMap::new();
    for id in factory.node_ids() {
        if !factory.is_marked(id) {
            continue;
        }
        let name = factory.symbol_name(id);
        if let Some(&prior) = seen.get(&name) {
            panic!("symbol `{name}` defined by both {prior} and {id}");
        }
        seen.insert(name, id);
    }
}

struct PeSectionPlan {
    name: &'static [u8; 8],
    rva: u32,
    virtual_size: u32,
    raw_offset: u32,
    raw_size: u32,
    characteristics: u32,
}

struct Layout {
    /// Final RVA per node index; `None` for nodes without a place.
    addresses: Vec<Option<u32>>,
    sections: Vec<PeSectionPlan>,
    image_size: u32,
}

fn lay_out(factory: &NodeFactory, encoded: &[Option<ObjectData>]) -> Layout {
    let mut addresses: Vec<Option<u32>> = vec![None; encoded.len()];
    let mut sections = Vec::new();
    let mut rva = FIRST_SECTION_RVA;
    let mut raw = SIZE_OF_HEADERS;
    let homes: [(ImageSection, &'static [u8; 8], u32); 3] = [
        (ImageSection::Text, b".text\0\0\0", TEXT_FLAGS),
        (ImageSection::ReadOnly, b".rdata\0\0", RDATA_FLAGS),
        (ImageSection::Data, b".data\0\0\0", DATA_FLAGS),
    ];
    for (home, name, characteristics) in homes {
        let start = rva;
        let mut cursor = start;
        for id in factory.node_ids() {
            let Some(data) = &encoded[id.index()] else {
                continue;
            };
            if factory.node(id).section != home {
                continue;
            }
            cursor = cursor.next_multiple_of(data.alignment);
            addresses[id.index()] = Some(cursor);
            cursor += data.len() as u32;
        }
        let virtual_size = cursor - start;
        if virtual_size == 0 {
            continue;
        }
        sections.push(PeSectionPlan {
            name,
            rva: start,
            virtual_size,
            raw_offset: raw,
            raw_size: virtual_size.next_multiple_of(FILE_ALIGN),
            characteristics,
        });
        rva = start + virtual_size.next_multiple_of(SECTION_ALIGN);
        raw += virtual_size.next_multiple_of(FILE_ALIGN);
    }
    // Cells have no object of their own; they resolve through their
    // section's cell array.
    for id in factory.node_ids() {
        if !factory.is_marked(id) {
            continue;
        }
        if let NodeData::ImportCell(_) = &factory.node(id).data {
            let (section, index) = factory.cell_slot(id);
            let array = factory.import_section(section).cells_node;
            let Some(base) = addresses[array.index()] else {
                unreachable!("cell arrays are always laid out");
            };
            addresses[id.index()] = Some(base + index * 8);
        }
    }
    Layout {
        addresses,
        sections,
        image_size: rva,
    }
}

fn file_position(layout: &Layout, rva: u32) -> usize {
    for section in &layout.sections {
        if rva >= section.rva && rva < section.rva + section.virtual_size {
            return (section.raw_offset + (rva - section.rva)) as usize;
        }
    }
    unreachable!("rva {rva:#x} is not in any emitted section");
}

fn assemble(factory: &NodeFactory, encoded: &[Option<ObjectData>], layout: &Layout) -> Vec<u8> {
    let total = layout
        .sections
        .last()
        .map(|s| s.raw_offset + s.raw_size)
        .unwrap_or(SIZE_OF_HEADERS);
    let mut image = vec![0u8; total as usize];

    let header = factory.header_node();
    let header_rva = layout.addresses[header.index()].unwrap_or(0);
    let header_size = encoded[header.index()]
        .as_ref()
        .map_or(0, |data| data.len() as u32);
    write_pe_headers(&mut image, layout, header_rva, header_size);

    for id in factory.node_ids() {
        let Some(data) = &encoded[id.index()] else {
            continue;
        };
        if data.bytes.is_empty() {
            continue;
        }
        let Some(rva) = layout.addresses[id.index()] else {
            continue;
        };
        let pos = file_position(layout, rva);
        image[pos..pos + data.len()].copy_from_slice(&data.bytes);
    }

    for id in factory.node_ids() {
        let (Some(data), Some(rva)) = (&encoded[id.index()], layout.addresses[id.index()]) else {
            continue;
        };
        for reloc in &data.relocs {
            let Some(target) = layout.addresses[reloc.target.index()] else {
                unreachable!("reloc target {} has no address", reloc.target);
            };
            let field_rva = rva + reloc.offset;
            let pos = file_position(layout, field_rva);
            match reloc.kind {
                RelocKind::Addr32Nb => {
                    let value = (i64::from(target) + reloc.addend) as u32;
                    image[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
                }
                RelocKind::Rel32 => {
                    let value =
                        (i64::from(target) + reloc.addend - i64::from(field_rva + 4)) as i32;
                    image[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
                }
                RelocKind::Dir64 => {
                    let value = (IMAGE_BASE as i64 + i64::from(target) + reloc.addend) as u64;
                    image[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
    }

    #[cfg(debug_assertions)]
    {
        let pos = file_position(layout, header_rva);
        let parsed = prewarm_image::header::HeaderDirectory::from_bytes(
            &image[pos..pos + header_size as usize],
        );
        debug_assert!(parsed.is_ok(), "emitted header does not parse: {parsed:?}");
    }

    image
}

fn write_pe_headers(image: &mut [u8], layout: &Layout, header_rva: u32, header_size: u32) {
    let text = layout
        .sections
        .iter()
        .find(|s| s.characteristics & 0x0000_0020 != 0);
    let size_of_code: u32 = text.map_or(0, |s| s.raw_size);
    let size_of_data: u32 = layout
        .sections
        .iter()
        .filter(|s| s.characteristics & 0x0000_0040 != 0)
        .map(|s| s.raw_size)
        .sum();

    let mut h = Vec::with_capacity(SIZE_OF_HEADERS as usize);
    h.extend_from_slice(b"MZ");
    h.resize(0x3c, 0);
    h.extend_from_slice(&0x40u32.to_le_bytes());
    h.extend_from_slice(b"PE\0\0");

    h.extend_from_slice(&MACHINE_X64.to_le_bytes());
    h.extend_from_slice(&(layout.sections.len() as u16).to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes()); // timestamp, kept stable
    h.extend_from_slice(&0u32.to_le_bytes()); // symbol table
    h.extend_from_slice(&0u32.to_le_bytes()); // symbol count
    h.extend_from_slice(&OPTIONAL_HEADER_SIZE.to_le_bytes());
    h.extend_from_slice(&PE_CHARACTERISTICS.to_le_bytes());
    debug_assert_eq!(h.len(), 0x58);

    h.extend_from_slice(&PE32_PLUS_MAGIC.to_le_bytes());
    h.extend_from_slice(&[0, 0]); // linker version
    h.extend_from_slice(&size_of_code.to_le_bytes());
    h.extend_from_slice(&size_of_data.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes()); // uninitialized data
    h.extend_from_slice(&0u32.to_le_bytes()); // entry point: none, loader-driven
    h.extend_from_slice(&text.map_or(0, |s| s.rva).to_le_bytes());
    h.extend_from_slice(&IMAGE_BASE.to_le_bytes());
    h.extend_from_slice(&SECTION_ALIGN.to_le_bytes());
    h.extend_from_slice(&FILE_ALIGN.to_le_bytes());
    h.extend_from_slice(&6u16.to_le_bytes()); // OS version 6.0
    h.extend_from_slice(&0u16.to_le_bytes());
    h.extend_from_slice(&0u16.to_le_bytes()); // image version
    h.extend_from_slice(&0u16.to_le_bytes());
    h.extend_from_slice(&6u16.to_le_bytes()); // subsystem version 6.0
    h.extend_from_slice(&0u16.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes()); // win32 version value
    h.extend_from_slice(&layout.image_size.to_le_bytes());
    h.extend_from_slice(&SIZE_OF_HEADERS.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes()); // checksum
    h.extend_from_slice(&SUBSYSTEM_WINDOWS_CUI.to_le_bytes());
    h.extend_from_slice(&DLL_CHARACTERISTICS.to_le_bytes());
    h.extend_from_slice(&0x10_0000u64.to_le_bytes()); // stack reserve
    h.extend_from_slice(&0x1000u64.to_le_bytes()); // stack commit
    h.extend_from_slice(&0x10_0000u64.to_le_bytes()); // heap reserve
    h.extend_from_slice(&0x1000u64.to_le_bytes()); // heap commit
    h.extend_from_slice(&0u32.to_le_bytes()); // loader flags
    h.extend_from_slice(&DATA_DIRECTORY_COUNT.to_le_bytes());
    for slot in 0..DATA_DIRECTORY_COUNT as usize {
        if slot == NATIVE_HEADER_DIRECTORY_SLOT {
            h.extend_from_slice(&header_rva.to_le_bytes());
            h.extend_from_slice(&header_size.to_le_bytes());
        } else {
            h.extend_from_slice(&[0u8; 8]);
        }
    }
    debug_assert_eq!(h.len(), 0x58 + OPTIONAL_HEADER_SIZE as usize);

    for section in &layout.sections {
        h.extend_from_slice(section.name);
        h.extend_from_slice(&section.virtual_size.to_le_bytes());
        h.extend_from_slice(&section.rva.to_le_bytes());
        h.extend_from_slice(&section.raw_size.to_le_bytes());
        h.extend_from_slice(&section.raw_offset.to_le_bytes());
        h.extend_from_slice(&[0u8; 12]); // reloc/lineno pointers and counts
        h.extend_from_slice(&section.characteristics.to_le_bytes());
    }
    debug_assert!(h.len() <= SIZE_OF_HEADERS as usize);
    image[..h.len()].copy_from_slice(&h);
}

/// Create `path` and hand it to `fill`; a failed write removes the file
/// so no partial image is left behind.
pub fn write_guarded<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let mut file = File::create(path)?;
    match fill(&mut file) {
        Ok(()) => Ok(()),
        Err(err) => {
            drop(file);
            let _ = fs::remove_file(path);
            Err(err)
        }
    }
}
