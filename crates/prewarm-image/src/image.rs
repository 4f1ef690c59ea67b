//! Read side of the warm-image format.
//!
//! Parses just enough of the PE envelope to locate the header table
//! directory (optional-header data directory slot 14 points straight at
//! it), then exposes typed views over the directory's sections.

use std::fmt::Write as _;
use std::path::Path;

use crate::compressed::decode_unsigned;
use crate::fixups::{IMPORT_SECTION_RECORD_SIZE, ImportSectionKind};
use crate::header::{HeaderDirectory, SectionType, read_u16, read_u32};
use crate::nibble::NibbleReader;
use crate::{FormatError, Result};

const DOS_MAGIC: u16 = 0x5A4D; // "MZ"
const PE_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const PE32_PLUS_MAGIC: u16 = 0x020B;
const MACHINE_X64: u16 = 0x8664;
const SECTION_HEADER_SIZE: usize = 40;
/// Data-directory slot carrying the header table directory's address.
pub const NATIVE_HEADER_DIRECTORY_SLOT: usize = 14;

#[derive(Clone, Copy, Debug)]
struct PeSection {
    rva: u32,
    virtual_size: u32,
    raw_offset: u32,
    raw_size: u32,
}

/// A parsed warm image.
pub struct Image {
    bytes: Vec<u8>,
    pe_sections: Vec<PeSection>,
    directory: HeaderDirectory,
}

impl Image {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Image> {
        let bytes = std::fs::read(path)?;
        Image::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Image> {
        let pe_sections = parse_pe_sections(&bytes)?;
        let header_rva = native_header_rva(&bytes)?;
        let header_offset = rva_to_offset(&pe_sections, header_rva, bytes.len())?;
        let directory = HeaderDirectory::from_bytes(&bytes[header_offset..])?;
        Ok(Image {
            bytes,
            pe_sections,
            directory,
        })
    }

    pub fn directory(&self) -> &HeaderDirectory {
        &self.directory
    }

    pub fn is_partial(&self) -> bool {
        self.directory.is_partial()
    }

    /// Raw bytes of a directory section.
    pub fn section_data(&self, section: SectionType) -> Result<&[u8]> {
        let record = self
            .directory
            .find(section)
            .ok_or(FormatError::MissingSection(section))?;
        let start = rva_to_offset(&self.pe_sections, record.rva, self.bytes.len())?;
        let end = start + record.size as usize;
        if end > self.bytes.len() {
            return Err(FormatError::UnexpectedEnd { offset: end });
        }
        Ok(&self.bytes[start..end])
    }

    /// Content digest of a directory section, for diffing builds.
    pub fn section_digest(&self, section: SectionType) -> Result<u32> {
        Ok(crc32fast::hash(self.section_data(section)?))
    }

    pub fn compiler_identifier(&self) -> Result<String> {
        let data = self.section_data(SectionType::CompilerIdentifier)?;
        String::from_utf8(data.to_vec()).map_err(|_| FormatError::Malformed {
            what: "compiler identifier",
            detail: "not valid UTF-8".to_string(),
        })
    }

    pub fn method_entry_points(&self) -> Result<EntryPointsView<'_>> {
        EntryPointsView::parse(self.section_data(SectionType::MethodDefEntryPoints)?)
    }

    pub fn instance_entry_points(&self) -> Result<EntryPointsView<'_>> {
        EntryPointsView::parse(self.section_data(SectionType::InstanceMethodEntryPoints)?)
    }

    pub fn import_sections(&self) -> Result<ImportSectionsView<'_>> {
        ImportSectionsView::parse(self.section_data(SectionType::ImportSections)?)
    }

    pub fn runtime_functions(&self) -> Result<RuntimeFunctionsView<'_>> {
        RuntimeFunctionsView::parse(self.section_data(SectionType::RuntimeFunctions)?)
    }

    pub fn available_types(&self) -> Result<Vec<u32>> {
        let data = self.section_data(SectionType::AvailableTypes)?;
        let mut pos = 0;
        let count = decode_unsigned(data, &mut pos)?;
        let mut rids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            rids.push(decode_unsigned(data, &mut pos)?);
        }
        Ok(rids)
    }

    /// One line per directory record: type, address, size, digest.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "warm image v{}.{}  flags {:#x}",
            crate::header::VERSION_MAJOR,
            crate::header::VERSION_MINOR,
            self.directory.flags
        );
        for record in &self.directory.sections {
            let digest = self.section_digest(record.section).unwrap_or(0);
            let _ = writeln!(
                out,
                "{:<26} rva {:#08x}  size {:>6}  crc32 {digest:08x}",
                format!("{:?}", record.section),
                record.rva,
                record.size
            );
        }
        out
    }
}

fn native_header_rva(bytes: &[u8]) -> Result<u32> {
    let opt_offset = optional_header_offset(bytes)?;
    let dir_offset = opt_offset + 112 + NATIVE_HEADER_DIRECTORY_SLOT * 8;
    if bytes.len() < dir_offset + 8 {
        return Err(FormatError::NotAnImage {
            reason: "optional header truncated",
        });
    }
    let rva = read_u32(bytes, dir_offset);
    if rva == 0 {
        return Err(FormatError::NotAnImage {
            reason: "no native header directory entry",
        });
    }
    Ok(rva)
}

fn optional_header_offset(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < 0x40 || read_u16(bytes, 0) != DOS_MAGIC {
        return Err(FormatError::NotAnImage {
            reason: "missing MZ header",
        });
    }
    let pe_offset = read_u32(bytes, 0x3C) as usize;
    if bytes.len() < pe_offset + 24 || read_u32(bytes, pe_offset) != PE_SIGNATURE {
        return Err(FormatError::NotAnImage {
            reason: "missing PE signature",
        });
    }
    let machine = read_u16(bytes, pe_offset + 4);
    if machine != MACHINE_X64 {
        return Err(FormatError::NotAnImage {
            reason: "unsupported machine",
        });
    }
    let opt_offset = pe_offset + 24;
    if bytes.len() < opt_offset + 2 || read_u16(bytes, opt_offset) != PE32_PLUS_MAGIC {
        return Err(FormatError::NotAnImage {
            reason: "not a PE32+ optional header",
        });
    }
    Ok(opt_offset)
}

fn parse_pe_sections(bytes: &[u8]) -> Result<Vec<PeSection>> {
    let opt_offset = optional_header_offset(bytes)?;
    let pe_offset = opt_offset - 24;
    let section_count = read_u16(bytes, pe_offset + 6) as usize;
    let opt_size = read_u16(bytes, pe_offset + 20) as usize;
    let table_offset = opt_offset + opt_size;
    if bytes.len() < table_offset + section_count * SECTION_HEADER_SIZE {
        return Err(FormatError::NotAnImage {
            reason: "section table truncated",
        });
    }
    let mut sections = Vec::with_capacity(section_count);
    for i in 0..section_count {
        let base = table_offset + i * SECTION_HEADER_SIZE;
        sections.push(PeSection {
            virtual_size: read_u32(bytes, base + 8),
            rva: read_u32(bytes, base + 12),
            raw_size: read_u32(bytes, base + 16),
            raw_offset: read_u32(bytes, base + 20),
        });
    }
    Ok(sections)
}

fn rva_to_offset(sections: &[PeSection], rva: u32, file_len: usize) -> Result<usize> {
    for section in sections {
        let span = section.virtual_size.max(section.raw_size);
        if rva >= section.rva && rva < section.rva + span {
            let offset = (section.raw_offset + (rva - section.rva)) as usize;
            if offset >= file_len {
                return Err(FormatError::UnexpectedEnd { offset });
            }
            return Ok(offset);
        }
    }
    Err(FormatError::UnmappedAddress { rva })
}

/// Decoded entry of an entry-point table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryPoint {
    /// Row index in the runtime-functions table.
    pub runtime_function: u32,
    /// Offset of the method's fixup blob within the section, if it has one.
    pub fixups_offset: Option<u32>,
}

/// One fixup blob record: a cell within an import section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixupCell {
    pub section: u32,
    pub cell: u32,
}

pub struct EntryPointsView<'a> {
    data: &'a [u8],
    entries: Vec<Option<EntryPoint>>,
}

impl<'a> EntryPointsView<'a> {
    fn parse(data: &'a [u8]) -> Result<EntryPointsView<'a>> {
        let mut pos = 0;
        let count = decode_unsigned(data, &mut pos)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let lead = decode_unsigned(data, &mut pos)?;
            if lead == 0 {
                entries.push(None);
                continue;
            }
            let runtime_function = (lead >> 1) - 1;
            let fixups_offset = if lead & 1 != 0 {
                Some(decode_unsigned(data, &mut pos)?)
            } else {
                None
            };
            entries.push(Some(EntryPoint {
                runtime_function,
                fixups_offset,
            }));
        }
        Ok(EntryPointsView { data, entries })
    }

    /// Number of entry slots (highest populated RID).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a 1-based method RID, `None` for a gap.
    pub fn entry(&self, rid: u32) -> Option<EntryPoint> {
        if rid == 0 {
            return None;
        }
        self.entries.get((rid - 1) as usize).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, EntryPoint)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.map(|e| (i as u32 + 1, e)))
    }

    /// Decode the fixup blob at `offset` into (section, cell) records.
    pub fn fixups(&self, offset: u32) -> Result<Vec<FixupCell>> {
        let blob = self
            .data
            .get(offset as usize..)
            .ok_or(FormatError::UnexpectedEnd { offset: offset as usize })?;
        let mut reader = NibbleReader::new(blob);
        let mut cells = Vec::new();
        let mut section = reader.read_unsigned()?;
        loop {
            let mut cell = reader.read_unsigned()?;
            cells.push(FixupCell { section, cell });
            loop {
                let delta = reader.read_unsigned()?;
                if delta == 0 {
                    break;
                }
                cell += delta;
                cells.push(FixupCell { section, cell });
            }
            let section_delta = reader.read_unsigned()?;
            if section_delta == 0 {
                break;
            }
            section += section_delta;
        }
        Ok(cells)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportSectionRecord {
    pub cells_rva: u32,
    pub cells_size: u32,
    pub flags: u16,
    pub kind: Option<ImportSectionKind>,
    pub entry_size: u8,
    pub signatures_rva: u32,
}

impl ImportSectionRecord {
    pub fn cell_count(&self) -> u32 {
        if self.entry_size == 0 {
            0
        } else {
            self.cells_size / self.entry_size as u32
        }
    }
}

pub struct ImportSectionsView<'a> {
    data: &'a [u8],
}

impl<'a> ImportSectionsView<'a> {
    fn parse(data: &'a [u8]) -> Result<ImportSectionsView<'a>> {
        if data.len() % IMPORT_SECTION_RECORD_SIZE != 0 {
            return Err(FormatError::Malformed {
                what: "import sections table",
                detail: format!("size {} is not a whole number of records", data.len()),
            });
        }
        Ok(ImportSectionsView { data })
    }

    pub fn len(&self) -> usize {
        self.data.len() / IMPORT_SECTION_RECORD_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ImportSectionRecord> {
        if index >= self.len() {
            return None;
        }
        let base = index * IMPORT_SECTION_RECORD_SIZE;
        Some(ImportSectionRecord {
            cells_rva: read_u32(self.data, base),
            cells_size: read_u32(self.data, base + 4),
            flags: read_u16(self.data, base + 8),
            kind: ImportSectionKind::from_byte(self.data[base + 10]),
            entry_size: self.data[base + 11],
            signatures_rva: read_u32(self.data, base + 12),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ImportSectionRecord> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

/// Row of the runtime-functions table: method start, end, and GC-info
/// addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeFunction {
    pub begin: u32,
    pub end: u32,
    pub gc_info: u32,
}

pub struct RuntimeFunctionsView<'a> {
    data: &'a [u8],
}

impl<'a> RuntimeFunctionsView<'a> {
    fn parse(data: &'a [u8]) -> Result<RuntimeFunctionsView<'a>> {
        if data.len() % 12 != 0 {
            return Err(FormatError::Malformed {
                what: "runtime functions table",
                detail: format!("size {} is not a whole number of rows", data.len()),
            });
        }
        Ok(RuntimeFunctionsView { data })
    }

    pub fn len(&self) -> usize {
        self.data.len() / 12
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<RuntimeFunction> {
        if index >= self.len() {
            return None;
        }
        let base = index * 12;
        Some(RuntimeFunction {
            begin: read_u32(self.data, base),
            end: read_u32(self.data, base + 4),
            gc_info: read_u32(self.data, base + 8),
        })
    }
}
