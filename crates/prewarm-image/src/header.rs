//! Header table directory.
//!
//! Every warm image starts its read-only metadata with this directory: a
//! fixed preamble and one `(section type, address, size)` record per emitted
//! section, sorted by address so both id- and address-based lookups can
//! binary search.

use crate::{FormatError, Result};

pub const MAGIC: u32 = 0x0049_5750; // "PWI\0"
pub const VERSION_MAJOR: u16 = 1;
pub const VERSION_MINOR: u16 = 0;

/// Set when the conservative scan excluded methods; the loader must be
/// prepared to compile the gaps itself.
pub const FLAG_PARTIAL: u32 = 0x1;

/// Serialized preamble size: magic, version pair, flags, record count.
pub const PREAMBLE_SIZE: usize = 16;
/// Serialized size of one directory record.
pub const RECORD_SIZE: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum SectionType {
    CompilerIdentifier = 100,
    ImportSections = 101,
    RuntimeFunctions = 102,
    MethodDefEntryPoints = 103,
    AvailableTypes = 108,
    InstanceMethodEntryPoints = 109,
}

impl SectionType {
    pub fn from_u32(value: u32) -> Option<SectionType> {
        match value {
            100 => Some(SectionType::CompilerIdentifier),
            101 => Some(SectionType::ImportSections),
            102 => Some(SectionType::RuntimeFunctions),
            103 => Some(SectionType::MethodDefEntryPoints),
            108 => Some(SectionType::AvailableTypes),
            109 => Some(SectionType::InstanceMethodEntryPoints),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionRecord {
    pub section: SectionType,
    pub rva: u32,
    pub size: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderDirectory {
    pub flags: u32,
    pub sections: Vec<SectionRecord>,
}

impl HeaderDirectory {
    pub fn byte_len(&self) -> usize {
        PREAMBLE_SIZE + self.sections.len() * RECORD_SIZE
    }

    pub fn is_partial(&self) -> bool {
        self.flags & FLAG_PARTIAL != 0
    }

    pub fn find(&self, section: SectionType) -> Option<SectionRecord> {
        self.sections.iter().copied().find(|r| r.section == section)
    }

    /// Serialize; records must already be in ascending address order.
    pub fn to_bytes(&self) -> Vec<u8> {
        debug_assert!(
            self.sections.windows(2).all(|w| w[0].rva <= w[1].rva),
            "directory records must be sorted by address"
        );
        let mut out = Vec::with_capacity(self.byte_len());
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&VERSION_MAJOR.to_le_bytes());
        out.extend_from_slice(&VERSION_MINOR.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&(self.sections.len() as u32).to_le_bytes());
        for record in &self.sections {
            out.extend_from_slice(&(record.section as u32).to_le_bytes());
            out.extend_from_slice(&record.rva.to_le_bytes());
            out.extend_from_slice(&record.size.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<HeaderDirectory> {
        if bytes.len() < PREAMBLE_SIZE {
            return Err(FormatError::UnexpectedEnd { offset: bytes.len() });
        }
        let magic = read_u32(bytes, 0);
        if magic != MAGIC {
            return Err(FormatError::BadMagic {
                found: magic,
                expected: MAGIC,
            });
        }
        let major = read_u16(bytes, 4);
        let minor = read_u16(bytes, 6);
        if major != VERSION_MAJOR {
            return Err(FormatError::UnsupportedVersion { major, minor });
        }
        let flags = read_u32(bytes, 8);
        let count = read_u32(bytes, 12) as usize;
        let need = PREAMBLE_SIZE + count * RECORD_SIZE;
        if bytes.len() < need {
            return Err(FormatError::UnexpectedEnd { offset: bytes.len() });
        }
        let mut sections = Vec::with_capacity(count);
        for i in 0..count {
            let base = PREAMBLE_SIZE + i * RECORD_SIZE;
            let raw = read_u32(bytes, base);
            let section = SectionType::from_u32(raw).ok_or_else(|| FormatError::Malformed {
                what: "directory record",
                detail: format!("unknown section type {raw}"),
            })?;
            sections.push(SectionRecord {
                section,
                rva: read_u32(bytes, base + 4),
                size: read_u32(bytes, base + 8),
            });
        }
        if !sections.windows(2).all(|w| w[0].rva <= w[1].rva) {
            return Err(FormatError::Malformed {
                what: "directory",
                detail: "records not sorted by address".to_string(),
            });
        }
        Ok(HeaderDirectory { flags, sections })
    }
}

pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
