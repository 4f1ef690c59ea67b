//! Fixup and import-section constants shared by writer and loader.

use prewarm_core::{Token, TokenKind};

use crate::{FormatError, Result};

/// Leading byte of a signature blob; tells the loader how to interpret the
/// payload and what the patched cell will hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FixupKind {
    TypeHandle = 0x10,
    MethodEntryDefToken = 0x14,
    MethodEntryRefToken = 0x15,
    VirtualEntryRefToken = 0x18,
    VirtualEntrySlot = 0x19,
    Helper = 0x1A,
    StringHandle = 0x1B,
    NewObject = 0x1C,
    NewArray = 0x1D,
    IsInstanceOf = 0x1E,
    ChkCast = 0x1F,
    StaticBaseNonGc = 0x22,
    StaticBaseGc = 0x23,
    ThreadStaticBaseNonGc = 0x24,
    ThreadStaticBaseGc = 0x25,
}

impl FixupKind {
    pub fn from_byte(byte: u8) -> Option<FixupKind> {
        match byte {
            0x10 => Some(FixupKind::TypeHandle),
            0x14 => Some(FixupKind::MethodEntryDefToken),
            0x15 => Some(FixupKind::MethodEntryRefToken),
            0x18 => Some(FixupKind::VirtualEntryRefToken),
            0x19 => Some(FixupKind::VirtualEntrySlot),
            0x1A => Some(FixupKind::Helper),
            0x1B => Some(FixupKind::StringHandle),
            0x1C => Some(FixupKind::NewObject),
            0x1D => Some(FixupKind::NewArray),
            0x1E => Some(FixupKind::IsInstanceOf),
            0x1F => Some(FixupKind::ChkCast),
            0x22 => Some(FixupKind::StaticBaseNonGc),
            0x23 => Some(FixupKind::StaticBaseGc),
            0x24 => Some(FixupKind::ThreadStaticBaseNonGc),
            0x25 => Some(FixupKind::ThreadStaticBaseGc),
            _ => None,
        }
    }
}

/// Well-known helpers resolved through eager cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HelperId {
    Module = 0x01,
    DelayLoadMethodCall = 0x08,
    DelayLoadHelper = 0x09,
}

impl HelperId {
    pub fn from_byte(byte: u8) -> Option<HelperId> {
        match byte {
            0x01 => Some(HelperId::Module),
            0x08 => Some(HelperId::DelayLoadMethodCall),
            0x09 => Some(HelperId::DelayLoadHelper),
            _ => None,
        }
    }
}

/// Import-section `type` byte in the serialized sections table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ImportSectionKind {
    Unknown = 0,
    StubDispatch = 2,
    StringHandle = 3,
}

impl ImportSectionKind {
    pub fn from_byte(byte: u8) -> Option<ImportSectionKind> {
        match byte {
            0 => Some(ImportSectionKind::Unknown),
            2 => Some(ImportSectionKind::StubDispatch),
            3 => Some(ImportSectionKind::StringHandle),
            _ => None,
        }
    }
}

/// Section flags word. A section without `EAGER` is delayed: its cells are
/// resolved on first use and may appear in method fixup blobs.
pub const IMPORT_FLAG_EAGER: u16 = 0x0001;
/// Cells hold executable-code addresses.
pub const IMPORT_FLAG_PCODE: u16 = 0x0004;

/// Byte size of one serialized import-section record.
pub const IMPORT_SECTION_RECORD_SIZE: usize = 20;

/// Two-bit table tag folded into type tokens inside signatures.
pub fn type_token_tag(token: Token) -> Result<u8> {
    match token.kind() {
        Some(TokenKind::TypeDef) => Ok(0),
        Some(TokenKind::TypeRef) => Ok(1),
        Some(TokenKind::TypeSpec) => Ok(2),
        _ => Err(FormatError::UnsupportedToken { raw: token.raw() }),
    }
}

/// `compressed(rid << 2 | tag)` payload for a type token.
pub fn encode_type_token(token: Token, out: &mut Vec<u8>) -> Result<()> {
    let tag = type_token_tag(token)?;
    crate::compressed::encode_unsigned(token.rid() << 2 | tag as u32, out)
}
