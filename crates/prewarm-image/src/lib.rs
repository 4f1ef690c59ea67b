#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Warm-image binary format.
//!
//! Shared between the writer (`prewarm-compiler`) and any reader:
//! - `compressed`: 1/2/4-byte variable-width integers used by signatures
//!   and tables
//! - `nibble`: nibble-granular encoding for fixup blobs
//! - `fixups`: fixup kinds, helper ids, import-section constants
//! - `header`: the header table directory at the root of every image
//! - `image`: the read side: PE parsing, directory lookup, typed section views

pub mod compressed;
pub mod fixups;
pub mod header;
pub mod image;
pub mod nibble;


use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("value {value:#x} exceeds the 29-bit compressed-integer range")]
    ValueTooWide { value: u64 },
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEnd { offset: usize },
    #[error("invalid image magic {found:#010x} (expected {expected:#010x})")]
    BadMagic { found: u32, expected: u32 },
    #[error("unsupported image format version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error("token {raw:#010x} cannot appear in a signature")]
    UnsupportedToken { raw: u32 },
    #[error("not a PE image: {reason}")]
    NotAnImage { reason: &'static str },
    #[error("address {rva:#x} is not mapped by any section")]
    UnmappedAddress { rva: u32 },
    #[error("image has no {0:?} section")]
    MissingSection(header::SectionType),
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FormatError>;
