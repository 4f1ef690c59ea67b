//! Encoded form of a node: bytes, relocations, and defined symbols.

use crate::graph::NodeId;
use crate::nodes::EncodeMode;

/// Relocation kinds the writer can resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelocKind {
    /// 32-bit address measured from the image base.
    Addr32Nb,
    /// 32-bit PC-relative displacement, measured from the end of the
    /// patched field.
    Rel32,
    /// 64-bit absolute address. Used only to seed delayed cells with their
    /// thunk address.
    Dir64,
}

impl RelocKind {
    pub fn width(self) -> u32 {
        match self {
            RelocKind::Addr32Nb | RelocKind::Rel32 => 4,
            RelocKind::Dir64 => 8,
        }
    }
}

/// One patch the writer applies after layout.
#[derive(Clone, Copy, Debug)]
pub struct Reloc {
    /// Byte offset of the patched field within the node's data.
    pub offset: u32,
    pub kind: RelocKind,
    pub target: NodeId,
    /// Added to the target's address before patching.
    pub addend: i64,
}

/// A symbol whose address lives inside another node's data.
#[derive(Clone, Copy, Debug)]
pub struct SymbolDef {
    pub node: NodeId,
    pub offset: u32,
}

/// Final encoding of one node.
///
/// Under [`EncodeMode::RelocsOnly`] the byte vector stays empty; the
/// relocation list and alignment are identical to a full encode.
#[derive(Debug, Default)]
pub struct ObjectData {
    pub bytes: Vec<u8>,
    pub alignment: u32,
    pub relocs: Vec<Reloc>,
    pub defined_symbols: Vec<SymbolDef>,
}

impl ObjectData {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builder every node encoding goes through.
///
/// Byte writes advance a virtual position so relocation offsets are
/// identical in both modes; only `Full` retains the bytes themselves.
pub struct ObjectDataBuilder {
    mode: EncodeMode,
    bytes: Vec<u8>,
    position: u32,
    alignment: u32,
    relocs: Vec<Reloc>,
    defined_symbols: Vec<SymbolDef>,
}

impl ObjectDataBuilder {
    pub fn new(mode: EncodeMode, alignment: u32) -> ObjectDataBuilder {
        ObjectDataBuilder {
            mode,
            bytes: Vec::new(),
            position: 0,
            alignment,
            relocs: Vec::new(),
            defined_symbols: Vec::new(),
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn require_alignment(&mut self, alignment: u32) {
        debug_assert!(alignment.is_power_of_two());
        self.alignment = self.alignment.max(alignment);
    }

    pub fn push(&mut self, byte: u8) {
        self.position += 1;
        if self.mode == EncodeMode::Full {
            self.bytes.push(byte);
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.position += bytes.len() as u32;
        if self.mode == EncodeMode::Full {
            self.bytes.extend_from_slice(bytes);
        }
    }

    pub fn write_u16(&mut self, value: u16) {
        self.extend(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.extend(&value.to_le_bytes());
    }

    /// Zero fill.
    pub fn skip(&mut self, count: u32) {
        self.position += count;
        if self.mode == EncodeMode::Full {
            self.bytes.resize(self.bytes.len() + count as usize, 0);
        }
    }

    /// Record a relocation at the current position and reserve its field.
    pub fn emit_reloc(&mut self, kind: RelocKind, target: NodeId, addend: i64) {
        self.relocs.push(Reloc {
            offset: self.position,
            kind,
            target,
            addend,
        });
        self.skip(kind.width());
    }

    /// Declare that `node`'s address is the current position.
    pub fn define_symbol(&mut self, node: NodeId) {
        self.defined_symbols.push(SymbolDef {
            node,
            offset: self.position,
        });
    }

    pub fn build(self) -> ObjectData {
        debug_assert!(
            self.mode == EncodeMode::RelocsOnly || self.bytes.len() as u32 == self.position
        );
        ObjectData {
            bytes: self.bytes,
            alignment: self.alignment,
            relocs: self.relocs,
            defined_symbols: self.defined_symbols,
        }
    }
}
