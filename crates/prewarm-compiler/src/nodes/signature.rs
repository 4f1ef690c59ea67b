//! Fixup signatures: the byte blobs the loader interprets to resolve cells.

use prewarm_core::Token;
use prewarm_image::compressed::encode_unsigned;
use prewarm_image::fixups::{FixupKind, HelperId, encode_type_token};
use prewarm_image::{FormatError, Result};

/// Canonical description of one loader-resolved fixup.
///
/// Doubles as the factory's cache key: equal descriptions collapse to one
/// signature node and one import cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignatureDesc {
    /// Method-entry fixups; the token kind is implied by `kind`.
    Method { kind: FixupKind, token: Token },
    /// Type-parameterized fixups (`NewObject`, `TypeHandle`, statics, ...).
    Type { kind: FixupKind, token: Token },
    /// Virtual dispatch through a pinned v-table slot.
    VirtualSlot { owner: Token, slot: u32 },
    StringHandle { rid: u32 },
    /// Eager runtime helper, e.g. the module handle.
    Helper { id: HelperId },
}

impl SignatureDesc {
    pub fn kind_byte(&self) -> u8 {
        match self {
            SignatureDesc::Method { kind, .. } | SignatureDesc::Type { kind, .. } => *kind as u8,
            SignatureDesc::VirtualSlot { .. } => FixupKind::VirtualEntrySlot as u8,
            SignatureDesc::StringHandle { .. } => FixupKind::StringHandle as u8,
            SignatureDesc::Helper { .. } => FixupKind::Helper as u8,
        }
    }

    /// Serialize: the fixup-kind byte, then the kind-specific payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = vec![self.kind_byte()];
        match *self {
            SignatureDesc::Method { token, .. } => {
                if token.kind().is_none() {
                    return Err(FormatError::UnsupportedToken { raw: token.raw() });
                }
                encode_unsigned(token.rid(), &mut out)?;
            }
            SignatureDesc::Type { token, .. } => {
                encode_type_token(token, &mut out)?;
            }
            SignatureDesc::VirtualSlot { owner, slot } => {
                encode_type_token(owner, &mut out)?;
                encode_unsigned(slot, &mut out)?;
            }
            SignatureDesc::StringHandle { rid } => {
                encode_unsigned(rid, &mut out)?;
            }
            SignatureDesc::Helper { id } => {
                encode_unsigned(id as u32, &mut out)?;
            }
        }
        Ok(out)
    }

    /// Human-readable form used in symbol names and dumps.
    pub fn describe(&self) -> String {
        match self {
            SignatureDesc::Method { kind, token } | SignatureDesc::Type { kind, token } => {
                format!("{kind:?}_{token}")
            }
            SignatureDesc::VirtualSlot { owner, slot } => {
                format!("VirtualSlot_{owner}_{slot}")
            }
            SignatureDesc::StringHandle { rid } => format!("String_{rid}"),
            SignatureDesc::Helper { id } => format!("Helper_{id:?}"),
        }
    }
}
