//! Delay-load thunks.
//!
//! Every delayed method and helper cell owns one thunk: the code the
//! cell points at until first use. The thunk hands the runtime enough
//! to resolve the cell (its address, its section, the module handle)
//! and tail-jumps through the delay-load helper cell.

use prewarm_core::Arch;

use crate::graph::NodeId;
use crate::nodes::EncodeMode;
use crate::nodes::object_data::{ObjectData, ObjectDataBuilder, RelocKind};

pub struct ThunkData {
    /// The cell this thunk resolves.
    pub cell: NodeId,
    /// Index of the owning import section, in creation order.
    pub section_index: u8,
    /// Eager cell holding the module handle.
    pub module_cell: NodeId,
    /// Eager cell holding the delay-load resolver entry point.
    pub delay_cell: NodeId,
}

/// Per-architecture thunk code shape.
pub trait ThunkEncoder: Sync {
    fn alignment(&self) -> u32;
    fn encode(&self, thunk: &ThunkData, mode: EncodeMode) -> ObjectData;
}

struct X64ThunkEncoder;

impl ThunkEncoder for X64ThunkEncoder {
    fn alignment(&self) -> u32 {
        16
    }

    fn encode(&self, thunk: &ThunkData, mode: EncodeMode) -> ObjectData {
        let mut builder = ObjectDataBuilder::new(mode, self.alignment());
        // lea rax, [rip + cell]
        builder.extend(&[0x48, 0x8d, 0x05]);
        builder.emit_reloc(RelocKind::Rel32, thunk.cell, 0);
        // push section-index imm8
        builder.extend(&[0x6a, thunk.section_index]);
        // push qword [rip + module cell]
        builder.extend(&[0xff, 0x35]);
        builder.emit_reloc(RelocKind::Rel32, thunk.module_cell, 0);
        // jmp qword [rip + delay-load cell]
        builder.extend(&[0xff, 0x25]);
        builder.emit_reloc(RelocKind::Rel32, thunk.delay_cell, 0);
        builder.build()
    }
}

/// The encoder for `arch`, or `None` when the target has no thunk
/// support yet.
pub fn thunk_encoder_for(arch: Arch) -> Option<&'static dyn ThunkEncoder> {
    match arch {
        Arch::X64 => Some(&X64ThunkEncoder),
        Arch::Arm64 => None,
    }
}
