//! Method code encoding.
//!
//! Bodies encode through the same classification the marking pass ran.
//! A marked body's obligations all have nodes by the time it is encoded,
//! so a lookup miss or a fresh classification failure here is a factory
//! bug and panics rather than surfacing as an input error.

use prewarm_core::{EhKind, MethodId, MethodRow, Op, Token};
use prewarm_image::compressed;

use crate::nodes::object_data::{ObjectData, ObjectDataBuilder, RelocKind};
use crate::nodes::{EncodeContext, EncodeMode};
use crate::scan::Need;

pub const CODE_ALIGNMENT: u32 = 16;

/// Code node of one placed method. `token` is the defining token the
/// entry-point tables publish it under.
pub struct MethodCodeData {
    pub method: MethodId,
    pub token: Token,
}

pub fn encode_method_code(
    cx: &EncodeContext<'_>,
    data: &MethodCodeData,
    mode: EncodeMode,
) -> ObjectData {
    let scanner = cx.factory.scanner();
    let row = cx.factory.module().method_row(data.method);
    let mut builder = ObjectDataBuilder::new(mode, CODE_ALIGNMENT);
    for op in &row.body {
        match *op {
            Op::LoadConst { value } => {
                // mov eax, imm32
                builder.push(0xb8);
                builder.write_u32(value as u32);
            }
            Op::Ret => builder.push(0xc3),
            ref op => {
                let need = match scanner.op_need(op) {
                    Ok(Some(need)) => need,
                    Ok(None) => unreachable!("{op:?} carries no obligation"),
                    Err(failure) => panic!(
                        "{}: marked body failed to re-classify: {failure}",
                        cx.factory.module().method_name(data.method),
                    ),
                };
                match need {
                    Need::LocalCall(callee) => {
                        // call rel32
                        builder.push(0xe8);
                        builder.emit_reloc(RelocKind::Rel32, cx.factory.method_node(callee), 0);
                    }
                    Need::Import { desc, .. } => {
                        let cell = cx.factory.import_node(&desc);
                        match op {
                            // mov rax, [rip + cell]
                            Op::LoadString { .. } => builder.extend(&[0x48, 0x8b, 0x05]),
                            // lea rax, [rip + cell]
                            Op::LoadTypeHandle { .. } => builder.extend(&[0x48, 0x8d, 0x05]),
                            // call [rip + cell]
                            _ => builder.extend(&[0xff, 0x15]),
                        }
                        builder.emit_reloc(RelocKind::Rel32, cell, 0);
                    }
                }
            }
        }
    }
    builder.build()
}

/// GC info blob of one method row: local count, then each protected
/// region as start, length, handler, and a kind byte.
pub fn gc_info_blob(row: &MethodRow) -> prewarm_image::Result<Vec<u8>> {
    let mut out = Vec::new();
    compressed::encode_unsigned(row.locals, &mut out)?;
    compressed::encode_unsigned(row.exception_regions.len() as u32, &mut out)?;
    for region in &row.exception_regions {
        compressed::encode_unsigned(region.start, &mut out)?;
        compressed::encode_unsigned(region.len, &mut out)?;
        compressed::encode_unsigned(region.handler, &mut out)?;
        out.push(match region.kind {
            EhKind::Catch => 0,
            EhKind::Finally => 1,
        });
    }
    Ok(out)
}
