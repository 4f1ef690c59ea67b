use crate::graph::NodeId;
use crate::nodes::EncodeMode;
use crate::nodes::object_data::{ObjectDataBuilder, RelocKind};

fn node(index: usize) -> NodeId {
    NodeId::from_index(index)
}

#[test]
fn writes_advance_position_and_keep_bytes() {
    let mut builder = ObjectDataBuilder::new(EncodeMode::Full, 4);
    builder.push(0xc3);
    builder.write_u16(0x0102);
    builder.write_u32(0x0304_0506);
    assert_eq!(builder.position(), 7);
    let data = builder.build();
    assert_eq!(data.bytes, vec![0xc3, 0x02, 0x01, 0x06, 0x05, 0x04, 0x03]);
    assert_eq!(data.alignment, 4);
}

#[test]
fn skip_zero_fills() {
    let mut builder = ObjectDataBuilder::new(EncodeMode::Full, 1);
    builder.push(0xff);
    builder.skip(3);
    let data = builder.build();
    assert_eq!(data.bytes, vec![0xff, 0, 0, 0]);
}

#[test]
fn emit_reloc_reserves_the_field() {
    let mut builder = ObjectDataBuilder::new(EncodeMode::Full, 8);
    builder.emit_reloc(RelocKind::Dir64, node(5), 0);
    builder.emit_reloc(RelocKind::Addr32Nb, node(6), 16);
    let data = builder.build();
    assert_eq!(data.bytes.len(), 12);
    assert_eq!(data.relocs[0].offset, 0);
    assert_eq!(data.relocs[1].offset, 8);
    assert_eq!(data.relocs[1].target, node(6));
    assert_eq!(data.relocs[1].addend, 16);
}

#[test]
fn relocs_only_matches_full_reloc_layout() {
    let encode = |mode| {
        let mut builder = ObjectDataBuilder::new(mode, 16);
        builder.extend(&[0xff, 0x15]);
        builder.emit_reloc(RelocKind::Rel32, node(9), 0);
        builder.push(0xc3);
        builder.build()
    };
    let full = encode(EncodeMode::Full);
    let bare = encode(EncodeMode::RelocsOnly);
    assert_eq!(full.bytes.len(), 7);
    assert!(bare.bytes.is_empty());
    assert_eq!(bare.relocs.len(), full.relocs.len());
    assert_eq!(bare.relocs[0].offset, full.relocs[0].offset);
    assert_eq!(bare.relocs[0].target, full.relocs[0].target);
    assert_eq!(bare.alignment, full.alignment);
}

#[test]
fn symbols_record_the_current_position() {
    let mut builder = ObjectDataBuilder::new(EncodeMode::Full, 8);
    builder.define_symbol(node(1));
    builder.skip(8);
    builder.define_symbol(node(2));
    builder.skip(8);
    let data = builder.build();
    assert_eq!(data.defined_symbols[0].offset, 0);
    assert_eq!(data.defined_symbols[1].offset, 8);
    assert_eq!(data.defined_symbols[1].node, node(2));
}

#[test]
fn require_alignment_only_grows() {
    let mut builder = ObjectDataBuilder::new(EncodeMode::Full, 4);
    builder.require_alignment(16);
    builder.require_alignment(2);
    assert_eq!(builder.build().alignment, 16);
}
