use prewarm_core::Arch;

use crate::graph::NodeId;
use crate::nodes::EncodeMode;
use crate::nodes::object_data::RelocKind;
use crate::nodes::thunk::{ThunkData, thunk_encoder_for};

fn sample_thunk() -> ThunkData {
    ThunkData {
        cell: NodeId::from_index(20),
        section_index: 2,
        module_cell: NodeId::from_index(17),
        delay_cell: NodeId::from_index(19),
    }
}

#[test]
fn x64_thunk_is_21_bytes_aligned_16() {
    let encoder = thunk_encoder_for(Arch::X64).unwrap();
    let data = encoder.encode(&sample_thunk(), EncodeMode::Full);
    assert_eq!(data.bytes.len(), 21);
    assert_eq!(data.alignment, 16);
    assert_eq!(encoder.alignment(), 16);
}

#[test]
fn x64_thunk_instruction_sequence() {
    let encoder = thunk_encoder_for(Arch::X64).unwrap();
    let thunk = sample_thunk();
    let data = encoder.encode(&thunk, EncodeMode::Full);
    // lea rax / push imm8 / push [rip+..] / jmp [rip+..]
    assert_eq!(&data.bytes[0..3], &[0x48, 0x8d, 0x05]);
    assert_eq!(&data.bytes[7..9], &[0x6a, 0x02]);
    assert_eq!(&data.bytes[9..11], &[0xff, 0x35]);
    assert_eq!(&data.bytes[15..17], &[0xff, 0x25]);

    let targets: Vec<_> = data.relocs.iter().map(|r| (r.offset, r.target)).collect();
    assert_eq!(
        targets,
        vec![
            (3, thunk.cell),
            (11, thunk.module_cell),
            (17, thunk.delay_cell),
        ]
    );
    assert!(data.relocs.iter().all(|r| r.kind == RelocKind::Rel32));
}

#[test]
fn relocs_only_thunk_keeps_structure() {
    let encoder = thunk_encoder_for(Arch::X64).unwrap();
    let data = encoder.encode(&sample_thunk(), EncodeMode::RelocsOnly);
    assert!(data.bytes.is_empty());
    assert_eq!(data.relocs.len(), 3);
}

#[test]
fn arm64_has_no_encoder_yet() {
    assert!(thunk_encoder_for(Arch::Arm64).is_none());
}
