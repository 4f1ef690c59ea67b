use prewarm_core::{Token, TokenKind};
use prewarm_image::FormatError;
use prewarm_image::fixups::{FixupKind, HelperId};

use crate::nodes::signature::SignatureDesc;

#[test]
fn method_signature_is_kind_byte_plus_rid() {
    let desc = SignatureDesc::Method {
        kind: FixupKind::MethodEntryRefToken,
        token: Token::new(TokenKind::MemberRef, 6),
    };
    assert_eq!(desc.encode().unwrap(), vec![0x15, 6]);
}

#[test]
fn type_signature_folds_the_table_tag() {
    let desc = SignatureDesc::Type {
        kind: FixupKind::NewObject,
        token: Token::new(TokenKind::TypeDef, 3),
    };
    // rid 3, tag 0 for a type definition
    assert_eq!(desc.encode().unwrap(), vec![0x1c, 12]);

    let desc = SignatureDesc::Type {
        kind: FixupKind::TypeHandle,
        token: Token::new(TokenKind::TypeRef, 1),
    };
    assert_eq!(desc.encode().unwrap(), vec![0x10, 5]);
}

#[test]
fn virtual_slot_signature_names_owner_then_slot() {
    let desc = SignatureDesc::VirtualSlot {
        owner: Token::new(TokenKind::TypeRef, 1),
        slot: 3,
    };
    assert_eq!(desc.encode().unwrap(), vec![0x19, 5, 3]);
}

#[test]
fn string_and_helper_signatures() {
    let string = SignatureDesc::StringHandle { rid: 1 };
    assert_eq!(string.encode().unwrap(), vec![0x1b, 1]);

    let helper = SignatureDesc::Helper {
        id: HelperId::DelayLoadHelper,
    };
    assert_eq!(helper.encode().unwrap(), vec![0x1a, 9]);
}

#[test]
fn unknown_token_kinds_are_rejected() {
    let desc = SignatureDesc::Method {
        kind: FixupKind::MethodEntryDefToken,
        token: Token::from_raw(0xAA00_0001),
    };
    assert!(matches!(
        desc.encode(),
        Err(FormatError::UnsupportedToken { raw: 0xAA00_0001 })
    ));

    let desc = SignatureDesc::Type {
        kind: FixupKind::NewObject,
        token: Token::new(TokenKind::MethodDef, 1),
    };
    assert!(matches!(
        desc.encode(),
        Err(FormatError::UnsupportedToken { .. })
    ));
}

#[test]
fn descriptions_are_stable() {
    assert_eq!(
        SignatureDesc::Method {
            kind: FixupKind::MethodEntryDefToken,
            token: Token::new(TokenKind::MethodDef, 2),
        }
        .describe(),
        "MethodEntryDefToken_method_def:2"
    );
    assert_eq!(
        SignatureDesc::VirtualSlot {
            owner: Token::new(TokenKind::TypeRef, 1),
            slot: 4,
        }
        .describe(),
        "VirtualSlot_type_ref:1_4"
    );
    assert_eq!(SignatureDesc::StringHandle { rid: 7 }.describe(), "String_7");
    assert_eq!(
        SignatureDesc::Helper {
            id: HelperId::Module
        }
        .describe(),
        "Helper_Module"
    );
}
