use crate::{Token, TokenKind};

#[test]
fn kind_and_rid_round_trip() {
    let tok = Token::new(TokenKind::MemberRef, 0x1234);
    assert_eq!(tok.kind(), Some(TokenKind::MemberRef));
    assert_eq!(tok.rid(), 0x1234);
    assert_eq!(tok.raw(), 0x0A00_1234);
}

#[test]
fn nil_token() {
    assert!(Token::new(TokenKind::TypeDef, 0).is_nil());
    assert!(!Token::new(TokenKind::TypeDef, 1).is_nil());
}

#[test]
fn unknown_kind_byte() {
    let tok = Token::from_raw(0xFF00_0001);
    assert_eq!(tok.kind(), None);
    assert_eq!(tok.rid(), 1);
}

#[test]
fn display_and_parse() {
    let tok = Token::new(TokenKind::MethodDef, 7);
    assert_eq!(tok.to_string(), "method_def:7");
    assert_eq!("method_def:7".parse::<Token>().unwrap(), tok);
}

#[test]
fn parse_rejects_malformed() {
    assert!("method_def".parse::<Token>().is_err());
    assert!("bogus:1".parse::<Token>().is_err());
    assert!("type_def:x".parse::<Token>().is_err());
    assert!("type_def:16777216".parse::<Token>().is_err());
}

#[test]
fn serde_uses_string_form() {
    let tok = Token::new(TokenKind::UserString, 3);
    let json = serde_json::to_string(&tok).unwrap();
    assert_eq!(json, "\"user_string:3\"");
    let back: Token = serde_json::from_str(&json).unwrap();
    assert_eq!(back, tok);
}
