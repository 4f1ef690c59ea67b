//! Metadata tokens: 32-bit references into a module's tables.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Table selected by a token's high byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TokenKind {
    TypeRef = 0x01,
    TypeDef = 0x02,
    MethodDef = 0x06,
    MemberRef = 0x0A,
    TypeSpec = 0x1B,
    UserString = 0x70,
}

impl TokenKind {
    pub fn from_byte(byte: u8) -> Option<TokenKind> {
        match byte {
            0x01 => Some(TokenKind::TypeRef),
            0x02 => Some(TokenKind::TypeDef),
            0x06 => Some(TokenKind::MethodDef),
            0x0A => Some(TokenKind::MemberRef),
            0x1B => Some(TokenKind::TypeSpec),
            0x70 => Some(TokenKind::UserString),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            TokenKind::TypeRef => "type_ref",
            TokenKind::TypeDef => "type_def",
            TokenKind::MethodDef => "method_def",
            TokenKind::MemberRef => "member_ref",
            TokenKind::TypeSpec => "type_spec",
            TokenKind::UserString => "user_string",
        }
    }

    fn from_name(name: &str) -> Option<TokenKind> {
        match name {
            "type_ref" => Some(TokenKind::TypeRef),
            "type_def" => Some(TokenKind::TypeDef),
            "method_def" => Some(TokenKind::MethodDef),
            "member_ref" => Some(TokenKind::MemberRef),
            "type_spec" => Some(TokenKind::TypeSpec),
            "user_string" => Some(TokenKind::UserString),
            _ => None,
        }
    }
}

/// 32-bit metadata token: high byte is the table kind, low 24 bits the row id.
///
/// Row ids (RIDs) are 1-based; RID 0 is the nil row. In module descriptions a
/// token is written as `"kind:rid"`, e.g. `"member_ref:2"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u32);

impl Token {
    pub const RID_MASK: u32 = 0x00FF_FFFF;

    pub fn new(kind: TokenKind, rid: u32) -> Token {
        debug_assert!(rid <= Self::RID_MASK, "rid {rid:#x} exceeds 24 bits");
        Token(((kind as u32) << 24) | (rid & Self::RID_MASK))
    }

    pub fn from_raw(raw: u32) -> Token {
        Token(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    /// Table kind, if the high byte names a known table.
    pub fn kind(self) -> Option<TokenKind> {
        TokenKind::from_byte((self.0 >> 24) as u8)
    }

    pub fn rid(self) -> u32 {
        self.0 & Self::RID_MASK
    }

    pub fn is_nil(self) -> bool {
        self.rid() == 0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{}:{}", kind.name(), self.rid()),
            None => write!(f, "raw:{:#010x}", self.0),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({self})")
    }
}

impl FromStr for Token {
    type Err = String;

    fn from_str(s: &str) -> Result<Token, String> {
        let (kind, rid) = s
            .split_once(':')
            .ok_or_else(|| format!("token `{s}` is not of the form `kind:rid`"))?;
        let kind =
            TokenKind::from_name(kind).ok_or_else(|| format!("unknown token kind `{kind}`"))?;
        let rid: u32 = rid
            .parse()
            .map_err(|_| format!("token `{s}` has a non-numeric rid"))?;
        if rid > Token::RID_MASK {
            return Err(format!("token `{s}` rid exceeds 24 bits"));
        }
        Ok(Token::new(kind, rid))
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Token, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}
