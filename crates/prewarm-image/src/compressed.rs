//! Compressed integers.
//!
//! Big-endian variable-width encoding with the width tagged in the top bits
//! of the first byte: `0xxxxxxx` one byte, `10xxxxxx` two bytes, `11xxxxxx`
//! four bytes. The four-byte form carries 29 bits of payload; wider values
//! are an encoding error. Signed values rotate the sign through the low bit
//! before width selection.

use crate::{FormatError, Result};

/// Largest encodable unsigned value.
pub const MAX_UNSIGNED: u32 = 0x1FFF_FFFF;

pub fn encode_unsigned(value: u32, out: &mut Vec<u8>) -> Result<()> {
    if value <= 0x7F {
        out.push(value as u8);
    } else if value <= 0x3FFF {
        out.push((value >> 8) as u8 | 0x80);
        out.push(value as u8);
    } else if value <= MAX_UNSIGNED {
        out.push((value >> 24) as u8 | 0xC0);
        out.push((value >> 16) as u8);
        out.push((value >> 8) as u8);
        out.push(value as u8);
    } else {
        return Err(FormatError::ValueTooWide {
            value: value as u64,
        });
    }
    Ok(())
}

/// Encode in the four-byte form regardless of magnitude. Used for slots
/// whose final value is resolved after layout reserved their width.
pub fn encode_unsigned_fixed(value: u32, out: &mut Vec<u8>) -> Result<()> {
    if value > MAX_UNSIGNED {
        return Err(FormatError::ValueTooWide {
            value: value as u64,
        });
    }
    out.push((value >> 24) as u8 | 0xC0);
    out.push((value >> 16) as u8);
    out.push((value >> 8) as u8);
    out.push(value as u8);
    Ok(())
}

pub fn encode_signed(value: i32, out: &mut Vec<u8>) -> Result<()> {
    let folded = ((value.unsigned_abs() as u64) << 1) | (value < 0) as u64;
    if folded > MAX_UNSIGNED as u64 {
        return Err(FormatError::ValueTooWide { value: folded });
    }
    encode_unsigned(folded as u32, out)
}

/// Number of bytes `encode_unsigned` would produce.
pub fn encoded_len(value: u32) -> usize {
    if value <= 0x7F {
        1
    } else if value <= 0x3FFF {
        2
    } else {
        4
    }
}

pub fn decode_unsigned(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let first = *bytes.get(*pos).ok_or(FormatError::UnexpectedEnd { offset: *pos })?;
    if first & 0x80 == 0 {
        *pos += 1;
        return Ok(first as u32);
    }
    if first & 0x40 == 0 {
        let rest = bytes
            .get(*pos + 1)
            .ok_or(FormatError::UnexpectedEnd { offset: *pos + 1 })?;
        *pos += 2;
        return Ok(((first as u32 & 0x3F) << 8) | *rest as u32);
    }
    if bytes.len() < *pos + 4 {
        return Err(FormatError::UnexpectedEnd { offset: bytes.len() });
    }
    let value = ((first as u32 & 0x1F) << 24)
        | (bytes[*pos + 1] as u32) << 16
        | (bytes[*pos + 2] as u32) << 8
        | bytes[*pos + 3] as u32;
    *pos += 4;
    Ok(value)
}

pub fn decode_signed(bytes: &[u8], pos: &mut usize) -> Result<i32> {
    let folded = decode_unsigned(bytes, pos)?;
    let magnitude = (folded >> 1) as i32;
    if folded & 1 == 0 {
        Ok(magnitude)
    } else {
        Ok(-magnitude)
    }
}
