//! Nibble-granular encoding.
//!
//! Fixup blobs pack small unsigned values as base-8 digit runs: each nibble
//! carries three payload bits, with the top bit flagging a continuation.
//! Nibbles fill the low half of a byte first.

use crate::{FormatError, Result};

#[derive(Default)]
pub struct NibbleWriter {
    bytes: Vec<u8>,
    // Low nibble of a byte still waiting for its high half.
    pending: Option<u8>,
}

impl NibbleWriter {
    pub fn new() -> NibbleWriter {
        NibbleWriter::default()
    }

    pub fn write_nibble(&mut self, nibble: u8) {
        debug_assert!(nibble <= 0xF);
        match self.pending.take() {
            None => self.pending = Some(nibble),
            Some(low) => self.bytes.push(low | (nibble << 4)),
        }
    }

    /// Little-endian base-8 digits, continuation bit in each nibble's top bit.
    pub fn write_unsigned(&mut self, mut value: u32) {
        loop {
            let mut nibble = (value & 0x7) as u8;
            value >>= 3;
            if value != 0 {
                nibble |= 0x8;
            }
            self.write_nibble(nibble);
            if value == 0 {
                break;
            }
        }
    }

    /// Flush, zero-padding a trailing half byte.
    pub fn into_bytes(mut self) -> Vec<u8> {
        if let Some(low) = self.pending.take() {
            self.bytes.push(low);
        }
        self.bytes
    }
}

pub struct NibbleReader<'a> {
    bytes: &'a [u8],
    // Next nibble index; byte = index / 2, half = index % 2.
    index: usize,
}

impl<'a> NibbleReader<'a> {
    pub fn new(bytes: &'a [u8]) -> NibbleReader<'a> {
        NibbleReader { bytes, index: 0 }
    }

    pub fn read_nibble(&mut self) -> Result<u8> {
        let byte = self
            .bytes
            .get(self.index / 2)
            .ok_or(FormatError::UnexpectedEnd { offset: self.index / 2 })?;
        let nibble = if self.index % 2 == 0 {
            byte & 0xF
        } else {
            byte >> 4
        };
        self.index += 1;
        Ok(nibble)
    }

    pub fn read_unsigned(&mut self) -> Result<u32> {
        let mut value = 0u32;
        // 11 digits exhaust 32 bits; anything longer is corrupt.
        for shift in 0..11 {
            let nibble = self.read_nibble()?;
            value |= ((nibble & 0x7) as u32) << (shift * 3);
            if nibble & 0x8 == 0 {
                return Ok(value);
            }
        }
        Err(FormatError::Malformed {
            what: "nibble-encoded integer",
            detail: "continuation run exceeds 32 bits".to_string(),
        })
    }
}
