//! Entry-point tables and fixup blobs, writer side.
//!
//! Both entry-point sections share this layout: a compressed slot count,
//! one record per method RID (a single zero byte for gaps), and the
//! nibble-encoded fixup blobs the records point into. Blob offsets are
//! measured from the start of the section and written in the fixed
//! four-byte compressed form so record sizes never depend on them.

use indexmap::IndexSet;
use prewarm_image::compressed;
use prewarm_image::nibble::NibbleWriter;

#[derive(Clone, Copy, Debug)]
struct Entry {
    runtime_function: u32,
    /// Index into the interned blob set.
    fixups: Option<usize>,
}

impl Entry {
    fn lead(&self) -> u32 {
        ((self.runtime_function + 1) << 1) | self.fixups.is_some() as u32
    }
}

/// One entry-point table under construction. Slots are keyed by 1-based
/// method RID; byte-identical fixup blobs share storage.
#[derive(Default)]
pub struct EntryPointTable {
    entries: Vec<Option<Entry>>,
    blobs: IndexSet<Vec<u8>>,
}

impl EntryPointTable {
    pub fn set_entry(&mut self, rid: u32, runtime_function: u32, fixups: Option<Vec<u8>>) {
        debug_assert!(rid >= 1, "method RIDs are 1-based");
        let index = (rid - 1) as usize;
        if self.entries.len() <= index {
            self.entries.resize(index + 1, None);
        }
        let fixups = fixups.map(|blob| self.blobs.insert_full(blob).0);
        self.entries[index] = Some(Entry {
            runtime_function,
            fixups,
        });
    }

    /// Number of slots, including trailing gaps never written to.
    pub fn slot_count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> prewarm_image::Result<Vec<u8>> {
        let mut size = compressed::encoded_len(self.entries.len() as u32);
        for entry in &self.entries {
            size += match entry {
                None => 1,
                Some(entry) => {
                    compressed::encoded_len(entry.lead())
                        + if entry.fixups.is_some() { 4 } else { 0 }
                }
            };
        }
        let mut offsets = Vec::with_capacity(self.blobs.len());
        let mut cursor = size as u32;
        for blob in &self.blobs {
            offsets.push(cursor);
            cursor += blob.len() as u32;
        }

        let mut out = Vec::with_capacity(cursor as usize);
        compressed::encode_unsigned(self.entries.len() as u32, &mut out)?;
        for entry in &self.entries {
            match entry {
                None => out.push(0),
                Some(entry) => {
                    compressed::encode_unsigned(entry.lead(), &mut out)?;
                    if let Some(blob) = entry.fixups {
                        compressed::encode_unsigned_fixed(offsets[blob], &mut out)?;
                    }
                }
            }
        }
        for blob in &self.blobs {
            out.extend_from_slice(blob);
        }
        debug_assert_eq!(out.len() as u32, cursor);
        Ok(out)
    }
}

/// Nibble-encode a sorted, deduplicated `(section, cell)` list the way
/// the loader walks it: one run of ascending cells per section, cells
/// after the first as deltas, a zero ending each run, then the distance
/// to the next section or a final zero.
pub fn encode_fixup_blob(cells: &[(u32, u32)]) -> Vec<u8> {
    debug_assert!(!cells.is_empty());
    debug_assert!(cells.windows(2).all(|w| w[0] < w[1]));
    let mut writer = NibbleWriter::new();
    let (mut section, mut cell) = cells[0];
    writer.write_unsigned(section);
    writer.write_unsigned(cell);
    for &(next_section, next_cell) in &cells[1..] {
        if next_section == section {
            writer.write_unsigned(next_cell - cell);
        } else {
            writer.write_unsigned(0);
            writer.write_unsigned(next_section - section);
            writer.write_unsigned(next_cell);
        }
        section = next_section;
        cell = next_cell;
    }
    writer.write_unsigned(0);
    writer.write_unsigned(0);
    writer.into_bytes()
}
