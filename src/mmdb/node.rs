//! Search Tree Node Records
//!
//! Each node of the search tree holds two child records (left for a 0 bit,
//! right for a 1 bit), packed big-endian at one of three widths:
//!
//! ```text
//! 24-bit: [ left 24 ][ right 24 ]                      6 bytes
//! 28-bit: [ left 24 ][ lhi 4 | rhi 4 ][ right 24 ]     7 bytes
//! 32-bit: [ left 32 ][ right 32 ]                      8 bytes
//! ```
//!
//! Reads take the byte offset of the node's first byte. Every read checks the
//! highest byte index it needs against the buffer length first and returns `0`
//! when that index is out of range. Left and right are checked independently,
//! so a node truncated after its left record still yields a valid left child.

use super::types::RecordSize;

/// Value returned for any record that does not fit in the buffer
pub const OUT_OF_RANGE_RECORD: u32 = 0;

/// Reads left/right child records from raw search tree bytes
#[derive(Debug, Clone, Copy)]
pub struct NodeReader<'a> {
    buffer: &'a [u8],
    record_size: RecordSize,
}

impl<'a> NodeReader<'a> {
    /// Create a reader over the search tree bytes
    pub fn new(buffer: &'a [u8], record_size: RecordSize) -> Self {
        Self {
            buffer,
            record_size,
        }
    }

    /// Record width this reader decodes
    pub fn record_size(&self) -> RecordSize {
        self.record_size
    }

    /// Byte offset of a node number, `None` on overflow
    pub fn node_offset(&self, node: u32) -> Option<usize> {
        (node as usize).checked_mul(self.record_size.node_bytes())
    }

    /// Read the record followed for a 0 bit
    pub fn read_left(&self, offset: usize) -> u32 {
        match self.record_size {
            RecordSize::Bits24 => self.be24(offset).unwrap_or(OUT_OF_RANGE_RECORD),
            RecordSize::Bits28 => {
                if !self.fits(offset, 3) {
                    return OUT_OF_RANGE_RECORD;
                }
                let high = ((self.buffer[offset + 3] & 0xF0) as u32) << 20;
                high | self.be24(offset).unwrap_or(OUT_OF_RANGE_RECORD)
            }
            RecordSize::Bits32 => self.be32(offset).unwrap_or(OUT_OF_RANGE_RECORD),
        }
    }

    /// Read the record followed for a 1 bit
    pub fn read_right(&self, offset: usize) -> u32 {
        match self.record_size {
            RecordSize::Bits24 => offset
                .checked_add(3)
                .and_then(|o| self.be24(o))
                .unwrap_or(OUT_OF_RANGE_RECORD),
            RecordSize::Bits28 => {
                if !self.fits(offset, 6) {
                    return OUT_OF_RANGE_RECORD;
                }
                let high = ((self.buffer[offset + 3] & 0x0F) as u32) << 24;
                high | self.be24(offset + 4).unwrap_or(OUT_OF_RANGE_RECORD)
            }
            RecordSize::Bits32 => offset
                .checked_add(4)
                .and_then(|o| self.be32(o))
                .unwrap_or(OUT_OF_RANGE_RECORD),
        }
    }

    /// Read the record for the given address bit
    #[inline]
    pub fn read(&self, offset: usize, bit: u8) -> u32 {
        if bit == 0 {
            self.read_left(offset)
        } else {
            self.read_right(offset)
        }
    }

    /// True when `offset + last` is a valid index
    #[inline]
    fn fits(&self, offset: usize, last: usize) -> bool {
        matches!(offset.checked_add(last), Some(end) if end < self.buffer.len())
    }

    fn be24(&self, offset: usize) -> Option<u32> {
        if !self.fits(offset, 2) {
            return None;
        }
        let b = &self.buffer[offset..offset + 3];
        Some(((b[0] as u32) << 16) | ((b[1] as u32) << 8) | (b[2] as u32))
    }

    fn be32(&self, offset: usize) -> Option<u32> {
        if !self.fits(offset, 3) {
            return None;
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buffer[offset..offset + 4]);
        Some(u32::from_be_bytes(bytes))
    }
}
