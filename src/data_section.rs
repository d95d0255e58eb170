//! MMDB data section decoding
//!
//! Decodes the MaxMind DB data type encoding used by the data section and the
//! metadata map. Only decoding is supported.
//!
//! # Format
//!
//! Every field starts with a control byte: the top 3 bits hold the type, the
//! low 5 bits the size (or, for pointers, size class and high value bits).
//! Type 0 means "extended": the real type is `7 + next byte`. Sizes 29, 30 and
//! 31 pull 1, 2 or 3 more bytes of length.
//!
//! Pointers are followed transparently, so decoded values never contain them.
//! All reads are bounds-checked and nesting is capped, so corrupt input yields
//! `MmdbError::DecodeError` rather than a panic or unbounded recursion.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use crate::mmdb::MmdbError;
use std::collections::HashMap;

/// Maximum nesting of maps, arrays and pointers
const MAX_DEPTH: usize = 64;

/// Decoded data value
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map; MMDB map keys are always strings
    Map(HashMap<String, DataValue>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Unsigned value, if this is an unsigned integer that fits in 64 bits
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(*n as u64),
            DataValue::Uint32(n) => Some(*n as u64),
            DataValue::Uint64(n) => Some(*n),
            DataValue::Uint128(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Floating point value of any numeric type
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Double(d) => Some(*d),
            DataValue::Float(f) => Some(*f as f64),
            DataValue::Int32(n) => Some(*n as f64),
            other => other.as_u64().map(|n| n as f64),
        }
    }

    /// Map entry, if this is a map
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self {
            DataValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Array element, if this is an array
    pub fn index(&self, idx: usize) -> Option<&DataValue> {
        match self {
            DataValue::Array(items) => items.get(idx),
            _ => None,
        }
    }
}

/// Data section decoder
///
/// Offsets, including pointer targets, are relative to the start of `buffer`.
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder for a data section
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Decode a value at the given offset
    pub fn decode(&self, offset: u32) -> Result<DataValue, MmdbError> {
        let mut cursor = offset as usize;
        self.decode_at(&mut cursor, 0)
    }

    fn decode_at(&self, cursor: &mut usize, depth: usize) -> Result<DataValue, MmdbError> {
        if depth > MAX_DEPTH {
            return Err(decode_err("Maximum data nesting depth exceeded"));
        }

        let ctrl = self.read_u8(cursor)?;
        let mut type_id = ctrl >> 5;

        if type_id == 1 {
            let target = self.decode_pointer(cursor, ctrl)?;
            let mut target_cursor = target as usize;
            return self.decode_at(&mut target_cursor, depth + 1);
        }

        if type_id == 0 {
            let ext = self.read_u8(cursor)?;
            type_id = ext
                .checked_add(7)
                .ok_or_else(|| decode_err("Invalid extended type"))?;
        }

        let size = self.decode_size(cursor, ctrl & 0x1F)?;

        match type_id {
            2 => {
                let bytes = self.take(cursor, size)?;
                std::str::from_utf8(bytes)
                    .map(|s| DataValue::String(s.to_string()))
                    .map_err(|_| decode_err("Invalid UTF-8"))
            }
            3 => {
                if size != 8 {
                    return Err(decode_err("Double must be 8 bytes"));
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(self.take(cursor, 8)?);
                Ok(DataValue::Double(f64::from_be_bytes(bytes)))
            }
            4 => Ok(DataValue::Bytes(self.take(cursor, size)?.to_vec())),
            5 => Ok(DataValue::Uint16(self.decode_uint(cursor, size, 2)? as u16)),
            6 => Ok(DataValue::Uint32(self.decode_uint(cursor, size, 4)? as u32)),
            7 => self.decode_map(cursor, size, depth),
            8 => Ok(DataValue::Int32(self.decode_uint(cursor, size, 4)? as u32 as i32)),
            9 => Ok(DataValue::Uint64(self.decode_uint(cursor, size, 8)? as u64)),
            10 => Ok(DataValue::Uint128(self.decode_uint(cursor, size, 16)?)),
            11 => self.decode_array(cursor, size, depth),
            14 => match size {
                0 => Ok(DataValue::Bool(false)),
                1 => Ok(DataValue::Bool(true)),
                _ => Err(decode_err("Invalid boolean size")),
            },
            15 => {
                if size != 4 {
                    return Err(decode_err("Float must be 4 bytes"));
                }
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(self.take(cursor, 4)?);
                Ok(DataValue::Float(f32::from_be_bytes(bytes)))
            }
            _ => Err(decode_err(&format!("Unsupported data type {}", type_id))),
        }
    }

    /// Pointer target, relative to the start of the data section
    fn decode_pointer(&self, cursor: &mut usize, ctrl: u8) -> Result<u32, MmdbError> {
        let size_class = (ctrl >> 3) & 0x3;
        let high = (ctrl & 0x7) as u32;
        let bytes = self.take(cursor, size_class as usize + 1)?;
        let value = bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);

        Ok(match size_class {
            0 => (high << 8) | value,
            1 => ((high << 16) | value) + 0x800,
            2 => ((high << 24) | value) + 0x80800,
            _ => value,
        })
    }

    fn decode_map(
        &self,
        cursor: &mut usize,
        count: usize,
        depth: usize,
    ) -> Result<DataValue, MmdbError> {
        let mut map = HashMap::with_capacity(count.min(self.remaining(*cursor)));

        for _ in 0..count {
            let key = match self.decode_at(cursor, depth + 1)? {
                DataValue::String(s) => s,
                _ => return Err(decode_err("Map key must be string")),
            };
            let value = self.decode_at(cursor, depth + 1)?;
            map.insert(key, value);
        }

        Ok(DataValue::Map(map))
    }

    fn decode_array(
        &self,
        cursor: &mut usize,
        count: usize,
        depth: usize,
    ) -> Result<DataValue, MmdbError> {
        let mut array = Vec::with_capacity(count.min(self.remaining(*cursor)));

        for _ in 0..count {
            array.push(self.decode_at(cursor, depth + 1)?);
        }

        Ok(DataValue::Array(array))
    }

    /// Big-endian unsigned integer of `size` bytes, at most `max` bytes wide
    fn decode_uint(&self, cursor: &mut usize, size: usize, max: usize) -> Result<u128, MmdbError> {
        if size > max {
            return Err(decode_err("Integer payload too large"));
        }
        let bytes = self.take(cursor, size)?;
        Ok(bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128))
    }

    fn decode_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize, MmdbError> {
        match size_bits {
            0..=28 => Ok(size_bits as usize),
            29 => Ok(29 + self.read_u8(cursor)? as usize),
            30 => {
                let b = self.take(cursor, 2)?;
                Ok(285 + (((b[0] as usize) << 8) | b[1] as usize))
            }
            _ => {
                let b = self.take(cursor, 3)?;
                Ok(65_821 + (((b[0] as usize) << 16) | ((b[1] as usize) << 8) | b[2] as usize))
            }
        }
    }

    fn read_u8(&self, cursor: &mut usize) -> Result<u8, MmdbError> {
        let byte = *self
            .buffer
            .get(*cursor)
            .ok_or_else(|| decode_err("Cursor out of bounds"))?;
        *cursor += 1;
        Ok(byte)
    }

    fn take(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8], MmdbError> {
        let end = cursor
            .checked_add(len)
            .filter(|&end| end <= self.buffer.len())
            .ok_or_else(|| decode_err("Data out of bounds"))?;
        let bytes = &self.buffer[*cursor..end];
        *cursor = end;
        Ok(bytes)
    }

    fn remaining(&self, cursor: usize) -> usize {
        self.buffer.len().saturating_sub(cursor)
    }
}

fn decode_err(msg: &str) -> MmdbError {
    MmdbError::DecodeError(msg.to_string())
}
