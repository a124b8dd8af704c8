//! Decoded data values and the data-section decoder
//!
//! MMDB data sections store a compact, pointer-deduplicated encoding of
//! JSON-like values. `DataValue` is the decoded form and `DataDecoder`
//! walks the raw bytes. Maps preserve their serialized key order so that
//! "first N keys" operations are deterministic across runs.

use crate::error::MmdbError;

/// Maximum container/pointer nesting the decoder will follow.
///
/// Real databases nest a handful of levels deep; the cap exists so a
/// corrupted file with a pointer cycle fails instead of recursing forever.
const MAX_DECODE_DEPTH: usize = 512;

/// A decoded MMDB data value
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Signed 32-bit integer
    Int32(i32),
    /// 64-bit float
    Double(f64),
    /// 32-bit float
    Float(f32),
    /// Boolean
    Bool(bool),
    /// Ordered sequence of values
    Array(Vec<DataValue>),
    /// Key/value record, in serialized key order
    Map(Vec<(String, DataValue)>),
}

impl DataValue {
    /// Borrow the entries if this value is a map.
    pub fn as_map(&self) -> Option<&[(String, DataValue)]> {
        match self {
            DataValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a key if this value is a map.
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// True for empty containers and empty strings.
    ///
    /// Records whose value is empty carry no information for tabular
    /// export and are skipped by schema inference and row emission.
    pub fn is_empty_data(&self) -> bool {
        match self {
            DataValue::Map(entries) => entries.is_empty(),
            DataValue::Array(items) => items.is_empty(),
            DataValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Plain string form of a scalar value.
    ///
    /// Containers render as a summary; callers that need the structured
    /// form should match on the variant instead.
    pub fn scalar_string(&self) -> String {
        match self {
            DataValue::String(s) => s.clone(),
            DataValue::Bytes(b) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
            DataValue::Uint16(n) => n.to_string(),
            DataValue::Uint32(n) => n.to_string(),
            DataValue::Uint64(n) => n.to_string(),
            DataValue::Uint128(n) => n.to_string(),
            DataValue::Int32(n) => n.to_string(),
            DataValue::Double(n) => n.to_string(),
            DataValue::Float(n) => n.to_string(),
            DataValue::Bool(b) => b.to_string(),
            DataValue::Array(items) => format!("[{} items]", items.len()),
            DataValue::Map(entries) => format!("{{{} keys}}", entries.len()),
        }
    }
}

/// Decoder over a data section (or metadata section) byte slice.
///
/// Pointer offsets in the encoding are relative to the start of the slice,
/// which matches both the data section and the metadata section layouts.
pub struct DataDecoder<'a> {
    section: &'a [u8],
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder over a section slice.
    pub fn new(section: &'a [u8]) -> Self {
        Self { section }
    }

    /// Decode the value starting at `offset`.
    pub fn decode(&self, offset: usize) -> Result<DataValue, MmdbError> {
        let (value, _next) = self.decode_at(offset, 0)?;
        Ok(value)
    }

    /// Decode the value at `offset`, returning it and the offset of the
    /// next value.
    fn decode_at(&self, offset: usize, depth: usize) -> Result<(DataValue, usize), MmdbError> {
        if depth > MAX_DECODE_DEPTH {
            return Err(MmdbError::Decode(
                "nesting or pointer chain exceeds decode depth limit".to_string(),
            ));
        }
        let ctrl = self.byte(offset)?;
        let type_num = ctrl >> 5;

        // Pointers carry their own payload layout and bypass size decoding
        if type_num == 1 {
            let (target, next) = self.decode_pointer(ctrl, offset)?;
            let (value, _) = self.decode_at(target, depth + 1)?;
            return Ok((value, next));
        }

        let (type_num, mut cursor) = if type_num == 0 {
            // Extended type: actual type is 7 + the byte after the control byte
            let ext = self.byte(offset + 1)?;
            (ext as usize + 7, offset + 2)
        } else {
            (type_num as usize, offset + 1)
        };

        let mut size = (ctrl & 0x1f) as usize;
        match size {
            29 => {
                size = 29 + self.byte(cursor)? as usize;
                cursor += 1;
            }
            30 => {
                size = 285 + self.read_uint(cursor, 2)? as usize;
                cursor += 2;
            }
            31 => {
                size = 65_821 + self.read_uint(cursor, 3)? as usize;
                cursor += 3;
            }
            _ => {}
        }

        match type_num {
            2 => {
                let bytes = self.slice(cursor, size)?;
                let s = std::str::from_utf8(bytes).map_err(|_| {
                    MmdbError::Decode(format!("invalid UTF-8 in string at offset {}", cursor))
                })?;
                Ok((DataValue::String(s.to_string()), cursor + size))
            }
            3 => {
                if size != 8 {
                    return Err(MmdbError::Decode(format!("double with size {}", size)));
                }
                let bytes: [u8; 8] = self.slice(cursor, 8)?.try_into().unwrap();
                Ok((DataValue::Double(f64::from_be_bytes(bytes)), cursor + 8))
            }
            4 => {
                let bytes = self.slice(cursor, size)?.to_vec();
                Ok((DataValue::Bytes(bytes), cursor + size))
            }
            5 => {
                if size > 2 {
                    return Err(MmdbError::Decode(format!("uint16 with size {}", size)));
                }
                let n = self.read_uint(cursor, size)?;
                Ok((DataValue::Uint16(n as u16), cursor + size))
            }
            6 => {
                if size > 4 {
                    return Err(MmdbError::Decode(format!("uint32 with size {}", size)));
                }
                let n = self.read_uint(cursor, size)?;
                Ok((DataValue::Uint32(n as u32), cursor + size))
            }
            7 => {
                let mut entries = Vec::with_capacity(size);
                let mut at = cursor;
                for _ in 0..size {
                    let (key, after_key) = self.decode_at(at, depth + 1)?;
                    let key = match key {
                        DataValue::String(s) => s,
                        other => {
                            return Err(MmdbError::Decode(format!(
                                "map key is not a string: {:?}",
                                other
                            )))
                        }
                    };
                    let (value, after_value) = self.decode_at(after_key, depth + 1)?;
                    entries.push((key, value));
                    at = after_value;
                }
                Ok((DataValue::Map(entries), at))
            }
            8 => {
                if size > 4 {
                    return Err(MmdbError::Decode(format!("int32 with size {}", size)));
                }
                let n = self.read_uint(cursor, size)? as u32;
                Ok((DataValue::Int32(n as i32), cursor + size))
            }
            9 => {
                if size > 8 {
                    return Err(MmdbError::Decode(format!("uint64 with size {}", size)));
                }
                let n = self.read_uint(cursor, size)?;
                Ok((DataValue::Uint64(n), cursor + size))
            }
            10 => {
                if size > 16 {
                    return Err(MmdbError::Decode(format!("uint128 with size {}", size)));
                }
                let mut n: u128 = 0;
                for b in self.slice(cursor, size)? {
                    n = (n << 8) | *b as u128;
                }
                Ok((DataValue::Uint128(n), cursor + size))
            }
            11 => {
                let mut items = Vec::with_capacity(size);
                let mut at = cursor;
                for _ in 0..size {
                    let (item, after) = self.decode_at(at, depth + 1)?;
                    items.push(item);
                    at = after;
                }
                Ok((DataValue::Array(items), at))
            }
            14 => {
                // Boolean: the size field is the value, no payload bytes
                Ok((DataValue::Bool(size != 0), cursor))
            }
            15 => {
                if size != 4 {
                    return Err(MmdbError::Decode(format!("float with size {}", size)));
                }
                let bytes: [u8; 4] = self.slice(cursor, 4)?.try_into().unwrap();
                Ok((DataValue::Float(f32::from_be_bytes(bytes)), cursor + 4))
            }
            other => Err(MmdbError::Decode(format!(
                "unsupported type {} at offset {}",
                other, offset
            ))),
        }
    }

    /// Decode a pointer control byte, returning the target offset and the
    /// offset of the value after the pointer.
    fn decode_pointer(&self, ctrl: u8, offset: usize) -> Result<(usize, usize), MmdbError> {
        let size_bits = (ctrl >> 3) & 0b11;
        let value_bits = (ctrl & 0b111) as usize;
        match size_bits {
            0 => {
                let target = (value_bits << 8) | self.byte(offset + 1)? as usize;
                Ok((target, offset + 2))
            }
            1 => {
                let target =
                    (value_bits << 16) | self.read_uint(offset + 1, 2)? as usize;
                Ok((target + 2048, offset + 3))
            }
            2 => {
                let target =
                    (value_bits << 24) | self.read_uint(offset + 1, 3)? as usize;
                Ok((target + 526_336, offset + 4))
            }
            _ => {
                let target = self.read_uint(offset + 1, 4)? as usize;
                Ok((target, offset + 5))
            }
        }
    }

    fn byte(&self, offset: usize) -> Result<u8, MmdbError> {
        self.section.get(offset).copied().ok_or_else(|| {
            MmdbError::Decode(format!("offset {} beyond section end", offset))
        })
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], MmdbError> {
        self.section.get(offset..offset + len).ok_or_else(|| {
            MmdbError::Decode(format!(
                "range {}..{} beyond section end",
                offset,
                offset + len
            ))
        })
    }

    /// Big-endian unsigned integer of `len` bytes (zero for `len == 0`).
    fn read_uint(&self, offset: usize, len: usize) -> Result<u64, MmdbError> {
        let mut n: u64 = 0;
        for b in self.slice(offset, len)? {
            n = (n << 8) | *b as u64;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_string() {
        // control: type 2 (string), size 5
        let section = [0b0100_0101u8, b'h', b'e', b'l', b'l', b'o'];
        let decoder = DataDecoder::new(&section);
        assert_eq!(
            decoder.decode(0).unwrap(),
            DataValue::String("hello".to_string())
        );
    }

    #[test]
    fn test_decode_uint16_and_uint32() {
        // uint16, 2 bytes: 0x0102
        let section = [0b1010_0010u8, 0x01, 0x02];
        let decoder = DataDecoder::new(&section);
        assert_eq!(decoder.decode(0).unwrap(), DataValue::Uint16(0x0102));

        // uint32, 0 bytes: zero
        let section = [0b1100_0000u8];
        let decoder = DataDecoder::new(&section);
        assert_eq!(decoder.decode(0).unwrap(), DataValue::Uint32(0));
    }

    #[test]
    fn test_decode_extended_bool() {
        // extended type: control 0b000 with size 1, next byte 14 - 7 = 7
        let section = [0b0000_0001u8, 7];
        let decoder = DataDecoder::new(&section);
        assert_eq!(decoder.decode(0).unwrap(), DataValue::Bool(true));

        let section = [0b0000_0000u8, 7];
        let decoder = DataDecoder::new(&section);
        assert_eq!(decoder.decode(0).unwrap(), DataValue::Bool(false));
    }

    #[test]
    fn test_decode_double() {
        let mut section = vec![0b0110_1000u8];
        section.extend_from_slice(&1.5f64.to_be_bytes());
        let decoder = DataDecoder::new(&section);
        assert_eq!(decoder.decode(0).unwrap(), DataValue::Double(1.5));
    }

    #[test]
    fn test_decode_map_preserves_order() {
        // map with 2 entries: {"b": 1, "a": 2} — order must survive decoding
        let section = [
            0b1110_0010u8, // map, 2 entries
            0b0100_0001,
            b'b',
            0b1100_0001,
            1, // uint32 1
            0b0100_0001,
            b'a',
            0b1100_0001,
            2, // uint32 2
        ];
        let decoder = DataDecoder::new(&section);
        let value = decoder.decode(0).unwrap();
        let entries = value.as_map().unwrap();
        assert_eq!(entries[0].0, "b");
        assert_eq!(entries[1].0, "a");
        assert_eq!(value.get("a"), Some(&DataValue::Uint32(2)));
    }

    #[test]
    fn test_decode_array() {
        // extended type 11 (array), 2 items
        let section = [
            0b0000_0010u8,
            4, // 11 - 7
            0b0100_0001,
            b'x',
            0b0100_0001,
            b'y',
        ];
        let decoder = DataDecoder::new(&section);
        assert_eq!(
            decoder.decode(0).unwrap(),
            DataValue::Array(vec![
                DataValue::String("x".to_string()),
                DataValue::String("y".to_string()),
            ])
        );
    }

    #[test]
    fn test_decode_pointer_to_string() {
        // string "ok" at offset 0, then a small (11-bit) pointer back to it
        let section = [
            0b0100_0010u8,
            b'o',
            b'k',
            0b0010_0000, // pointer, size bits 0, value bits 0
            0x00,        // target offset 0
        ];
        let decoder = DataDecoder::new(&section);
        assert_eq!(
            decoder.decode(3).unwrap(),
            DataValue::String("ok".to_string())
        );
    }

    #[test]
    fn test_pointer_cycle_fails() {
        // pointer at offset 0 pointing at itself
        let section = [0b0010_0000u8, 0x00];
        let decoder = DataDecoder::new(&section);
        assert!(decoder.decode(0).is_err());
    }

    #[test]
    fn test_truncated_section_fails() {
        // string claims 5 bytes but only 2 present
        let section = [0b0100_0101u8, b'h', b'i'];
        let decoder = DataDecoder::new(&section);
        assert!(decoder.decode(0).is_err());
    }

    #[test]
    fn test_is_empty_data() {
        assert!(DataValue::Map(vec![]).is_empty_data());
        assert!(DataValue::Array(vec![]).is_empty_data());
        assert!(DataValue::String(String::new()).is_empty_data());
        assert!(!DataValue::Uint32(0).is_empty_data());
        assert!(!DataValue::Bool(false).is_empty_data());
    }

    #[test]
    fn test_scalar_string() {
        assert_eq!(DataValue::Uint32(42).scalar_string(), "42");
        assert_eq!(DataValue::Double(3.25).scalar_string(), "3.25");
        assert_eq!(DataValue::Bool(false).scalar_string(), "false");
        assert_eq!(DataValue::Bytes(vec![0xde, 0xad]).scalar_string(), "dead");
    }
}
