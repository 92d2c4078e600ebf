//! # AMQP Value Parser
//!
//! ## Purpose
//!
//! Bounds-checked decoder for the AMQP 1.0 type system. Every read is checked
//! against the remaining input, declared compound sizes are verified against the
//! bytes their members actually consumed, and element counts are capped by the
//! remaining input so a hostile peer cannot force large allocations.
//!
//! ## Usage
//!
//! ```rust
//! use codec::{ValueParser, Value};
//!
//! let mut parser = ValueParser::new(&[0xa1, 0x02, b'h', b'i']);
//! assert_eq!(parser.parse_value().unwrap(), Value::string("hi"));
//! assert!(parser.is_empty());
//! ```

use crate::constants::format;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use bytes::Bytes;

/// Cursor over an encoded AMQP byte sequence
#[derive(Debug, Clone)]
pub struct ValueParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ValueParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Offset of the next unread byte
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Decode the next complete value, constructor included
    pub fn parse_value(&mut self) -> CodecResult<Value> {
        let code = self.read_u8("constructor")?;
        self.parse_with_constructor(code)
    }

    /// Decode a value whose constructor byte has already been consumed
    pub fn parse_with_constructor(&mut self, code: u8) -> CodecResult<Value> {
        let value = match code {
            format::DESCRIBED => {
                let descriptor = self.parse_value()?;
                let value = self.parse_value()?;
                Value::Described(Box::new(descriptor), Box::new(value))
            }
            format::NULL => Value::Null,
            format::BOOLEAN => Value::Bool(self.read_u8("boolean")? != 0),
            format::BOOLEAN_TRUE => Value::Bool(true),
            format::BOOLEAN_FALSE => Value::Bool(false),
            format::UBYTE => Value::Ubyte(self.read_u8("ubyte")?),
            format::USHORT => Value::Ushort(u16::from_be_bytes(self.read_array("ushort")?)),
            format::UINT => Value::Uint(u32::from_be_bytes(self.read_array("uint")?)),
            format::SMALL_UINT => Value::Uint(self.read_u8("smalluint")? as u32),
            format::UINT_0 => Value::Uint(0),
            format::ULONG => Value::Ulong(u64::from_be_bytes(self.read_array("ulong")?)),
            format::SMALL_ULONG => Value::Ulong(self.read_u8("smallulong")? as u64),
            format::ULONG_0 => Value::Ulong(0),
            format::BYTE => Value::Byte(self.read_u8("byte")? as i8),
            format::SHORT => Value::Short(i16::from_be_bytes(self.read_array("short")?)),
            format::INT => Value::Int(i32::from_be_bytes(self.read_array("int")?)),
            format::SMALL_INT => Value::Int(self.read_u8("smallint")? as i8 as i32),
            format::LONG => Value::Long(i64::from_be_bytes(self.read_array("long")?)),
            format::SMALL_LONG => Value::Long(self.read_u8("smalllong")? as i8 as i64),
            format::FLOAT => Value::Float(f32::from_be_bytes(self.read_array("float")?)),
            format::DOUBLE => Value::Double(f64::from_be_bytes(self.read_array("double")?)),
            // Decimals are kept as their raw IEEE 754 bytes
            format::DECIMAL32 => Value::Binary(Bytes::copy_from_slice(self.take(4, "decimal32")?)),
            format::DECIMAL64 => Value::Binary(Bytes::copy_from_slice(self.take(8, "decimal64")?)),
            format::DECIMAL128 => Value::Binary(Bytes::copy_from_slice(self.take(16, "decimal128")?)),
            format::CHAR => {
                let offset = self.pos;
                let raw = u32::from_be_bytes(self.read_array("char")?);
                Value::Char(char::from_u32(raw).ok_or(CodecError::InvalidUtf8 { kind: "char", offset })?)
            }
            format::TIMESTAMP => Value::Timestamp(i64::from_be_bytes(self.read_array("timestamp")?)),
            format::UUID => Value::Uuid(self.read_array("uuid")?),
            format::VBIN8 => {
                let len = self.read_u8("vbin8 length")? as usize;
                Value::Binary(Bytes::copy_from_slice(self.take(len, "vbin8")?))
            }
            format::VBIN32 => {
                let len = self.read_len("vbin32 length")?;
                Value::Binary(Bytes::copy_from_slice(self.take(len, "vbin32")?))
            }
            format::STR8 => {
                let len = self.read_u8("str8 length")? as usize;
                Value::String(self.read_utf8(len, "string")?)
            }
            format::STR32 => {
                let len = self.read_len("str32 length")?;
                Value::String(self.read_utf8(len, "string")?)
            }
            format::SYM8 => {
                let len = self.read_u8("sym8 length")? as usize;
                Value::Symbol(self.read_utf8(len, "symbol")?)
            }
            format::SYM32 => {
                let len = self.read_len("sym32 length")?;
                Value::Symbol(self.read_utf8(len, "symbol")?)
            }
            format::LIST_0 => Value::List(Vec::new()),
            format::LIST_8 => {
                let (size, count) = self.read_compound_header8("list8")?;
                Value::List(self.parse_items("list8", size, count, 1)?)
            }
            format::LIST_32 => {
                let (size, count) = self.read_compound_header32("list32")?;
                Value::List(self.parse_items("list32", size, count, 4)?)
            }
            format::MAP_8 => {
                let (size, count) = self.read_compound_header8("map8")?;
                Value::Map(pair_up(self.parse_items("map8", size, count, 1)?)?)
            }
            format::MAP_32 => {
                let (size, count) = self.read_compound_header32("map32")?;
                Value::Map(pair_up(self.parse_items("map32", size, count, 4)?)?)
            }
            format::ARRAY_8 => {
                let (size, count) = self.read_compound_header8("array8")?;
                Value::Array(self.parse_array_items("array8", size, count, 1)?)
            }
            format::ARRAY_32 => {
                let (size, count) = self.read_compound_header32("array32")?;
                Value::Array(self.parse_array_items("array32", size, count, 4)?)
            }
            other => {
                return Err(CodecError::InvalidFormatCode {
                    code: other,
                    offset: self.pos.saturating_sub(1),
                })
            }
        };
        Ok(value)
    }

    fn take(&mut self, len: usize, context: &str) -> CodecResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(CodecError::truncated(len, self.remaining(), context));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self, context: &str) -> CodecResult<u8> {
        Ok(self.take(1, context)?[0])
    }

    fn read_array<const N: usize>(&mut self, context: &str) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, context)?);
        Ok(out)
    }

    fn read_len(&mut self, context: &str) -> CodecResult<usize> {
        Ok(u32::from_be_bytes(self.read_array(context)?) as usize)
    }

    fn read_utf8(&mut self, len: usize, kind: &'static str) -> CodecResult<String> {
        let offset = self.pos;
        let raw = self.take(len, kind)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { kind, offset })
    }

    /// Returns (bytes following the size field, element count)
    fn read_compound_header8(&mut self, kind: &str) -> CodecResult<(usize, usize)> {
        let size = self.read_u8(kind)? as usize;
        let count = self.read_u8(kind)? as usize;
        Ok((size, count))
    }

    fn read_compound_header32(&mut self, kind: &str) -> CodecResult<(usize, usize)> {
        let size = self.read_len(kind)?;
        let count = self.read_len(kind)?;
        Ok((size, count))
    }

    fn check_bounds(&self, kind: &'static str, size: usize, count: usize, width: usize) -> CodecResult<usize> {
        if size < width {
            return Err(CodecError::SizeMismatch {
                kind,
                declared: size,
                consumed: width,
            });
        }
        let body = size - width;
        if body > self.remaining() {
            return Err(CodecError::truncated(body, self.remaining(), kind));
        }
        // Every element needs at least one byte
        if count > body {
            return Err(CodecError::SizeMismatch {
                kind,
                declared: body,
                consumed: count,
            });
        }
        Ok(body)
    }

    fn parse_items(
        &mut self,
        kind: &'static str,
        size: usize,
        count: usize,
        width: usize,
    ) -> CodecResult<Vec<Value>> {
        let body = self.check_bounds(kind, size, count, width)?;
        let start = self.pos;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.parse_value()?);
        }
        let consumed = self.pos - start;
        if consumed != body {
            return Err(CodecError::SizeMismatch {
                kind,
                declared: body,
                consumed,
            });
        }
        Ok(items)
    }

    fn parse_array_items(
        &mut self,
        kind: &'static str,
        size: usize,
        count: usize,
        width: usize,
    ) -> CodecResult<Vec<Value>> {
        let body = self.check_bounds(kind, size, 0, width)?;
        let start = self.pos;

        let mut descriptor = None;
        let mut constructor = self.read_u8("array constructor")?;
        if constructor == format::DESCRIBED {
            descriptor = Some(self.parse_value()?);
            constructor = self.read_u8("array element constructor")?;
        }
        if count > body {
            return Err(CodecError::SizeMismatch {
                kind,
                declared: body,
                consumed: count,
            });
        }

        let mut items = Vec::with_capacity(count.min(self.remaining().max(1)));
        for _ in 0..count {
            let element = self.parse_with_constructor(constructor)?;
            items.push(match &descriptor {
                Some(d) => Value::Described(Box::new(d.clone()), Box::new(element)),
                None => element,
            });
        }
        let consumed = self.pos - start;
        if consumed != body {
            return Err(CodecError::SizeMismatch {
                kind,
                declared: body,
                consumed,
            });
        }
        Ok(items)
    }
}

fn pair_up(items: Vec<Value>) -> CodecResult<Vec<(Value, Value)>> {
    if items.len() % 2 != 0 {
        return Err(CodecError::SizeMismatch {
            kind: "map",
            declared: items.len(),
            consumed: items.len() - 1,
        });
    }
    let mut entries = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        entries.push((key, value));
    }
    Ok(entries)
}

/// Decode exactly one value from `data`, returning it with the bytes consumed
pub fn decode_value(data: &[u8]) -> CodecResult<(Value, usize)> {
    let mut parser = ValueParser::new(data);
    let value = parser.parse_value()?;
    Ok((value, parser.position()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn round_trip(value: &Value) -> Value {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        let (decoded, used) = decode_value(&buf).unwrap();
        assert_eq!(used, buf.len());
        decoded
    }

    #[test]
    fn test_parse_nested_described_map() {
        let filter = Value::Map(vec![(
            Value::symbol("apache.org:selector-filter:string"),
            Value::described_symbol(
                "apache.org:selector-filter:string",
                Value::string("amqp.annotation.x-opt-enqueuedtimeutc > 1000"),
            ),
        )]);
        assert_eq!(round_trip(&filter), filter);
    }

    #[test]
    fn test_parse_array_of_symbols() {
        let array = Value::Array(vec![Value::symbol("PLAIN"), Value::symbol("EXTERNAL")]);
        assert_eq!(round_trip(&array), array);
    }

    #[test]
    fn test_truncated_string_is_rejected() {
        let err = decode_value(&[0xa1, 0x05, b'a', b'b']).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { need: 5, got: 2, .. }));
    }

    #[test]
    fn test_invalid_format_code() {
        let err = decode_value(&[0x3f]).unwrap_err();
        assert_eq!(err, CodecError::InvalidFormatCode { code: 0x3f, offset: 0 });
    }

    #[test]
    fn test_list_size_mismatch_detected() {
        // list8 declaring 4 bytes but holding one 1-byte element
        let err = decode_value(&[0xc0, 0x04, 0x01, 0x40, 0x40, 0x40]).unwrap_err();
        assert!(matches!(err, CodecError::SizeMismatch { kind: "list8", .. }));
    }

    #[test]
    fn test_hostile_count_does_not_allocate() {
        // list32 claiming a billion elements in an 8-byte body
        let mut data = vec![0xd0];
        data.extend_from_slice(&12u32.to_be_bytes());
        data.extend_from_slice(&1_000_000_000u32.to_be_bytes());
        data.extend_from_slice(&[0x40; 8]);
        assert!(matches!(
            decode_value(&data).unwrap_err(),
            CodecError::SizeMismatch { .. }
        ));
    }

    #[test]
    fn test_signed_small_encodings() {
        assert_eq!(decode_value(&[0x54, 0xff]).unwrap().0, Value::Int(-1));
        assert_eq!(decode_value(&[0x55, 0x80]).unwrap().0, Value::Long(-128));
        assert_eq!(round_trip(&Value::Long(-5_000_000_000)), Value::Long(-5_000_000_000));
    }

    #[test]
    fn test_invalid_utf8_symbol() {
        let err = decode_value(&[0xa3, 0x02, 0xff, 0xfe]).unwrap_err();
        assert_eq!(err, CodecError::InvalidUtf8 { kind: "symbol", offset: 2 });
    }
}
