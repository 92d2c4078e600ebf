//! # AMQP Value - Type System and Encoder
//!
//! ## Purpose
//!
//! In-memory representation of every AMQP 1.0 primitive and composite value,
//! plus the encoder that writes them in their most compact legal encoding
//! (`uint0`/`smalluint`/`uint`, `str8`/`str32`, `list0`/`list8`/`list32`, ...).
//!
//! Described values carry their descriptor as a plain [`Value`] (an `ulong`
//! code or a `symbol`), which keeps performative and section decoding a simple
//! pattern match.

use crate::constants::format;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Any AMQP 1.0 value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Ubyte(u8),
    Ushort(u16),
    Uint(u32),
    Ulong(u64),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
    Uuid([u8; 16]),
    Binary(Bytes),
    String(String),
    Symbol(String),
    List(Vec<Value>),
    /// Map entries in wire order
    Map(Vec<(Value, Value)>),
    Array(Vec<Value>),
    Described(Box<Value>, Box<Value>),
}

impl Value {
    /// Build a described value with a numeric descriptor
    pub fn described(code: u64, value: Value) -> Self {
        Value::Described(Box::new(Value::Ulong(code)), Box::new(value))
    }

    /// Build a described value with a symbolic descriptor
    pub fn described_symbol(name: impl Into<String>, value: Value) -> Self {
        Value::Described(Box::new(Value::Symbol(name.into())), Box::new(value))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Value::Symbol(name.into())
    }

    pub fn string(text: impl Into<String>) -> Self {
        Value::String(text.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// AMQP type name, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Ubyte(_) => "ubyte",
            Value::Ushort(_) => "ushort",
            Value::Uint(_) => "uint",
            Value::Ulong(_) => "ulong",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Binary(_) => "binary",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Array(_) => "array",
            Value::Described(..) => "described",
        }
    }

    /// Text content of a string or symbol
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric descriptor code, if this is a described value with one
    pub fn descriptor_code(&self) -> Option<u64> {
        match self {
            Value::Described(descriptor, _) => match descriptor.as_ref() {
                Value::Ulong(code) => Some(*code),
                _ => None,
            },
            _ => None,
        }
    }

    /// Encode this value into `buf` using the most compact legal constructor
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Value::Null => buf.put_u8(format::NULL),
            Value::Bool(true) => buf.put_u8(format::BOOLEAN_TRUE),
            Value::Bool(false) => buf.put_u8(format::BOOLEAN_FALSE),
            Value::Ubyte(v) => {
                buf.put_u8(format::UBYTE);
                buf.put_u8(*v);
            }
            Value::Ushort(v) => {
                buf.put_u8(format::USHORT);
                buf.put_u16(*v);
            }
            Value::Uint(0) => buf.put_u8(format::UINT_0),
            Value::Uint(v) if *v <= u8::MAX as u32 => {
                buf.put_u8(format::SMALL_UINT);
                buf.put_u8(*v as u8);
            }
            Value::Uint(v) => {
                buf.put_u8(format::UINT);
                buf.put_u32(*v);
            }
            Value::Ulong(0) => buf.put_u8(format::ULONG_0),
            Value::Ulong(v) if *v <= u8::MAX as u64 => {
                buf.put_u8(format::SMALL_ULONG);
                buf.put_u8(*v as u8);
            }
            Value::Ulong(v) => {
                buf.put_u8(format::ULONG);
                buf.put_u64(*v);
            }
            Value::Byte(v) => {
                buf.put_u8(format::BYTE);
                buf.put_i8(*v);
            }
            Value::Short(v) => {
                buf.put_u8(format::SHORT);
                buf.put_i16(*v);
            }
            Value::Int(v) if i8::try_from(*v).is_ok() => {
                buf.put_u8(format::SMALL_INT);
                buf.put_i8(*v as i8);
            }
            Value::Int(v) => {
                buf.put_u8(format::INT);
                buf.put_i32(*v);
            }
            Value::Long(v) if i8::try_from(*v).is_ok() => {
                buf.put_u8(format::SMALL_LONG);
                buf.put_i8(*v as i8);
            }
            Value::Long(v) => {
                buf.put_u8(format::LONG);
                buf.put_i64(*v);
            }
            Value::Described(descriptor, value) => {
                buf.put_u8(format::DESCRIBED);
                descriptor.encode(buf);
                value.encode(buf);
            }
            Value::List(items) if items.is_empty() => buf.put_u8(format::LIST_0),
            Value::List(items) => encode_compound(buf, format::LIST_8, format::LIST_32, items.len(), |body| {
                for item in items {
                    item.encode(body);
                }
            }),
            Value::Map(entries) => {
                encode_compound(buf, format::MAP_8, format::MAP_32, entries.len() * 2, |body| {
                    for (key, value) in entries {
                        key.encode(body);
                        value.encode(body);
                    }
                })
            }
            Value::Array(items) => encode_array(buf, items),
            other => {
                // Remaining types only have a single (or a wide-only) encoding
                let short = variable_len(other) <= u8::MAX as usize;
                buf.put_u8(wide_constructor(other, short));
                encode_payload(other, buf, short);
            }
        }
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Ubyte(v) => write!(f, "{v}"),
            Value::Ushort(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Ulong(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::Uuid(v) => {
                for (i, byte) in v.iter().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        write!(f, "-")?;
                    }
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Value::String(v) | Value::Symbol(v) => write!(f, "{v}"),
            Value::List(items) | Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Described(descriptor, value) => write!(f, "{descriptor}({value})"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Uint(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Write a list or map: 8-bit size/count when both fit, 32-bit otherwise
fn encode_compound(
    buf: &mut BytesMut,
    small_code: u8,
    large_code: u8,
    count: usize,
    write_body: impl FnOnce(&mut BytesMut),
) {
    let mut body = BytesMut::new();
    write_body(&mut body);

    if body.len() + 1 <= u8::MAX as usize && count <= u8::MAX as usize {
        buf.put_u8(small_code);
        buf.put_u8((body.len() + 1) as u8);
        buf.put_u8(count as u8);
    } else {
        buf.put_u8(large_code);
        buf.put_u32((body.len() + 4) as u32);
        buf.put_u32(count as u32);
    }
    buf.put_slice(&body);
}

/// Arrays share one constructor across all elements; the first element decides
/// the type and the longest element decides the length width.
/// Described element arrays are not produced by this crate.
fn encode_array(buf: &mut BytesMut, items: &[Value]) {
    let short = items.iter().all(|item| variable_len(item) <= u8::MAX as usize);
    let constructor = items
        .first()
        .map(|first| wide_constructor(first, short))
        .unwrap_or(format::NULL);

    let mut body = BytesMut::new();
    body.put_u8(constructor);
    for item in items {
        encode_payload(item, &mut body, short);
    }

    if body.len() + 1 <= u8::MAX as usize && items.len() <= u8::MAX as usize {
        buf.put_u8(format::ARRAY_8);
        buf.put_u8((body.len() + 1) as u8);
        buf.put_u8(items.len() as u8);
    } else {
        buf.put_u8(format::ARRAY_32);
        buf.put_u32((body.len() + 4) as u32);
        buf.put_u32(items.len() as u32);
    }
    buf.put_slice(&body);
}

/// Byte length of a binary, string or symbol payload; zero for everything else
fn variable_len(value: &Value) -> usize {
    match value {
        Value::Binary(v) => v.len(),
        Value::String(v) | Value::Symbol(v) => v.len(),
        _ => 0,
    }
}

/// Fixed-width constructor for a value, used for array elements and for
/// types that have only one encoding. `short` selects the 8-bit length form
/// of binary, string and symbol.
fn wide_constructor(value: &Value, short: bool) -> u8 {
    match value {
        Value::Null | Value::Described(..) => format::NULL,
        Value::Bool(_) => format::BOOLEAN,
        Value::Ubyte(_) => format::UBYTE,
        Value::Ushort(_) => format::USHORT,
        Value::Uint(_) => format::UINT,
        Value::Ulong(_) => format::ULONG,
        Value::Byte(_) => format::BYTE,
        Value::Short(_) => format::SHORT,
        Value::Int(_) => format::INT,
        Value::Long(_) => format::LONG,
        Value::Float(_) => format::FLOAT,
        Value::Double(_) => format::DOUBLE,
        Value::Char(_) => format::CHAR,
        Value::Timestamp(_) => format::TIMESTAMP,
        Value::Uuid(_) => format::UUID,
        Value::Binary(_) if short => format::VBIN8,
        Value::Binary(_) => format::VBIN32,
        Value::String(_) if short => format::STR8,
        Value::String(_) => format::STR32,
        Value::Symbol(_) if short => format::SYM8,
        Value::Symbol(_) => format::SYM32,
        Value::List(_) => format::LIST_32,
        Value::Map(_) => format::MAP_32,
        Value::Array(_) => format::ARRAY_32,
    }
}

/// Write the payload that follows `wide_constructor(value, short)`.
/// Compound payloads always use their 32-bit form.
fn encode_payload(value: &Value, buf: &mut BytesMut, short: bool) {
    match value {
        Value::Null | Value::Described(..) => {}
        Value::Bool(v) => buf.put_u8(u8::from(*v)),
        Value::Ubyte(v) => buf.put_u8(*v),
        Value::Ushort(v) => buf.put_u16(*v),
        Value::Uint(v) => buf.put_u32(*v),
        Value::Ulong(v) => buf.put_u64(*v),
        Value::Byte(v) => buf.put_i8(*v),
        Value::Short(v) => buf.put_i16(*v),
        Value::Int(v) => buf.put_i32(*v),
        Value::Long(v) => buf.put_i64(*v),
        Value::Float(v) => buf.put_f32(*v),
        Value::Double(v) => buf.put_f64(*v),
        Value::Char(v) => buf.put_u32(*v as u32),
        Value::Timestamp(v) => buf.put_i64(*v),
        Value::Uuid(v) => buf.put_slice(v),
        Value::Binary(v) => put_variable(buf, v, short),
        Value::String(v) | Value::Symbol(v) => put_variable(buf, v.as_bytes(), short),
        Value::List(items) => {
            let mut body = BytesMut::new();
            for item in items {
                item.encode(&mut body);
            }
            buf.put_u32((body.len() + 4) as u32);
            buf.put_u32(items.len() as u32);
            buf.put_slice(&body);
        }
        Value::Map(entries) => {
            let mut body = BytesMut::new();
            for (key, value) in entries {
                key.encode(&mut body);
                value.encode(&mut body);
            }
            buf.put_u32((body.len() + 4) as u32);
            buf.put_u32((entries.len() * 2) as u32);
            buf.put_slice(&body);
        }
        Value::Array(items) => {
            let mut inner = BytesMut::new();
            encode_array(&mut inner, items);
            // Re-emit in the 32-bit form expected by ARRAY_32
            if inner[0] == format::ARRAY_8 {
                let body = &inner[3..];
                buf.put_u32((body.len() + 4) as u32);
                buf.put_u32(items.len() as u32);
                buf.put_slice(body);
            } else {
                buf.put_slice(&inner[1..]);
            }
        }
    }
}

fn put_variable(buf: &mut BytesMut, data: &[u8], short: bool) {
    if short {
        buf.put_u8(data.len() as u8);
    } else {
        buf.put_u32(data.len() as u32);
    }
    buf.put_slice(data);
}
