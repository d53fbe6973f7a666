//! Order-preserving tuple codec.
//!
//! Encodes tuples of primitives (byte strings, text, and fixed-width
//! integers) into byte strings whose lexicographic order equals the
//! natural order of the tuples:
//!
//! (x1, x2, ..., xn) < (y1, y2, ..., yn) iff
//! encode(x1, ..., xn) < encode(y1, ..., yn) under unsigned bytewise
//! comparison.
//!
//! Byte strings and text are terminated with a single zero byte, so they
//! may not contain embedded zeros. Unsigned integers are encoded fixed
//! width big endian; little endian does not sort bytewise. Two's
//! complement does not sort either, so signed integers have their sign
//! bit flipped, which moves the negative range below zero in unsigned
//! space while preserving order.
//!
//! Floating point is not supported: its default representation does not
//! sort for negative values, and keys built from floats are rejected
//! with [`Error::UnsupportedType`].

use std::fmt;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::errdata;
use crate::error::{Error, Result};

/// A primitive value to encode into a key or value tuple.
#[derive(Clone, Copy, Debug)]
pub enum Field<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    /// Present so callers can name the full primitive universe; always
    /// rejected with [`Error::UnsupportedType`].
    F64(f64),
}

/// An out-slot for decoding: names the expected primitive kind and
/// receives the decoded value.
#[derive(Debug)]
pub enum Slot<'a> {
    Bytes(&'a mut Vec<u8>),
    Text(&'a mut String),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    /// Always rejected with [`Error::UnsupportedType`].
    F64(&'a mut f64),
}

/// Appends the encoded fields to buf.
pub fn write(buf: &mut Vec<u8>, fields: &[Field]) -> Result<()> {
    for field in fields {
        match *field {
            Field::Bytes(b) => write_terminated(buf, b)?,
            Field::Text(s) => write_terminated(buf, s.as_bytes())?,
            Field::U8(v) => buf.write_u8(v)?,
            Field::U16(v) => buf.write_u16::<BigEndian>(v)?,
            Field::U32(v) => buf.write_u32::<BigEndian>(v)?,
            Field::U64(v) => buf.write_u64::<BigEndian>(v)?,
            Field::I8(v) => buf.write_u8(v as u8 ^ 1 << 7)?,
            Field::I16(v) => buf.write_u16::<BigEndian>(v as u16 ^ 1 << 15)?,
            Field::I32(v) => buf.write_u32::<BigEndian>(v as u32 ^ 1 << 31)?,
            Field::I64(v) => buf.write_u64::<BigEndian>(v as u64 ^ 1 << 63)?,
            Field::F64(_) => return Err(Error::UnsupportedType("f64".to_string())),
        }
    }
    Ok(())
}

/// Encodes the fields and returns the byte string.
pub fn encode(fields: &[Field]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write(&mut buf, fields)?;
    Ok(buf)
}

/// Decodes the leading fields of buf into the given out-slots and
/// returns the remainder after the consumed portion.
pub fn decode<'a>(buf: &'a [u8], slots: &mut [Slot]) -> Result<&'a [u8]> {
    let mut rest = buf;
    for slot in slots {
        match slot {
            Slot::Bytes(out) => {
                let (payload, tail) = take_terminated(rest)?;
                **out = payload.to_vec();
                rest = tail;
            }
            Slot::Text(out) => {
                let (payload, tail) = take_terminated(rest)?;
                **out = String::from_utf8(payload.to_vec())
                    .map_err(|_| errdata!("text component is not valid utf-8"))?;
                rest = tail;
            }
            Slot::U8(out) => **out = rest.read_u8().map_err(short_key)?,
            Slot::U16(out) => **out = rest.read_u16::<BigEndian>().map_err(short_key)?,
            Slot::U32(out) => **out = rest.read_u32::<BigEndian>().map_err(short_key)?,
            Slot::U64(out) => **out = rest.read_u64::<BigEndian>().map_err(short_key)?,
            Slot::I8(out) => **out = (rest.read_u8().map_err(short_key)? ^ 1 << 7) as i8,
            Slot::I16(out) => {
                **out = (rest.read_u16::<BigEndian>().map_err(short_key)? ^ 1 << 15) as i16
            }
            Slot::I32(out) => {
                **out = (rest.read_u32::<BigEndian>().map_err(short_key)? ^ 1 << 31) as i32
            }
            Slot::I64(out) => {
                **out = (rest.read_u64::<BigEndian>().map_err(short_key)? ^ 1 << 63) as i64
            }
            Slot::F64(_) => return Err(Error::UnsupportedType("f64".to_string())),
        }
    }
    Ok(rest)
}

/// Like [`decode`], but also returns the byte span consumed by the
/// slots. Groupers use the consumed span as a group's key prefix.
pub fn split<'a>(buf: &'a [u8], slots: &mut [Slot]) -> Result<(&'a [u8], &'a [u8])> {
    let rest = decode(buf, slots)?;
    let consumed = buf.len() - rest.len();
    Ok((&buf[..consumed], rest))
}

/// Joins already-encoded keys in the provided order. Concatenation of
/// encodings is itself an encoding, so composite keys are built by
/// encoding parts independently and joining them.
pub fn join(keys: &[&[u8]]) -> Vec<u8> {
    keys.concat()
}

fn write_terminated(buf: &mut Vec<u8>, payload: &[u8]) -> Result<()> {
    if payload.contains(&0) {
        return Err(Error::EmbeddedNul);
    }
    buf.extend_from_slice(payload);
    buf.push(0);
    Ok(())
}

fn take_terminated(buf: &[u8]) -> Result<(&[u8], &[u8])> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| errdata!("byte string component is missing its terminator"))?;
    Ok((&buf[..end], &buf[end + 1..]))
}

fn short_key(_: std::io::Error) -> Error {
    errdata!("key ends before all components were decoded")
}

/// A primitive kind, used where the set of expected components is
/// declared up front (CSV columns, group prefixes) rather than bound to
/// out-slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Bytes,
    Text,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    /// Always rejected with [`Error::UnsupportedType`].
    F64,
}

/// An owned decoded primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    Text(String),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
}

impl Kind {
    /// Decodes one value of this kind from the front of buf, returning
    /// the value and the remainder.
    pub fn read_value(self, buf: &[u8]) -> Result<(Value, &[u8])> {
        let mut value = match self {
            Kind::Bytes => Value::Bytes(Vec::new()),
            Kind::Text => Value::Text(String::new()),
            Kind::U8 => Value::U8(0),
            Kind::U16 => Value::U16(0),
            Kind::U32 => Value::U32(0),
            Kind::U64 => Value::U64(0),
            Kind::I8 => Value::I8(0),
            Kind::I16 => Value::I16(0),
            Kind::I32 => Value::I32(0),
            Kind::I64 => Value::I64(0),
            Kind::F64 => return Err(Error::UnsupportedType("f64".to_string())),
        };
        let rest = {
            let slot = match &mut value {
                Value::Bytes(out) => Slot::Bytes(out),
                Value::Text(out) => Slot::Text(out),
                Value::U8(out) => Slot::U8(out),
                Value::U16(out) => Slot::U16(out),
                Value::U32(out) => Slot::U32(out),
                Value::U64(out) => Slot::U64(out),
                Value::I8(out) => Slot::I8(out),
                Value::I16(out) => Slot::I16(out),
                Value::I32(out) => Slot::I32(out),
                Value::I64(out) => Slot::I64(out),
            };
            decode(buf, &mut [slot])?
        };
        Ok((value, rest))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::Text(s) => write!(f, "{s}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
        }
    }
}
