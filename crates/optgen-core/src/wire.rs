//! Low-level protobuf wire format reading and framing.
//!
//! Option values attached to a message definition are sometimes only
//! available as raw, unrecognized wire bytes. This module walks such buffers
//! field by field, and provides the few encoding helpers needed to re-frame
//! length-delimited records (descriptor sets, option payloads).
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: SGROUP/EGROUP (deprecated groups)
//! - 5: I32 (fixed32, sfixed32, float)

use crate::error::{Error, Result};

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::invalid_wire_format(
                0,
                format!("unknown wire type: {}", value),
            )),
        }
    }
}

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_VALID_NUMBER: u32 = 536_870_911;

/// Groups nested deeper than this are rejected
const MAX_GROUP_DEPTH: usize = 100;

/// A single field read from a wire-format buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    /// Field number from the tag
    pub number: u32,
    /// Wire type from the tag
    pub wire_type: WireType,
    /// Value bytes; for LEN fields the payload without its length prefix
    pub payload: &'a [u8],
    /// Total bytes consumed, tag included
    pub len: usize,
}

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= 10 {
            // Varints are at most 10 bytes for a 64-bit value
            return Err(Error::varint_decode(i));
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::varint_decode(data.len()))
}

/// Decode a field tag, returning field number, wire type and tag length.
fn decode_tag(data: &[u8]) -> Result<(u32, WireType, usize)> {
    let (tag, tag_len) = decode_varint(data)
        .map_err(|_| Error::invalid_wire_format(0, "failed to decode field tag"))?;

    let wire_type = WireType::try_from((tag & 0x07) as u8)?;
    let number = tag >> 3;

    if number == 0 || number > MAX_VALID_NUMBER as u64 {
        return Err(Error::invalid_wire_format(
            0,
            format!("invalid field number {}: must be between 1 and {}", number, MAX_VALID_NUMBER),
        ));
    }

    Ok((number as u32, wire_type, tag_len))
}

/// Read a single protobuf field from the start of `data`.
pub fn read_field(data: &[u8]) -> Result<RawField<'_>> {
    read_field_at_depth(data, 0)
}

fn read_field_at_depth(data: &[u8], depth: usize) -> Result<RawField<'_>> {
    if data.is_empty() {
        return Err(Error::invalid_wire_format(0, "empty data"));
    }

    let (number, wire_type, tag_len) = decode_tag(data)?;
    let rest = &data[tag_len..];

    let (payload, value_len) = match wire_type {
        WireType::Varint => {
            let (_, varint_len) = decode_varint(rest)
                .map_err(|_| Error::invalid_wire_format(tag_len, "failed to decode varint value"))?;
            (&rest[..varint_len], varint_len)
        }
        WireType::I64 => {
            if rest.len() < 8 {
                return Err(Error::invalid_wire_format(tag_len, "not enough bytes for I64"));
            }
            (&rest[..8], 8)
        }
        WireType::I32 => {
            if rest.len() < 4 {
                return Err(Error::invalid_wire_format(tag_len, "not enough bytes for I32"));
            }
            (&rest[..4], 4)
        }
        WireType::Len => {
            let (length, prefix_len) = decode_varint(rest).map_err(|_| {
                Error::invalid_wire_format(tag_len, "failed to decode length prefix")
            })?;
            let available = rest.len() - prefix_len;
            if length > available as u64 {
                return Err(Error::invalid_wire_format(
                    tag_len,
                    format!(
                        "not enough bytes for LEN field (need {}, have {})",
                        length, available
                    ),
                ));
            }
            let length = length as usize;
            (&rest[prefix_len..prefix_len + length], prefix_len + length)
        }
        WireType::StartGroup => {
            if depth >= MAX_GROUP_DEPTH {
                return Err(Error::invalid_wire_format(tag_len, "groups nested too deeply"));
            }
            let body_len = group_body_len(rest, number, depth + 1)
                .map_err(|_| Error::invalid_wire_format(tag_len, "unterminated group"))?;
            (&rest[..body_len], body_len)
        }
        WireType::EndGroup => {
            return Err(Error::invalid_wire_format(0, "unexpected end group"));
        }
    };

    Ok(RawField {
        number,
        wire_type,
        payload,
        len: tag_len + value_len,
    })
}

/// Length of a group body up to and including its matching end-group tag.
fn group_body_len(data: &[u8], number: u32, depth: usize) -> Result<usize> {
    let mut position = 0;
    while position < data.len() {
        let (inner, inner_type, tag_len) = decode_tag(&data[position..])?;
        if inner_type == WireType::EndGroup {
            if inner != number {
                return Err(Error::invalid_wire_format(position, "mismatched end group"));
            }
            return Ok(position + tag_len);
        }
        position += read_field_at_depth(&data[position..], depth)?.len;
    }
    Err(Error::invalid_wire_format(position, "missing end group"))
}

/// Iterator over the fields of a wire-format buffer.
///
/// Yields an error once and then stops if the buffer is malformed.
#[derive(Debug, Clone)]
pub struct FieldIter<'a> {
    data: &'a [u8],
    position: usize,
    failed: bool,
}

impl<'a> FieldIter<'a> {
    /// Creates an iterator over `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            failed: false,
        }
    }

    /// Byte offset of the next field
    pub fn position(&self) -> usize {
        self.position
    }
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = Result<RawField<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.data.len() {
            return None;
        }
        match read_field(&self.data[self.position..]) {
            Ok(field) => {
                self.position += field.len;
                Some(Ok(field))
            }
            Err(Error::InvalidWireFormat { offset, details }) => {
                self.failed = true;
                Some(Err(Error::invalid_wire_format(self.position + offset, details)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Append a varint to `buf`.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Append a field tag to `buf`.
pub fn encode_key(number: u32, wire_type: WireType, buf: &mut Vec<u8>) {
    encode_varint(((number as u64) << 3) | wire_type as u64, buf);
}

/// Append a length-delimited field to `buf`.
pub fn put_len_field(number: u32, payload: &[u8], buf: &mut Vec<u8>) {
    encode_key(number, WireType::Len, buf);
    encode_varint(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}
