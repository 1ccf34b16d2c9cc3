//! Protocol Buffers wire format primitives.

mod raw_reader;
mod raw_writer;

use crate::error::{ProtoStreamError, Result};

pub use raw_reader::RawProtoStreamReader;
pub use raw_writer::RawProtoStreamWriter;

/// Number of low bits of a tag holding the wire type.
pub const TAG_TYPE_BITS: u32 = 3;

/// Largest field number allowed by the wire format.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Maximum encoded length of a varint.
pub const MAX_VARINT_LEN: usize = 10;

/// The 3-bit encoding category embedded in every field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// int32, int64, uint32, uint64, sint32, sint64, bool, enum.
    Varint = 0,
    /// fixed64, sfixed64, double.
    Fixed64 = 1,
    /// string, bytes, embedded messages, packed repeated fields.
    LengthDelimited = 2,
    /// Group start marker.
    StartGroup = 3,
    /// Group end marker.
    EndGroup = 4,
    /// fixed32, sfixed32, float.
    Fixed32 = 5,
}

impl WireType {
    /// Creates a wire type from its 3-bit wire representation.
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            3 => Ok(Self::StartGroup),
            4 => Ok(Self::EndGroup),
            5 => Ok(Self::Fixed32),
            _ => Err(ProtoStreamError::malformed(format!(
                "unsupported wire type: {}",
                id
            ))),
        }
    }

    /// Returns the wire representation of this wire type.
    pub fn id(&self) -> u32 {
        *self as u32
    }
}

/// Combines a field number and a wire type into a tag.
pub fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    (field_number << TAG_TYPE_BITS) | wire_type.id()
}

/// Extracts the field number from a tag.
pub fn tag_field_number(tag: u32) -> u32 {
    tag >> TAG_TYPE_BITS
}

/// Extracts the wire type from a tag.
pub fn tag_wire_type(tag: u32) -> Result<WireType> {
    WireType::from_id(tag & ((1 << TAG_TYPE_BITS) - 1))
}

/// Zig-zag encodes a 32-bit signed integer.
pub fn encode_zig_zag_32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Zig-zag encodes a 64-bit signed integer.
pub fn encode_zig_zag_64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Decodes a zig-zag encoded 32-bit value.
pub fn decode_zig_zag_32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Decodes a zig-zag encoded 64-bit value.
pub fn decode_zig_zag_64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Returns the number of bytes needed to encode `value` as a varint.
pub fn varint_size(mut value: u64) -> usize {
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}
