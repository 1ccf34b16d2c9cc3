//! Low-level Protocol Buffers output.

use bytes::{BufMut, Bytes, BytesMut};

use super::{encode_zig_zag_32, encode_zig_zag_64, make_tag, WireType};

/// A buffer-based writer of raw wire format values.
///
/// Field-level methods emit the tag followed by the encoded value; the
/// `*_no_tag` methods emit only the value. Writing into a `BytesMut` cannot
/// fail, so none of these methods return a `Result`.
#[derive(Debug, Default)]
pub struct RawProtoStreamWriter {
    buffer: BytesMut,
}

impl RawProtoStreamWriter {
    /// Creates a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer and returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Consumes the writer and returns the written bytes without copying.
    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the buffer, removing all written data.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Writes a tag for the given field number and wire type.
    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) {
        self.write_uint32_no_tag(make_tag(field_number, wire_type));
    }

    /// Writes a 32-bit unsigned varint.
    pub fn write_uint32_no_tag(&mut self, value: u32) {
        self.write_uint64_no_tag(u64::from(value));
    }

    /// Writes a 64-bit unsigned varint.
    pub fn write_uint64_no_tag(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buffer.put_u8((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buffer.put_u8(value as u8);
    }

    /// Writes a signed 32-bit varint; negative values take ten bytes.
    pub fn write_int32_no_tag(&mut self, value: i32) {
        self.write_uint64_no_tag(i64::from(value) as u64);
    }

    /// Writes four little-endian bytes.
    pub fn write_fixed32_no_tag(&mut self, value: u32) {
        self.buffer.put_u32_le(value);
    }

    /// Writes eight little-endian bytes.
    pub fn write_fixed64_no_tag(&mut self, value: u64) {
        self.buffer.put_u64_le(value);
    }

    /// Writes raw bytes without a tag or length prefix.
    pub fn write_raw_bytes(&mut self, value: &[u8]) {
        self.buffer.put_slice(value);
    }

    /// Writes an `int32` field.
    pub fn write_int32(&mut self, field_number: u32, value: i32) {
        self.write_tag(field_number, WireType::Varint);
        self.write_int32_no_tag(value);
    }

    /// Writes an `int64` field.
    pub fn write_int64(&mut self, field_number: u32, value: i64) {
        self.write_tag(field_number, WireType::Varint);
        self.write_uint64_no_tag(value as u64);
    }

    /// Writes a `uint32` field.
    pub fn write_uint32(&mut self, field_number: u32, value: u32) {
        self.write_tag(field_number, WireType::Varint);
        self.write_uint32_no_tag(value);
    }

    /// Writes a `uint64` field.
    pub fn write_uint64(&mut self, field_number: u32, value: u64) {
        self.write_tag(field_number, WireType::Varint);
        self.write_uint64_no_tag(value);
    }

    /// Writes a zig-zag encoded `sint32` field.
    pub fn write_sint32(&mut self, field_number: u32, value: i32) {
        self.write_tag(field_number, WireType::Varint);
        self.write_uint32_no_tag(encode_zig_zag_32(value));
    }

    /// Writes a zig-zag encoded `sint64` field.
    pub fn write_sint64(&mut self, field_number: u32, value: i64) {
        self.write_tag(field_number, WireType::Varint);
        self.write_uint64_no_tag(encode_zig_zag_64(value));
    }

    /// Writes a `fixed32` field.
    pub fn write_fixed32(&mut self, field_number: u32, value: u32) {
        self.write_tag(field_number, WireType::Fixed32);
        self.write_fixed32_no_tag(value);
    }

    /// Writes a `fixed64` field.
    pub fn write_fixed64(&mut self, field_number: u32, value: u64) {
        self.write_tag(field_number, WireType::Fixed64);
        self.write_fixed64_no_tag(value);
    }

    /// Writes an `sfixed32` field.
    pub fn write_sfixed32(&mut self, field_number: u32, value: i32) {
        self.write_fixed32(field_number, value as u32);
    }

    /// Writes an `sfixed64` field.
    pub fn write_sfixed64(&mut self, field_number: u32, value: i64) {
        self.write_fixed64(field_number, value as u64);
    }

    /// Writes a `float` field.
    pub fn write_float(&mut self, field_number: u32, value: f32) {
        self.write_fixed32(field_number, value.to_bits());
    }

    /// Writes a `double` field.
    pub fn write_double(&mut self, field_number: u32, value: f64) {
        self.write_fixed64(field_number, value.to_bits());
    }

    /// Writes a `bool` field.
    pub fn write_bool(&mut self, field_number: u32, value: bool) {
        self.write_tag(field_number, WireType::Varint);
        self.buffer.put_u8(u8::from(value));
    }

    /// Writes an enum field by its number.
    pub fn write_enum(&mut self, field_number: u32, value: i32) {
        self.write_int32(field_number, value);
    }

    /// Writes a length-delimited UTF-8 string field.
    pub fn write_string(&mut self, field_number: u32, value: &str) {
        self.write_bytes(field_number, value.as_bytes());
    }

    /// Writes a length-delimited bytes field.
    pub fn write_bytes(&mut self, field_number: u32, value: &[u8]) {
        self.write_tag(field_number, WireType::LengthDelimited);
        self.write_uint32_no_tag(value.len() as u32);
        self.write_raw_bytes(value);
    }
}
