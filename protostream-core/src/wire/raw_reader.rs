//! Low-level Protocol Buffers input.

use std::io::Cursor;

use bytes::Buf;

use super::{
    decode_zig_zag_32, decode_zig_zag_64, tag_field_number, tag_wire_type, WireType,
    MAX_VARINT_LEN,
};
use crate::error::{ProtoStreamError, Result};

/// A bounded reader of raw wire format values.
///
/// The reader never looks past the end of the range it was created over, and
/// every read that would do so fails with
/// [`ProtoStreamError::MalformedWireData`]. Length-delimited values are
/// returned as borrowed sub-slices of the input.
#[derive(Debug)]
pub struct RawProtoStreamReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> RawProtoStreamReader<'a> {
    /// Creates a new reader over the whole byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Creates a reader over `length` bytes of `data` starting at `offset`.
    pub fn from_range(data: &'a [u8], offset: usize, length: usize) -> Result<Self> {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                ProtoStreamError::malformed(format!(
                    "range {}+{} exceeds input of {} bytes",
                    offset,
                    length,
                    data.len()
                ))
            })?;
        let mut cursor = Cursor::new(&data[..end]);
        cursor.set_position(offset as u64);
        Ok(Self { cursor })
    }

    /// Returns the number of bytes remaining to be read.
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Returns the current position in the underlying slice.
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Returns true once every byte in range has been consumed.
    pub fn is_at_end(&self) -> bool {
        !self.cursor.has_remaining()
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.cursor.remaining() < n {
            Err(ProtoStreamError::malformed(format!(
                "truncated input: need {} bytes, have {}",
                n,
                self.cursor.remaining()
            )))
        } else {
            Ok(())
        }
    }

    /// Reads the next tag, or returns 0 at the end of the input.
    pub fn read_tag(&mut self) -> Result<u32> {
        if self.is_at_end() {
            return Ok(0);
        }
        let tag = self.read_uint64()?;
        let tag = u32::try_from(tag)
            .map_err(|_| ProtoStreamError::malformed(format!("tag out of range: {}", tag)))?;
        if tag_field_number(tag) == 0 {
            return Err(ProtoStreamError::malformed(format!(
                "invalid tag {} with field number zero",
                tag
            )));
        }
        tag_wire_type(tag)?;
        Ok(tag)
    }

    /// Reads a varint of up to ten bytes.
    pub fn read_uint64(&mut self) -> Result<u64> {
        let mut result = 0u64;
        for i in 0..MAX_VARINT_LEN {
            if !self.cursor.has_remaining() {
                return Err(ProtoStreamError::malformed("truncated varint"));
            }
            let byte = self.cursor.get_u8();
            result |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(ProtoStreamError::malformed("varint longer than 10 bytes"))
    }

    /// Reads a varint and truncates it to 32 bits.
    pub fn read_uint32(&mut self) -> Result<u32> {
        Ok(self.read_uint64()? as u32)
    }

    /// Reads an `int32` value.
    pub fn read_int32(&mut self) -> Result<i32> {
        Ok(self.read_uint64()? as i32)
    }

    /// Reads an `int64` value.
    pub fn read_int64(&mut self) -> Result<i64> {
        Ok(self.read_uint64()? as i64)
    }

    /// Reads a zig-zag encoded `sint32` value.
    pub fn read_sint32(&mut self) -> Result<i32> {
        Ok(decode_zig_zag_32(self.read_uint32()?))
    }

    /// Reads a zig-zag encoded `sint64` value.
    pub fn read_sint64(&mut self) -> Result<i64> {
        Ok(decode_zig_zag_64(self.read_uint64()?))
    }

    /// Reads four little-endian bytes.
    pub fn read_fixed32(&mut self) -> Result<u32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_u32_le())
    }

    /// Reads eight little-endian bytes.
    pub fn read_fixed64(&mut self) -> Result<u64> {
        self.ensure_remaining(8)?;
        Ok(self.cursor.get_u64_le())
    }

    /// Reads an `sfixed32` value.
    pub fn read_sfixed32(&mut self) -> Result<i32> {
        Ok(self.read_fixed32()? as i32)
    }

    /// Reads an `sfixed64` value.
    pub fn read_sfixed64(&mut self) -> Result<i64> {
        Ok(self.read_fixed64()? as i64)
    }

    /// Reads a `float` value.
    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_fixed32()?))
    }

    /// Reads a `double` value.
    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    /// Reads a `bool` value; any non-zero varint is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_uint64()? != 0)
    }

    /// Reads an enum number.
    pub fn read_enum(&mut self) -> Result<i32> {
        self.read_int32()
    }

    /// Reads the given number of raw bytes.
    pub fn read_raw_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure_remaining(len)?;
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.position();
        self.cursor.advance(len);
        Ok(&data[start..start + len])
    }

    /// Reads a varint length followed by that many bytes.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.read_uint64()?;
        let len = usize::try_from(len)
            .map_err(|_| ProtoStreamError::malformed(format!("length out of range: {}", len)))?;
        self.read_raw_bytes(len)
    }

    /// Reads a length-delimited byte array.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.read_length_delimited()?.to_vec())
    }

    /// Reads a length-delimited UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_length_delimited()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| ProtoStreamError::malformed(format!("invalid UTF-8 string: {}", e)))
    }

    /// Reads the body of a group whose start tag was already consumed.
    ///
    /// Returns the bytes between the start tag and the matching end tag and
    /// consumes the end tag. Nested groups are tracked without recursion.
    pub fn read_group_body(&mut self, field_number: u32) -> Result<&'a [u8]> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.position();
        let mut open = vec![field_number];
        loop {
            let tag_start = self.position();
            let tag = self.read_tag()?;
            if tag == 0 {
                return Err(ProtoStreamError::malformed(format!(
                    "unterminated group for field number {}",
                    field_number
                )));
            }
            let number = tag_field_number(tag);
            match tag_wire_type(tag)? {
                WireType::StartGroup => open.push(number),
                WireType::EndGroup => {
                    let expected = open.pop().unwrap_or_default();
                    if expected != number {
                        return Err(ProtoStreamError::malformed(format!(
                            "end group tag for field {} does not match open group {}",
                            number, expected
                        )));
                    }
                    if open.is_empty() {
                        return Ok(&data[start..tag_start]);
                    }
                }
                wire_type => self.skip_value(wire_type)?,
            }
        }
    }

    /// Skips a field whose tag was already consumed.
    pub fn skip_field(&mut self, tag: u32) -> Result<()> {
        match tag_wire_type(tag)? {
            WireType::StartGroup => self.read_group_body(tag_field_number(tag)).map(|_| ()),
            WireType::EndGroup => Err(ProtoStreamError::malformed(format!(
                "unexpected end group tag for field {}",
                tag_field_number(tag)
            ))),
            wire_type => self.skip_value(wire_type),
        }
    }

    fn skip_value(&mut self, wire_type: WireType) -> Result<()> {
        match wire_type {
            WireType::Varint => self.read_uint64().map(|_| ()),
            WireType::Fixed64 => self.read_raw_bytes(8).map(|_| ()),
            WireType::LengthDelimited => self.read_length_delimited().map(|_| ()),
            WireType::Fixed32 => self.read_raw_bytes(4).map(|_| ()),
            WireType::StartGroup | WireType::EndGroup => Err(ProtoStreamError::malformed(
                "group markers cannot be skipped as plain values",
            )),
        }
    }
}
