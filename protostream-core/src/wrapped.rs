//! The `WrappedMessage` envelope for values whose type is not known up front.
//!
//! A wrapped value carries its own type designator: primitives are
//! identified by the field slot they occupy, messages and enums by their
//! fully qualified type name followed by the encoded message or the enum
//! number.

use std::any::Any;
use std::fmt;

use crate::context::{MarshallerDelegate, SerializationContext};
use crate::descriptors::{FieldDescriptor, MessageDescriptor, Type};
use crate::error::{ProtoStreamError, Result};
use crate::marshaller::RawProtobufMarshaller;
use crate::stream::{ProtoStreamReader, ProtoStreamWriter};
use crate::wire::{tag_field_number, tag_wire_type, RawProtoStreamReader, WireType};

/// Full name of the envelope message type.
pub const WRAPPED_MESSAGE_TYPE_NAME: &str = "org.infinispan.protostream.WrappedMessage";

/// Field number of `wrappedDouble`.
pub const WRAPPED_DOUBLE: u32 = 1;
/// Field number of `wrappedFloat`.
pub const WRAPPED_FLOAT: u32 = 2;
/// Field number of `wrappedInt64`.
pub const WRAPPED_INT64: u32 = 3;
/// Field number of `wrappedUInt64`.
pub const WRAPPED_UINT64: u32 = 4;
/// Field number of `wrappedInt32`.
pub const WRAPPED_INT32: u32 = 5;
/// Field number of `wrappedFixed64`.
pub const WRAPPED_FIXED64: u32 = 6;
/// Field number of `wrappedFixed32`.
pub const WRAPPED_FIXED32: u32 = 7;
/// Field number of `wrappedBool`.
pub const WRAPPED_BOOL: u32 = 8;
/// Field number of `wrappedString`.
pub const WRAPPED_STRING: u32 = 9;
/// Field number of `wrappedBytes`.
pub const WRAPPED_BYTES: u32 = 10;
/// Field number of `wrappedUInt32`.
pub const WRAPPED_UINT32: u32 = 11;
/// Field number of `wrappedSFixed32`.
pub const WRAPPED_SFIXED32: u32 = 12;
/// Field number of `wrappedSFixed64`.
pub const WRAPPED_SFIXED64: u32 = 13;
/// Field number of `wrappedSInt32`.
pub const WRAPPED_SINT32: u32 = 14;
/// Field number of `wrappedSInt64`.
pub const WRAPPED_SINT64: u32 = 15;
/// Field number of `wrappedDescriptorFullName`.
pub const WRAPPED_DESCRIPTOR_FULL_NAME: u32 = 16;
/// Field number of `wrappedMessageBytes`.
pub const WRAPPED_MESSAGE_BYTES: u32 = 17;
/// Field number of `wrappedEnum`.
pub const WRAPPED_ENUM: u32 = 18;

/// A value carried by the envelope.
pub enum WrappedValue {
    /// No value; encodes as an empty message.
    Null,
    /// A `double`.
    Double(f64),
    /// A `float`.
    Float(f32),
    /// An `int64`.
    Int64(i64),
    /// A `uint64`.
    UInt64(u64),
    /// An `int32`.
    Int32(i32),
    /// A `fixed64`.
    Fixed64(u64),
    /// A `fixed32`.
    Fixed32(u32),
    /// A `bool`.
    Bool(bool),
    /// A `string`.
    String(String),
    /// A `bytes` value.
    Bytes(Vec<u8>),
    /// A `uint32`.
    UInt32(u32),
    /// An `sfixed32`.
    SFixed32(i32),
    /// An `sfixed64`.
    SFixed64(i64),
    /// An `sint32`.
    SInt32(i32),
    /// An `sint64`.
    SInt64(i64),
    /// A value of a registered enum type.
    Enum {
        /// Full name of the enum type.
        type_name: String,
        /// The enum value.
        value: Box<dyn Any + Send>,
    },
    /// A value of a registered message type.
    Message {
        /// Full name of the message type.
        type_name: String,
        /// The message value.
        value: Box<dyn Any + Send>,
    },
}

impl WrappedValue {
    /// Wraps a value of a type registered with a message or raw marshaller.
    pub fn message<T: Any + Send>(ctx: &SerializationContext, value: T) -> Result<Self> {
        let delegate = ctx.lookup::<T>()?;
        if delegate.is_enum() {
            return Err(ProtoStreamError::type_mismatch(
                delegate.type_name(),
                "enum values must be wrapped with WrappedValue::enumeration",
            ));
        }
        Ok(Self::Message {
            type_name: delegate.type_name().to_string(),
            value: Box::new(value),
        })
    }

    /// Wraps a value of a type registered with an enum marshaller.
    pub fn enumeration<T: Any + Send>(ctx: &SerializationContext, value: T) -> Result<Self> {
        let delegate = ctx.lookup::<T>()?;
        if !delegate.is_enum() {
            return Err(ProtoStreamError::type_mismatch(
                delegate.type_name(),
                "only enum values can be wrapped with WrappedValue::enumeration",
            ));
        }
        Ok(Self::Enum {
            type_name: delegate.type_name().to_string(),
            value: Box::new(value),
        })
    }

    /// Returns true for [`WrappedValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the type name of a message or enum value.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Enum { type_name, .. } | Self::Message { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    /// Borrows a message or enum value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Enum { value, .. } | Self::Message { value, .. } => value.downcast_ref(),
            _ => None,
        }
    }

    /// Unwraps a message or enum value as `T`, returning `self` unchanged if
    /// it holds something else.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Self> {
        match self {
            Self::Enum { type_name, value } => value
                .downcast::<T>()
                .map(|v| *v)
                .map_err(|value| Self::Enum { type_name, value }),
            Self::Message { type_name, value } => value
                .downcast::<T>()
                .map(|v| *v)
                .map_err(|value| Self::Message { type_name, value }),
            other => Err(other),
        }
    }
}

impl fmt::Debug for WrappedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Int64(v) => f.debug_tuple("Int64").field(v).finish(),
            Self::UInt64(v) => f.debug_tuple("UInt64").field(v).finish(),
            Self::Int32(v) => f.debug_tuple("Int32").field(v).finish(),
            Self::Fixed64(v) => f.debug_tuple("Fixed64").field(v).finish(),
            Self::Fixed32(v) => f.debug_tuple("Fixed32").field(v).finish(),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::String(v) => f.debug_tuple("String").field(v).finish(),
            Self::Bytes(v) => f.debug_tuple("Bytes").field(v).finish(),
            Self::UInt32(v) => f.debug_tuple("UInt32").field(v).finish(),
            Self::SFixed32(v) => f.debug_tuple("SFixed32").field(v).finish(),
            Self::SFixed64(v) => f.debug_tuple("SFixed64").field(v).finish(),
            Self::SInt32(v) => f.debug_tuple("SInt32").field(v).finish(),
            Self::SInt64(v) => f.debug_tuple("SInt64").field(v).finish(),
            Self::Enum { type_name, .. } => {
                f.debug_struct("Enum").field("type_name", type_name).finish_non_exhaustive()
            }
            Self::Message { type_name, .. } => f
                .debug_struct("Message")
                .field("type_name", type_name)
                .finish_non_exhaustive(),
        }
    }
}

/// Builds the descriptor of the envelope message.
pub fn wrapped_message_descriptor() -> Result<MessageDescriptor> {
    MessageDescriptor::new(
        WRAPPED_MESSAGE_TYPE_NAME,
        vec![
            FieldDescriptor::new("wrappedDouble", WRAPPED_DOUBLE, Type::Double),
            FieldDescriptor::new("wrappedFloat", WRAPPED_FLOAT, Type::Float),
            FieldDescriptor::new("wrappedInt64", WRAPPED_INT64, Type::Int64),
            FieldDescriptor::new("wrappedUInt64", WRAPPED_UINT64, Type::UInt64),
            FieldDescriptor::new("wrappedInt32", WRAPPED_INT32, Type::Int32),
            FieldDescriptor::new("wrappedFixed64", WRAPPED_FIXED64, Type::Fixed64),
            FieldDescriptor::new("wrappedFixed32", WRAPPED_FIXED32, Type::Fixed32),
            FieldDescriptor::new("wrappedBool", WRAPPED_BOOL, Type::Bool),
            FieldDescriptor::new("wrappedString", WRAPPED_STRING, Type::String),
            FieldDescriptor::new("wrappedBytes", WRAPPED_BYTES, Type::Bytes),
            FieldDescriptor::new("wrappedUInt32", WRAPPED_UINT32, Type::UInt32),
            FieldDescriptor::new("wrappedSFixed32", WRAPPED_SFIXED32, Type::SFixed32),
            FieldDescriptor::new("wrappedSFixed64", WRAPPED_SFIXED64, Type::SFixed64),
            FieldDescriptor::new("wrappedSInt32", WRAPPED_SINT32, Type::SInt32),
            FieldDescriptor::new("wrappedSInt64", WRAPPED_SINT64, Type::SInt64),
            FieldDescriptor::new(
                "wrappedDescriptorFullName",
                WRAPPED_DESCRIPTOR_FULL_NAME,
                Type::String,
            ),
            FieldDescriptor::new("wrappedMessageBytes", WRAPPED_MESSAGE_BYTES, Type::Bytes),
            FieldDescriptor::new("wrappedEnum", WRAPPED_ENUM, Type::Int32),
        ],
    )
}

/// Raw marshaller for [`WrappedValue`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WrappedMessageMarshaller;

impl WrappedMessageMarshaller {
    fn object_delegate(
        ctx: &SerializationContext,
        type_name: &str,
        value: &dyn Any,
    ) -> Result<std::sync::Arc<MarshallerDelegate>> {
        let delegate = ctx.lookup_by_name(type_name)?;
        if delegate.target_type() != value.type_id() {
            return Err(ProtoStreamError::type_mismatch(
                type_name,
                format!(
                    "wrapped value is not a {}",
                    delegate.target_type_name()
                ),
            ));
        }
        Ok(delegate)
    }
}

impl RawProtobufMarshaller for WrappedMessageMarshaller {
    type Target = WrappedValue;

    fn type_name(&self) -> &str {
        WRAPPED_MESSAGE_TYPE_NAME
    }

    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, value: &WrappedValue) -> Result<()> {
        let ctx = writer.serialization_context();
        match value {
            WrappedValue::Message { type_name, value } => {
                let delegate = Self::object_delegate(ctx, type_name, value.as_ref())?;
                let body = writer.marshall_detached(&delegate, value.as_ref())?;
                let out = writer.raw_output();
                out.write_string(WRAPPED_DESCRIPTOR_FULL_NAME, type_name);
                out.write_bytes(WRAPPED_MESSAGE_BYTES, body.as_bytes());
            }
            WrappedValue::Enum { type_name, value } => {
                let delegate = Self::object_delegate(ctx, type_name, value.as_ref())?;
                let number = delegate.encode_enum(type_name, value.as_ref())?;
                let out = writer.raw_output();
                out.write_string(WRAPPED_DESCRIPTOR_FULL_NAME, type_name);
                out.write_enum(WRAPPED_ENUM, number);
            }
            primitive => {
                let out = writer.raw_output();
                match primitive {
                    WrappedValue::Null => {}
                    WrappedValue::Double(v) => out.write_double(WRAPPED_DOUBLE, *v),
                    WrappedValue::Float(v) => out.write_float(WRAPPED_FLOAT, *v),
                    WrappedValue::Int64(v) => out.write_int64(WRAPPED_INT64, *v),
                    WrappedValue::UInt64(v) => out.write_uint64(WRAPPED_UINT64, *v),
                    WrappedValue::Int32(v) => out.write_int32(WRAPPED_INT32, *v),
                    WrappedValue::Fixed64(v) => out.write_fixed64(WRAPPED_FIXED64, *v),
                    WrappedValue::Fixed32(v) => out.write_fixed32(WRAPPED_FIXED32, *v),
                    WrappedValue::Bool(v) => out.write_bool(WRAPPED_BOOL, *v),
                    WrappedValue::String(v) => out.write_string(WRAPPED_STRING, v),
                    WrappedValue::Bytes(v) => out.write_bytes(WRAPPED_BYTES, v),
                    WrappedValue::UInt32(v) => out.write_uint32(WRAPPED_UINT32, *v),
                    WrappedValue::SFixed32(v) => out.write_sfixed32(WRAPPED_SFIXED32, *v),
                    WrappedValue::SFixed64(v) => out.write_sfixed64(WRAPPED_SFIXED64, *v),
                    WrappedValue::SInt32(v) => out.write_sint32(WRAPPED_SINT32, *v),
                    WrappedValue::SInt64(v) => out.write_sint64(WRAPPED_SINT64, *v),
                    WrappedValue::Enum { .. } | WrappedValue::Message { .. } => {}
                }
            }
        }
        Ok(())
    }

    fn read_from<'a>(
        &self,
        reader: &mut ProtoStreamReader<'a>,
        input: &mut RawProtoStreamReader<'a>,
    ) -> Result<WrappedValue> {
        let mut primitive: Option<WrappedValue> = None;
        let mut type_name: Option<String> = None;
        let mut message_bytes: Option<&'a [u8]> = None;
        let mut enum_number: Option<i32> = None;

        loop {
            let tag = input.read_tag()?;
            if tag == 0 {
                break;
            }
            let number = tag_field_number(tag);
            let wire_type = tag_wire_type(tag)?;
            let expected = match number {
                WRAPPED_DOUBLE | WRAPPED_FIXED64 | WRAPPED_SFIXED64 => WireType::Fixed64,
                WRAPPED_FLOAT | WRAPPED_FIXED32 | WRAPPED_SFIXED32 => WireType::Fixed32,
                WRAPPED_STRING | WRAPPED_BYTES | WRAPPED_DESCRIPTOR_FULL_NAME
                | WRAPPED_MESSAGE_BYTES => WireType::LengthDelimited,
                WRAPPED_INT64 | WRAPPED_UINT64 | WRAPPED_INT32 | WRAPPED_BOOL
                | WRAPPED_UINT32 | WRAPPED_SINT32 | WRAPPED_SINT64 | WRAPPED_ENUM => {
                    WireType::Varint
                }
                _ => {
                    tracing::trace!("skipping unknown field {} in wrapped message", number);
                    input.skip_field(tag)?;
                    continue;
                }
            };
            if wire_type != expected {
                return Err(ProtoStreamError::malformed(format!(
                    "wrapped message field {} has wire type {:?}, expected {:?}",
                    number, wire_type, expected
                )));
            }

            let value = match number {
                WRAPPED_DESCRIPTOR_FULL_NAME => {
                    set_once(&mut type_name, input.read_string()?)?;
                    continue;
                }
                WRAPPED_MESSAGE_BYTES => {
                    set_once(&mut message_bytes, input.read_length_delimited()?)?;
                    continue;
                }
                WRAPPED_ENUM => {
                    set_once(&mut enum_number, input.read_enum()?)?;
                    continue;
                }
                WRAPPED_DOUBLE => WrappedValue::Double(input.read_double()?),
                WRAPPED_FLOAT => WrappedValue::Float(input.read_float()?),
                WRAPPED_INT64 => WrappedValue::Int64(input.read_int64()?),
                WRAPPED_UINT64 => WrappedValue::UInt64(input.read_uint64()?),
                WRAPPED_INT32 => WrappedValue::Int32(input.read_int32()?),
                WRAPPED_FIXED64 => WrappedValue::Fixed64(input.read_fixed64()?),
                WRAPPED_FIXED32 => WrappedValue::Fixed32(input.read_fixed32()?),
                WRAPPED_BOOL => WrappedValue::Bool(input.read_bool()?),
                WRAPPED_STRING => WrappedValue::String(input.read_string()?),
                WRAPPED_BYTES => WrappedValue::Bytes(input.read_bytes()?),
                WRAPPED_UINT32 => WrappedValue::UInt32(input.read_uint32()?),
                WRAPPED_SFIXED32 => WrappedValue::SFixed32(input.read_sfixed32()?),
                WRAPPED_SFIXED64 => WrappedValue::SFixed64(input.read_sfixed64()?),
                WRAPPED_SINT32 => WrappedValue::SInt32(input.read_sint32()?),
                _ => WrappedValue::SInt64(input.read_sint64()?),
            };
            set_once(&mut primitive, value)?;
        }

        match (primitive, type_name, message_bytes, enum_number) {
            (None, None, None, None) => Ok(WrappedValue::Null),
            (Some(value), None, None, None) => Ok(value),
            (None, Some(type_name), Some(bytes), None) => {
                let delegate = reader.serialization_context().lookup_by_name(&type_name)?;
                let value = reader.unmarshall_detached(&delegate, bytes)?;
                Ok(WrappedValue::Message { type_name, value })
            }
            (None, Some(type_name), None, Some(number)) => {
                let delegate = reader.serialization_context().lookup_by_name(&type_name)?;
                let value = delegate.decode_enum(&type_name, number)?.ok_or_else(|| {
                    ProtoStreamError::malformed(format!(
                        "unknown value {} for enum {}",
                        number, type_name
                    ))
                })?;
                Ok(WrappedValue::Enum { type_name, value })
            }
            _ => Err(ProtoStreamError::malformed(
                "wrapped message holds contradictory value slots",
            )),
        }
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> Result<()> {
    if slot.replace(value).is_some() {
        return Err(ProtoStreamError::malformed(
            "wrapped message holds more than one value",
        ));
    }
    Ok(())
}
