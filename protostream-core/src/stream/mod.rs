//! Schema-validated field streams handed to message marshallers.
//!
//! [`ProtoStreamWriter`] and [`ProtoStreamReader`] address fields by name,
//! resolve them against the descriptor of the message being processed and
//! reject writes and reads that the schema does not allow. Each nested
//! message or group gets its own message context on a stack owned by the
//! stream, so bookkeeping for one message never leaks into another.

mod reader;
mod writer;

pub use reader::ProtoStreamReader;
pub use writer::ProtoStreamWriter;

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::context::{AnyValue, MarshallerDelegate, SerializationContext};
use crate::descriptors::{FieldDescriptor, MessageDescriptor, Type};
use crate::error::{ProtoStreamError, Result};
use crate::wire::RawProtoStreamWriter;

/// Kind of scalar value accepted by a typed write or read call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarKind {
    Int,
    Long,
    Double,
    Float,
    Bool,
    String,
    Bytes,
}

impl ScalarKind {
    fn accepts(self, field_type: Type) -> bool {
        match self {
            Self::Int => matches!(
                field_type,
                Type::Int32 | Type::UInt32 | Type::SInt32 | Type::Fixed32 | Type::SFixed32
            ),
            Self::Long => matches!(
                field_type,
                Type::Int64 | Type::UInt64 | Type::SInt64 | Type::Fixed64 | Type::SFixed64
            ),
            Self::Double => field_type == Type::Double,
            Self::Float => field_type == Type::Float,
            Self::Bool => field_type == Type::Bool,
            Self::String => field_type == Type::String,
            Self::Bytes => field_type == Type::Bytes,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::Float => "float",
            Self::Bool => "boolean",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

impl ScalarKind {
    /// Returns the scalar kind of a Rust type, if it is one of the scalar
    /// types the field writer and reader handle directly.
    pub(crate) fn of<T: Any>() -> Option<Self> {
        let id = TypeId::of::<T>();
        if id == TypeId::of::<i32>() {
            Some(Self::Int)
        } else if id == TypeId::of::<i64>() {
            Some(Self::Long)
        } else if id == TypeId::of::<f64>() {
            Some(Self::Double)
        } else if id == TypeId::of::<f32>() {
            Some(Self::Float)
        } else if id == TypeId::of::<bool>() {
            Some(Self::Bool)
        } else if id == TypeId::of::<String>() || id == TypeId::of::<&'static str>() {
            Some(Self::String)
        } else if id == TypeId::of::<Vec<u8>>() {
            Some(Self::Bytes)
        } else {
            None
        }
    }
}

/// Fails with `TypeMismatch` unless the declared type of `field` accepts
/// values of `kind`.
pub(crate) fn check_kind(field: &FieldDescriptor, kind: ScalarKind) -> Result<()> {
    if kind.accepts(field.field_type()) {
        Ok(())
    } else {
        Err(ProtoStreamError::type_mismatch(
            field.full_name(),
            format!(
                "declared type is {} but a {} value was used",
                field.field_type(),
                kind.name()
            ),
        ))
    }
}

/// A borrowed scalar value about to be encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Scalar<'v> {
    Int(i32),
    Long(i64),
    Double(f64),
    Float(f32),
    Bool(bool),
    Str(&'v str),
    Bytes(&'v [u8]),
}

impl<'v> Scalar<'v> {
    pub(crate) fn kind(&self) -> ScalarKind {
        match self {
            Self::Int(_) => ScalarKind::Int,
            Self::Long(_) => ScalarKind::Long,
            Self::Double(_) => ScalarKind::Double,
            Self::Float(_) => ScalarKind::Float,
            Self::Bool(_) => ScalarKind::Bool,
            Self::Str(_) => ScalarKind::String,
            Self::Bytes(_) => ScalarKind::Bytes,
        }
    }

    /// Views a collection element as a scalar, if it has a scalar type.
    pub(crate) fn from_any(value: &'v dyn Any) -> Option<Self> {
        if let Some(v) = value.downcast_ref::<i32>() {
            Some(Self::Int(*v))
        } else if let Some(v) = value.downcast_ref::<i64>() {
            Some(Self::Long(*v))
        } else if let Some(v) = value.downcast_ref::<f64>() {
            Some(Self::Double(*v))
        } else if let Some(v) = value.downcast_ref::<f32>() {
            Some(Self::Float(*v))
        } else if let Some(v) = value.downcast_ref::<bool>() {
            Some(Self::Bool(*v))
        } else if let Some(v) = value.downcast_ref::<String>() {
            Some(Self::Str(v))
        } else if let Some(v) = value.downcast_ref::<&'static str>() {
            Some(Self::Str(v))
        } else {
            value.downcast_ref::<Vec<u8>>().map(|v| Self::Bytes(v))
        }
    }

    /// Encodes this value as `field`, choosing the encoding from the
    /// declared type.
    pub(crate) fn encode(self, out: &mut RawProtoStreamWriter, field: &FieldDescriptor) -> Result<()> {
        let number = field.number();
        match (field.field_type(), self) {
            (Type::Int32, Self::Int(v)) => out.write_int32(number, v),
            (Type::UInt32, Self::Int(v)) => out.write_uint32(number, v as u32),
            (Type::SInt32, Self::Int(v)) => out.write_sint32(number, v),
            (Type::Fixed32, Self::Int(v)) => out.write_fixed32(number, v as u32),
            (Type::SFixed32, Self::Int(v)) => out.write_sfixed32(number, v),
            (Type::Int64, Self::Long(v)) => out.write_int64(number, v),
            (Type::UInt64, Self::Long(v)) => out.write_uint64(number, v as u64),
            (Type::SInt64, Self::Long(v)) => out.write_sint64(number, v),
            (Type::Fixed64, Self::Long(v)) => out.write_fixed64(number, v as u64),
            (Type::SFixed64, Self::Long(v)) => out.write_sfixed64(number, v),
            (Type::Double, Self::Double(v)) => out.write_double(number, v),
            (Type::Float, Self::Float(v)) => out.write_float(number, v),
            (Type::Bool, Self::Bool(v)) => out.write_bool(number, v),
            (Type::String, Self::Str(v)) => out.write_string(number, v),
            (Type::Bytes, Self::Bytes(v)) => out.write_bytes(number, v),
            (_, value) => return check_kind(field, value.kind()),
        }
        Ok(())
    }
}

/// An owned scalar value produced by decoding.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScalarValue {
    Int(i32),
    Long(i64),
    Double(f64),
    Float(f32),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl ScalarValue {
    pub(crate) fn into_any(self) -> AnyValue {
        match self {
            Self::Int(v) => Box::new(v),
            Self::Long(v) => Box::new(v),
            Self::Double(v) => Box::new(v),
            Self::Float(v) => Box::new(v),
            Self::Bool(v) => Box::new(v),
            Self::String(v) => Box::new(v),
            Self::Bytes(v) => Box::new(v),
        }
    }
}

/// Extracts a Rust value from a decoded scalar of the matching kind.
pub(crate) trait FromScalar: Sized {
    fn from_scalar(value: ScalarValue) -> Option<Self>;
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromScalar for $ty {
                fn from_scalar(value: ScalarValue) -> Option<Self> {
                    match value {
                        ScalarValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_scalar! {
    i32 => Int,
    i64 => Long,
    f64 => Double,
    f32 => Float,
    bool => Bool,
    String => String,
    Vec<u8> => Bytes,
}

/// Resolves a field by name in the descriptor of the current message.
pub(crate) fn resolve_field<'d>(
    descriptor: &'d MessageDescriptor,
    name: &str,
) -> Result<&'d FieldDescriptor> {
    descriptor
        .field(name)
        .ok_or_else(|| ProtoStreamError::UnknownField {
            message: descriptor.full_name().to_string(),
            field: name.to_string(),
        })
}

/// Error for field access outside any message context.
pub(crate) fn no_message_context(name: &str) -> ProtoStreamError {
    ProtoStreamError::UnknownField {
        message: "(no message context)".to_string(),
        field: name.to_string(),
    }
}

/// Finds the marshaller for `T` and checks that it handles the type the
/// field declares.
pub(crate) fn object_delegate<T: Any>(
    ctx: &SerializationContext,
    field: &FieldDescriptor,
) -> Result<Arc<MarshallerDelegate>> {
    if !matches!(field.field_type(), Type::Message | Type::Group | Type::Enum) {
        return Err(ProtoStreamError::type_mismatch(
            field.full_name(),
            format!(
                "declared type {} cannot hold a {}",
                field.field_type(),
                type_name::<T>()
            ),
        ));
    }
    if let Some(kind) = ScalarKind::of::<T>() {
        return Err(ProtoStreamError::type_mismatch(
            field.full_name(),
            format!(
                "declared type is {} but a {} value was used",
                field.field_type(),
                kind.name()
            ),
        ));
    }
    let delegate = ctx.lookup::<T>()?;
    if field.type_name() != Some(delegate.type_name()) {
        return Err(ProtoStreamError::type_mismatch(
            field.full_name(),
            format!(
                "declared type {} but {} is marshalled as {}",
                field.type_name().unwrap_or_default(),
                type_name::<T>(),
                delegate.type_name()
            ),
        ));
    }
    Ok(delegate)
}

pub(crate) fn check_enum_field(field: &FieldDescriptor) -> Result<()> {
    if field.field_type() != Type::Enum {
        return Err(ProtoStreamError::type_mismatch(
            field.full_name(),
            format!("declared type {} is not an enum", field.field_type()),
        ));
    }
    Ok(())
}

/// Unboxes a decoded value, failing with `TypeMismatch` if it is not a `T`.
pub(crate) fn downcast_value<T: Any>(field: &FieldDescriptor, value: AnyValue) -> Result<T> {
    value.downcast::<T>().map(|v| *v).map_err(|_| {
        ProtoStreamError::type_mismatch(
            field.full_name(),
            format!("value cannot be read as {}", type_name::<T>()),
        )
    })
}

/// Converts a timestamp to milliseconds since the Unix epoch.
pub(crate) fn to_epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis())
            .map(|ms| -ms)
            .unwrap_or(i64::MIN),
    }
}

/// Converts milliseconds since the Unix epoch to a timestamp.
pub(crate) fn from_epoch_millis(field: &FieldDescriptor, millis: i64) -> Result<SystemTime> {
    let offset = Duration::from_millis(millis.unsigned_abs());
    let time = if millis >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    };
    time.ok_or_else(|| {
        ProtoStreamError::malformed(format!(
            "timestamp {} out of range for field {}",
            millis,
            field.full_name()
        ))
    })
}
