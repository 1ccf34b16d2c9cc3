//! Type-erased marshaller entries held by the registry.
//!
//! Application marshallers are generic over their target type; the registry
//! stores them behind object-safe traits that work on `dyn Any` so a single
//! lookup table can serve every registered type.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::descriptors::{EnumDescriptor, FieldDescriptor, MessageDescriptor};
use crate::error::{ProtoStreamError, Result};
use crate::marshaller::{EnumMarshaller, MessageMarshaller, RawProtobufMarshaller};
use crate::stream::{ProtoStreamReader, ProtoStreamWriter};
use crate::wire::RawProtoStreamReader;

/// Value produced by an erased unmarshall call.
pub(crate) type AnyValue = Box<dyn Any + Send>;

pub(crate) trait ErasedMessageMarshaller: Send + Sync {
    fn write_any(&self, writer: &mut ProtoStreamWriter<'_>, value: &dyn Any) -> Result<()>;
    fn read_any(&self, reader: &mut ProtoStreamReader<'_>) -> Result<AnyValue>;
}

impl<M: MessageMarshaller> ErasedMessageMarshaller for M {
    fn write_any(&self, writer: &mut ProtoStreamWriter<'_>, value: &dyn Any) -> Result<()> {
        let value = downcast_target::<M::Target>(self.type_name(), value)?;
        self.write_to(writer, value)
    }

    fn read_any(&self, reader: &mut ProtoStreamReader<'_>) -> Result<AnyValue> {
        Ok(Box::new(self.read_from(reader)?))
    }
}

pub(crate) trait ErasedEnumMarshaller: Send + Sync {
    fn encode_any(&self, value: &dyn Any) -> Result<i32>;
    fn decode_any(&self, number: i32) -> Option<AnyValue>;
}

impl<M: EnumMarshaller> ErasedEnumMarshaller for M {
    fn encode_any(&self, value: &dyn Any) -> Result<i32> {
        let value = downcast_target::<M::Target>(self.type_name(), value)?;
        Ok(self.encode(value))
    }

    fn decode_any(&self, number: i32) -> Option<AnyValue> {
        self.decode(number).map(|v| Box::new(v) as AnyValue)
    }
}

pub(crate) trait ErasedRawMarshaller: Send + Sync {
    fn write_any(&self, writer: &mut ProtoStreamWriter<'_>, value: &dyn Any) -> Result<()>;
    fn read_any<'a>(
        &self,
        reader: &mut ProtoStreamReader<'a>,
        input: &mut RawProtoStreamReader<'a>,
    ) -> Result<AnyValue>;
}

impl<M: RawProtobufMarshaller> ErasedRawMarshaller for M {
    fn write_any(&self, writer: &mut ProtoStreamWriter<'_>, value: &dyn Any) -> Result<()> {
        let value = downcast_target::<M::Target>(self.type_name(), value)?;
        self.write_to(writer, value)
    }

    fn read_any<'a>(
        &self,
        reader: &mut ProtoStreamReader<'a>,
        input: &mut RawProtoStreamReader<'a>,
    ) -> Result<AnyValue> {
        Ok(Box::new(self.read_from(reader, input)?))
    }
}

fn downcast_target<'v, T: 'static>(schema_type: &str, value: &'v dyn Any) -> Result<&'v T> {
    value.downcast_ref::<T>().ok_or_else(|| {
        ProtoStreamError::type_mismatch(
            schema_type,
            format!("marshaller expects values of type {}", type_name::<T>()),
        )
    })
}

#[derive(Clone)]
enum DelegateKind {
    Message {
        descriptor: Arc<MessageDescriptor>,
        marshaller: Arc<dyn ErasedMessageMarshaller>,
    },
    Enum {
        descriptor: Arc<EnumDescriptor>,
        marshaller: Arc<dyn ErasedEnumMarshaller>,
    },
    Raw {
        marshaller: Arc<dyn ErasedRawMarshaller>,
    },
}

/// A registered marshaller bound to its Rust type and schema type.
#[derive(Clone)]
pub struct MarshallerDelegate {
    type_name: String,
    target: TypeId,
    target_name: &'static str,
    kind: DelegateKind,
}

impl MarshallerDelegate {
    pub(crate) fn message<M: MessageMarshaller>(
        marshaller: M,
        descriptor: Arc<MessageDescriptor>,
    ) -> Self {
        Self {
            type_name: marshaller.type_name().to_string(),
            target: TypeId::of::<M::Target>(),
            target_name: type_name::<M::Target>(),
            kind: DelegateKind::Message {
                descriptor,
                marshaller: Arc::new(marshaller),
            },
        }
    }

    pub(crate) fn enumeration<M: EnumMarshaller>(
        marshaller: M,
        descriptor: Arc<EnumDescriptor>,
    ) -> Self {
        Self {
            type_name: marshaller.type_name().to_string(),
            target: TypeId::of::<M::Target>(),
            target_name: type_name::<M::Target>(),
            kind: DelegateKind::Enum {
                descriptor,
                marshaller: Arc::new(marshaller),
            },
        }
    }

    pub(crate) fn raw<M: RawProtobufMarshaller>(marshaller: M) -> Self {
        Self {
            type_name: marshaller.type_name().to_string(),
            target: TypeId::of::<M::Target>(),
            target_name: type_name::<M::Target>(),
            kind: DelegateKind::Raw {
                marshaller: Arc::new(marshaller),
            },
        }
    }

    /// Returns the fully qualified schema type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the `TypeId` of the Rust type handled by this marshaller.
    pub fn target_type(&self) -> TypeId {
        self.target
    }

    /// Returns the name of the Rust type handled by this marshaller.
    pub fn target_type_name(&self) -> &'static str {
        self.target_name
    }

    /// Returns true for schema-driven message marshallers.
    pub fn is_message(&self) -> bool {
        matches!(self.kind, DelegateKind::Message { .. })
    }

    /// Returns true for enum marshallers.
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, DelegateKind::Enum { .. })
    }

    /// Returns true for raw marshallers.
    pub fn is_raw(&self) -> bool {
        matches!(self.kind, DelegateKind::Raw { .. })
    }

    /// Returns the message descriptor of a message marshaller.
    pub fn message_descriptor(&self) -> Option<&Arc<MessageDescriptor>> {
        match &self.kind {
            DelegateKind::Message { descriptor, .. } => Some(descriptor),
            _ => None,
        }
    }

    /// Returns the enum descriptor of an enum marshaller.
    pub fn enum_descriptor(&self) -> Option<&Arc<EnumDescriptor>> {
        match &self.kind {
            DelegateKind::Enum { descriptor, .. } => Some(descriptor),
            _ => None,
        }
    }

    /// Marshalls a message value into the writer's current sink.
    ///
    /// `field` is the enclosing field, or `None` at top level. Enum values
    /// have no standalone encoding and are rejected here.
    pub(crate) fn marshall(
        &self,
        field: Option<&FieldDescriptor>,
        value: &dyn Any,
        writer: &mut ProtoStreamWriter<'_>,
    ) -> Result<()> {
        match &self.kind {
            DelegateKind::Message {
                descriptor,
                marshaller,
            } => {
                writer.push_context(field, Arc::clone(descriptor))?;
                let result = marshaller.write_any(writer, value);
                writer.pop_context();
                result
            }
            DelegateKind::Raw { marshaller } => {
                writer.enter_raw()?;
                let result = marshaller.write_any(writer, value);
                writer.exit_raw();
                result
            }
            DelegateKind::Enum { .. } => Err(ProtoStreamError::type_mismatch(
                field.map_or(self.type_name.as_str(), |f| f.full_name()),
                format!("enum {} cannot be marshalled as a message", self.type_name),
            )),
        }
    }

    /// Unmarshalls a message value bounded by `input`.
    pub(crate) fn unmarshall<'a>(
        &self,
        field: Option<&FieldDescriptor>,
        reader: &mut ProtoStreamReader<'a>,
        input: &mut RawProtoStreamReader<'a>,
    ) -> Result<AnyValue> {
        match &self.kind {
            DelegateKind::Message {
                descriptor,
                marshaller,
            } => {
                reader.push_context(field, Arc::clone(descriptor), input)?;
                let value = marshaller.read_any(reader);
                let checked = reader.pop_context();
                let value = value?;
                checked?;
                Ok(value)
            }
            DelegateKind::Raw { marshaller } => {
                reader.enter_raw()?;
                let value = marshaller.read_any(reader, input);
                reader.exit_raw();
                value
            }
            DelegateKind::Enum { .. } => Err(ProtoStreamError::type_mismatch(
                field.map_or(self.type_name.as_str(), |f| f.full_name()),
                format!("enum {} cannot be unmarshalled as a message", self.type_name),
            )),
        }
    }

    /// Returns the wire number of an enum value.
    pub(crate) fn encode_enum(&self, field: &str, value: &dyn Any) -> Result<i32> {
        match &self.kind {
            DelegateKind::Enum { marshaller, .. } => marshaller.encode_any(value),
            _ => Err(ProtoStreamError::type_mismatch(
                field,
                format!("{} is not an enum type", self.type_name),
            )),
        }
    }

    /// Decodes an enum wire number; `Ok(None)` when the number is unknown.
    pub(crate) fn decode_enum(&self, field: &str, number: i32) -> Result<Option<AnyValue>> {
        match &self.kind {
            DelegateKind::Enum { marshaller, .. } => Ok(marshaller.decode_any(number)),
            _ => Err(ProtoStreamError::type_mismatch(
                field,
                format!("{} is not an enum type", self.type_name),
            )),
        }
    }
}

impl fmt::Debug for MarshallerDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DelegateKind::Message { .. } => "message",
            DelegateKind::Enum { .. } => "enum",
            DelegateKind::Raw { .. } => "raw",
        };
        f.debug_struct("MarshallerDelegate")
            .field("type_name", &self.type_name)
            .field("target", &self.target_name)
            .field("kind", &kind)
            .finish()
    }
}
