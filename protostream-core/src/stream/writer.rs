use std::any::Any;
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use std::time::SystemTime;

use super::{
    check_enum_field, check_kind, no_message_context, object_delegate, resolve_field, to_epoch_millis, Scalar,
    ScalarKind,
};
use crate::context::{MarshallerDelegate, SerializationContext};
use crate::descriptors::{FieldDescriptor, MessageDescriptor, Type};
use crate::error::{ProtoStreamError, Result};
use crate::wire::{RawProtoStreamWriter, WireType};

/// Bookkeeping for one message being written.
#[derive(Debug)]
struct WriteMessageContext {
    descriptor: Arc<MessageDescriptor>,
    written: HashSet<u32>,
    max_seen: u32,
}

impl WriteMessageContext {
    fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        Self {
            descriptor,
            written: HashSet::new(),
            max_seen: 0,
        }
    }
}

/// Writes the fields of a message by name, validating each write against the
/// message descriptor.
///
/// A writer is created per top-level marshalling call and handed to
/// [`MessageMarshaller::write_to`](crate::MessageMarshaller::write_to).
/// Writing an absent optional value is a no-op; writing an absent required
/// value fails with [`ProtoStreamError::RequiredFieldMissing`].
pub struct ProtoStreamWriter<'c> {
    ctx: &'c SerializationContext,
    root: RawProtoStreamWriter,
    nested: Vec<RawProtoStreamWriter>,
    contexts: Vec<WriteMessageContext>,
    raw_depth: usize,
}

impl<'c> ProtoStreamWriter<'c> {
    pub(crate) fn new(ctx: &'c SerializationContext) -> Self {
        Self {
            ctx,
            root: RawProtoStreamWriter::new(),
            nested: Vec::new(),
            contexts: Vec::new(),
            raw_depth: 0,
        }
    }

    pub(crate) fn into_output(self) -> RawProtoStreamWriter {
        self.root
    }

    /// Returns the serialization context this writer belongs to.
    pub fn serialization_context(&self) -> &'c SerializationContext {
        self.ctx
    }

    /// Returns the raw sink of the message currently being written.
    ///
    /// Bytes written here bypass schema validation. Intended for
    /// [`RawProtobufMarshaller`](crate::RawProtobufMarshaller) implementations.
    pub fn raw_output(&mut self) -> &mut RawProtoStreamWriter {
        self.nested.last_mut().unwrap_or(&mut self.root)
    }

    /// Returns the current nesting depth: open message contexts plus raw
    /// marshaller calls in progress.
    pub fn depth(&self) -> usize {
        self.contexts.len() + self.raw_depth
    }

    fn check_depth(&self) -> Result<()> {
        let max_depth = self.ctx.config().max_nesting_depth();
        if self.depth() >= max_depth {
            return Err(ProtoStreamError::MaxDepthExceeded(max_depth));
        }
        Ok(())
    }

    /// Counts a raw marshaller call towards the nesting depth.
    pub(crate) fn enter_raw(&mut self) -> Result<()> {
        self.check_depth()?;
        self.raw_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_raw(&mut self) {
        self.raw_depth = self.raw_depth.saturating_sub(1);
    }

    pub(crate) fn push_context(
        &mut self,
        field: Option<&FieldDescriptor>,
        descriptor: Arc<MessageDescriptor>,
    ) -> Result<()> {
        self.check_depth()?;
        tracing::trace!(
            "writing {} for field {}",
            descriptor.full_name(),
            field.map_or("<top-level>", |f| f.full_name())
        );
        self.contexts.push(WriteMessageContext::new(descriptor));
        Ok(())
    }

    pub(crate) fn pop_context(&mut self) {
        self.contexts.pop();
    }

    /// Marshalls `value` with `delegate` into a fresh buffer and returns it.
    pub(crate) fn marshall_detached(
        &mut self,
        delegate: &MarshallerDelegate,
        value: &dyn Any,
    ) -> Result<RawProtoStreamWriter> {
        self.nested.push(RawProtoStreamWriter::new());
        let result = delegate.marshall(None, value, self);
        let body = self.nested.pop().unwrap_or_default();
        result.map(|_| body)
    }

    fn current_descriptor(&self, name: &str) -> Result<Arc<MessageDescriptor>> {
        self.contexts
            .last()
            .map(|c| Arc::clone(&c.descriptor))
            .ok_or_else(|| no_message_context(name))
    }

    fn mark_written(&mut self, field: &FieldDescriptor) -> Result<()> {
        let log = self.ctx.config().log_out_of_sequence_writes();
        let context = self
            .contexts
            .last_mut()
            .ok_or_else(|| no_message_context(field.name()))?;
        let number = field.number();
        if !context.written.insert(number) {
            return Err(ProtoStreamError::DuplicateField {
                field: field.full_name().to_string(),
            });
        }
        if log && context.max_seen > number {
            tracing::warn!(
                "field {} was written out of sequence and will lead to sub-optimal read time",
                field.full_name()
            );
        }
        context.max_seen = context.max_seen.max(number);
        Ok(())
    }

    fn check_field_write(&mut self, field: &FieldDescriptor) -> Result<()> {
        if field.is_repeated() {
            return Err(ProtoStreamError::wrong_cardinality(
                field.full_name(),
                "repeated fields must be written with write_collection or write_array",
            ));
        }
        self.mark_written(field)
    }

    fn check_repeated_field_write(&mut self, field: &FieldDescriptor) -> Result<()> {
        if !field.is_repeated() {
            return Err(ProtoStreamError::wrong_cardinality(
                field.full_name(),
                "only repeated fields can be written as a collection",
            ));
        }
        self.mark_written(field)
    }

    fn write_scalar(&mut self, name: &str, kind: ScalarKind, value: Option<Scalar<'_>>) -> Result<()> {
        let descriptor = self.current_descriptor(name)?;
        let field = resolve_field(&descriptor, name)?;
        let Some(value) = value else {
            return absent(field);
        };
        self.check_field_write(field)?;
        check_kind(field, kind)?;
        value.encode(self.raw_output(), field)
    }

    /// Writes an int value to an int32, uint32, sint32, fixed32 or sfixed32
    /// field.
    pub fn write_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.write_scalar(name, ScalarKind::Int, Some(Scalar::Int(value)))
    }

    /// Writes an optional int value.
    pub fn write_nullable_int(&mut self, name: &str, value: Option<i32>) -> Result<()> {
        self.write_scalar(name, ScalarKind::Int, value.map(Scalar::Int))
    }

    /// Writes a long value to an int64, uint64, sint64, fixed64 or sfixed64
    /// field.
    pub fn write_long(&mut self, name: &str, value: i64) -> Result<()> {
        self.write_scalar(name, ScalarKind::Long, Some(Scalar::Long(value)))
    }

    /// Writes an optional long value.
    pub fn write_nullable_long(&mut self, name: &str, value: Option<i64>) -> Result<()> {
        self.write_scalar(name, ScalarKind::Long, value.map(Scalar::Long))
    }

    /// Writes a double field.
    pub fn write_double(&mut self, name: &str, value: f64) -> Result<()> {
        self.write_scalar(name, ScalarKind::Double, Some(Scalar::Double(value)))
    }

    /// Writes an optional double field.
    pub fn write_nullable_double(&mut self, name: &str, value: Option<f64>) -> Result<()> {
        self.write_scalar(name, ScalarKind::Double, value.map(Scalar::Double))
    }

    /// Writes a float field.
    pub fn write_float(&mut self, name: &str, value: f32) -> Result<()> {
        self.write_scalar(name, ScalarKind::Float, Some(Scalar::Float(value)))
    }

    /// Writes an optional float field.
    pub fn write_nullable_float(&mut self, name: &str, value: Option<f32>) -> Result<()> {
        self.write_scalar(name, ScalarKind::Float, value.map(Scalar::Float))
    }

    /// Writes a bool field.
    pub fn write_bool(&mut self, name: &str, value: bool) -> Result<()> {
        self.write_scalar(name, ScalarKind::Bool, Some(Scalar::Bool(value)))
    }

    /// Writes an optional bool field.
    pub fn write_nullable_bool(&mut self, name: &str, value: Option<bool>) -> Result<()> {
        self.write_scalar(name, ScalarKind::Bool, value.map(Scalar::Bool))
    }

    /// Writes a string field.
    pub fn write_string(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        self.write_scalar(name, ScalarKind::String, value.map(Scalar::Str))
    }

    /// Writes a bytes field.
    pub fn write_bytes(&mut self, name: &str, value: Option<&[u8]>) -> Result<()> {
        self.write_scalar(name, ScalarKind::Bytes, value.map(Scalar::Bytes))
    }

    /// Writes a bytes field from everything `input` yields.
    ///
    /// The length prefix is only known once `input` is exhausted, so the
    /// content is buffered before it is written.
    pub fn write_bytes_from<R: Read>(&mut self, name: &str, mut input: R) -> Result<()> {
        let descriptor = self.current_descriptor(name)?;
        let field = resolve_field(&descriptor, name)?;
        self.check_field_write(field)?;
        check_kind(field, ScalarKind::Bytes)?;
        let mut content = Vec::new();
        input.read_to_end(&mut content)?;
        self.raw_output().write_bytes(field.number(), &content);
        Ok(())
    }

    /// Writes a timestamp as milliseconds since the Unix epoch to a 64-bit
    /// integer field.
    pub fn write_date(&mut self, name: &str, value: Option<SystemTime>) -> Result<()> {
        self.write_nullable_long(name, value.map(to_epoch_millis))
    }

    /// Writes a message, group or enum value.
    ///
    /// The marshaller registered for `T` must handle the type named by the
    /// field descriptor.
    pub fn write_object<T: Any>(&mut self, name: &str, value: Option<&T>) -> Result<()> {
        let descriptor = self.current_descriptor(name)?;
        let field = resolve_field(&descriptor, name)?;
        let Some(value) = value else {
            return absent(field);
        };
        self.check_field_write(field)?;
        let delegate = object_delegate::<T>(self.ctx, field)?;
        self.write_nested(field, &delegate, value)
    }

    /// Writes an enum value. The field must be declared as an enum.
    pub fn write_enum<T: Any>(&mut self, name: &str, value: Option<&T>) -> Result<()> {
        let descriptor = self.current_descriptor(name)?;
        check_enum_field(resolve_field(&descriptor, name)?)?;
        self.write_object(name, value)
    }

    /// Writes every element of `values` to a repeated field, one occurrence
    /// per element.
    ///
    /// Elements may be scalars (`i32`, `i64`, `f64`, `f32`, `bool`, `String`,
    /// `&'static str`, `Vec<u8>`) or values of a registered type. `None` is a
    /// no-op.
    pub fn write_collection<'v, T, I>(&mut self, name: &str, values: Option<I>) -> Result<()>
    where
        T: Any,
        I: IntoIterator<Item = &'v T>,
    {
        let descriptor = self.current_descriptor(name)?;
        let field = resolve_field(&descriptor, name)?;
        let Some(values) = values else {
            return Ok(());
        };
        self.check_repeated_field_write(field)?;

        match field.field_type() {
            Type::Message | Type::Group | Type::Enum => {
                let delegate = object_delegate::<T>(self.ctx, field)?;
                for value in values {
                    self.write_nested(field, &delegate, value)?;
                }
            }
            _ => {
                for value in values {
                    let scalar = Scalar::from_any(value).ok_or_else(|| {
                        ProtoStreamError::type_mismatch(
                            field.full_name(),
                            format!(
                                "declared type {} cannot hold a {}",
                                field.field_type(),
                                std::any::type_name::<T>()
                            ),
                        )
                    })?;
                    scalar.encode(self.raw_output(), field)?;
                }
            }
        }
        Ok(())
    }

    /// Writes every element of a slice to a repeated field.
    pub fn write_array<T: Any>(&mut self, name: &str, values: Option<&[T]>) -> Result<()> {
        self.write_collection(name, values.map(<[T]>::iter))
    }

    fn write_nested(
        &mut self,
        field: &FieldDescriptor,
        delegate: &MarshallerDelegate,
        value: &dyn Any,
    ) -> Result<()> {
        let number = field.number();
        match field.field_type() {
            Type::Message => {
                self.nested.push(RawProtoStreamWriter::new());
                let result = delegate.marshall(Some(field), value, self);
                let body = self.nested.pop().unwrap_or_default();
                result?;
                self.raw_output().write_bytes(number, body.as_bytes());
            }
            Type::Group => {
                self.raw_output().write_tag(number, WireType::StartGroup);
                delegate.marshall(Some(field), value, self)?;
                self.raw_output().write_tag(number, WireType::EndGroup);
            }
            _ => {
                let encoded = delegate.encode_enum(field.full_name(), value)?;
                self.raw_output().write_enum(number, encoded);
            }
        }
        Ok(())
    }
}

fn absent(field: &FieldDescriptor) -> Result<()> {
    if field.is_required() {
        Err(ProtoStreamError::required_missing(field.full_name()))
    } else {
        Ok(())
    }
}

impl std::fmt::Debug for ProtoStreamWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtoStreamWriter")
            .field("depth", &self.depth())
            .field(
                "message",
                &self.contexts.last().map(|c| c.descriptor.full_name()),
            )
            .finish()
    }
}
