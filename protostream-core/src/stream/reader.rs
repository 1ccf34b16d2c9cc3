use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;

use super::{
    check_enum_field, check_kind, downcast_value, from_epoch_millis, no_message_context,
    object_delegate, resolve_field, FromScalar, ScalarKind, ScalarValue,
};
use crate::context::{AnyValue, MarshallerDelegate, SerializationContext};
use crate::descriptors::{FieldDescriptor, MessageDescriptor, Type};
use crate::error::{ProtoStreamError, Result};
use crate::wire::{
    decode_zig_zag_32, decode_zig_zag_64, tag_field_number, tag_wire_type, RawProtoStreamReader,
    WireType,
};

/// One field occurrence as found on the wire, not yet decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldValue<'a> {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    LengthDelimited(&'a [u8]),
    Group(&'a [u8]),
}

impl FieldValue<'_> {
    fn wire_type(&self) -> WireType {
        match self {
            Self::Varint(_) => WireType::Varint,
            Self::Fixed32(_) => WireType::Fixed32,
            Self::Fixed64(_) => WireType::Fixed64,
            Self::LengthDelimited(_) => WireType::LengthDelimited,
            Self::Group(_) => WireType::StartGroup,
        }
    }
}

/// Bookkeeping for one message being read.
///
/// The message body is scanned once up front; known fields are kept grouped
/// by number in wire order, unknown fields are skipped.
#[derive(Debug)]
struct ReadMessageContext<'a> {
    descriptor: Arc<MessageDescriptor>,
    fields: HashMap<u32, Vec<FieldValue<'a>>>,
    consumed: HashSet<u32>,
    max_seen: u32,
}

impl<'a> ReadMessageContext<'a> {
    fn scan(descriptor: Arc<MessageDescriptor>, input: &mut RawProtoStreamReader<'a>) -> Result<Self> {
        let mut fields: HashMap<u32, Vec<FieldValue<'a>>> = HashMap::new();
        loop {
            let tag = input.read_tag()?;
            if tag == 0 {
                break;
            }
            let number = tag_field_number(tag);
            if descriptor.field_by_number(number).is_none() {
                tracing::trace!(
                    "skipping unknown field {} in {}",
                    number,
                    descriptor.full_name()
                );
                input.skip_field(tag)?;
                continue;
            }
            let value = match tag_wire_type(tag)? {
                WireType::Varint => FieldValue::Varint(input.read_uint64()?),
                WireType::Fixed64 => FieldValue::Fixed64(input.read_fixed64()?),
                WireType::LengthDelimited => {
                    FieldValue::LengthDelimited(input.read_length_delimited()?)
                }
                WireType::StartGroup => FieldValue::Group(input.read_group_body(number)?),
                WireType::EndGroup => {
                    return Err(ProtoStreamError::malformed(format!(
                        "unexpected end group tag for field {}",
                        number
                    )))
                }
                WireType::Fixed32 => FieldValue::Fixed32(input.read_fixed32()?),
            };
            fields.entry(number).or_default().push(value);
        }
        Ok(Self {
            descriptor,
            fields,
            consumed: HashSet::new(),
            max_seen: 0,
        })
    }

    fn occurrences(&self, number: u32) -> &[FieldValue<'a>] {
        self.fields.get(&number).map_or(&[], Vec::as_slice)
    }
}

/// Reads the fields of a message by name, validating each read against the
/// message descriptor.
///
/// Fields may be read in any order. Singular reads return `Ok(None)` for an
/// absent optional field; if a singular field occurs several times the last
/// occurrence wins. Required fields are checked when the message is closed,
/// whether or not the marshaller read them.
pub struct ProtoStreamReader<'a> {
    ctx: &'a SerializationContext,
    contexts: Vec<ReadMessageContext<'a>>,
    raw_depth: usize,
}

impl<'a> ProtoStreamReader<'a> {
    pub(crate) fn new(ctx: &'a SerializationContext) -> Self {
        Self {
            ctx,
            contexts: Vec::new(),
            raw_depth: 0,
        }
    }

    /// Returns the serialization context this reader belongs to.
    pub fn serialization_context(&self) -> &'a SerializationContext {
        self.ctx
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
        input: &mut RawProtoStreamReader<'a>,
    ) -> Result<()> {
        self.check_depth()?;
        tracing::trace!(
            "reading {} for field {}",
            descriptor.full_name(),
            field.map_or("<top-level>", |f| f.full_name())
        );
        let context = ReadMessageContext::scan(descriptor, input)?;
        self.contexts.push(context);
        Ok(())
    }

    /// Closes the current message context, checking its required fields.
    pub(crate) fn pop_context(&mut self) -> Result<()> {
        let Some(context) = self.contexts.pop() else {
            return Ok(());
        };
        let missing = context
            .descriptor
            .required_fields()
            .find(|f| !context.fields.contains_key(&f.number()))
            .map(|f| f.full_name().to_string());
        match missing {
            Some(name) => Err(ProtoStreamError::required_missing(&name)),
            None => Ok(()),
        }
    }

    /// Unmarshalls a complete message body with `delegate`.
    pub(crate) fn unmarshall_detached(
        &mut self,
        delegate: &MarshallerDelegate,
        bytes: &'a [u8],
    ) -> Result<AnyValue> {
        let mut input = RawProtoStreamReader::new(bytes);
        delegate.unmarshall(None, self, &mut input)
    }

    /// Returns true if the named field occurs in the current message.
    pub fn has_field(&self, name: &str) -> bool {
        self.contexts
            .last()
            .and_then(|c| {
                c.descriptor
                    .field(name)
                    .map(|f| c.fields.contains_key(&f.number()))
            })
            .unwrap_or(false)
    }

    fn current(&self, name: &str) -> Result<&ReadMessageContext<'a>> {
        self.contexts.last().ok_or_else(|| no_message_context(name))
    }

    fn current_descriptor(&self, name: &str) -> Result<Arc<MessageDescriptor>> {
        self.current(name).map(|c| Arc::clone(&c.descriptor))
    }

    fn check_field_read(&mut self, field: &FieldDescriptor, repeated: bool) -> Result<()> {
        if field.is_repeated() != repeated {
            let message = if repeated {
                "only repeated fields can be read as a collection"
            } else {
                "repeated fields must be read with read_collection or read_array"
            };
            return Err(ProtoStreamError::wrong_cardinality(field.full_name(), message));
        }
        let log = self.ctx.config().log_out_of_sequence_reads();
        let context = self
            .contexts
            .last_mut()
            .ok_or_else(|| no_message_context(field.name()))?;
        let number = field.number();
        if !context.consumed.insert(number) {
            return Err(ProtoStreamError::DuplicateField {
                field: field.full_name().to_string(),
            });
        }
        if log && context.max_seen > number {
            tracing::warn!(
                "field {} was read out of sequence leading to sub-optimal performance",
                field.full_name()
            );
        }
        context.max_seen = context.max_seen.max(number);
        Ok(())
    }

    fn take_single(&mut self, field: &FieldDescriptor) -> Result<Option<FieldValue<'a>>> {
        self.check_field_read(field, false)?;
        let value = self
            .current(field.name())?
            .occurrences(field.number())
            .last()
            .copied();
        if value.is_none() && field.is_required() {
            return Err(ProtoStreamError::required_missing(field.full_name()));
        }
        Ok(value)
    }

    fn read_scalar<T: FromScalar>(&mut self, name: &str, kind: ScalarKind) -> Result<Option<T>> {
        let descriptor = self.current_descriptor(name)?;
        let field = resolve_field(&descriptor, name)?;
        check_kind(field, kind)?;
        let Some(raw) = self.take_single(field)? else {
            return Ok(None);
        };
        let value = decode_scalar(field, raw)?;
        T::from_scalar(value).map(Some).ok_or_else(|| {
            ProtoStreamError::type_mismatch(field.full_name(), "decoded value has the wrong kind")
        })
    }

    /// Reads an int32, uint32, sint32, fixed32 or sfixed32 field.
    pub fn read_int(&mut self, name: &str) -> Result<Option<i32>> {
        self.read_scalar(name, ScalarKind::Int)
    }

    /// Reads an int64, uint64, sint64, fixed64 or sfixed64 field.
    pub fn read_long(&mut self, name: &str) -> Result<Option<i64>> {
        self.read_scalar(name, ScalarKind::Long)
    }

    /// Reads a double field.
    pub fn read_double(&mut self, name: &str) -> Result<Option<f64>> {
        self.read_scalar(name, ScalarKind::Double)
    }

    /// Reads a float field.
    pub fn read_float(&mut self, name: &str) -> Result<Option<f32>> {
        self.read_scalar(name, ScalarKind::Float)
    }

    /// Reads a bool field.
    pub fn read_bool(&mut self, name: &str) -> Result<Option<bool>> {
        self.read_scalar(name, ScalarKind::Bool)
    }

    /// Reads a string field.
    pub fn read_string(&mut self, name: &str) -> Result<Option<String>> {
        self.read_scalar(name, ScalarKind::String)
    }

    /// Reads a bytes field.
    pub fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        self.read_scalar(name, ScalarKind::Bytes)
    }

    /// Reads a timestamp stored as milliseconds since the Unix epoch.
    pub fn read_date(&mut self, name: &str) -> Result<Option<SystemTime>> {
        let Some(millis) = self.read_long(name)? else {
            return Ok(None);
        };
        let descriptor = self.current_descriptor(name)?;
        let field = resolve_field(&descriptor, name)?;
        from_epoch_millis(field, millis).map(Some)
    }

    /// Reads a message, group or enum value.
    ///
    /// An enum number unknown to the marshaller reads as `None` and is
    /// logged.
    pub fn read_object<T: Any + Send>(&mut self, name: &str) -> Result<Option<T>> {
        let descriptor = self.current_descriptor(name)?;
        let field = resolve_field(&descriptor, name)?;
        let delegate = object_delegate::<T>(self.ctx, field)?;
        let Some(raw) = self.take_single(field)? else {
            return Ok(None);
        };
        match self.read_nested(field, &delegate, raw)? {
            Some(value) => downcast_value(field, value).map(Some),
            None => Ok(None),
        }
    }

    /// Reads an enum value. The field must be declared as an enum.
    pub fn read_enum<T: Any + Send>(&mut self, name: &str) -> Result<Option<T>> {
        let descriptor = self.current_descriptor(name)?;
        check_enum_field(resolve_field(&descriptor, name)?)?;
        self.read_object(name)
    }

    /// Reads every occurrence of a repeated field, in wire order.
    ///
    /// Packed encodings of numeric, bool and enum fields are accepted.
    /// Unknown enum numbers are skipped.
    pub fn read_collection<T: Any + Send>(&mut self, name: &str) -> Result<Vec<T>> {
        let descriptor = self.current_descriptor(name)?;
        let field = resolve_field(&descriptor, name)?;
        self.check_field_read(field, true)?;
        let occurrences = unpack(field, self.current(name)?.occurrences(field.number()))?;

        let mut values = Vec::with_capacity(occurrences.len());
        match field.field_type() {
            Type::Message | Type::Group | Type::Enum => {
                let delegate = object_delegate::<T>(self.ctx, field)?;
                for raw in occurrences {
                    if let Some(value) = self.read_nested(field, &delegate, raw)? {
                        values.push(downcast_value(field, value)?);
                    }
                }
            }
            _ => {
                for raw in occurrences {
                    values.push(downcast_value(field, decode_scalar(field, raw)?.into_any())?);
                }
            }
        }
        Ok(values)
    }

    /// Reads every occurrence of a repeated field into a boxed slice.
    pub fn read_array<T: Any + Send>(&mut self, name: &str) -> Result<Box<[T]>> {
        self.read_collection(name).map(Vec::into_boxed_slice)
    }

    fn read_nested(
        &mut self,
        field: &FieldDescriptor,
        delegate: &MarshallerDelegate,
        raw: FieldValue<'a>,
    ) -> Result<Option<AnyValue>> {
        match (field.field_type(), raw) {
            (Type::Message, FieldValue::LengthDelimited(bytes))
            | (Type::Group, FieldValue::Group(bytes)) => {
                let mut input = RawProtoStreamReader::new(bytes);
                delegate.unmarshall(Some(field), self, &mut input).map(Some)
            }
            (Type::Enum, FieldValue::Varint(v)) => {
                let number = v as i32;
                let value = delegate.decode_enum(field.full_name(), number)?;
                if value.is_none() {
                    tracing::warn!(
                        "unknown value {} for enum field {}",
                        number,
                        field.full_name()
                    );
                }
                Ok(value)
            }
            (declared, raw) => Err(wire_mismatch(field, declared, raw)),
        }
    }
}

impl std::fmt::Debug for ProtoStreamReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtoStreamReader")
            .field("depth", &self.depth())
            .field(
                "message",
                &self.contexts.last().map(|c| c.descriptor.full_name()),
            )
            .finish()
    }
}

fn wire_mismatch(field: &FieldDescriptor, declared: Type, raw: FieldValue<'_>) -> ProtoStreamError {
    ProtoStreamError::type_mismatch(
        field.full_name(),
        format!(
            "wire type {:?} does not match declared type {}",
            raw.wire_type(),
            declared
        ),
    )
}

/// Expands packed runs of a packable repeated field into single values.
fn unpack<'a>(field: &FieldDescriptor, occurrences: &[FieldValue<'a>]) -> Result<Vec<FieldValue<'a>>> {
    let field_type = field.field_type();
    let mut values = Vec::with_capacity(occurrences.len());
    for &raw in occurrences {
        match raw {
            FieldValue::LengthDelimited(bytes) if field_type.is_packable() => {
                let mut input = RawProtoStreamReader::new(bytes);
                while !input.is_at_end() {
                    values.push(match field_type.wire_type() {
                        WireType::Varint => FieldValue::Varint(input.read_uint64()?),
                        WireType::Fixed32 => FieldValue::Fixed32(input.read_fixed32()?),
                        WireType::Fixed64 => FieldValue::Fixed64(input.read_fixed64()?),
                        other => {
                            return Err(ProtoStreamError::malformed(format!(
                                "{:?} values cannot be packed",
                                other
                            )))
                        }
                    });
                }
            }
            other => values.push(other),
        }
    }
    Ok(values)
}

fn decode_scalar(field: &FieldDescriptor, raw: FieldValue<'_>) -> Result<ScalarValue> {
    let value = match (field.field_type(), raw) {
        (Type::Int32, FieldValue::Varint(v)) => ScalarValue::Int(v as i32),
        (Type::UInt32, FieldValue::Varint(v)) => ScalarValue::Int(v as u32 as i32),
        (Type::SInt32, FieldValue::Varint(v)) => ScalarValue::Int(decode_zig_zag_32(v as u32)),
        (Type::Fixed32 | Type::SFixed32, FieldValue::Fixed32(v)) => ScalarValue::Int(v as i32),
        (Type::Int64 | Type::UInt64, FieldValue::Varint(v)) => ScalarValue::Long(v as i64),
        (Type::SInt64, FieldValue::Varint(v)) => ScalarValue::Long(decode_zig_zag_64(v)),
        (Type::Fixed64 | Type::SFixed64, FieldValue::Fixed64(v)) => ScalarValue::Long(v as i64),
        (Type::Double, FieldValue::Fixed64(v)) => ScalarValue::Double(f64::from_bits(v)),
        (Type::Float, FieldValue::Fixed32(v)) => ScalarValue::Float(f32::from_bits(v)),
        (Type::Bool, FieldValue::Varint(v)) => ScalarValue::Bool(v != 0),
        (Type::String, FieldValue::LengthDelimited(bytes)) => {
            let text = std::str::from_utf8(bytes).map_err(|e| {
                ProtoStreamError::malformed(format!(
                    "invalid UTF-8 in field {}: {}",
                    field.full_name(),
                    e
                ))
            })?;
            ScalarValue::String(text.to_string())
        }
        (Type::Bytes, FieldValue::LengthDelimited(bytes)) => ScalarValue::Bytes(bytes.to_vec()),
        (declared, raw) => return Err(wire_mismatch(field, declared, raw)),
    };
    Ok(value)
}
