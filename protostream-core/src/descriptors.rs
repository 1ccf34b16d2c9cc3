//! Read-only schema metadata consulted by the marshalling engine.
//!
//! Descriptors are normally produced by a `.proto` parser; here they are
//! assembled programmatically and validated when a message or enum
//! descriptor is built.

use std::collections::HashMap;
use std::fmt;

use crate::error::{ProtoStreamError, Result};
use crate::wire::{WireType, MAX_FIELD_NUMBER};

/// Declared type of a message field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Type {
    /// 64-bit floating point.
    Double = 1,
    /// 32-bit floating point.
    Float = 2,
    /// Signed 64-bit varint.
    Int64 = 3,
    /// Unsigned 64-bit varint.
    UInt64 = 4,
    /// Signed 32-bit varint.
    Int32 = 5,
    /// Unsigned 64-bit fixed width.
    Fixed64 = 6,
    /// Unsigned 32-bit fixed width.
    Fixed32 = 7,
    /// Boolean varint.
    Bool = 8,
    /// UTF-8 string.
    String = 9,
    /// Nested message framed by start/end group tags.
    Group = 10,
    /// Nested length-delimited message.
    Message = 11,
    /// Raw bytes.
    Bytes = 12,
    /// Unsigned 32-bit varint.
    UInt32 = 13,
    /// Enum number as varint.
    Enum = 14,
    /// Signed 32-bit fixed width.
    SFixed32 = 15,
    /// Signed 64-bit fixed width.
    SFixed64 = 16,
    /// Zig-zag encoded 32-bit varint.
    SInt32 = 17,
    /// Zig-zag encoded 64-bit varint.
    SInt64 = 18,
}

impl Type {
    /// Creates a type from its descriptor id.
    pub fn from_id(id: i32) -> Result<Self> {
        match id {
            1 => Ok(Self::Double),
            2 => Ok(Self::Float),
            3 => Ok(Self::Int64),
            4 => Ok(Self::UInt64),
            5 => Ok(Self::Int32),
            6 => Ok(Self::Fixed64),
            7 => Ok(Self::Fixed32),
            8 => Ok(Self::Bool),
            9 => Ok(Self::String),
            10 => Ok(Self::Group),
            11 => Ok(Self::Message),
            12 => Ok(Self::Bytes),
            13 => Ok(Self::UInt32),
            14 => Ok(Self::Enum),
            15 => Ok(Self::SFixed32),
            16 => Ok(Self::SFixed64),
            17 => Ok(Self::SInt32),
            18 => Ok(Self::SInt64),
            _ => Err(ProtoStreamError::InvalidDescriptor(format!(
                "unknown field type id: {}",
                id
            ))),
        }
    }

    /// Returns the descriptor id of this type.
    pub fn id(&self) -> i32 {
        *self as i32
    }

    /// Returns the wire type used to encode a single value of this type.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Int32
            | Self::Int64
            | Self::UInt32
            | Self::UInt64
            | Self::SInt32
            | Self::SInt64
            | Self::Bool
            | Self::Enum => WireType::Varint,
            Self::Fixed64 | Self::SFixed64 | Self::Double => WireType::Fixed64,
            Self::String | Self::Bytes | Self::Message => WireType::LengthDelimited,
            Self::Group => WireType::StartGroup,
            Self::Fixed32 | Self::SFixed32 | Self::Float => WireType::Fixed32,
        }
    }

    /// Returns true if repeated values of this type may be packed.
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            Self::String | Self::Bytes | Self::Message | Self::Group
        )
    }

    /// Returns true for types that hold a nested message.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::Message | Self::Group)
    }

    /// Returns the `.proto` keyword of this type.
    pub fn proto_name(&self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Int32 => "int32",
            Self::Fixed64 => "fixed64",
            Self::Fixed32 => "fixed32",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Group => "group",
            Self::Message => "message",
            Self::Bytes => "bytes",
            Self::UInt32 => "uint32",
            Self::Enum => "enum",
            Self::SFixed32 => "sfixed32",
            Self::SFixed64 => "sfixed64",
            Self::SInt32 => "sint32",
            Self::SInt64 => "sint64",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proto_name())
    }
}

/// Cardinality of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Label {
    /// Zero or one occurrence.
    #[default]
    Optional,
    /// Exactly one occurrence.
    Required,
    /// Zero or more occurrences.
    Repeated,
}

/// Definition of a single field within a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    number: u32,
    field_type: Type,
    label: Label,
    type_name: Option<String>,
    full_name: String,
}

impl FieldDescriptor {
    /// Creates an optional field of a scalar type.
    pub fn new(name: impl Into<String>, number: u32, field_type: Type) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            number,
            field_type,
            label: Label::Optional,
            type_name: None,
        }
    }

    /// Creates an optional field holding a nested message.
    pub fn message(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> Self {
        Self::new(name, number, Type::Message).with_type_name(type_name)
    }

    /// Creates an optional field holding a group.
    pub fn group(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> Self {
        Self::new(name, number, Type::Group).with_type_name(type_name)
    }

    /// Creates an optional field holding an enum.
    pub fn enumeration(
        name: impl Into<String>,
        number: u32,
        type_name: impl Into<String>,
    ) -> Self {
        Self::new(name, number, Type::Enum).with_type_name(type_name)
    }

    /// Marks this field as required.
    pub fn required(mut self) -> Self {
        self.label = Label::Required;
        self
    }

    /// Marks this field as repeated.
    pub fn repeated(mut self) -> Self {
        self.label = Label::Repeated;
        self
    }

    /// Sets the full name of the referenced message or enum type.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fully qualified name (`<message>.<field>`).
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Returns the field number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Returns the declared type.
    pub fn field_type(&self) -> Type {
        self.field_type
    }

    /// Returns the cardinality.
    pub fn label(&self) -> Label {
        self.label
    }

    /// Returns the referenced message or enum type name.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Returns true if the field is required.
    pub fn is_required(&self) -> bool {
        self.label == Label::Required
    }

    /// Returns true if the field is repeated.
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }
}

/// Schema of a message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    full_name: String,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    by_number: HashMap<u32, usize>,
}

impl MessageDescriptor {
    /// Creates a message descriptor, validating and qualifying its fields.
    pub fn new(full_name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Result<Self> {
        let full_name = full_name.into();
        if full_name.is_empty() {
            return Err(ProtoStreamError::InvalidDescriptor(
                "message name cannot be empty".to_string(),
            ));
        }

        let mut by_name = HashMap::with_capacity(fields.len());
        let mut by_number = HashMap::with_capacity(fields.len());
        let mut qualified = Vec::with_capacity(fields.len());

        for (i, mut field) in fields.into_iter().enumerate() {
            field.full_name = format!("{}.{}", full_name, field.name);
            Self::validate_field(&field)?;
            if by_name.insert(field.name.clone(), i).is_some() {
                return Err(ProtoStreamError::InvalidDescriptor(format!(
                    "duplicate field name: {}",
                    field.full_name
                )));
            }
            if by_number.insert(field.number, i).is_some() {
                return Err(ProtoStreamError::InvalidDescriptor(format!(
                    "duplicate field number {} in {}",
                    field.number, full_name
                )));
            }
            qualified.push(field);
        }

        Ok(Self {
            full_name,
            fields: qualified,
            by_name,
            by_number,
        })
    }

    fn validate_field(field: &FieldDescriptor) -> Result<()> {
        if field.number == 0 || field.number > MAX_FIELD_NUMBER {
            return Err(ProtoStreamError::InvalidDescriptor(format!(
                "field number {} out of range: {}",
                field.number, field.full_name
            )));
        }
        let needs_type_name = matches!(
            field.field_type,
            Type::Message | Type::Group | Type::Enum
        );
        if needs_type_name && field.type_name.is_none() {
            return Err(ProtoStreamError::InvalidDescriptor(format!(
                "field of type {} needs a type name: {}",
                field.field_type, field.full_name
            )));
        }
        Ok(())
    }

    /// Returns the fully qualified message name.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Returns the simple name (the part after the last dot).
    pub fn name(&self) -> &str {
        self.full_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.full_name)
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns all fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Looks up a field by number.
    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    /// Returns true if a field with the given name exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterates over the required fields.
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_required())
    }
}

/// A named value of an enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValueDescriptor {
    name: String,
    number: i32,
}

impl EnumValueDescriptor {
    /// Returns the value name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value number.
    pub fn number(&self) -> i32 {
        self.number
    }
}

/// Schema of an enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    full_name: String,
    values: Vec<EnumValueDescriptor>,
}

impl EnumDescriptor {
    /// Creates an enum descriptor from `(name, number)` pairs.
    pub fn new<N: Into<String>>(
        full_name: impl Into<String>,
        values: impl IntoIterator<Item = (N, i32)>,
    ) -> Result<Self> {
        let full_name = full_name.into();
        let values: Vec<EnumValueDescriptor> = values
            .into_iter()
            .map(|(name, number)| EnumValueDescriptor {
                name: name.into(),
                number,
            })
            .collect();
        if values.is_empty() {
            return Err(ProtoStreamError::InvalidDescriptor(format!(
                "enum {} must declare at least one value",
                full_name
            )));
        }
        for (i, value) in values.iter().enumerate() {
            if values[..i].iter().any(|v| v.name == value.name) {
                return Err(ProtoStreamError::InvalidDescriptor(format!(
                    "duplicate enum value name {} in {}",
                    value.name, full_name
                )));
            }
        }
        Ok(Self { full_name, values })
    }

    /// Returns the fully qualified enum name.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Returns all values in declaration order.
    pub fn values(&self) -> &[EnumValueDescriptor] {
        &self.values
    }

    /// Looks up a value by number. Aliases resolve to the first declaration.
    pub fn value_by_number(&self, number: i32) -> Option<&EnumValueDescriptor> {
        self.values.iter().find(|v| v.number == number)
    }

    /// Looks up a value by name.
    pub fn value_by_name(&self, name: &str) -> Option<&EnumValueDescriptor> {
        self.values.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_descriptor() -> MessageDescriptor {
        MessageDescriptor::new(
            "sample.User",
            vec![
                FieldDescriptor::new("id", 1, Type::Int32).required(),
                FieldDescriptor::new("name", 2, Type::String),
                FieldDescriptor::new("tags", 3, Type::String).repeated(),
                FieldDescriptor::message("address", 4, "sample.Address"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn type_round_trip() {
        for id in 1..=18 {
            let t = Type::from_id(id).unwrap();
            assert_eq!(t.id(), id);
        }
    }

    #[test]
    fn type_invalid_id() {
        assert!(Type::from_id(0).is_err());
        assert!(Type::from_id(19).is_err());
    }

    #[test]
    fn type_wire_types() {
        assert_eq!(Type::SInt32.wire_type(), WireType::Varint);
        assert_eq!(Type::Fixed32.wire_type(), WireType::Fixed32);
        assert_eq!(Type::Double.wire_type(), WireType::Fixed64);
        assert_eq!(Type::Message.wire_type(), WireType::LengthDelimited);
        assert_eq!(Type::Group.wire_type(), WireType::StartGroup);
    }

    #[test]
    fn field_full_names_are_qualified() {
        let desc = user_descriptor();
        assert_eq!(desc.field("id").unwrap().full_name(), "sample.User.id");
        assert_eq!(desc.name(), "User");
    }

    #[test]
    fn lookup_by_name_and_number() {
        let desc = user_descriptor();
        assert_eq!(desc.field_count(), 4);
        assert!(desc.has_field("tags"));
        assert!(!desc.has_field("unknown"));
        assert_eq!(desc.field_by_number(4).unwrap().name(), "address");
        assert_eq!(
            desc.field("address").unwrap().type_name(),
            Some("sample.Address")
        );
        assert_eq!(desc.required_fields().count(), 1);
    }

    #[test]
    fn duplicate_numbers_rejected() {
        let result = MessageDescriptor::new(
            "sample.Bad",
            vec![
                FieldDescriptor::new("a", 1, Type::Int32),
                FieldDescriptor::new("b", 1, Type::Int64),
            ],
        );
        assert!(matches!(result, Err(ProtoStreamError::InvalidDescriptor(_))));
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = MessageDescriptor::new(
            "sample.Bad",
            vec![
                FieldDescriptor::new("a", 1, Type::Int32),
                FieldDescriptor::new("a", 2, Type::Int64),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn field_number_range_checked() {
        assert!(MessageDescriptor::new(
            "sample.Bad",
            vec![FieldDescriptor::new("a", 0, Type::Int32)]
        )
        .is_err());
        assert!(MessageDescriptor::new(
            "sample.Bad",
            vec![FieldDescriptor::new("a", MAX_FIELD_NUMBER + 1, Type::Int32)]
        )
        .is_err());
    }

    #[test]
    fn message_field_needs_type_name() {
        let result = MessageDescriptor::new(
            "sample.Bad",
            vec![FieldDescriptor::new("nested", 1, Type::Message)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn enum_descriptor_lookup() {
        let desc =
            EnumDescriptor::new("sample.Color", [("RED", 0), ("GREEN", 1), ("BLUE", 2)]).unwrap();
        assert_eq!(desc.value_by_number(1).unwrap().name(), "GREEN");
        assert_eq!(desc.value_by_name("BLUE").unwrap().number(), 2);
        assert!(desc.value_by_number(7).is_none());
    }

    #[test]
    fn empty_enum_rejected() {
        let values: Vec<(&str, i32)> = Vec::new();
        assert!(EnumDescriptor::new("sample.Empty", values).is_err());
    }
}
