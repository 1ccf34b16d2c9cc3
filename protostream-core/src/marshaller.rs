//! Traits implemented by application code to bind a Rust type to a schema.
//!
//! A marshaller is registered once in a
//! [`SerializationContext`](crate::SerializationContext) and shared by every
//! marshalling call; it must not keep per-call state. Three flavours exist:
//!
//! - [`MessageMarshaller`] drives a field-by-field traversal through a
//!   validating [`ProtoStreamWriter`] / [`ProtoStreamReader`].
//! - [`EnumMarshaller`] maps enum values to and from their wire numbers.
//! - [`RawProtobufMarshaller`] takes over the raw stream for custom encodings.

use crate::error::Result;
use crate::stream::{ProtoStreamReader, ProtoStreamWriter};
use crate::wire::RawProtoStreamReader;

/// Schema-driven marshaller for a message type.
///
/// # Example
///
/// ```ignore
/// struct UserMarshaller;
///
/// impl MessageMarshaller for UserMarshaller {
///     type Target = User;
///
///     fn type_name(&self) -> &str {
///         "sample.User"
///     }
///
///     fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, user: &User) -> Result<()> {
///         writer.write_int("id", user.id)?;
///         writer.write_string("name", user.name.as_deref())
///     }
///
///     fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<User> {
///         Ok(User {
///             id: reader.read_int("id")?.unwrap_or_default(),
///             name: reader.read_string("name")?,
///         })
///     }
/// }
/// ```
pub trait MessageMarshaller: Send + Sync + 'static {
    /// The Rust type this marshaller handles.
    type Target: Send + 'static;

    /// Returns the fully qualified name of the message type.
    fn type_name(&self) -> &str;

    /// Writes the fields of `value`.
    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, value: &Self::Target) -> Result<()>;

    /// Reads the fields of a value.
    fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<Self::Target>;
}

/// Marshaller for an enum type.
pub trait EnumMarshaller: Send + Sync + 'static {
    /// The Rust type this marshaller handles.
    type Target: Send + 'static;

    /// Returns the fully qualified name of the enum type.
    fn type_name(&self) -> &str;

    /// Returns the wire number of `value`.
    fn encode(&self, value: &Self::Target) -> i32;

    /// Returns the value for a wire number, or `None` if it is unknown.
    fn decode(&self, number: i32) -> Option<Self::Target>;
}

/// Marshaller that reads and writes the raw stream directly.
///
/// Writes go to [`ProtoStreamWriter::raw_output`]; reads consume `input`,
/// which is bounded to the value being decoded.
pub trait RawProtobufMarshaller: Send + Sync + 'static {
    /// The Rust type this marshaller handles.
    type Target: Send + 'static;

    /// Returns the fully qualified name of the type.
    fn type_name(&self) -> &str;

    /// Encodes `value`.
    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, value: &Self::Target) -> Result<()>;

    /// Decodes a value from `input`.
    fn read_from<'a>(
        &self,
        reader: &mut ProtoStreamReader<'a>,
        input: &mut RawProtoStreamReader<'a>,
    ) -> Result<Self::Target>;
}
