//! Top-level entry points for marshalling whole values.
//!
//! Top-level messages are written without a length prefix, so a buffer holds
//! exactly one value and reading consumes the whole input (or the whole
//! requested range). Bytes outside an explicit range are never examined.

use std::any::Any;
use std::io::{Read, Write};

use crate::config::Configuration;
use crate::context::SerializationContext;
use crate::error::{ProtoStreamError, Result};
use crate::stream::{ProtoStreamReader, ProtoStreamWriter};
use crate::wire::RawProtoStreamReader;
use crate::wrapped::{wrapped_message_descriptor, WrappedMessageMarshaller, WrappedValue};

/// Creates a serialization context with the `WrappedMessage` envelope
/// already registered.
pub fn new_serialization_context(config: Configuration) -> Result<SerializationContext> {
    let ctx = SerializationContext::new(config);
    ctx.register_message_descriptor(wrapped_message_descriptor()?);
    ctx.register_raw_marshaller(WrappedMessageMarshaller);
    Ok(ctx)
}

/// Marshalls a value into a new byte vector.
pub fn to_bytes<T: Any>(ctx: &SerializationContext, value: &T) -> Result<Vec<u8>> {
    let delegate = ctx.lookup::<T>()?;
    let mut writer = ProtoStreamWriter::new(ctx);
    delegate.marshall(None, value, &mut writer)?;
    Ok(writer.into_output().into_bytes())
}

/// Marshalls a value and writes the bytes to `out`.
pub fn write_to<T: Any, W: Write>(ctx: &SerializationContext, mut out: W, value: &T) -> Result<()> {
    let bytes = to_bytes(ctx, value)?;
    out.write_all(&bytes)?;
    out.flush()?;
    Ok(())
}

/// Unmarshalls a value from a complete buffer.
pub fn from_bytes<T: Any + Send>(ctx: &SerializationContext, bytes: &[u8]) -> Result<T> {
    unmarshall(ctx, RawProtoStreamReader::new(bytes))
}

/// Unmarshalls a value from `length` bytes starting at `offset`.
pub fn from_bytes_range<T: Any + Send>(
    ctx: &SerializationContext,
    bytes: &[u8],
    offset: usize,
    length: usize,
) -> Result<T> {
    unmarshall(ctx, RawProtoStreamReader::from_range(bytes, offset, length)?)
}

/// Reads `input` to the end and unmarshalls a value from it.
pub fn read_from<T: Any + Send, R: Read>(ctx: &SerializationContext, mut input: R) -> Result<T> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    from_bytes(ctx, &bytes)
}

/// Marshalls a value inside the `WrappedMessage` envelope.
pub fn to_wrapped_bytes(ctx: &SerializationContext, value: &WrappedValue) -> Result<Vec<u8>> {
    to_bytes(ctx, value)
}

/// Unmarshalls a `WrappedMessage` envelope.
pub fn from_wrapped_bytes(ctx: &SerializationContext, bytes: &[u8]) -> Result<WrappedValue> {
    from_bytes(ctx, bytes)
}

/// Unmarshalls a `WrappedMessage` envelope from `length` bytes starting at
/// `offset`.
pub fn from_wrapped_bytes_range(
    ctx: &SerializationContext,
    bytes: &[u8],
    offset: usize,
    length: usize,
) -> Result<WrappedValue> {
    from_bytes_range(ctx, bytes, offset, length)
}

fn unmarshall<'a, T: Any + Send>(
    ctx: &'a SerializationContext,
    mut input: RawProtoStreamReader<'a>,
) -> Result<T> {
    let delegate = ctx.lookup::<T>()?;
    let mut reader = ProtoStreamReader::new(ctx);
    let value = delegate.unmarshall(None, &mut reader, &mut input)?;
    value.downcast::<T>().map(|v| *v).map_err(|_| {
        ProtoStreamError::type_mismatch(
            delegate.type_name(),
            format!("marshaller did not produce a {}", std::any::type_name::<T>()),
        )
    })
}
