//! Schema-driven Protocol Buffers marshalling.
//!
//! Application types are bound to message and enum descriptors through
//! marshallers registered in a [`SerializationContext`]. Marshallers read and
//! write fields by name; the engine validates every access against the schema
//! and produces standard protobuf wire format.
//!
//! ```ignore
//! let ctx = protostream_core::new_serialization_context(Configuration::default())?;
//! ctx.register_message_descriptor(user_descriptor);
//! ctx.register_marshaller(UserMarshaller)?;
//!
//! let bytes = protostream_core::to_bytes(&ctx, &user)?;
//! let back: User = protostream_core::from_bytes(&ctx, &bytes)?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod config_file;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod marshaller;
pub mod stream;
pub mod util;
pub mod wire;
pub mod wrapped;

pub use config::{ConfigError, Configuration, ConfigurationBuilder};
pub use config_file::FileConfiguration;
pub use context::{MarshallerDelegate, SerializationContext};
pub use descriptors::{
    EnumDescriptor, EnumValueDescriptor, FieldDescriptor, Label, MessageDescriptor, Type,
};
pub use error::{ProtoStreamError, Result};
pub use marshaller::{EnumMarshaller, MessageMarshaller, RawProtobufMarshaller};
pub use stream::{ProtoStreamReader, ProtoStreamWriter};
pub use util::{
    from_bytes, from_bytes_range, from_wrapped_bytes, from_wrapped_bytes_range,
    new_serialization_context, read_from, to_bytes, to_wrapped_bytes, write_to,
};
pub use wire::{RawProtoStreamReader, RawProtoStreamWriter, WireType};
pub use wrapped::{WrappedMessageMarshaller, WrappedValue, WRAPPED_MESSAGE_TYPE_NAME};
