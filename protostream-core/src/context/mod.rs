//! The serialization context: descriptor and marshaller registry.

mod delegate;

pub use delegate::MarshallerDelegate;
pub(crate) use delegate::AnyValue;

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Configuration;
use crate::descriptors::{EnumDescriptor, MessageDescriptor};
use crate::error::{ProtoStreamError, Result};
use crate::marshaller::{EnumMarshaller, MessageMarshaller, RawProtobufMarshaller};

#[derive(Default)]
struct DescriptorRegistry {
    messages: HashMap<String, Arc<MessageDescriptor>>,
    enums: HashMap<String, Arc<EnumDescriptor>>,
}

#[derive(Default)]
struct MarshallerRegistry {
    by_type: HashMap<TypeId, Arc<MarshallerDelegate>>,
    by_name: HashMap<String, Arc<MarshallerDelegate>>,
}

impl MarshallerRegistry {
    fn insert(&mut self, delegate: MarshallerDelegate) {
        let delegate = Arc::new(delegate);
        if let Some(previous) = self
            .by_type
            .insert(delegate.target_type(), Arc::clone(&delegate))
        {
            if previous.type_name() != delegate.type_name() {
                self.by_name.remove(previous.type_name());
            }
            tracing::debug!(
                "replacing marshaller for {} ({})",
                delegate.target_type_name(),
                previous.type_name()
            );
        }
        if let Some(previous) = self
            .by_name
            .insert(delegate.type_name().to_string(), Arc::clone(&delegate))
        {
            if previous.target_type() != delegate.target_type() {
                self.by_type.remove(&previous.target_type());
            }
        }
    }

    fn remove(&mut self, type_name: &str) -> Option<Arc<MarshallerDelegate>> {
        let removed = self.by_name.remove(type_name)?;
        self.by_type.remove(&removed.target_type());
        Some(removed)
    }
}

/// Registry of schema descriptors and marshallers.
///
/// A context is safe to share between threads; registration takes a write
/// lock while marshalling calls only take short read locks for lookups.
/// Registering a marshaller for a type or type name that already has one
/// replaces the previous entry.
pub struct SerializationContext {
    config: Configuration,
    descriptors: RwLock<DescriptorRegistry>,
    marshallers: RwLock<MarshallerRegistry>,
}

impl SerializationContext {
    /// Creates an empty context.
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            descriptors: RwLock::new(DescriptorRegistry::default()),
            marshallers: RwLock::new(MarshallerRegistry::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Registers a message descriptor, replacing any with the same name.
    ///
    /// Marshallers already registered keep the descriptor they were bound to.
    pub fn register_message_descriptor(&self, descriptor: MessageDescriptor) {
        tracing::debug!("registering message type {}", descriptor.full_name());
        self.descriptors
            .write()
            .messages
            .insert(descriptor.full_name().to_string(), Arc::new(descriptor));
    }

    /// Registers an enum descriptor, replacing any with the same name.
    pub fn register_enum_descriptor(&self, descriptor: EnumDescriptor) {
        tracing::debug!("registering enum type {}", descriptor.full_name());
        self.descriptors
            .write()
            .enums
            .insert(descriptor.full_name().to_string(), Arc::new(descriptor));
    }

    /// Looks up a message descriptor by full name.
    pub fn message_descriptor(&self, full_name: &str) -> Result<Arc<MessageDescriptor>> {
        self.descriptors
            .read()
            .messages
            .get(full_name)
            .cloned()
            .ok_or_else(|| ProtoStreamError::UnknownType(format!("message type {}", full_name)))
    }

    /// Looks up an enum descriptor by full name.
    pub fn enum_descriptor(&self, full_name: &str) -> Result<Arc<EnumDescriptor>> {
        self.descriptors
            .read()
            .enums
            .get(full_name)
            .cloned()
            .ok_or_else(|| ProtoStreamError::UnknownType(format!("enum type {}", full_name)))
    }

    /// Registers a message marshaller.
    ///
    /// The message descriptor named by the marshaller must already be
    /// registered.
    pub fn register_marshaller<M: MessageMarshaller>(&self, marshaller: M) -> Result<()> {
        let descriptor = self.message_descriptor(marshaller.type_name())?;
        tracing::debug!(
            "registering marshaller for {} as {}",
            type_name::<M::Target>(),
            descriptor.full_name()
        );
        self.marshallers
            .write()
            .insert(MarshallerDelegate::message(marshaller, descriptor));
        Ok(())
    }

    /// Registers an enum marshaller.
    ///
    /// The enum descriptor named by the marshaller must already be registered.
    pub fn register_enum_marshaller<M: EnumMarshaller>(&self, marshaller: M) -> Result<()> {
        let descriptor = self.enum_descriptor(marshaller.type_name())?;
        tracing::debug!(
            "registering enum marshaller for {} as {}",
            type_name::<M::Target>(),
            descriptor.full_name()
        );
        self.marshallers
            .write()
            .insert(MarshallerDelegate::enumeration(marshaller, descriptor));
        Ok(())
    }

    /// Registers a raw marshaller. No descriptor is required.
    pub fn register_raw_marshaller<M: RawProtobufMarshaller>(&self, marshaller: M) {
        tracing::debug!(
            "registering raw marshaller for {} as {}",
            type_name::<M::Target>(),
            marshaller.type_name()
        );
        self.marshallers.write().insert(MarshallerDelegate::raw(marshaller));
    }

    /// Removes the marshaller registered for a schema type name.
    ///
    /// Returns true if a marshaller was removed.
    pub fn unregister_marshaller(&self, type_name: &str) -> bool {
        let removed = self.marshallers.write().remove(type_name);
        if removed.is_some() {
            tracing::debug!("unregistered marshaller for {}", type_name);
        }
        removed.is_some()
    }

    /// Returns true if a marshaller is registered for `T`.
    pub fn can_marshall<T: Any>(&self) -> bool {
        self.marshallers
            .read()
            .by_type
            .contains_key(&TypeId::of::<T>())
    }

    /// Returns true if a marshaller is registered for the schema type name.
    pub fn can_marshall_name(&self, type_name: &str) -> bool {
        self.marshallers.read().by_name.contains_key(type_name)
    }

    /// Returns the marshaller registered for `T`.
    pub fn lookup<T: Any>(&self) -> Result<Arc<MarshallerDelegate>> {
        self.marshallers
            .read()
            .by_type
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| {
                ProtoStreamError::UnknownType(format!(
                    "no marshaller registered for {}",
                    type_name::<T>()
                ))
            })
    }

    /// Returns the marshaller registered for a `TypeId`.
    pub fn lookup_type(&self, type_id: TypeId) -> Result<Arc<MarshallerDelegate>> {
        self.marshallers
            .read()
            .by_type
            .get(&type_id)
            .cloned()
            .ok_or_else(|| {
                ProtoStreamError::UnknownType(format!(
                    "no marshaller registered for {:?}",
                    type_id
                ))
            })
    }

    /// Returns the marshaller registered for a schema type name.
    pub fn lookup_by_name(&self, type_name: &str) -> Result<Arc<MarshallerDelegate>> {
        self.marshallers
            .read()
            .by_name
            .get(type_name)
            .cloned()
            .ok_or_else(|| {
                ProtoStreamError::UnknownType(format!(
                    "no marshaller registered for {}",
                    type_name
                ))
            })
    }
}

impl Default for SerializationContext {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl std::fmt::Debug for SerializationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let descriptors = self.descriptors.read();
        f.debug_struct("SerializationContext")
            .field("config", &self.config)
            .field("message_types", &descriptors.messages.len())
            .field("enum_types", &descriptors.enums.len())
            .field("marshallers", &self.marshallers.read().by_name.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{FieldDescriptor, Type};
    use crate::stream::{ProtoStreamReader, ProtoStreamWriter};

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
    }

    struct PointMarshaller(&'static str);

    impl MessageMarshaller for PointMarshaller {
        type Target = Point;

        fn type_name(&self) -> &str {
            self.0
        }

        fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, value: &Point) -> Result<()> {
            writer.write_int("x", value.x)
        }

        fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<Point> {
            Ok(Point {
                x: reader.read_int("x")?.unwrap_or_default(),
            })
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Color {
        Red,
    }

    struct ColorMarshaller;

    impl EnumMarshaller for ColorMarshaller {
        type Target = Color;

        fn type_name(&self) -> &str {
            "sample.Color"
        }

        fn encode(&self, _value: &Color) -> i32 {
            0
        }

        fn decode(&self, number: i32) -> Option<Color> {
            (number == 0).then_some(Color::Red)
        }
    }

    fn context() -> SerializationContext {
        let ctx = SerializationContext::default();
        for name in ["sample.Point", "sample.Point2"] {
            ctx.register_message_descriptor(
                MessageDescriptor::new(name, vec![FieldDescriptor::new("x", 1, Type::Int32)])
                    .unwrap(),
            );
        }
        ctx
    }

    #[test]
    fn test_register_requires_descriptor() {
        let ctx = SerializationContext::default();
        let result = ctx.register_marshaller(PointMarshaller("sample.Point"));
        assert!(matches!(result, Err(ProtoStreamError::UnknownType(_))));
        assert!(!ctx.can_marshall::<Point>());
    }

    #[test]
    fn test_lookup_by_type_and_name() {
        let ctx = context();
        ctx.register_marshaller(PointMarshaller("sample.Point")).unwrap();

        assert!(ctx.can_marshall::<Point>());
        assert!(ctx.can_marshall_name("sample.Point"));
        let delegate = ctx.lookup::<Point>().unwrap();
        assert_eq!(delegate.type_name(), "sample.Point");
        assert!(delegate.is_message());
        assert_eq!(
            delegate.message_descriptor().unwrap().full_name(),
            "sample.Point"
        );
        assert_eq!(
            ctx.lookup_type(TypeId::of::<Point>()).unwrap().type_name(),
            "sample.Point"
        );
        assert_eq!(
            ctx.lookup_by_name("sample.Point").unwrap().target_type(),
            TypeId::of::<Point>()
        );
    }

    #[test]
    fn test_lookup_unknown_type() {
        let ctx = context();
        assert!(matches!(
            ctx.lookup::<String>(),
            Err(ProtoStreamError::UnknownType(_))
        ));
        assert!(ctx.lookup_by_name("sample.Nope").is_err());
    }

    #[test]
    fn test_reregistration_replaces_both_mappings() {
        let ctx = context();
        ctx.register_marshaller(PointMarshaller("sample.Point")).unwrap();
        ctx.register_marshaller(PointMarshaller("sample.Point2")).unwrap();

        assert_eq!(ctx.lookup::<Point>().unwrap().type_name(), "sample.Point2");
        assert!(!ctx.can_marshall_name("sample.Point"));
        assert!(ctx.can_marshall_name("sample.Point2"));
    }

    #[test]
    fn test_unregister() {
        let ctx = context();
        ctx.register_marshaller(PointMarshaller("sample.Point")).unwrap();
        assert!(ctx.unregister_marshaller("sample.Point"));
        assert!(!ctx.unregister_marshaller("sample.Point"));
        assert!(!ctx.can_marshall::<Point>());
    }

    #[test]
    fn test_enum_marshaller_registration() {
        let ctx = SerializationContext::default();
        assert!(ctx.register_enum_marshaller(ColorMarshaller).is_err());

        ctx.register_enum_descriptor(EnumDescriptor::new("sample.Color", [("RED", 0)]).unwrap());
        ctx.register_enum_marshaller(ColorMarshaller).unwrap();

        let delegate = ctx.lookup::<Color>().unwrap();
        assert!(delegate.is_enum());
        assert!(delegate.enum_descriptor().is_some());
        let decoded = delegate.decode_enum("f", 0).unwrap().unwrap();
        assert_eq!(*decoded.downcast::<Color>().unwrap(), Color::Red);
        assert!(delegate.decode_enum("f", 9).unwrap().is_none());
        assert_eq!(delegate.encode_enum("f", &Color::Red).unwrap(), 0);
    }

    #[test]
    fn test_encode_enum_rejects_wrong_value_type() {
        let ctx = SerializationContext::default();
        ctx.register_enum_descriptor(EnumDescriptor::new("sample.Color", [("RED", 0)]).unwrap());
        ctx.register_enum_marshaller(ColorMarshaller).unwrap();
        let delegate = ctx.lookup::<Color>().unwrap();
        assert!(matches!(
            delegate.encode_enum("f", &42i32),
            Err(ProtoStreamError::TypeMismatch { .. })
        ));
    }
}
