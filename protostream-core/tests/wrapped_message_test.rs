mod common;

use common::*;
use protostream_core::wrapped::{WRAPPED_DESCRIPTOR_FULL_NAME, WRAPPED_ENUM, WRAPPED_MESSAGE_BYTES};
use protostream_core::{
    from_bytes, from_wrapped_bytes, to_bytes, to_wrapped_bytes, Configuration, ProtoStreamError,
    RawProtoStreamReader, RawProtoStreamWriter, WrappedValue, WRAPPED_MESSAGE_TYPE_NAME,
};

fn round_trip(value: WrappedValue) -> WrappedValue {
    let ctx = domain_context();
    let bytes = to_wrapped_bytes(&ctx, &value).unwrap();
    from_wrapped_bytes(&ctx, &bytes).unwrap()
}

#[test]
fn test_null_encodes_to_empty_message() {
    let ctx = domain_context();
    let bytes = to_wrapped_bytes(&ctx, &WrappedValue::Null).unwrap();
    assert!(bytes.is_empty());
    assert!(from_wrapped_bytes(&ctx, &bytes).unwrap().is_null());
}

#[test]
fn test_string_encoding() {
    let ctx = domain_context();
    let bytes = to_wrapped_bytes(&ctx, &WrappedValue::String("hello".to_string())).unwrap();
    assert_eq!(bytes, b"\x4a\x05hello".to_vec());
}

#[test]
fn test_primitive_round_trips() {
    assert!(matches!(round_trip(WrappedValue::Double(2.5)), WrappedValue::Double(v) if v == 2.5));
    assert!(matches!(round_trip(WrappedValue::Float(-0.5)), WrappedValue::Float(v) if v == -0.5));
    assert!(matches!(round_trip(WrappedValue::Int64(-42)), WrappedValue::Int64(-42)));
    assert!(matches!(
        round_trip(WrappedValue::UInt64(u64::MAX)),
        WrappedValue::UInt64(u64::MAX)
    ));
    assert!(matches!(round_trip(WrappedValue::Int32(-1)), WrappedValue::Int32(-1)));
    assert!(matches!(round_trip(WrappedValue::Fixed64(9)), WrappedValue::Fixed64(9)));
    assert!(matches!(round_trip(WrappedValue::Fixed32(9)), WrappedValue::Fixed32(9)));
    assert!(matches!(round_trip(WrappedValue::Bool(false)), WrappedValue::Bool(false)));
    assert!(matches!(
        round_trip(WrappedValue::Bytes(vec![0, 1, 2])),
        WrappedValue::Bytes(ref b) if b == &[0, 1, 2]
    ));
    assert!(matches!(
        round_trip(WrappedValue::UInt32(u32::MAX)),
        WrappedValue::UInt32(u32::MAX)
    ));
    assert!(matches!(round_trip(WrappedValue::SFixed32(-3)), WrappedValue::SFixed32(-3)));
    assert!(matches!(round_trip(WrappedValue::SFixed64(-3)), WrappedValue::SFixed64(-3)));
    assert!(matches!(round_trip(WrappedValue::SInt32(i32::MIN)), WrappedValue::SInt32(i32::MIN)));
    assert!(matches!(round_trip(WrappedValue::SInt64(i64::MIN)), WrappedValue::SInt64(i64::MIN)));
}

#[test]
fn test_false_and_zero_are_not_null() {
    let ctx = domain_context();
    let bytes = to_wrapped_bytes(&ctx, &WrappedValue::Bool(false)).unwrap();
    assert_eq!(bytes, vec![0x40, 0x00]);
    let bytes = to_wrapped_bytes(&ctx, &WrappedValue::Int32(0)).unwrap();
    assert_eq!(bytes, vec![0x28, 0x00]);
}

#[test]
fn test_message_round_trip() {
    let ctx = domain_context();
    let wrapped = WrappedValue::message(&ctx, sample_user()).unwrap();

    let bytes = to_wrapped_bytes(&ctx, &wrapped).unwrap();
    let decoded = from_wrapped_bytes(&ctx, &bytes).unwrap();

    assert_eq!(decoded.type_name(), Some(USER));
    assert_eq!(decoded.downcast::<User>().unwrap(), sample_user());
}

#[test]
fn test_message_layout() {
    let ctx = domain_context();
    let address = sample_address(3);
    let inner = to_bytes(&ctx, &address).unwrap();
    let bytes = to_wrapped_bytes(&ctx, &WrappedValue::message(&ctx, address).unwrap()).unwrap();

    let mut input = RawProtoStreamReader::new(&bytes);
    assert_eq!(input.read_tag().unwrap() >> 3, WRAPPED_DESCRIPTOR_FULL_NAME);
    assert_eq!(input.read_string().unwrap(), ADDRESS);
    assert_eq!(input.read_tag().unwrap() >> 3, WRAPPED_MESSAGE_BYTES);
    assert_eq!(input.read_length_delimited().unwrap(), inner.as_slice());
    assert!(input.is_at_end());
}

#[test]
fn test_enum_round_trip() {
    let ctx = domain_context();
    let wrapped = WrappedValue::enumeration(&ctx, Gender::Female).unwrap();

    let bytes = to_wrapped_bytes(&ctx, &wrapped).unwrap();
    let mut input = RawProtoStreamReader::new(&bytes);
    assert_eq!(input.read_tag().unwrap() >> 3, WRAPPED_DESCRIPTOR_FULL_NAME);
    assert_eq!(input.read_string().unwrap(), GENDER);
    assert_eq!(input.read_tag().unwrap() >> 3, WRAPPED_ENUM);
    assert_eq!(input.read_enum().unwrap(), 1);

    let decoded = from_wrapped_bytes(&ctx, &bytes).unwrap();
    assert_eq!(decoded.downcast_ref::<Gender>(), Some(&Gender::Female));
}

#[test]
fn test_wrapping_checks_marshaller_kind() {
    let ctx = domain_context();
    assert!(matches!(
        WrappedValue::message(&ctx, Gender::Male),
        Err(ProtoStreamError::TypeMismatch { .. })
    ));
    assert!(matches!(
        WrappedValue::enumeration(&ctx, sample_address(1)),
        Err(ProtoStreamError::TypeMismatch { .. })
    ));
    assert!(matches!(
        WrappedValue::message(&ctx, 5u16),
        Err(ProtoStreamError::UnknownType(_))
    ));
}

#[test]
fn test_unregistered_type_name_on_read() {
    let writer_ctx = domain_context();
    let bytes = to_wrapped_bytes(
        &writer_ctx,
        &WrappedValue::message(&writer_ctx, sample_address(1)).unwrap(),
    )
    .unwrap();

    let reader_ctx =
        protostream_core::new_serialization_context(Default::default()).unwrap();
    assert!(matches!(
        from_wrapped_bytes(&reader_ctx, &bytes),
        Err(ProtoStreamError::UnknownType(ref message)) if message.contains(ADDRESS)
    ));
}

#[test]
fn test_nested_envelope() {
    let ctx = domain_context();
    let inner = WrappedValue::message(&ctx, sample_address(2)).unwrap();
    let outer = WrappedValue::message(&ctx, inner).unwrap();

    let bytes = to_wrapped_bytes(&ctx, &outer).unwrap();
    let decoded = from_wrapped_bytes(&ctx, &bytes).unwrap();

    let inner = decoded.downcast::<WrappedValue>().unwrap();
    assert_eq!(inner.downcast::<Address>().unwrap(), sample_address(2));
}

#[test]
fn test_envelope_as_message_field() {
    let ctx = domain_context();
    let holder = Holder {
        label: "boxed".to_string(),
        wrapped: WrappedValue::message(&ctx, sample_address(7)).unwrap(),
    };

    let bytes = to_bytes(&ctx, &holder).unwrap();
    let decoded: Holder = from_bytes(&ctx, &bytes).unwrap();

    assert_eq!(decoded.label, "boxed");
    assert_eq!(decoded.wrapped.downcast::<Address>().unwrap(), sample_address(7));
}

#[test]
fn test_primitive_envelope_as_message_field() {
    let ctx = domain_context();
    let holder = Holder {
        label: "count".to_string(),
        wrapped: WrappedValue::Int64(1 << 40),
    };

    let bytes = to_bytes(&ctx, &holder).unwrap();
    let decoded: Holder = from_bytes(&ctx, &bytes).unwrap();

    assert!(matches!(decoded.wrapped, WrappedValue::Int64(v) if v == 1 << 40));
}

/// Builds `levels` envelopes, each holding the next one as its message.
fn envelope_chain(levels: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    for _ in 0..levels {
        let mut out = RawProtoStreamWriter::new();
        out.write_string(WRAPPED_DESCRIPTOR_FULL_NAME, WRAPPED_MESSAGE_TYPE_NAME);
        out.write_bytes(WRAPPED_MESSAGE_BYTES, &bytes);
        bytes = out.into_bytes();
    }
    bytes
}

fn shallow_context() -> protostream_core::SerializationContext {
    domain_context_with(
        Configuration::builder()
            .max_nesting_depth(3)
            .build()
            .unwrap(),
    )
}

#[test]
fn test_nested_envelopes_respect_depth_limit_on_read() {
    let shallow = shallow_context();

    let value = from_wrapped_bytes(&shallow, &envelope_chain(3)).unwrap();
    assert_eq!(value.type_name(), Some(WRAPPED_MESSAGE_TYPE_NAME));

    assert!(matches!(
        from_wrapped_bytes(&shallow, &envelope_chain(10)),
        Err(ProtoStreamError::MaxDepthExceeded(3))
    ));
}

#[test]
fn test_deep_envelope_chain_fails_without_overflowing() {
    let ctx = domain_context();
    assert!(matches!(
        from_wrapped_bytes(&ctx, &envelope_chain(1000)),
        Err(ProtoStreamError::MaxDepthExceeded(_))
    ));
}

#[test]
fn test_nested_envelopes_respect_depth_limit_on_write() {
    let ctx = domain_context();
    let mut value = WrappedValue::Int32(1);
    for _ in 0..10 {
        value = WrappedValue::message(&ctx, value).unwrap();
    }

    let bytes = to_wrapped_bytes(&ctx, &value).unwrap();
    assert!(from_wrapped_bytes(&ctx, &bytes).is_ok());

    assert!(matches!(
        to_wrapped_bytes(&shallow_context(), &value),
        Err(ProtoStreamError::MaxDepthExceeded(3))
    ));
}
