#![no_main]

use libfuzzer_sys::fuzz_target;

use protostream_core::{from_wrapped_bytes, new_serialization_context, Configuration};

fuzz_target!(|data: &[u8]| {
    let Ok(ctx) = new_serialization_context(Configuration::default()) else {
        return;
    };
    if let Ok(value) = from_wrapped_bytes(&ctx, data) {
        let _ = value.is_null();
        let _ = value.type_name();
    }
});
