#![no_main]

use libfuzzer_sys::fuzz_target;

use protostream_core::RawProtoStreamReader;

fuzz_target!(|data: &[u8]| {
    let mut input = RawProtoStreamReader::new(data);

    while let Ok(tag) = input.read_tag() {
        if tag == 0 {
            break;
        }
        if input.skip_field(tag).is_err() {
            break;
        }
    }
});
