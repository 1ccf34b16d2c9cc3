#![no_main]

use libfuzzer_sys::fuzz_target;

use protostream_core::{
    from_bytes, new_serialization_context, Configuration, FieldDescriptor, MessageDescriptor,
    MessageMarshaller, ProtoStreamReader, ProtoStreamWriter, Result, Type,
};

struct Record {
    id: Option<i64>,
    name: Option<String>,
    scores: Vec<i32>,
    child: Option<Box<Record>>,
}

struct RecordMarshaller;

impl MessageMarshaller for RecordMarshaller {
    type Target = Record;

    fn type_name(&self) -> &str {
        "fuzz.Record"
    }

    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, record: &Record) -> Result<()> {
        writer.write_nullable_long("id", record.id)?;
        writer.write_string("name", record.name.as_deref())?;
        writer.write_collection("scores", Some(&record.scores))?;
        writer.write_object("child", record.child.as_deref())
    }

    fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<Record> {
        Ok(Record {
            id: reader.read_long("id")?,
            name: reader.read_string("name")?,
            scores: reader.read_collection("scores")?,
            child: reader.read_object::<Record>("child")?.map(Box::new),
        })
    }
}

fuzz_target!(|data: &[u8]| {
    let config = match Configuration::builder().max_nesting_depth(16).build() {
        Ok(config) => config,
        Err(_) => return,
    };
    let Ok(ctx) = new_serialization_context(config) else {
        return;
    };
    let Ok(descriptor) = MessageDescriptor::new(
        "fuzz.Record",
        vec![
            FieldDescriptor::new("id", 1, Type::SInt64),
            FieldDescriptor::new("name", 2, Type::String),
            FieldDescriptor::new("scores", 3, Type::Int32).repeated(),
            FieldDescriptor::message("child", 4, "fuzz.Record"),
        ],
    ) else {
        return;
    };
    ctx.register_message_descriptor(descriptor);
    if ctx.register_marshaller(RecordMarshaller).is_err() {
        return;
    }

    let _ = from_bytes::<Record>(&ctx, data);
});
