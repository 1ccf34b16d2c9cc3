//! Common test domain and helpers for integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use protostream_core::{
    new_serialization_context, Configuration, EnumDescriptor, EnumMarshaller, FieldDescriptor,
    MessageDescriptor, MessageMarshaller, ProtoStreamReader, ProtoStreamWriter, Result,
    SerializationContext, Type, WrappedValue, WRAPPED_MESSAGE_TYPE_NAME,
};
use tracing_subscriber::fmt::MakeWriter;

pub const USER: &str = "sample_bank_account.User";
pub const ADDRESS: &str = "sample_bank_account.User.Address";
pub const GENDER: &str = "sample_bank_account.User.Gender";
pub const ACCOUNT: &str = "sample_bank_account.Account";
pub const LIMITS: &str = "sample_bank_account.Account.Limits";
pub const NODE: &str = "sample_bank_account.Node";
pub const HOLDER: &str = "sample_bank_account.Holder";

/// Installs a test log subscriber; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Log sink that keeps everything written to it in memory.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub post_code: String,
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i32,
    pub account_ids: Vec<i32>,
    pub name: String,
    pub surname: Option<String>,
    pub addresses: Vec<Address>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub notes: Option<String>,
    pub created: Option<SystemTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    pub max_daily_limit: f64,
    pub max_transaction_limit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: i32,
    pub description: Option<String>,
    pub limits: Option<Limits>,
    pub blurb: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: i32,
    pub next: Option<Box<Node>>,
}

impl Node {
    pub fn chain(length: i32) -> Node {
        let mut node = Node {
            value: length,
            next: None,
        };
        for value in (1..length).rev() {
            node = Node {
                value,
                next: Some(Box::new(node)),
            };
        }
        node
    }

    pub fn len(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |n| n.len())
    }
}

#[derive(Debug)]
pub struct Holder {
    pub label: String,
    pub wrapped: WrappedValue,
}

pub fn sample_address(number: i32) -> Address {
    Address {
        street: format!("Dark Alley {}", number),
        post_code: "1234".to_string(),
        number,
    }
}

pub fn sample_user() -> User {
    User {
        id: 1,
        account_ids: vec![1, 3],
        name: "John".to_string(),
        surname: Some("Batman".to_string()),
        addresses: vec![sample_address(1), sample_address(2)],
        age: Some(22),
        gender: Some(Gender::Male),
        notes: Some("Lorem ipsum dolor sit amet".to_string()),
        created: Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(1_400_000_000_000)),
    }
}

pub fn user_descriptor() -> MessageDescriptor {
    MessageDescriptor::new(
        USER,
        vec![
            FieldDescriptor::new("id", 1, Type::Int32).required(),
            FieldDescriptor::new("accountIds", 2, Type::Int32).repeated(),
            FieldDescriptor::new("name", 3, Type::String).required(),
            FieldDescriptor::new("surname", 4, Type::String),
            FieldDescriptor::message("addresses", 5, ADDRESS).repeated(),
            FieldDescriptor::new("age", 6, Type::Int32),
            FieldDescriptor::enumeration("gender", 7, GENDER),
            FieldDescriptor::new("notes", 8, Type::String),
            FieldDescriptor::new("creationDate", 9, Type::Fixed64),
        ],
    )
    .expect("valid user descriptor")
}

pub fn address_descriptor() -> MessageDescriptor {
    MessageDescriptor::new(
        ADDRESS,
        vec![
            FieldDescriptor::new("street", 1, Type::String).required(),
            FieldDescriptor::new("postCode", 2, Type::String).required(),
            FieldDescriptor::new("number", 3, Type::Int32).required(),
        ],
    )
    .expect("valid address descriptor")
}

pub fn gender_descriptor() -> EnumDescriptor {
    EnumDescriptor::new(GENDER, [("MALE", 0), ("FEMALE", 1)]).expect("valid gender descriptor")
}

pub fn account_descriptor() -> MessageDescriptor {
    MessageDescriptor::new(
        ACCOUNT,
        vec![
            FieldDescriptor::new("id", 1, Type::Int32).required(),
            FieldDescriptor::new("description", 2, Type::String),
            FieldDescriptor::group("limits", 3, LIMITS),
            FieldDescriptor::new("blurb", 4, Type::Bytes).repeated(),
        ],
    )
    .expect("valid account descriptor")
}

pub fn limits_descriptor() -> MessageDescriptor {
    MessageDescriptor::new(
        LIMITS,
        vec![
            FieldDescriptor::new("maxDailyLimit", 1, Type::Double).required(),
            FieldDescriptor::new("maxTransactionLimit", 2, Type::Double),
        ],
    )
    .expect("valid limits descriptor")
}

pub fn node_descriptor() -> MessageDescriptor {
    MessageDescriptor::new(
        NODE,
        vec![
            FieldDescriptor::new("value", 1, Type::Int32).required(),
            FieldDescriptor::message("next", 2, NODE),
        ],
    )
    .expect("valid node descriptor")
}

pub fn holder_descriptor() -> MessageDescriptor {
    MessageDescriptor::new(
        HOLDER,
        vec![
            FieldDescriptor::new("label", 1, Type::String),
            FieldDescriptor::message("wrapped", 2, WRAPPED_MESSAGE_TYPE_NAME),
        ],
    )
    .expect("valid holder descriptor")
}

pub struct UserMarshaller;

impl MessageMarshaller for UserMarshaller {
    type Target = User;

    fn type_name(&self) -> &str {
        USER
    }

    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, user: &User) -> Result<()> {
        writer.write_int("id", user.id)?;
        writer.write_collection("accountIds", Some(&user.account_ids))?;
        writer.write_string("name", Some(user.name.as_str()))?;
        writer.write_string("surname", user.surname.as_deref())?;
        writer.write_collection("addresses", Some(&user.addresses))?;
        writer.write_nullable_int("age", user.age)?;
        writer.write_enum("gender", user.gender.as_ref())?;
        writer.write_string("notes", user.notes.as_deref())?;
        writer.write_date("creationDate", user.created)
    }

    fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<User> {
        Ok(User {
            id: reader.read_int("id")?.unwrap_or_default(),
            account_ids: reader.read_collection("accountIds")?,
            name: reader.read_string("name")?.unwrap_or_default(),
            surname: reader.read_string("surname")?,
            addresses: reader.read_collection("addresses")?,
            age: reader.read_int("age")?,
            gender: reader.read_enum("gender")?,
            notes: reader.read_string("notes")?,
            created: reader.read_date("creationDate")?,
        })
    }
}

pub struct AddressMarshaller;

impl MessageMarshaller for AddressMarshaller {
    type Target = Address;

    fn type_name(&self) -> &str {
        ADDRESS
    }

    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, address: &Address) -> Result<()> {
        writer.write_string("street", Some(address.street.as_str()))?;
        writer.write_string("postCode", Some(address.post_code.as_str()))?;
        writer.write_int("number", address.number)
    }

    fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<Address> {
        Ok(Address {
            street: reader.read_string("street")?.unwrap_or_default(),
            post_code: reader.read_string("postCode")?.unwrap_or_default(),
            number: reader.read_int("number")?.unwrap_or_default(),
        })
    }
}

pub struct GenderMarshaller;

impl EnumMarshaller for GenderMarshaller {
    type Target = Gender;

    fn type_name(&self) -> &str {
        GENDER
    }

    fn encode(&self, value: &Gender) -> i32 {
        match value {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }

    fn decode(&self, number: i32) -> Option<Gender> {
        match number {
            0 => Some(Gender::Male),
            1 => Some(Gender::Female),
            _ => None,
        }
    }
}

pub struct AccountMarshaller;

impl MessageMarshaller for AccountMarshaller {
    type Target = Account;

    fn type_name(&self) -> &str {
        ACCOUNT
    }

    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, account: &Account) -> Result<()> {
        writer.write_int("id", account.id)?;
        writer.write_string("description", account.description.as_deref())?;
        writer.write_object("limits", account.limits.as_ref())?;
        writer.write_collection("blurb", Some(&account.blurb))
    }

    fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<Account> {
        Ok(Account {
            id: reader.read_int("id")?.unwrap_or_default(),
            description: reader.read_string("description")?,
            limits: reader.read_object("limits")?,
            blurb: reader.read_collection("blurb")?,
        })
    }
}

pub struct LimitsMarshaller;

impl MessageMarshaller for LimitsMarshaller {
    type Target = Limits;

    fn type_name(&self) -> &str {
        LIMITS
    }

    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, limits: &Limits) -> Result<()> {
        writer.write_double("maxDailyLimit", limits.max_daily_limit)?;
        writer.write_nullable_double("maxTransactionLimit", limits.max_transaction_limit)
    }

    fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<Limits> {
        Ok(Limits {
            max_daily_limit: reader.read_double("maxDailyLimit")?.unwrap_or_default(),
            max_transaction_limit: reader.read_double("maxTransactionLimit")?,
        })
    }
}

pub struct NodeMarshaller;

impl MessageMarshaller for NodeMarshaller {
    type Target = Node;

    fn type_name(&self) -> &str {
        NODE
    }

    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, node: &Node) -> Result<()> {
        writer.write_int("value", node.value)?;
        writer.write_object("next", node.next.as_deref())
    }

    fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<Node> {
        Ok(Node {
            value: reader.read_int("value")?.unwrap_or_default(),
            next: reader.read_object::<Node>("next")?.map(Box::new),
        })
    }
}

pub struct HolderMarshaller;

impl MessageMarshaller for HolderMarshaller {
    type Target = Holder;

    fn type_name(&self) -> &str {
        HOLDER
    }

    fn write_to(&self, writer: &mut ProtoStreamWriter<'_>, holder: &Holder) -> Result<()> {
        writer.write_string("label", Some(holder.label.as_str()))?;
        writer.write_object("wrapped", Some(&holder.wrapped))
    }

    fn read_from(&self, reader: &mut ProtoStreamReader<'_>) -> Result<Holder> {
        Ok(Holder {
            label: reader.read_string("label")?.unwrap_or_default(),
            wrapped: reader
                .read_object("wrapped")?
                .unwrap_or(WrappedValue::Null),
        })
    }
}

/// Registers every descriptor and marshaller of the test domain.
pub fn register_domain(ctx: &SerializationContext) {
    ctx.register_message_descriptor(user_descriptor());
    ctx.register_message_descriptor(address_descriptor());
    ctx.register_enum_descriptor(gender_descriptor());
    ctx.register_message_descriptor(account_descriptor());
    ctx.register_message_descriptor(limits_descriptor());
    ctx.register_message_descriptor(node_descriptor());
    ctx.register_message_descriptor(holder_descriptor());

    ctx.register_marshaller(UserMarshaller).expect("register user");
    ctx.register_marshaller(AddressMarshaller).expect("register address");
    ctx.register_enum_marshaller(GenderMarshaller).expect("register gender");
    ctx.register_marshaller(AccountMarshaller).expect("register account");
    ctx.register_marshaller(LimitsMarshaller).expect("register limits");
    ctx.register_marshaller(NodeMarshaller).expect("register node");
    ctx.register_marshaller(HolderMarshaller).expect("register holder");
}

pub fn domain_context_with(config: Configuration) -> SerializationContext {
    init_tracing();
    let ctx = new_serialization_context(config).expect("failed to create context");
    register_domain(&ctx);
    ctx
}

pub fn domain_context() -> SerializationContext {
    domain_context_with(Configuration::default())
}
