//! Descriptor fixtures for tests.
//!
//! Custom options only survive when descriptors are decoded from bytes, so
//! schema files are framed by hand: the plain parts are encoded with
//! `prost_types`, option payloads and nested messages are appended as raw
//! length-delimited fields.

use crate::registry::PoolRegistry;
use crate::wire::put_len_field;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, Value};
use prost_types::descriptor_proto::ExtensionRange;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions, OneofDescriptorProto,
};
use std::sync::OnceLock;

pub(crate) const DATA_EXT: u32 = 50000;
pub(crate) const WRAPPER_EXT: u32 = 50001;

const DESCRIPTOR_FILE: &str = "google/protobuf/descriptor.proto";
const OPTIONS_FILE: &str = "options.proto";
const MESSAGE_OPTIONS: &str = ".google.protobuf.MessageOptions";
const FIELD_OPTIONS: &str = ".google.protobuf.FieldOptions";

/// A message definition in a schema file
pub(crate) struct Msg {
    name: String,
    nested: Vec<Msg>,
    options: Vec<u8>,
}

impl Msg {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nested: Vec::new(),
            options: Vec::new(),
        }
    }

    pub(crate) fn nested(mut self, message: Msg) -> Self {
        self.nested.push(message);
        self
    }

    /// Sets `(tpl.data)` on this message
    pub(crate) fn data(self, data: &DynamicMessage) -> Self {
        self.option(DATA_EXT, data)
    }

    /// Sets the extension `number` to the encoded `value`
    pub(crate) fn option(mut self, number: u32, value: &DynamicMessage) -> Self {
        put_len_field(number, &value.encode_to_vec(), &mut self.options);
        self
    }

    /// Appends raw bytes to the encoded `MessageOptions`
    pub(crate) fn raw_options(mut self, bytes: &[u8]) -> Self {
        self.options.extend_from_slice(bytes);
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = DescriptorProto {
            name: Some(self.name.clone()),
            ..Default::default()
        }
        .encode_to_vec();
        for nested in &self.nested {
            put_len_field(3, &nested.encode(), &mut buf);
        }
        if !self.options.is_empty() {
            put_len_field(7, &self.options, &mut buf);
        }
        buf
    }
}

/// A schema file in package `corpus`
pub(crate) struct SchemaFile {
    name: String,
    messages: Vec<Msg>,
}

impl SchemaFile {
    pub(crate) fn new(name: &str, messages: Vec<Msg>) -> Self {
        Self {
            name: name.to_string(),
            messages,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = FileDescriptorProto {
            name: Some(self.name.clone()),
            package: Some("corpus".to_string()),
            dependency: vec![OPTIONS_FILE.to_string()],
            ..Default::default()
        }
        .encode_to_vec();
        for message in &self.messages {
            put_len_field(4, &message.encode(), &mut buf);
        }
        buf
    }
}

/// Encoded `FileDescriptorSet` with the base files plus `files`
pub(crate) fn descriptor_set(files: &[SchemaFile]) -> Vec<u8> {
    let mut set = Vec::new();
    put_len_field(1, &descriptor_file().encode_to_vec(), &mut set);
    put_len_field(1, &options_file().encode_to_vec(), &mut set);
    for file in files {
        put_len_field(1, &file.encode(), &mut set);
    }
    set
}

/// Registry over the base files plus `files`
pub(crate) fn corpus(files: Vec<SchemaFile>) -> PoolRegistry {
    PoolRegistry::decode(&descriptor_set(&files)).expect("fixture corpus decodes")
}

/// Pool holding only the option definitions, shared so fixture messages
/// built by separate calls are of the same types
pub(crate) fn options_pool() -> DescriptorPool {
    static POOL: OnceLock<DescriptorPool> = OnceLock::new();
    POOL.get_or_init(|| {
        DescriptorPool::decode(descriptor_set(&[]).as_slice()).expect("fixture pool decodes")
    })
    .clone()
}

/// Empty `tpl.<name>` message
pub(crate) fn message(name: &str) -> DynamicMessage {
    let descriptor = options_pool()
        .get_message_by_name(&format!("tpl.{}", name))
        .expect("fixture message exists");
    DynamicMessage::new(descriptor)
}

/// Empty `tpl.Data`
pub(crate) fn data() -> DynamicMessage {
    message("Data")
}

pub(crate) fn string(s: &str) -> Value {
    Value::String(s.to_string())
}

pub(crate) fn strings(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| string(s)).collect())
}

fn field(
    name: &str,
    number: i32,
    label: Label,
    ty: Type,
    type_name: Option<&str>,
) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(str::to_string),
        ..Default::default()
    }
}

fn optional(name: &str, number: i32, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    field(name, number, Label::Optional, ty, type_name)
}

fn repeated(name: &str, number: i32, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    field(name, number, Label::Repeated, ty, type_name)
}

fn map_entry(name: &str, key: Type, value: Type, value_type: Option<&str>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![
            optional("key", 1, key, None),
            optional("value", 2, value, value_type),
        ],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn extension(
    name: &str,
    number: u32,
    ty: Type,
    type_name: Option<&str>,
    extendee: &str,
) -> FieldDescriptorProto {
    FieldDescriptorProto {
        extendee: Some(extendee.to_string()),
        ..optional(name, number as i32, ty, type_name)
    }
}

fn extendable(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        extension_range: vec![ExtensionRange {
            start: Some(1000),
            end: Some(536_870_912),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Just enough of descriptor.proto to declare option extensions against
fn descriptor_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(DESCRIPTOR_FILE.to_string()),
        package: Some("google.protobuf".to_string()),
        message_type: vec![extendable("MessageOptions"), extendable("FieldOptions")],
        ..Default::default()
    }
}

fn options_file() -> FileDescriptorProto {
    let color = EnumDescriptorProto {
        name: Some("Color".to_string()),
        value: ["COLOR_UNSPECIFIED", "RED", "BLUE"]
            .iter()
            .enumerate()
            .map(|(i, name)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(i as i32),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let entry = DescriptorProto {
        name: Some("Entry".to_string()),
        field: vec![
            repeated("tags", 1, Type::String, None),
            optional("label", 2, Type::String, None),
        ],
        ..Default::default()
    };

    let inner = DescriptorProto {
        name: Some("Inner".to_string()),
        field: vec![
            optional("note", 1, Type::String, None),
            optional("child", 2, Type::Message, Some(".tpl.Inner")),
        ],
        ..Default::default()
    };

    let mut hoover = optional("hoover", 2, Type::String, None);
    hoover.oneof_index = Some(0);
    let mut buzzer = optional("buzzer", 3, Type::String, None);
    buzzer.oneof_index = Some(0);
    let mut accent = optional("accent", 10, Type::Enum, Some(".tpl.Color"));
    accent.default_value = Some("BLUE".to_string());

    let data = DescriptorProto {
        name: Some("Data".to_string()),
        field: vec![
            repeated("models", 1, Type::String, None),
            hoover,
            buzzer,
            optional("name", 4, Type::String, None),
            repeated("entries", 5, Type::Message, Some(".tpl.Data.EntriesEntry")),
            repeated("counts", 6, Type::Message, Some(".tpl.Data.CountsEntry")),
            optional("color", 7, Type::Enum, Some(".tpl.Color")),
            optional("inner", 8, Type::Message, Some(".tpl.Inner")),
            repeated("palette", 9, Type::Enum, Some(".tpl.Color")),
            accent,
            repeated("codes", 11, Type::Message, Some(".tpl.Data.CodesEntry")),
            optional("blob", 12, Type::Bytes, None),
            optional("ratio", 13, Type::Double, None),
            optional("size", 14, Type::Uint64, None),
        ],
        nested_type: vec![
            map_entry("EntriesEntry", Type::String, Type::Message, Some(".tpl.Entry")),
            map_entry("CountsEntry", Type::String, Type::Int32, None),
            map_entry("CodesEntry", Type::Int32, Type::String, None),
        ],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("kind".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let wrapper = DescriptorProto {
        name: Some("Wrapper".to_string()),
        field: vec![
            optional("data", 1, Type::Message, Some(".tpl.Data")),
            optional("label", 2, Type::String, None),
            repeated("many", 3, Type::Message, Some(".tpl.Data")),
        ],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some(OPTIONS_FILE.to_string()),
        package: Some("tpl".to_string()),
        dependency: vec![DESCRIPTOR_FILE.to_string()],
        message_type: vec![entry, inner, data, wrapper],
        enum_type: vec![color],
        extension: vec![
            extension("data", DATA_EXT, Type::Message, Some(".tpl.Data"), MESSAGE_OPTIONS),
            extension("wrapper", WRAPPER_EXT, Type::Message, Some(".tpl.Wrapper"), MESSAGE_OPTIONS),
            extension("field_data", 50002, Type::Message, Some(".tpl.Data"), FIELD_OPTIONS),
            extension("flag", 50003, Type::Bool, None, MESSAGE_OPTIONS),
        ],
        ..Default::default()
    }
}
