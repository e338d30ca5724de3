//! Descriptor registry seam.
//!
//! The aggregation engine never touches a global registry. Everything it
//! needs from the schema corpus goes through [`SchemaRegistry`], so tests can
//! swap in registries that hide or rewrite option storage.
//!
//! [`PoolRegistry`] is the default implementation on top of a
//! `prost_reflect::DescriptorPool`.

use crate::error::{Error, Result};
use crate::wire::{read_field, FieldIter, WireType};
use bytes::Bytes;
use prost::Message;
use prost_reflect::{
    DescriptorPool, DynamicMessage, ExtensionDescriptor, FileDescriptor, Kind, MessageDescriptor,
    ReflectMessage,
};
use prost_types::FileDescriptorSet;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Full name of the container type message options are decoded into
pub const MESSAGE_OPTIONS: &str = "google.protobuf.MessageOptions";

/// Access to a registered schema corpus
pub trait SchemaRegistry {
    /// All registered files, in no particular order
    fn files(&self) -> Vec<FileDescriptor>;

    /// Looks up an extension field by fully-qualified name
    fn get_extension_by_name(&self, name: &str) -> Option<ExtensionDescriptor>;

    /// Whether `name` resolves to any descriptor that is not an extension:
    /// a message, enum, enum value, service, oneof or regular field
    fn has_descriptor(&self, name: &str) -> bool;

    /// The message's encoded `MessageOptions`, empty if it has none
    fn option_bytes(&self, message: &MessageDescriptor) -> Bytes;

    /// Creates an empty record of the given type
    fn new_record(&self, descriptor: &MessageDescriptor) -> DynamicMessage {
        DynamicMessage::new(descriptor.clone())
    }

    /// The message's options as decoded with the extensions known to the
    /// message's pool.
    ///
    /// A known extension encoded with the wrong wire type is left out and
    /// reported by [`SchemaRegistry::unrecognized_option_bytes`] instead.
    fn message_options(&self, message: &MessageDescriptor) -> Result<DynamicMessage> {
        let descriptor = options_descriptor(message)?;
        let (known, _) = split_mistyped(&descriptor, &self.option_bytes(message));
        DynamicMessage::decode(descriptor, known.as_slice()).map_err(|source| {
            Error::DecodeFailure {
                message: MESSAGE_OPTIONS.to_string(),
                source,
            }
        })
    }

    /// The wire bytes of the message's option fields that were not
    /// recognized when the options were decoded
    fn unrecognized_option_bytes(&self, message: &MessageDescriptor) -> Result<Vec<u8>> {
        let mut options = self.message_options(message)?;
        let descriptor = options.descriptor();
        for field in descriptor.fields() {
            options.clear_field(&field);
        }
        let extensions: Vec<_> = options.extensions().map(|(extension, _)| extension).collect();
        for extension in extensions {
            options.clear_extension(&extension);
        }
        let mut raw = options.encode_to_vec();
        let (_, mistyped) = split_mistyped(&descriptor, &self.option_bytes(message));
        raw.extend_from_slice(&mistyped);
        Ok(raw)
    }
}

fn options_descriptor(message: &MessageDescriptor) -> Result<MessageDescriptor> {
    message
        .parent_pool()
        .get_message_by_name(MESSAGE_OPTIONS)
        .or_else(|| DescriptorPool::global().get_message_by_name(MESSAGE_OPTIONS))
        .ok_or_else(|| {
            Error::descriptor_build(format!("{} is not registered", MESSAGE_OPTIONS))
        })
}

/// Splits encoded options into fields the decoder accepts and known
/// extensions whose wire type does not match their declaration.
///
/// Malformed input is returned whole as the first half so decoding reports it.
fn split_mistyped(options: &MessageDescriptor, bytes: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut known = Vec::with_capacity(bytes.len());
    let mut mistyped = Vec::new();
    let mut position = 0;
    while position < bytes.len() {
        let Ok(field) = read_field(&bytes[position..]) else {
            return (bytes.to_vec(), Vec::new());
        };
        let encoded = &bytes[position..position + field.len];
        match options.get_extension(field.number) {
            Some(extension) if !accepts(&extension, field.wire_type) => {
                mistyped.extend_from_slice(encoded)
            }
            _ => known.extend_from_slice(encoded),
        }
        position += field.len;
    }
    (known, mistyped)
}

/// Whether a decoder accepts `wire_type` for the extension
fn accepts(extension: &ExtensionDescriptor, wire_type: WireType) -> bool {
    let kind = extension.kind();
    let expected = match kind {
        Kind::Message(_) if extension.is_group() => WireType::StartGroup,
        Kind::Message(_) | Kind::String | Kind::Bytes => WireType::Len,
        Kind::Double | Kind::Fixed64 | Kind::Sfixed64 => WireType::I64,
        Kind::Float | Kind::Fixed32 | Kind::Sfixed32 => WireType::I32,
        _ => WireType::Varint,
    };
    let packed = extension.is_list()
        && wire_type == WireType::Len
        && !matches!(kind, Kind::Message(_) | Kind::String | Kind::Bytes);
    wire_type == expected || packed
}

/// [`SchemaRegistry`] over a `prost_reflect::DescriptorPool`
#[derive(Debug, Clone)]
pub struct PoolRegistry {
    pool: DescriptorPool,
    /// Encoded options per message full name
    options: HashMap<String, Bytes>,
}

impl PoolRegistry {
    /// Builds a registry from an encoded `FileDescriptorSet`.
    ///
    /// The pool is built without options, so a malformed option payload
    /// cannot fail the whole corpus. Option bytes are indexed from the input
    /// as written and decoded per message on demand.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let set = FileDescriptorSet::decode(bytes)?;
        let pool = DescriptorPool::from_file_descriptor_set(set)
            .map_err(|e| Error::descriptor_build(e.to_string()))?;
        let options = index_options(bytes)?;
        debug!(
            "Registered {} files, {} messages with options",
            pool.files().len(),
            options.len()
        );
        Ok(Self { pool, options })
    }

    /// The underlying pool
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}

impl SchemaRegistry for PoolRegistry {
    fn files(&self) -> Vec<FileDescriptor> {
        self.pool.files().collect()
    }

    fn get_extension_by_name(&self, name: &str) -> Option<ExtensionDescriptor> {
        self.pool.get_extension_by_name(name)
    }

    fn has_descriptor(&self, name: &str) -> bool {
        if self.pool.get_message_by_name(name).is_some()
            || self.pool.get_enum_by_name(name).is_some()
            || self.pool.get_service_by_name(name).is_some()
        {
            return true;
        }
        // Enum values are scoped as siblings of their enum
        if self
            .pool
            .all_enums()
            .any(|e| e.values().any(|value| value.full_name() == name))
        {
            return true;
        }
        let Some((parent, member)) = name.rsplit_once('.') else {
            return false;
        };
        if let Some(message) = self.pool.get_message_by_name(parent) {
            return message.get_field_by_name(member).is_some()
                || message.oneofs().any(|oneof| oneof.name() == member);
        }
        self.pool
            .get_enum_by_name(parent)
            .is_some_and(|e| e.get_value_by_name(member).is_some())
    }

    fn option_bytes(&self, message: &MessageDescriptor) -> Bytes {
        self.options
            .get(message.full_name())
            .cloned()
            .unwrap_or_default()
    }
}

// Field numbers in descriptor.proto
const SET_FILE: u32 = 1;
const FILE_PACKAGE: u32 = 2;
const FILE_MESSAGE_TYPE: u32 = 4;
const MESSAGE_NAME: u32 = 1;
const MESSAGE_NESTED_TYPE: u32 = 3;
const MESSAGE_OPTIONS_FIELD: u32 = 7;

/// Maps message full names to their encoded options
fn index_options(set: &[u8]) -> Result<HashMap<String, Bytes>> {
    let mut index = HashMap::new();
    for field in FieldIter::new(set) {
        let field = field?;
        if field.number != SET_FILE || field.wire_type != WireType::Len {
            continue;
        }
        let file = field.payload;

        // The package may follow the messages in the encoding
        let mut package = String::new();
        for field in FieldIter::new(file) {
            let field = field?;
            if field.number == FILE_PACKAGE && field.wire_type == WireType::Len {
                package = String::from_utf8_lossy(field.payload).into_owned();
            }
        }
        for field in FieldIter::new(file) {
            let field = field?;
            if field.number == FILE_MESSAGE_TYPE && field.wire_type == WireType::Len {
                index_message(&package, field.payload, &mut index)?;
            }
        }
    }
    Ok(index)
}

fn index_message(scope: &str, message: &[u8], index: &mut HashMap<String, Bytes>) -> Result<()> {
    let mut name = String::new();
    for field in FieldIter::new(message) {
        let field = field?;
        if field.number == MESSAGE_NAME && field.wire_type == WireType::Len {
            name = String::from_utf8_lossy(field.payload).into_owned();
        }
    }
    let full_name = if scope.is_empty() {
        name
    } else {
        format!("{}.{}", scope, name)
    };

    let mut options = Vec::new();
    for field in FieldIter::new(message) {
        let field = field?;
        if field.wire_type != WireType::Len {
            continue;
        }
        match field.number {
            MESSAGE_NESTED_TYPE => index_message(&full_name, field.payload, index)?,
            // Repeated occurrences of a message field merge, which for
            // encoded bytes is concatenation
            MESSAGE_OPTIONS_FIELD => options.extend_from_slice(field.payload),
            _ => {}
        }
    }
    if !options.is_empty() {
        trace!("Message {} carries {} option bytes", full_name, options.len());
        index.insert(full_name, Bytes::from(options));
    }
    Ok(())
}
