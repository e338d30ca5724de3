//! Generic value tree.
//!
//! Templates should not need to know about descriptors, so the merged record
//! is converted into a tree made only of primitives, ordered lists,
//! key-ordered maps and nested records. Conversion is total over declared
//! fields: a template can refer to any field whether or not a contribution
//! set it.

mod display;

use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MapKey, ReflectMessage, Value};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved key naming a record's original typed message.
///
/// The message itself is held outside the field map and read with
/// [`RawRecord::original`]; the key cannot be used for extra data.
pub const ORIGINAL_MESSAGE_KEY: &str = "_protomsg";

/// A node of the generic value tree
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum RawValue {
    /// Absent value; skipped when stringified
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Enum value name
    Enum(String),
    /// Ordered list
    List(Vec<RawValue>),
    /// Key-ordered map
    Map(BTreeMap<RawKey, RawValue>),
    /// Nested record
    Record(RawRecord),
}

/// Map key. The derived order is the rendering order: `false < true`,
/// integers numerically, strings lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum RawKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl From<&MapKey> for RawKey {
    fn from(key: &MapKey) -> Self {
        match key {
            MapKey::Bool(v) => RawKey::Bool(*v),
            MapKey::I32(v) => RawKey::I32(*v),
            MapKey::I64(v) => RawKey::I64(*v),
            MapKey::U32(v) => RawKey::U32(*v),
            MapKey::U64(v) => RawKey::U64(*v),
            MapKey::String(v) => RawKey::String(v.clone()),
        }
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawKey::Bool(v) => write!(f, "{}", v),
            RawKey::I32(v) => write!(f, "{}", v),
            RawKey::I64(v) => write!(f, "{}", v),
            RawKey::U32(v) => write!(f, "{}", v),
            RawKey::U64(v) => write!(f, "{}", v),
            RawKey::String(v) => f.write_str(v),
        }
    }
}

/// A record: field name to value, ordered by name
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
    original: Option<DynamicMessage>,
}

impl RawRecord {
    /// Creates an empty record with no original message
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a field
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields.get(key)
    }

    /// Sets a field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) -> Option<RawValue> {
        self.fields.insert(key.into(), value)
    }

    /// Whether the field is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The typed message this record was converted from. Renderers expose it
    /// under [`ORIGINAL_MESSAGE_KEY`] if they expose it at all.
    pub fn original(&self) -> Option<&DynamicMessage> {
        self.original.as_ref()
    }
}

// The original message is a view of the same data, not part of the value.
impl PartialEq for RawRecord {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl FromIterator<(String, RawValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, RawValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            original: None,
        }
    }
}

/// Converts a typed record into the generic tree.
///
/// Every declared field appears except unset oneof members. Unset fields
/// take their kind's zero value; unset enums take the declared default's
/// name; unset message fields become an empty record.
pub fn to_raw(message: &DynamicMessage) -> RawRecord {
    let descriptor = message.descriptor();
    let mut fields = BTreeMap::new();
    for field in descriptor.fields() {
        let value = if message.has_field(&field) {
            convert_field(&field, &message.get_field(&field))
        } else if field.containing_oneof().is_some() {
            continue;
        } else {
            zero(&field)
        };
        fields.insert(field.name().to_string(), value);
    }
    RawRecord {
        fields,
        original: Some(message.clone()),
    }
}

fn convert_field(field: &FieldDescriptor, value: &Value) -> RawValue {
    let kind = if field.is_map() {
        match field.kind() {
            Kind::Message(entry) => entry.map_entry_value_field().kind(),
            kind => kind,
        }
    } else {
        field.kind()
    };
    convert(&kind, value)
}

/// `kind` is the element kind for lists and the value kind for maps
fn convert(kind: &Kind, value: &Value) -> RawValue {
    match value {
        Value::Bool(v) => RawValue::Bool(*v),
        Value::I32(v) => RawValue::I32(*v),
        Value::I64(v) => RawValue::I64(*v),
        Value::U32(v) => RawValue::U32(*v),
        Value::U64(v) => RawValue::U64(*v),
        Value::F32(v) => RawValue::F32(*v),
        Value::F64(v) => RawValue::F64(*v),
        Value::String(v) => RawValue::String(v.clone()),
        Value::Bytes(v) => RawValue::Bytes(v.to_vec()),
        Value::EnumNumber(number) => enum_value(kind, *number),
        Value::Message(message) => RawValue::Record(to_raw(message)),
        Value::List(items) => {
            RawValue::List(items.iter().map(|item| convert(kind, item)).collect())
        }
        Value::Map(entries) => RawValue::Map(
            entries
                .iter()
                .map(|(key, value)| (RawKey::from(key), convert(kind, value)))
                .collect(),
        ),
    }
}

fn enum_value(kind: &Kind, number: i32) -> RawValue {
    match kind {
        Kind::Enum(descriptor) => match descriptor.get_value(number) {
            Some(value) => RawValue::Enum(value.name().to_string()),
            None => RawValue::I32(number),
        },
        _ => RawValue::I32(number),
    }
}

fn zero(field: &FieldDescriptor) -> RawValue {
    if field.is_map() {
        return RawValue::Map(BTreeMap::new());
    }
    if field.is_list() {
        return RawValue::List(Vec::new());
    }
    match field.kind() {
        Kind::Bool => RawValue::Bool(false),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => RawValue::I32(0),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => RawValue::I64(0),
        Kind::Uint32 | Kind::Fixed32 => RawValue::U32(0),
        Kind::Uint64 | Kind::Fixed64 => RawValue::U64(0),
        Kind::Float => RawValue::F32(0.0),
        Kind::Double => RawValue::F64(0.0),
        Kind::String => RawValue::String(String::new()),
        Kind::Bytes => RawValue::Bytes(Vec::new()),
        // No recursion, self-referential types stay finite
        Kind::Message(_) => RawValue::Record(RawRecord::new()),
        kind @ Kind::Enum(_) => convert(&kind, &Value::default_value_for_field(field)),
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Bool(v) => RawValue::Bool(v),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    RawValue::I64(v)
                } else if let Some(v) = n.as_u64() {
                    RawValue::U64(v)
                } else {
                    RawValue::F64(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(v) => RawValue::String(v),
            serde_json::Value::Array(items) => {
                RawValue::List(items.into_iter().map(RawValue::from).collect())
            }
            serde_json::Value::Object(fields) => RawValue::Record(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawValue::Null => serializer.serialize_unit(),
            RawValue::Bool(v) => serializer.serialize_bool(*v),
            RawValue::I32(v) => serializer.serialize_i32(*v),
            RawValue::I64(v) => serializer.serialize_i64(*v),
            RawValue::U32(v) => serializer.serialize_u32(*v),
            RawValue::U64(v) => serializer.serialize_u64(*v),
            RawValue::F32(v) => serializer.serialize_f32(*v),
            RawValue::F64(v) => serializer.serialize_f64(*v),
            RawValue::String(v) | RawValue::Enum(v) => serializer.serialize_str(v),
            RawValue::Bytes(v) => serializer.serialize_bytes(v),
            RawValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            RawValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
            RawValue::Record(record) => record.serialize(serializer),
        }
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
