//! Recursive merger.
//!
//! All option occurrences in the corpus are merged into one target record:
//! lists accumulate, map entries merge per key, everything else is
//! write-once, and at most one member of a oneof may ever be supplied.

use crate::error::{Error, Result, ResultExt};
use crate::extract::{extract_option, OptionSource};
use crate::locate::OptionTarget;
use crate::registry::SchemaRegistry;
use crate::walk::{corpus_order, MessageSite};
use prost_reflect::{DynamicMessage, FieldDescriptor, MapKey, ReflectMessage, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Counters from one aggregation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Message definitions visited
    pub messages: usize,
    /// Messages whose option contributed a record
    pub contributions: usize,
    /// Contributions found only in unrecognized option bytes
    pub unrecognized: usize,
}

/// Merges every occurrence of the target option in the corpus into `record`.
///
/// Aborts on the first conflict; the error names the file and message the
/// offending contribution came from.
pub fn merge_data(
    registry: &dyn SchemaRegistry,
    target: &OptionTarget,
    record: &mut DynamicMessage,
) -> Result<MergeStats> {
    let mut stats = MergeStats::default();
    for site in corpus_order(registry) {
        stats.messages += 1;
        let source = merge_site(registry, target, record, &site)
            .with_context(|| format!("merge from message '{}'", site.message.full_name()))
            .with_context(|| format!("merge from file '{}'", site.file))?;
        match source {
            Some(OptionSource::Recognized) => stats.contributions += 1,
            Some(OptionSource::Unrecognized) => {
                stats.contributions += 1;
                stats.unrecognized += 1;
            }
            None => {}
        }
    }
    debug!(
        "Merged {} contributions ({} from unrecognized bytes) over {} messages",
        stats.contributions, stats.unrecognized, stats.messages
    );
    Ok(stats)
}

fn merge_site(
    registry: &dyn SchemaRegistry,
    target: &OptionTarget,
    record: &mut DynamicMessage,
    site: &MessageSite,
) -> Result<Option<OptionSource>> {
    let extracted = extract_option(registry, &site.message, target)
        .with_context(|| format!("extract option '{}'", target.extension().full_name()))?;
    let Some((value, source)) = extracted else {
        return Ok(None);
    };
    trace!("Merging option from {}", site.message.full_name());
    merge_record(record, &value)?;
    Ok(Some(source))
}

/// Merges the explicitly set fields of `source` into `target`.
///
/// Fields are visited by ascending field number, independent of the order
/// they were declared or decoded in.
pub fn merge_record(target: &mut DynamicMessage, source: &DynamicMessage) -> Result<()> {
    let mut fields: Vec<(FieldDescriptor, &Value)> = source.fields().collect();
    fields.sort_by_key(|(field, _)| field.number());

    for (field, value) in fields {
        if let Some(oneof) = field.containing_oneof() {
            let set = oneof
                .fields()
                .find(|other| other.number() != field.number() && target.has_field(other));
            if let Some(set) = set {
                return Err(Error::oneof_conflict(
                    field.full_name(),
                    describe(value),
                    oneof.full_name(),
                    set.full_name(),
                ));
            }
        }
        merge_field(target, &field, value)
            .with_context(|| format!("merge field '{}'", field.full_name()))?;
    }
    Ok(())
}

fn merge_field(target: &mut DynamicMessage, field: &FieldDescriptor, value: &Value) -> Result<()> {
    if field.is_map() {
        let Some(source) = value.as_map() else {
            return Err(Error::internal("map field without map value"));
        };
        let Some(dest) = target.get_field_mut(field).as_map_mut() else {
            return Err(Error::internal("map field without map storage"));
        };
        return merge_map(dest, source);
    }
    if field.is_list() {
        let Some(source) = value.as_list() else {
            return Err(Error::internal("list field without list value"));
        };
        let Some(dest) = target.get_field_mut(field).as_list_mut() else {
            return Err(Error::internal("list field without list storage"));
        };
        dest.extend(source.iter().cloned());
        return Ok(());
    }
    // Singular message fields are write-once too, no recursive merge.
    if target.has_field(field) {
        return Err(Error::FieldAlreadySet {
            field: field.full_name().to_string(),
        });
    }
    target.set_field(field, value.clone());
    Ok(())
}

/// Merges map entries; record values merge recursively, scalars are
/// write-once per key.
fn merge_map(
    target: &mut HashMap<MapKey, Value>,
    source: &HashMap<MapKey, Value>,
) -> Result<()> {
    let mut keys: Vec<&MapKey> = source.keys().collect();
    keys.sort_by(|a, b| compare_map_keys(a, b));

    for key in keys {
        let value = &source[key];
        match value {
            Value::Message(record) => {
                let entry = target
                    .entry(key.clone())
                    .or_insert_with(|| {
                        Value::Message(DynamicMessage::new(record.descriptor()))
                    });
                let Value::Message(dest) = entry else {
                    return Err(Error::internal("map entry changed type"));
                };
                merge_record(dest, record)
                    .with_context(|| format!("merging map key '{}'", describe_key(key)))?;
            }
            _ => {
                if target.contains_key(key) {
                    return Err(Error::DuplicateKey {
                        key: describe_key(key),
                    });
                }
                target.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(())
}

/// Total order over map keys of one type: numeric for integers,
/// lexicographic for strings, `false < true`
pub(crate) fn compare_map_keys(a: &MapKey, b: &MapKey) -> Ordering {
    match (a, b) {
        (MapKey::Bool(a), MapKey::Bool(b)) => a.cmp(b),
        (MapKey::I32(a), MapKey::I32(b)) => a.cmp(b),
        (MapKey::I64(a), MapKey::I64(b)) => a.cmp(b),
        (MapKey::U32(a), MapKey::U32(b)) => a.cmp(b),
        (MapKey::U64(a), MapKey::U64(b)) => a.cmp(b),
        (MapKey::String(a), MapKey::String(b)) => a.cmp(b),
        _ => key_rank(a).cmp(&key_rank(b)),
    }
}

fn key_rank(key: &MapKey) -> u8 {
    match key {
        MapKey::Bool(_) => 0,
        MapKey::I32(_) => 1,
        MapKey::I64(_) => 2,
        MapKey::U32(_) => 3,
        MapKey::U64(_) => 4,
        MapKey::String(_) => 5,
    }
}

fn describe_key(key: &MapKey) -> String {
    match key {
        MapKey::Bool(v) => v.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
        MapKey::String(v) => v.clone(),
    }
}

/// Short rendering of a value for error messages
fn describe(value: &Value) -> String {
    match value {
        Value::Bool(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Bytes(v) => format!("\"{}\"", v.escape_ascii()),
        Value::EnumNumber(v) => v.to_string(),
        Value::Message(m) => format!("{{{}}}", m.descriptor().full_name()),
        Value::List(items) => format!("[{} items]", items.len()),
        Value::Map(entries) => format!("{{{} entries}}", entries.len()),
    }
}
