//! Option extractor.
//!
//! Option accessors only see extensions that were known when the options were
//! decoded. Values embedded in options decoded earlier end up in the
//! unrecognized-field bytes, so those are scanned as a fallback.

use crate::error::{Error, Result};
use crate::locate::OptionTarget;
use crate::registry::SchemaRegistry;
use crate::wire::{FieldIter, WireType};
use prost_reflect::{
    DynamicMessage, ExtensionDescriptor, Kind, MessageDescriptor, ReflectMessage, Value,
};
use tracing::trace;

/// Where an extracted option value was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSource {
    /// Decoded options carried the extension
    Recognized,
    /// Found by scanning unrecognized bytes
    Unrecognized,
}

/// Extracts the data record `message` contributes, if any.
///
/// `Ok(None)` means the message does not set the option, or sets it without
/// the sub-record the target's subfield chain points at.
pub fn extract_option(
    registry: &dyn SchemaRegistry,
    message: &MessageDescriptor,
    target: &OptionTarget,
) -> Result<Option<(DynamicMessage, OptionSource)>> {
    let extension = target.extension();
    let options = registry.message_options(message)?;

    let (value, source) = if options.has_extension(extension) {
        match options.get_extension(extension).as_message() {
            Some(value) => (value.clone(), OptionSource::Recognized),
            None => return Err(Error::NotAMessage {
                field: extension.full_name().to_string(),
            }),
        }
    } else {
        let raw = registry.unrecognized_option_bytes(message)?;
        match extract_unrecognized(&raw, extension)? {
            Some(value) => (value, OptionSource::Unrecognized),
            None => return Ok(None),
        }
    };

    trace!(
        "Message {} sets option {} ({:?})",
        message.full_name(),
        extension.full_name(),
        source
    );
    Ok(project(value, target.subfields())?.map(|record| (record, source)))
}

/// Scans raw option bytes for the extension's field.
///
/// Returns `Ok(None)` if the field does not occur.
pub fn extract_unrecognized(
    raw: &[u8],
    extension: &ExtensionDescriptor,
) -> Result<Option<DynamicMessage>> {
    let Kind::Message(descriptor) = extension.kind() else {
        return Err(Error::NotAMessage {
            field: extension.full_name().to_string(),
        });
    };

    for field in FieldIter::new(raw) {
        let field = field?;
        if field.number != extension.number() {
            continue;
        }
        if field.wire_type != WireType::Len {
            return Err(Error::BadExtensionEncoding {
                number: field.number,
                wire_type: field.wire_type as u8,
            });
        }
        let value = DynamicMessage::decode(descriptor.clone(), field.payload).map_err(|source| {
            Error::DecodeFailure {
                message: descriptor.full_name().to_string(),
                source,
            }
        })?;
        return Ok(Some(value));
    }
    Ok(None)
}

/// Follows the subfield chain, stopping at the first absent link
fn project(mut value: DynamicMessage, subfields: &[String]) -> Result<Option<DynamicMessage>> {
    for name in subfields {
        let descriptor = value.descriptor();
        let Some(field) = descriptor.get_field_by_name(name) else {
            return Err(Error::SubfieldNotFound {
                message: descriptor.full_name().to_string(),
                subfield: name.clone(),
            });
        };
        if !value.has_field(&field) {
            return Ok(None);
        }
        let inner = value.get_field(&field).into_owned();
        value = match inner {
            Value::Message(inner) => inner,
            _ => return Err(Error::NotAMessage {
                field: field.full_name().to_string(),
            }),
        };
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::{self, Msg, SchemaFile, DATA_EXT, WRAPPER_EXT};
    use crate::locate::locate;
    use crate::option_path::OptionPath;
    use crate::wire::{encode_key, encode_varint, put_len_field};
    use prost::Message;

    fn site(registry: &dyn SchemaRegistry, name: &str) -> MessageDescriptor {
        crate::walk::corpus_order(registry)
            .into_iter()
            .find(|s| s.message.full_name() == name)
            .map(|s| s.message)
            .unwrap()
    }

    fn named(name: &str) -> DynamicMessage {
        let mut data = fixtures::data();
        data.set_field_by_name("name", fixtures::string(name));
        data
    }

    #[test]
    fn test_recognized_option() {
        let registry = fixtures::corpus(vec![SchemaFile::new(
            "a.proto",
            vec![Msg::new("A").data(&named("a"))],
        )]);
        let (target, _) = locate(&registry, &OptionPath::parse("tpl.data").unwrap()).unwrap();

        let (value, _) = extract_option(&registry, &site(&registry, "corpus.A"), &target)
            .unwrap()
            .unwrap();
        assert_eq!(value.get_field_by_name("name").unwrap().as_str(), Some("a"));
    }

    #[test]
    fn test_message_without_option() {
        let registry = fixtures::corpus(vec![SchemaFile::new("a.proto", vec![Msg::new("A")])]);
        let (target, _) = locate(&registry, &OptionPath::parse("tpl.data").unwrap()).unwrap();
        assert!(extract_option(&registry, &site(&registry, "corpus.A"), &target)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_subfield_chain_absent_link_is_no_value() {
        let mut wrapper = fixtures::message("Wrapper");
        wrapper.set_field_by_name("label", fixtures::string("only label"));
        let registry = fixtures::corpus(vec![SchemaFile::new(
            "a.proto",
            vec![Msg::new("A").option(WRAPPER_EXT, &wrapper)],
        )]);
        let path = OptionPath::parse("(tpl.wrapper).data").unwrap();
        let (target, _) = locate(&registry, &path).unwrap();
        assert!(extract_option(&registry, &site(&registry, "corpus.A"), &target)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_subfield_chain_projects() {
        let mut wrapper = fixtures::message("Wrapper");
        wrapper.set_field_by_name("data", Value::Message(named("inside")));
        let registry = fixtures::corpus(vec![SchemaFile::new(
            "a.proto",
            vec![Msg::new("A").option(WRAPPER_EXT, &wrapper)],
        )]);
        let path = OptionPath::parse("(tpl.wrapper).data").unwrap();
        let (target, _) = locate(&registry, &path).unwrap();
        let (value, _) = extract_option(&registry, &site(&registry, "corpus.A"), &target)
            .unwrap()
            .unwrap();
        assert_eq!(value.descriptor().full_name(), "tpl.Data");
        assert_eq!(value.get_field_by_name("name").unwrap().as_str(), Some("inside"));
    }

    #[test]
    fn test_scan_finds_extension_among_other_fields() {
        let pool = fixtures::options_pool();
        let extension = pool.get_extension_by_name("tpl.data").unwrap();

        let mut raw = Vec::new();
        encode_key(1001, WireType::Varint, &mut raw);
        encode_varint(7, &mut raw);
        put_len_field(DATA_EXT, &named("raw").encode_to_vec(), &mut raw);

        let value = extract_unrecognized(&raw, &extension).unwrap().unwrap();
        assert_eq!(value.get_field_by_name("name").unwrap().as_str(), Some("raw"));
    }

    #[test]
    fn test_scan_without_match_is_no_value() {
        let extension = fixtures::options_pool().get_extension_by_name("tpl.data").unwrap();
        let mut raw = Vec::new();
        put_len_field(1002, b"other", &mut raw);
        assert!(extract_unrecognized(&raw, &extension).unwrap().is_none());
        assert!(extract_unrecognized(&[], &extension).unwrap().is_none());
    }

    #[test]
    fn test_scan_wrong_wire_type() {
        let extension = fixtures::options_pool().get_extension_by_name("tpl.data").unwrap();
        let mut raw = Vec::new();
        encode_key(DATA_EXT, WireType::Varint, &mut raw);
        encode_varint(1, &mut raw);

        let err = extract_unrecognized(&raw, &extension).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadExtensionEncoding);
    }

    #[test]
    fn test_scan_undecodable_payload() {
        let extension = fixtures::options_pool().get_extension_by_name("tpl.data").unwrap();
        let mut raw = Vec::new();
        // Field 1 (models, a string) declared 5 bytes long with one present
        put_len_field(DATA_EXT, &[0x0A, 0x05, b'x'], &mut raw);

        let err = extract_unrecognized(&raw, &extension).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn test_scan_malformed_buffer() {
        let extension = fixtures::options_pool().get_extension_by_name("tpl.data").unwrap();
        let err = extract_unrecognized(&[0xFF], &extension).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }
}
