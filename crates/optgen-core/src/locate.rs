//! Extension locator: resolves an [`OptionPath`] against the registry.

use crate::error::{Error, Result};
use crate::option_path::OptionPath;
use crate::registry::{SchemaRegistry, MESSAGE_OPTIONS};
use prost_reflect::{DynamicMessage, ExtensionDescriptor, Kind, MessageDescriptor};
use tracing::debug;

/// The resolved option path
#[derive(Debug, Clone)]
pub struct OptionTarget {
    extension: ExtensionDescriptor,
    subfields: Vec<String>,
    descriptor: MessageDescriptor,
}

impl OptionTarget {
    /// The message option extension
    pub fn extension(&self) -> &ExtensionDescriptor {
        &self.extension
    }

    /// Subfield chain from the extension value down to the data record
    pub fn subfields(&self) -> &[String] {
        &self.subfields
    }

    /// Type of the data record, i.e. of the target record
    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }
}

/// Resolves `path` and returns the target plus an empty target record.
///
/// Fails before any merging starts if the path does not name a message
/// option or its subfield chain does not end in a message.
pub fn locate(
    registry: &dyn SchemaRegistry,
    path: &OptionPath,
) -> Result<(OptionTarget, DynamicMessage)> {
    let name = path.extension();
    let Some(extension) = registry.get_extension_by_name(name) else {
        if registry.has_descriptor(name) {
            return Err(Error::NotAnExtension {
                name: name.to_string(),
            });
        }
        return Err(Error::NotFound {
            name: name.to_string(),
        });
    };

    let extendee = extension.containing_message();
    if extendee.full_name() != MESSAGE_OPTIONS {
        return Err(Error::WrongOption {
            name: name.to_string(),
            extendee: extendee.full_name().to_string(),
        });
    }

    let mut descriptor = singular_message(
        extension.full_name(),
        extension.kind(),
        extension.is_list() || extension.is_map(),
    )?;
    for subfield in path.subfields() {
        let Some(field) = descriptor.get_field_by_name(subfield) else {
            return Err(Error::SubfieldNotFound {
                message: descriptor.full_name().to_string(),
                subfield: subfield.clone(),
            });
        };
        let repeated = field.is_list() || field.is_map();
        descriptor = singular_message(field.full_name(), field.kind(), repeated)?;
    }

    debug!("Option {} supplies records of type {}", path, descriptor.full_name());
    let record = registry.new_record(&descriptor);
    Ok((
        OptionTarget {
            extension,
            subfields: path.subfields().to_vec(),
            descriptor,
        },
        record,
    ))
}

fn singular_message(name: &str, kind: Kind, repeated: bool) -> Result<MessageDescriptor> {
    match kind {
        Kind::Message(descriptor) if !repeated => Ok(descriptor),
        _ => Err(Error::NotAMessage {
            field: name.to_string(),
        }),
    }
}
