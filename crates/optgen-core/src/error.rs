//! Error types for the optgen-core library.
//!
//! Every failure of the aggregation pipeline is fatal. Errors are built with
//! `thiserror` and can be wrapped in [`Error::Context`] links so the caller
//! sees which file, message and field an error came from. [`Error::kind`]
//! looks through those links.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for optgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], independent of context wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Option name resolves to nothing
    NotFound,
    /// Option name resolves to something that is not an extension
    NotAnExtension,
    /// Extension does not extend `google.protobuf.MessageOptions`
    WrongOption,
    /// Option path walks through a field that is not a singular message
    NotAMessage,
    /// Option path names a subfield that does not exist
    SubfieldNotFound,
    /// Option found in unrecognized bytes with a non length-delimited wire type
    BadExtensionEncoding,
    /// Option bytes could not be decoded
    DecodeFailure,
    /// Two different members of one oneof were supplied
    OneofConflict,
    /// A write-once field was supplied twice
    FieldAlreadySet,
    /// A scalar map entry was supplied twice
    DuplicateKey,
    /// Option path text is malformed
    InvalidOptionPath,
    /// Generator parameter string is malformed
    InvalidParameter,
    /// Extra template data is unusable
    ExtraData,
    /// Named template variable does not exist
    UnknownGlobal,
    /// Descriptor set could not be turned into a registry
    Descriptor,
    /// File system failure
    Io,
    /// Renderer failure
    Render,
    /// Invariant violation inside the library
    Internal,
}

/// Comprehensive error type for all optgen operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Option name is not registered at all
    #[error("find message option descriptor '{name}': not found")]
    NotFound {
        /// The fully-qualified name that was looked up
        name: String,
    },

    /// Option name is registered but is not an extension field
    #[error("not an extension field: {name}")]
    NotAnExtension {
        /// The fully-qualified name that was looked up
        name: String,
    },

    /// Extension extends something other than the message options
    #[error("not a message option: {name} (containing message is '{extendee}')")]
    WrongOption {
        /// The extension's fully-qualified name
        name: String,
        /// The message the extension actually extends
        extendee: String,
    },

    /// A field on the option path is not a singular message field
    #[error("field '{field}' is not a message")]
    NotAMessage {
        /// Fully-qualified name of the offending field
        field: String,
    },

    /// A subfield on the option path does not exist
    #[error("message '{message}' subfield '{subfield}' not found")]
    SubfieldNotFound {
        /// Message that was searched
        message: String,
        /// Subfield name that was not found
        subfield: String,
    },

    /// Extension field found in raw bytes with the wrong wire type
    #[error("bad wire type for extension message field {number}: {wire_type}")]
    BadExtensionEncoding {
        /// Extension field number
        number: u32,
        /// Wire type found on the wire
        wire_type: u8,
    },

    /// Extension bytes do not decode as the extension message type
    #[error("unmarshal extension message '{message}': {source}")]
    DecodeFailure {
        /// Message type the bytes were decoded as
        message: String,
        /// Underlying decode error
        #[source]
        source: prost::DecodeError,
    },

    /// Invalid protobuf wire format
    #[error("invalid protobuf wire format at offset {offset}: {details}")]
    InvalidWireFormat {
        /// Byte offset where the error occurred
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Failed to decode varint
    #[error("failed to decode varint at offset {offset}: buffer too small or invalid encoding")]
    VarintDecode {
        /// Byte offset where the error occurred
        offset: usize,
    },

    /// A different member of a oneof is already set in the target
    #[error(
        "unable to merge field '{field}' value '{value}' from oneof '{oneof}': \
         field '{set_field}' is set in target"
    )]
    OneofConflict {
        /// Field being merged
        field: String,
        /// Rendering of the value being merged
        value: String,
        /// Fully-qualified oneof name
        oneof: String,
        /// Field already set in the target
        set_field: String,
    },

    /// A non-list, non-map field is already set in the target
    #[error("field already set")]
    FieldAlreadySet {
        /// Fully-qualified field name
        field: String,
    },

    /// A scalar map entry already exists in the target
    #[error("map key '{key}' already set in target")]
    DuplicateKey {
        /// Rendering of the key
        key: String,
    },

    /// Option path text could not be parsed or validated
    #[error("invalid option path '{path}': {reason}")]
    InvalidOptionPath {
        /// The offending input
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// Generator parameter string could not be parsed
    #[error("{0}")]
    InvalidParameter(String),

    /// Extra template data could not be used
    #[error("extra data: {0}")]
    ExtraData(String),

    /// Named template variable does not exist
    #[error("no such global variable: {name}")]
    UnknownGlobal {
        /// Variable name
        name: String,
    },

    /// Failed to parse a descriptor
    #[error("failed to parse descriptor: {0}")]
    DescriptorParse(#[from] prost::DecodeError),

    /// Failed to build a descriptor pool with prost-reflect
    #[error("failed to build descriptor pool: {0}")]
    DescriptorBuild(String),

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Renderer failed to produce output
    #[error("render template data: {0}")]
    Render(String),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),

    /// An error annotated with where it happened
    #[error("{context}: {source}")]
    Context {
        /// Human-readable position, e.g. `merge from file 'a.proto'`
        context: String,
        /// The wrapped error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Creates a new oneof conflict error
    pub fn oneof_conflict(
        field: impl Into<String>,
        value: impl Into<String>,
        oneof: impl Into<String>,
        set_field: impl Into<String>,
    ) -> Self {
        Self::OneofConflict {
            field: field.into(),
            value: value.into(),
            oneof: oneof.into(),
            set_field: set_field.into(),
        }
    }

    /// Creates a new invalid option path error
    pub fn invalid_option_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOptionPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new parameter error
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new wire format error
    pub fn invalid_wire_format(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidWireFormat {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new varint decode error
    pub fn varint_decode(offset: usize) -> Self {
        Self::VarintDecode { offset }
    }

    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wraps this error in a context link
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping context links
    pub fn root(&self) -> &Error {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the kind of the innermost error
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotAnExtension { .. } => ErrorKind::NotAnExtension,
            Self::WrongOption { .. } => ErrorKind::WrongOption,
            Self::NotAMessage { .. } => ErrorKind::NotAMessage,
            Self::SubfieldNotFound { .. } => ErrorKind::SubfieldNotFound,
            Self::BadExtensionEncoding { .. } => ErrorKind::BadExtensionEncoding,
            Self::DecodeFailure { .. }
            | Self::InvalidWireFormat { .. }
            | Self::VarintDecode { .. } => ErrorKind::DecodeFailure,
            Self::OneofConflict { .. } => ErrorKind::OneofConflict,
            Self::FieldAlreadySet { .. } => ErrorKind::FieldAlreadySet,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::InvalidOptionPath { .. } => ErrorKind::InvalidOptionPath,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::ExtraData(_) => ErrorKind::ExtraData,
            Self::UnknownGlobal { .. } => ErrorKind::UnknownGlobal,
            Self::DescriptorParse(_) | Self::DescriptorBuild(_) => ErrorKind::Descriptor,
            Self::FileRead { .. } => ErrorKind::Io,
            Self::Render(_) => ErrorKind::Render,
            Self::Internal(_) | Self::Context { .. } => ErrorKind::Internal,
        }
    }
}

/// Adds [`Error::context`] to results
pub trait ResultExt<T> {
    /// Wraps the error, if any, in a context link built lazily
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::oneof_conflict("tpl.Data.buzzer", "b", "tpl.Data.kind", "tpl.Data.hoover");
        let text = err.to_string();
        assert!(text.contains("buzzer"));
        assert!(text.contains("hoover"));
        assert!(text.contains("tpl.Data.kind"));
    }

    #[test]
    fn test_context_chain() {
        let err = Error::FieldAlreadySet {
            field: "tpl.Data.name".into(),
        }
        .context("merge field 'tpl.Data.name'")
        .context("merge from message 'corpus.A'")
        .context("merge from file 'a.proto'");

        assert_eq!(
            err.to_string(),
            "merge from file 'a.proto': merge from message 'corpus.A': \
             merge field 'tpl.Data.name': field already set"
        );
        assert_eq!(err.kind(), ErrorKind::FieldAlreadySet);
    }

    #[test]
    fn test_result_ext() {
        let res: Result<()> = Err(Error::DuplicateKey { key: "k".into() });
        let err = res.with_context(|| "merge map").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert!(err.to_string().starts_with("merge map: "));
    }

    #[test]
    fn test_wire_errors_are_decode_failures() {
        assert_eq!(Error::varint_decode(3).kind(), ErrorKind::DecodeFailure);
        assert_eq!(
            Error::invalid_wire_format(0, "truncated").kind(),
            ErrorKind::DecodeFailure
        );
    }
}
