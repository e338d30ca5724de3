//! protoc plugin framing.
//!
//! protoc sends a `CodeGeneratorRequest` and expects a
//! `CodeGeneratorResponse`. Failures are reported in the response's `error`
//! field rather than through the exit status.

use crate::error::{Error, Result, ResultExt};
use crate::generate::{generate, GeneratedFile};
use crate::params::{Params, PARAMETER_HELP};
use crate::registry::PoolRegistry;
use crate::render::Globals;
use crate::wire::{put_len_field, FieldIter, WireType};
use prost::Message;
use prost_types::compiler::code_generator_response::{Feature, File};
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use tracing::{debug, warn};

/// `CodeGeneratorRequest.proto_file`
const REQUEST_PROTO_FILE: u32 = 15;
/// `FileDescriptorSet.file`
const SET_FILE: u32 = 1;

/// A decoded request: the parameter string and the schema corpus
#[derive(Debug, Clone)]
pub struct PluginRequest {
    /// The raw parameter string, if protoc passed one
    pub parameter: Option<String>,
    /// Files to generate for, as named on the protoc command line
    pub file_to_generate: Vec<String>,
    /// Registry over every file in the request
    pub registry: PoolRegistry,
}

impl PluginRequest {
    /// Decodes an encoded `CodeGeneratorRequest`.
    ///
    /// The typed request drops custom options, so the `proto_file` entries
    /// are re-framed from the raw bytes into a `FileDescriptorSet`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let request = CodeGeneratorRequest::decode(bytes)
            .map_err(Error::from)
            .with_context(|| "unmarshal CodeGeneratorRequest")?;

        let mut set = Vec::with_capacity(bytes.len());
        for field in FieldIter::new(bytes) {
            let field = field?;
            if field.number == REQUEST_PROTO_FILE && field.wire_type == WireType::Len {
                put_len_field(SET_FILE, field.payload, &mut set);
            }
        }
        let registry = PoolRegistry::decode(&set).with_context(|| "register proto files")?;

        debug!(
            "Request with {} proto files, {} to generate",
            request.proto_file.len(),
            request.file_to_generate.len()
        );
        Ok(Self {
            parameter: request.parameter,
            file_to_generate: request.file_to_generate,
            registry,
        })
    }

    /// Parses the parameter string; a missing parameter yields the help text
    pub fn params(&self) -> Result<Params> {
        match &self.parameter {
            Some(parameter) => Params::parse(parameter),
            None => Err(Error::invalid_parameter(PARAMETER_HELP)),
        }
    }
}

/// Handles one encoded request and returns the response to send back
pub fn run(request: &[u8], globals: &Globals) -> CodeGeneratorResponse {
    let mut response = CodeGeneratorResponse {
        supported_features: Some(Feature::Proto3Optional as u64),
        ..Default::default()
    };
    match process(request, globals) {
        Ok(file) => {
            response.file.push(File {
                name: Some(file.name),
                content: Some(file.content),
                ..Default::default()
            });
        }
        Err(e) => {
            warn!("Generation failed: {}", e);
            response.error = Some(e.to_string());
        }
    }
    response
}

fn process(request: &[u8], globals: &Globals) -> Result<GeneratedFile> {
    let request = PluginRequest::decode(request)?;
    let params = request.params()?;
    generate(&request.registry, &params, globals)
}
