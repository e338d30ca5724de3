//! # optgen-core
//!
//! A library for aggregating custom protobuf message options across a
//! schema corpus and turning them into template data.
//!
//! This crate provides the core functionality for:
//! - Locating a message option extension, optionally narrowed to a sub-record
//! - Collecting every occurrence of the option, including occurrences only
//!   present as unrecognized wire bytes
//! - Merging the occurrences into one record under strict conflict rules
//! - Converting the record into a generic value tree and rendering it
//!
//! ## Architecture
//!
//! - [`registry`]: access to the schema corpus
//! - [`locate`], [`walk`], [`extract`], [`merge`]: the aggregation engine
//! - [`raw`]: the generic value tree and its text form
//! - [`render`], [`params`], [`generate`]: the generation pipeline
//! - [`plugin`]: protoc plugin request/response framing
//! - [`wire`]: low-level wire format reading
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use optgen_core::{generate, Globals, Params, PoolRegistry};
//! use std::fs;
//!
//! // A FileDescriptorSet, e.g. from `protoc --descriptor_set_out`
//! let set = fs::read("./schema.pb")?;
//! let registry = PoolRegistry::decode(&set)?;
//!
//! let params = Params::parse("msgopt=(my.pkg.config).tables,out=tables.json")?;
//! let file = generate(&registry, &params, &Globals::new())?;
//! println!("{}", file.content);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`SchemaRegistry`]: Supply descriptors and option storage
//! - [`TemplateRenderer`]: Render the aggregated data with any template engine
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod extract;
pub mod generate;
pub mod locate;
pub mod merge;
pub mod option_path;
pub mod params;
pub mod plugin;
pub mod raw;
pub mod registry;
pub mod render;
pub mod walk;
pub mod wire;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export primary types for convenience
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use generate::{build_data, generate, generate_with, GeneratedFile};
pub use locate::{locate, OptionTarget};
pub use merge::{merge_data, merge_record, MergeStats};
pub use option_path::OptionPath;
pub use params::{OutputFormat, Params};
pub use raw::{to_raw, RawKey, RawRecord, RawValue};
pub use registry::{PoolRegistry, SchemaRegistry};
pub use render::{Globals, JsonRenderer, TemplateRenderer, TextRenderer};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
