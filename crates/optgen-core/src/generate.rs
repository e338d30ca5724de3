//! The generation pipeline: locate the option, merge every occurrence,
//! convert, add extra data, render.

use crate::error::{Error, Result, ResultExt};
use crate::locate::locate;
use crate::merge::merge_data;
use crate::params::{OutputFormat, Params};
use crate::raw::{to_raw, RawRecord, ORIGINAL_MESSAGE_KEY};
use crate::registry::SchemaRegistry;
use crate::render::{Globals, JsonRenderer, TemplateRenderer, TextRenderer};
use tracing::debug;

/// One generated output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// File name relative to the output directory
    pub name: String,
    /// File content
    pub content: String,
}

/// Aggregates the data record for `params` without rendering it
pub fn build_data(registry: &dyn SchemaRegistry, params: &Params) -> Result<RawRecord> {
    let (target, mut record) = locate(registry, &params.option_path)
        .with_context(|| format!("locate option '{}'", params.option_path))?;
    merge_data(registry, &target, &mut record)?;

    let mut data = to_raw(&record);
    for (key, value) in params.extra.iter() {
        if key == ORIGINAL_MESSAGE_KEY || data.contains_key(key) {
            return Err(Error::ExtraData(format!(
                "extra data key '{}' already present in proto data",
                key
            )));
        }
        data.insert(key, value.clone());
    }
    Ok(data)
}

/// Runs the whole pipeline with an explicit renderer
pub fn generate_with(
    registry: &dyn SchemaRegistry,
    params: &Params,
    renderer: &dyn TemplateRenderer,
    globals: &Globals,
) -> Result<GeneratedFile> {
    let data = build_data(registry, params)?;

    let mut out = Vec::new();
    renderer.render(&data, globals, &mut out)?;
    let content = String::from_utf8(out)
        .map_err(|e| Error::Render(format!("output is not valid UTF-8: {}", e)))?;

    debug!("Generated {} ({} bytes)", params.output, content.len());
    Ok(GeneratedFile {
        name: params.output.clone(),
        content,
    })
}

/// Runs the whole pipeline with the built-in renderer `params` selects
pub fn generate(
    registry: &dyn SchemaRegistry,
    params: &Params,
    globals: &Globals,
) -> Result<GeneratedFile> {
    match params.format {
        OutputFormat::Json => generate_with(registry, params, &JsonRenderer, globals),
        OutputFormat::Text => generate_with(registry, params, &TextRenderer, globals),
    }
}
