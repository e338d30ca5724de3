//! Rendering of the aggregated data.
//!
//! Template engines plug in through [`TemplateRenderer`]. Two renderers ship
//! with the crate: [`JsonRenderer`] for consumption by external tools, and
//! [`TextRenderer`] printing the debug text form of the tree.

use crate::error::{Error, Result};
use crate::raw::{RawRecord, RawValue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;

/// Renders the root record of one generation request.
///
/// Implementations receive the named-variable store of the request so
/// templates can keep state across template invocations.
pub trait TemplateRenderer {
    /// Writes the rendered output for `data`
    fn render(&self, data: &RawRecord, globals: &Globals, out: &mut dyn Write) -> Result<()>;
}

/// Pretty-printed JSON of the root record
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl TemplateRenderer for JsonRenderer {
    fn render(&self, data: &RawRecord, _globals: &Globals, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, data)
            .map_err(|e| Error::Render(format!("failed to write JSON: {}", e)))?;
        writeln!(out).map_err(|e| Error::Render(e.to_string()))
    }
}

/// The debug text form of the root record
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl TemplateRenderer for TextRenderer {
    fn render(&self, data: &RawRecord, _globals: &Globals, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "{}", data).map_err(|e| Error::Render(e.to_string()))
    }
}

/// Named variables shared by the templates of a generation request.
///
/// Every access takes the lock, so one store can be shared through an `Arc`
/// by concurrent requests.
#[derive(Debug, Default)]
pub struct Globals {
    vars: Mutex<HashMap<String, RawValue>>,
}

impl Globals {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any previous value
    pub fn set(&self, name: impl Into<String>, value: RawValue) {
        self.vars.lock().insert(name.into(), value);
    }

    /// Returns a copy of the value of `name`
    pub fn get(&self, name: &str) -> Result<RawValue> {
        self.vars
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownGlobal {
                name: name.to_string(),
            })
    }

    /// Unsets `name`. Unsetting an unknown name is not an error.
    pub fn delete(&self, name: &str) {
        self.vars.lock().remove(name);
    }

    /// Number of variables currently set
    pub fn len(&self) -> usize {
        self.vars.lock().len()
    }

    /// Whether no variable is set
    pub fn is_empty(&self) -> bool {
        self.vars.lock().is_empty()
    }
}
