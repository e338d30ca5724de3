//! Generator parameters.
//!
//! In plugin mode protoc passes everything after `--optgen_out=` and before
//! the `:` as one comma-separated `key=value` string.

use crate::error::{Error, Result, ResultExt};
use crate::option_path::OptionPath;
use crate::raw::{RawRecord, RawValue};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Help text describing the parameter string
pub const PARAMETER_HELP: &str = "
  Specify protoc-gen-optgen parameters as

    --optgen_out=key1=value1,key2=value2,...:output_dir

  The following keys are recognized:

  msgopt
    Message option to use as data input: the fully qualified message option
    field name, or, if an option submessage is to be used for data input, a
    value of the form

      (fully.qualified.message.option.field).subfield1.subfield2...

    Template data may contain additional fields starting with an underscore.
    These are for internal use only.

  out
    Path to the output file.

  extra=file.json
    Optional file with a JSON object whose keys are added to the template data.

  format=json|text
    Built-in renderer to use, json by default.
";

/// Built-in renderer selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// Debug text form
    Text,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(Error::invalid_parameter(format!(
                "unsupported format '{}', expected 'json' or 'text'",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// Configuration of one generation request
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    /// Which option supplies the data
    pub option_path: OptionPath,
    /// Name of the generated file
    pub output: String,
    /// Extra top-level data for the template
    pub extra: RawRecord,
    /// Built-in renderer
    pub format: OutputFormat,
}

impl Params {
    /// Creates parameters with no extra data and the default format
    pub fn new(option_path: OptionPath, output: impl Into<String>) -> Self {
        Self {
            option_path,
            output: output.into(),
            extra: RawRecord::new(),
            format: OutputFormat::default(),
        }
    }

    /// Builder method to set the extra data
    pub fn with_extra(mut self, extra: RawRecord) -> Self {
        self.extra = extra;
        self
    }

    /// Builder method to set the output format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Parses a plugin parameter string.
    ///
    /// An empty string yields an error carrying [`PARAMETER_HELP`]. Extra data
    /// files are loaded while parsing.
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::invalid_parameter(PARAMETER_HELP));
        }

        let mut option_path = None;
        let mut output = None;
        let mut extra = RawRecord::new();
        let mut format = OutputFormat::default();

        for part in input.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                return Err(Error::invalid_parameter(format!("invalid option '{}'", part)));
            };
            match key {
                "msgopt" => {
                    let path = OptionPath::parse(value)
                        .with_context(|| format!("parse message option path '{}'", value))?;
                    option_path = Some(path);
                }
                "out" => output = Some(value.to_string()),
                "extra" => extra = load_extra(value)?,
                "format" => format = value.parse()?,
                _ => {
                    return Err(Error::invalid_parameter(format!("unsupported option '{}'", key)));
                }
            }
        }

        let Some(option_path) = option_path else {
            return Err(Error::invalid_parameter("no message option specified"));
        };
        let output = match output {
            Some(output) if !output.is_empty() => output,
            _ => return Err(Error::invalid_parameter("output path is empty")),
        };

        debug!("Parameters: msgopt={} out={} format={}", option_path, output, format);
        Ok(Self::new(option_path, output)
            .with_extra(extra)
            .with_format(format))
    }
}

/// Loads a JSON file whose top level must be an object
pub fn load_extra(path: impl AsRef<Path>) -> Result<RawRecord> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
        Error::ExtraData(format!("decoding extra data file '{}': {}", path.display(), e))
    })?;
    match RawValue::from(json) {
        RawValue::Record(record) => {
            debug!("Loaded {} extra keys from {}", record.len(), path.display());
            Ok(record)
        }
        _ => Err(Error::ExtraData(format!(
            "extra data file '{}' does not contain a JSON object",
            path.display()
        ))),
    }
}
