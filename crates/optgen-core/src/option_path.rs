//! Option paths: which message option, and which sub-record within it,
//! supplies the template data.
//!
//! The textual grammar is either a bare fully-qualified extension name,
//! `pkg.my_option`, or the parenthesised form followed by a chain of
//! subfields, `(pkg.my_option).sub1.sub2`.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A parsed and validated option path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionPath {
    extension: String,
    subfields: Vec<String>,
}

impl OptionPath {
    /// Creates a validated option path from its parts
    pub fn new(
        extension: impl Into<String>,
        subfields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let path = Self {
            extension: extension.into(),
            subfields: subfields.into_iter().map(Into::into).collect(),
        };
        path.validate()?;
        Ok(path)
    }

    /// Parses the textual option path grammar
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::invalid_option_path(input, "empty option path"));
        }
        let Some(rest) = input.strip_prefix('(') else {
            return Self::new(input, Vec::<String>::new());
        };
        let Some(close) = rest.find(')') else {
            return Err(Error::invalid_option_path(input, "missing ')' in option path"));
        };
        let extension = &rest[..close];
        let tail = &rest[close + 1..];
        if tail.is_empty() {
            return Self::new(extension, Vec::<String>::new());
        }
        let Some(chain) = tail.strip_prefix('.') else {
            return Err(Error::invalid_option_path(input, "expected '.' after ')'"));
        };
        Self::new(extension, chain.split('.'))
    }

    /// Fully-qualified extension field name
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Subfield chain, possibly empty
    pub fn subfields(&self) -> &[String] {
        &self.subfields
    }

    fn validate(&self) -> Result<()> {
        if !is_full_name(&self.extension) {
            return Err(Error::invalid_option_path(
                self.to_string(),
                format!("option field name '{}' is invalid", self.extension),
            ));
        }
        if let Some(bad) = self.subfields.iter().find(|s| !is_identifier(s)) {
            return Err(Error::invalid_option_path(
                self.to_string(),
                format!("invalid subfield '{}'", bad),
            ));
        }
        Ok(())
    }
}

impl FromStr for OptionPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for OptionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subfields.is_empty() {
            return f.write_str(&self.extension);
        }
        write!(f, "({})", self.extension)?;
        for subfield in &self.subfields {
            write!(f, ".{}", subfield)?;
        }
        Ok(())
    }
}

/// A protobuf identifier: a letter or `_`, then letters, digits or `_`
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A dot-separated sequence of identifiers
pub(crate) fn is_full_name(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_identifier)
}
