//! Text rendering of the generic tree, used for debugging templates.
//!
//! The output is deterministic: record fields and map entries are sorted,
//! nesting is indented two spaces per level.

use super::{RawKey, RawRecord, RawValue};
use std::fmt::{self, Write};

const INDENT: &str = "  ";

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, 0)
    }
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_record(f, self, 0)
    }
}

fn write_value(out: &mut dyn Write, value: &RawValue, depth: usize) -> fmt::Result {
    match value {
        RawValue::Null => out.write_str("null"),
        RawValue::Bool(v) => write!(out, "{}", v),
        RawValue::I32(v) => write!(out, "{}", v),
        RawValue::I64(v) => write!(out, "{}", v),
        RawValue::U32(v) => write!(out, "{}", v),
        RawValue::U64(v) => write!(out, "{}", v),
        RawValue::F32(v) => write!(out, "{}", v),
        RawValue::F64(v) => write!(out, "{}", v),
        RawValue::String(v) => write!(out, "{:?}", v),
        RawValue::Bytes(v) => write!(out, "\"{}\"", v.escape_ascii()),
        RawValue::Enum(name) => out.write_str(name),
        RawValue::List(items) => {
            let items: Vec<_> = items.iter().filter(|v| !matches!(v, RawValue::Null)).collect();
            write_block(out, ('[', ']'), &items, depth, |out, item| {
                write_value(out, item, depth + 1)
            })
        }
        RawValue::Map(entries) => {
            let entries: Vec<_> = entries
                .iter()
                .filter(|(_, v)| !matches!(v, RawValue::Null))
                .collect();
            write_block(out, ('{', '}'), &entries, depth, |out, (key, value)| {
                match key {
                    RawKey::String(key) => write!(out, "{:?}: ", key)?,
                    key => write!(out, "{}: ", key)?,
                }
                write_value(out, value, depth + 1)
            })
        }
        RawValue::Record(record) => write_record(out, record, depth),
    }
}

fn write_record(out: &mut dyn Write, record: &RawRecord, depth: usize) -> fmt::Result {
    let fields: Vec<_> = record
        .iter()
        .filter(|(key, value)| {
            !key.is_empty() && !key.starts_with('_') && !matches!(value, RawValue::Null)
        })
        .collect();
    write_block(out, ('{', '}'), &fields, depth, |out, (key, value)| {
        write!(out, "{}: ", key)?;
        write_value(out, value, depth + 1)
    })
}

/// Writes `items` one per line between `delims`, or just the delimiters if
/// there are none
fn write_block<T>(
    out: &mut dyn Write,
    delims: (char, char),
    items: &[T],
    depth: usize,
    mut write_item: impl FnMut(&mut dyn Write, &T) -> fmt::Result,
) -> fmt::Result {
    let (open, close) = delims;
    if items.is_empty() {
        out.write_char(open)?;
        return out.write_char(close);
    }
    out.write_char(open)?;
    out.write_char('\n')?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.write_str(",\n")?;
        }
        indent(out, depth + 1)?;
        write_item(out, item)?;
    }
    out.write_char('\n')?;
    indent(out, depth)?;
    out.write_char(close)
}

fn indent(out: &mut dyn Write, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        out.write_str(INDENT)?;
    }
    Ok(())
}
