//! JSON descriptor canonicalization.
//!
//! The descriptor is parsed and re-emitted compactly: no whitespace between
//! tokens, object keys in document order, numbers exactly as written, and
//! every non-ASCII character escaped as `\uXXXX` so the section is pure
//! ASCII on the device side.

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Serializer, Value};
use std::io;
use std::path::Path;

use crate::error::{read_input, BundleError, Stage};

/// Parse `input` and return its compact ASCII form.
pub fn canonicalize(input: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let value: Value = serde_json::from_slice(input)?;
    to_compact_ascii(&value)
}

pub fn to_compact_ascii(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let mut ser = Serializer::with_formatter(&mut out, AsciiFormatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

/// Read the descriptor at `path` and canonicalize it.
pub fn load(path: &Path) -> Result<Vec<u8>, BundleError> {
    let raw = read_input(Stage::Descriptor, path)?;
    canonicalize(&raw).map_err(|source| BundleError::Format {
        path: Some(path.to_owned()),
        source,
    })
}

/// Compact formatter that escapes non-ASCII characters as UTF-16 `\u`
/// escapes, surrogate pairs included.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}
