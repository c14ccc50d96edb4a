use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};

// -----------------------------------------------------------------------------
// ----- JSON text -------------------------------------------------------------

/// Serializes a JSON value with `", "` between items and `": "` after keys,
/// e.g. `[1, "a", true]`. Browser clients compare payload strings, so the
/// spacing is part of the wire format.
pub fn to_json_text<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::with_capacity(64);
    let mut ser = Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;

    // serde_json only ever writes UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// -----------------------------------------------------------------------------
// ----- Internal: SpacedFormatter ---------------------------------------------

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn spaced_array() {
        let text = to_json_text(&json!([1, "a", true])).unwrap();
        assert_eq!(text, r#"[1, "a", true]"#);
    }

    #[test]
    fn decodes_back_to_the_same_structure() {
        let original = json!([1, "a", true, {"k": [2.5, null]}]);
        let text = to_json_text(&original).unwrap();
        let decoded: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_containers_have_no_padding() {
        assert_eq!(to_json_text(&json!([])).unwrap(), "[]");
        assert_eq!(to_json_text(&json!({})).unwrap(), "{}");
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
