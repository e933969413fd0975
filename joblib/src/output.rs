use crate::error::{Error, Result};
use serde_json::Value;

/// Load the document a runner printed on stdout.
///
/// The loader is YAML, so both block style and JSON-like flow style are accepted.
/// Anything other than a top-level mapping is rejected.
pub fn parse_document(stdout: &[u8]) -> Result<Value> {
    let doc: serde_yaml::Value =
        serde_yaml::from_slice(stdout).map_err(|err| Error::OutputParse(err.to_string()))?;
    if !doc.is_mapping() {
        return Err(Error::OutputParse(format!(
            "expected a mapping at the top level, found {}",
            kind(&doc)
        )));
    }
    serde_json::to_value(doc).map_err(|err| Error::OutputParse(err.to_string()))
}

/// Decode a submitted payload for the `input` field of a status snapshot.
pub fn decode_input(payload: &[u8]) -> Value {
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()))
}

fn kind(doc: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value::*;
    match doc {
        Null => "nothing",
        Bool(_) => "a boolean",
        Number(_) => "a number",
        String(_) => "a string",
        Sequence(_) => "a sequence",
        Mapping(_) => "a mapping",
        Tagged(_) => "a tagged value",
    }
}
