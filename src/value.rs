//! Small helpers over `serde_yaml::Value` used by both the rewriter and the
//! job expander.

use crate::error::Error;
use serde_yaml::Value;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Input path that stands for standard input.
pub const STDIN: &str = "-";

pub fn is_stdin(path: &Path) -> bool {
    path == Path::new(STDIN)
}

/// Read and parse a YAML (or JSON) file, or standard input when `path` is `-`.
pub fn read_yaml(path: &Path) -> Result<Value, Error> {
    if is_stdin(path) {
        return read_yaml_from(io::stdin(), path);
    }
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_yaml(&text, path)
}

/// Parse a document from any reader; `origin` only labels errors.
pub fn read_yaml_from(reader: impl Read, origin: &Path) -> Result<Value, Error> {
    let text = io::read_to_string(reader).map_err(|source| Error::Io {
        path: origin.to_path_buf(),
        source,
    })?;
    parse_yaml(&text, origin)
}

fn parse_yaml(text: &str, origin: &Path) -> Result<Value, Error> {
    serde_yaml::from_str(text).map_err(|source| Error::ConfigLoad {
        path: origin.to_path_buf(),
        source,
    })
}

/// Short name of a node's shape, for diagnostics.
pub fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Text of a scalar node. Collections and tagged values have none.
pub fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        _ => None,
    }
}

/// Normalize a "one or many" node into a list of strings.
///
/// A bare scalar becomes a single-element list, null becomes an empty list,
/// and a sequence must hold scalars only.
pub fn string_list(at: &str, v: &Value) -> Result<Vec<String>, Error> {
    match v {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                scalar_text(item)
                    .ok_or_else(|| Error::type_mismatch(format!("{}[{}]", at, i), "scalar", item))
            })
            .collect(),
        other => scalar_text(other)
            .map(|s| vec![s])
            .ok_or_else(|| Error::type_mismatch(at, "scalar or sequence", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn bare_string_is_one_item() {
        assert_eq!(string_list("x", &yaml("foo@1.2")).unwrap(), vec!["foo@1.2"]);
    }

    #[test]
    fn sequence_items_are_rendered() {
        assert_eq!(
            string_list("x", &yaml("[a, 2, true]")).unwrap(),
            vec!["a", "2", "true"]
        );
    }

    #[test]
    fn reader_input_is_parsed() {
        let doc = read_yaml_from(&b"compiler: { gcc: { path: /usr/bin/gcc } }"[..], Path::new(STDIN))
            .unwrap();
        assert_eq!(doc, yaml("compiler: { gcc: { path: /usr/bin/gcc } }"));
        assert!(is_stdin(Path::new("-")));
        assert!(!is_stdin(Path::new("./-x.yml")));
    }

    #[test]
    fn malformed_yaml_is_a_load_error() {
        let err = read_yaml_from(&b"a: [1, 2\nb: }"[..], Path::new("broken.yml")).unwrap_err();
        match err {
            Error::ConfigLoad { path, .. } => assert_eq!(path, Path::new("broken.yml")),
            other => panic!("expected ConfigLoad, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_yaml(Path::new("/nonexistent/suite.yml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().starts_with("cannot read /nonexistent/suite.yml"));
    }

    #[test]
    fn nested_collections_are_rejected() {
        let err = string_list("deps", &yaml("[a, [b]]")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type mismatch at deps[1]: expected scalar, found sequence"
        );
    }
}
