//! Aggregated invocation output and its JSON rendering.

use std::{fs, path::Path};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::prelude::*;

/// Everything one invocation produced. A category that was not invoked is
/// absent from the JSON, never an empty placeholder. Keys come out sorted:
/// the payload maps are BTree-backed and `query` sorts before `set`.
#[derive(Debug, Default, Serialize)]
pub struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Map<String, Value>>,
}

impl Output {
    /// Render as pretty JSON to stdout, or to the file when a path is given.
    pub fn write(&self, path: Option<&Path>) -> Result {
        let rendered = serde_json::to_string_pretty(self).context("failed to render the output")?;
        match path {
            Some(path) => {
                fs::write(path, rendered).with_context(|| {
                    format!("failed to write the output file `{}`", path.display())
                })?;
                info!(path = %path.display(), "output written");
            }
            None => println!("{rendered}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_absent_categories_are_omitted() {
        let output = Output::default();
        assert_eq!(serde_json::to_value(&output).unwrap(), json!({}));
    }

    #[test]
    fn test_query_only() {
        let mut query = Map::new();
        query.insert("live".to_owned(), json!({"soc": 42}));
        let output = Output { query: Some(query), set: None };
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"query": {"live": {"soc": 42}}}),
        );
    }

    #[test]
    fn test_write_to_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("output.json");

        let mut set = Map::new();
        set.insert("powersave".to_owned(), json!({"result": "success"}));
        let output = Output { query: None, set: Some(set) };
        output.write(Some(&path)).unwrap();

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!({"set": {"powersave": {"result": "success"}}}));
    }
}
