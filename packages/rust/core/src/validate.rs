//! Structural checks for nbformat v4 documents.
//!
//! This is not a full JSON-schema validator: the serde model already
//! enforces field types, so only the constraints it cannot express are
//! checked here.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use notebox_shared::{NB_FORMAT, NoteboxError, Result};

use crate::notebook::Notebook;

static CELL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").expect("valid regex"));

impl Notebook {
    /// Check the document against the nbformat v4 constraints.
    pub fn validate(&self) -> Result<()> {
        let (major, minor) = self.version();
        if major != NB_FORMAT {
            return Err(NoteboxError::UnsupportedVersion { major, minor });
        }

        let mut ids = HashSet::new();
        for (index, cell) in self.iter().enumerate() {
            match cell.id() {
                Some(id) if minor < 5 => {
                    return Err(NoteboxError::validation(format!(
                        "cell {index} has id '{id}' but nbformat 4.{minor} has no cell ids"
                    )));
                }
                Some(id) => {
                    if !CELL_ID_RE.is_match(id) {
                        return Err(NoteboxError::validation(format!(
                            "cell {index} has malformed id '{id}'"
                        )));
                    }
                    if !ids.insert(id) {
                        return Err(NoteboxError::validation(format!(
                            "cell {index} repeats id '{id}'"
                        )));
                    }
                }
                None if minor >= 5 => {
                    return Err(NoteboxError::validation(format!(
                        "cell {index} is missing an id required by nbformat 4.{minor}"
                    )));
                }
                None => {}
            }

            if let Some(tags) = cell.metadata().get("tags") {
                let valid = tags
                    .as_array()
                    .is_some_and(|items| items.iter().all(|t| t.as_str().is_some_and(|s| !s.is_empty())));
                if !valid {
                    return Err(NoteboxError::validation(format!(
                        "cell {index} metadata.tags must be an array of non-empty strings"
                    )));
                }
            }
        }

        if let Some(spec) = self.metadata().get("kernelspec") {
            let named = spec.get("name").is_some_and(Value::is_string);
            if !named {
                return Err(NoteboxError::validation(
                    "metadata.kernelspec must have a string 'name'",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cell::Cell;

    #[test]
    fn fresh_notebook_validates() {
        let nb = Notebook::from_cells([Cell::code("x"), Cell::markdown("y")]);
        nb.validate().unwrap();
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let nb = Notebook::from_cells([Cell::code("x").with_id("not valid!")]);
        let err = nb.validate().unwrap_err();
        assert!(err.to_string().contains("malformed id"));
    }

    #[test]
    fn tags_must_be_strings() {
        let nb = Notebook::from_cells([Cell::code("x").with_metadata_entry("tags", json!([1]))]);
        assert!(nb.validate().is_err());
    }

    #[test]
    fn kernelspec_needs_a_name() {
        let mut nb = Notebook::new();
        nb.metadata_mut()
            .insert("kernelspec".into(), json!({"display_name": "Python"}));
        assert!(nb.validate().is_err());
    }

    #[test]
    fn reading_runs_validation() {
        let text = r#"{
 "cells": [{"cell_type": "code", "id": "a", "metadata": {"tags": "oops"}, "source": "", "outputs": [], "execution_count": null}],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 5
}"#;
        let err = text.parse::<Notebook>().unwrap_err();
        assert!(matches!(err, NoteboxError::Validation { .. }));
    }
}
