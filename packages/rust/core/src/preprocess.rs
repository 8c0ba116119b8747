//! Built-in notebook preprocessors: output, metadata and tag clearing, and
//! tag-driven removal of cells, inputs and outputs.

use serde_json::{Value, json};
use tracing::debug;

use notebox_shared::{CellType, Metadata, Output};

use crate::notebook::Notebook;

/// Cell metadata keys that only describe the output area's UI state.
const OUTPUT_UI_KEYS: [&str; 2] = ["collapsed", "scrolled"];

/// Which metadata survives [`Notebook::clear_metadata_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataClearing {
    /// Cell metadata keys kept.
    pub preserve_cell_keys: Vec<String>,
    /// Notebook metadata keys kept.
    pub preserve_notebook_keys: Vec<String>,
    /// Whether notebook-level metadata is cleared at all.
    pub clear_notebook: bool,
}

impl Default for MetadataClearing {
    fn default() -> Self {
        Self {
            preserve_cell_keys: Vec::new(),
            preserve_notebook_keys: vec!["kernelspec".into(), "language_info".into()],
            clear_notebook: true,
        }
    }
}

/// Tag-driven removal, applied by [`Notebook::remove_tagged`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRemoval {
    /// Cells carrying any of these tags are dropped.
    pub remove_cell_tags: Vec<String>,
    /// Cells carrying any of these tags lose all outputs.
    pub remove_all_outputs_tags: Vec<String>,
    /// Outputs whose own `metadata.tags` carry any of these are dropped.
    pub remove_single_output_tags: Vec<String>,
    /// Cells carrying any of these tags have their input hidden
    /// (`metadata.jupyter.source_hidden`).
    pub remove_input_tags: Vec<String>,
}

impl TagRemoval {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove_cells<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.remove_cell_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn remove_all_outputs<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        tags: I,
    ) -> Self {
        self.remove_all_outputs_tags
            .extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn remove_single_outputs<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        tags: I,
    ) -> Self {
        self.remove_single_output_tags
            .extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn remove_inputs<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.remove_input_tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

fn output_tagged(output: &Output, tags: &[String]) -> bool {
    let metadata = match output {
        Output::DisplayData { metadata, .. } | Output::ExecuteResult { metadata, .. } => metadata,
        _ => return false,
    };
    metadata
        .get("tags")
        .and_then(Value::as_array)
        .is_some_and(|own| own.iter().filter_map(Value::as_str).any(|t| tags.iter().any(|x| x == t)))
}

impl Notebook {
    /// Empty every code cell's outputs and reset execution counts.
    pub fn clear_outputs(&mut self) {
        for cell in self.iter_mut() {
            if cell.cell_type() != CellType::Code {
                continue;
            }
            cell.outputs_mut().clear();
            // Code cells always accept an execution count.
            let _ = cell.set_execution_count(None);
            for key in OUTPUT_UI_KEYS {
                cell.metadata_mut().remove(key);
            }
        }
        debug!(cells = self.len(), "outputs cleared");
    }

    pub fn cleared_outputs(&self) -> Notebook {
        let mut nb = self.clone();
        nb.clear_outputs();
        nb
    }

    /// Clear cell metadata and notebook metadata, keeping the kernel and
    /// language descriptions.
    pub fn clear_metadata(&mut self) {
        self.clear_metadata_with(&MetadataClearing::default());
    }

    pub fn clear_metadata_with(&mut self, options: &MetadataClearing) {
        for cell in self.iter_mut() {
            retain_keys(cell.metadata_mut(), &options.preserve_cell_keys);
        }
        if options.clear_notebook {
            retain_keys(self.metadata_mut(), &options.preserve_notebook_keys);
        }
        debug!("metadata cleared");
    }

    pub fn cleared_metadata(&self) -> Notebook {
        let mut nb = self.clone();
        nb.clear_metadata();
        nb
    }

    /// Drop every cell's `tags`.
    pub fn clear_tags(&mut self) {
        for cell in self.iter_mut() {
            cell.metadata_mut().remove("tags");
        }
    }

    pub fn cleared_tags(&self) -> Notebook {
        let mut nb = self.clone();
        nb.clear_tags();
        nb
    }

    /// Apply tag-driven removal.
    pub fn remove_tagged(&mut self, removal: &TagRemoval) {
        let before = self.len();
        self.raw_cells_mut()
            .retain(|cell| !cell.has_any_tag(&removal.remove_cell_tags));

        for cell in self.iter_mut() {
            if cell.has_any_tag(&removal.remove_input_tags) {
                let jupyter = cell
                    .metadata_mut()
                    .entry("jupyter")
                    .or_insert_with(|| json!({}));
                if let Some(object) = jupyter.as_object_mut() {
                    object.insert("source_hidden".into(), Value::Bool(true));
                }
            }

            if cell.cell_type() != CellType::Code {
                continue;
            }
            if cell.has_any_tag(&removal.remove_all_outputs_tags) {
                cell.outputs_mut().clear();
            } else if !removal.remove_single_output_tags.is_empty() {
                cell.outputs_mut()
                    .retain(|o| !output_tagged(o, &removal.remove_single_output_tags));
            }
        }
        debug!(removed = before - self.len(), "tagged cells removed");
    }
}

fn retain_keys(metadata: &mut Metadata, keep: &[String]) {
    metadata.retain(|key, _| keep.iter().any(|k| k == key));
}
