//! The converter seam.

use std::path::Path;

use tracing::{info, instrument};

use notebox_shared::{NoteboxError, Result};

use crate::notebook::Notebook;

/// Turns a notebook into another document format.
pub trait Exporter {
    /// Short format name, e.g. `html`.
    fn format_name(&self) -> &str;

    /// Extension (without dot) of files in this format.
    fn file_extension(&self) -> &str;

    /// Render `notebook` in this format.
    fn export(&self, notebook: &Notebook) -> Result<Vec<u8>>;
}

impl Notebook {
    /// Render with `exporter`.
    pub fn export(&self, exporter: &dyn Exporter) -> Result<Vec<u8>> {
        exporter.export(self)
    }

    /// Render with `exporter` and write the result to `path`.
    #[instrument(skip_all, fields(format = exporter.format_name(), path = %path.as_ref().display()))]
    pub fn export_to(&self, path: impl AsRef<Path>, exporter: &dyn Exporter) -> Result<()> {
        let path = path.as_ref();
        let bytes = exporter.export(self)?;
        std::fs::write(path, &bytes).map_err(|e| NoteboxError::io(path, e))?;
        info!(bytes = bytes.len(), "notebook exported");
        Ok(())
    }
}

/// Writes the notebook document itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpynbExporter;

impl Exporter for IpynbExporter {
    fn format_name(&self) -> &str {
        "ipynb"
    }

    fn file_extension(&self) -> &str {
        "ipynb"
    }

    fn export(&self, notebook: &Notebook) -> Result<Vec<u8>> {
        Ok(notebook.to_json_string()?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    struct Sources;

    impl Exporter for Sources {
        fn format_name(&self) -> &str {
            "sources"
        }

        fn file_extension(&self) -> &str {
            "txt"
        }

        fn export(&self, notebook: &Notebook) -> Result<Vec<u8>> {
            let text: Vec<&str> = notebook.iter().map(Cell::source).collect();
            Ok(text.join("\n").into_bytes())
        }
    }

    #[test]
    fn export_to_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let nb = Notebook::from_cells([Cell::code("a"), Cell::markdown("b")]);

        nb.export_to(&path, &Sources).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb");
    }

    #[test]
    fn ipynb_exporter_writes_the_document() {
        let nb = Notebook::from_cells([Cell::code("x = 1")]);
        let bytes = nb.export(&IpynbExporter).unwrap();
        let back: Notebook = String::from_utf8(bytes).unwrap().parse().unwrap();
        assert_eq!(back[0].source(), "x = 1");
    }
}
