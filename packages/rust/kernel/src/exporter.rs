//! Formats delegated to nbconvert.

use tracing::instrument;

use notebox_core::{Exporter, Notebook};
use notebox_shared::{NoteboxError, Result};

use crate::bridge::Nbconvert;

/// Converts through `nbconvert --to <format>`.
#[derive(Debug, Clone)]
pub struct NbconvertExporter {
    nbconvert: Nbconvert,
    format: String,
    extension: String,
}

impl NbconvertExporter {
    /// Exporter for any nbconvert format; the extension is guessed from the
    /// format name.
    pub fn new(nbconvert: Nbconvert, format: impl Into<String>) -> Self {
        let format = format.into();
        let extension = match format.as_str() {
            "pdf" | "webpdf" | "qtpdf" => "pdf",
            "latex" => "tex",
            "markdown" => "md",
            "notebook" => "ipynb",
            "script" | "python" => "py",
            "qtpng" => "png",
            other => other,
        }
        .to_string();
        Self {
            nbconvert,
            format,
            extension,
        }
    }

    /// PDF via LaTeX.
    pub fn pdf(nbconvert: Nbconvert) -> Self {
        Self::new(nbconvert, "pdf")
    }

    /// PDF via a headless browser.
    pub fn webpdf(nbconvert: Nbconvert) -> Self {
        Self::new(nbconvert, "webpdf")
    }

    pub fn latex(nbconvert: Nbconvert) -> Self {
        Self::new(nbconvert, "latex")
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl Exporter for NbconvertExporter {
    fn format_name(&self) -> &str {
        &self.format
    }

    fn file_extension(&self) -> &str {
        &self.extension
    }

    #[instrument(skip_all, fields(format = %self.format))]
    fn export(&self, notebook: &Notebook) -> Result<Vec<u8>> {
        let input = notebook.to_json_string()?;
        let cwd = notebook
            .file()
            .and_then(|file| file.parent())
            .filter(|dir| !dir.as_os_str().is_empty());
        let args = vec!["--to".to_string(), self.format.clone()];

        self.nbconvert
            .run(input.as_bytes(), &args, cwd)
            .map_err(|e| NoteboxError::Export(format!("nbconvert --to {} failed: {e}", self.format)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_follow_format() {
        let nbconvert = Nbconvert::new("jupyter");
        assert_eq!(NbconvertExporter::pdf(nbconvert.clone()).file_extension(), "pdf");
        assert_eq!(NbconvertExporter::webpdf(nbconvert.clone()).file_extension(), "pdf");
        assert_eq!(NbconvertExporter::latex(nbconvert.clone()).file_extension(), "tex");
        assert_eq!(NbconvertExporter::new(nbconvert.clone(), "rst").file_extension(), "rst");
        let custom = NbconvertExporter::new(nbconvert, "asciidoc").extension("adoc");
        assert_eq!(custom.format_name(), "asciidoc");
        assert_eq!(custom.file_extension(), "adoc");
    }

    #[cfg(unix)]
    #[test]
    fn runs_in_notebook_directory() {
        use notebox_core::Cell;

        let dir = tempfile::tempdir().unwrap();
        // Prints the requested format, proving args and cwd reach nbconvert.
        std::fs::write(dir.path().join("nbconvert"), "printf '%s' \"$2\"\n").unwrap();
        let sh = which::which("sh").unwrap();

        let nb = Notebook::from_cells([Cell::code("1")]).with_file(dir.path().join("nb.ipynb"));
        let bytes = nb
            .export(&NbconvertExporter::new(Nbconvert::new(&sh), "rst"))
            .unwrap();
        assert_eq!(bytes, b"rst");

        let elsewhere = Notebook::new();
        let err = elsewhere
            .export(&NbconvertExporter::pdf(Nbconvert::new(&sh)))
            .unwrap_err();
        assert!(matches!(err, NoteboxError::Export(_)));
    }
}
