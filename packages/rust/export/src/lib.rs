//! Built-in notebook converters.
//!
//! Each converter implements [`notebox_core::Exporter`]:
//! - [`HtmlExporter`]: standalone HTML page
//! - [`SlidesExporter`]: reveal.js presentation
//! - [`ScriptExporter`]: source file in the kernel's language
//! - [`MarkdownExporter`]: Markdown document
//!
//! Formats these don't cover (PDF, LaTeX…) are delegated to nbconvert by
//! `notebox-kernel`.

mod document;
pub mod html;
pub mod markdown;
pub mod script;
pub mod slides;

use std::path::Path;

use notebox_core::{Exporter, IpynbExporter, Notebook};
use notebox_shared::{ExportConfig, Result};

pub use html::HtmlExporter;
pub use markdown::MarkdownExporter;
pub use notebox_core::css::{NOTEBOOK_CSS, extract_css, notebook_css};
pub use script::ScriptExporter;
pub use slides::{SlideType, SlidesExporter};

/// Names accepted by [`exporter_for`].
pub const FORMATS: [&str; 5] = ["html", "slides", "script", "markdown", "ipynb"];

/// The built-in exporter for a format name, configured for `notebook`.
///
/// Returns `None` for formats only nbconvert can produce.
pub fn exporter_for(
    format: &str,
    notebook: &Notebook,
    config: &ExportConfig,
) -> Option<Box<dyn Exporter>> {
    let exporter: Box<dyn Exporter> = match format.to_ascii_lowercase().as_str() {
        "html" => Box::new(HtmlExporter::from_config(config)),
        "slides" => Box::new(SlidesExporter::new().with_html(HtmlExporter::from_config(config))),
        "script" | "python" => Box::new(ScriptExporter::for_notebook(notebook)),
        "markdown" | "md" => Box::new(MarkdownExporter::new()),
        "ipynb" | "notebook" => Box::new(IpynbExporter),
        _ => return None,
    };
    Some(exporter)
}

/// Export shorthands on [`Notebook`].
pub trait ExportExt {
    fn to_html(&self, path: impl AsRef<Path>) -> Result<()>;

    fn to_slides(&self, path: impl AsRef<Path>) -> Result<()>;

    fn to_script(&self, path: impl AsRef<Path>) -> Result<()>;

    fn to_markdown(&self, path: impl AsRef<Path>) -> Result<()>;

    /// The notebook as an HTML page (with CSS).
    fn to_html_string(&self) -> Result<String>;
}

impl ExportExt for Notebook {
    fn to_html(&self, path: impl AsRef<Path>) -> Result<()> {
        self.export_to(path, &HtmlExporter::new())
    }

    fn to_slides(&self, path: impl AsRef<Path>) -> Result<()> {
        self.export_to(path, &SlidesExporter::new())
    }

    fn to_script(&self, path: impl AsRef<Path>) -> Result<()> {
        self.export_to(path, &ScriptExporter::for_notebook(self))
    }

    fn to_markdown(&self, path: impl AsRef<Path>) -> Result<()> {
        self.export_to(path, &MarkdownExporter::new())
    }

    fn to_html_string(&self) -> Result<String> {
        HtmlExporter::new().render(self)
    }
}
