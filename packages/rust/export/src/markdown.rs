//! Markdown documents.

use tracing::instrument;

use notebox_core::{Cell, Exporter, Notebook, output_to_plain};
use notebox_shared::{CellType, Output, Result};

use crate::document::Document;

/// Writes markdown cells verbatim, code cells as fenced blocks and their
/// outputs as indented text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkdownExporter {
    /// Leave code cell outputs out.
    pub exclude_output: bool,
}

impl MarkdownExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_output(mut self, exclude: bool) -> Self {
        self.exclude_output = exclude;
        self
    }

    #[instrument(skip_all, fields(cells = notebook.len()))]
    pub fn render(&self, notebook: &Notebook) -> String {
        let language = notebook.language().unwrap_or("python").to_ascii_lowercase();
        let mut doc = Document::new("\n\n");
        for cell in notebook.iter().filter(|c| !c.is_empty() || c.has_output()) {
            doc.push(self.render_cell(cell, &language));
        }
        doc.finish()
    }

    fn render_cell(&self, cell: &Cell, language: &str) -> String {
        match cell.cell_type() {
            CellType::Markdown | CellType::Raw => cell.source().to_string(),
            CellType::Code => {
                let source = cell.source();
                let newline = if source.ends_with('\n') { "" } else { "\n" };
                let mut block = format!("```{language}\n{source}{newline}```");
                if !self.exclude_output {
                    for output in cell.outputs() {
                        if let Some(text) = render_output(output) {
                            block.push_str("\n\n");
                            block.push_str(&text);
                        }
                    }
                }
                block
            }
        }
    }
}

/// Output text indented four spaces; images become `![mime](data:…)`.
fn render_output(output: &Output) -> Option<String> {
    if let Some(data) = output.data() {
        if !data.contains("text/plain") {
            for mime in ["image/png", "image/jpeg"] {
                if let Some(b64) = data.text(mime) {
                    let kind = mime.trim_start_matches("image/");
                    return Some(format!(
                        "![{kind}](data:{mime};base64,{})",
                        b64.replace('\n', "")
                    ));
                }
            }
        }
    }

    let text = output_to_plain(output);
    let text = text.trim_end_matches('\n');
    if text.is_empty() {
        return None;
    }
    Some(
        text.lines()
            .map(|line| format!("    {line}"))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

impl Exporter for MarkdownExporter {
    fn format_name(&self) -> &str {
        "markdown"
    }

    fn file_extension(&self) -> &str {
        "md"
    }

    fn export(&self, notebook: &Notebook) -> Result<Vec<u8>> {
        Ok(self.render(notebook).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use notebox_shared::MimeBundle;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cells_and_outputs() {
        let nb = Notebook::from_cells([
            Cell::markdown("# Report"),
            Cell::code("print('a')\nprint('b')\n")
                .with_outputs(vec![Output::stream("stdout", "a\nb\n")])
                .unwrap(),
            Cell::code(""),
            Cell::code("1 + 1")
                .with_outputs(vec![Output::execute_result(
                    Some(2),
                    MimeBundle::new().with_text("text/plain", "2"),
                )])
                .unwrap(),
        ]);

        assert_eq!(
            MarkdownExporter::new().render(&nb),
            "# Report\n\n```python\nprint('a')\nprint('b')\n```\n\n    a\n    b\n\n```python\n1 + 1\n```\n\n    2\n"
        );
    }

    #[test]
    fn outputs_can_be_excluded() {
        let nb = Notebook::from_cells([Cell::code("x")
            .with_outputs(vec![Output::stream("stdout", "noise")])
            .unwrap()]);
        assert_eq!(
            MarkdownExporter::new().exclude_output(true).render(&nb),
            "```python\nx\n```\n"
        );
    }

    #[test]
    fn sources_are_copied_verbatim() {
        let code = "s = '''a   \n\n\n\n\nb'''";
        let prose = "line one  \nline two";
        let nb = Notebook::from_cells([Cell::markdown(prose), Cell::code(code)]);
        assert_eq!(
            MarkdownExporter::new().render(&nb),
            format!("{prose}\n\n```python\n{code}\n```\n")
        );
    }

    #[test]
    fn images_are_inlined() {
        let output = Output::display_data(MimeBundle::new().with_text("image/png", "QUJD"));
        assert_eq!(
            render_output(&output).as_deref(),
            Some("![png](data:image/png;base64,QUJD)")
        );
    }
}
