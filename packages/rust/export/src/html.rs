//! Standalone HTML documents.

use std::path::PathBuf;
use std::sync::LazyLock;

use pulldown_cmark::{Options, Parser, html};
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, instrument};

use notebox_core::ansi::escape_html;
use notebox_core::{Cell, Exporter, Notebook, notebook_css, output_to_html};
use notebox_shared::{CellType, ExportConfig, MimeBundle, Output, Result};

static ATTACHMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"attachment:([^\s)"']+)"#).expect("valid regex"));

/// Image types embedded as `<img>` data URIs, in order of preference.
const IMAGE_MIMES: [&str; 3] = ["image/png", "image/jpeg", "image/gif"];

// ---------------------------------------------------------------------------
// Exporter
// ---------------------------------------------------------------------------

/// Renders a notebook as a complete HTML page.
#[derive(Debug, Clone)]
pub struct HtmlExporter {
    /// Embed the notebook stylesheet in `<head>`.
    pub include_css: bool,
    /// Directory searched for a `custom.css` appended to the stylesheet.
    pub css_dir: Option<PathBuf>,
    /// Leave out code cell inputs.
    pub exclude_input: bool,
    /// Leave out code cell outputs.
    pub exclude_output: bool,
    /// Page title; defaults to the notebook's `title` metadata, then its
    /// file name.
    pub title: Option<String>,
}

impl Default for HtmlExporter {
    fn default() -> Self {
        Self {
            include_css: true,
            css_dir: None,
            exclude_input: false,
            exclude_output: false,
            title: None,
        }
    }
}

impl HtmlExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            include_css: config.include_css,
            ..Self::default()
        }
    }

    pub fn include_css(mut self, include: bool) -> Self {
        self.include_css = include;
        self
    }

    pub fn css_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.css_dir = Some(dir.into());
        self
    }

    pub fn exclude_input(mut self, exclude: bool) -> Self {
        self.exclude_input = exclude;
        self
    }

    pub fn exclude_output(mut self, exclude: bool) -> Self {
        self.exclude_output = exclude;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The whole page as a string.
    #[instrument(skip_all, fields(cells = notebook.len()))]
    pub fn render(&self, notebook: &Notebook) -> Result<String> {
        let body = notebook
            .iter()
            .filter_map(|cell| self.render_cell(cell))
            .collect::<Vec<_>>()
            .join("\n");

        let page = page(
            &document_title(self.title.as_deref(), notebook),
            &self.stylesheet()?,
            "",
            &format!("<main class=\"notebook\">\n{body}\n</main>"),
        );
        debug!(bytes = page.len(), "html rendered");
        Ok(page)
    }

    pub(crate) fn stylesheet(&self) -> Result<String> {
        if self.include_css {
            notebook_css(self.css_dir.as_deref())
        } else {
            Ok(String::new())
        }
    }

    /// One cell as a `<div class="cell …">`, or `None` when nothing of it is
    /// shown.
    pub(crate) fn render_cell(&self, cell: &Cell) -> Option<String> {
        match cell.cell_type() {
            CellType::Markdown => Some(format!(
                "<div class=\"cell markdown-cell\">\n{}</div>",
                render_markdown(cell)
            )),
            CellType::Raw => render_raw(cell),
            CellType::Code => self.render_code(cell),
        }
    }

    fn render_code(&self, cell: &Cell) -> Option<String> {
        let mut parts = Vec::new();

        if !self.exclude_input && !jupyter_flag(cell, "source_hidden") {
            parts.push(format!(
                "<div class=\"input\">\n<div class=\"prompt\">{}</div>\n<div class=\"source\"><pre>{}</pre></div>\n</div>",
                prompt("In", cell.execution_count()),
                escape_html(cell.source())
            ));
        }

        if !self.exclude_output && !jupyter_flag(cell, "outputs_hidden") && cell.has_output() {
            let outputs = cell
                .outputs()
                .iter()
                .map(render_output)
                .collect::<Vec<_>>()
                .join("\n");
            let label = if cell.has_execute_result() {
                prompt("Out", cell.execution_count())
            } else {
                String::new()
            };
            parts.push(format!(
                "<div class=\"output\">\n<div class=\"prompt\">{label}</div>\n<div class=\"output-area\">\n{outputs}\n</div>\n</div>"
            ));
        }

        if parts.is_empty() {
            None
        } else {
            Some(format!(
                "<div class=\"cell code-cell\">\n{}\n</div>",
                parts.join("\n")
            ))
        }
    }
}

impl Exporter for HtmlExporter {
    fn format_name(&self) -> &str {
        "html"
    }

    fn file_extension(&self) -> &str {
        "html"
    }

    fn export(&self, notebook: &Notebook) -> Result<Vec<u8>> {
        Ok(self.render(notebook)?.into_bytes())
    }
}

// ---------------------------------------------------------------------------
// Pieces
// ---------------------------------------------------------------------------

/// Wrap `body` in an HTML page.
pub(crate) fn page(title: &str, css: &str, head_extra: &str, body: &str) -> String {
    let style = if css.is_empty() {
        String::new()
    } else {
        format!("<style>\n{css}\n</style>\n")
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{style}{head_extra}</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_html(title)
    )
}

pub(crate) fn document_title(explicit: Option<&str>, notebook: &Notebook) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| {
            notebook
                .metadata()
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .or_else(|| {
            notebook
                .file()
                .and_then(|path| path.file_stem())
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "Notebook".to_string())
}

fn prompt(label: &str, count: Option<u32>) -> String {
    match count {
        Some(n) => format!("{label}&nbsp;[{n}]:"),
        None => format!("{label}&nbsp;[&nbsp;]:"),
    }
}

/// Whether `metadata.jupyter.<key>` is `true`.
fn jupyter_flag(cell: &Cell, key: &str) -> bool {
    cell.metadata()
        .get("jupyter")
        .and_then(|j| j.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Markdown source to HTML, with `attachment:` references inlined.
pub(crate) fn render_markdown(cell: &Cell) -> String {
    let source = match cell.attachments() {
        Some(attachments) => inline_attachments(cell.source(), attachments),
        None => cell.source().to_string(),
    };

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut out = String::new();
    html::push_html(&mut out, Parser::new_ext(&source, options));
    out
}

fn inline_attachments(source: &str, attachments: &Value) -> String {
    ATTACHMENT_RE
        .replace_all(source, |caps: &Captures<'_>| {
            let name = &caps[1];
            let bundle = attachments.get(name).and_then(Value::as_object);
            let uri = bundle.and_then(|bundle| {
                bundle.iter().find_map(|(mime, data)| {
                    let data = match data {
                        Value::String(s) => s.clone(),
                        Value::Array(lines) => lines.iter().filter_map(Value::as_str).collect(),
                        _ => return None,
                    };
                    Some(format!("data:{mime};base64,{}", data.replace('\n', "")))
                })
            });
            uri.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Raw cells are passed through unless they target another format.
fn render_raw(cell: &Cell) -> Option<String> {
    let target = cell
        .metadata()
        .get("raw_mimetype")
        .or_else(|| cell.metadata().get("format"))
        .and_then(Value::as_str);
    match target {
        None | Some("text/html") => Some(cell.source().to_string()),
        Some(other) => {
            debug!(mime = other, "raw cell skipped");
            None
        }
    }
}

fn image(data: &MimeBundle) -> Option<String> {
    if let Some(svg) = data.text("image/svg+xml") {
        return Some(svg);
    }
    IMAGE_MIMES.iter().find_map(|mime| {
        data.text(mime).map(|b64| {
            format!(
                "<img src=\"data:{mime};base64,{}\">",
                b64.replace('\n', "")
            )
        })
    })
}

fn render_output(output: &Output) -> String {
    match output {
        Output::Stream { name, .. } => {
            let class = if name == "stderr" { "stderr" } else { "stdout" };
            format!(
                "<div class=\"output-stream {class}\">{}</div>",
                output_to_html(output, true)
            )
        }
        Output::Error { .. } => format!(
            "<div class=\"output-error\">{}</div>",
            output_to_html(output, true)
        ),
        Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => {
            if !data.contains("text/html") {
                if let Some(img) = image(data) {
                    return format!("<div class=\"output-image\">{img}</div>");
                }
            }
            format!(
                "<div class=\"output-text\">{}</div>",
                output_to_html(output, true)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn markdown_is_rendered() {
        let html = render_markdown(&Cell::markdown("# Title\n\n*em*"));
        assert_eq!(html, "<h1>Title</h1>\n<p><em>em</em></p>\n");
    }

    #[test]
    fn attachments_become_data_uris() {
        let node = json!({
            "cell_type": "markdown",
            "metadata": {},
            "source": "![plot](attachment:plot.png)",
            "attachments": {"plot.png": {"image/png": "iVBORw0KGgo="}}
        });
        let cell = Cell::from_node(node).unwrap();
        let html = render_markdown(&cell);
        assert!(html.contains("src=\"data:image/png;base64,iVBORw0KGgo=\""));
    }

    #[test]
    fn code_cells_show_prompts_and_escape_source() {
        let cell = Cell::code("a < b")
            .with_execution_count(3)
            .unwrap()
            .with_outputs(vec![Output::execute_result(
                Some(3),
                MimeBundle::new().with_text("text/plain", "True"),
            )])
            .unwrap();
        let html = HtmlExporter::new().render_cell(&cell).unwrap();
        assert!(html.contains("In&nbsp;[3]:"));
        assert!(html.contains("Out&nbsp;[3]:"));
        assert!(html.contains("<pre>a &lt; b</pre>"));
        assert!(html.contains("<div class=\"output-text\">True</div>"));
    }

    #[test]
    fn hidden_and_excluded_parts_are_left_out() {
        let hidden = Cell::code("secret").with_metadata_entry("jupyter", json!({"source_hidden": true}));
        assert_eq!(HtmlExporter::new().render_cell(&hidden), None);

        let cell = Cell::code("x")
            .with_outputs(vec![Output::stream("stdout", "1")])
            .unwrap();
        let html = HtmlExporter::new().exclude_output(true).render_cell(&cell).unwrap();
        assert!(!html.contains("output-area"));
    }

    #[test]
    fn raw_cells_for_other_formats_are_skipped() {
        let latex = Cell::raw("\\section{x}").with_metadata_entry("raw_mimetype", json!("text/latex"));
        assert_eq!(render_raw(&latex), None);
        assert_eq!(render_raw(&Cell::raw("<hr>")).as_deref(), Some("<hr>"));
    }

    #[test]
    fn images_are_embedded() {
        let output = Output::display_data(
            MimeBundle::new()
                .with_text("image/png", "AAAA\n")
                .with_text("text/plain", "<Figure>"),
        );
        assert_eq!(
            render_output(&output),
            "<div class=\"output-image\"><img src=\"data:image/png;base64,AAAA\"></div>"
        );
    }

    #[test]
    fn stream_names_cannot_inject_markup() {
        let output = Output::stream("\"><script>alert(1)</script>", "hi");
        let html = render_output(&output);
        assert_eq!(html, "<div class=\"output-stream stdout\">hi</div>");
        assert!(render_output(&Output::stream("stderr", "e")).contains("output-stream stderr"));
    }

    #[test]
    fn page_title_falls_back_to_file_name() {
        let nb = Notebook::new().with_file("/tmp/analysis.ipynb");
        assert_eq!(document_title(None, &nb), "analysis");
        assert_eq!(document_title(Some("Report"), &nb), "Report");
        assert_eq!(document_title(None, &Notebook::new()), "Notebook");
    }
}
