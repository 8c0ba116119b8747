//! The outputs accessor of a code cell and the text/HTML projections.

use tracing::warn;

use notebox_shared::{Output, OutputType};

use crate::ansi::{ansi_to_html, escape_html, strip_ansi};
use crate::css::NOTEBOOK_CSS;

// ---------------------------------------------------------------------------
// Options and filters
// ---------------------------------------------------------------------------

/// How outputs are rendered by [`Outputs::as_html`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Render error tracebacks with `ansi-*` classes instead of stripping
    /// their colours.
    pub use_css: bool,
    /// Prefix the result with the notebook `<style>` block.
    pub include_css: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            use_css: true,
            include_css: false,
        }
    }
}

/// Output selection criteria. Absent criteria always match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFilter {
    output_types: Option<Vec<OutputType>>,
    mime_types: Option<Vec<String>>,
}

impl OutputFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match outputs of this type (cumulative).
    pub fn output_type(mut self, output_type: OutputType) -> Self {
        self.output_types.get_or_insert_with(Vec::new).push(output_type);
        self
    }

    /// Match outputs of any of these types.
    pub fn output_types(mut self, types: impl IntoIterator<Item = OutputType>) -> Self {
        self.output_types.get_or_insert_with(Vec::new).extend(types);
        self
    }

    /// Match display/execute outputs carrying this MIME type (cumulative).
    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_types.get_or_insert_with(Vec::new).push(mime.into());
        self
    }

    /// Match display/execute outputs carrying any of these MIME types.
    pub fn mime_types<I, S>(mut self, mimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mime_types
            .get_or_insert_with(Vec::new)
            .extend(mimes.into_iter().map(Into::into));
        self
    }

    pub fn matches(&self, output: &Output) -> bool {
        let type_ok = self
            .output_types
            .as_ref()
            .is_none_or(|types| output.is_type(types));

        let mime_ok = self.mime_types.as_ref().is_none_or(|mimes| {
            output
                .data()
                .is_some_and(|data| mimes.iter().any(|mime| data.contains(mime)))
        });

        type_ok && mime_ok
    }
}

// ---------------------------------------------------------------------------
// Outputs view
// ---------------------------------------------------------------------------

/// Read-only view over a code cell's outputs.
#[derive(Debug, Clone, Copy)]
pub struct Outputs<'a> {
    outputs: &'a [Output],
}

impl<'a> Outputs<'a> {
    pub(crate) fn new(outputs: &'a [Output]) -> Self {
        Self { outputs }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Output> {
        self.outputs.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Output> {
        self.outputs.iter()
    }

    pub fn as_slice(&self) -> &'a [Output] {
        self.outputs
    }

    fn of_type(&self, output_type: OutputType) -> Vec<&'a Output> {
        self.outputs
            .iter()
            .filter(|o| o.output_type() == output_type)
            .collect()
    }

    pub fn errors(&self) -> Vec<&'a Output> {
        self.of_type(OutputType::Error)
    }

    pub fn execute_results(&self) -> Vec<&'a Output> {
        self.of_type(OutputType::ExecuteResult)
    }

    pub fn streams(&self) -> Vec<&'a Output> {
        self.of_type(OutputType::Stream)
    }

    pub fn display_data(&self) -> Vec<&'a Output> {
        self.of_type(OutputType::DisplayData)
    }

    pub fn filter(&self, filter: &OutputFilter) -> Vec<&'a Output> {
        self.outputs.iter().filter(|o| filter.matches(o)).collect()
    }

    /// Outputs in projection order: streams, execute results, errors, then
    /// display data.
    fn projection_order(&self) -> impl Iterator<Item = &'a Output> {
        let outputs = self.outputs;
        [
            OutputType::Stream,
            OutputType::ExecuteResult,
            OutputType::Error,
            OutputType::DisplayData,
        ]
        .into_iter()
        .flat_map(move |kind| outputs.iter().filter(move |o| o.output_type() == kind))
    }

    /// All outputs as plain text joined by newlines.
    pub fn as_plain(&self) -> String {
        self.projection_order()
            .map(output_to_plain)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All outputs as an HTML fragment joined by newlines.
    pub fn as_html(&self, options: &HtmlOptions) -> String {
        let body = self
            .projection_order()
            .map(|o| output_to_html(o, options.use_css))
            .collect::<Vec<_>>()
            .join("\n");

        if options.include_css {
            format!("<style>{NOTEBOOK_CSS}</style>\n{body}")
        } else {
            body
        }
    }
}

impl<'a> IntoIterator for Outputs<'a> {
    type Item = &'a Output;
    type IntoIter = std::slice::Iter<'a, Output>;

    fn into_iter(self) -> Self::IntoIter {
        self.outputs.iter()
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Plain-text form of one output.
///
/// Rich outputs use `text/plain`, falling back to their `text/html`
/// converted to text. Tracebacks lose their ANSI colouring.
pub fn output_to_plain(output: &Output) -> String {
    match output {
        Output::Stream { text, .. } => text.clone(),
        Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => {
            if let Some(text) = data.text("text/plain") {
                text
            } else if let Some(html) = data.text("text/html") {
                html_to_text(&html)
            } else {
                String::new()
            }
        }
        Output::Error { traceback, .. } => strip_ansi(&traceback.join("\n")),
    }
}

/// HTML form of one output.
pub fn output_to_html(output: &Output, use_css: bool) -> String {
    match output {
        Output::Stream { text, .. } => text_to_html(text),
        Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => {
            if let Some(html) = data.text("text/html") {
                html
            } else if let Some(text) = data.text("text/plain") {
                if use_css {
                    ansi_to_html(&text).replace('\n', "<br>")
                } else {
                    text_to_html(&strip_ansi(&text))
                }
            } else {
                String::new()
            }
        }
        Output::Error { traceback, .. } => {
            let joined = traceback.join("\n");
            if use_css {
                ansi_to_html(&joined).replace('\n', "<br>")
            } else {
                text_to_html(&strip_ansi(&joined))
            }
        }
    }
}

/// Escape text and turn newlines into `<br>`.
pub fn text_to_html(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

fn html_to_text(html: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style"])
        .build();

    match converter.convert(html) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "could not convert text/html output to text");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use notebox_shared::MimeBundle;

    use super::*;

    fn sample() -> Vec<Output> {
        vec![
            Output::display_data(MimeBundle::new().with_text("text/html", "<p>shown</p>")),
            Output::error(
                "NameError",
                "name 'x' is not defined",
                vec!["\u{1b}[0;31mNameError\u{1b}[0m: name 'x' is not defined".into()],
            ),
            Output::execute_result(
                Some(1),
                MimeBundle::new().with_text("text/plain", "'foobar'"),
            ),
            Output::stream("stdout", "hello\nworld\n"),
        ]
    }

    #[test]
    fn typed_accessors() {
        let outputs = sample();
        let view = Outputs::new(&outputs);
        assert_eq!(view.len(), 4);
        assert_eq!(view.errors().len(), 1);
        assert_eq!(view.streams().len(), 1);
        assert_eq!(view.execute_results().len(), 1);
        assert_eq!(view.display_data().len(), 1);
    }

    #[test]
    fn plain_projection_order() {
        let outputs = sample();
        let plain = Outputs::new(&outputs).as_plain();
        assert_eq!(
            plain,
            "hello\nworld\n\n'foobar'\nNameError: name 'x' is not defined\nshown"
        );
    }

    #[test]
    fn html_projection_with_and_without_css() {
        let outputs = sample();
        let view = Outputs::new(&outputs);

        let html = view.as_html(&HtmlOptions::default());
        assert!(html.starts_with("hello<br>world<br>\n"));
        assert!(html.contains("<span class=\"ansi-red-fg\">NameError</span>"));
        assert!(html.ends_with("<p>shown</p>"));

        let plain_errors = view.as_html(&HtmlOptions {
            use_css: false,
            include_css: true,
        });
        assert!(plain_errors.starts_with("<style>"));
        assert!(plain_errors.contains("NameError: name &#39;x&#39; is not defined"));
        assert!(!plain_errors.contains("\u{1b}"));
    }

    #[test]
    fn filter_by_type_and_mime() {
        let outputs = sample();
        let view = Outputs::new(&outputs);

        let html_only = view.filter(&OutputFilter::new().mime_type("text/html"));
        assert_eq!(html_only.len(), 1);
        assert_eq!(html_only[0].output_type(), OutputType::DisplayData);

        let rich_text = OutputFilter::new()
            .output_types([OutputType::ExecuteResult, OutputType::Stream])
            .mime_type("text/plain");
        assert_eq!(view.filter(&rich_text).len(), 1);

        assert_eq!(view.filter(&OutputFilter::new()).len(), 4);
    }

    #[test]
    fn output_without_text_projects_to_empty() {
        let image = Output::display_data(MimeBundle::new().with_text("image/png", "iVBOR"));
        assert_eq!(output_to_plain(&image), "");
        assert_eq!(output_to_html(&image, true), "");
    }

    #[test]
    fn plain_text_fallback_is_escaped() {
        let result = Output::execute_result(
            Some(2),
            MimeBundle::new().with_text("text/plain", "<Figure>\nsize"),
        );
        assert_eq!(output_to_html(&result, false), "&lt;Figure&gt;<br>size");
        assert_eq!(output_to_html(&result, true), "&lt;Figure&gt;<br>size");

        let coloured = Output::execute_result(
            None,
            MimeBundle::new().with_text("text/plain", "\u{1b}[31mred\u{1b}[0m"),
        );
        assert_eq!(output_to_html(&coloured, false), "red");
        assert!(output_to_html(&coloured, true).contains("<span class=\"ansi-red-fg\">red</span>"));
    }
}
