//! reveal.js slide decks driven by `metadata.slideshow.slide_type`.

use serde_json::Value;
use tracing::{debug, instrument};

use notebox_core::{Cell, Exporter, Notebook};
use notebox_shared::Result;

use crate::html::{HtmlExporter, document_title, page};

const DEFAULT_REVEAL_PREFIX: &str = "https://unpkg.com/reveal.js@4.6.1";

/// Role of a cell in the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideType {
    /// Starts a new horizontal slide.
    Slide,
    /// Starts a new vertical slide below the current one.
    Subslide,
    /// Revealed step by step on the current slide.
    Fragment,
    /// Left out of the deck.
    Skip,
    /// Speaker notes.
    Notes,
    /// Continues the current slide (`-`).
    Continue,
}

impl SlideType {
    /// The slide type recorded in a cell's metadata; missing or unknown
    /// values continue the current slide.
    pub fn of(cell: &Cell) -> Self {
        let value = cell
            .metadata()
            .get("slideshow")
            .and_then(|s| s.get("slide_type"))
            .and_then(Value::as_str);
        match value {
            Some("slide") => Self::Slide,
            Some("subslide") => Self::Subslide,
            Some("fragment") => Self::Fragment,
            Some("skip") => Self::Skip,
            Some("notes") => Self::Notes,
            _ => Self::Continue,
        }
    }
}

/// Renders the notebook as a reveal.js presentation.
#[derive(Debug, Clone)]
pub struct SlidesExporter {
    /// Cell rendering options shared with the HTML page exporter.
    pub html: HtmlExporter,
    /// Where reveal.js is loaded from.
    pub reveal_url_prefix: String,
}

impl Default for SlidesExporter {
    fn default() -> Self {
        Self {
            html: HtmlExporter::default(),
            reveal_url_prefix: DEFAULT_REVEAL_PREFIX.to_string(),
        }
    }
}

type Deck = Vec<Vec<Vec<String>>>;

impl SlidesExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_html(mut self, html: HtmlExporter) -> Self {
        self.html = html;
        self
    }

    pub fn reveal_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reveal_url_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Group rendered cells into slides and their vertical subslides.
    fn deck(&self, notebook: &Notebook) -> Deck {
        let mut deck: Deck = Vec::new();

        for cell in notebook.iter() {
            let kind = SlideType::of(cell);
            if kind == SlideType::Skip {
                continue;
            }
            let Some(html) = self.html.render_cell(cell) else {
                continue;
            };

            match kind {
                SlideType::Slide => deck.push(vec![Vec::new()]),
                SlideType::Subslide => match deck.last_mut() {
                    Some(slide) => slide.push(Vec::new()),
                    None => deck.push(vec![Vec::new()]),
                },
                _ if deck.is_empty() => deck.push(vec![Vec::new()]),
                _ => {}
            }

            let fragment = match kind {
                SlideType::Fragment => format!("<div class=\"fragment\">\n{html}\n</div>"),
                SlideType::Notes => format!("<aside class=\"notes\">\n{html}\n</aside>"),
                _ => html,
            };
            if let Some(subslide) = deck.last_mut().and_then(|slide| slide.last_mut()) {
                subslide.push(fragment);
            }
        }
        deck
    }

    #[instrument(skip_all, fields(cells = notebook.len()))]
    pub fn render(&self, notebook: &Notebook) -> Result<String> {
        let deck = self.deck(notebook);
        debug!(slides = deck.len(), "deck assembled");

        let sections = deck
            .iter()
            .map(|slide| {
                let inner = slide
                    .iter()
                    .map(|sub| format!("<section>\n{}\n</section>", sub.join("\n")))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("<section>\n{inner}\n</section>")
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prefix = &self.reveal_url_prefix;
        let head = format!(
            "<link rel=\"stylesheet\" href=\"{prefix}/dist/reveal.css\">\n<link rel=\"stylesheet\" href=\"{prefix}/dist/theme/white.css\">\n"
        );
        let body = format!(
            "<div class=\"reveal\">\n<div class=\"slides\">\n{sections}\n</div>\n</div>\n<script src=\"{prefix}/dist/reveal.js\"></script>\n<script>Reveal.initialize({{ hash: true }});</script>"
        );

        Ok(page(
            &document_title(self.html.title.as_deref(), notebook),
            &self.html.stylesheet()?,
            &head,
            &body,
        ))
    }
}

impl Exporter for SlidesExporter {
    fn format_name(&self) -> &str {
        "slides"
    }

    fn file_extension(&self) -> &str {
        "slides.html"
    }

    fn export(&self, notebook: &Notebook) -> Result<Vec<u8>> {
        Ok(self.render(notebook)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn slide(source: &str, kind: &str) -> Cell {
        Cell::markdown(source).with_metadata_entry("slideshow", json!({"slide_type": kind}))
    }

    #[test]
    fn slide_types_group_cells() {
        let nb = Notebook::from_cells([
            Cell::markdown("opening"),
            slide("first", "slide"),
            slide("more", "-"),
            slide("below", "subslide"),
            slide("step", "fragment"),
            slide("hidden", "skip"),
            slide("say this", "notes"),
            slide("second", "slide"),
        ]);
        let deck = SlidesExporter::new().deck(&nb);

        assert_eq!(deck.len(), 3);
        assert_eq!(deck[0].len(), 1);
        assert_eq!(deck[1].len(), 2);
        assert_eq!(deck[1][0].len(), 2);
        assert!(deck[1][1][0].contains("below"));
        assert!(deck[1][1][1].starts_with("<div class=\"fragment\">"));
        assert!(deck[1][1][2].starts_with("<aside class=\"notes\">"));
        assert!(deck.iter().flatten().flatten().all(|html| !html.contains("hidden")));
    }

    #[test]
    fn unknown_slide_type_continues() {
        let cell = slide("x", "bogus");
        assert_eq!(SlideType::of(&cell), SlideType::Continue);
        assert_eq!(SlideType::of(&Cell::code("")), SlideType::Continue);
    }

    #[test]
    fn page_loads_reveal() {
        let html = SlidesExporter::new()
            .reveal_url_prefix("https://cdn.example/reveal/")
            .render(&Notebook::from_cells([slide("hi", "slide")]))
            .unwrap();
        assert!(html.contains("https://cdn.example/reveal/dist/reveal.js"));
        assert!(html.contains("<div class=\"reveal\">"));
        assert!(html.contains("Reveal.initialize"));
    }
}
