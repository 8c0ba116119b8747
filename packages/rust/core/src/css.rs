//! Notebook stylesheet and `<style>` extraction.

use std::path::Path;

use scraper::{Html, Selector};
use tracing::debug;

use notebox_shared::{NoteboxError, Result};

/// Stylesheet bundled with the crate: layout, prompts and `ansi-*` colours.
pub const NOTEBOOK_CSS: &str = include_str!("../assets/notebook.css");

/// User stylesheet appended to the bundled one when present.
const CUSTOM_CSS_FILE: &str = "custom.css";

/// The notebook CSS header: the bundled stylesheet, followed by
/// `custom.css` from `config_dir` when that file exists.
pub fn notebook_css(config_dir: Option<&Path>) -> Result<String> {
    let mut css = NOTEBOOK_CSS.to_string();

    if let Some(dir) = config_dir {
        let custom = dir.join(CUSTOM_CSS_FILE);
        if custom.is_file() {
            let extra = std::fs::read_to_string(&custom).map_err(|e| NoteboxError::io(&custom, e))?;
            debug!(path = %custom.display(), "appending custom stylesheet");
            css.push_str("\n/* custom.css */\n");
            css.push_str(&extra);
        }
    }

    Ok(css)
}

/// The contents of every `<style>` element in an HTML document, joined by
/// newlines in document order.
pub fn extract_css(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("style") else {
        return String::new();
    };

    document
        .select(&selector)
        .map(|style| style.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_css_has_ansi_classes() {
        let css = notebook_css(None).unwrap();
        assert!(css.contains(".ansi-red-fg"));
        assert!(css.contains(".prompt"));
    }

    #[test]
    fn custom_css_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("custom.css"), ".mine { color: red; }").unwrap();

        let css = notebook_css(Some(dir.path())).unwrap();
        assert!(css.starts_with(NOTEBOOK_CSS));
        assert!(css.ends_with(".mine { color: red; }"));
    }

    #[test]
    fn missing_custom_css_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(notebook_css(Some(dir.path())).unwrap(), NOTEBOOK_CSS);
    }

    #[test]
    fn extracts_style_blocks() {
        let html = "<html><head><style>a { color: red; }</style></head>\
                    <body><style>b { margin: 0; }</style><p>text</p></body></html>";
        assert_eq!(extract_css(html), "a { color: red; }\nb { margin: 0; }");
        assert_eq!(extract_css("<p>none</p>"), "");
    }
}
