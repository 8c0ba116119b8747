//! ANSI escape handling for kernel tracebacks.
//!
//! Kernels colour their tracebacks with SGR escape sequences. Plain-text
//! projections strip them; HTML projections turn them into `ansi-*` CSS
//! classes understood by the bundled notebook stylesheet.

use std::sync::LazyLock;

use regex::Regex;

/// CSI sequences: `ESC [ params final-byte`.
static CSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[([0-9;?]*)([@-~])").expect("valid regex"));

const COLORS: [&str; 8] = [
    "black", "red", "green", "yellow", "blue", "magenta", "cyan", "white",
];

/// Remove every ANSI escape sequence from `text`.
pub fn strip_ansi(text: &str) -> String {
    let stripped = strip_ansi_escapes::strip(text);
    String::from_utf8_lossy(&stripped).into_owned()
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Convert ANSI-coloured text to HTML.
///
/// Text is escaped and coloured runs are wrapped in
/// `<span class="ansi-red-fg ansi-bold">…</span>`. Non-SGR control
/// sequences are dropped. Newlines are kept as-is.
pub fn ansi_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut style = SgrState::default();
    let mut last = 0;

    for caps in CSI_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        style.push_text(&mut out, &text[last..whole.start()]);
        last = whole.end();

        if &caps[2] == "m" {
            style.apply(&caps[1]);
        }
    }
    style.push_text(&mut out, &text[last..]);
    out
}

// ---------------------------------------------------------------------------
// SGR state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq)]
struct SgrState {
    fg: Option<String>,
    bg: Option<String>,
    bold: bool,
    underline: bool,
}

impl SgrState {
    fn apply(&mut self, params: &str) {
        let codes: Vec<u16> = if params.is_empty() {
            vec![0]
        } else {
            params.split(';').map(|p| p.parse().unwrap_or(0)).collect()
        };

        let mut iter = codes.into_iter();
        while let Some(code) = iter.next() {
            match code {
                0 => *self = Self::default(),
                1 => self.bold = true,
                4 => self.underline = true,
                22 => self.bold = false,
                24 => self.underline = false,
                30..=37 => self.fg = Some(format!("ansi-{}-fg", COLORS[usize::from(code - 30)])),
                39 => self.fg = None,
                40..=47 => self.bg = Some(format!("ansi-{}-bg", COLORS[usize::from(code - 40)])),
                49 => self.bg = None,
                90..=97 => {
                    self.fg = Some(format!(
                        "ansi-{}-intense-fg",
                        COLORS[usize::from(code - 90)]
                    ));
                }
                100..=107 => {
                    self.bg = Some(format!(
                        "ansi-{}-intense-bg",
                        COLORS[usize::from(code - 100)]
                    ));
                }
                // 256-colour and truecolour forms: skip their arguments.
                38 | 48 => match iter.next() {
                    Some(5) => {
                        iter.next();
                    }
                    Some(2) => {
                        iter.by_ref().take(3).for_each(drop);
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }

    fn classes(&self) -> Vec<&str> {
        let mut classes = Vec::new();
        if let Some(fg) = &self.fg {
            classes.push(fg.as_str());
        }
        if let Some(bg) = &self.bg {
            classes.push(bg.as_str());
        }
        if self.bold {
            classes.push("ansi-bold");
        }
        if self.underline {
            classes.push("ansi-underline");
        }
        classes
    }

    fn push_text(&self, out: &mut String, text: &str) {
        if text.is_empty() {
            return;
        }
        let classes = self.classes();
        if classes.is_empty() {
            out.push_str(&escape_html(text));
        } else {
            out.push_str("<span class=\"");
            out.push_str(&classes.join(" "));
            out.push_str("\">");
            out.push_str(&escape_html(text));
            out.push_str("</span>");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACEBACK: &str = "\u{1b}[0;31mNameError\u{1b}[0m: name 'x' is not defined";

    #[test]
    fn strips_colour_codes() {
        assert_eq!(strip_ansi(TRACEBACK), "NameError: name 'x' is not defined");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn converts_colours_to_classes() {
        let html = ansi_to_html(TRACEBACK);
        assert_eq!(
            html,
            "<span class=\"ansi-red-fg\">NameError</span>: name &#39;x&#39; is not defined"
        );
    }

    #[test]
    fn combines_bold_and_intense_colours() {
        let html = ansi_to_html("\u{1b}[1;92mok\u{1b}[22m done\u{1b}[0m");
        assert_eq!(
            html,
            "<span class=\"ansi-green-intense-fg ansi-bold\">ok</span>\
             <span class=\"ansi-green-intense-fg\"> done</span>"
        );
    }

    #[test]
    fn drops_non_sgr_sequences_and_extended_colours() {
        assert_eq!(ansi_to_html("a\u{1b}[2Kb"), "ab");
        assert_eq!(
            ansi_to_html("\u{1b}[38;5;208mx\u{1b}[m"),
            "x",
            "256-colour codes carry no class"
        );
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<ipython-input-1> & \"x\""),
            "&lt;ipython-input-1&gt; &amp; &quot;x&quot;"
        );
    }
}
