//! Text documents assembled from per-cell blocks.
//!
//! Blocks are cell renderings and land in the output byte for byte; only
//! the separators between them and the final newline are generated here.

/// Blocks joined by a fixed separator.
#[derive(Debug)]
pub(crate) struct Document {
    separator: &'static str,
    blocks: Vec<String>,
}

impl Document {
    pub(crate) fn new(separator: &'static str) -> Self {
        Self {
            separator,
            blocks: Vec::new(),
        }
    }

    /// Add a block. Empty blocks are dropped so they don't double the
    /// separator.
    pub(crate) fn push(&mut self, block: impl Into<String>) {
        let block = block.into();
        if !block.is_empty() {
            self.blocks.push(block);
        }
    }

    /// The joined text, ending in a newline unless it is empty.
    pub(crate) fn finish(self) -> String {
        let mut text = self.blocks.join(self.separator);
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_kept_verbatim() {
        let mut doc = Document::new("\n\n");
        doc.push("a  ");
        doc.push("");
        doc.push("\n\n\n\nb\t");
        assert_eq!(doc.finish(), "a  \n\n\n\n\n\nb\t\n");
    }

    #[test]
    fn trailing_newline_is_not_doubled() {
        let mut doc = Document::new("\n");
        doc.push("x\n");
        assert_eq!(doc.finish(), "x\n");
        assert_eq!(Document::new("\n").finish(), "");
    }
}
