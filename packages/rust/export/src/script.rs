//! Plain source files: code verbatim, prose as comments.

use tracing::instrument;

use notebox_core::{Exporter, Notebook};
use notebox_shared::{CellType, Result};

use crate::document::Document;

/// Line comment marker for the notebook's language.
fn comment_marker(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "javascript" | "typescript" | "rust" | "c" | "c++" | "cpp" | "java" | "go" | "scala"
        | "kotlin" | "swift" | "csharp" | "c#" => "//",
        "sql" | "haskell" | "lua" => "--",
        "matlab" | "octave" => "%",
        _ => "#",
    }
}

/// File extension (without dot) for a language with no `file_extension`
/// in its language_info.
fn extension_for(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "python" => "py",
        "r" => "r",
        "julia" => "jl",
        "javascript" => "js",
        "typescript" => "ts",
        "rust" => "rs",
        "scala" => "scala",
        "bash" | "sh" => "sh",
        "ruby" => "rb",
        _ => "txt",
    }
}

/// Writes a notebook as a source file in its kernel's language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptExporter {
    extension: String,
}

impl Default for ScriptExporter {
    fn default() -> Self {
        Self {
            extension: "py".into(),
        }
    }
}

impl ScriptExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// An exporter whose extension matches `notebook`'s language.
    pub fn for_notebook(notebook: &Notebook) -> Self {
        let extension = notebook
            .language_info("file_extension")
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| extension_for(notebook.language().unwrap_or("python")).to_string());
        Self { extension }
    }

    #[instrument(skip_all, fields(cells = notebook.len()))]
    pub fn render(&self, notebook: &Notebook) -> String {
        let language = notebook.language().unwrap_or("python");
        let marker = comment_marker(language);
        let mut doc = Document::new("\n\n\n");

        if language.eq_ignore_ascii_case("python") {
            doc.push("#!/usr/bin/env python\n# coding: utf-8");
        }

        for cell in notebook {
            match cell.cell_type() {
                CellType::Code => {
                    let count = cell
                        .execution_count()
                        .map_or_else(|| " ".to_string(), |n| n.to_string());
                    doc.push(format!("{marker} In[{count}]:\n\n\n{}", cell.source()));
                }
                CellType::Markdown | CellType::Raw => {
                    if cell.is_empty() {
                        continue;
                    }
                    let commented = cell
                        .source()
                        .lines()
                        .map(|line| {
                            if line.is_empty() {
                                marker.to_string()
                            } else {
                                format!("{marker} {line}")
                            }
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    doc.push(commented);
                }
            }
        }

        doc.finish()
    }
}

impl Exporter for ScriptExporter {
    fn format_name(&self) -> &str {
        "script"
    }

    fn file_extension(&self) -> &str {
        &self.extension
    }

    fn export(&self, notebook: &Notebook) -> Result<Vec<u8>> {
        Ok(self.render(notebook).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use notebox_core::Cell;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn python_script_layout() {
        let nb = Notebook::from_cells([
            Cell::markdown("# Setup\n\nLoad things."),
            Cell::code("import os").with_execution_count(1).unwrap(),
            Cell::code("os.getcwd()"),
        ]);
        assert_eq!(
            ScriptExporter::new().render(&nb),
            "#!/usr/bin/env python\n# coding: utf-8\n\n\n# # Setup\n#\n# Load things.\n\n\n# In[1]:\n\n\nimport os\n\n\n# In[ ]:\n\n\nos.getcwd()\n"
        );
    }

    #[test]
    fn language_info_picks_extension_and_comments() {
        let mut nb = Notebook::from_cells([Cell::markdown("note"), Cell::code("x <- 1")]);
        nb.metadata_mut().insert(
            "language_info".into(),
            json!({"name": "R", "file_extension": ".r"}),
        );

        let exporter = ScriptExporter::for_notebook(&nb);
        assert_eq!(exporter.file_extension(), "r");
        let script = exporter.render(&nb);
        assert!(script.starts_with("# note\n"));
        assert!(!script.contains("coding"));
    }

    #[test]
    fn extension_falls_back_to_language_name() {
        let mut nb = Notebook::new();
        nb.metadata_mut()
            .insert("language_info".into(), json!({"name": "julia"}));
        assert_eq!(ScriptExporter::for_notebook(&nb).file_extension(), "jl");
        assert_eq!(ScriptExporter::for_notebook(&Notebook::new()).file_extension(), "py");
        assert_eq!(comment_marker("Rust"), "//");
    }

    #[test]
    fn code_source_is_copied_verbatim() {
        let src = "s = '''a   \n\n\n\n\nb'''  ";
        let nb = Notebook::from_cells([Cell::code(src), Cell::code("\n\nlast = 1\n\n")]);
        let script = ScriptExporter::new().render(&nb);
        assert!(script.contains(src), "{script:?}");
        assert!(script.ends_with("# In[ ]:\n\n\n\n\nlast = 1\n\n"));
    }
}
