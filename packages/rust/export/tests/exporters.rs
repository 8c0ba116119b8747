//! Whole-document exports written to disk.

use notebox_core::{Cell, Notebook};
use notebox_export::{ExportExt, FORMATS, exporter_for, extract_css};
use notebox_shared::{ExportConfig, MimeBundle, Output};
use tempfile::TempDir;

fn analysis() -> Notebook {
    let mut nb = Notebook::from_cells([
        Cell::markdown("# Analysis\n\nSee *below*."),
        Cell::code("total = 1 + 2\ntotal")
            .with_execution_count(1)
            .unwrap()
            .with_outputs(vec![Output::execute_result(
                Some(1),
                MimeBundle::new().with_text("text/plain", "3"),
            )])
            .unwrap(),
        Cell::code("undefined")
            .with_execution_count(2)
            .unwrap()
            .with_outputs(vec![Output::error(
                "NameError",
                "name 'undefined' is not defined",
                vec!["\u{1b}[0;31mNameError\u{1b}[0m: name 'undefined' is not defined".into()],
            )])
            .unwrap(),
    ]);
    nb.metadata_mut().insert(
        "language_info".into(),
        serde_json::json!({"name": "python", "file_extension": ".py"}),
    );
    nb
}

#[test]
fn html_page_embeds_css_and_coloured_traceback() {
    let html = analysis().to_html_string().unwrap();

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<h1>Analysis</h1>"));
    assert!(html.contains("<span class=\"ansi-red-fg\">NameError</span>"));
    assert!(extract_css(&html).contains(".ansi-red-fg"));
}

#[test]
fn shorthands_write_files() {
    let dir = TempDir::new().unwrap();
    let nb = analysis();

    nb.to_html(dir.path().join("a.html")).unwrap();
    nb.to_slides(dir.path().join("a.slides.html")).unwrap();
    nb.to_script(dir.path().join("a.py")).unwrap();
    nb.to_markdown(dir.path().join("a.md")).unwrap();

    let script = std::fs::read_to_string(dir.path().join("a.py")).unwrap();
    assert!(script.contains("# In[1]:\n\n\ntotal = 1 + 2\ntotal\n"));
    let markdown = std::fs::read_to_string(dir.path().join("a.md")).unwrap();
    assert!(markdown.contains("```python\nundefined\n```\n\n    NameError: name 'undefined' is not defined"));
    let slides = std::fs::read_to_string(dir.path().join("a.slides.html")).unwrap();
    assert!(slides.contains("<section>"));
}

#[test]
fn registry_covers_builtin_formats() {
    let nb = analysis();
    let config = ExportConfig::default();
    for format in FORMATS {
        let exporter = exporter_for(format, &nb, &config).unwrap();
        assert!(!nb.export(exporter.as_ref()).unwrap().is_empty());
    }
    assert!(exporter_for("pdf", &nb, &config).is_none());
    assert_eq!(
        exporter_for("md", &nb, &config).unwrap().file_extension(),
        "md"
    );
}
