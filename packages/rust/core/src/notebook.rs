//! The notebook wrapper: ordered cells, document metadata and file I/O.

use std::fmt;
use std::ops::{Bound, Index, IndexMut, Range, RangeBounds};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info, instrument, warn};

use notebox_shared::{Metadata, NB_FORMAT, NB_FORMAT_MINOR, NoteboxError, Result};

use crate::cell::{Cell, new_cell_id};
use crate::cells::{Cells, CellsMut};
use crate::filter::CellFilter;

/// An nbformat v4 notebook.
#[derive(Debug, Clone)]
pub struct Notebook {
    cells: Vec<Cell>,
    metadata: Metadata,
    nbformat: u64,
    nbformat_minor: u64,
    file: Option<PathBuf>,
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Notebook {
    /// An empty notebook at the current format version.
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            metadata: Metadata::new(),
            nbformat: NB_FORMAT,
            nbformat_minor: NB_FORMAT_MINOR,
            file: None,
        }
    }

    /// A notebook holding `cells` in order.
    pub fn from_cells(cells: impl IntoIterator<Item = Cell>) -> Self {
        let mut nb = Self::new();
        nb.extend(cells);
        nb
    }

    /// Build from a parsed document node.
    ///
    /// Only nbformat 4 is accepted. The document is validated; cells missing
    /// a 4.5 id (or sharing one) are given fresh ids.
    pub fn from_node(node: Value) -> Result<Self> {
        let Some(object) = node.as_object() else {
            return Err(NoteboxError::invalid_input(
                "notebook node must be a JSON object",
            ));
        };
        if object.contains_key("cell_type") {
            return Err(NoteboxError::invalid_input(
                "expected a notebook node, got a cell",
            ));
        }

        let major = object
            .get("nbformat")
            .and_then(Value::as_u64)
            .ok_or_else(|| NoteboxError::validation("missing 'nbformat' version"))?;
        let minor = object
            .get("nbformat_minor")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if major != NB_FORMAT {
            return Err(NoteboxError::UnsupportedVersion { major, minor });
        }

        let repr: NotebookRepr = serde_json::from_value(node)?;
        let mut nb = Self {
            cells: repr.cells,
            metadata: repr.metadata,
            nbformat: repr.nbformat,
            nbformat_minor: repr.nbformat_minor,
            file: None,
        };
        nb.normalize_ids();
        nb.validate()?;

        debug!(cells = nb.cells.len(), minor, "notebook parsed");
        Ok(nb)
    }

    /// Read a notebook file and remember its path for [`Notebook::save`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut nb = read_file(path)?;
        nb.file = Some(path.to_path_buf());
        info!(cells = nb.cells.len(), "notebook opened");
        Ok(nb)
    }

    /// Open `path`, apply `f`, and write the notebook back if `f` succeeds.
    pub fn edit_file<R>(
        path: impl AsRef<Path>,
        f: impl FnOnce(&mut Notebook) -> Result<R>,
    ) -> Result<R> {
        let mut nb = Self::open(path)?;
        let out = f(&mut nb)?;
        nb.save()?;
        Ok(out)
    }

    /// A notebook sharing this one's metadata, version and file, holding
    /// `cells`.
    pub(crate) fn with_cells(&self, cells: Vec<Cell>) -> Self {
        Self {
            cells,
            metadata: self.metadata.clone(),
            nbformat: self.nbformat,
            nbformat_minor: self.nbformat_minor,
            file: self.file.clone(),
        }
    }

    /// Ensure every cell of a 4.5+ notebook has a unique id, and that older
    /// notebooks carry none.
    fn normalize_ids(&mut self) {
        if self.nbformat_minor < 5 {
            self.cells.iter_mut().for_each(|cell| cell.set_id(None));
            return;
        }

        let mut seen: Vec<String> = Vec::with_capacity(self.cells.len());
        for cell in &mut self.cells {
            let fresh = match cell.id() {
                Some(id) if !seen.iter().any(|s| s == id) => None,
                Some(id) => {
                    warn!(id, "duplicate cell id replaced");
                    Some(new_cell_id())
                }
                None => Some(new_cell_id()),
            };
            if let Some(id) = fresh {
                cell.set_id(Some(id));
            }
            if let Some(id) = cell.id() {
                seen.push(id.to_string());
            }
        }
    }

    /// Give an incoming cell an id that fits this notebook.
    pub(crate) fn adopt(&self, mut cell: Cell) -> Cell {
        if self.nbformat_minor < 5 {
            cell.set_id(None);
            return cell;
        }
        let clash = cell
            .id()
            .is_none_or(|id| self.cells.iter().any(|c| c.id() == Some(id)));
        if clash {
            cell.set_id(Some(new_cell_id()));
        }
        cell
    }
}

impl FromStr for Notebook {
    type Err = NoteboxError;

    /// Parse notebook JSON.
    fn from_str(s: &str) -> Result<Self> {
        let node: Value = serde_json::from_str(s)?;
        Self::from_node(node)
    }
}

fn read_file(path: &Path) -> Result<Notebook> {
    let text = std::fs::read_to_string(path).map_err(|e| NoteboxError::io(path, e))?;
    text.parse()
}

// ---------------------------------------------------------------------------
// Document I/O
// ---------------------------------------------------------------------------

impl Notebook {
    /// The file this notebook was opened from or will be saved to.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn set_file(&mut self, path: impl Into<PathBuf>) {
        self.file = Some(path.into());
    }

    /// Builder form of [`Notebook::set_file`].
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.set_file(path);
        self
    }

    fn require_file(&self) -> Result<&Path> {
        self.file
            .as_deref()
            .ok_or_else(|| NoteboxError::invalid_input("notebook has no file to load or save"))
    }

    /// Replace cells and metadata with the current content of the file.
    #[instrument(skip_all)]
    pub fn load(&mut self) -> Result<()> {
        let path = self.require_file()?.to_path_buf();
        let fresh = read_file(&path)?;
        self.cells = fresh.cells;
        self.metadata = fresh.metadata;
        self.nbformat = fresh.nbformat;
        self.nbformat_minor = fresh.nbformat_minor;
        info!(path = %path.display(), cells = self.cells.len(), "notebook reloaded");
        Ok(())
    }

    /// Write the notebook to the file it came from.
    pub fn save(&self) -> Result<()> {
        let path = self.require_file()?;
        self.to_ipynb(path)
    }

    /// Write the notebook document to `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn to_ipynb(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Err(e) = self.validate() {
            warn!(error = %e, "writing a notebook that does not validate");
        }
        let text = self.to_json_string()?;
        std::fs::write(path, text).map_err(|e| NoteboxError::io(path, e))?;
        info!(cells = self.cells.len(), "notebook written");
        Ok(())
    }

    /// The document as nbformat writes it: one-space indentation, sorted
    /// keys, multi-line strings as line arrays, trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;

        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
        value.serialize(&mut ser)?;
        buf.push(b'\n');

        String::from_utf8(buf)
            .map_err(|e| NoteboxError::validation(format!("serialized notebook is not UTF-8: {e}")))
    }

    /// The document as a JSON tree.
    pub fn to_node(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// On-disk notebook layout (read side).
#[derive(Deserialize)]
struct NotebookRepr {
    #[serde(default)]
    cells: Vec<Cell>,
    #[serde(default)]
    metadata: Metadata,
    nbformat: u64,
    nbformat_minor: u64,
}

/// On-disk notebook layout (write side).
#[derive(Serialize)]
struct NotebookRef<'a> {
    cells: &'a [Cell],
    metadata: &'a Metadata,
    nbformat: u64,
    nbformat_minor: u64,
}

impl Serialize for Notebook {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        NotebookRef {
            cells: &self.cells,
            metadata: &self.metadata,
            nbformat: self.nbformat,
            nbformat_minor: self.nbformat_minor,
        }
        .serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Metadata and version
// ---------------------------------------------------------------------------

impl Notebook {
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    /// `(nbformat, nbformat_minor)`.
    pub fn version(&self) -> (u64, u64) {
        (self.nbformat, self.nbformat_minor)
    }

    /// Kernel named by `metadata.kernelspec.name`.
    pub fn kernel_name(&self) -> Option<&str> {
        self.metadata
            .get("kernelspec")
            .and_then(|spec| spec.get("name"))
            .and_then(Value::as_str)
    }

    /// Language named by `metadata.language_info.name`.
    pub fn language(&self) -> Option<&str> {
        self.language_info("name")
    }

    /// A string field of `metadata.language_info`.
    pub fn language_info(&self, key: &str) -> Option<&str> {
        self.metadata
            .get("language_info")
            .and_then(|info| info.get(key))
            .and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Resolve a range against a sequence length; out-of-range bounds are an
/// `Index` error.
pub(crate) fn resolve_range(range: impl RangeBounds<usize>, len: usize) -> Result<Range<usize>> {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.saturating_add(1),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    if end > len {
        return Err(NoteboxError::Index { index: end, len });
    }
    if start > end {
        return Err(NoteboxError::Index { index: start, len });
    }
    Ok(start..end)
}

impl Notebook {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.cells.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Cell> {
        self.cells.iter_mut()
    }

    /// The cells as a slice.
    pub fn as_slice(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    /// Accessor with typed views (`code`, `markdown`, `errors`, masks…).
    pub fn cells(&self) -> Cells<'_> {
        Cells::new(&self.cells)
    }

    /// Mutable accessor for positional, slice and mask assignment.
    pub fn cells_mut(&mut self) -> CellsMut<'_> {
        CellsMut::new(self)
    }

    pub(crate) fn raw_cells_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.cells
    }

    /// Append a cell.
    pub fn push(&mut self, cell: Cell) {
        let cell = self.adopt(cell);
        self.cells.push(cell);
    }

    /// Insert a cell before position `index` (`index == len` appends).
    pub fn insert(&mut self, index: usize, cell: Cell) -> Result<()> {
        if index > self.cells.len() {
            return Err(NoteboxError::Index {
                index,
                len: self.cells.len(),
            });
        }
        let cell = self.adopt(cell);
        self.cells.insert(index, cell);
        Ok(())
    }

    /// Replace the cell at `index`, returning the old one.
    pub fn set(&mut self, index: usize, cell: Cell) -> Result<Cell> {
        self.cells_mut().set(index, cell)
    }

    /// Remove and return the cell at `index`.
    pub fn remove(&mut self, index: usize) -> Result<Cell> {
        self.cells_mut().remove(index)
    }

    pub fn remove_range(&mut self, range: impl RangeBounds<usize>) -> Result<Vec<Cell>> {
        self.cells_mut().remove_range(range)
    }

    /// Replace the cells in `range` with `cells`, returning the removed ones.
    pub fn splice(
        &mut self,
        range: impl RangeBounds<usize>,
        cells: impl IntoIterator<Item = Cell>,
    ) -> Result<Vec<Cell>> {
        self.cells_mut().set_slice(range, cells)
    }

    /// A copy holding only the cells in `range`.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Result<Notebook> {
        let range = resolve_range(range, self.cells.len())?;
        Ok(self.with_cells(self.cells[range].to_vec()))
    }

    /// A copy with the cells in reverse order.
    pub fn reversed(&self) -> Notebook {
        self.with_cells(self.cells.iter().rev().cloned().collect())
    }
}

impl Index<usize> for Notebook {
    type Output = Cell;

    fn index(&self, index: usize) -> &Cell {
        &self.cells[index]
    }
}

impl IndexMut<usize> for Notebook {
    fn index_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }
}

impl<'a> IntoIterator for &'a Notebook {
    type Item = &'a Cell;
    type IntoIter = std::slice::Iter<'a, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}

impl<'a> IntoIterator for &'a mut Notebook {
    type Item = &'a mut Cell;
    type IntoIter = std::slice::IterMut<'a, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter_mut()
    }
}

impl IntoIterator for Notebook {
    type Item = Cell;
    type IntoIter = std::vec::IntoIter<Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl FromIterator<Cell> for Notebook {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self::from_cells(iter)
    }
}

impl Extend<Cell> for Notebook {
    fn extend<I: IntoIterator<Item = Cell>>(&mut self, iter: I) {
        for cell in iter {
            self.push(cell);
        }
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

impl Notebook {
    /// A copy holding the cells that match `filter`.
    pub fn select(&self, filter: &CellFilter) -> Notebook {
        self.with_cells(
            self.cells
                .iter()
                .filter(|cell| filter.matches(cell))
                .cloned()
                .collect(),
        )
    }

    /// A copy without the cells that match `filter`.
    pub fn drop_matching(&self, filter: &CellFilter) -> Notebook {
        self.with_cells(
            self.cells
                .iter()
                .filter(|cell| !filter.matches(cell))
                .cloned()
                .collect(),
        )
    }

    /// Keep only the cells that match `filter`.
    pub fn retain_matching(&mut self, filter: &CellFilter) {
        self.cells.retain(|cell| filter.matches(cell));
    }

    /// Remove the cells that match `filter`, returning them in order.
    pub fn remove_matching(&mut self, filter: &CellFilter) -> Vec<Cell> {
        let (removed, kept): (Vec<Cell>, Vec<Cell>) = std::mem::take(&mut self.cells)
            .into_iter()
            .partition(|cell| filter.matches(cell));
        self.cells = kept;
        removed
    }
}

impl fmt::Display for Notebook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use notebox_shared::CellType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn three() -> Notebook {
        Notebook::from_cells([
            Cell::code("first cell"),
            Cell::code("second cell"),
            Cell::code("third cell"),
        ])
    }

    fn sources(nb: &Notebook) -> Vec<&str> {
        nb.iter().map(Cell::source).collect()
    }

    #[test]
    fn delete_keeps_order() {
        let mut nb = three();
        let removed = nb.remove(1).unwrap();
        assert_eq!(removed.source(), "second cell");
        assert_eq!(sources(&nb), vec!["first cell", "third cell"]);
        assert!(nb.remove(5).is_err());
    }

    #[test]
    fn slicing_and_reversing_copy() {
        let nb = three();
        assert_eq!(sources(&nb.slice(1..).unwrap()), vec!["second cell", "third cell"]);
        assert_eq!(sources(&nb.slice(..=0).unwrap()), vec!["first cell"]);
        assert!(nb.slice(2..4).is_err());
        assert_eq!(
            sources(&nb.reversed()),
            vec!["third cell", "second cell", "first cell"]
        );
        assert_eq!(sources(&nb), vec!["first cell", "second cell", "third cell"]);
    }

    #[test]
    fn insert_set_and_splice() {
        let mut nb = three();
        nb.insert(0, Cell::markdown("# Title")).unwrap();
        assert!(nb.insert(10, Cell::raw("x")).is_err());

        let old = nb.set(1, Cell::code("replaced")).unwrap();
        assert_eq!(old.source(), "first cell");

        let removed = nb
            .splice(2..4, [Cell::code("a"), Cell::code("b"), Cell::code("c")])
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(sources(&nb), vec!["# Title", "replaced", "a", "b", "c"]);
    }

    #[test]
    fn pushing_a_copy_gets_a_new_id() {
        let mut nb = three();
        let copy = nb[0].clone();
        nb.push(copy);
        assert_ne!(nb[0].id(), nb[3].id());
        nb.validate().unwrap();
    }

    #[test]
    fn round_trip_preserves_sources() {
        let mut nb = three();
        nb.push(Cell::markdown("multi\nline\nsource\n"));
        let text = nb.to_json_string().unwrap();
        let back: Notebook = text.parse().unwrap();
        assert_eq!(sources(&back), sources(&nb));
        assert_eq!(back.version(), (4, 5));
    }

    #[test]
    fn writes_nbformat_layout() {
        let nb = Notebook::from_cells([Cell::code("a\nb").with_id("cell-1")]);
        let text = nb.to_json_string().unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\n \"cells\": [\n  {\n   \"cell_type\": \"code\""));
        assert!(text.contains("\"source\": [\n    \"a\\n\",\n    \"b\"\n   ]"));
        let cells_at = text.find("\"cells\"").unwrap();
        let format_at = text.find("\"nbformat\"").unwrap();
        assert!(cells_at < format_at);
    }

    #[test]
    fn rejects_other_major_versions() {
        let v3 = json!({"nbformat": 3, "nbformat_minor": 0, "metadata": {}, "worksheets": []});
        let err = Notebook::from_node(v3).unwrap_err();
        assert!(matches!(err, NoteboxError::UnsupportedVersion { major: 3, minor: 0 }));

        let cell = json!({"cell_type": "code", "source": "", "metadata": {}});
        assert!(matches!(
            Notebook::from_node(cell).unwrap_err(),
            NoteboxError::InvalidInput { .. }
        ));
    }

    #[test]
    fn older_minor_versions_carry_no_ids() {
        let node = json!({
            "nbformat": 4,
            "nbformat_minor": 2,
            "metadata": {},
            "cells": [{"cell_type": "markdown", "metadata": {}, "source": "hi"}]
        });
        let mut nb = Notebook::from_node(node).unwrap();
        nb.push(Cell::code("x"));
        assert!(nb.iter().all(|c| c.id().is_none()));
        assert_eq!(nb.to_node().unwrap()["cells"][1].get("id"), None);
    }

    #[test]
    fn missing_ids_are_filled_in() {
        let node = json!({
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {},
            "cells": [
                {"cell_type": "raw", "metadata": {}, "source": "a"},
                {"cell_type": "raw", "id": "same", "metadata": {}, "source": "b"},
                {"cell_type": "raw", "id": "same", "metadata": {}, "source": "c"}
            ]
        });
        let nb = Notebook::from_node(node).unwrap();
        assert!(nb.iter().all(|c| c.id().is_some()));
        assert_eq!(nb[1].id(), Some("same"));
        assert_ne!(nb[2].id(), Some("same"));
    }

    #[test]
    fn filtering_copies_and_in_place() {
        let mut nb = Notebook::from_cells([
            Cell::code("a").with_tags(["keep"]),
            Cell::markdown("b"),
            Cell::code("c").with_tags(["keep"]),
        ]);
        let keep = CellFilter::new().tags(["keep"]);

        assert_eq!(sources(&nb.select(&keep)), vec!["a", "c"]);
        assert_eq!(sources(&nb.drop_matching(&keep)), vec!["b"]);

        let removed = nb.remove_matching(&CellFilter::new().cell_type(CellType::Markdown));
        assert_eq!(removed.len(), 1);
        assert_eq!(sources(&nb), vec!["a", "c"]);

        nb.retain_matching(&CellFilter::new().source("c"));
        assert_eq!(sources(&nb), vec!["c"]);
    }

    #[test]
    fn file_round_trip_and_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.ipynb");
        three().to_ipynb(&path).unwrap();

        Notebook::edit_file(&path, |nb| {
            nb.remove(0)?;
            Ok(())
        })
        .unwrap();

        let mut nb = Notebook::open(&path).unwrap();
        assert_eq!(nb.file(), Some(path.as_path()));
        assert_eq!(sources(&nb), vec!["second cell", "third cell"]);

        nb.push(Cell::raw("unsaved"));
        nb.load().unwrap();
        assert_eq!(nb.len(), 2);

        assert!(Notebook::new().save().is_err());
    }

    #[test]
    fn kernel_and_language_from_metadata() {
        let mut nb = Notebook::new();
        assert_eq!(nb.kernel_name(), None);
        nb.metadata_mut().insert(
            "kernelspec".into(),
            json!({"name": "ir", "display_name": "R", "language": "R"}),
        );
        nb.metadata_mut()
            .insert("language_info".into(), json!({"name": "R", "file_extension": ".r"}));
        assert_eq!(nb.kernel_name(), Some("ir"));
        assert_eq!(nb.language(), Some("R"));
        assert_eq!(nb.language_info("file_extension"), Some(".r"));
    }

    #[test]
    fn display_joins_cells() {
        let nb = Notebook::from_cells([Cell::markdown("a"), Cell::raw("b")]);
        assert_eq!(nb.to_string(), "       a\n       b");
    }
}
