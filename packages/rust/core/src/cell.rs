//! The cell wrapper.
//!
//! A [`Cell`] owns one nbformat v4 cell. Its type is fixed at construction
//! and only changes through [`Cell::convert`], which also adds or drops the
//! code-only fields (`outputs`, `execution_count`).

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use notebox_shared::{CellType, Metadata, NoteboxError, Output, OutputType, Result, multiline};

use crate::notebook::Notebook;
use crate::outputs::{Outputs, output_to_plain};

/// Column at which [`Cell`]'s `Display` output is wrapped.
const DISPLAY_WIDTH: usize = 200;

/// Indentation of source lines in `Display` output.
const DISPLAY_INDENT: usize = 7;

/// Generate a fresh nbformat 4.5 cell id.
pub(crate) fn new_cell_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

// ---------------------------------------------------------------------------
// Construction input
// ---------------------------------------------------------------------------

/// Anything a cell can be built from.
#[derive(Debug, Clone, PartialEq)]
pub enum CellInput {
    /// No content: empty source.
    Empty,
    /// Source text.
    Source(String),
    /// A raw document node (JSON object with `cell_type`).
    Node(Value),
    /// Another cell, deep-copied.
    Cell(Cell),
}

impl From<()> for CellInput {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<&str> for CellInput {
    fn from(source: &str) -> Self {
        Self::Source(source.to_string())
    }
}

impl From<String> for CellInput {
    fn from(source: String) -> Self {
        Self::Source(source)
    }
}

impl From<&String> for CellInput {
    fn from(source: &String) -> Self {
        Self::Source(source.clone())
    }
}

impl From<Value> for CellInput {
    fn from(node: Value) -> Self {
        Self::Node(node)
    }
}

impl From<Cell> for CellInput {
    fn from(cell: Cell) -> Self {
        Self::Cell(cell)
    }
}

impl From<&Cell> for CellInput {
    fn from(cell: &Cell) -> Self {
        Self::Cell(cell.clone())
    }
}

/// Text that can be spliced into a cell's source: a string or another
/// cell's source.
pub trait CellText {
    fn cell_text(&self) -> &str;
}

impl CellText for str {
    fn cell_text(&self) -> &str {
        self
    }
}

impl CellText for String {
    fn cell_text(&self) -> &str {
        self
    }
}

impl CellText for Cell {
    fn cell_text(&self) -> &str {
        &self.source
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// One notebook cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CellRepr", into = "CellRepr")]
pub struct Cell {
    id: Option<String>,
    cell_type: CellType,
    source: String,
    metadata: Metadata,
    attachments: Option<Value>,
    outputs: Vec<Output>,
    execution_count: Option<u32>,
}

impl Cell {
    /// Build a cell of `cell_type` from any supported input.
    ///
    /// Nodes and cells are deep-copied and converted to `cell_type`.
    pub fn new(cell_type: CellType, input: impl Into<CellInput>) -> Result<Self> {
        match input.into() {
            CellInput::Empty => Ok(Self::blank(cell_type, String::new())),
            CellInput::Source(source) => Ok(Self::blank(cell_type, source)),
            CellInput::Node(node) => Ok(Self::from_node(node)?.converted(cell_type)),
            CellInput::Cell(cell) => Ok(cell.converted(cell_type)),
        }
    }

    /// A code cell with the given source.
    pub fn code(source: impl Into<String>) -> Self {
        Self::blank(CellType::Code, source.into())
    }

    /// A markdown cell with the given source.
    pub fn markdown(source: impl Into<String>) -> Self {
        Self::blank(CellType::Markdown, source.into())
    }

    /// A raw cell with the given source.
    pub fn raw(source: impl Into<String>) -> Self {
        Self::blank(CellType::Raw, source.into())
    }

    fn blank(cell_type: CellType, source: String) -> Self {
        Self {
            id: Some(new_cell_id()),
            cell_type,
            source,
            metadata: Metadata::new(),
            attachments: None,
            outputs: Vec::new(),
            execution_count: None,
        }
    }

    /// Parse a document node, taking the type from its `cell_type`.
    pub fn from_node(node: Value) -> Result<Self> {
        let Some(object) = node.as_object() else {
            return Err(NoteboxError::invalid_input(
                "cell node must be a JSON object",
            ));
        };
        if object.contains_key("cells") || object.contains_key("nbformat") {
            return Err(NoteboxError::invalid_input(
                "expected a cell node, got a notebook",
            ));
        }

        let cell: Self = serde_json::from_value(node)
            .map_err(|e| NoteboxError::invalid_input(format!("not a cell node: {e}")))?;
        debug!(cell_type = %cell.cell_type, "cell built from node");
        Ok(cell)
    }

    /// A cell whose source is the content of a text file.
    pub fn from_file(cell_type: CellType, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| NoteboxError::io(path, e))?;
        Ok(Self::blank(cell_type, source))
    }

    // ---- builders ----

    /// Merge `metadata` into the cell metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_tags(tags);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach outputs. Fails on non-code cells.
    pub fn with_outputs(mut self, outputs: Vec<Output>) -> Result<Self> {
        self.set_outputs(outputs)?;
        Ok(self)
    }

    /// Set the execution count. Fails on non-code cells.
    pub fn with_execution_count(mut self, count: u32) -> Result<Self> {
        self.set_execution_count(Some(count))?;
        Ok(self)
    }

    // ---- accessors ----

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    /// Markdown/raw cell attachments, as stored in the document.
    pub fn attachments(&self) -> Option<&Value> {
        self.attachments.as_ref()
    }

    pub fn execution_count(&self) -> Option<u32> {
        self.execution_count
    }

    pub fn set_execution_count(&mut self, count: Option<u32>) -> Result<()> {
        self.require_code()?;
        self.execution_count = count;
        Ok(())
    }

    fn require_code(&self) -> Result<()> {
        if self.cell_type == CellType::Code {
            Ok(())
        } else {
            Err(NoteboxError::NotCodeCell {
                cell_type: self.cell_type.to_string(),
            })
        }
    }

    // ---- tags ----

    /// The `metadata.tags` entries, in stored order.
    pub fn tags(&self) -> Vec<&str> {
        self.metadata
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Replace the tag set. Duplicates are dropped; an empty set removes the
    /// `tags` key.
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into();
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }

        if unique.is_empty() {
            self.metadata.remove("tags");
        } else {
            self.metadata.insert(
                "tags".into(),
                Value::Array(unique.into_iter().map(Value::String).collect()),
            );
        }
    }

    /// Add a tag; returns `false` if it was already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        let mut tags: Vec<String> = self.tags().into_iter().map(str::to_string).collect();
        if tags.contains(&tag) {
            return false;
        }
        tags.push(tag);
        self.set_tags(tags);
        true
    }

    /// Remove a tag; returns `false` if it was absent.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let tags: Vec<String> = self.tags().into_iter().map(str::to_string).collect();
        if !tags.iter().any(|t| t == tag) {
            return false;
        }
        self.set_tags(tags.into_iter().filter(|t| t != tag));
        true
    }

    // ---- source mutation ----

    /// Append text (or another cell's source) to the source.
    pub fn append<T: CellText + ?Sized>(&mut self, value: &T) {
        self.source.push_str(value.cell_text());
    }

    /// Insert text at a character position, clamped to the source length.
    pub fn insert<T: CellText + ?Sized>(&mut self, index: usize, value: &T) {
        let at = self
            .source
            .char_indices()
            .nth(index)
            .map_or(self.source.len(), |(byte, _)| byte);
        self.source.insert_str(at, value.cell_text());
    }

    /// Replace the whole source.
    pub fn overwrite<T: CellText + ?Sized>(&mut self, value: &T) {
        self.source = value.cell_text().to_string();
    }

    pub fn appended<T: CellText + ?Sized>(&self, value: &T) -> Self {
        let mut cell = self.clone();
        cell.append(value);
        cell
    }

    pub fn inserted<T: CellText + ?Sized>(&self, index: usize, value: &T) -> Self {
        let mut cell = self.clone();
        cell.insert(index, value);
        cell
    }

    pub fn overwritten<T: CellText + ?Sized>(&self, value: &T) -> Self {
        let mut cell = self.clone();
        cell.overwrite(value);
        cell
    }

    // ---- type conversion ----

    /// Change the cell type, adding or dropping the code-only fields.
    pub fn convert(&mut self, cell_type: CellType) {
        if self.cell_type == cell_type {
            return;
        }
        debug!(from = %self.cell_type, to = %cell_type, "converting cell");
        self.outputs.clear();
        self.execution_count = None;
        if cell_type == CellType::Code {
            self.attachments = None;
        }
        self.cell_type = cell_type;
    }

    pub fn converted(mut self, cell_type: CellType) -> Self {
        self.convert(cell_type);
        self
    }

    // ---- outputs ----

    /// View over the outputs (empty for non-code cells).
    pub fn outputs(&self) -> Outputs<'_> {
        Outputs::new(&self.outputs)
    }

    pub fn set_outputs(&mut self, outputs: Vec<Output>) -> Result<()> {
        self.require_code()?;
        self.outputs = outputs;
        Ok(())
    }

    pub fn push_output(&mut self, output: Output) -> Result<()> {
        self.require_code()?;
        self.outputs.push(output);
        Ok(())
    }

    pub fn remove_output(&mut self, index: usize) -> Result<Output> {
        self.require_code()?;
        if index >= self.outputs.len() {
            return Err(NoteboxError::Index {
                index,
                len: self.outputs.len(),
            });
        }
        Ok(self.outputs.remove(index))
    }

    /// Drop every output and reset the execution count.
    pub fn clear_outputs(&mut self) -> Result<()> {
        self.require_code()?;
        self.outputs.clear();
        self.execution_count = None;
        Ok(())
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut Vec<Output> {
        &mut self.outputs
    }

    // ---- predicates ----

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }

    /// Whether the tag set intersects `tags`.
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        let own = self.tags();
        tags.iter().any(|tag| own.contains(&tag.as_ref()))
    }

    pub fn is_type(&self, types: &[CellType]) -> bool {
        types.contains(&self.cell_type)
    }

    pub fn is_source(&self, source: &str) -> bool {
        self.source == source
    }

    /// Whether `pattern` matches at the start of the source.
    pub fn matches_source(&self, pattern: &Regex) -> bool {
        pattern.find(&self.source).is_some_and(|m| m.start() == 0)
    }

    /// Whether any output is of one of `types`.
    pub fn has_output_type(&self, types: &[OutputType]) -> bool {
        self.outputs.iter().any(|o| o.is_type(types))
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn has_output(&self) -> bool {
        !self.outputs.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.outputs.iter().any(Output::is_error)
    }

    pub fn has_execute_result(&self) -> bool {
        self.has_output_type(&[OutputType::ExecuteResult])
    }

    /// A one-cell notebook holding a copy of this cell.
    pub fn to_notebook(&self) -> Notebook {
        Notebook::from_cells([self.clone()])
    }

    // ---- display ----

    fn render_code(&self) -> String {
        let count = self
            .execution_count
            .map_or_else(|| " ".to_string(), |n| n.to_string());
        let indent = DISPLAY_INDENT + count.len() - 1;

        let display: String = self
            .outputs
            .iter()
            .filter(|o| o.is_type(&[OutputType::Stream, OutputType::DisplayData]))
            .map(output_to_plain)
            .collect();
        let result: String = self
            .outputs
            .iter()
            .filter(|o| o.output_type() == OutputType::ExecuteResult)
            .map(output_to_plain)
            .collect();
        let error: String = self
            .outputs
            .iter()
            .filter(|o| o.is_error())
            .map(output_to_plain)
            .collect();

        let mut blocks = vec![format!("In [{count}]: {}", indent_rest(&self.source, indent))];
        if !display.is_empty() {
            blocks.push(indent_all(&display, indent));
        }
        for block in [result, error] {
            if !block.is_empty() {
                blocks.push(format!("Out[{count}]: {}", indent_rest(&block, indent)));
            }
        }
        blocks.join("\n")
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self.cell_type {
            CellType::Code => self.render_code(),
            CellType::Markdown | CellType::Raw => indent_all(&self.source, DISPLAY_INDENT),
        };
        f.write_str(&wrap_long_lines(&text))
    }
}

/// Indent every line but the first.
fn indent_rest(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.trim_end_matches('\n')
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent_all(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.trim_end_matches('\n')
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_long_lines(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.chars().count() <= DISPLAY_WIDTH {
                return line.to_string();
            }
            let lead: String = line.chars().take_while(|c| *c == ' ').collect();
            let options = textwrap::Options::new(DISPLAY_WIDTH).subsequent_indent(&lead);
            textwrap::wrap(line, options).join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Document representation
// ---------------------------------------------------------------------------

/// On-disk cell layout: code-only fields only exist on the code variant.
#[derive(Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum CellRepr {
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Metadata,
        #[serde(default, with = "multiline")]
        source: String,
        #[serde(default)]
        outputs: Vec<Output>,
        #[serde(default)]
        execution_count: Option<u32>,
    },
    Markdown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Metadata,
        #[serde(default, with = "multiline")]
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachments: Option<Value>,
    },
    Raw {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Metadata,
        #[serde(default, with = "multiline")]
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachments: Option<Value>,
    },
}

impl From<CellRepr> for Cell {
    fn from(repr: CellRepr) -> Self {
        match repr {
            CellRepr::Code {
                id,
                metadata,
                source,
                outputs,
                execution_count,
            } => Self {
                id,
                cell_type: CellType::Code,
                source,
                metadata,
                attachments: None,
                outputs,
                execution_count,
            },
            CellRepr::Markdown {
                id,
                metadata,
                source,
                attachments,
            } => Self::prose(CellType::Markdown, id, metadata, source, attachments),
            CellRepr::Raw {
                id,
                metadata,
                source,
                attachments,
            } => Self::prose(CellType::Raw, id, metadata, source, attachments),
        }
    }
}

impl Cell {
    fn prose(
        cell_type: CellType,
        id: Option<String>,
        metadata: Metadata,
        source: String,
        attachments: Option<Value>,
    ) -> Self {
        Self {
            id,
            cell_type,
            source,
            metadata,
            attachments,
            outputs: Vec::new(),
            execution_count: None,
        }
    }
}

impl From<Cell> for CellRepr {
    fn from(cell: Cell) -> Self {
        let Cell {
            id,
            cell_type,
            source,
            metadata,
            attachments,
            outputs,
            execution_count,
        } = cell;

        match cell_type {
            CellType::Code => Self::Code {
                id,
                metadata,
                source,
                outputs,
                execution_count,
            },
            CellType::Markdown => Self::Markdown {
                id,
                metadata,
                source,
                attachments,
            },
            CellType::Raw => Self::Raw {
                id,
                metadata,
                source,
                attachments,
            },
        }
    }
}
