//! Document schema primitives for nbformat v4 notebooks.
//!
//! These are the plain data pieces every crate agrees on: cell and output
//! kinds, MIME bundles and the output variants. The cell and notebook
//! wrappers built on top of them live in `notebox-core`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::NoteboxError;

/// Major notebook format version written and accepted.
pub const NB_FORMAT: u64 = 4;

/// Minor notebook format version written for new documents (cell ids).
pub const NB_FORMAT_MINOR: u64 = 5;

/// Kernel used when neither the notebook nor the caller names one.
pub const DEFAULT_KERNEL_NAME: &str = "python3";

/// Free-form JSON object used for notebook, cell and output metadata.
pub type Metadata = Map<String, Value>;

// ---------------------------------------------------------------------------
// CellType
// ---------------------------------------------------------------------------

/// Kind of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    /// Executable code.
    Code,
    /// Markdown prose.
    Markdown,
    /// Raw text passed through untouched by converters.
    Raw,
}

impl CellType {
    /// Every cell type, in document-format order.
    pub const ALL: [CellType; 3] = [CellType::Code, CellType::Markdown, CellType::Raw];

    /// The `cell_type` string used in the document format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
            Self::Raw => "raw",
        }
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CellType {
    type Err = NoteboxError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "markdown" | "md" => Ok(Self::Markdown),
            "raw" => Ok(Self::Raw),
            _ => Err(NoteboxError::invalid_input(format!(
                "unknown cell type '{s}', expected code, markdown or raw"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputType
// ---------------------------------------------------------------------------

/// Kind of a code cell output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    /// stdout/stderr text.
    Stream,
    /// Rich data shown with `display()`.
    DisplayData,
    /// The value of the last expression in the cell.
    ExecuteResult,
    /// An exception raised by the cell.
    Error,
}

impl OutputType {
    /// The `output_type` string used in the document format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::DisplayData => "display_data",
            Self::ExecuteResult => "execute_result",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputType {
    type Err = NoteboxError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "stream" => Ok(Self::Stream),
            "display_data" | "display" => Ok(Self::DisplayData),
            "execute_result" | "result" => Ok(Self::ExecuteResult),
            "error" => Ok(Self::Error),
            _ => Err(NoteboxError::invalid_input(format!(
                "unknown output type '{s}', expected stream, display_data, execute_result or error"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Multi-line strings
// ---------------------------------------------------------------------------

/// Serde adapter for nbformat multi-line strings.
///
/// Reads either a JSON string or an array of strings; writes an array of
/// lines, each keeping its trailing newline.
pub mod multiline {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        One(String),
        Many(Vec<String>),
    }

    pub fn serialize<S: Serializer>(text: &str, serializer: S) -> Result<S::Ok, S::Error> {
        split_lines(text).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(s) => s,
            Repr::Many(lines) => lines.concat(),
        })
    }

    /// Split text into lines that keep their `\n`.
    pub fn split_lines(text: &str) -> Vec<&str> {
        text.split_inclusive('\n').collect()
    }
}

// ---------------------------------------------------------------------------
// MimeBundle
// ---------------------------------------------------------------------------

/// MIME type → representation mapping carried by rich outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MimeBundle(BTreeMap<String, Value>);

impl MimeBundle {
    /// An empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MimeBundle::insert_text`].
    pub fn with_text(mut self, mime: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert_text(mime, text);
        self
    }

    /// Store a textual representation.
    pub fn insert_text(&mut self, mime: impl Into<String>, text: impl Into<String>) {
        self.0.insert(mime.into(), Value::String(text.into()));
    }

    /// Store an arbitrary JSON representation (e.g. `application/json`).
    pub fn insert(&mut self, mime: impl Into<String>, value: Value) {
        self.0.insert(mime.into(), value);
    }

    /// Whether a representation for `mime` exists.
    pub fn contains(&self, mime: &str) -> bool {
        self.0.contains_key(mime)
    }

    /// The raw JSON representation for `mime`.
    pub fn get(&self, mime: &str) -> Option<&Value> {
        self.0.get(mime)
    }

    /// The representation for `mime` as text.
    ///
    /// Line arrays are joined; non-text JSON values are serialized.
    pub fn text(&self, mime: &str) -> Option<String> {
        self.0.get(mime).map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Array(items) if items.iter().all(Value::is_string) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<String>(),
            other => other.to_string(),
        })
    }

    /// MIME types present, sorted.
    pub fn mime_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of representations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bundle has no representation.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A result attached to a code cell after execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    /// Text written to `stdout` or `stderr`.
    Stream {
        name: String,
        #[serde(with = "multiline")]
        text: String,
    },
    /// Rich data displayed explicitly.
    DisplayData {
        data: MimeBundle,
        #[serde(default)]
        metadata: Metadata,
    },
    /// Representation of the value the cell evaluated to.
    ExecuteResult {
        data: MimeBundle,
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        metadata: Metadata,
    },
    /// An exception raised by the cell.
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl Output {
    /// A stream output (`name` is `stdout` or `stderr`).
    pub fn stream(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Stream {
            name: name.into(),
            text: text.into(),
        }
    }

    /// A display_data output.
    pub fn display_data(data: MimeBundle) -> Self {
        Self::DisplayData {
            data,
            metadata: Metadata::new(),
        }
    }

    /// An execute_result output.
    pub fn execute_result(execution_count: Option<u32>, data: MimeBundle) -> Self {
        Self::ExecuteResult {
            data,
            execution_count,
            metadata: Metadata::new(),
        }
    }

    /// An error output.
    pub fn error(
        ename: impl Into<String>,
        evalue: impl Into<String>,
        traceback: Vec<String>,
    ) -> Self {
        Self::Error {
            ename: ename.into(),
            evalue: evalue.into(),
            traceback,
        }
    }

    /// Which variant this is.
    pub fn output_type(&self) -> OutputType {
        match self {
            Self::Stream { .. } => OutputType::Stream,
            Self::DisplayData { .. } => OutputType::DisplayData,
            Self::ExecuteResult { .. } => OutputType::ExecuteResult,
            Self::Error { .. } => OutputType::Error,
        }
    }

    /// The MIME bundle of display/execute outputs.
    pub fn data(&self) -> Option<&MimeBundle> {
        match self {
            Self::DisplayData { data, .. } | Self::ExecuteResult { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Whether this output is of any of the given types.
    pub fn is_type(&self, types: &[OutputType]) -> bool {
        types.contains(&self.output_type())
    }

    /// Whether this is an error output.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
