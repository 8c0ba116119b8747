//! Error types for notebox.
//!
//! Library crates use [`NoteboxError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all notebox operations.
#[derive(Debug, thiserror::Error)]
pub enum NoteboxError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Notebook JSON could not be parsed or serialized.
    #[error("notebook JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document failed schema validation.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Only nbformat 4 documents are handled.
    #[error("unsupported notebook format {major}.{minor}")]
    UnsupportedVersion { major: u64, minor: u64 },

    /// A value could not be turned into a cell or notebook.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Parameter name is not a valid identifier or is a keyword.
    #[error("invalid variable name: {name}")]
    InvalidIdentifier { name: String },

    /// Parameter value has no representation that rebuilds it.
    #[error("variable '{name}' repr does not produce valid initiation string: {repr}")]
    NonReproducibleRepr { name: String, repr: String },

    /// Position outside the cell or output sequence.
    #[error("index {index} out of range for length {len}")]
    Index { index: usize, len: usize },

    /// Outputs and execution counts only exist on code cells.
    #[error("operation requires a code cell, got a {cell_type} cell")]
    NotCodeCell { cell_type: String },

    /// Source filter regex failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A cell raised while the notebook was executing.
    #[error(transparent)]
    CellExecution(Box<CellExecutionError>),

    /// The execution engine itself failed (spawn, timeout, protocol).
    #[error("kernel error: {0}")]
    Kernel(String),

    /// Format conversion error.
    #[error("export error: {0}")]
    Export(String),
}

/// Details of the cell that aborted an execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cell {cell_index} raised {ename}: {evalue}")]
pub struct CellExecutionError {
    /// Position of the failing cell in the executed notebook.
    pub cell_index: usize,
    /// Exception class name reported by the kernel.
    pub ename: String,
    /// Exception message reported by the kernel.
    pub evalue: String,
    /// Traceback lines joined with `\n` (ANSI escapes kept).
    pub traceback: String,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NoteboxError>;

impl NoteboxError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an invalid-input error from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a cell failure.
    pub fn cell_execution(err: CellExecutionError) -> Self {
        Self::CellExecution(Box::new(err))
    }

    /// The cell failure, if this error is one.
    pub fn as_cell_execution(&self) -> Option<&CellExecutionError> {
        match self {
            Self::CellExecution(err) => Some(err),
            _ => None,
        }
    }
}
