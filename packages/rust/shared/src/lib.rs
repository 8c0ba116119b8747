//! Shared types, error model, and configuration for notebox.
//!
//! This crate is the foundation depended on by all other notebox crates.
//! It provides:
//! - [`NoteboxError`], the unified error type
//! - Document schema primitives ([`CellType`], [`Output`], [`MimeBundle`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExportConfig, KernelConfig, RunConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{CellExecutionError, NoteboxError, Result};
pub use types::{
    CellType, DEFAULT_KERNEL_NAME, Metadata, MimeBundle, NB_FORMAT, NB_FORMAT_MINOR, Output,
    OutputType, multiline,
};
