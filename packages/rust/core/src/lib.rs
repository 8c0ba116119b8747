//! Object model for Jupyter notebooks (nbformat v4).
//!
//! [`Notebook`] is an ordered collection of [`Cell`]s that can be filtered,
//! sliced, parameterized, cleared, executed through an
//! [`ExecutePreprocessor`] and rendered through an [`Exporter`].

pub mod ansi;
pub mod cell;
pub mod cells;
pub mod css;
pub mod execute;
pub mod export;
pub mod filter;
pub mod notebook;
pub mod outputs;
pub mod params;
pub mod preprocess;
pub mod run;
mod validate;

pub use cell::{Cell, CellInput, CellText};
pub use cells::{Cells, CellsMut};
pub use css::{NOTEBOOK_CSS, extract_css, notebook_css};
pub use execute::{ExecuteOptions, ExecutePreprocessor, ExecuteResources};
pub use export::{Exporter, IpynbExporter};
pub use filter::CellFilter;
pub use notebook::Notebook;
pub use outputs::{HtmlOptions, OutputFilter, Outputs, output_to_html, output_to_plain};
pub use params::{ParamValue, Parameters, set_parameters};
pub use preprocess::{MetadataClearing, TagRemoval};
pub use run::{NoHooks, RunFailure, RunHooks, RunOptions, RunStatus, run_notebook};
