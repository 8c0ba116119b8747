//! Jupyter `nbconvert` bridge.
//!
//! Runs `jupyter nbconvert --stdin --stdout` as a subprocess, feeding the
//! notebook document through stdin. Provides:
//! - [`NbconvertEngine`]: an [`notebox_core::ExecutePreprocessor`] backed by
//!   real Jupyter kernels
//! - [`NbconvertExporter`]: delegated formats (PDF, LaTeX…)

mod bridge;
mod engine;
mod exporter;

pub use bridge::Nbconvert;
pub use engine::NbconvertEngine;
pub use exporter::NbconvertExporter;
