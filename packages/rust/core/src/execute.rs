//! Execution delegation.
//!
//! Running code belongs to an external engine behind the
//! [`ExecutePreprocessor`] trait. This module prepares its inputs (working
//! directory, kernel, timeout, the subset of cells to run) and writes the
//! results back into the notebook.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, instrument, warn};

use notebox_shared::{CellType, DEFAULT_KERNEL_NAME, NoteboxError, Result};

use crate::cell::Cell;
use crate::filter::CellFilter;
use crate::notebook::Notebook;

/// An engine that executes every code cell of a notebook in place.
///
/// Implementations attach outputs and execution counts to the cells they
/// run. When a cell raises, they stop, leave the notebook as it is at that
/// point (the failing cell holding its error output) and return
/// [`NoteboxError::CellExecution`]. Failures of the engine itself are
/// reported as [`NoteboxError::Kernel`].
pub trait ExecutePreprocessor {
    fn preprocess(&self, notebook: &mut Notebook, resources: &ExecuteResources) -> Result<()>;
}

/// Resolved inputs handed to an [`ExecutePreprocessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteResources {
    /// Working directory of the kernel.
    pub path: Option<PathBuf>,
    pub kernel_name: String,
    /// Per-cell timeout; `None` waits forever.
    pub timeout: Option<Duration>,
}

/// Caller options for [`Notebook::execute`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Working directory; defaults to the notebook file's directory.
    pub path: Option<PathBuf>,
    /// Kernel; overrides the notebook's kernelspec.
    pub kernel_name: Option<String>,
    /// Kernel used when neither `kernel_name` nor the notebook names one
    /// (`python3` if unset).
    pub default_kernel: Option<String>,
    pub timeout: Option<Duration>,
    /// Cells matching this filter are left out of the run.
    pub ignore: Option<CellFilter>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn kernel_name(mut self, name: impl Into<String>) -> Self {
        self.kernel_name = Some(name.into());
        self
    }

    pub fn default_kernel(mut self, name: impl Into<String>) -> Self {
        self.default_kernel = Some(name.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn ignore(mut self, filter: CellFilter) -> Self {
        self.ignore = Some(filter);
        self
    }
}

impl Notebook {
    fn resources(&self, options: &ExecuteOptions) -> ExecuteResources {
        let path = options.path.clone().or_else(|| {
            self.file()
                .and_then(|file| file.parent())
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(|dir| dir.to_path_buf())
        });
        let kernel_name = options
            .kernel_name
            .clone()
            .or_else(|| self.kernel_name().map(str::to_string))
            .or_else(|| options.default_kernel.clone())
            .unwrap_or_else(|| DEFAULT_KERNEL_NAME.to_string());

        ExecuteResources {
            path,
            kernel_name,
            timeout: options.timeout,
        }
    }

    /// Execute in place.
    ///
    /// With `options.ignore`, only the cells not matching it run; they are
    /// written back to their positions whether the run succeeds or fails,
    /// and a failing cell is reported by its position in this notebook.
    #[instrument(skip_all, fields(cells = self.len()))]
    pub fn execute(
        &mut self,
        engine: &dyn ExecutePreprocessor,
        options: &ExecuteOptions,
    ) -> Result<()> {
        let resources = self.resources(options);
        info!(kernel = %resources.kernel_name, path = ?resources.path, "executing notebook");

        match &options.ignore {
            None => engine.preprocess(self, &resources),
            Some(ignore) => self.execute_subset(engine, ignore, &resources),
        }
    }

    /// Execute a copy; `self` is untouched, also on failure.
    pub fn executed(
        &self,
        engine: &dyn ExecutePreprocessor,
        options: &ExecuteOptions,
    ) -> Result<Notebook> {
        let mut copy = self.clone();
        copy.execute(engine, options)?;
        Ok(copy)
    }

    fn execute_subset(
        &mut self,
        engine: &dyn ExecutePreprocessor,
        ignore: &CellFilter,
        resources: &ExecuteResources,
    ) -> Result<()> {
        let positions: Vec<usize> = self
            .iter()
            .enumerate()
            .filter(|(_, cell)| !ignore.matches(cell))
            .map(|(i, _)| i)
            .collect();
        info!(
            running = positions.len(),
            ignored = self.len() - positions.len(),
            "executing subset"
        );
        if positions.is_empty() {
            return Ok(());
        }

        let mut subset = self.with_cells(positions.iter().map(|&i| self[i].clone()).collect());
        let outcome = engine.preprocess(&mut subset, resources);

        let executed = subset.into_cells();
        if executed.len() != positions.len() {
            warn!(
                expected = positions.len(),
                got = executed.len(),
                "engine changed the number of cells"
            );
        }
        let cells = self.raw_cells_mut();
        for (cell, &position) in executed.into_iter().zip(&positions) {
            cells[position] = cell;
        }

        outcome.map_err(|err| match err {
            NoteboxError::CellExecution(mut failure) => {
                if let Some(&position) = positions.get(failure.cell_index) {
                    failure.cell_index = position;
                }
                NoteboxError::CellExecution(failure)
            }
            other => other,
        })
    }
}

impl Cell {
    /// Run this code cell as a one-cell notebook and keep its outputs.
    pub fn execute(
        &mut self,
        engine: &dyn ExecutePreprocessor,
        options: &ExecuteOptions,
    ) -> Result<()> {
        if self.cell_type() != CellType::Code {
            return Err(NoteboxError::NotCodeCell {
                cell_type: self.cell_type().to_string(),
            });
        }

        let options = ExecuteOptions {
            ignore: None,
            ..options.clone()
        };
        let mut nb = self.to_notebook();
        let outcome = nb.execute(engine, &options);
        if let Some(cell) = nb.into_cells().into_iter().next() {
            *self = cell;
        }
        outcome
    }
}
