//! `run_notebook`: parameterize, clear, execute and report through hooks.

use tracing::{info, instrument, warn};

use notebox_shared::{AppConfig, CellExecutionError, NoteboxError, Result};

use crate::cell::Cell;
use crate::execute::{ExecuteOptions, ExecutePreprocessor};
use crate::filter::CellFilter;
use crate::notebook::Notebook;
use crate::params::{Parameters, set_parameters};

/// How a run ended, as reported to [`RunHooks::on_finally`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// A cell raised.
    Failure,
    /// The engine failed before a cell could report (spawn, timeout…).
    Aborted,
}

/// The state handed to [`RunHooks::on_failure`].
#[derive(Debug, Clone, Copy)]
pub struct RunFailure<'a> {
    /// The notebook as it was when the cell failed.
    pub notebook: &'a Notebook,
    pub error: &'a CellExecutionError,
    /// The cell that raised.
    pub cell: Option<&'a Cell>,
}

/// Callbacks invoked by [`run_notebook`]. Every method defaults to a no-op.
pub trait RunHooks {
    fn on_success(&mut self, _notebook: &Notebook) {}

    fn on_failure(&mut self, _failure: &RunFailure<'_>) {}

    fn on_finally(&mut self, _notebook: &Notebook, _status: RunStatus) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl RunHooks for NoHooks {}

/// Options for [`run_notebook`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Values written into the parameter cell before running.
    pub parameters: Option<Parameters>,
    /// Whether generated parameter source includes import lines.
    pub parameters_with_imports: bool,
    /// Return the notebook instead of the error when a cell fails.
    pub silence: bool,
    /// Clear outputs before running.
    pub clear_outputs: bool,
    /// Tag of the cell receiving parameters.
    pub parameter_tag: String,
    /// Cells left out of the run.
    pub ignore_cells: Option<CellFilter>,
    pub execute: ExecuteOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            parameters: None,
            parameters_with_imports: false,
            silence: false,
            clear_outputs: true,
            parameter_tag: "parameters".into(),
            ignore_cells: None,
            execute: ExecuteOptions::default(),
        }
    }
}

impl From<&AppConfig> for RunOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            parameters_with_imports: config.run.parameters_with_imports,
            clear_outputs: config.run.clear_outputs,
            parameter_tag: config.run.parameter_tag.clone(),
            execute: ExecuteOptions {
                default_kernel: Some(config.kernel.name.clone()),
                timeout: config.kernel.timeout(),
                ..ExecuteOptions::default()
            },
            ..Self::default()
        }
    }
}

impl RunOptions {
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn ignore_cells(mut self, filter: CellFilter) -> Self {
        self.ignore_cells = Some(filter);
        self
    }

    pub fn silence(mut self, silence: bool) -> Self {
        self.silence = silence;
        self
    }

    pub fn clear_outputs(mut self, clear: bool) -> Self {
        self.clear_outputs = clear;
        self
    }
}

/// Parameterize and execute `notebook`.
///
/// Parameters go into the first cell tagged `options.parameter_tag`,
/// outputs are cleared if requested, then the notebook executes in place
/// with `ignore_cells` left out. Hooks see the notebook as it ends up:
/// `on_success` or `on_failure`, then always `on_finally`. A cell failure is
/// returned as an error unless `options.silence` is set, in which case the
/// partially executed notebook is returned.
#[instrument(skip_all, fields(cells = notebook.len()))]
pub fn run_notebook(
    mut notebook: Notebook,
    engine: &dyn ExecutePreprocessor,
    options: &RunOptions,
    hooks: &mut dyn RunHooks,
) -> Result<Notebook> {
    if let Some(parameters) = &options.parameters {
        set_parameters(
            &mut notebook,
            parameters,
            &options.parameter_tag,
            options.parameters_with_imports,
        )?;
    }
    if options.clear_outputs {
        notebook.clear_outputs();
    }

    let mut execute = options.execute.clone();
    if options.ignore_cells.is_some() {
        execute.ignore = options.ignore_cells.clone();
    }

    match notebook.execute(engine, &execute) {
        Ok(()) => {
            info!("notebook run succeeded");
            hooks.on_success(&notebook);
            hooks.on_finally(&notebook, RunStatus::Success);
            Ok(notebook)
        }
        Err(NoteboxError::CellExecution(error)) => {
            warn!(cell = error.cell_index, ename = %error.ename, "notebook run failed");
            let failure = RunFailure {
                notebook: &notebook,
                error: &error,
                cell: notebook.get(error.cell_index),
            };
            hooks.on_failure(&failure);
            hooks.on_finally(&notebook, RunStatus::Failure);

            if options.silence {
                Ok(notebook)
            } else {
                Err(NoteboxError::CellExecution(error))
            }
        }
        Err(other) => {
            hooks.on_finally(&notebook, RunStatus::Aborted);
            Err(other)
        }
    }
}
