//! Execution through `nbconvert --execute`.

use std::time::Duration;

use tracing::{info, instrument, warn};

use notebox_core::{ExecutePreprocessor, ExecuteResources, Notebook};
use notebox_shared::{CellExecutionError, CellType, KernelConfig, NoteboxError, Output, Result};

use crate::bridge::Nbconvert;

/// Cells carrying this tag are expected to raise and do not stop a run.
const RAISES_EXCEPTION_TAG: &str = "raises-exception";

/// An [`ExecutePreprocessor`] that runs notebooks in real Jupyter kernels.
///
/// nbconvert runs with `--allow-errors` so the executed notebook is always
/// returned; the first failing cell is then located and every later code
/// cell is reset, giving the state of a run that stopped at that cell.
#[derive(Debug, Clone)]
pub struct NbconvertEngine {
    nbconvert: Nbconvert,
    startup_timeout: Option<Duration>,
}

impl NbconvertEngine {
    pub fn new(nbconvert: Nbconvert) -> Self {
        Self {
            nbconvert,
            startup_timeout: None,
        }
    }

    pub fn from_config(config: &KernelConfig) -> Result<Self> {
        Ok(Self::new(Nbconvert::from_config(config)?)
            .startup_timeout(Duration::from_secs(config.startup_timeout_secs)))
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    fn args(&self, resources: &ExecuteResources) -> Vec<String> {
        let timeout = resources
            .timeout
            .map_or_else(|| "-1".to_string(), |t| whole_seconds(t).to_string());
        let mut args = vec![
            "--to".to_string(),
            "notebook".to_string(),
            "--execute".to_string(),
            "--allow-errors".to_string(),
            format!("--ExecutePreprocessor.kernel_name={}", resources.kernel_name),
            format!("--ExecutePreprocessor.timeout={timeout}"),
        ];
        if let Some(startup) = self.startup_timeout {
            args.push(format!(
                "--ExecutePreprocessor.startup_timeout={}",
                whole_seconds(startup)
            ));
        }
        args
    }
}

/// nbconvert takes timeouts in whole seconds; a fraction rounds up so a
/// short timeout never becomes `0`.
fn whole_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

impl ExecutePreprocessor for NbconvertEngine {
    #[instrument(skip_all, fields(kernel = %resources.kernel_name, cells = notebook.len()))]
    fn preprocess(&self, notebook: &mut Notebook, resources: &ExecuteResources) -> Result<()> {
        let input = notebook.to_json_string()?;
        let output =
            self.nbconvert
                .run(input.as_bytes(), &self.args(resources), resources.path.as_deref())?;

        let text = String::from_utf8(output)
            .map_err(|e| NoteboxError::Kernel(format!("nbconvert output is not UTF-8: {e}")))?;
        let executed: Notebook = text.parse().map_err(|e| {
            NoteboxError::Kernel(format!("nbconvert returned an unreadable notebook: {e}"))
        })?;

        apply_run(notebook, executed)
    }
}

/// Copy the executed document into `notebook`, stopping it at the first
/// unexpected error.
fn apply_run(notebook: &mut Notebook, executed: Notebook) -> Result<()> {
    if executed.len() != notebook.len() {
        warn!(
            before = notebook.len(),
            after = executed.len(),
            "nbconvert changed the number of cells"
        );
    }
    let metadata = executed.metadata().clone();
    let mut cells = executed.into_cells();

    let failure = cells.iter().enumerate().find_map(|(index, cell)| {
        if cell.has_tag(RAISES_EXCEPTION_TAG) {
            return None;
        }
        cell.outputs().iter().find_map(|output| match output {
            Output::Error {
                ename,
                evalue,
                traceback,
            } => Some(CellExecutionError {
                cell_index: index,
                ename: ename.clone(),
                evalue: evalue.clone(),
                traceback: traceback.join("\n"),
            }),
            _ => None,
        })
    });

    if let Some(failure) = &failure {
        for cell in cells.iter_mut().skip(failure.cell_index + 1) {
            if cell.cell_type() == CellType::Code {
                cell.clear_outputs()?;
                cell.set_execution_count(None)?;
            }
        }
    }

    notebook.cells_mut().replace_all(cells);
    notebook.set_metadata(metadata);

    match failure {
        Some(failure) => {
            warn!(cell = failure.cell_index, ename = %failure.ename, "cell raised");
            Err(NoteboxError::cell_execution(failure))
        }
        None => {
            info!("notebook executed");
            Ok(())
        }
    }
}
