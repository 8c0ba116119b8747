//! The nbconvert subprocess.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, instrument, warn};

use notebox_shared::{KernelConfig, NoteboxError, Result};

/// Longest stderr excerpt quoted in errors.
const STDERR_TAIL: usize = 2000;

/// How to invoke `jupyter nbconvert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nbconvert {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl Nbconvert {
    /// Use `program` as the Jupyter launcher without looking it up.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Resolve the Jupyter launcher on `PATH`.
    pub fn locate(jupyter_cmd: &str) -> Result<Self> {
        let program = which::which(jupyter_cmd).map_err(|e| {
            NoteboxError::Kernel(format!(
                "cannot find `{jupyter_cmd}`: {e}. Is Jupyter installed?"
            ))
        })?;
        debug!(program = %program.display(), "jupyter located");
        Ok(Self::new(program))
    }

    pub fn from_config(config: &KernelConfig) -> Result<Self> {
        Self::locate(&config.jupyter_cmd)
    }

    /// Extra argument passed to every nbconvert call.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run `nbconvert <args> --stdin --stdout` on `input` and return stdout.
    #[instrument(skip_all, fields(program = %self.program.display()))]
    pub(crate) fn run(&self, input: &[u8], args: &[String], cwd: Option<&Path>) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.program);
        command
            .arg("nbconvert")
            .args(args)
            .args(&self.extra_args)
            .arg("--stdin")
            .arg("--stdout")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        info!(?args, ?cwd, "running nbconvert");

        let mut child = command.spawn().map_err(|e| {
            NoteboxError::Kernel(format!(
                "failed to spawn nbconvert: {e}. Is `{}` installed?",
                self.program.display()
            ))
        })?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| NoteboxError::Kernel("failed to capture nbconvert stdin".into()))?;

        // The writer runs beside `wait_with_output` so neither pipe fills up.
        let (output, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(input));
            let output = child.wait_with_output();
            (output, writer.join())
        });
        let output =
            output.map_err(|e| NoteboxError::Kernel(format!("nbconvert did not finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let tail = stderr.get(start..).unwrap_or(&*stderr);
            return Err(NoteboxError::Kernel(format!(
                "nbconvert exited with {}: {}",
                output.status,
                tail.trim()
            )));
        }
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("nbconvert closed stdin early: {e}"),
            Err(_) => return Err(NoteboxError::Kernel("stdin writer panicked".into())),
        }

        debug!(bytes = output.stdout.len(), "nbconvert finished");
        Ok(output.stdout)
    }
}
