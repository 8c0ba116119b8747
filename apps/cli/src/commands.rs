//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use notebox_core::{
    CellFilter, Exporter, Notebook, ParamValue, Parameters, RunFailure, RunHooks, RunOptions,
    RunStatus, TagRemoval, run_notebook,
};
use notebox_export::{HtmlExporter, SlidesExporter, exporter_for};
use notebox_kernel::{Nbconvert, NbconvertEngine, NbconvertExporter};
use notebox_shared::{AppConfig, CellType, OutputType, config_dir, init_config, load_config};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// notebox: work with Jupyter notebooks from the command line.
#[derive(Parser)]
#[command(
    name = "notebox",
    version,
    about = "Run, convert, inspect and clean Jupyter notebooks.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Parameterize and execute a notebook.
    Run {
        /// Notebook file.
        notebook: PathBuf,

        /// Parameter as NAME=VALUE (repeatable).
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Prefix the parameter cell with the imports its values need.
        #[arg(long)]
        with_imports: bool,

        /// Skip cells carrying this tag (repeatable).
        #[arg(long = "ignore-tag")]
        ignore_tags: Vec<String>,

        /// Per-cell timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Kernel to run (defaults to the notebook's kernelspec).
        #[arg(short, long)]
        kernel: Option<String>,

        /// Save the notebook even when a cell fails.
        #[arg(long)]
        silence: bool,

        /// Keep existing outputs instead of clearing them first.
        #[arg(long)]
        keep_outputs: bool,

        /// Where to write the executed notebook (defaults to in place).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Convert a notebook to another format.
    Convert {
        /// Notebook file.
        notebook: PathBuf,

        /// Target format: html, slides, script, markdown, ipynb, or any
        /// nbconvert format (pdf, latex, webpdf…).
        #[arg(short, long)]
        to: Option<String>,

        /// Output path; `-` writes to stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Omit the notebook stylesheet from HTML output.
        #[arg(long)]
        no_css: bool,

        /// Hide code cell inputs in HTML output.
        #[arg(long)]
        exclude_input: bool,

        /// Hide code cell outputs in HTML output.
        #[arg(long)]
        exclude_output: bool,

        /// Page title for HTML output.
        #[arg(long)]
        title: Option<String>,
    },

    /// List cells matching a filter.
    Cells {
        /// Notebook file.
        notebook: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print a text rendering of the notebook.
    Show {
        /// Notebook file.
        notebook: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Strip outputs, metadata or tags.
    Clear {
        /// Notebook file.
        notebook: PathBuf,

        /// Clear outputs and execution counts (default when nothing else is
        /// selected).
        #[arg(long)]
        outputs: bool,

        /// Clear cell metadata and notebook metadata except kernel info.
        #[arg(long)]
        metadata: bool,

        /// Drop every cell's tags.
        #[arg(long)]
        tags: bool,

        /// Remove cells carrying this tag (repeatable).
        #[arg(long = "remove-cell-tag")]
        remove_cell_tags: Vec<String>,

        /// Where to write the result (defaults to in place).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check a notebook against the nbformat 4 rules.
    Validate {
        /// Notebook file.
        notebook: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cell selection shared by `cells` and `show`.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct FilterArgs {
    /// Keep cells carrying any of these tags.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Drop cells carrying any of these tags.
    #[arg(long = "not-tag")]
    not_tags: Vec<String>,

    /// Keep cells of these types (code, markdown, raw).
    #[arg(long = "type")]
    types: Vec<CellType>,

    /// Keep cells whose source starts with a match of this regex.
    #[arg(long = "match")]
    pattern: Option<String>,

    /// Keep code cells with outputs of these types.
    #[arg(long = "output-type")]
    output_types: Vec<OutputType>,
}

impl FilterArgs {
    fn to_filter(&self) -> Result<CellFilter> {
        // Unset flags stay unconstrained; an empty tag list would match nothing.
        let mut filter = CellFilter::new();
        if !self.tags.is_empty() {
            filter = filter.tags(self.tags.iter().cloned());
        }
        if !self.not_tags.is_empty() {
            filter = filter.not_tags(self.not_tags.iter().cloned());
        }
        if !self.types.is_empty() {
            filter = filter.cell_types(self.types.iter().copied());
        }
        if !self.output_types.is_empty() {
            filter = filter.output_types(self.output_types.iter().copied());
        }
        if let Some(pattern) = &self.pattern {
            filter = filter.source_match(pattern)?;
        }
        Ok(filter)
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

fn parse_param(text: &str) -> std::result::Result<(String, String), String> {
    text.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got '{text}'"))
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so command
/// output on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "notebox=warn",
        1 => "notebox=info",
        2 => "notebox=debug",
        _ => "notebox=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            notebook,
            params,
            with_imports,
            ignore_tags,
            timeout,
            kernel,
            silence,
            keep_outputs,
            out,
        } => cmd_run(RunArgs {
            notebook,
            params,
            with_imports,
            ignore_tags,
            timeout,
            kernel,
            silence,
            keep_outputs,
            out,
        }),
        Command::Convert {
            notebook,
            to,
            out,
            no_css,
            exclude_input,
            exclude_output,
            title,
        } => {
            let html = HtmlOptions {
                no_css,
                exclude_input,
                exclude_output,
                title,
            };
            cmd_convert(&notebook, to.as_deref(), out.as_deref(), html)
        }
        Command::Cells { notebook, filter } => cmd_cells(&notebook, &filter),
        Command::Show { notebook, filter } => cmd_show(&notebook, &filter),
        Command::Clear {
            notebook,
            outputs,
            metadata,
            tags,
            remove_cell_tags,
            out,
        } => cmd_clear(
            &notebook,
            outputs,
            metadata,
            tags,
            &remove_cell_tags,
            out.as_deref(),
        ),
        Command::Validate { notebook } => cmd_validate(&notebook),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

struct RunArgs {
    notebook: PathBuf,
    params: Vec<(String, String)>,
    with_imports: bool,
    ignore_tags: Vec<String>,
    timeout: Option<u64>,
    kernel: Option<String>,
    silence: bool,
    keep_outputs: bool,
    out: Option<PathBuf>,
}

/// Spinner while the kernel runs; reports the outcome through run hooks.
struct CliHooks {
    spinner: ProgressBar,
}

impl CliHooks {
    fn new(message: String) -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl RunHooks for CliHooks {
    fn on_failure(&mut self, failure: &RunFailure<'_>) {
        self.spinner.suspend(|| {
            eprintln!(
                "Cell {} raised {}: {}",
                failure.error.cell_index, failure.error.ename, failure.error.evalue
            );
            eprintln!("{}", failure.error.traceback);
        });
    }

    fn on_finally(&mut self, notebook: &Notebook, status: RunStatus) {
        self.spinner.finish_and_clear();
        let ran = notebook
            .iter()
            .filter(|cell| cell.execution_count().is_some())
            .count();
        match status {
            RunStatus::Success => println!("Executed {ran} cells."),
            RunStatus::Failure => println!("Stopped after {ran} cells."),
            RunStatus::Aborted => println!("Execution aborted."),
        }
    }
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let config = load_config()?;
    let nb = Notebook::open(&args.notebook)?;

    let mut options = RunOptions::from(&config).silence(args.silence);
    if args.keep_outputs {
        options = options.clear_outputs(false);
    }
    options.parameters_with_imports |= args.with_imports;
    if !args.params.is_empty() {
        let params: Parameters = args
            .params
            .iter()
            .map(|(name, value)| (name.clone(), ParamValue::infer(value)))
            .collect();
        options = options.parameters(params);
    }
    if !args.ignore_tags.is_empty() {
        options = options.ignore_cells(CellFilter::new().tags(args.ignore_tags));
    }
    if let Some(secs) = args.timeout {
        options.execute.timeout = Some(Duration::from_secs(secs));
    }
    options.execute.kernel_name = args.kernel;

    let engine = NbconvertEngine::from_config(&config.kernel)?;
    let out = args.out.unwrap_or_else(|| args.notebook.clone());
    info!(notebook = %args.notebook.display(), out = %out.display(), "running notebook");

    let mut hooks = CliHooks::new(format!("Executing {}", args.notebook.display()));
    let executed = run_notebook(nb, &engine, &options, &mut hooks)?;
    executed.to_ipynb(&out)?;
    println!("Saved: {}", out.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// convert
// ---------------------------------------------------------------------------

struct HtmlOptions {
    no_css: bool,
    exclude_input: bool,
    exclude_output: bool,
    title: Option<String>,
}

fn cmd_convert(
    path: &Path,
    to: Option<&str>,
    out: Option<&Path>,
    options: HtmlOptions,
) -> Result<()> {
    let config = load_config()?;
    let nb = Notebook::open(path)?;
    let format = to.unwrap_or(&config.export.default_format).to_ascii_lowercase();

    let mut html = HtmlExporter::from_config(&config.export)
        .exclude_input(options.exclude_input)
        .exclude_output(options.exclude_output);
    if options.no_css {
        html = html.include_css(false);
    }
    if let Ok(dir) = config_dir() {
        html = html.css_dir(dir);
    }
    if let Some(title) = options.title {
        html = html.title(title);
    }

    let exporter: Box<dyn Exporter> = match format.as_str() {
        "html" => Box::new(html),
        "slides" => Box::new(SlidesExporter::new().with_html(html)),
        other => match exporter_for(other, &nb, &config.export) {
            Some(exporter) => exporter,
            None => Box::new(NbconvertExporter::new(
                Nbconvert::from_config(&config.kernel)?,
                other,
            )),
        },
    };

    let bytes = nb.export(exporter.as_ref())?;
    match out {
        Some(target) if target == Path::new("-") => {
            std::io::stdout().write_all(&bytes)?;
        }
        _ => {
            let target = out
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.with_extension(exporter.file_extension()));
            if is_same_file(&target, path) {
                return Err(eyre!(
                    "refusing to overwrite the source notebook {}",
                    path.display()
                ));
            }
            std::fs::write(&target, &bytes)?;
            println!("Wrote {} ({} bytes)", target.display(), bytes.len());
        }
    }
    Ok(())
}

/// Whether two paths name the same existing file, however they are spelled.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// cells / show
// ---------------------------------------------------------------------------

fn cmd_cells(path: &Path, args: &FilterArgs) -> Result<()> {
    let nb = Notebook::open(path)?;
    let filter = args.to_filter()?;

    for (index, cell) in nb.iter().enumerate().filter(|(_, c)| filter.matches(c)) {
        let first_line = cell.source().lines().next().unwrap_or("");
        let tags = cell.tags();
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        let outputs = if cell.has_output() {
            format!(" ({} outputs)", cell.outputs().len())
        } else {
            String::new()
        };
        println!(
            "{index:>4}  {:<8}{tags}{outputs}  {first_line}",
            cell.cell_type().as_str()
        );
    }
    Ok(())
}

fn cmd_show(path: &Path, args: &FilterArgs) -> Result<()> {
    let nb = Notebook::open(path)?;
    let filter = args.to_filter()?;
    let shown = if filter.is_unconstrained() {
        nb
    } else {
        nb.select(&filter)
    };
    println!("{shown}");
    Ok(())
}

// ---------------------------------------------------------------------------
// clear / validate
// ---------------------------------------------------------------------------

fn cmd_clear(
    path: &Path,
    outputs: bool,
    metadata: bool,
    tags: bool,
    remove_cell_tags: &[String],
    out: Option<&Path>,
) -> Result<()> {
    let mut nb = Notebook::open(path)?;
    let nothing_selected = !metadata && !tags && remove_cell_tags.is_empty();

    if !remove_cell_tags.is_empty() {
        nb.remove_tagged(&TagRemoval::new().remove_cells(remove_cell_tags.iter().cloned()));
    }
    if outputs || nothing_selected {
        nb.clear_outputs();
    }
    if metadata {
        nb.clear_metadata();
    }
    if tags {
        nb.clear_tags();
    }

    let target = out.unwrap_or(path);
    nb.to_ipynb(target)?;
    println!("Saved: {}", target.display());
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let nb = Notebook::open(path)?;
    let (major, minor) = nb.version();
    println!(
        "{}: valid nbformat {major}.{minor} notebook, {} cells",
        path.display(),
        nb.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_split_on_first_equals() {
        assert_eq!(
            parse_param("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=1").is_err());
    }

    #[test]
    fn same_file_ignores_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let nb = dir.path().join("nb.ipynb");
        std::fs::write(&nb, "{}").unwrap();

        assert!(is_same_file(&dir.path().join(".").join("nb.ipynb"), &nb));
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        assert!(is_same_file(&dir.path().join("sub/../nb.ipynb"), &nb));
        assert!(!is_same_file(&dir.path().join("nb.html"), &nb));
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "notebox",
            "run",
            "nb.ipynb",
            "-p",
            "alpha=0.5",
            "--ignore-tag",
            "slow",
            "--timeout",
            "30",
        ])
        .unwrap();
        let Command::Run {
            params,
            ignore_tags,
            timeout,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(params, vec![("alpha".to_string(), "0.5".to_string())]);
        assert_eq!(ignore_tags, vec!["slow"]);
        assert_eq!(timeout, Some(30));
    }

    #[test]
    fn filter_args_build_a_filter() {
        let cli = Cli::try_parse_from([
            "notebox", "cells", "nb.ipynb", "--tag", "a", "--type", "code", "--match", "^im",
        ])
        .unwrap();
        let Command::Cells { filter, .. } = cli.command else {
            panic!("expected cells");
        };
        let filter = filter.to_filter().unwrap();
        assert!(filter.matches(&notebox_core::Cell::code("import os").with_tags(["a"])));
        assert!(!filter.matches(&notebox_core::Cell::markdown("import os").with_tags(["a"])));

        let cli = Cli::try_parse_from(["notebox", "show", "nb.ipynb"]).unwrap();
        let Command::Show { filter, .. } = cli.command else {
            panic!("expected show");
        };
        assert!(filter.to_filter().unwrap().is_unconstrained());
    }
}
