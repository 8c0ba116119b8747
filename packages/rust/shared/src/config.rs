//! Application configuration for notebox.
//!
//! User config lives at `~/.notebox/notebox.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NoteboxError, Result};
use crate::types::DEFAULT_KERNEL_NAME;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "notebox.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".notebox";

// ---------------------------------------------------------------------------
// Config structs (matching notebox.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Kernel and execution engine settings.
    #[serde(default)]
    pub kernel: KernelConfig,

    /// Defaults for `run_notebook`.
    #[serde(default)]
    pub run: RunConfig,

    /// Export defaults.
    #[serde(default)]
    pub export: ExportConfig,
}

/// `[kernel]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Kernel spec name passed to the execute preprocessor.
    #[serde(default = "default_kernel_name")]
    pub name: String,

    /// Per-cell execution timeout in seconds. `None` waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,

    /// Seconds to wait for the kernel to start.
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Jupyter launcher used for execution and delegated conversion.
    #[serde(default = "default_jupyter_cmd")]
    pub jupyter_cmd: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: default_kernel_name(),
            timeout_secs: default_timeout_secs(),
            startup_timeout_secs: default_startup_timeout_secs(),
            jupyter_cmd: default_jupyter_cmd(),
        }
    }
}

impl KernelConfig {
    /// The per-cell timeout as a [`Duration`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_kernel_name() -> String {
    DEFAULT_KERNEL_NAME.into()
}
fn default_timeout_secs() -> Option<u64> {
    Some(600)
}
fn default_startup_timeout_secs() -> u64 {
    60
}
fn default_jupyter_cmd() -> String {
    "jupyter".into()
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Tag marking the cell that receives generated parameters.
    #[serde(default = "default_parameter_tag")]
    pub parameter_tag: String,

    /// Whether outputs are cleared before a run.
    #[serde(default = "default_true")]
    pub clear_outputs: bool,

    /// Whether generated parameter cells include import lines.
    #[serde(default)]
    pub parameters_with_imports: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parameter_tag: default_parameter_tag(),
            clear_outputs: true,
            parameters_with_imports: false,
        }
    }
}

fn default_parameter_tag() -> String {
    "parameters".into()
}
fn default_true() -> bool {
    true
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Format used by `notebox convert` when `--to` is omitted.
    #[serde(default = "default_format")]
    pub default_format: String,

    /// Whether HTML exports embed the notebook stylesheet.
    #[serde(default = "default_true")]
    pub include_css: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            include_css: true,
        }
    }
}

fn default_format() -> String {
    "html".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.notebox/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NoteboxError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.notebox/notebox.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NoteboxError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| NoteboxError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NoteboxError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NoteboxError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NoteboxError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("python3"));
        assert!(toml_str.contains("parameter_tag"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.kernel.timeout_secs, Some(600));
        assert_eq!(parsed.run.parameter_tag, "parameters");
        assert!(parsed.run.clear_outputs);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[kernel]
name = "ir"
timeout_secs = 30

[export]
default_format = "slides"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.kernel.name, "ir");
        assert_eq!(config.kernel.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.kernel.jupyter_cmd, "jupyter");
        assert_eq!(config.export.default_format, "slides");
        assert!(config.export.include_css);
        assert_eq!(config.run.parameter_tag, "parameters");
    }

    #[test]
    fn load_config_from_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notebox.toml");
        std::fs::write(&path, "[kernel\nname = ").expect("write");
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
